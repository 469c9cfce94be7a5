//! Prompt templates.
//!
//! Templates are opaque configuration: the pipeline only fills in the
//! `{idea}`, `{brief}`, `{gdd}`, `{assets}`, `{code}` and `{error}`
//! placeholders. Every template can be replaced from the config file.

use serde::{Deserialize, Serialize};

/// Every system and user prompt the pipeline sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub concept_system: String,
    /// `{idea}`
    pub concept: String,
    pub design_system: String,
    /// `{idea}`, `{brief}`
    pub design: String,
    pub assets_system: String,
    /// `{gdd}`
    pub assets: String,
    pub programmer_system: String,
    /// `{gdd}`, `{assets}`
    pub programmer: String,
    pub stimulus_system: String,
    /// `{gdd}`
    pub stimulus: String,
    pub review_system: String,
    /// `{code}`
    pub review: String,
    /// `{code}`, `{gdd}`
    pub review_with_design: String,
    pub syntax_fix_system: String,
    /// `{code}`, `{error}`
    pub syntax_fix: String,
    pub logic_fix_system: String,
    /// `{code}`, `{error}`, `{gdd}`
    pub logic_fix: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            concept_system: "You are a game studio director. You turn a one-line idea into a short, \
                             focused concept brief for a small 2D pygame game."
                .to_string(),
            concept: "Game idea:\n{idea}\n\nWrite a concept brief: core loop, win and lose \
                      conditions, controls, and the one feature that makes it fun. Keep it small \
                      enough to build in a single Python file."
                .to_string(),
            design_system: "You are a game product designer. You write complete, implementable \
                            game design documents in Markdown."
                .to_string(),
            design: "Game idea:\n{idea}\n\nConcept brief:\n{brief}\n\nWrite the game design \
                     document: entities and their behaviour, inputs and what they do, scoring, \
                     screen layout, and game-over flow."
                .to_string(),
            assets_system: "You describe game art as simple geometric shapes. Reply with JSON only."
                .to_string(),
            assets: "Design document:\n{gdd}\n\nDescribe every visual entity as a JSON object keyed \
                     by entity name, each with \"shape\" (rect or circle), \"color\" ([r, g, b]) \
                     and \"size\" ([w, h])."
                .to_string(),
            programmer_system: "You are a senior Python game programmer. You write complete, \
                                runnable single-file pygame programs with a `main()` function, a \
                                `while running:` main loop and an `if __name__ == \"__main__\":` \
                                entry point. Reply with one ```python block."
                .to_string(),
            programmer: "Design document:\n{gdd}\n\nAssets (JSON):\n{assets}\n\nWrite the full \
                         program now."
                .to_string(),
            stimulus_system: "You are a QA engineer writing random input for automated game tests."
                .to_string(),
            stimulus: "Design document:\n{gdd}\n\nWrite a few Python statements, without imports \
                       and without a loop, that run once per frame and use `random` and \
                       `pygame.event.post` to simulate the inputs this game expects. Each input \
                       should fire with low probability. Reply with one ```python block."
                .to_string(),
            review_system: "You are a code logic reviewer.".to_string(),
            review: "Review this pygame program for logic errors that would make it unplayable or \
                     crash: unguarded None access, objects that never move, missing display \
                     updates, unhandled input.\n\nCode:\n{code}\n\nIf it is playable and safe, \
                     reply PASS. Otherwise reply FAIL: followed by the problems."
                .to_string(),
            review_with_design: "Review this pygame program against its design document for logic \
                                 errors that would make it unplayable, crash, or contradict the \
                                 design.\n\nDesign document:\n{gdd}\n\nCode:\n{code}\n\nIf it is \
                                 playable, safe and faithful, reply PASS. Otherwise reply FAIL: \
                                 followed by the problems."
                .to_string(),
            syntax_fix_system: "You are a code error fixer.".to_string(),
            syntax_fix: "This pygame program fails to run.\n\nCode:\n{code}\n\nError:\n{error}\n\n\
                         Fix the cause instead of wrapping it in try/except. Reply with the full \
                         corrected program in one ```python block."
                .to_string(),
            logic_fix_system: "You are a code logic fixer.".to_string(),
            logic_fix: "This pygame program has logic or runtime problems.\n\nProblems:\n{error}\n\n\
                        Design document:\n{gdd}\n\nCode:\n{code}\n\nFix the problems while keeping \
                        the design intact. Reply with the full corrected program in one ```python \
                        block."
                .to_string(),
        }
    }
}

/// Substitute `{name}` placeholders in one pass over `template`.
///
/// Values are inserted verbatim and never rescanned, so code containing
/// `{gdd}` stays as written. Braces that do not name a known variable are left
/// alone.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match known {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
