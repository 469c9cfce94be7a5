//! Stimulus injection into a generated program's main loop.
//!
//! The stimulus is plain statements that post random input events. It is
//! sanitised, wrapped in a guard that only runs when `pygame` is bound and
//! swallows any exception, then spliced in as the first statement of the last
//! `while ...:` loop in the program.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::extract::nested_indent;

/// Alias the stimulus uses for the `random` module, chosen so it cannot
/// collide with names in the host program.
pub const RANDOM_ALIAS: &str = "_stimulus_random";

/// Stimulus used when no sidecar file sits beside the artifact: a left click
/// at a random position and a random key press, each with 5% chance per tick.
pub const DEFAULT_STIMULUS: &str = r#"
if random.random() < 0.05:
    _mx = random.randint(0, globals().get('WIDTH', 800))
    _my = random.randint(0, globals().get('HEIGHT', 600))
    pygame.event.post(pygame.event.Event(pygame.MOUSEBUTTONDOWN, {'pos': (_mx, _my), 'button': 1}))

if random.random() < 0.05:
    _keys = [pygame.K_SPACE, pygame.K_LEFT, pygame.K_RIGHT, pygame.K_UP, pygame.K_DOWN, pygame.K_a, pygame.K_w, pygame.K_s, pygame.K_d]
    _k = random.choice(_keys)
    pygame.event.post(pygame.event.Event(pygame.KEYDOWN, {'key': _k, 'unicode': ''}))
"#;

const BLOCK_START: &str = "# --- injected stimulus start ---";
const BLOCK_END: &str = "# --- injected stimulus end ---";

fn loop_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^([ \t]*)while\b[^\n#]*:[ \t]*(?:#[^\n]*)?$").expect("static regex")
    })
}

fn library_import() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*(?:import|from)\s+(?:pygame|random)\b").expect("static regex"))
}

fn random_reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\brandom\.").expect("static regex"))
}

/// Drop the lines that import `pygame` or `random`.
///
/// The host already binds `pygame`; `random` is re-imported under
/// [`RANDOM_ALIAS`] inside the guard. Applying this twice changes nothing.
pub fn strip_library_imports(stimulus: &str) -> String {
    stimulus
        .lines()
        .filter(|line| !library_import().is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stimulus body ready for wrapping: imports stripped, dedented, `random.`
/// rewritten to the alias. Never empty.
pub fn prepare_stimulus(stimulus: &str) -> String {
    let stripped = strip_library_imports(stimulus);
    let dedented = dedent(&stripped);
    let body = dedented.trim();
    if body.is_empty() {
        return "pass".to_string();
    }
    random_reference()
        .replace_all(body, format!("{RANDOM_ALIAS}."))
        .into_owned()
}

/// Splice `stimulus` into the last `while` loop of `program`.
///
/// Returns `program` unchanged when it has no loop header on a line of its own.
pub fn inject(program: &str, stimulus: &str) -> String {
    let Some(header) = loop_header().captures_iter(program).last() else {
        debug!("no main loop found; stimulus not injected");
        return program.to_string();
    };
    let (Some(whole), Some(indent)) = (header.get(0), header.get(1)) else {
        return program.to_string();
    };

    let insert_at = whole.end();
    let (head, rest) = program.split_at(insert_at);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);

    let body_indent = body_indent_after(indent.as_str(), rest);
    let block = guarded_block(&prepare_stimulus(stimulus));

    let mut out = String::with_capacity(program.len() + block.len() * 2);
    out.push_str(head);
    out.push('\n');
    for line in block.lines() {
        if !line.is_empty() {
            out.push_str(&body_indent);
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push_str(rest);
    out
}

/// Indentation the loop body already uses, or one level below the header.
fn body_indent_after(header_indent: &str, rest: &str) -> String {
    let first_body_line = rest
        .lines()
        .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));
    match first_body_line {
        Some(line) => {
            let indent = &line[..line.len() - line.trim_start().len()];
            if indent.len() > header_indent.len() && indent.starts_with(header_indent) {
                indent.to_string()
            } else {
                nested_indent(header_indent)
            }
        }
        None => nested_indent(header_indent),
    }
}

fn guarded_block(body: &str) -> String {
    let mut block = String::new();
    block.push_str(BLOCK_START);
    block.push_str("\nif 'pygame' in globals():\n");
    block.push_str("    try:\n");
    block.push_str(&format!("        import random as {RANDOM_ALIAS}\n"));
    for line in body.lines() {
        if line.trim().is_empty() {
            block.push('\n');
        } else {
            block.push_str("        ");
            block.push_str(line);
            block.push('\n');
        }
    }
    block.push_str("    except Exception:\n");
    block.push_str("        pass\n");
    block.push_str(BLOCK_END);
    block
}

/// Remove the whitespace prefix shared by every non-blank line.
fn dedent(text: &str) -> String {
    let common = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| &l[..l.len() - l.trim_start().len()])
        .reduce(|acc, indent| {
            let shared = acc
                .bytes()
                .zip(indent.bytes())
                .take_while(|(a, b)| a == b)
                .count();
            &acc[..shared]
        })
        .unwrap_or("");

    text.lines()
        .map(|l| l.strip_prefix(common).unwrap_or(l.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}
