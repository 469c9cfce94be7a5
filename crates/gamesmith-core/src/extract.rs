//! Code-block extraction from free-text model output.
//!
//! Every generated artifact enters the pipeline through this module. The
//! fallback order is fixed:
//!
//! 1. a complete ```` ```python ```` fenced block;
//! 2. an opened fence with no closing delimiter (the response was cut off),
//!    which marks the extraction as truncated;
//! 3. the whole response, when it carries the `import pygame` signature;
//! 4. nothing.
//!
//! Truncated code is passed through [`recover_truncated`] before it is written,
//! so that a cut-off response still yields a file the interpreter can load.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::Result;

/// Text that identifies a bare response as program source.
pub const LANGUAGE_SIGNATURE: &str = "import pygame";

/// Comment line that opens the truncation epilogue.
pub const RECOVERY_MARKER: &str = "# --- recovered from truncated model output ---";

fn complete_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:python3|python|py)\b(.*?)```").expect("static regex"))
}

fn open_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:python3|python|py)\b(.*)").expect("static regex"))
}

fn main_definition() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^def\s+main\s*\(").expect("static regex"))
}

fn main_guard() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"__name__\s*==\s*['"]__main__['"]"#).expect("static regex")
    })
}

/// Which rung of the fallback chain produced the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    FencedBlock,
    UnclosedFence,
    BareSource,
    Nothing,
}

/// Code pulled out of a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub code: String,
    pub truncated: bool,
    pub source: ExtractionSource,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.code.trim().is_empty()
    }

    /// The code as it should be written to disk: truncated code gets the
    /// recovery epilogue, anything else is returned untouched.
    pub fn finish(&self) -> String {
        if self.truncated && !self.is_empty() {
            recover_truncated(&self.code)
        } else {
            self.code.clone()
        }
    }
}

/// Pull program source out of `raw` following the fallback chain.
pub fn extract(raw: &str) -> Extraction {
    if let Some(inner) = complete_fence().captures(raw).and_then(|c| c.get(1)) {
        return Extraction {
            code: inner.as_str().trim().to_string(),
            truncated: false,
            source: ExtractionSource::FencedBlock,
        };
    }

    if let Some(inner) = open_fence().captures(raw).and_then(|c| c.get(1)) {
        return Extraction {
            code: inner.as_str().trim().to_string(),
            truncated: true,
            source: ExtractionSource::UnclosedFence,
        };
    }

    if raw.contains(LANGUAGE_SIGNATURE) {
        return Extraction {
            code: raw.trim().to_string(),
            truncated: false,
            source: ExtractionSource::BareSource,
        };
    }

    warn!(
        response_chars = raw.len(),
        "no python code block found in model response"
    );
    Extraction {
        code: String::new(),
        truncated: false,
        source: ExtractionSource::Nothing,
    }
}

/// Extract code from `raw` and write it to `<output_dir>/<filename>`.
///
/// Creates `output_dir` when missing. Returns `Ok(None)` without touching the
/// filesystem when nothing usable remains, including truncated code that
/// recovery cut back to nothing, so a useless response never clobbers an
/// existing file.
pub async fn save_code(raw: &str, output_dir: &Path, filename: &str) -> Result<Option<PathBuf>> {
    let extraction = extract(raw);
    let code = extraction.finish();
    if code.trim().is_empty() {
        if extraction.truncated {
            warn!(filename = %filename, "truncated model output held no complete statement");
        }
        return Ok(None);
    }
    if extraction.truncated {
        warn!(filename = %filename, "model output was truncated; appending recovery epilogue");
    }

    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(filename);
    tokio::fs::write(&path, code).await?;
    debug!(path = %path.display(), source = ?extraction.source, "saved extracted code");
    Ok(Some(path))
}

/// Make cut-off source loadable.
///
/// Drops an unfinished trailing statement, gives a dangling block header a
/// `pass` body, closes `try:` blocks left without a handler and, when `main()`
/// is defined but never invoked under a `__main__` guard, appends a guarded
/// call that swallows whatever `main()` raises.
pub fn recover_truncated(code: &str) -> String {
    let scan = scan(code);
    let end = if scan.balanced {
        code.len()
    } else {
        scan.safe_points.last().copied().unwrap_or(0)
    };

    let bounds: Vec<usize> = scan.safe_points.iter().copied().filter(|&p| p < end).collect();
    let logical = |k: usize| -> &str {
        let stop = bounds.get(k + 1).copied().unwrap_or(end);
        &code[bounds[k]..stop]
    };

    let mut keep = bounds.len();
    let mut cut = end;
    let mut last_code: Option<usize> = None;
    while let Some(k) = (0..keep).rev().find(|&k| has_code(logical(k))) {
        if is_incomplete(logical(k)) {
            cut = bounds[k];
            keep = k;
            continue;
        }
        last_code = Some(k);
        break;
    }

    let mut out = code[..cut].trim_end().to_string();
    if out.is_empty() {
        return out;
    }

    if let Some(k) = last_code {
        let line = first_code_line(logical(k));
        if code_tail(logical(k)).ends_with(':') && is_block_header(leading_word(line.trim_start())) {
            let indent = leading_indent(line);
            out.push('\n');
            out.push_str(&nested_indent(indent));
            out.push_str("pass");
        }
    }

    for indent in open_try_blocks(&out).into_iter().rev() {
        out.push('\n');
        out.push_str(&indent);
        out.push_str("except Exception:\n");
        out.push_str(&nested_indent(&indent));
        out.push_str("pass");
    }

    out.push_str("\n\n");
    out.push_str(RECOVERY_MARKER);
    out.push('\n');

    if main_definition().is_match(&out) && !main_guard().is_match(&out) {
        out.push_str("if __name__ == \"__main__\":\n");
        out.push_str("    try:\n");
        out.push_str("        main()\n");
        out.push_str("    except Exception as exc:\n");
        out.push_str("        print(f\"program stopped after truncation recovery: {exc}\")\n");
    }

    out
}

struct LexScan {
    /// Offsets at which a new logical line starts: outside any string literal
    /// and bracket, and not after a backslash continuation. Always contains 0.
    safe_points: Vec<usize>,
    /// True when the text ends outside any string literal and bracket.
    balanced: bool,
}

fn scan(code: &str) -> LexScan {
    let bytes = code.as_bytes();
    let mut safe_points = vec![0];
    let mut depth = 0usize;
    let mut quote: Option<(u8, bool)> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some((q, triple)) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == b'\n' && !triple {
                quote = None;
            } else if b == q {
                if !triple {
                    quote = None;
                } else if bytes[i..].starts_with(&[q, q, q]) {
                    quote = None;
                    i += 3;
                    continue;
                }
            }
            i += 1;
            continue;
        }

        match b {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'\'' | b'"' => {
                let triple = bytes[i..].starts_with(&[b, b, b]);
                quote = Some((b, triple));
                i += if triple { 3 } else { 1 };
                continue;
            }
            b'\\' if bytes.get(i + 1) == Some(&b'\n') => {
                i += 2;
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'\n' if depth == 0 => safe_points.push(i + 1),
            _ => {}
        }
        i += 1;
    }

    LexScan {
        safe_points,
        balanced: quote.is_none() && depth == 0,
    }
}

const HEADER_KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "for", "while", "with", "try", "except", "finally",
    "async",
];

const DANGLING_KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "elif", "else", "lambda", "import", "from", "as",
    "def", "class", "with", "for", "while", "except", "assert", "del", "await", "async",
    "global", "nonlocal",
];

/// Keywords that may legitimately precede a bare name at the end of a line.
const PREFIX_KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "elif", "else", "return", "yield", "await", "del",
    "assert", "raise", "import", "from", "as", "global", "nonlocal",
];

const STANDALONE_STATEMENTS: &[&str] = &[
    "pass", "break", "continue", "return", "raise", "yield", "None", "True", "False",
];

const TRAILING_OPERATORS: &[char] = &[
    '=', '+', '-', '*', '/', '%', '&', '|', '^', '<', '>', '.', '\\', '~', '@', '!',
];

fn is_incomplete(logical: &str) -> bool {
    let head = first_code_line(logical).trim_start();
    let tail = code_tail(logical);
    let bare_tail = blank_strings(tail);
    let tokens: Vec<&str> = bare_tail.split_whitespace().collect();
    let first_word = leading_word(head);

    if head.starts_with('@') {
        return true;
    }
    // `lambda e:` or a bare annotation `lives:` cannot take an indented body.
    if tail.ends_with(':') && !is_block_header(first_word) {
        return true;
    }
    if tail.ends_with(TRAILING_OPERATORS) && !tail.ends_with("...") {
        return true;
    }
    if let Some(last) = tokens.last() {
        if DANGLING_KEYWORDS.contains(last) {
            return true;
        }
    }
    if HEADER_KEYWORDS.contains(&first_word) && !strip_comment(logical).contains(':') {
        return true;
    }
    if first_word == "from" && !tokens.contains(&"import") {
        return true;
    }
    if tokens.len() == 1 && is_name(tokens[0]) && !STANDALONE_STATEMENTS.contains(&tokens[0]) {
        return true;
    }
    if tokens.len() >= 2 {
        let last = tokens[tokens.len() - 1];
        let prev = tokens[tokens.len() - 2];
        let prev_ends_operand = prev
            .chars()
            .last()
            .map(|c| c.is_alphanumeric() || matches!(c, '_' | ')' | ']' | '}' | '"' | '\''))
            .unwrap_or(false);
        if is_name(last) && prev_ends_operand && !PREFIX_KEYWORDS.contains(&prev) {
            return true;
        }
    }
    if let Some(pos) = tokens.iter().position(|t| *t == "if") {
        let comprehension = tokens[..pos].iter().any(|t| *t == "for");
        let has_else = tokens[pos..].iter().any(|t| *t == "else");
        if pos > 0 && !comprehension && !has_else {
            return true;
        }
    }
    false
}

fn leading_word(line: &str) -> &str {
    line.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or("")
}

fn is_block_header(first_word: &str) -> bool {
    HEADER_KEYWORDS.contains(&first_word) || matches!(first_word, "match" | "case")
}

/// `line` with the contents of every string literal removed, quotes kept.
fn blank_strings(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in line.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
                out.push(c);
            }
            continue;
        }
        if c == '\'' || c == '"' {
            quote = Some(c);
        }
        out.push(c);
    }
    out
}

fn is_name(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

fn has_code(logical: &str) -> bool {
    logical.lines().any(|l| !strip_comment(l).trim().is_empty())
}

fn first_code_line(logical: &str) -> &str {
    logical
        .lines()
        .find(|l| !strip_comment(l).trim().is_empty())
        .unwrap_or("")
}

/// Last physical line with code, comment stripped and right-trimmed.
fn code_tail(logical: &str) -> &str {
    logical
        .lines()
        .rev()
        .map(|l| strip_comment(l).trim_end())
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
}

/// `line` up to an unquoted `#`.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '#' => return &line[..idx],
            '\'' | '"' => quote = Some(c),
            _ => {}
        }
    }
    line
}

fn leading_indent(line: &str) -> &str {
    let width = line.len() - line.trim_start().len();
    &line[..width]
}

/// One indentation level deeper than `indent`, keeping tabs if the block uses them.
pub(crate) fn nested_indent(indent: &str) -> String {
    if indent.contains('\t') {
        format!("{indent}\t")
    } else {
        format!("{indent}    ")
    }
}

/// Indents of `try:` headers that reach end-of-text without a handler,
/// outermost first.
fn open_try_blocks(code: &str) -> Vec<String> {
    let scan = scan(code);
    let mut open: Vec<String> = Vec::new();

    for (k, &start) in scan.safe_points.iter().enumerate() {
        let stop = scan.safe_points.get(k + 1).copied().unwrap_or(code.len());
        let logical = &code[start..stop];
        if !has_code(logical) {
            continue;
        }
        let line = first_code_line(logical);
        let indent = leading_indent(line);
        let stmt = line.trim_start();

        while open.last().is_some_and(|t| t.len() > indent.len()) {
            open.pop();
        }
        if open.last().is_some_and(|t| t.len() == indent.len()) {
            open.pop();
        }
        if stmt.starts_with("try") && code_tail(logical).ends_with(':') {
            open.push(indent.to_string());
        }
    }
    open
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_block_wins() {
        let raw = "Here you go:\n```python\nimport pygame\nprint('hi')\n```\nEnjoy.";
        let ex = extract(raw);
        assert_eq!(ex.source, ExtractionSource::FencedBlock);
        assert!(!ex.truncated);
        assert_eq!(ex.code, "import pygame\nprint('hi')");
    }

    #[test]
    fn test_first_complete_block_is_taken() {
        let raw = "```python\na = 1\n```\ntext\n```python\nb = 2\n```";
        assert_eq!(extract(raw).code, "a = 1");
    }

    #[test]
    fn test_unclosed_fence_is_truncated() {
        let raw = "```python\nimport pygame\nx = 1\n";
        let ex = extract(raw);
        assert_eq!(ex.source, ExtractionSource::UnclosedFence);
        assert!(ex.truncated);
        assert_eq!(ex.code, "import pygame\nx = 1");
    }

    #[test]
    fn test_signature_fallback_takes_whole_text() {
        let raw = "  import pygame\nscreen = None\n";
        let ex = extract(raw);
        assert_eq!(ex.source, ExtractionSource::BareSource);
        assert!(!ex.truncated);
        assert_eq!(ex.code, "import pygame\nscreen = None");
    }

    #[test]
    fn test_nothing_found() {
        let ex = extract("LLM call error (openai): missing API key");
        assert_eq!(ex.source, ExtractionSource::Nothing);
        assert!(ex.is_empty());
        assert_eq!(ex.finish(), "");
    }

    #[test]
    fn test_other_language_fence_is_ignored() {
        let ex = extract("```pygame-notes\nnot code\n```");
        assert_eq!(ex.source, ExtractionSource::Nothing);
    }

    #[test]
    fn test_recover_adds_body_to_dangling_header() {
        let out = recover_truncated("import pygame\nclass Player:\n    def update(self):");
        assert!(out.contains("    def update(self):\n        pass"));
        assert!(out.contains(RECOVERY_MARKER));
    }

    #[test]
    fn test_recover_drops_unterminated_string_line() {
        let out = recover_truncated("x = 1\nprint(\"Game ov");
        assert!(out.starts_with("x = 1\n"));
        assert!(!out.contains("Game ov"));
    }

    #[test]
    fn test_recover_drops_unclosed_call() {
        let out = recover_truncated("def draw():\n    pygame.draw.rect(screen,\n        (255, 0,");
        assert!(out.starts_with("def draw():\n    pass"));
    }

    #[test]
    fn test_recover_drops_dangling_operator_and_keyword() {
        assert!(recover_truncated("a = 1\nb = a +").starts_with("a = 1\n\n"));
        assert!(recover_truncated("a = 1\nb = a and").starts_with("a = 1\n\n"));
        assert!(recover_truncated("a = 1\nfrom pygame").starts_with("a = 1\n\n"));
    }

    #[test]
    fn test_recover_drops_partial_header_then_fills_parent() {
        let out = recover_truncated("class A:\n    def f(self)");
        assert!(out.starts_with("class A:\n    pass"));
    }

    #[test]
    fn test_recover_closes_open_try() {
        let out = recover_truncated("def run():\n    try:\n        step()\n    exc");
        assert!(out.contains("        step()\n    except Exception:\n        pass"));
    }

    #[test]
    fn test_recover_appends_guarded_main() {
        let out = recover_truncated("import pygame\ndef main():\n    running = True\n    while running:");
        assert!(out.contains("    while running:\n        pass"));
        assert!(out.contains("if __name__ == \"__main__\":\n    try:\n        main()"));
    }

    #[test]
    fn test_recover_keeps_existing_guard() {
        let code = "def main():\n    pass\n\nif __name__ == '__main__':\n    main()\n    x = (";
        let out = recover_truncated(code);
        assert_eq!(out.matches("__main__").count(), 1);
    }

    #[test]
    fn test_recover_keeps_tab_indentation() {
        let out = recover_truncated("if True:\n\tif ready:");
        assert!(out.contains("\tif ready:\n\t\tpass"));
    }

    #[test]
    fn test_recover_drops_trailing_colon_that_is_not_a_block() {
        let out = extract("```python\nimport pygame\non_quit = lambda e:").finish();
        assert!(out.starts_with("import pygame\n\n"));
        assert!(!out.contains("lambda"));
        assert!(!out.contains("pass"));

        let out = recover_truncated("score: int = 0\nlives:");
        assert!(out.starts_with("score: int = 0\n\n"));
        assert!(!out.contains("lives"));
    }

    #[test]
    fn test_recover_fills_match_and_case_headers() {
        let out = recover_truncated("match key:\n    case 1:");
        assert!(out.contains("    case 1:\n        pass"));
    }

    #[test]
    fn test_recover_keeps_keywords_inside_strings() {
        let code = "def main():\n    print(\"click if you dare\")";
        let out = recover_truncated(code);
        assert!(out.starts_with(code));
        assert!(!is_incomplete("x = 'a and'"));
        assert!(is_incomplete("x = 'a' and"));
    }

    #[test]
    fn test_blank_strings() {
        assert_eq!(blank_strings(r#"print("a # b", 'c\'d')"#), r#"print("", '')"#);
        assert_eq!(blank_strings("x = 1"), "x = 1");
    }

    #[test]
    fn test_recover_ignores_colon_in_comment() {
        let out = recover_truncated("x = 1  # note:");
        assert!(!out.contains("pass"));
    }

    #[test]
    fn test_scan_tracks_triple_quotes_and_brackets() {
        let s = scan("a = '''x\ny'''\nb = [1,\n2]\nc = 3\n");
        assert!(s.balanced);
        // `a` (two lines), `b` (two lines), `c`, trailing empty line
        assert_eq!(s.safe_points.len(), 4);

        let s = scan("doc = \"\"\"open\n");
        assert!(!s.balanced);
    }

    #[tokio::test]
    async fn test_save_code_writes_and_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out");
        let path = save_code("```python\nimport pygame\n```", &target, "main.py")
            .await
            .unwrap()
            .expect("code saved");
        assert_eq!(path, target.join("main.py"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "import pygame");
    }

    #[tokio::test]
    async fn test_save_code_skips_empty_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("main.py");
        std::fs::write(&existing, "keep = True\n").unwrap();

        let saved = save_code("sorry, I can't help", dir.path(), "main.py")
            .await
            .unwrap();
        assert!(saved.is_none());
        assert_eq!(std::fs::read_to_string(existing).unwrap(), "keep = True\n");
    }

    #[tokio::test]
    async fn test_save_code_skips_truncation_recovered_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("main.py");
        std::fs::write(&existing, "import pygame\nprint('working game')\n").unwrap();

        assert_eq!(recover_truncated("x = foo(1,"), "");
        let saved = save_code(
            "```python\nscreen = pygame.display.set_mode((800,",
            dir.path(),
            "main.py",
        )
        .await
        .unwrap();

        assert!(saved.is_none());
        assert_eq!(
            std::fs::read_to_string(existing).unwrap(),
            "import pygame\nprint('working game')\n"
        );
    }

    #[tokio::test]
    async fn test_save_code_does_not_create_dir_for_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never");
        let saved = save_code("```python\nx = (", &target, "main.py").await.unwrap();
        assert!(saved.is_none());
        assert!(!target.exists());
    }
}
