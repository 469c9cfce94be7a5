//! Syntax check with the interpreter's own parser.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::Validator;
use crate::domain::{CheckKind, CodeArtifact, DesignDocument, ValidationOutcome};

/// Reads source from stdin, parses it, prints the parser error on failure.
const PARSE_SCRIPT: &str = r#"
import ast, sys
name = sys.argv[1] if len(sys.argv) > 1 else "<artifact>"
try:
    ast.parse(sys.stdin.buffer.read(), filename=name)
except SyntaxError as e:
    print(f"{type(e).__name__}: {e}")
    sys.exit(1)
except Exception as e:
    print(f"{type(e).__name__}: {e}")
    sys.exit(1)
"#;

pub struct StaticValidator {
    interpreter: String,
    timeout: Duration,
}

impl StaticValidator {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    async fn parse(&self, artifact: &CodeArtifact) -> std::io::Result<(bool, String)> {
        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(PARSE_SCRIPT)
            .arg(artifact.file_name())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(artifact.source.as_bytes()).await?;
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("parser did not finish within {}s", self.timeout.as_secs()),
                )
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            return Ok((true, stdout));
        }
        if stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Ok((false, stderr));
        }
        Ok((false, stdout))
    }
}

#[async_trait]
impl Validator for StaticValidator {
    fn kind(&self) -> CheckKind {
        CheckKind::Syntax
    }

    async fn validate(&self, artifact: &CodeArtifact, _design: &DesignDocument) -> ValidationOutcome {
        match self.parse(artifact).await {
            Ok((true, _)) => ValidationOutcome::pass("syntax check passed"),
            Ok((false, message)) => {
                debug!(artifact = %artifact.path.display(), %message, "syntax check failed");
                ValidationOutcome::syntax_fail(format!("syntax error: {message}"))
            }
            Err(err) => ValidationOutcome::syntax_fail(format!("syntax check could not run: {err}")),
        }
    }
}
