//! Progress events streamed to the caller while validation runs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::outcome::{CheckKind, RepairStrategy, ValidationOutcome};

/// Line prefix of the terminal event for overall success.
pub const SUCCESS_MARKER: &str = "RESULT_SUCCESS:";

/// Line prefix of every other terminal event.
pub const FAILURE_MARKER: &str = "RESULT_FAIL:";

/// One step of the validate-and-repair loop, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationEvent {
    Started {
        artifact: PathBuf,
        budget: u32,
    },
    CheckPassed {
        check: CheckKind,
        detail: String,
    },
    CheckFailed {
        check: CheckKind,
        detail: String,
    },
    /// The repair produced code and the artifact was replaced.
    Repaired {
        strategy: RepairStrategy,
        artifact: PathBuf,
        remaining: u32,
    },
    /// The repair produced nothing usable; the old artifact stays live.
    RepairSkipped {
        strategy: RepairStrategy,
        reason: String,
        remaining: u32,
    },
    Succeeded {
        repairs_used: u32,
    },
    Exhausted {
        last_failure: Option<ValidationOutcome>,
    },
    /// Unexpected failure outside the loop's own recovery; the run is abandoned.
    Aborted {
        message: String,
    },
}

impl ValidationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ValidationEvent::Succeeded { .. }
                | ValidationEvent::Exhausted { .. }
                | ValidationEvent::Aborted { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ValidationEvent::Succeeded { .. })
    }

    /// Render as a single human-readable line.
    pub fn to_line(&self) -> String {
        match self {
            ValidationEvent::Started { artifact, budget } => {
                let name = artifact
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| artifact.display().to_string());
                format!("validation started: {name} (retry budget {budget})")
            }
            ValidationEvent::CheckPassed { check, .. } => format!("✅ {check} check passed"),
            ValidationEvent::CheckFailed { check, detail } => {
                format!("❌ {check} check failed: {} (repairing...)", single_line(detail))
            }
            ValidationEvent::Repaired {
                strategy,
                remaining,
                ..
            } => format!("🔧 {strategy} repair applied ({remaining} retries left)"),
            ValidationEvent::RepairSkipped {
                strategy,
                reason,
                remaining,
            } => format!(
                "⚠️ {strategy} repair produced no code: {} ({remaining} retries left)",
                single_line(reason)
            ),
            ValidationEvent::Succeeded { .. } => {
                format!("{SUCCESS_MARKER} code passed all checks")
            }
            ValidationEvent::Exhausted { .. } => {
                format!("{FAILURE_MARKER} retry budget exhausted, validation failed")
            }
            ValidationEvent::Aborted { message } => {
                format!("{FAILURE_MARKER} system error: {}", single_line(message))
            }
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
