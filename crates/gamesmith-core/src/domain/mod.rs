//! Domain models for gamesmith.
//!
//! - `CodeArtifact` / `DesignDocument`: what is validated and against what
//! - `ValidationOutcome`: tagged verdict of one check
//! - `ValidationEvent`: progress stream delivered to the caller

pub mod artifact;
pub mod error;
pub mod event;
pub mod outcome;

pub use artifact::{CodeArtifact, DesignDocument};
pub use error::{CoreError, Result};
pub use event::{ValidationEvent, FAILURE_MARKER, SUCCESS_MARKER};
pub use outcome::{CheckKind, OutcomeKind, RepairStrategy, ValidationOutcome};
