//! The three checks run against a code artifact.
//!
//! A validator never fails: whatever goes wrong while checking is reported as
//! the failing [`ValidationOutcome`] of its kind.

mod dynamic;
mod logic;
mod static_check;

pub use dynamic::DynamicValidator;
pub use logic::{LogicValidator, PASS_TOKEN};
pub use static_check::StaticValidator;

use async_trait::async_trait;

use crate::domain::{CheckKind, CodeArtifact, DesignDocument, ValidationOutcome};

#[async_trait]
pub trait Validator: Send + Sync {
    fn kind(&self) -> CheckKind;

    async fn validate(&self, artifact: &CodeArtifact, design: &DesignDocument) -> ValidationOutcome;
}

/// The three validators in run order.
pub struct ValidatorChain {
    pub syntax: Box<dyn Validator>,
    pub logic: Box<dyn Validator>,
    pub dynamic: Box<dyn Validator>,
}

impl ValidatorChain {
    pub fn new(
        syntax: Box<dyn Validator>,
        logic: Box<dyn Validator>,
        dynamic: Box<dyn Validator>,
    ) -> Self {
        Self {
            syntax,
            logic,
            dynamic,
        }
    }

    pub fn get(&self, kind: CheckKind) -> &dyn Validator {
        match kind {
            CheckKind::Syntax => self.syntax.as_ref(),
            CheckKind::Logic => self.logic.as_ref(),
            CheckKind::Dynamic => self.dynamic.as_ref(),
        }
    }
}
