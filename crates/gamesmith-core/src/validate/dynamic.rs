use async_trait::async_trait;

use super::Validator;
use crate::domain::{CheckKind, CodeArtifact, DesignDocument, ValidationOutcome};
use crate::probe::DynamicProbe;

/// Runtime check: the artifact must survive the dynamic probe.
pub struct DynamicValidator {
    probe: DynamicProbe,
}

impl DynamicValidator {
    pub fn new(probe: DynamicProbe) -> Self {
        Self { probe }
    }
}

#[async_trait]
impl Validator for DynamicValidator {
    fn kind(&self) -> CheckKind {
        CheckKind::Dynamic
    }

    async fn validate(&self, artifact: &CodeArtifact, _design: &DesignDocument) -> ValidationOutcome {
        let report = self.probe.run(&artifact.path).await;
        if report.passed() {
            ValidationOutcome::pass(report.message)
        } else {
            ValidationOutcome::runtime_fail(report.message)
        }
    }
}
