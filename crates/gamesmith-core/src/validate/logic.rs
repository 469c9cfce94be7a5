//! LLM logic review.

use std::sync::Arc;

use async_trait::async_trait;
use gamesmith_llm::{call_llm, LlmClient, LlmOptions};

use super::Validator;
use crate::domain::{CheckKind, CodeArtifact, DesignDocument, ValidationOutcome};
use crate::metrics::METRICS;
use crate::prompts::{render, PromptSet};

/// Token whose presence anywhere in the reply, in any case, means pass.
pub const PASS_TOKEN: &str = "PASS";

pub struct LogicValidator {
    client: Arc<dyn LlmClient>,
    options: LlmOptions,
    system_prompt: String,
    template: String,
    include_design: bool,
}

impl LogicValidator {
    /// Reviewer that sees only the code.
    pub fn new(client: Arc<dyn LlmClient>, options: LlmOptions, prompts: &PromptSet) -> Self {
        Self {
            client,
            options,
            system_prompt: prompts.review_system.clone(),
            template: prompts.review.clone(),
            include_design: false,
        }
    }

    /// Reviewer that also sees the design document.
    pub fn with_design(client: Arc<dyn LlmClient>, options: LlmOptions, prompts: &PromptSet) -> Self {
        Self {
            template: prompts.review_with_design.clone(),
            include_design: true,
            ..Self::new(client, options, prompts)
        }
    }
}

#[async_trait]
impl Validator for LogicValidator {
    fn kind(&self) -> CheckKind {
        CheckKind::Logic
    }

    async fn validate(&self, artifact: &CodeArtifact, design: &DesignDocument) -> ValidationOutcome {
        let prompt = if self.include_design {
            render(
                &self.template,
                &[("code", artifact.source.as_str()), ("gdd", design.as_str())],
            )
        } else {
            render(&self.template, &[("code", artifact.source.as_str())])
        };

        METRICS.inc_llm_calls();
        let reply = call_llm(self.client.as_ref(), &self.system_prompt, &prompt, &self.options).await;

        // Substring, not equality: "Verdict: pass." is a pass.
        if reply.to_uppercase().contains(PASS_TOKEN) {
            ValidationOutcome::pass(reply)
        } else {
            ValidationOutcome::logic_fail(reply)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OutcomeKind;
    use gamesmith_llm::fakes::ScriptedLlm;

    fn artifact() -> CodeArtifact {
        CodeArtifact::new("main.py", "import pygame\n")
    }

    #[tokio::test]
    async fn test_pass_is_case_insensitive_substring() {
        let llm = Arc::new(ScriptedLlm::new().push("Looks good.\nverdict: pass"));
        let v = LogicValidator::new(llm, LlmOptions::default(), &PromptSet::default());
        let outcome = v.validate(&artifact(), &DesignDocument::default()).await;
        assert!(outcome.is_pass());
    }

    #[tokio::test]
    async fn test_fail_carries_full_reply() {
        let reply = "FAIL: update() never moves the paddle";
        let llm = Arc::new(ScriptedLlm::new().push(reply));
        let v = LogicValidator::new(llm, LlmOptions::default(), &PromptSet::default());
        let outcome = v.validate(&artifact(), &DesignDocument::default()).await;
        assert_eq!(outcome.kind, OutcomeKind::LogicFail);
        assert_eq!(outcome.detail, reply);
    }

    #[tokio::test]
    async fn test_llm_error_text_is_a_fail() {
        let llm = Arc::new(ScriptedLlm::new().push_error(gamesmith_llm::LlmError::Http(
            "connection refused".to_string(),
        )));
        let v = LogicValidator::new(llm, LlmOptions::default(), &PromptSet::default());
        let outcome = v.validate(&artifact(), &DesignDocument::default()).await;
        assert_eq!(outcome.kind, OutcomeKind::LogicFail);
        assert!(outcome.detail.starts_with("LLM call error"));
    }

    #[tokio::test]
    async fn test_design_variant_sends_design() {
        let llm = Arc::new(ScriptedLlm::new().push("PASS"));
        let v = LogicValidator::with_design(llm.clone(), LlmOptions::default(), &PromptSet::default());
        v.validate(&artifact(), &DesignDocument::new("Breakout with two paddles"))
            .await;

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].user_prompt.contains("Breakout with two paddles"));
        assert!(calls[0].user_prompt.contains("import pygame"));
    }

    #[tokio::test]
    async fn test_plain_variant_omits_design() {
        let llm = Arc::new(ScriptedLlm::new().push("PASS"));
        let v = LogicValidator::new(llm.clone(), LlmOptions::default(), &PromptSet::default());
        v.validate(&artifact(), &DesignDocument::new("Breakout with two paddles"))
            .await;
        assert!(!llm.calls()[0].user_prompt.contains("Breakout"));
    }
}
