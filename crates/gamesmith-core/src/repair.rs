//! LLM-driven repair of a failing artifact.
//!
//! A repair that yields no usable code is not an error: the old artifact stays
//! live and the caller still spends a retry on it.

use std::sync::Arc;

use async_trait::async_trait;
use gamesmith_llm::{call_llm, LlmClient, LlmOptions};
use tracing::{info, warn};

use crate::domain::{CodeArtifact, DesignDocument, RepairStrategy, ValidationOutcome};
use crate::extract::save_code;
use crate::metrics::METRICS;
use crate::prompts::{render, PromptSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairResult {
    /// New code was written; this is the artifact to validate next.
    Replaced(CodeArtifact),
    /// Nothing usable came back; keep the current artifact.
    Unchanged { reason: String },
}

#[async_trait]
pub trait Repairer: Send + Sync {
    async fn repair(
        &self,
        artifact: &CodeArtifact,
        failure: &ValidationOutcome,
        strategy: RepairStrategy,
        design: &DesignDocument,
    ) -> RepairResult;
}

pub struct LlmRepairEngine {
    client: Arc<dyn LlmClient>,
    options: LlmOptions,
    prompts: PromptSet,
}

impl LlmRepairEngine {
    /// Repaired code overwrites the artifact file in place.
    pub fn new(client: Arc<dyn LlmClient>, options: LlmOptions, prompts: PromptSet) -> Self {
        Self {
            client,
            options,
            prompts,
        }
    }

    fn prompt_for(
        &self,
        artifact: &CodeArtifact,
        failure: &ValidationOutcome,
        strategy: RepairStrategy,
        design: &DesignDocument,
    ) -> (&str, String) {
        let (system, template) = match strategy {
            RepairStrategy::Syntax => (&self.prompts.syntax_fix_system, &self.prompts.syntax_fix),
            RepairStrategy::Logic => (&self.prompts.logic_fix_system, &self.prompts.logic_fix),
        };
        let mut vars = vec![
            ("code", artifact.source.as_str()),
            ("error", failure.detail.as_str()),
        ];
        if strategy.needs_design() {
            vars.push(("gdd", design.as_str()));
        }
        (system.as_str(), render(template, &vars))
    }
}

#[async_trait]
impl Repairer for LlmRepairEngine {
    async fn repair(
        &self,
        artifact: &CodeArtifact,
        failure: &ValidationOutcome,
        strategy: RepairStrategy,
        design: &DesignDocument,
    ) -> RepairResult {
        METRICS.inc_repairs();
        let (system, prompt) = self.prompt_for(artifact, failure, strategy, design);

        METRICS.inc_llm_calls();
        let reply = call_llm(self.client.as_ref(), system, &prompt, &self.options).await;

        let saved = match save_code(&reply, artifact.dir(), &artifact.file_name()).await {
            Ok(saved) => saved,
            Err(err) => {
                warn!(error = %err, "failed to write repaired code");
                return RepairResult::Unchanged {
                    reason: format!("could not write repaired code: {err}"),
                };
            }
        };

        let Some(path) = saved else {
            METRICS.inc_empty_repairs();
            return RepairResult::Unchanged {
                reason: format!("no code in reply: {}", preview(&reply)),
            };
        };

        match CodeArtifact::load(&path).await {
            Ok(repaired) => {
                info!(%strategy, path = %path.display(), "artifact replaced");
                RepairResult::Replaced(repaired)
            }
            Err(err) => RepairResult::Unchanged {
                reason: format!("could not reload repaired code: {err}"),
            },
        }
    }
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 200;
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > LIMIT {
        format!("{}...", flat.chars().take(LIMIT).collect::<String>())
    } else {
        flat
    }
}
