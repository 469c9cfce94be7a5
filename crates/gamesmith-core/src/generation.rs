//! Generation phase: idea -> design document -> code and stimulus on disk.
//!
//! Everything here feeds the validation loop; nothing here validates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gamesmith_llm::{call_llm, LlmClient, LlmOptions};
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::domain::{CoreError, DesignDocument, Result};
use crate::extract::save_code;
use crate::metrics::METRICS;
use crate::orchestrator::{start_validation, ValidationRun};
use crate::prompts::{render, PromptSet};

async fn ask(client: &dyn LlmClient, system: &str, user: &str, options: &LlmOptions) -> String {
    METRICS.inc_llm_calls();
    call_llm(client, system, user, options).await
}

/// Two chained calls: a concept brief, then the full design document built
/// from the idea and the brief.
pub async fn run_design_phase(
    client: &dyn LlmClient,
    idea: &str,
    options: &LlmOptions,
    prompts: &PromptSet,
) -> DesignDocument {
    info!(idea_chars = idea.len(), "drafting concept brief");
    let brief = ask(
        client,
        &prompts.concept_system,
        &render(&prompts.concept, &[("idea", idea)]),
        options,
    )
    .await;

    info!("writing design document");
    let design = ask(
        client,
        &prompts.design_system,
        &render(&prompts.design, &[("idea", idea), ("brief", brief.as_str())]),
        options,
    )
    .await;
    DesignDocument::new(design)
}

/// Geometric asset description as JSON text.
///
/// Returns the span from the first `{` to the last `}` of the reply, or the
/// whole reply when it holds no braces.
pub async fn generate_assets(
    client: &dyn LlmClient,
    design: &DesignDocument,
    options: &LlmOptions,
    prompts: &PromptSet,
) -> String {
    let reply = ask(
        client,
        &prompts.assets_system,
        &render(&prompts.assets, &[("gdd", design.as_str())]),
        options,
    )
    .await;
    json_object_span(&reply).unwrap_or(&reply).to_string()
}

fn json_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Raw programmer reply for the design and assets.
pub async fn generate_code(
    client: &dyn LlmClient,
    design: &DesignDocument,
    assets: &str,
    options: &LlmOptions,
    prompts: &PromptSet,
) -> String {
    ask(
        client,
        &prompts.programmer_system,
        &render(
            &prompts.programmer,
            &[("gdd", design.as_str()), ("assets", assets)],
        ),
        options,
    )
    .await
}

/// Raw reply holding a stimulus tailored to the design.
pub async fn generate_stimulus(
    client: &dyn LlmClient,
    design: &DesignDocument,
    options: &LlmOptions,
    prompts: &PromptSet,
) -> String {
    ask(
        client,
        &prompts.stimulus_system,
        &render(&prompts.stimulus, &[("gdd", design.as_str())]),
        options,
    )
    .await
}

/// Assets, then code, then the stimulus sidecar. Returns the code path.
///
/// Fails with [`CoreError::EmptyExtraction`] when the programmer reply holds
/// no code. A stimulus reply without code is only logged; the probe falls back
/// to its default stimulus.
pub async fn run_core_phase(
    client: &dyn LlmClient,
    design: &DesignDocument,
    config: &PipelineConfig,
    options: &LlmOptions,
) -> Result<PathBuf> {
    let prompts = &config.prompts;

    let assets = generate_assets(client, design, options, prompts).await;
    info!(assets_chars = assets.len(), "assets generated");

    let raw_code = generate_code(client, design, &assets, options, prompts).await;
    let code_path = save_code(&raw_code, &config.output_dir, &config.code_filename)
        .await?
        .ok_or(CoreError::EmptyExtraction)?;
    info!(path = %code_path.display(), "code saved");

    let raw_stimulus = generate_stimulus(client, design, options, prompts).await;
    match save_code(&raw_stimulus, &config.output_dir, &config.stimulus_filename).await? {
        Some(path) => info!(path = %path.display(), "stimulus saved"),
        None => {
            warn!("stimulus reply held no code; the default stimulus will be used");
            remove_stale_stimulus(&config.output_dir.join(&config.stimulus_filename)).await?;
        }
    }

    Ok(code_path)
}

/// A sidecar left by an earlier run would be picked up by the probe for this game.
async fn remove_stale_stimulus(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            info!(path = %path.display(), "removed stale stimulus");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// A generated game and its running validation.
pub struct PipelineRun {
    pub design: DesignDocument,
    pub code_path: PathBuf,
    pub validation: ValidationRun,
}

/// Idea to validated game: design, core, then the validate-and-repair loop.
pub async fn run_pipeline(
    client: Arc<dyn LlmClient>,
    idea: &str,
    options: LlmOptions,
    config: &PipelineConfig,
) -> Result<PipelineRun> {
    let design = run_design_phase(client.as_ref(), idea, &options, &config.prompts).await;
    let code_path = run_core_phase(client.as_ref(), &design, config, &options).await?;
    let validation = start_validation(
        client,
        design.clone(),
        code_path.clone(),
        options,
        config,
    );
    Ok(PipelineRun {
        design,
        code_path,
        validation,
    })
}
