//! gamesmith - turn a game idea into a pygame program that runs
//!
//! ## Commands
//!
//! - `generate`: idea -> design -> code -> validate-and-repair
//! - `validate`: run the validate-and-repair loop over existing code
//! - `check`: syntax check only
//! - `fuzz`: dynamic probe only
//! - `extract`: pull code out of a saved model response
//! - `play`: launch a generated game

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use gamesmith_core::metrics::METRICS;
use gamesmith_core::validate::Validator;
use gamesmith_core::{
    launch, run_pipeline, save_code, start_validation, write_validation_report, CodeArtifact,
    DesignDocument, DynamicProbe, PipelineConfig, StaticValidator, ValidationReport, ValidationRun,
};
use gamesmith_llm::{HttpLlmClient, LlmClient, LlmOptions, Provider};
use tracing::{info, Level};

/// File the design document is saved under, beside the generated code.
const DESIGN_FILENAME: &str = "design.md";

#[derive(Parser)]
#[command(name = "gamesmith")]
#[command(author = "Gamesmith Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate pygame games with an LLM and keep them running", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Pipeline configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct LlmArgs {
    /// LLM provider (openai, groq, mistral, deepseek, ollama, google)
    #[arg(long, env = "GAMESMITH_PROVIDER", default_value = "openai")]
    provider: String,

    /// Model name (default: <PROVIDER>_MODEL_NAME, then the provider default)
    #[arg(long)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a game from an idea and validate it
    Generate {
        /// The game idea, in plain words
        #[arg(short, long)]
        idea: String,

        #[command(flatten)]
        llm: LlmArgs,

        /// Where the code, stimulus and design are written
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Directory for the validation report
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Validate (and repair) existing code against a design document
    Validate {
        /// Design document (markdown)
        #[arg(short, long)]
        design: PathBuf,

        /// Program to validate; repairs overwrite it
        #[arg(short, long)]
        artifact: PathBuf,

        #[command(flatten)]
        llm: LlmArgs,

        /// Directory for the validation report
        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Syntax-check a program
    Check {
        /// Program to check
        artifact: PathBuf,
    },

    /// Run a program under random input for a bounded time
    Fuzz {
        /// Program to probe
        artifact: PathBuf,

        /// Seconds the program must survive (default: from config)
        #[arg(short, long)]
        seconds: Option<u64>,
    },

    /// Extract code from a saved model response
    Extract {
        /// File holding the raw response
        response: PathBuf,

        /// Output directory (default: from config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output filename (default: from config)
        #[arg(short, long)]
        filename: Option<String>,
    },

    /// Launch a generated game
    Play {
        /// Program to run (default: <output_dir>/<code_filename>)
        artifact: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gamesmith_core::telemetry::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Generate {
            idea,
            llm,
            output_dir,
            report_dir,
        } => cmd_generate(&config, &idea, &llm, output_dir, report_dir.as_deref()).await,
        Commands::Validate {
            design,
            artifact,
            llm,
            report_dir,
        } => cmd_validate(&config, &design, &artifact, &llm, report_dir.as_deref()).await,
        Commands::Check { artifact } => cmd_check(&config, &artifact).await,
        Commands::Fuzz { artifact, seconds } => cmd_fuzz(&config, &artifact, seconds).await,
        Commands::Extract {
            response,
            output_dir,
            filename,
        } => cmd_extract(&config, &response, output_dir.as_deref(), filename.as_deref()).await,
        Commands::Play { artifact } => {
            let artifact = artifact.unwrap_or_else(|| config.code_path());
            cmd_play(&config, &artifact).await
        }
    };

    METRICS.flush();
    result
}

/// Defaults, then the TOML file, then `GAMESMITH_*` overrides.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => PipelineConfig::default(),
    };
    config
        .with_env_overrides()
        .context("Invalid GAMESMITH_* environment override")
}

fn llm_options(args: &LlmArgs) -> Result<LlmOptions> {
    let provider: Provider = args
        .provider
        .parse()
        .with_context(|| format!("Unknown provider: {}", args.provider))?;
    let mut options = LlmOptions::from_env(provider);
    if let Some(model) = &args.model {
        options.model = model.clone();
    }
    Ok(options)
}

fn llm_client() -> Result<Arc<dyn LlmClient>> {
    let client = HttpLlmClient::new().context("Failed to build LLM client")?;
    Ok(Arc::new(client))
}

/// Print every event line, persist the report, fail unless validation succeeded.
async fn stream_validation(mut run: ValidationRun, report_dir: Option<&Path>) -> Result<ValidationReport> {
    println!("Run ID: {}", run.run_id);
    while let Some(event) = run.next().await {
        println!("{}", event.to_line());
    }

    let report = run.finish().await.context("Validation task failed")?;
    if let Some(dir) = report_dir {
        let path = write_validation_report(&report, dir)
            .with_context(|| format!("Failed to write validation report to {:?}", dir))?;
        println!("Report: {}", path.display());
    }

    if !report.succeeded() {
        anyhow::bail!(
            "Validation did not succeed after {} repair(s)",
            report.repairs_used
        );
    }
    Ok(report)
}

/// Full pipeline: design, code, stimulus, then validation
async fn cmd_generate(
    config: &PipelineConfig,
    idea: &str,
    llm: &LlmArgs,
    output_dir: Option<PathBuf>,
    report_dir: Option<&Path>,
) -> Result<()> {
    let mut config = config.clone();
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    let options = llm_options(llm)?;
    info!(provider = %options.provider, model = %options.model, "starting pipeline");

    let pipeline = run_pipeline(llm_client()?, idea, options, &config)
        .await
        .context("Generation failed")?;

    let design_path = config.output_dir.join(DESIGN_FILENAME);
    tokio::fs::write(&design_path, pipeline.design.as_str())
        .await
        .with_context(|| format!("Failed to write design document to {:?}", design_path))?;
    println!("Design: {}", design_path.display());
    println!("Code: {}", pipeline.code_path.display());

    stream_validation(pipeline.validation, report_dir).await?;
    println!("\n✓ Game ready: {}", pipeline.code_path.display());
    Ok(())
}

/// Validate-and-repair an existing program
async fn cmd_validate(
    config: &PipelineConfig,
    design: &Path,
    artifact: &Path,
    llm: &LlmArgs,
    report_dir: Option<&Path>,
) -> Result<()> {
    let design = tokio::fs::read_to_string(design)
        .await
        .with_context(|| format!("Failed to read design document {:?}", design))?;
    let options = llm_options(llm)?;

    let run = start_validation(
        llm_client()?,
        DesignDocument::new(design),
        artifact.to_path_buf(),
        options,
        config,
    );
    stream_validation(run, report_dir).await?;
    Ok(())
}

async fn cmd_check(config: &PipelineConfig, artifact: &Path) -> Result<()> {
    let artifact = CodeArtifact::load(artifact)
        .await
        .with_context(|| format!("Failed to load {:?}", artifact))?;
    let validator = StaticValidator::new(&config.interpreter, config.static_check_timeout());
    let outcome = validator.validate(&artifact, &DesignDocument::default()).await;

    println!("{}", outcome.detail);
    if !outcome.is_pass() {
        anyhow::bail!("Syntax check failed for {:?}", artifact.path);
    }
    Ok(())
}

async fn cmd_fuzz(config: &PipelineConfig, artifact: &Path, seconds: Option<u64>) -> Result<()> {
    let timeout = Duration::from_secs(seconds.unwrap_or(config.fuzz_seconds));
    let probe = DynamicProbe::new(&config.interpreter, timeout)
        .with_stimulus_filename(&config.stimulus_filename);
    let report = probe.run(artifact).await;

    println!("{}", report.message);
    println!("Duration: {}ms", report.duration_ms);
    if !report.passed() {
        anyhow::bail!("Fuzz test failed for {:?}", artifact);
    }
    Ok(())
}

async fn cmd_extract(
    config: &PipelineConfig,
    response: &Path,
    output_dir: Option<&Path>,
    filename: Option<&str>,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(response)
        .await
        .with_context(|| format!("Failed to read response {:?}", response))?;
    let dir = output_dir.unwrap_or(config.output_dir.as_path());
    let filename = filename.unwrap_or(config.code_filename.as_str());

    match save_code(&raw, dir, filename).await? {
        Some(path) => {
            println!("Saved: {}", path.display());
            Ok(())
        }
        None => anyhow::bail!("No code block found in {:?}", response),
    }
}

async fn cmd_play(config: &PipelineConfig, artifact: &Path) -> Result<()> {
    println!("Launching {}", artifact.display());
    let status = launch(&config.interpreter, artifact)
        .await
        .with_context(|| format!("Failed to launch {:?}", artifact))?;
    if !status.success() {
        anyhow::bail!("Game exited with {}", status);
    }
    Ok(())
}
