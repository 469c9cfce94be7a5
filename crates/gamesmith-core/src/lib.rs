//! gamesmith core library
//!
//! Turns a model's reply into a runnable game and keeps it runnable: code
//! extraction, stimulus injection, a bounded fuzz probe, three validators and
//! an LLM repair engine, driven by the validate-and-repair orchestrator.

pub mod config;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod generation;
pub mod inject;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod probe;
pub mod prompts;
pub mod repair;
pub mod report;
pub mod telemetry;
pub mod validate;

pub use config::PipelineConfig;

pub use domain::{
    CheckKind, CodeArtifact, CoreError, DesignDocument, OutcomeKind, RepairStrategy, Result,
    ValidationEvent, ValidationOutcome, FAILURE_MARKER, SUCCESS_MARKER,
};

pub use extract::{extract, recover_truncated, save_code, Extraction, ExtractionSource};
pub use inject::{inject, DEFAULT_STIMULUS};
pub use probe::{launch, DynamicProbe, ProbeReport, ProbeVerdict};

pub use validate::{
    DynamicValidator, LogicValidator, StaticValidator, Validator, ValidatorChain, PASS_TOKEN,
};

pub use repair::{LlmRepairEngine, RepairResult, Repairer};

pub use orchestrator::{
    start_validation, LoopState, ValidationOrchestrator, ValidationRun, DEFAULT_RETRY_BUDGET,
};

pub use report::{read_validation_report, write_validation_report, FinalState, ValidationReport};

pub use generation::{
    generate_assets, generate_code, generate_stimulus, run_core_phase, run_design_phase,
    run_pipeline, PipelineRun,
};

pub use prompts::PromptSet;

/// gamesmith version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
