//! The validate-and-repair loop.
//!
//! States run `Check(Syntax) -> Check(Logic) -> Check(Dynamic) -> Success`.
//! Any failing check moves to `Repair`, and every repair restarts at
//! `Check(Syntax)` because a behavioural fix can break the syntax. Each repair
//! spends one unit of the retry budget, whether or not it produced code; the
//! loop ends in `Exhausted` once the budget is gone.
//!
//! Events are delivered over a channel of capacity one, so the loop never runs
//! more than one step ahead of its consumer. Dropping the consumer stops the
//! loop at its next step.
//!
//! The orchestrator assumes it is the only writer of the artifact file. Callers
//! must not run two validations over the same path at once.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::{FutureExt, Stream};
use gamesmith_llm::{LlmClient, LlmOptions};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::domain::{
    CheckKind, CodeArtifact, CoreError, DesignDocument, RepairStrategy, Result, ValidationEvent,
    ValidationOutcome,
};
use crate::metrics::METRICS;
use crate::obs;
use crate::repair::{LlmRepairEngine, RepairResult, Repairer};
use crate::report::{CheckRecord, FinalState, RepairRecord, ValidationReport};
use crate::validate::{DynamicValidator, LogicValidator, StaticValidator, ValidatorChain};

/// Budget used when none is configured.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    Check(CheckKind),
    Repair {
        strategy: RepairStrategy,
        failure: ValidationOutcome,
    },
    Success,
    Exhausted {
        last_failure: Option<ValidationOutcome>,
    },
}

impl LoopState {
    pub const INITIAL: LoopState = LoopState::Check(CheckKind::Syntax);

    /// Next state once `check` produced `outcome`, with `remaining` retries left.
    pub fn after_check(check: CheckKind, outcome: ValidationOutcome, remaining: u32) -> LoopState {
        match outcome.repair_strategy() {
            None => match check {
                CheckKind::Syntax => LoopState::Check(CheckKind::Logic),
                CheckKind::Logic => LoopState::Check(CheckKind::Dynamic),
                CheckKind::Dynamic => LoopState::Success,
            },
            Some(_) if remaining == 0 => LoopState::Exhausted {
                last_failure: Some(outcome),
            },
            Some(strategy) => LoopState::Repair {
                strategy,
                failure: outcome,
            },
        }
    }

    /// Next state once a repair for `failure` left `remaining` retries.
    pub fn after_repair(failure: ValidationOutcome, remaining: u32) -> LoopState {
        if remaining == 0 {
            LoopState::Exhausted {
                last_failure: Some(failure),
            }
        } else {
            LoopState::INITIAL
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Success | LoopState::Exhausted { .. })
    }
}

pub struct ValidationOrchestrator {
    validators: ValidatorChain,
    repairer: Box<dyn Repairer>,
    budget: u32,
}

impl ValidationOrchestrator {
    pub fn new(validators: ValidatorChain, repairer: Box<dyn Repairer>) -> Self {
        Self {
            validators,
            repairer,
            budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn with_budget(mut self, budget: u32) -> Self {
        self.budget = budget;
        self
    }

    /// The production wiring: interpreter-backed syntax check, LLM review,
    /// dynamic probe and LLM repair, all configured from `config`.
    pub fn from_config(client: Arc<dyn LlmClient>, options: LlmOptions, config: &PipelineConfig) -> Self {
        let logic = if config.review_includes_design {
            LogicValidator::with_design(client.clone(), options.clone(), &config.prompts)
        } else {
            LogicValidator::new(client.clone(), options.clone(), &config.prompts)
        };
        let validators = ValidatorChain::new(
            Box::new(StaticValidator::new(
                &config.interpreter,
                config.static_check_timeout(),
            )),
            Box::new(logic),
            Box::new(DynamicValidator::new(config.probe())),
        );
        let repairer = LlmRepairEngine::new(client, options, config.prompts.clone());
        Self::new(validators, Box::new(repairer)).with_budget(config.max_retries)
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Spawn the loop for the artifact at `artifact_path` and return its event stream.
    pub fn start(self: Arc<Self>, design: DesignDocument, artifact_path: PathBuf) -> ValidationRun {
        let run_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(1);
        let span = obs::validation_span(&run_id, &artifact_path);

        let task_run_id = run_id.clone();
        let handle = tokio::spawn(
            async move {
                let abort_tx = tx.clone();
                let fallback = ValidationReport::new(&task_run_id, &artifact_path, self.budget);
                let run = self.run_path(task_run_id.clone(), design, artifact_path, tx);
                match AssertUnwindSafe(run).catch_unwind().await {
                    Ok(report) => report,
                    Err(_) => {
                        let message = "validation task panicked".to_string();
                        obs::emit_validation_aborted(&task_run_id, &message);
                        let _ = abort_tx
                            .send(ValidationEvent::Aborted {
                                message: message.clone(),
                            })
                            .await;
                        let mut report = fallback;
                        report.finish(FinalState::Aborted { message });
                        report
                    }
                }
            }
            .instrument(span),
        );

        ValidationRun {
            run_id,
            events: rx,
            handle,
        }
    }

    async fn run_path(
        &self,
        run_id: String,
        design: DesignDocument,
        artifact_path: PathBuf,
        tx: mpsc::Sender<ValidationEvent>,
    ) -> ValidationReport {
        match CodeArtifact::load(&artifact_path).await {
            Ok(artifact) => self.run(&run_id, &design, artifact, &tx).await,
            Err(err) => {
                obs::emit_validation_aborted(&run_id, &err);
                let message = err.to_string();
                let _ = tx
                    .send(ValidationEvent::Aborted {
                        message: message.clone(),
                    })
                    .await;
                let mut report = ValidationReport::new(&run_id, &artifact_path, self.budget);
                report.finish(FinalState::Aborted { message });
                report
            }
        }
    }

    /// Drive the state machine to a terminal state, emitting one event per step.
    pub async fn run(
        &self,
        run_id: &str,
        design: &DesignDocument,
        artifact: CodeArtifact,
        tx: &mpsc::Sender<ValidationEvent>,
    ) -> ValidationReport {
        let mut report = ValidationReport::new(run_id, &artifact.path, self.budget);
        let mut artifact = artifact;
        let mut remaining = self.budget;
        let mut cycle = 1u32;
        let mut state = LoopState::INITIAL;

        obs::emit_validation_started(run_id, &artifact.path, self.budget);
        let started = ValidationEvent::Started {
            artifact: artifact.path.clone(),
            budget: self.budget,
        };
        if tx.send(started).await.is_err() {
            return consumer_gone(report);
        }

        loop {
            let (event, next) = match state {
                LoopState::Check(check) => {
                    let clock = Instant::now();
                    METRICS.inc_checks();
                    let outcome = self.validators.get(check).validate(&artifact, design).await;
                    let duration_ms = clock.elapsed().as_millis() as u64;

                    obs::emit_check_completed(run_id, check, outcome.kind, duration_ms);
                    report.checks.push(CheckRecord {
                        cycle,
                        check,
                        outcome: outcome.clone(),
                        duration_ms,
                    });

                    let event = if outcome.is_pass() {
                        ValidationEvent::CheckPassed {
                            check,
                            detail: outcome.detail.clone(),
                        }
                    } else {
                        ValidationEvent::CheckFailed {
                            check,
                            detail: outcome.detail.clone(),
                        }
                    };
                    (event, LoopState::after_check(check, outcome, remaining))
                }

                LoopState::Repair { strategy, failure } => {
                    let result = self
                        .repairer
                        .repair(&artifact, &failure, strategy, design)
                        .await;
                    remaining = remaining.saturating_sub(1);
                    report.repairs_used += 1;

                    let event = match result {
                        RepairResult::Replaced(repaired) => {
                            obs::emit_repair_attempted(run_id, strategy, true, remaining);
                            report.repairs.push(RepairRecord {
                                cycle,
                                strategy,
                                produced_code: true,
                                detail: repaired.path.display().to_string(),
                            });
                            artifact = repaired;
                            ValidationEvent::Repaired {
                                strategy,
                                artifact: artifact.path.clone(),
                                remaining,
                            }
                        }
                        RepairResult::Unchanged { reason } => {
                            obs::emit_repair_attempted(run_id, strategy, false, remaining);
                            warn!(%strategy, %reason, "repair produced no code; keeping current artifact");
                            report.repairs.push(RepairRecord {
                                cycle,
                                strategy,
                                produced_code: false,
                                detail: reason.clone(),
                            });
                            ValidationEvent::RepairSkipped {
                                strategy,
                                reason,
                                remaining,
                            }
                        }
                    };
                    cycle += 1;
                    (event, LoopState::after_repair(failure, remaining))
                }

                LoopState::Success => {
                    report.finish(FinalState::Succeeded);
                    obs::emit_validation_finished(run_id, true, report.repairs_used, report.duration_ms());
                    let _ = tx
                        .send(ValidationEvent::Succeeded {
                            repairs_used: report.repairs_used,
                        })
                        .await;
                    return report;
                }

                LoopState::Exhausted { last_failure } => {
                    report.finish(FinalState::Exhausted);
                    obs::emit_validation_finished(run_id, false, report.repairs_used, report.duration_ms());
                    let _ = tx.send(ValidationEvent::Exhausted { last_failure }).await;
                    return report;
                }
            };

            if tx.send(event).await.is_err() {
                return consumer_gone(report);
            }
            state = next;
        }
    }
}

fn consumer_gone(mut report: ValidationReport) -> ValidationReport {
    warn!(run_id = %report.run_id, "event consumer dropped; stopping validation");
    report.finish(FinalState::Aborted {
        message: "event consumer dropped".to_string(),
    });
    report
}

/// A running validation: a stream of events plus the eventual report.
///
/// The stream ends after the terminal event.
pub struct ValidationRun {
    pub run_id: String,
    events: mpsc::Receiver<ValidationEvent>,
    handle: JoinHandle<ValidationReport>,
}

impl ValidationRun {
    /// Drain any events not yet consumed and return the report.
    pub async fn finish(mut self) -> Result<ValidationReport> {
        while self.events.recv().await.is_some() {}
        self.handle
            .await
            .map_err(|err| CoreError::Task(err.to_string()))
    }
}

impl Stream for ValidationRun {
    type Item = ValidationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Validate the artifact at `artifact_path` with the production wiring.
pub fn start_validation(
    client: Arc<dyn LlmClient>,
    design: DesignDocument,
    artifact_path: PathBuf,
    options: LlmOptions,
    config: &PipelineConfig,
) -> ValidationRun {
    Arc::new(ValidationOrchestrator::from_config(client, options, config)).start(design, artifact_path)
}
