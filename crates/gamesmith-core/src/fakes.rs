//! In-memory fakes for the orchestrator seams (testing only)
//!
//! `ScriptedValidator` replays queued outcomes and `RecordingRepairer` records
//! every repair request. Both are cheap to clone and clones share state, so a
//! test can hand one copy to the orchestrator and inspect the other.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{CheckKind, CodeArtifact, DesignDocument, RepairStrategy, ValidationOutcome};
use crate::repair::{RepairResult, Repairer};
use crate::validate::Validator;

/// Order in which checks ran, shared between validators.
#[derive(Debug, Clone, Default)]
pub struct CheckLog(Arc<Mutex<Vec<CheckKind>>>);

impl CheckLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, kind: CheckKind) {
        self.0.lock().unwrap().push(kind);
    }

    pub fn entries(&self) -> Vec<CheckKind> {
        self.0.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// ScriptedValidator
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ValidatorState {
    outcomes: VecDeque<ValidationOutcome>,
    seen: Vec<String>,
}

/// Validator that pops one queued outcome per call, then passes forever.
#[derive(Debug, Clone)]
pub struct ScriptedValidator {
    kind: CheckKind,
    state: Arc<Mutex<ValidatorState>>,
    log: Option<CheckLog>,
}

impl ScriptedValidator {
    pub fn new(kind: CheckKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(ValidatorState {
                outcomes: VecDeque::new(),
                seen: Vec::new(),
            })),
            log: None,
        }
    }

    pub fn push(self, outcome: ValidationOutcome) -> Self {
        self.state.lock().unwrap().outcomes.push_back(outcome);
        self
    }

    /// Queue `n` failures of this validator's kind.
    pub fn fail_times(self, n: usize, detail: &str) -> Self {
        for _ in 0..n {
            let outcome = ValidationOutcome {
                kind: self.kind.failure(),
                detail: detail.to_string(),
            };
            self.state.lock().unwrap().outcomes.push_back(outcome);
        }
        self
    }

    pub fn with_log(mut self, log: CheckLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().seen.len()
    }

    /// Source text of the artifact at each call, oldest first.
    pub fn seen_sources(&self) -> Vec<String> {
        self.state.lock().unwrap().seen.clone()
    }
}

#[async_trait]
impl Validator for ScriptedValidator {
    fn kind(&self) -> CheckKind {
        self.kind
    }

    async fn validate(&self, artifact: &CodeArtifact, _design: &DesignDocument) -> ValidationOutcome {
        if let Some(log) = &self.log {
            log.record(self.kind);
        }
        let mut state = self.state.lock().unwrap();
        state.seen.push(artifact.source.clone());
        state
            .outcomes
            .pop_front()
            .unwrap_or_else(|| ValidationOutcome::pass("scripted pass"))
    }
}

// ---------------------------------------------------------------------------
// RecordingRepairer
// ---------------------------------------------------------------------------

/// One recorded repair request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairCall {
    pub strategy: RepairStrategy,
    pub failure: ValidationOutcome,
    pub artifact: PathBuf,
    pub design: String,
}

#[derive(Debug, Default)]
struct RepairerState {
    results: VecDeque<RepairResult>,
    calls: Vec<RepairCall>,
}

/// Repairer that records requests and replays queued results.
///
/// With nothing queued it "repairs" by returning the artifact unchanged as a
/// replacement, with a revision comment appended.
#[derive(Debug, Clone, Default)]
pub struct RecordingRepairer {
    state: Arc<Mutex<RepairerState>>,
}

impl RecordingRepairer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(self, result: RepairResult) -> Self {
        self.state.lock().unwrap().results.push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<RepairCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl Repairer for RecordingRepairer {
    async fn repair(
        &self,
        artifact: &CodeArtifact,
        failure: &ValidationOutcome,
        strategy: RepairStrategy,
        design: &DesignDocument,
    ) -> RepairResult {
        let mut state = self.state.lock().unwrap();
        state.calls.push(RepairCall {
            strategy,
            failure: failure.clone(),
            artifact: artifact.path.clone(),
            design: design.as_str().to_string(),
        });
        let revision = state.calls.len();
        state.results.pop_front().unwrap_or_else(|| {
            RepairResult::Replaced(CodeArtifact::new(
                artifact.path.clone(),
                format!("{}\n# revision {revision}\n", artifact.source.trim_end()),
            ))
        })
    }
}
