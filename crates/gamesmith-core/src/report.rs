//! Auditable record of one validation run.
//!
//! Persisted as `<dir>/<run_id>/validation.json` with a sha256 digest beside it
//! so a later read can detect tampering or truncation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{CheckKind, CoreError, RepairStrategy, Result, ValidationOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FinalState {
    Running,
    Succeeded,
    Exhausted,
    Aborted { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    /// 1-based; a new cycle starts after every repair.
    pub cycle: u32,
    pub check: CheckKind,
    pub outcome: ValidationOutcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairRecord {
    pub cycle: u32,
    pub strategy: RepairStrategy,
    pub produced_code: bool,
    /// Path of the new artifact, or why nothing was written.
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub run_id: String,
    pub artifact: PathBuf,
    pub budget: u32,
    pub repairs_used: u32,
    pub final_state: FinalState,
    pub checks: Vec<CheckRecord>,
    pub repairs: Vec<RepairRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ValidationReport {
    pub fn new(run_id: impl Into<String>, artifact: impl Into<PathBuf>, budget: u32) -> Self {
        Self {
            run_id: run_id.into(),
            artifact: artifact.into(),
            budget,
            repairs_used: 0,
            final_state: FinalState::Running,
            checks: Vec::new(),
            repairs: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self, state: FinalState) {
        self.final_state = state;
        self.finished_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        self.final_state == FinalState::Succeeded
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }
}

fn digest_of(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Persist `<dir>/<run_id>/validation.json` and `<dir>/<run_id>/validation.digest`.
pub fn write_validation_report(report: &ValidationReport, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(&report.run_id);
    std::fs::create_dir_all(&run_dir)?;

    let report_path = run_dir.join("validation.json");
    let digest_path = run_dir.join("validation.digest");
    let json = serde_json::to_vec_pretty(report)?;

    std::fs::write(&report_path, &json)?;
    std::fs::write(&digest_path, digest_of(&json).as_bytes())?;

    Ok(report_path)
}

/// Read `<dir>/<run_id>/validation.json` and verify it against its digest.
pub fn read_validation_report(run_id: &str, dir: &Path) -> Result<ValidationReport> {
    let run_dir = dir.join(run_id);
    let json = std::fs::read(run_dir.join("validation.json"))?;
    let expected = std::fs::read_to_string(run_dir.join("validation.digest"))?;
    let actual = digest_of(&json);
    if expected.trim() != actual {
        return Err(CoreError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }

    Ok(serde_json::from_slice(&json)?)
}
