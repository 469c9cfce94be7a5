//! Structured observability hooks for the validation lifecycle.
//!
//! - `validation_span`: span scoping log lines to one validation run
//! - `emit_*`: one `info!` event per lifecycle step, keyed by `event = "..."`

use std::path::Path;

use tracing::info;

use crate::domain::{CheckKind, OutcomeKind, RepairStrategy};

/// Span carrying the run id and artifact for every line logged during a run.
///
/// Async code attaches it with `tracing::Instrument`:
///
/// ```ignore
/// run_loop().instrument(validation_span(&run_id, &path)).await
/// ```
pub fn validation_span(run_id: &str, artifact: &Path) -> tracing::Span {
    tracing::info_span!(
        "gamesmith.validation",
        run_id = %run_id,
        artifact = %artifact.display()
    )
}

pub fn emit_validation_started(run_id: &str, artifact: &Path, budget: u32) {
    info!(
        event = "validation.started",
        run_id = %run_id,
        artifact = %artifact.display(),
        budget = budget,
    );
}

/// One check finished with the given verdict.
pub fn emit_check_completed(run_id: &str, check: CheckKind, verdict: OutcomeKind, duration_ms: u64) {
    info!(
        event = "validation.check",
        run_id = %run_id,
        check = %check,
        verdict = ?verdict,
        duration_ms = duration_ms,
    );
}

pub fn emit_repair_attempted(run_id: &str, strategy: RepairStrategy, produced_code: bool, remaining: u32) {
    info!(
        event = "validation.repair",
        run_id = %run_id,
        strategy = %strategy,
        produced_code = produced_code,
        remaining = remaining,
    );
}

pub fn emit_probe_finished(artifact: &Path, passed: bool, timed_out: bool, duration_ms: u64) {
    info!(
        event = "probe.finished",
        artifact = %artifact.display(),
        passed = passed,
        timed_out = timed_out,
        duration_ms = duration_ms,
    );
}

pub fn emit_validation_finished(run_id: &str, success: bool, repairs_used: u32, duration_ms: u64) {
    info!(
        event = "validation.finished",
        run_id = %run_id,
        success = success,
        repairs_used = repairs_used,
        duration_ms = duration_ms,
    );
}

/// The run was abandoned on an error outside the loop's own recovery.
pub fn emit_validation_aborted(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "validation.aborted", run_id = %run_id, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_span_create() {
        let span = validation_span("test-run", Path::new("output/main.py"));
        let _entered = span.enter();
        emit_validation_started("test-run", Path::new("output/main.py"), 3);
    }
}
