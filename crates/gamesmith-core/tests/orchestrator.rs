use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use gamesmith_core::fakes::{CheckLog, RecordingRepairer, ScriptedValidator};
use gamesmith_core::report::FinalState;
use gamesmith_core::{
    read_validation_report, write_validation_report, CheckKind, CodeArtifact, DesignDocument,
    RepairResult, RepairStrategy, ValidationEvent, ValidationOrchestrator, ValidationOutcome,
    ValidationReport, ValidationRun, ValidatorChain, FAILURE_MARKER, SUCCESS_MARKER,
};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    syntax: ScriptedValidator,
    logic: ScriptedValidator,
    dynamic: ScriptedValidator,
    repairer: RecordingRepairer,
    log: CheckLog,
}

impl Harness {
    fn new() -> Self {
        let log = CheckLog::new();
        Self {
            syntax: ScriptedValidator::new(CheckKind::Syntax).with_log(log.clone()),
            logic: ScriptedValidator::new(CheckKind::Logic).with_log(log.clone()),
            dynamic: ScriptedValidator::new(CheckKind::Dynamic).with_log(log.clone()),
            repairer: RecordingRepairer::new(),
            log,
        }
    }

    fn orchestrator(&self, budget: u32) -> ValidationOrchestrator {
        let chain = ValidatorChain::new(
            Box::new(self.syntax.clone()),
            Box::new(self.logic.clone()),
            Box::new(self.dynamic.clone()),
        );
        ValidationOrchestrator::new(chain, Box::new(self.repairer.clone())).with_budget(budget)
    }
}

fn artifact_in(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("main.py");
    std::fs::write(&path, "import pygame\nprint('game')\n").unwrap();
    path
}

fn design() -> DesignDocument {
    DesignDocument::new("# Paddle\nMove left and right.")
}

async fn drain(mut run: ValidationRun) -> (Vec<ValidationEvent>, ValidationReport) {
    let mut events = Vec::new();
    while let Some(event) = run.next().await {
        events.push(event);
    }
    let report = run.finish().await.expect("validation task");
    (events, report)
}

async fn run_with(harness: &Harness, budget: u32) -> (Vec<ValidationEvent>, ValidationReport) {
    let dir = tempfile::tempdir().unwrap();
    let path = artifact_in(&dir);
    let run = Arc::new(harness.orchestrator(budget)).start(design(), path);
    drain(run).await
}

fn last_line(events: &[ValidationEvent]) -> String {
    events.last().expect("at least one event").to_line()
}

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_artifact_passes_all_checks_without_repair() {
    let harness = Harness::new();
    let (events, report) = run_with(&harness, 3).await;

    assert!(matches!(events[0], ValidationEvent::Started { budget: 3, .. }));
    assert_eq!(events.len(), 5);
    assert!(last_line(&events).starts_with(SUCCESS_MARKER));
    assert_eq!(
        harness.log.entries(),
        vec![CheckKind::Syntax, CheckKind::Logic, CheckKind::Dynamic]
    );
    assert_eq!(harness.repairer.call_count(), 0);
    assert!(report.succeeded());
    assert_eq!(report.repairs_used, 0);
}

#[tokio::test]
async fn one_syntax_repair_then_success() {
    let harness = Harness::new();
    let harness = Harness {
        syntax: harness.syntax.fail_times(1, "SyntaxError: '(' was never closed"),
        ..harness
    };
    let (events, report) = run_with(&harness, 3).await;

    let kinds: Vec<&str> = events
        .iter()
        .map(|e| match e {
            ValidationEvent::Started { .. } => "started",
            ValidationEvent::CheckPassed { .. } => "pass",
            ValidationEvent::CheckFailed { .. } => "fail",
            ValidationEvent::Repaired { .. } => "repaired",
            ValidationEvent::RepairSkipped { .. } => "skipped",
            ValidationEvent::Succeeded { .. } => "succeeded",
            ValidationEvent::Exhausted { .. } => "exhausted",
            ValidationEvent::Aborted { .. } => "aborted",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["started", "fail", "repaired", "pass", "pass", "pass", "succeeded"]
    );
    assert_eq!(
        events.last(),
        Some(&ValidationEvent::Succeeded { repairs_used: 1 })
    );
    assert!(last_line(&events).starts_with(SUCCESS_MARKER));

    let calls = harness.repairer.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].strategy, RepairStrategy::Syntax);
    assert_eq!(calls[0].failure.detail, "SyntaxError: '(' was never closed");

    assert_eq!(report.repairs_used, 1);
    assert_eq!(report.checks.len(), 4);
    assert_eq!(report.checks[1].cycle, 2);
}

#[tokio::test]
async fn repaired_source_is_what_the_next_check_sees() {
    let harness = Harness::new();
    let harness = Harness {
        syntax: harness.syntax.fail_times(1, "SyntaxError"),
        ..harness
    };
    run_with(&harness, 3).await;

    let seen = harness.syntax.seen_sources();
    assert_eq!(seen.len(), 2);
    assert!(!seen[0].contains("# revision 1"));
    assert!(seen[1].contains("# revision 1"));
    assert_eq!(harness.logic.seen_sources()[0], seen[1]);
}

// ---------------------------------------------------------------------------
// Repair routing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logic_failure_restarts_from_syntax() {
    let harness = Harness::new();
    let harness = Harness {
        logic: harness.logic.fail_times(1, "FAIL: the paddle never moves"),
        ..harness
    };
    let (_, report) = run_with(&harness, 3).await;

    assert_eq!(
        harness.log.entries(),
        vec![
            CheckKind::Syntax,
            CheckKind::Logic,
            CheckKind::Syntax,
            CheckKind::Logic,
            CheckKind::Dynamic,
        ]
    );
    let calls = harness.repairer.calls();
    assert_eq!(calls[0].strategy, RepairStrategy::Logic);
    assert_eq!(calls[0].design, design().as_str());
    assert!(report.succeeded());
}

#[tokio::test]
async fn runtime_failure_is_repaired_as_logic() {
    let harness = Harness::new();
    let harness = Harness {
        dynamic: harness
            .dynamic
            .push(ValidationOutcome::runtime_fail("runtime error (crashed, exit 1): Traceback")),
        ..harness
    };
    let (_, report) = run_with(&harness, 3).await;

    let calls = harness.repairer.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].strategy, RepairStrategy::Logic);
    assert!(calls[0].failure.detail.contains("Traceback"));
    assert!(report.succeeded());
}

#[tokio::test]
async fn empty_repair_still_spends_budget() {
    let harness = Harness::new();
    let harness = Harness {
        syntax: harness.syntax.fail_times(1, "SyntaxError"),
        repairer: harness.repairer.push(RepairResult::Unchanged {
            reason: "no code in reply: sorry".to_string(),
        }),
        ..harness
    };
    let (events, report) = run_with(&harness, 3).await;

    assert!(events.iter().any(|e| matches!(
        e,
        ValidationEvent::RepairSkipped { remaining: 2, .. }
    )));
    let seen = harness.syntax.seen_sources();
    assert_eq!(seen[0], seen[1]);
    assert_eq!(report.repairs_used, 1);
    assert!(!report.repairs[0].produced_code);
    assert!(report.succeeded());
}

// ---------------------------------------------------------------------------
// Exhaustion and aborts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn persistent_syntax_failure_exhausts_budget() {
    let harness = Harness::new();
    let harness = Harness {
        syntax: harness.syntax.fail_times(3, "SyntaxError"),
        ..harness
    };
    let (events, report) = run_with(&harness, 3).await;

    assert_eq!(harness.repairer.call_count(), 3);
    assert_eq!(harness.log.entries(), vec![CheckKind::Syntax; 3]);
    assert!(last_line(&events).starts_with(FAILURE_MARKER));
    match events.last() {
        Some(ValidationEvent::Exhausted { last_failure }) => {
            assert_eq!(last_failure.as_ref().map(|f| f.detail.as_str()), Some("SyntaxError"));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
    assert_eq!(report.final_state, FinalState::Exhausted);
    assert_eq!(report.repairs_used, 3);
}

#[tokio::test]
async fn zero_budget_fails_without_repair() {
    let harness = Harness::new();
    let harness = Harness {
        syntax: harness.syntax.fail_times(1, "SyntaxError"),
        ..harness
    };
    let (events, report) = run_with(&harness, 0).await;

    assert_eq!(harness.repairer.call_count(), 0);
    assert!(matches!(events.last(), Some(ValidationEvent::Exhausted { .. })));
    assert_eq!(report.repairs_used, 0);
}

#[tokio::test]
async fn missing_artifact_aborts_with_failure_line() {
    let harness = Harness::new();
    let dir = tempfile::tempdir().unwrap();
    let run = Arc::new(harness.orchestrator(3)).start(design(), dir.path().join("absent.py"));
    let (events, report) = drain(run).await;

    assert_eq!(events.len(), 1);
    assert!(events[0].to_line().starts_with(FAILURE_MARKER));
    assert!(matches!(report.final_state, FinalState::Aborted { .. }));
    assert!(harness.log.entries().is_empty());
}

#[tokio::test]
async fn dropped_consumer_stops_the_loop() {
    let harness = Harness::new();
    let harness = Harness {
        syntax: harness.syntax.fail_times(3, "SyntaxError"),
        ..harness
    };
    let orchestrator = harness.orchestrator(3);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let artifact = CodeArtifact::new("main.py", "x = (");
    let report = orchestrator.run("run-dropped", &design(), artifact, &tx).await;

    assert_eq!(
        report.final_state,
        FinalState::Aborted {
            message: "event consumer dropped".to_string()
        }
    );
    assert_eq!(harness.syntax.call_count(), 0);
    assert_eq!(harness.repairer.call_count(), 0);
}

#[tokio::test]
async fn report_survives_persistence() {
    let harness = Harness::new();
    let harness = Harness {
        dynamic: harness.dynamic.fail_times(1, "runtime error"),
        ..harness
    };
    let (_, report) = run_with(&harness, 2).await;

    let dir = tempfile::tempdir().unwrap();
    write_validation_report(&report, dir.path()).unwrap();
    let loaded = read_validation_report(&report.run_id, dir.path()).unwrap();
    assert_eq!(loaded, report);
    assert_eq!(loaded.repairs.len(), 1);
}
