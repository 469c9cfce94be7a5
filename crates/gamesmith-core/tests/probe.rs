use std::path::Path;
use std::process::Command;
use std::time::Duration;

use gamesmith_core::inject::{inject, RANDOM_ALIAS};
use gamesmith_core::probe::probe_path;
use gamesmith_core::{DynamicProbe, ProbeVerdict, DEFAULT_STIMULUS};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn short_probe() -> DynamicProbe {
    DynamicProbe::new("python3", Duration::from_secs(2))
}

// ---------------------------------------------------------------------------
// Injection
// ---------------------------------------------------------------------------

#[test]
fn injection_only_adds_lines() {
    let program = "import pygame\n\ndef main():\n    while True:\n        pygame.event.pump()\n\nmain()\n";
    let injected = inject(program, DEFAULT_STIMULUS);

    let mut remaining = injected.lines();
    for line in program.lines() {
        assert!(
            remaining.any(|l| l == line),
            "original line {line:?} missing or reordered"
        );
    }
    assert!(injected.contains(RANDOM_ALIAS));
}

#[test]
fn injection_into_loopless_program_is_identity() {
    let program = "print('no loop here')\n";
    assert_eq!(inject(program, DEFAULT_STIMULUS), program);
}

// ---------------------------------------------------------------------------
// Probe runs against a real interpreter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn endless_loop_survives_the_deadline() {
    if !python_available() {
        eprintln!("python3 not found; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let artifact = write(dir.path(), "main.py", "while True:\n    pass\n");

    let report = short_probe().run(&artifact).await;
    assert_eq!(report.verdict, ProbeVerdict::Survived);
    assert!(report.passed());
    assert!(!probe_path(&artifact).exists());
}

#[tokio::test]
async fn clean_exit_passes() {
    if !python_available() {
        eprintln!("python3 not found; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let artifact = write(dir.path(), "main.py", "print('done')\n");

    let report = short_probe().run(&artifact).await;
    assert_eq!(report.verdict, ProbeVerdict::Exited);
    assert!(report.passed());
}

#[tokio::test]
async fn silent_non_zero_exit_is_a_crash() {
    if !python_available() {
        eprintln!("python3 not found; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let artifact = write(dir.path(), "main.py", "import sys\nsys.exit(3)\n");

    let report = short_probe().run(&artifact).await;
    assert_eq!(report.verdict, ProbeVerdict::Crashed);
    assert!(report.message.contains("exit 3"));
    assert!(report.message.contains("no error output"));
}

#[tokio::test]
async fn exception_reports_the_traceback() {
    if !python_available() {
        eprintln!("python3 not found; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let artifact = write(
        dir.path(),
        "main.py",
        "import sys\nprint('noise', file=sys.stderr)\nraise ValueError('boom')\n",
    );

    let report = short_probe().run(&artifact).await;
    assert_eq!(report.verdict, ProbeVerdict::Crashed);
    assert!(report.message.starts_with("runtime error (crashed, exit 1): Traceback"));
    assert!(report.message.contains("ValueError: boom"));
    assert!(!report.message.contains("noise"));
    assert!(!probe_path(&artifact).exists());
}

#[tokio::test]
async fn sidecar_stimulus_runs_inside_the_loop() {
    if !python_available() {
        eprintln!("python3 not found; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    // Binding `pygame` opens the injected guard without the real library.
    let artifact = write(dir.path(), "main.py", "pygame = None\nwhile True:\n    pass\n");
    write(
        dir.path(),
        "fuzz_logic.py",
        "import random\nif random.random() >= 0.0:\n    raise SystemExit(7)\n",
    );

    let report = short_probe().run(&artifact).await;
    assert_eq!(report.verdict, ProbeVerdict::Crashed);
    assert!(report.message.contains("exit 7"));
}

#[tokio::test]
async fn stimulus_errors_are_swallowed() {
    if !python_available() {
        eprintln!("python3 not found; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let artifact = write(
        dir.path(),
        "main.py",
        "pygame = None\nticks = 0\nwhile ticks < 1000:\n    ticks += 1\n",
    );
    write(dir.path(), "fuzz_logic.py", "pygame.event.post(None)\n");

    let report = short_probe().run(&artifact).await;
    assert_eq!(report.verdict, ProbeVerdict::Exited);
}
