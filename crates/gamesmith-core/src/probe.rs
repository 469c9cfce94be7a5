//! Dynamic probe: run the artifact with injected stimulus for a bounded time.
//!
//! Surviving until the deadline is a pass. Exiting early is a pass when the
//! exit status is zero and a crash otherwise. Nothing here returns an error:
//! setup problems come back as a failed [`ProbeReport`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::domain::{CoreError, Result};
use crate::inject::{inject, DEFAULT_STIMULUS};
use crate::metrics::METRICS;
use crate::obs;

/// Marker at which captured error output starts being interesting.
pub const TRACEBACK_MARKER: &str = "Traceback";

/// How a probe run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeVerdict {
    /// Still running at the deadline; killed.
    Survived,
    /// Exited on its own with status zero.
    Exited,
    /// Exited on its own with a non-zero status.
    Crashed,
    /// The probe could not be prepared or launched.
    SetupFailed,
}

impl ProbeVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, ProbeVerdict::Survived | ProbeVerdict::Exited)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub verdict: ProbeVerdict,
    pub message: String,
    pub duration_ms: u64,
}

impl ProbeReport {
    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }
}

/// Launches artifacts under the interpreter with stimulus spliced in.
#[derive(Debug, Clone)]
pub struct DynamicProbe {
    pub interpreter: String,
    pub timeout: Duration,
    /// Sidecar file, next to the artifact, holding a custom stimulus.
    pub stimulus_filename: String,
}

impl Default for DynamicProbe {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout: Duration::from_secs(30),
            stimulus_filename: "fuzz_logic.py".to_string(),
        }
    }
}

impl DynamicProbe {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
            ..Self::default()
        }
    }

    pub fn with_stimulus_filename(mut self, filename: impl Into<String>) -> Self {
        self.stimulus_filename = filename.into();
        self
    }

    /// Probe the program at `artifact`.
    pub async fn run(&self, artifact: &Path) -> ProbeReport {
        let started = Instant::now();
        METRICS.inc_probes();

        let (verdict, message) = match self.try_run(artifact).await {
            Ok(result) => result,
            Err(err) => {
                warn!(artifact = %artifact.display(), error = %err, "probe setup failed");
                (
                    ProbeVerdict::SetupFailed,
                    format!("fuzz test failed to run: {err}"),
                )
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_probe_finished(
            artifact,
            verdict.passed(),
            verdict == ProbeVerdict::Survived,
            duration_ms,
        );
        ProbeReport {
            verdict,
            message,
            duration_ms,
        }
    }

    async fn try_run(&self, artifact: &Path) -> std::io::Result<(ProbeVerdict, String)> {
        let program = tokio::fs::read_to_string(artifact).await?;
        let stimulus = self.load_stimulus(artifact).await;
        let temp = TempProbeFile::create(probe_path(artifact), &inject(&program, &stimulus)).await?;

        debug!(
            temp = %temp.path.display(),
            timeout_secs = self.timeout.as_secs(),
            "launching probe"
        );

        let child = Command::new(&self.interpreter)
            .arg(&temp.path)
            .env("SDL_AUDIODRIVER", "dummy")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // On timeout the wait future is dropped with the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Ok((
                    ProbeVerdict::Survived,
                    format!(
                        "fuzz test passed (survived random input for {}s)",
                        self.timeout.as_secs()
                    ),
                ))
            }
        };

        if output.status.success() {
            return Ok((
                ProbeVerdict::Exited,
                "fuzz test passed (program exited normally)".to_string(),
            ));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = trim_to_traceback(&stderr);
        let code = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let detail = if detail.is_empty() {
            "no error output".to_string()
        } else {
            detail.to_string()
        };
        Ok((
            ProbeVerdict::Crashed,
            format!("runtime error (crashed, exit {code}): {detail}"),
        ))
    }

    /// Sidecar stimulus when present and readable, otherwise the default.
    async fn load_stimulus(&self, artifact: &Path) -> String {
        let dir = artifact.parent().unwrap_or_else(|| Path::new("."));
        let sidecar = dir.join(&self.stimulus_filename);
        match tokio::fs::read_to_string(&sidecar).await {
            Ok(text) => {
                debug!(sidecar = %sidecar.display(), "using sidecar stimulus");
                text
            }
            Err(_) => DEFAULT_STIMULUS.to_string(),
        }
    }
}

/// `<stem>_fuzz_temp.<ext>` beside the artifact.
pub fn probe_path(artifact: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let name = match artifact.extension() {
        Some(ext) => format!("{stem}_fuzz_temp.{}", ext.to_string_lossy()),
        None => format!("{stem}_fuzz_temp"),
    };
    artifact.with_file_name(name)
}

/// Error output from the first traceback on, or all of it when there is none.
pub fn trim_to_traceback(stderr: &str) -> &str {
    let text = match stderr.find(TRACEBACK_MARKER) {
        Some(idx) => &stderr[idx..],
        None => stderr,
    };
    text.trim()
}

/// Play the game: run it with the terminal attached until it exits.
pub async fn launch(interpreter: &str, artifact: &Path) -> Result<std::process::ExitStatus> {
    if tokio::fs::metadata(artifact).await.is_err() {
        return Err(CoreError::ArtifactNotFound(artifact.to_path_buf()));
    }
    debug!(artifact = %artifact.display(), %interpreter, "launching game");
    let status = Command::new(interpreter).arg(artifact).status().await?;
    Ok(status)
}

/// Probe source on disk, removed when dropped.
struct TempProbeFile {
    path: PathBuf,
}

impl TempProbeFile {
    async fn create(path: PathBuf, contents: &str) -> std::io::Result<Self> {
        let guard = Self { path };
        tokio::fs::write(&guard.path, contents).await?;
        Ok(guard)
    }
}

impl Drop for TempProbeFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove probe file");
            }
        }
    }
}
