//! Pipeline configuration.
//!
//! Defaults match a stock deployment; a TOML file may override any subset of
//! keys, and `GAMESMITH_*` environment variables override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{CoreError, Result};
use crate::probe::DynamicProbe;
use crate::prompts::PromptSet;

pub const ENV_PYTHON: &str = "GAMESMITH_PYTHON";
pub const ENV_FUZZ_SECONDS: &str = "GAMESMITH_FUZZ_SECONDS";
pub const ENV_MAX_RETRIES: &str = "GAMESMITH_MAX_RETRIES";
pub const ENV_OUTPUT_DIR: &str = "GAMESMITH_OUTPUT_DIR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Repair cycles allowed before validation gives up.
    pub max_retries: u32,
    /// How long a program must survive the dynamic probe.
    pub fuzz_seconds: u64,
    /// Interpreter used for the syntax check, the probe and `play`.
    pub interpreter: String,
    pub static_check_timeout_secs: u64,
    pub output_dir: PathBuf,
    pub code_filename: String,
    /// Stimulus sidecar, written beside the code.
    pub stimulus_filename: String,
    /// Give the logic reviewer the design document as well as the code.
    pub review_includes_design: bool,
    pub prompts: PromptSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            fuzz_seconds: 30,
            interpreter: "python3".to_string(),
            static_check_timeout_secs: 20,
            output_dir: PathBuf::from("output"),
            code_filename: "main.py".to_string(),
            stimulus_filename: "fuzz_logic.py".to_string(),
            review_includes_design: false,
            prompts: PromptSet::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML file; keys it omits keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&text)?)
    }

    /// Apply `GAMESMITH_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(python) = get(ENV_PYTHON) {
            self.interpreter = python;
        }
        if let Some(secs) = get(ENV_FUZZ_SECONDS) {
            self.fuzz_seconds = parse_number(ENV_FUZZ_SECONDS, &secs)?;
        }
        if let Some(retries) = get(ENV_MAX_RETRIES) {
            self.max_retries = parse_number(ENV_MAX_RETRIES, &retries)?;
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    pub fn fuzz_timeout(&self) -> Duration {
        Duration::from_secs(self.fuzz_seconds)
    }

    pub fn static_check_timeout(&self) -> Duration {
        Duration::from_secs(self.static_check_timeout_secs)
    }

    /// Where generated code is written.
    pub fn code_path(&self) -> PathBuf {
        self.output_dir.join(&self.code_filename)
    }

    pub fn probe(&self) -> DynamicProbe {
        DynamicProbe::new(&self.interpreter, self.fuzz_timeout())
            .with_stimulus_filename(&self.stimulus_filename)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CoreError::Config(format!("{key} must be a non-negative integer, got {value:?}")))
}
