//! Domain-level error taxonomy for gamesmith.
//!
//! Check failures (syntax, logic, runtime) are *values* carried by
//! `ValidationOutcome`, not errors. `CoreError` covers the remaining
//! conditions that end an operation at the caller-facing boundary.

/// gamesmith core errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("artifact not found: {0}")]
    ArtifactNotFound(std::path::PathBuf),

    #[error("no code block could be extracted from the model response")]
    EmptyExtraction,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("validation task failed: {0}")]
    Task(String),

    #[error("LLM error: {0}")]
    Llm(#[from] gamesmith_llm::LlmError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CoreError {
    fn from(err: toml::de::Error) -> Self {
        CoreError::Config(err.to_string())
    }
}

/// Result type for gamesmith core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_display() {
        let err = CoreError::ArtifactNotFound("output/main.py".into());
        assert!(err.to_string().contains("output/main.py"));

        let err = CoreError::EmptyExtraction;
        assert!(err.to_string().contains("no code block"));
    }

    #[test]
    fn test_digest_mismatch_error() {
        let err = CoreError::DigestMismatch {
            expected: "abc123".to_string(),
            actual: "def456".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
    }

    #[test]
    fn test_toml_error_becomes_config_error() {
        let err: CoreError = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(err.to_string().starts_with("invalid configuration"));
    }
}
