//! Error types for gamesmith-llm

use thiserror::Error;

/// Errors that can occur while calling a language model.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Provider name is not one of the supported backends
    #[error("unsupported provider '{0}'")]
    UnsupportedProvider(String),

    /// The provider needs an API key and none was configured
    #[error("missing API key: set {env_var}")]
    MissingApiKey { env_var: String },

    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not contain a completion
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Http(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_names_env_var() {
        let err = LlmError::MissingApiKey {
            env_var: "GROQ_API_KEY".to_string(),
        };
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_status_error_display() {
        let err = LlmError::Status {
            status: 429,
            body: "rate limited".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("rate limited"));
    }
}
