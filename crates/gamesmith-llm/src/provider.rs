//! Provider catalogue and per-provider connection settings.
//!
//! Every supported backend speaks the OpenAI chat-completions dialect, so a
//! provider boils down to a base URL, an API key variable and a default model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

const GOOGLE_DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Groq,
    Mistral,
    DeepSeek,
    Ollama,
    Google,
}

impl Provider {
    /// All providers, in the order the CLI lists them.
    pub const ALL: [Provider; 6] = [
        Provider::OpenAi,
        Provider::Groq,
        Provider::Mistral,
        Provider::Google,
        Provider::Ollama,
        Provider::DeepSeek,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Groq => "groq",
            Provider::Mistral => "mistral",
            Provider::DeepSeek => "deepseek",
            Provider::Ollama => "ollama",
            Provider::Google => "google",
        }
    }

    /// Name of the environment variable holding the API key.
    pub fn api_key_env(&self) -> String {
        format!("{}_API_KEY", self.as_str().to_uppercase())
    }

    /// Name of the environment variable holding the preferred model.
    pub fn model_env(&self) -> String {
        format!("{}_MODEL_NAME", self.as_str().to_uppercase())
    }

    /// Model used when neither the caller nor the environment names one.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Groq => "llama3-8b-8192",
            Provider::Mistral => "codestral-latest",
            Provider::DeepSeek => "deepseek-chat",
            Provider::Ollama => "llama3:8b",
            Provider::Google => GOOGLE_DEFAULT_MODEL,
        }
    }

    /// Ollama runs locally and accepts unauthenticated requests.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Ollama)
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::Mistral => "https://api.mistral.ai/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::Google => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "groq" => Ok(Provider::Groq),
            "mistral" => Ok(Provider::Mistral),
            "deepseek" => Ok(Provider::DeepSeek),
            "ollama" => Ok(Provider::Ollama),
            "google" | "gemini" => Ok(Provider::Google),
            other => Err(LlmError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Per-call generation options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmOptions {
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self::new(Provider::OpenAi, Provider::OpenAi.default_model())
    }
}

impl LlmOptions {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 8192,
        }
    }

    /// Options for `provider` with the model taken from `<PROVIDER>_MODEL_NAME`,
    /// falling back to the provider default.
    pub fn from_env(provider: Provider) -> Self {
        let model = std::env::var(provider.model_env())
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string());
        Self::new(provider, model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// The model actually sent on the wire.
    ///
    /// Google rejects OpenAI model names, so a `gpt*` model is swapped for the
    /// Google default.
    pub fn effective_model(&self) -> &str {
        if self.provider == Provider::Google && self.model.starts_with("gpt") {
            GOOGLE_DEFAULT_MODEL
        } else {
            &self.model
        }
    }
}

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ProviderSettings {
    /// Resolve settings from `<PROVIDER>_API_KEY` and, for Ollama, `OLLAMA_BASE_URL`.
    pub fn from_env(provider: Provider) -> Self {
        let base_url = match provider {
            Provider::Ollama => std::env::var("OLLAMA_BASE_URL")
                .unwrap_or_else(|_| provider.default_base_url().to_string()),
            _ => provider.default_base_url().to_string(),
        };
        Self {
            provider,
            base_url,
            api_key: std::env::var(provider.api_key_env())
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }

    /// Settings pointing at an explicit endpoint (tests, self-hosted gateways).
    pub fn new(provider: Provider, base_url: &str) -> Self {
        Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Fails when the provider needs a key and none is set.
    pub fn ensure_ready(&self) -> Result<(), LlmError> {
        if self.provider.requires_api_key() && self.api_key.is_none() {
            return Err(LlmError::MissingApiKey {
                env_var: self.provider.api_key_env(),
            });
        }
        Ok(())
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
