//! Chat-completion client and the error-as-text call wrapper.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::provider::{LlmOptions, Provider, ProviderSettings};
use crate::Result;

/// Upper bound on one completion request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// A language model that turns a system + user prompt into text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str, options: &LlmOptions)
        -> Result<String>;
}

/// Call the model and fold any failure into the returned text.
///
/// Downstream consumers cannot tell an error description from a real answer by
/// type; a syntax check or code extraction run against the error text simply
/// fails, which is how the pipeline notices.
pub async fn call_llm(
    client: &dyn LlmClient,
    system_prompt: &str,
    user_prompt: &str,
    options: &LlmOptions,
) -> String {
    match client.complete(system_prompt, user_prompt, options).await {
        Ok(text) => text,
        Err(err) => {
            warn!(provider = %options.provider, model = %options.model, error = %err, "LLM call failed");
            format!("LLM call error ({}): {}", options.provider, err)
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract `choices[0].message.content` from a chat-completions body.
pub fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| LlmError::MalformedResponse("response has no message content".to_string()))
}

/// OpenAI-compatible HTTP client covering every [`Provider`].
pub struct HttpLlmClient {
    http: reqwest::Client,
    overrides: HashMap<Provider, ProviderSettings>,
}

impl HttpLlmClient {
    /// Create a client whose provider settings are resolved from the environment per call.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gamesmith/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            overrides: HashMap::new(),
        })
    }

    /// Pin the settings for one provider instead of reading the environment.
    pub fn with_settings(mut self, settings: ProviderSettings) -> Self {
        self.overrides.insert(settings.provider, settings);
        self
    }

    fn settings_for(&self, provider: Provider) -> ProviderSettings {
        self.overrides
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderSettings::from_env(provider))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &LlmOptions,
    ) -> Result<String> {
        let settings = self.settings_for(options.provider);
        settings.ensure_ready()?;

        let request = ChatRequest {
            model: options.effective_model(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        debug!(
            provider = %options.provider,
            model = %request.model,
            prompt_chars = user_prompt.len(),
            "sending chat completion"
        );

        let mut builder = self.http.post(settings.completions_url()).json(&request);
        if let Some(key) = &settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_completion(&body)
    }
}
