//! In-memory fakes for the LLM capability (testing only)
//!
//! `ScriptedLlm` replays a queue of canned responses and records every call so
//! tests can assert on prompt routing without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::LlmClient;
use crate::error::LlmError;
use crate::provider::LlmOptions;
use crate::Result;

/// One recorded `complete` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub options: LlmOptions,
}

/// Scripted model: pops one queued response per call.
///
/// When the queue is empty the fallback text is returned if one is set,
/// otherwise the call fails with `MalformedResponse`.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String>>>,
    fallback: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response.into()));
        self
    }

    pub fn push_error(self, err: LlmError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    /// Snapshot of every call made so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &LlmOptions,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            options: options.clone(),
        });

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| LlmError::MalformedResponse("script exhausted".to_string())),
        }
    }
}
