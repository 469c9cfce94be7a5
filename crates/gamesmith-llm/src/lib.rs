//! gamesmith-llm: the language-model capability used by the gamesmith pipeline.
//!
//! The pipeline only ever needs one operation, "turn a system prompt and a user
//! prompt into text". This crate provides it for every OpenAI-compatible
//! provider the pipeline supports, plus an error-as-text wrapper
//! ([`call_llm`]) and scripted fakes for tests.

pub mod client;
pub mod error;
pub mod fakes;
pub mod provider;

pub use client::{call_llm, parse_completion, HttpLlmClient, LlmClient, REQUEST_TIMEOUT};
pub use error::LlmError;
pub use provider::{LlmOptions, Provider, ProviderSettings};

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LlmError>;
