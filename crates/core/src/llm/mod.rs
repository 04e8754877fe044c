// crates/core/src/llm/mod.rs
//! LLM integration for UX analysis.
//!
//! Provides the `LlmProvider` trait and an implementation that talks to any
//! OpenAI-compatible chat completions endpoint.

pub mod config;
pub mod factory;
pub mod openai;
pub mod provider;
pub mod types;

pub use config::LlmSettings;
pub use factory::create_provider;
pub use openai::OpenAiCompatProvider;
pub use provider::LlmProvider;
pub use types::{CompletionRequest, CompletionResponse, LlmError};
