// crates/core/src/llm/provider.rs
//! LlmProvider trait defining the interface for LLM integrations.

use async_trait::async_trait;

use super::types::{CompletionRequest, CompletionResponse, LlmError};

/// Text-in, text-out completion backend used by the UX analyzer.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run a completion with an optional system prompt and a user prompt.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Provider name for logging/display (e.g. "openai-compatible").
    fn name(&self) -> &str;

    /// Model identifier (e.g. "mistralai/devstral-2512:free").
    fn model(&self) -> &str;
}
