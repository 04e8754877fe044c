// crates/core/src/llm/factory.rs
//! Provider factory - creates an LlmProvider from configuration.

use std::sync::Arc;

use super::config::LlmSettings;
use super::openai::OpenAiCompatProvider;
use super::provider::LlmProvider;
use super::types::LlmError;

/// Create the analysis provider.
///
/// A missing API key is allowed (local endpoints rarely need one) but logged,
/// since hosted endpoints will reject every request.
pub fn create_provider(settings: &LlmSettings) -> Result<Arc<dyn LlmProvider>, LlmError> {
    if settings.api_key.is_none() {
        tracing::warn!(api_base = %settings.api_base, "API_KEY is not set, sending unauthenticated LLM requests");
    }
    Ok(Arc::new(OpenAiCompatProvider::new(settings.clone())?))
}
