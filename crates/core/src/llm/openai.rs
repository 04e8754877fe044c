// crates/core/src/llm/openai.rs
//! Provider for OpenAI-compatible `/chat/completions` endpoints
//! (OpenRouter, vLLM, Ollama's OpenAI shim, ...).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::config::LlmSettings;
use super::provider::LlmProvider;
use super::types::{CompletionRequest, CompletionResponse, LlmError};
use crate::analysis::snippet;

pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    settings: LlmSettings,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

impl OpenAiCompatProvider {
    pub fn new(settings: LlmSettings) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let start = Instant::now();

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &request.user_prompt });

        let body = ChatRequest {
            model: &self.settings.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        tracing::info!(
            model = %self.settings.model,
            endpoint = %self.endpoint(),
            prompt_len = request.user_prompt.len(),
            "LLM complete(): sending request"
        );

        let mut builder = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::error!(elapsed_ms = start.elapsed().as_millis() as u64, "LLM complete(): timed out");
                LlmError::Timeout(self.settings.timeout_secs)
            } else {
                tracing::error!(error = %e, "LLM complete(): request failed");
                LlmError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %snippet(&body, 500), "LLM complete(): non-success status");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseFailed(format!("Invalid completion payload: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ParseFailed("completion has no choices".into()))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        tracing::info!(latency_ms, content_len = content.len(), "LLM complete(): response received");

        Ok(CompletionResponse {
            content,
            model: parsed.model,
            input_tokens: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
            output_tokens: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
            latency_ms,
        })
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base: &str) -> LlmSettings {
        LlmSettings {
            api_key: Some("sk-test".into()),
            model: "test-model".into(),
            api_base: format!("{base}/v1/"),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "test-model",
                "choices": [{"message": {"role": "assistant", "content": "{\"summary\":\"ok\"}"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 5}
            })))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(settings(&server.uri())).unwrap();
        let resp = provider.complete(CompletionRequest::user("analyze")).await.unwrap();
        assert_eq!(resp.content, "{\"summary\":\"ok\"}");
        assert_eq!(resp.input_tokens, Some(12));
        assert_eq!(resp.output_tokens, Some(5));
        assert_eq!(resp.model.as_deref(), Some("test-model"));
    }

    #[tokio::test]
    async fn test_error_status_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(settings(&server.uri())).unwrap();
        let err = provider.complete(CompletionRequest::user("x")).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, ref body } if body == "invalid key"));
    }

    #[tokio::test]
    async fn test_rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(settings(&server.uri())).unwrap();
        let err = provider.complete(CompletionRequest::user("x")).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn test_empty_choices_is_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let provider = OpenAiCompatProvider::new(settings(&server.uri())).unwrap();
        let err = provider.complete(CompletionRequest::user("x")).await.unwrap_err();
        assert!(matches!(err, LlmError::ParseFailed(_)));
    }
}
