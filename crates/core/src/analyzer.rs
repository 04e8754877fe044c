// crates/core/src/analyzer.rs
//! UX analysis pipeline: exploration report → LLM → normalized document.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::analysis::{parse_analysis, strip_code_fence, ParsedAnalysis};
use crate::artifacts::{ArtifactError, ArtifactStore};
use crate::llm::{CompletionRequest, LlmError, LlmProvider};
use crate::normalize::normalize;
use crate::prompts::{PromptError, PromptLibrary};
use crate::telemetry::{LogType, Telemetry};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Report unavailable: {0}")]
    Report(#[from] ArtifactError),

    #[error("Report is empty")]
    EmptyReport,

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Malformed analysis response: {error}")]
    Malformed { error: String, snippet: String },
}

pub struct UxAnalyzer {
    provider: Arc<dyn LlmProvider>,
    prompts: PromptLibrary,
    store: ArtifactStore,
}

impl UxAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, prompts: PromptLibrary, store: ArtifactStore) -> Self {
        Self {
            provider,
            prompts,
            store,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Read an exploration report from an arbitrary path.
    pub async fn read_report(&self, path: &Path) -> Result<String, AnalysisError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ArtifactError::io(path, e))?;
        if content.trim().is_empty() {
            return Err(AnalysisError::EmptyReport);
        }
        tracing::info!(path = %path.display(), bytes = content.len(), "report loaded");
        Ok(content)
    }

    /// Ask the LLM for an analysis of `report` and parse the raw document.
    pub async fn analyze(&self, report: &str, category: &str) -> Result<Value, AnalysisError> {
        let prompt = self.prompts.load_and_format(
            "analysis_prompt",
            &[("report_content", report), ("category", category)],
        )?;
        tracing::info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            "analyzing UX with LLM"
        );
        // No JSON mode: some hosted models reject `response_format`.
        let response = self.provider.complete(CompletionRequest::user(prompt)).await?;

        match parse_analysis(&response.content) {
            ParsedAnalysis::Document(doc) => Ok(doc),
            ParsedAnalysis::Invalid { error, snippet } => {
                tracing::error!(error = %error, raw = %snippet, "analysis response is not valid JSON");
                Err(AnalysisError::Malformed { error, snippet })
            }
        }
    }

    /// Analyze, normalize and persist. Returns the normalized document.
    pub async fn analyze_and_save(
        &self,
        report: &str,
        app_name: &str,
        category: &str,
    ) -> Result<Value, AnalysisError> {
        let raw = self.analyze(report, category).await?;
        let document = normalize(seed_metadata(raw, app_name, category));
        self.store.write_analysis(&document).await?;
        Ok(document)
    }

    /// Analysis step of an exploration job. Reports progress from 75% to 95%
    /// and returns whether a normalized document was written.
    pub async fn run_for_job(&self, app_name: &str, category: &str, telemetry: &Telemetry) -> bool {
        telemetry.progress("Reading exploration report...", 75);
        let report = match self.read_report(&self.store.summary_path()).await {
            Ok(report) => report,
            Err(e) => {
                telemetry.log(format!("Analysis aborted: {e}"), LogType::Error);
                return false;
            }
        };

        telemetry.log("Analyzing UX with LLM", LogType::Info);
        telemetry.progress("Analyzing UX patterns with AI...", 80);
        let raw = match self.analyze(&report, category).await {
            Ok(raw) => raw,
            Err(AnalysisError::Malformed { error, snippet }) => {
                telemetry.log(
                    format!("Error parsing analysis response: {error}\nRaw response: {snippet}"),
                    LogType::Error,
                );
                return false;
            }
            Err(e) => {
                telemetry.log(format!("Error during analysis: {e}"), LogType::Error);
                return false;
            }
        };

        telemetry.progress("Normalizing analysis results...", 90);
        let document = normalize(seed_metadata(raw, app_name, category));
        match self.store.write_analysis(&document).await {
            Ok(path) => {
                telemetry.log(format!("Analysis saved: {}", path.display()), LogType::Info);
                telemetry.progress("UX analysis ready", 95);
                true
            }
            Err(e) => {
                telemetry.log(format!("Could not save analysis: {e}"), LogType::Error);
                false
            }
        }
    }

    /// Render an analysis document as a standalone HTML report via the LLM.
    pub async fn generate_html(&self, document: &Value) -> Result<String, AnalysisError> {
        let data = serde_json::to_string_pretty(document).unwrap_or_else(|_| document.to_string());
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let prompt = self.prompts.load_and_format(
            "html_generation_prompt",
            &[("analysis_data", &data), ("timestamp", &timestamp)],
        )?;
        let response = self.provider.complete(CompletionRequest::user(prompt)).await?;
        Ok(strip_code_fence(&response.content, "html").to_string())
    }
}

/// Fill `app_metadata.app_name`/`category` from the job when the model left
/// them out. Values the model supplied win.
fn seed_metadata(mut raw: Value, app_name: &str, category: &str) -> Value {
    if let Value::Object(map) = &mut raw {
        let meta = map
            .entry("app_metadata")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Value::Object(meta) = meta {
            meta.entry("app_name")
                .or_insert_with(|| Value::String(app_name.to_string()));
            meta.entry("category")
                .or_insert_with(|| Value::String(category.to_string()));
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionResponse;
    use crate::telemetry::ProgressEvent;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedProvider {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedProvider {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.prompts.lock().unwrap().push(request.user_prompt);
            Ok(CompletionResponse {
                content: self.reply.clone(),
                model: None,
                input_tokens: None,
                output_tokens: None,
                latency_ms: 1,
            })
        }

        fn name(&self) -> &str {
            "canned"
        }

        fn model(&self) -> &str {
            "canned-model"
        }
    }

    fn progress_values(telemetry: &Telemetry) -> Vec<i32> {
        std::iter::from_fn(|| telemetry.progress.try_pop())
            .map(|p: ProgressEvent| p.percentage)
            .collect()
    }

    #[tokio::test]
    async fn test_run_for_job_writes_normalized_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_summary("App: Clock\nSuccess: true").await.unwrap();

        let provider = CannedProvider::new("```json\n{\"summary\": \"Clean app\", \"consistency\": {\"inconsistent_labels\": 2}}\n```");
        let analyzer = UxAnalyzer::new(provider.clone(), PromptLibrary::builtin(), store.clone());
        let telemetry = Telemetry::new();

        assert!(analyzer.run_for_job("Clock", "Utility", &telemetry).await);

        let doc = store.load_analysis().await.unwrap();
        assert_eq!(doc["summary"], "Clean app");
        assert_eq!(doc["consistency"]["inconsistent_labels"], 2);
        assert_eq!(doc["consistency"]["inconsistent_icons"], 0);
        assert_eq!(doc["app_metadata"]["app_name"], "Clock");
        assert_eq!(doc["app_metadata"]["category"], "Utility");
        assert_eq!(progress_values(&telemetry), vec![75, 80, 90, 95]);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("App: Clock"));
    }

    #[tokio::test]
    async fn test_malformed_response_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_summary("App: Clock").await.unwrap();

        let analyzer = UxAnalyzer::new(
            CannedProvider::new("I could not analyze this app."),
            PromptLibrary::builtin(),
            store.clone(),
        );
        let telemetry = Telemetry::new();

        assert!(!analyzer.run_for_job("Clock", "Utility", &telemetry).await);
        assert!(matches!(
            store.load_analysis().await,
            Err(ArtifactError::NotFound { .. })
        ));
        let errors: Vec<_> = std::iter::from_fn(|| telemetry.logs.try_pop())
            .filter(|l| l.log_type == LogType::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("I could not analyze"));
    }

    #[tokio::test]
    async fn test_missing_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = UxAnalyzer::new(
            CannedProvider::new("{}"),
            PromptLibrary::builtin(),
            ArtifactStore::new(dir.path()),
        );
        assert!(!analyzer.run_for_job("Clock", "Utility", &Telemetry::new()).await);
    }

    #[tokio::test]
    async fn test_generate_html_strips_fence() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = UxAnalyzer::new(
            CannedProvider::new("```html\n<html><body>Report</body></html>\n```"),
            PromptLibrary::builtin(),
            ArtifactStore::new(dir.path()),
        );
        let html = analyzer.generate_html(&json!({"summary": "x"})).await.unwrap();
        assert_eq!(html, "<html><body>Report</body></html>");
    }

    #[tokio::test]
    async fn test_analysis_request_is_plain_chat() {
        use crate::llm::{LlmSettings, OpenAiCompatProvider};
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "```json\n{\"summary\": \"ok\"}\n```"}}]
            })))
            .mount(&server)
            .await;
        let provider = OpenAiCompatProvider::new(LlmSettings {
            api_base: format!("{}/v1", server.uri()),
            ..LlmSettings::default()
        })
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let analyzer = UxAnalyzer::new(
            Arc::new(provider),
            PromptLibrary::builtin(),
            ArtifactStore::new(dir.path()),
        );

        let doc = analyzer.analyze("App: Clock", "Utility").await.unwrap();
        assert_eq!(doc["summary"], "ok");

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("response_format").is_none());
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_blank_app_name_is_not_invented() {
        let dir = tempfile::tempdir().unwrap();
        let analyzer = UxAnalyzer::new(
            CannedProvider::new(r#"{"summary": "x"}"#),
            PromptLibrary::builtin(),
            ArtifactStore::new(dir.path()),
        );
        let doc = analyzer
            .analyze_and_save("App: Clock", "", "General")
            .await
            .unwrap();
        assert_eq!(doc["app_metadata"]["app_name"], "");
        assert_eq!(doc["app_metadata"]["category"], "General");
    }

    #[test]
    fn test_seed_metadata_keeps_model_values() {
        let seeded = seed_metadata(json!({"app_metadata": {"app_name": "Real"}}), "Job", "Games");
        assert_eq!(seeded["app_metadata"]["app_name"], "Real");
        assert_eq!(seeded["app_metadata"]["category"], "Games");
    }
}
