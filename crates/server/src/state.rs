// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use droidscope_core::llm::LlmProvider;
use droidscope_core::{
    ArtifactStore, CancelFlag, ExplorationAgent, PromptLibrary, Telemetry, UxAnalyzer,
};

use crate::config::AppConfig;
use crate::jobs::{ExplorationDriver, JobController, PhaseCell};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub config: AppConfig,
    /// Progress and log channels fed by the job worker.
    pub telemetry: Telemetry,
    /// The single exploration job slot.
    pub jobs: JobController,
    /// Artifacts of the most recent run.
    pub store: ArtifactStore,
}

impl AppState {
    /// Wire the job pipeline from its two external collaborators.
    pub fn new(
        config: AppConfig,
        agent: Arc<dyn ExplorationAgent>,
        llm: Arc<dyn LlmProvider>,
    ) -> Arc<Self> {
        let telemetry = Telemetry::new();
        let store = ArtifactStore::new(&config.artifact_dir);
        let prompts = match &config.prompts_dir {
            Some(dir) => PromptLibrary::with_dir(dir),
            None => PromptLibrary::builtin(),
        };
        let analyzer = Arc::new(UxAnalyzer::new(llm, prompts.clone(), store.clone()));
        let driver = ExplorationDriver::new(
            agent,
            analyzer,
            prompts,
            telemetry.clone(),
            CancelFlag::new(),
            Arc::new(PhaseCell::new()),
            config.job.clone(),
            config.llm.clone(),
        );

        Arc::new(Self {
            start_time: Instant::now(),
            jobs: JobController::new(driver),
            telemetry,
            store,
            config,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
