// crates/server/src/jobs/controller.rs
//! Owner of the single job slot.

use std::sync::{Arc, Mutex, RwLock};

use droidscope_core::{LogType, PROGRESS_ABORTED};
use tokio::task::JoinHandle;

use super::driver::ExplorationDriver;
use super::types::{JobError, JobOutcome, JobPhase, JobRequest, JobStatus, StartError, StopError};

/// Starts, stops and reports on the one exploration job.
///
/// `start` performs its liveness check and the spawn under the same mutex,
/// so two concurrent starts can never both succeed.
pub struct JobController {
    driver: ExplorationDriver,
    handle: Mutex<Option<JoinHandle<()>>>,
    current: RwLock<Option<JobRequest>>,
}

impl JobController {
    pub fn new(driver: ExplorationDriver) -> Self {
        Self {
            driver,
            handle: Mutex::new(None),
            current: RwLock::new(None),
        }
    }

    /// Start a job on its own task and return immediately.
    pub fn start(&self, request: JobRequest) -> Result<(), StartError> {
        let mut slot = match self.handle.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            tracing::warn!(app_name = %request.app_name, "start rejected: job already running");
            return Err(StartError::AlreadyRunning);
        }

        self.driver.telemetry().clear();
        self.driver.cancel_flag().reset();
        self.driver.phase().set(JobPhase::Initializing);
        match self.current.write() {
            Ok(mut guard) => *guard = Some(request.clone()),
            Err(e) => tracing::error!("RwLock poisoned writing current job: {e}"),
        }

        tracing::info!(
            app_name = %request.app_name,
            category = %request.category,
            max_depth = request.max_depth,
            "starting exploration job"
        );
        *slot = Some(tokio::spawn(supervise(self.driver.clone(), request)));
        Ok(())
    }

    /// Ask the running job to stop at its next checkpoint.
    pub fn request_stop(&self) -> Result<(), StopError> {
        if !self.is_active() {
            return Err(StopError::NotRunning);
        }
        self.driver.cancel_flag().set();
        let telemetry = self.driver.telemetry();
        telemetry.log("Stop signal sent to agent", LogType::Warning);
        telemetry.progress("Agent stopping...", PROGRESS_ABORTED);
        tracing::info!("stop requested");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        match self.handle.lock() {
            Ok(slot) => slot.as_ref().is_some_and(|h| !h.is_finished()),
            Err(poisoned) => poisoned.into_inner().as_ref().is_some_and(|h| !h.is_finished()),
        }
    }

    pub fn status(&self) -> JobStatus {
        let current = match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading current job: {e}");
                None
            }
        };
        JobStatus {
            active: self.is_active(),
            phase: self.driver.phase().get(),
            app_name: current.as_ref().map(|r| r.app_name.clone()),
            category: current.as_ref().map(|r| r.category.clone()),
            max_depth: current.as_ref().map(|r| r.max_depth),
        }
    }
}

/// Run the driver on an inner task so a panic becomes a failed job rather
/// than a silently dead worker.
async fn supervise(driver: ExplorationDriver, request: JobRequest) {
    let worker = {
        let driver = driver.clone();
        tokio::spawn(async move { driver.run(request).await })
    };
    match worker.await {
        Ok(Ok(JobOutcome::Succeeded)) => tracing::info!("exploration job succeeded"),
        Ok(Ok(JobOutcome::Cancelled)) => tracing::info!("exploration job cancelled"),
        Ok(Err(e)) => tracing::error!(error = %e, "exploration job failed"),
        Err(join_err) => {
            let err = JobError::Panicked(join_err.to_string());
            tracing::error!(error = %err, "exploration job aborted");
            driver.phase().set(JobPhase::Failed);
            driver.report_failure(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use droidscope_core::llm::{
        CompletionRequest, CompletionResponse, LlmError, LlmProvider, LlmSettings,
    };
    use droidscope_core::{
        AgentError, AgentIo, AgentOutcome, AgentRequest, ArtifactStore, CancelFlag,
        ExplorationAgent, PromptLibrary, Telemetry, UxAnalyzer,
    };
    use std::time::Duration;
    use tokio::sync::Notify;

    use crate::config::JobSettings;
    use crate::jobs::PhaseCell;

    #[derive(Default)]
    struct Gate {
        started: Notify,
        release: Notify,
    }

    /// Agent that blocks until released, then reports success=false.
    struct GatedAgent {
        gate: Arc<Gate>,
    }

    #[async_trait]
    impl ExplorationAgent for GatedAgent {
        async fn run(&self, _req: AgentRequest, _io: &mut AgentIo) -> Result<AgentOutcome, AgentError> {
            self.gate.started.notify_one();
            self.gate.release.notified().await;
            Ok(AgentOutcome {
                success: false,
                reason: Some("released".into()),
                ..AgentOutcome::default()
            })
        }

        fn name(&self) -> &str {
            "gated"
        }
    }

    struct NoLlm;

    #[async_trait]
    impl LlmProvider for NoLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::NotAvailable("test".into()))
        }

        fn name(&self) -> &str {
            "none"
        }

        fn model(&self) -> &str {
            "none"
        }
    }

    fn controller(dir: &std::path::Path, gate: Arc<Gate>) -> JobController {
        let analyzer = UxAnalyzer::new(
            Arc::new(NoLlm),
            PromptLibrary::builtin(),
            ArtifactStore::new(dir),
        );
        JobController::new(ExplorationDriver::new(
            Arc::new(GatedAgent { gate }),
            Arc::new(analyzer),
            PromptLibrary::builtin(),
            Telemetry::new(),
            CancelFlag::new(),
            Arc::new(PhaseCell::new()),
            JobSettings {
                echo_agent_output: false,
                ..JobSettings::default()
            },
            LlmSettings::default(),
        ))
    }

    async fn wait_inactive(controller: &JobController) {
        for _ in 0..200 {
            if !controller.is_active() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job did not finish");
    }

    fn request() -> JobRequest {
        JobRequest::default()
    }

    #[tokio::test]
    async fn test_stop_without_job_fails() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(dir.path(), Arc::default());
        assert_eq!(controller.request_stop(), Err(StopError::NotRunning));
        assert!(controller.driver.telemetry().logs.is_empty());
        assert!(!controller.is_active());
        assert_eq!(controller.status().phase, JobPhase::Idle);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_active() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Gate::default());
        let controller = controller(dir.path(), gate.clone());

        controller.start(request()).unwrap();
        assert!(controller.is_active());
        assert_eq!(controller.start(request()), Err(StartError::AlreadyRunning));

        gate.release.notify_one();
        wait_inactive(&controller).await;
        assert_eq!(controller.status().phase, JobPhase::Failed);

        // Slot is free again once the job finished.
        controller.start(request()).unwrap();
        gate.release.notify_one();
        wait_inactive(&controller).await;
    }

    #[tokio::test]
    async fn test_stop_while_active_emits_one_warning_and_one_abort() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Gate::default());
        let controller = controller(dir.path(), gate.clone());
        controller.start(request()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), gate.started.notified())
            .await
            .expect("agent never started");
        let telemetry = controller.driver.telemetry().clone();
        let logs_before = telemetry.logs.len();
        let progress_before = telemetry.progress.len();

        controller.request_stop().unwrap();
        assert!(controller.driver.cancel_flag().is_set());
        assert_eq!(telemetry.logs.len(), logs_before + 1);
        assert_eq!(telemetry.progress.len(), progress_before + 1);

        let logs: Vec<_> = std::iter::from_fn(|| telemetry.logs.try_pop()).collect();
        let stop = logs.last().unwrap();
        assert_eq!(stop.log_type, LogType::Warning);
        assert_eq!(stop.message, "Stop signal sent to agent");
        let progress: Vec<_> = std::iter::from_fn(|| telemetry.progress.try_pop()).collect();
        assert_eq!(progress.last().unwrap().percentage, -1);

        gate.release.notify_one();
        wait_inactive(&controller).await;
        assert_eq!(controller.status().phase, JobPhase::Cancelled);
        assert!(!dir.path().join("agent_result.txt").exists());
    }

    #[tokio::test]
    async fn test_start_clears_stale_events_and_flag() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Gate::default());
        let controller = controller(dir.path(), gate.clone());
        let telemetry = controller.driver.telemetry().clone();
        telemetry.log("stale", LogType::Info);
        controller.driver.cancel_flag().set();

        controller.start(request()).unwrap();
        assert!(!controller.driver.cancel_flag().is_set());
        let status = controller.status();
        assert!(status.active);
        assert_eq!(status.app_name.as_deref(), Some("Unknown App"));
        assert_eq!(status.max_depth, Some(6));

        gate.release.notify_one();
        wait_inactive(&controller).await;
        let logs: Vec<_> = std::iter::from_fn(|| telemetry.logs.try_pop()).collect();
        assert!(logs.iter().all(|l| l.message != "stale"));
    }
}
