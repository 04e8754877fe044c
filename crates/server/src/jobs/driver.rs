// crates/server/src/jobs/driver.rs
//! The exploration job state machine.
//!
//! `Initializing → ConfiguringAgent → Running → Finalizing → {Succeeded,
//! Cancelled, Failed}`. The cancellation flag is checked at every phase
//! boundary; once it is seen set the job stops with no further side effects.

use std::sync::Arc;

use droidscope_core::llm::LlmSettings;
use droidscope_core::{
    AgentIo, AgentOutcome, AgentRequest, CancelFlag, ExplorationAgent, LogType,
    OutputReinterleaver, OutputSink, PromptLibrary, Telemetry, UxAnalyzer, PROGRESS_ABORTED,
    PROGRESS_DONE, STEPS_PER_DEPTH,
};

use super::types::{JobError, JobOutcome, JobPhase, JobRequest, PhaseCell};
use crate::config::JobSettings;

const SEPARATOR_WIDTH: usize = 50;
const BANNER_WIDTH: usize = 60;

/// Everything a job needs, shared between runs.
#[derive(Clone)]
pub struct ExplorationDriver {
    agent: Arc<dyn ExplorationAgent>,
    analyzer: Arc<UxAnalyzer>,
    prompts: PromptLibrary,
    telemetry: Telemetry,
    cancel: CancelFlag,
    phase: Arc<PhaseCell>,
    settings: JobSettings,
    llm: LlmSettings,
}

impl ExplorationDriver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: Arc<dyn ExplorationAgent>,
        analyzer: Arc<UxAnalyzer>,
        prompts: PromptLibrary,
        telemetry: Telemetry,
        cancel: CancelFlag,
        phase: Arc<PhaseCell>,
        settings: JobSettings,
        llm: LlmSettings,
    ) -> Self {
        Self {
            agent,
            analyzer,
            prompts,
            telemetry,
            cancel,
            phase,
            settings,
            llm,
        }
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    pub fn phase(&self) -> &Arc<PhaseCell> {
        &self.phase
    }

    /// Run one job to its terminal phase. Failures are reported on the
    /// telemetry channels before being returned.
    pub async fn run(&self, request: JobRequest) -> Result<JobOutcome, JobError> {
        let result = self.explore(&request).await;
        match &result {
            Ok(JobOutcome::Succeeded) => {
                self.phase.set(JobPhase::Succeeded);
                self.telemetry.log("Exploration complete", LogType::Success);
                self.telemetry
                    .progress("Test completed successfully!", PROGRESS_DONE);
            }
            Ok(JobOutcome::Cancelled) => {}
            Err(e) => {
                self.phase.set(JobPhase::Failed);
                self.report_failure(e);
            }
        }
        result
    }

    /// Terminal telemetry for a failed job. Step failures log their own
    /// error line first; every failure then ends the log stream with a
    /// `Critical error` line.
    pub fn report_failure(&self, err: &JobError) {
        let detail = match err {
            JobError::Agent(inner) => inner.to_string(),
            _ => err.to_string(),
        };
        if matches!(
            err,
            JobError::Agent(_) | JobError::ExplorationFailed { .. } | JobError::AnalysisFailed
        ) {
            self.telemetry.log(err.to_string(), LogType::Error);
        }
        let progress = match err {
            JobError::ExplorationFailed { .. } => err.to_string(),
            _ => format!("Error during exploration: {detail}"),
        };
        self.telemetry
            .log_terminal(format!("Critical error: {detail}"), LogType::Error);
        self.telemetry.progress(progress, PROGRESS_ABORTED);
    }

    /// True if the job was cancelled; the `Cancelled` transition and its
    /// telemetry happen here.
    fn checkpoint(&self) -> bool {
        if !self.cancel.is_set() {
            return false;
        }
        self.phase.set(JobPhase::Cancelled);
        self.telemetry
            .log_terminal("Agent execution stopped by user", LogType::Warning);
        self.telemetry
            .progress("Agent execution stopped", PROGRESS_ABORTED);
        tracing::info!(phase = self.phase.get().as_str(), "job cancelled at checkpoint");
        true
    }

    async fn explore(&self, request: &JobRequest) -> Result<JobOutcome, JobError> {
        let telemetry = &self.telemetry;

        if self.checkpoint() {
            return Ok(JobOutcome::Cancelled);
        }
        self.phase.set(JobPhase::Initializing);
        telemetry.log(
            format!("Initializing exploration for {}", request.app_name),
            LogType::Info,
        );
        telemetry.progress("Starting exploration...", 5);
        telemetry.progress("Loading exploration parameters...", 15);

        if self.checkpoint() {
            return Ok(JobOutcome::Cancelled);
        }
        self.phase.set(JobPhase::ConfiguringAgent);
        let goal = self.build_goal(request)?;
        telemetry.log(
            format!(
                "Agent goal configured for {} app with depth={}",
                request.category, request.max_depth
            ),
            LogType::Info,
        );
        telemetry.progress(
            format!("Initializing exploration agent for {}...", request.app_name),
            20,
        );
        telemetry.log(format!("LLM configured: {}", self.llm.model), LogType::Info);
        let max_steps = request.max_depth.saturating_mul(STEPS_PER_DEPTH);
        telemetry.log(format!("Max steps set to {max_steps}"), LogType::Info);
        telemetry.progress("Creating exploration agent...", 25);

        if self.checkpoint() {
            return Ok(JobOutcome::Cancelled);
        }
        self.phase.set(JobPhase::Running);
        telemetry.progress(
            format!("Started UX exploration of {}...", request.app_name),
            30,
        );
        telemetry.log(
            format!(
                "Beginning autonomous exploration (max depth: {})",
                request.max_depth
            ),
            LogType::Info,
        );
        let banner = "=".repeat(BANNER_WIDTH);
        telemetry.log(banner.clone(), LogType::Info);
        telemetry.log("AGENT EXECUTION - Live Reasoning & Actions", LogType::Info);
        telemetry.log(banner, LogType::Info);

        let agent_request = AgentRequest {
            app_name: request.app_name.clone(),
            category: request.category.clone(),
            goal,
            max_steps,
            llm: self.llm.clone(),
        };
        let mut io = self.agent_io();
        let result = self.agent.run(agent_request, &mut io).await;
        io.flush();
        drop(io);
        let outcome = result?;
        telemetry.log(format!("Agent {} finished", self.agent.name()), LogType::Info);

        if self.checkpoint() {
            return Ok(JobOutcome::Cancelled);
        }
        self.phase.set(JobPhase::Finalizing);
        telemetry.progress("Exploration finished. Processing results...", 60);
        self.write_summary(request, &outcome).await?;
        telemetry.progress("Results saved. Starting UX analysis...", 70);

        if !outcome.success {
            let reason = outcome
                .reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(JobError::ExplorationFailed { reason });
        }

        if self.checkpoint() {
            return Ok(JobOutcome::Cancelled);
        }
        telemetry.log("Starting UX analysis pipeline", LogType::Info);
        if !self
            .analyzer
            .run_for_job(&request.app_name, &request.category, telemetry)
            .await
        {
            return Err(JobError::AnalysisFailed);
        }
        Ok(JobOutcome::Succeeded)
    }

    fn build_goal(&self, request: &JobRequest) -> Result<String, JobError> {
        let goal = self.prompts.load_and_format(
            "agent_goal",
            &[
                ("app_name", request.app_name.as_str()),
                ("category", request.category.as_str()),
            ],
        )?;
        Ok(format!(
            "{goal}\n\n## EXPLORATION CONSTRAINTS:\n\
             - Maximum navigation depth: {depth} levels\n\
             - Focus on features and flows typical of {category} apps\n\
             - Document both positive UX patterns and issues\n\
             - Be specific with screen names, tap counts, and locations",
            depth = request.max_depth,
            category = request.category,
        ))
    }

    fn agent_io(&self) -> AgentIo {
        let (out, err): (OutputSink, OutputSink) = if self.settings.echo_agent_output {
            (Box::new(std::io::stdout()), Box::new(std::io::stderr()))
        } else {
            (Box::new(std::io::sink()), Box::new(std::io::sink()))
        };
        AgentIo {
            narration: OutputReinterleaver::new(
                out,
                self.telemetry.clone(),
                LogType::Agent,
                self.settings.narration_threshold,
            ),
            diagnostics: OutputReinterleaver::new(
                err,
                self.telemetry.clone(),
                LogType::Warning,
                self.settings.diagnostic_threshold,
            ),
        }
    }

    /// Write `agent_result.txt`, plus `exploration_output.json` when the
    /// agent produced structured output. Only the summary write is fatal.
    async fn write_summary(
        &self,
        request: &JobRequest,
        outcome: &AgentOutcome,
    ) -> Result<(), JobError> {
        let telemetry = &self.telemetry;
        let store = self.analyzer.store();
        let separator = "-".repeat(SEPARATOR_WIDTH);
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        telemetry.log(
            format!("Exploration success status: {}", outcome.success),
            if outcome.success {
                LogType::Success
            } else {
                LogType::Warning
            },
        );

        let mut lines = vec![
            format!("Timestamp: {timestamp}"),
            format!("App: {}", request.app_name),
            format!("Category: {}", request.category),
            format!("Max Depth: {}", request.max_depth),
            format!("Success: {}", outcome.success),
            separator.clone(),
        ];

        if let Some(answer) = outcome.final_answer.as_deref().filter(|a| !a.trim().is_empty()) {
            telemetry.log("Final answer captured from agent", LogType::Info);
            lines.push(format!("Final Answer:\n{answer}"));
            lines.push(separator.clone());
        }

        if let Some(structured) = outcome.structured_output.as_ref().filter(|v| !v.is_null()) {
            match serde_json::to_string_pretty(structured) {
                Ok(json) => {
                    lines.push(format!("Structured Output:\n{json}"));
                    match store.write_structured_output(&json).await {
                        Ok(path) => {
                            telemetry.log(
                                format!("Structured output saved: {}", path.display()),
                                LogType::Info,
                            );
                            lines.push(separator.clone());
                            lines.push(format!("Structured output saved to: {}", path.display()));
                        }
                        Err(e) => {
                            telemetry.log(
                                format!("Error saving structured output: {e}"),
                                LogType::Error,
                            );
                            lines.push(format!("Error saving structured output: {e}"));
                        }
                    }
                }
                Err(e) => {
                    telemetry.log(
                        format!("Error serializing structured output: {e}"),
                        LogType::Error,
                    );
                    lines.push(format!("Error serializing structured output: {e}"));
                }
            }
        }

        if let Some(reason) = outcome.reason.as_deref().filter(|r| !r.trim().is_empty()) {
            lines.push(format!("Reason: {reason}"));
        }

        let path = store.write_summary(&lines.join("\n")).await?;
        telemetry.log(format!("Results saved: {}", path.display()), LogType::Info);
        Ok(())
    }
}
