// crates/core/src/agent.rs
//! The exploration agent seam.
//!
//! The agent is opaque to the job pipeline: it receives a goal, narrates on
//! two text outputs, and eventually returns an `AgentOutcome`.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::llm::LlmSettings;
use crate::reinterleave::OutputReinterleaver;

/// Steps the agent may take per level of navigation depth.
pub const STEPS_PER_DEPTH: u32 = 15;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to spawn agent process: {0}")]
    SpawnFailed(String),

    #[error("Agent output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid agent outcome: {0}")]
    InvalidOutcome(String),

    #[error("{0}")]
    Failed(String),
}

/// Everything the agent needs to run one exploration.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub app_name: String,
    pub category: String,
    pub goal: String,
    pub max_steps: u32,
    pub llm: LlmSettings,
}

/// What the agent reports back once it stops.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub final_answer: Option<String>,
    #[serde(default)]
    pub structured_output: Option<Value>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub type OutputSink = Box<dyn Write + Send>;

/// The two text outputs handed to an agent for the duration of a run.
pub struct AgentIo {
    /// High-volume reasoning/action narration.
    pub narration: OutputReinterleaver<OutputSink>,
    /// Sparse warnings and diagnostics.
    pub diagnostics: OutputReinterleaver<OutputSink>,
}

impl AgentIo {
    /// Deliver anything still buffered on both outputs.
    pub fn flush(&mut self) {
        if let Err(e) = self.narration.flush() {
            tracing::warn!(error = %e, "failed to flush agent narration");
        }
        if let Err(e) = self.diagnostics.flush() {
            tracing::warn!(error = %e, "failed to flush agent diagnostics");
        }
    }
}

#[async_trait]
pub trait ExplorationAgent: Send + Sync {
    async fn run(&self, request: AgentRequest, io: &mut AgentIo) -> Result<AgentOutcome, AgentError>;

    /// Name for logging.
    fn name(&self) -> &str;
}

/// Runs an external agent program.
///
/// The goal and limits are passed through environment variables; stdout is
/// narration, stderr is diagnostics. The program reports its outcome by
/// writing an `AgentOutcome` JSON object to `$DROIDSCOPE_RESULT_PATH`. If it
/// does not, success follows the exit status.
pub struct CommandAgent {
    program: String,
    args: Vec<String>,
    result_path: PathBuf,
}

impl CommandAgent {
    pub fn new(program: impl Into<String>, args: Vec<String>, result_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            result_path: result_path.into(),
        }
    }

    /// Build from a whitespace-separated command line.
    pub fn from_command_line(command: &str, result_path: impl Into<PathBuf>) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), result_path))
    }

    async fn read_outcome(&self) -> Result<Option<AgentOutcome>, AgentError> {
        match tokio::fs::read_to_string(&self.result_path).await {
            Ok(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| AgentError::InvalidOutcome(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AgentError::Io(e)),
        }
    }
}

#[async_trait]
impl ExplorationAgent for CommandAgent {
    async fn run(&self, request: AgentRequest, io: &mut AgentIo) -> Result<AgentOutcome, AgentError> {
        match tokio::fs::remove_file(&self.result_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AgentError::Io(e)),
        }

        tracing::info!(
            program = %self.program,
            args = ?self.args,
            max_steps = request.max_steps,
            "agent: spawning"
        );

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .env("DROIDSCOPE_APP_NAME", &request.app_name)
            .env("DROIDSCOPE_CATEGORY", &request.category)
            .env("DROIDSCOPE_GOAL", &request.goal)
            .env("DROIDSCOPE_MAX_STEPS", request.max_steps.to_string())
            .env("DROIDSCOPE_RESULT_PATH", &self.result_path)
            .env("LLM_MODEL", &request.llm.model)
            .env("LLM_API_BASE", &request.llm.api_base)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(key) = &request.llm.api_key {
            cmd.env("API_KEY", key);
        }

        let mut child = cmd.spawn().map_err(|e| {
            tracing::error!(error = %e, program = %self.program, "agent: failed to spawn");
            AgentError::SpawnFailed(e.to_string())
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::SpawnFailed("failed to capture stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::SpawnFailed("failed to capture stderr".into()))?;

        // Output is forwarded as raw bytes; the reinterleavers own decoding.
        let mut out_reader = BufReader::new(stdout);
        let mut err_reader = BufReader::new(stderr);
        let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
        let (mut out_done, mut err_done) = (false, false);

        // `read_until` leaves partial bytes in its buffer if the other branch
        // wins, so buffers live across iterations.
        while !(out_done && err_done) {
            tokio::select! {
                read = out_reader.read_until(b'\n', &mut out_buf), if !out_done => {
                    if read? == 0 {
                        out_done = true;
                    }
                    io.narration.write_all(&out_buf)?;
                    out_buf.clear();
                }
                read = err_reader.read_until(b'\n', &mut err_buf), if !err_done => {
                    if read? == 0 {
                        err_done = true;
                    }
                    io.diagnostics.write_all(&err_buf)?;
                    err_buf.clear();
                }
            }
        }

        let status = child.wait().await?;
        tracing::info!(exit_code = ?status.code(), "agent: exited");

        match self.read_outcome().await? {
            Some(outcome) => Ok(outcome),
            None if status.success() => Ok(AgentOutcome {
                success: true,
                ..AgentOutcome::default()
            }),
            None => Ok(AgentOutcome {
                success: false,
                reason: Some(format!("agent exited with {status}")),
                ..AgentOutcome::default()
            }),
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::reinterleave::{DIAGNOSTIC_THRESHOLD, NARRATION_THRESHOLD};
    use crate::telemetry::{LogType, Telemetry};

    fn io(telemetry: &Telemetry) -> AgentIo {
        AgentIo {
            narration: OutputReinterleaver::new(
                Box::new(std::io::sink()),
                telemetry.clone(),
                LogType::Agent,
                NARRATION_THRESHOLD,
            ),
            diagnostics: OutputReinterleaver::new(
                Box::new(std::io::sink()),
                telemetry.clone(),
                LogType::Warning,
                DIAGNOSTIC_THRESHOLD,
            ),
        }
    }

    fn request() -> AgentRequest {
        AgentRequest {
            app_name: "Clock".into(),
            category: "Utility".into(),
            goal: "Explore Clock".into(),
            max_steps: 90,
            llm: LlmSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_command_agent_reads_outcome_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"echo "goal: $DROIDSCOPE_GOAL"; echo "steps: $DROIDSCOPE_MAX_STEPS"; echo oops >&2; printf '{"success": true, "final_answer": "done"}' > "$DROIDSCOPE_RESULT_PATH""#;
        let agent = CommandAgent::new(
            "sh",
            vec!["-c".into(), script.into()],
            dir.path().join("outcome.json"),
        );
        let telemetry = Telemetry::new();
        let mut io = io(&telemetry);

        let outcome = agent.run(request(), &mut io).await.unwrap();
        io.flush();

        assert!(outcome.success);
        assert_eq!(outcome.final_answer.as_deref(), Some("done"));

        let logs: Vec<_> = std::iter::from_fn(|| telemetry.logs.try_pop()).collect();
        let narration = logs.iter().find(|l| l.log_type == LogType::Agent).unwrap();
        assert_eq!(narration.message, "goal: Explore Clock\nsteps: 90");
        let diagnostics = logs.iter().find(|l| l.log_type == LogType::Warning).unwrap();
        assert_eq!(diagnostics.message, "oops");
    }

    #[tokio::test]
    async fn test_command_agent_survives_invalid_utf8_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"echo before; printf 'caf\351\n'; echo after; printf '\377oops\n' >&2; printf '{"success": true}' > "$DROIDSCOPE_RESULT_PATH""#;
        let agent = CommandAgent::new(
            "sh",
            vec!["-c".into(), script.into()],
            dir.path().join("outcome.json"),
        );
        let telemetry = Telemetry::new();
        let mut io = io(&telemetry);

        let outcome = agent.run(request(), &mut io).await.unwrap();
        io.flush();
        assert!(outcome.success);

        let logs: Vec<_> = std::iter::from_fn(|| telemetry.logs.try_pop()).collect();
        let narration = logs.iter().find(|l| l.log_type == LogType::Agent).unwrap();
        assert_eq!(narration.message, "before\ncaf\u{FFFD}\nafter");
        let diagnostics = logs.iter().find(|l| l.log_type == LogType::Warning).unwrap();
        assert_eq!(diagnostics.message, "\u{FFFD}oops");
    }

    #[tokio::test]
    async fn test_output_without_trailing_newline_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CommandAgent::new(
            "sh",
            vec!["-c".into(), "printf 'no newline at end'".into()],
            dir.path().join("outcome.json"),
        );
        let telemetry = Telemetry::new();
        let mut io = io(&telemetry);
        agent.run(request(), &mut io).await.unwrap();
        io.flush();

        let narration = telemetry.logs.try_pop().unwrap();
        assert_eq!(narration.message, "no newline at end");
    }

    #[tokio::test]
    async fn test_command_agent_without_outcome_uses_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CommandAgent::new(
            "sh",
            vec!["-c".into(), "exit 3".into()],
            dir.path().join("outcome.json"),
        );
        let telemetry = Telemetry::new();
        let outcome = agent.run(request(), &mut io(&telemetry)).await.unwrap();
        assert!(!outcome.success);
        assert!(outcome.reason.unwrap().contains('3'));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let agent = CommandAgent::new("definitely-not-a-real-agent-binary", vec![], dir.path().join("o.json"));
        let telemetry = Telemetry::new();
        let err = agent.run(request(), &mut io(&telemetry)).await.unwrap_err();
        assert!(matches!(err, AgentError::SpawnFailed(_)));
    }

    #[test]
    fn test_from_command_line() {
        let agent = CommandAgent::from_command_line("python run_agent.py --device emulator", "/tmp/o.json").unwrap();
        assert_eq!(agent.program, "python");
        assert_eq!(agent.args, vec!["run_agent.py", "--device", "emulator"]);
        assert!(CommandAgent::from_command_line("   ", "/tmp/o.json").is_none());
    }
}
