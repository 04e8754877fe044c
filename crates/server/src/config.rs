// crates/server/src/config.rs
//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use droidscope_core::llm::LlmSettings;
use droidscope_core::{DIAGNOSTIC_THRESHOLD, NARRATION_THRESHOLD};

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 5000;

/// Seconds a streaming connection waits for an event before sending a keepalive.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;

/// Agent program run for each exploration when nothing else is configured.
pub const DEFAULT_AGENT_COMMAND: &str = "droidrun-agent";

#[derive(Debug, Parser)]
#[command(
    name = "droidscope",
    version,
    about = "Automated mobile UX exploration server",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Server options when no subcommand is given.
    #[command(flatten)]
    pub serve: ServeArgs,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve(ServeArgs),
    /// Analyze an existing exploration report without running the agent.
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Port to listen on. Falls back to `PORT`, then 5000.
    #[arg(long, env = "DROIDSCOPE_PORT")]
    pub port: Option<u16>,

    /// Directory holding job artifacts.
    #[arg(long, env = "DROIDSCOPE_ARTIFACT_DIR", default_value = ".")]
    pub artifact_dir: PathBuf,

    /// Frontend build to serve at `/`.
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Directory of `<name>.txt` prompt overrides.
    #[arg(long, env = "DROIDSCOPE_PROMPTS_DIR")]
    pub prompts_dir: Option<PathBuf>,

    /// Command line of the exploration agent program.
    #[arg(long, env = "DROIDSCOPE_AGENT_COMMAND", default_value = DEFAULT_AGENT_COMMAND)]
    pub agent_command: String,

    #[arg(long, env = "DROIDSCOPE_KEEPALIVE_SECS", default_value_t = DEFAULT_KEEPALIVE_SECS)]
    pub keepalive_secs: u64,

    /// Do not echo agent output to the server's own stdout/stderr.
    #[arg(long)]
    pub quiet_agent: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            port: None,
            artifact_dir: PathBuf::from("."),
            static_dir: None,
            prompts_dir: None,
            agent_command: DEFAULT_AGENT_COMMAND.to_string(),
            keepalive_secs: DEFAULT_KEEPALIVE_SECS,
            quiet_agent: false,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct AnalyzeArgs {
    /// Exploration report to analyze.
    #[arg(long)]
    pub report: PathBuf,

    /// App name recorded in the analysis metadata. Left blank when unset.
    #[arg(long)]
    pub app_name: Option<String>,

    #[arg(long, default_value = "General")]
    pub category: String,

    /// Also render an HTML report to this path.
    #[arg(long)]
    pub html: Option<PathBuf>,

    #[arg(long, env = "DROIDSCOPE_ARTIFACT_DIR", default_value = ".")]
    pub artifact_dir: PathBuf,

    #[arg(long, env = "DROIDSCOPE_PROMPTS_DIR")]
    pub prompts_dir: Option<PathBuf>,
}

/// Tunables of the exploration job.
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub narration_threshold: usize,
    pub diagnostic_threshold: usize,
    /// Echo agent output to the process's stdout/stderr as well.
    pub echo_agent_output: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            narration_threshold: NARRATION_THRESHOLD,
            diagnostic_threshold: DIAGNOSTIC_THRESHOLD,
            echo_agent_output: true,
        }
    }
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub artifact_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub prompts_dir: Option<PathBuf>,
    pub agent_command: String,
    pub keepalive: Duration,
    pub job: JobSettings,
    pub llm: LlmSettings,
}

impl AppConfig {
    pub fn from_args(args: ServeArgs) -> Self {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    fn resolve(args: ServeArgs, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = args
            .port
            .or_else(|| lookup("PORT").and_then(|p| p.parse().ok()))
            .unwrap_or(DEFAULT_PORT);
        Self {
            port,
            artifact_dir: args.artifact_dir,
            static_dir: args.static_dir,
            prompts_dir: args.prompts_dir,
            agent_command: args.agent_command,
            keepalive: Duration::from_secs(args.keepalive_secs.max(1)),
            job: JobSettings {
                echo_agent_output: !args.quiet_agent,
                ..JobSettings::default()
            },
            llm: LlmSettings::from_lookup(lookup),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::resolve(ServeArgs::default(), |_| None)
    }
}
