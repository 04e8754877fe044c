// crates/server/src/main.rs
//! Droidscope server binary.
//!
//! `droidscope serve` (the default) starts the HTTP server; `droidscope
//! analyze` runs the UX analysis on an existing report and exits.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use droidscope_core::llm::{create_provider, LlmSettings};
use droidscope_core::{ArtifactStore, CommandAgent, PromptLibrary, UxAnalyzer};
use droidscope_server::config::{AnalyzeArgs, Cli, Command, ServeArgs};
use droidscope_server::{create_app, AppConfig, AppState};
use tracing_subscriber::EnvFilter;

/// File the agent process writes its outcome to, inside the artifact dir.
const AGENT_OUTCOME_FILE: &str = "agent_outcome.json";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,droidscope_server=info,droidscope_core=info".into()),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Analyze(args)) => analyze(args).await,
        Some(Command::Serve(args)) => serve(args).await,
        None => serve(cli.serve).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let config = AppConfig::from_args(args);

    let agent = CommandAgent::from_command_line(
        &config.agent_command,
        config.artifact_dir.join(AGENT_OUTCOME_FILE),
    )
    .context("agent command is empty")?;
    let llm = create_provider(&config.llm).context("failed to create LLM provider")?;

    tokio::fs::create_dir_all(&config.artifact_dir)
        .await
        .with_context(|| format!("cannot create {}", config.artifact_dir.display()))?;

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    eprintln!("\n\u{1f4f1} droidscope v{}\n", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        port = config.port,
        artifact_dir = %config.artifact_dir.display(),
        static_dir = ?config.static_dir,
        agent = %config.agent_command,
        model = %config.llm.model,
        "starting server"
    );

    let state = AppState::new(config, Arc::new(agent), llm);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {addr}"))?;
    eprintln!("  Ready at http://{addr}\n");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let settings = LlmSettings::from_env();
    let provider = create_provider(&settings).context("failed to create LLM provider")?;
    let prompts = match &args.prompts_dir {
        Some(dir) => PromptLibrary::with_dir(dir),
        None => PromptLibrary::builtin(),
    };
    let analyzer = UxAnalyzer::new(provider, prompts, ArtifactStore::new(&args.artifact_dir));

    let report = analyzer.read_report(&args.report).await?;
    let app_name = args.app_name.clone().unwrap_or_default();
    let document = analyzer
        .analyze_and_save(&report, &app_name, &args.category)
        .await?;
    tracing::info!(
        path = %analyzer.store().path(droidscope_core::ANALYSIS_FILE).display(),
        "analysis saved"
    );

    if let Some(html_path) = &args.html {
        let html = analyzer.generate_html(&document).await?;
        tokio::fs::write(html_path, html)
            .await
            .with_context(|| format!("cannot write {}", html_path.display()))?;
        tracing::info!(path = %html_path.display(), "HTML report saved");
    }

    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
