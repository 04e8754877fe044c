// crates/core/src/artifacts.rs
//! Single-slot job artifacts on disk. Every run overwrites the previous one.

use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

pub const SUMMARY_FILE: &str = "agent_result.txt";
pub const STRUCTURED_OUTPUT_FILE: &str = "exploration_output.json";
pub const ANALYSIS_FILE: &str = "ux_analysis_blocks.json";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {path}")]
    NotFound { path: PathBuf },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl ArtifactError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.path(SUMMARY_FILE)
    }

    async fn write(&self, file: &str, contents: &str) -> Result<PathBuf, ArtifactError> {
        let path = self.path(file);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ArtifactError::io(&self.dir, e))?;
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| ArtifactError::io(&path, e))?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "artifact written");
        Ok(path)
    }

    pub async fn write_summary(&self, text: &str) -> Result<PathBuf, ArtifactError> {
        self.write(SUMMARY_FILE, text).await
    }

    pub async fn write_structured_output(&self, pretty_json: &str) -> Result<PathBuf, ArtifactError> {
        self.write(STRUCTURED_OUTPUT_FILE, pretty_json).await
    }

    pub async fn write_analysis(&self, document: &Value) -> Result<PathBuf, ArtifactError> {
        let path = self.path(ANALYSIS_FILE);
        let text = serde_json::to_string_pretty(document).map_err(|e| ArtifactError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        self.write(ANALYSIS_FILE, &text).await
    }

    /// Load the normalized analysis document written by the last run.
    pub async fn load_analysis(&self) -> Result<Value, ArtifactError> {
        let path = self.path(ANALYSIS_FILE);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ArtifactError::io(&path, e))?;
        serde_json::from_str(&text).map_err(|e| ArtifactError::Parse {
            path,
            message: e.to_string(),
        })
    }
}
