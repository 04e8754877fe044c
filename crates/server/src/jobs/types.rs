// crates/server/src/jobs/types.rs
//! Types for the exploration job.

use std::sync::atomic::{AtomicU8, Ordering};

use droidscope_core::{AgentError, ArtifactError, PromptError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_APP_NAME: &str = "Unknown App";
pub const DEFAULT_CATEGORY: &str = "General";
pub const DEFAULT_MAX_DEPTH: u32 = 6;

/// Parameters of one exploration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub app_name: String,
    pub category: String,
    pub max_depth: u32,
}

impl Default for JobRequest {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Phase of the exploration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum JobPhase {
    Idle = 0,
    Initializing = 1,
    ConfiguringAgent = 2,
    Running = 3,
    Finalizing = 4,
    Succeeded = 5,
    Cancelled = 6,
    Failed = 7,
}

impl JobPhase {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Initializing,
            2 => Self::ConfiguringAgent,
            3 => Self::Running,
            4 => Self::Finalizing,
            5 => Self::Succeeded,
            6 => Self::Cancelled,
            7 => Self::Failed,
            _ => Self::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::ConfiguringAgent => "configuring_agent",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Succeeded => "succeeded",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Cancelled | Self::Failed)
    }
}

/// Lock-free holder of the current `JobPhase`, shared by the worker and the
/// status endpoint.
#[derive(Debug)]
pub struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(JobPhase::Idle as u8))
    }

    pub fn get(&self) -> JobPhase {
        JobPhase::from_u8(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, phase: JobPhase) {
        self.0.store(phase as u8, Ordering::Release);
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

/// How a job that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Cancelled,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Exploration failed: {reason}")]
    ExplorationFailed { reason: String },

    #[error("UX analysis failed")]
    AnalysisFailed,

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Exploration task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("An exploration job is already running")]
    AlreadyRunning,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StopError {
    #[error("No agent currently running")]
    NotRunning,
}

/// Snapshot of the current or most recent job.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct JobStatus {
    pub active: bool,
    pub phase: JobPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_discriminants_round_trip() {
        for phase in [
            JobPhase::Idle,
            JobPhase::Initializing,
            JobPhase::ConfiguringAgent,
            JobPhase::Running,
            JobPhase::Finalizing,
            JobPhase::Succeeded,
            JobPhase::Cancelled,
            JobPhase::Failed,
        ] {
            assert_eq!(JobPhase::from_u8(phase as u8), phase);
        }
        assert_eq!(JobPhase::from_u8(200), JobPhase::Idle);
    }

    #[test]
    fn test_phase_cell() {
        let cell = PhaseCell::new();
        assert_eq!(cell.get(), JobPhase::Idle);
        cell.set(JobPhase::Running);
        assert_eq!(cell.get(), JobPhase::Running);
        assert!(!cell.get().is_terminal());
        cell.set(JobPhase::Cancelled);
        assert!(cell.get().is_terminal());
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        let json = serde_json::to_string(&JobPhase::ConfiguringAgent).unwrap();
        assert_eq!(json, "\"configuring_agent\"");
        assert_eq!(JobPhase::ConfiguringAgent.as_str(), "configuring_agent");
    }

    #[test]
    fn test_job_error_messages() {
        let err = JobError::ExplorationFailed {
            reason: "device offline".into(),
        };
        assert_eq!(err.to_string(), "Exploration failed: device offline");
        assert_eq!(StopError::NotRunning.to_string(), "No agent currently running");
    }
}
