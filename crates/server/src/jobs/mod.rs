// crates/server/src/jobs/mod.rs
//! The single background exploration job.
//!
//! Provides:
//! - `JobController` - start/stop/liveness of the one job slot
//! - `ExplorationDriver` - the job's state machine
//! - `JobPhase`, `PhaseCell` - lock-free phase tracking for status reads

pub mod controller;
pub mod driver;
pub mod types;

pub use controller::JobController;
pub use driver::ExplorationDriver;
pub use types::{
    JobError, JobOutcome, JobPhase, JobRequest, JobStatus, PhaseCell, StartError, StopError,
};
