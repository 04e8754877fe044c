// crates/core/src/cancel.rs
//! Cooperative cancellation flag shared between the job controller and the
//! worker. Single writer (stop requests), many readers (checkpoints).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` if this call set the flag.
    pub fn set(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Only called when a new job starts.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}
