// crates/core/src/telemetry.rs
//! Progress and log events, and the unbounded queues that carry them from the
//! job worker to the streaming endpoints.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Marker that ends the log stream when it appears in a `success` event.
pub const COMPLETION_MARKER: &str = "complete";

/// Percentage reported for aborted or failed jobs.
pub const PROGRESS_ABORTED: i32 = -1;

/// Percentage reported once a job has fully succeeded.
pub const PROGRESS_DONE: i32 = 100;

/// Coarse progress update sent over the progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
    pub percentage: i32,
    pub timestamp: String,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>, percentage: i32) -> Self {
        Self {
            message: message.into(),
            percentage: percentage.clamp(PROGRESS_ABORTED, PROGRESS_DONE),
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }

    /// `100` and negative percentages both end the progress stream.
    pub fn is_terminal(&self) -> bool {
        self.percentage >= PROGRESS_DONE || self.percentage < 0
    }
}

/// Category of a log line, lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Info,
    Success,
    Warning,
    Error,
    Agent,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Agent => "agent",
        }
    }
}

/// A (possibly multi-line) log message sent over the log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub message: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub timestamp: String,
    /// Set on the last event of a failed or cancelled job. Never serialized.
    #[serde(skip)]
    pub terminal: bool,
}

impl LogEvent {
    pub fn new(message: impl Into<String>, log_type: LogType) -> Self {
        Self {
            message: message.into(),
            log_type,
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            terminal: false,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    /// A `success` event mentioning completion, or an explicitly flagged one.
    pub fn is_terminal(&self) -> bool {
        self.terminal
            || (self.log_type == LogType::Success
                && self.message.to_lowercase().contains(COMPLETION_MARKER))
    }
}

/// Unbounded FIFO queue with a timed, async pop.
///
/// `push` never blocks. `pop` waits on a `Notify` permit, so a push racing
/// with a waiting consumer is never missed.
pub struct TelemetryChannel<T> {
    queue: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> TelemetryChannel<T> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, event: T) {
        match self.queue.lock() {
            Ok(mut queue) => queue.push_back(event),
            Err(poisoned) => poisoned.into_inner().push_back(event),
        }
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<T> {
        match self.queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        }
    }

    /// Wait up to `timeout` for the next event. `None` means the wait expired.
    pub async fn pop(&self, timeout: Duration) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(event) = self.try_pop() {
                return Some(event);
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                // One last look: a push may have landed right at the deadline.
                return self.try_pop();
            }
        }
    }

    /// Drop every queued event.
    pub fn clear(&self) {
        match self.queue.lock() {
            Ok(mut queue) => queue.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    pub fn len(&self) -> usize {
        match self.queue.lock() {
            Ok(queue) => queue.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for TelemetryChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Both telemetry channels of the server, cheap to clone.
#[derive(Clone, Default)]
pub struct Telemetry {
    pub progress: Arc<TelemetryChannel<ProgressEvent>>,
    pub logs: Arc<TelemetryChannel<LogEvent>>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a log event and mirror it to the server log.
    pub fn log(&self, message: impl Into<String>, log_type: LogType) {
        self.push_log(LogEvent::new(message, log_type));
    }

    /// Push a log event that ends the log stream.
    pub fn log_terminal(&self, message: impl Into<String>, log_type: LogType) {
        self.push_log(LogEvent::new(message, log_type).terminal());
    }

    pub fn push_log(&self, event: LogEvent) {
        match event.log_type {
            LogType::Error => tracing::error!(message = %event.message, "job log"),
            LogType::Warning => tracing::warn!(message = %event.message, "job log"),
            LogType::Agent => tracing::debug!(message = %event.message, "agent output"),
            LogType::Info | LogType::Success => {
                tracing::info!(kind = event.log_type.as_str(), message = %event.message, "job log")
            }
        }
        self.logs.push(event);
    }

    /// Push a progress event and mirror it to the server log.
    pub fn progress(&self, message: impl Into<String>, percentage: i32) {
        let event = ProgressEvent::new(message, percentage);
        tracing::info!(percentage = event.percentage, message = %event.message, "job progress");
        self.progress.push(event);
    }

    /// Empty both channels so a new job never replays stale events.
    pub fn clear(&self) {
        self.progress.clear();
        self.logs.clear();
    }
}
