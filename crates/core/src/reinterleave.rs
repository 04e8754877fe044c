// crates/core/src/reinterleave.rs
//! Batches raw text output into coherent log events.
//!
//! Agents print a lot of small fragments. Forwarding each one as its own log
//! event fragments lines on the client, so `OutputReinterleaver` accumulates
//! writes and emits them as one multi-line event once enough has piled up.

use std::io::{self, Write};

use crate::telemetry::{LogEvent, LogType, Telemetry};

/// Threshold for high-volume narration output (agent stdout).
pub const NARRATION_THRESHOLD: usize = 2048;

/// Threshold for sparse diagnostic output (agent stderr).
pub const DIAGNOSTIC_THRESHOLD: usize = 512;

/// Tee writer: every fragment goes to the original sink immediately and is
/// buffered for batched delivery to the log channel.
///
/// Dropping a reinterleaver does not deliver its buffer; call `flush`.
pub struct OutputReinterleaver<W: Write> {
    original: W,
    telemetry: Telemetry,
    log_type: LogType,
    threshold: usize,
    pending: Vec<String>,
    accumulated: usize,
    /// Trailing bytes of a UTF-8 sequence split across `write` calls.
    partial: Vec<u8>,
}

impl<W: Write> OutputReinterleaver<W> {
    pub fn new(original: W, telemetry: Telemetry, log_type: LogType, threshold: usize) -> Self {
        Self {
            original,
            telemetry,
            log_type,
            threshold: threshold.max(1),
            pending: Vec::new(),
            accumulated: 0,
            partial: Vec::new(),
        }
    }

    /// Bytes buffered since the last delivery.
    pub fn accumulated(&self) -> usize {
        self.accumulated
    }

    /// Append a text fragment. Delivers a batch once the threshold is reached.
    pub fn write_fragment(&mut self, fragment: &str) -> io::Result<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        self.original.write_all(fragment.as_bytes())?;
        self.pending.push(fragment.to_string());
        self.accumulated += fragment.len();
        if self.accumulated >= self.threshold {
            self.deliver();
        }
        Ok(())
    }

    /// Send whatever is buffered, regardless of the threshold.
    fn deliver(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let combined = self.pending.concat();
        self.pending.clear();
        self.accumulated = 0;

        let lines: Vec<&str> = combined
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .collect();
        if !lines.is_empty() {
            self.telemetry
                .push_log(LogEvent::new(lines.join("\n"), self.log_type));
        }
    }

    /// Decode `buf` (plus any carried bytes) into the longest valid UTF-8
    /// prefix, keeping an incomplete trailing sequence for the next call.
    fn decode(&mut self, buf: &[u8]) -> String {
        self.partial.extend_from_slice(buf);
        let bytes = std::mem::take(&mut self.partial);
        match std::str::from_utf8(&bytes) {
            Ok(text) => text.to_string(),
            Err(e) if e.error_len().is_none() => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                self.partial = rest.to_vec();
                String::from_utf8_lossy(valid).into_owned()
            }
            Err(_) => String::from_utf8_lossy(&bytes).into_owned(),
        }
    }
}

impl<W: Write> Write for OutputReinterleaver<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = self.decode(buf);
        self.write_fragment(&text)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.partial.is_empty() {
            let rest = String::from_utf8_lossy(&std::mem::take(&mut self.partial)).into_owned();
            self.write_fragment(&rest)?;
        }
        self.original.flush()?;
        self.deliver();
        Ok(())
    }
}
