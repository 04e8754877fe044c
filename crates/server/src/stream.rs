// crates/server/src/stream.rs
//! Drains a telemetry channel into a Server-Sent Events stream.
//!
//! Each connection pops from the shared channel with a timeout. A timeout
//! yields a keepalive; a terminal event is yielded and then ends the stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{self, HeaderName, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use droidscope_core::{LogEvent, ProgressEvent, TelemetryChannel};
use serde::Serialize;
use tokio_stream::{Stream, StreamExt};

const KEEPALIVE_PAYLOAD: &str = r#"{"keepalive":true}"#;

/// Events that can end a stream.
pub trait TerminalEvent {
    fn is_terminal(&self) -> bool;
}

impl TerminalEvent for ProgressEvent {
    fn is_terminal(&self) -> bool {
        ProgressEvent::is_terminal(self)
    }
}

impl TerminalEvent for LogEvent {
    fn is_terminal(&self) -> bool {
        LogEvent::is_terminal(self)
    }
}

/// One wire item of a telemetry stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem<T> {
    Event(T),
    Keepalive,
}

/// Lazy per-connection stream over `channel`.
pub fn event_stream<T>(
    channel: Arc<TelemetryChannel<T>>,
    keepalive: Duration,
) -> impl Stream<Item = StreamItem<T>>
where
    T: TerminalEvent + Send + 'static,
{
    async_stream::stream! {
        loop {
            match channel.pop(keepalive).await {
                Some(event) => {
                    let terminal = event.is_terminal();
                    yield StreamItem::Event(event);
                    if terminal {
                        break;
                    }
                }
                None => yield StreamItem::Keepalive,
            }
        }
    }
}

fn to_sse_event<T: Serialize>(item: StreamItem<T>) -> Event {
    match item {
        StreamItem::Event(event) => match serde_json::to_string(&event) {
            Ok(json) => Event::default().data(json),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize SSE event");
                Event::default().data(KEEPALIVE_PAYLOAD)
            }
        },
        StreamItem::Keepalive => Event::default().data(KEEPALIVE_PAYLOAD),
    }
}

/// SSE response over `channel` with proxy buffering disabled.
pub fn sse_response<T>(channel: Arc<TelemetryChannel<T>>, keepalive: Duration) -> Response
where
    T: TerminalEvent + Serialize + Send + 'static,
{
    let stream = event_stream(channel, keepalive).map(|item| Ok::<_, Infallible>(to_sse_event(item)));
    (
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        Sse::new(stream),
    )
        .into_response()
}
