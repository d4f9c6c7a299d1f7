//! Cloud event stream (server-sent events).
//!
//! The cloud pushes device events over a long-lived SSE connection. This
//! module parses the wire format into [`EventData`] values and exposes the
//! connection as an ordered [`futures_core::Stream`]. The stream terminates
//! with an `Err` when the transport drops -- reconnection policy belongs to
//! the consumer, not to this layer.

use chrono::{DateTime, Utc};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;

use crate::error::Error;

/// A single event published by a controller board.
///
/// Transient: consumed and discarded per event, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct EventData {
    /// Event topic, e.g. `"oinkbrew/devices/new"`.
    pub name: String,
    /// JSON-encoded payload. Interpretation depends on the topic.
    pub data: String,
    /// Cloud-side time-to-live, seconds.
    pub ttl: u32,
    /// When the board published the event.
    pub published_at: DateTime<Utc>,
    /// Identifier of the originating board.
    pub core_id: String,
}

/// Body of an SSE `data:` line.
#[derive(Debug, Deserialize)]
struct EventBody {
    #[serde(default)]
    data: String,
    #[serde(default = "default_ttl")]
    ttl: u32,
    published_at: DateTime<Utc>,
    coreid: String,
}

fn default_ttl() -> u32 {
    60
}

// ── SSE wire parsing ─────────────────────────────────────────────────

/// Incremental parser for the SSE wire format.
///
/// Chunk boundaries from the transport do not line up with event
/// boundaries, so the parser buffers partial lines between calls.
#[derive(Debug, Default)]
pub(crate) struct SseParser {
    buffer: String,
    event_name: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a transport chunk, returning every event completed by it.
    pub(crate) fn push(&mut self, chunk: &str) -> Vec<EventData> {
        self.buffer.push_str(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(event) = self.process_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<EventData> {
        if line.is_empty() {
            return self.finish_event();
        }

        // Comment / keep-alive lines (`:ok`).
        if line.starts_with(':') {
            return None;
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.event_name = Some(name.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            self.data_lines.push(data.trim_start().to_string());
        }
        // Unknown fields (`id:`, `retry:`) are ignored.

        None
    }

    /// A blank line terminates the pending event.
    fn finish_event(&mut self) -> Option<EventData> {
        let name = self.event_name.take();
        let data_lines = std::mem::take(&mut self.data_lines);

        let name = name?;
        if data_lines.is_empty() {
            return None;
        }

        let body = data_lines.join("\n");
        match serde_json::from_str::<EventBody>(&body) {
            Ok(parsed) => Some(EventData {
                name,
                data: parsed.data,
                ttl: parsed.ttl,
                published_at: parsed.published_at,
                core_id: parsed.coreid,
            }),
            Err(e) => {
                tracing::debug!(error = %e, event = %name, "discarding unparseable SSE event");
                None
            }
        }
    }
}

// ── Response -> event stream ─────────────────────────────────────────

/// Turn a streaming HTTP response into an ordered stream of [`EventData`].
///
/// Yields `Err` exactly once if the transport drops mid-stream, then ends.
/// A clean server-side close simply ends the stream.
pub(crate) fn into_event_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<EventData, Error>> + Send {
    let mut body = response.bytes_stream();

    async_stream::stream! {
        let mut parser = SseParser::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    for event in parser.push(&text) {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(Error::EventStream(e.to_string()));
                    return;
                }
            }
        }

        tracing::info!("event stream ended");
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"data":"{\"pinNr\":17}","ttl":60,"published_at":"2024-03-01T12:00:00.000Z","coreid":"aaa"}"#;

    #[test]
    fn parses_a_complete_event() {
        let mut parser = SseParser::new();
        let events = parser.push(&format!("event: oinkbrew/devices/new\ndata: {BODY}\n\n"));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "oinkbrew/devices/new");
        assert_eq!(events[0].data, r#"{"pinNr":17}"#);
        assert_eq!(events[0].core_id, "aaa");
        assert_eq!(events[0].ttl, 60);
    }

    #[test]
    fn reassembles_events_across_chunk_boundaries() {
        let mut parser = SseParser::new();
        let wire = format!("event: oinkbrew/start\ndata: {BODY}\n\n");
        let (head, tail) = wire.split_at(wire.len() / 2);

        assert!(parser.push(head).is_empty());
        let events = parser.push(tail);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "oinkbrew/start");
    }

    #[test]
    fn skips_keep_alive_comments() {
        let mut parser = SseParser::new();
        assert!(parser.push(":ok\n\n").is_empty());
    }

    #[test]
    fn discards_events_with_malformed_bodies() {
        let mut parser = SseParser::new();
        let events = parser.push("event: oinkbrew/start\ndata: not json\n\n");
        assert!(events.is_empty());

        // Parser state is clean afterwards.
        let events = parser.push(&format!("event: oinkbrew/start\ndata: {BODY}\n\n"));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn yields_multiple_events_in_arrival_order() {
        let mut parser = SseParser::new();
        let wire = format!(
            "event: oinkbrew/devices/new\ndata: {BODY}\n\nevent: oinkbrew/devices/remove\ndata: {BODY}\n\n"
        );

        let events = parser.push(&wire);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "oinkbrew/devices/new");
        assert_eq!(events[1].name, "oinkbrew/devices/remove");
    }

    #[test]
    fn ttl_defaults_when_absent() {
        let mut parser = SseParser::new();
        let body = r#"{"data":"", "published_at":"2024-03-01T12:00:00.000Z","coreid":"bbb"}"#;
        let events = parser.push(&format!("event: oinkbrew/start\ndata: {body}\n\n"));

        assert_eq!(events[0].ttl, 60);
    }
}
