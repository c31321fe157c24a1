//! Line-level filtering of `text/event-stream` bodies
//!
//! Some upstreams attach a `snapshot` field to `type: "text"` delta events.
//! Certain SSE consumers validate every event against a discriminated union
//! and reject the whole stream when they see it, so those events are removed
//! before the body reaches the client. Everything else, including lines that
//! fail to parse, is forwarded byte for byte.
use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;

const DATA_PREFIX: &[u8] = b"data: ";
const DONE_SENTINEL: &[u8] = b"[DONE]";

/// One line of an event-stream body
#[derive(Debug)]
pub enum Frame<'a> {
    /// `event:`, `id:`, `retry:`, comments, blank separators
    Other(&'a [u8]),
    /// `data: [DONE]` or `data: ` with nothing after it
    Sentinel(&'a [u8]),
    /// `data:` line whose payload is not a JSON object
    Malformed(&'a [u8]),
    /// `data:` line carrying a JSON object
    Event {
        line: &'a [u8],
        payload: Map<String, Value>,
    },
}

impl<'a> Frame<'a> {
    pub fn classify(line: &'a [u8]) -> Self {
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Frame::Other(line);
        };
        if payload.is_empty() || payload == DONE_SENTINEL {
            return Frame::Sentinel(line);
        }
        match serde_json::from_slice::<Map<String, Value>>(payload) {
            Ok(payload) => Frame::Event { line, payload },
            Err(_) => Frame::Malformed(line),
        }
    }

    pub fn line(&self) -> &'a [u8] {
        match self {
            Frame::Other(line) | Frame::Sentinel(line) | Frame::Malformed(line) => *line,
            Frame::Event { line, .. } => *line,
        }
    }

    pub fn should_drop(&self) -> bool {
        match self {
            Frame::Event { payload, .. } => is_text_snapshot(payload),
            _ => false,
        }
    }
}

/// `type == "text"` together with a `snapshot` key. The value of `snapshot`
/// does not matter, `null` and `""` count too.
pub fn is_text_snapshot(event: &Map<String, Value>) -> bool {
    event.get("type").and_then(|t| t.as_str()) == Some("text") && event.contains_key("snapshot")
}

/// Lines of `body` split on `\n`, classified lazily.
pub fn frames(body: &[u8]) -> impl Iterator<Item = Frame<'_>> {
    body.split(|&b| b == b'\n').map(Frame::classify)
}

/// Remove text-snapshot events from an event-stream body.
///
/// Kept lines are rejoined with `\n` in their original order. When nothing
/// is dropped the input is returned as is and the flag is `false`.
pub fn filter_snapshot_events(body: &Bytes) -> (Bytes, bool) {
    let mut out: Vec<u8> = Vec::with_capacity(body.len());
    let mut first = true;
    let mut dropped = 0usize;

    for frame in frames(body) {
        if frame.should_drop() {
            dropped += 1;
            debug!(
                "🧹 Dropping text snapshot event: {}",
                String::from_utf8_lossy(frame.line())
            );
            continue;
        }
        if !first {
            out.push(b'\n');
        }
        out.extend_from_slice(frame.line());
        first = false;
    }

    if dropped == 0 {
        return (body.clone(), false);
    }

    debug!("🧹 Dropped {} text snapshot event(s) from stream", dropped);
    (Bytes::from(out), true)
}
