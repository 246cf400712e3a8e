//! Stream Decoder
//!
//! Turns the raw byte fragments of a `/v1/query` response body into
//! [`StreamEvent`]s.
//!
//! # Wire Format
//!
//! ```text
//! data: {"type":"text","content":"Hello "}\n
//! \n
//! data: {"type":"text","content":"world"}\n
//! \n
//! data: {"type":"done","request_id":"...","username":"...","tokens_used":12,...}\n
//! ```
//!
//! Only lines prefixed with `data: ` carry events. Everything else (blank
//! separators, comments, future metadata lines) is skipped.
//!
//! # Fragmentation
//!
//! The transport may cut the body anywhere: inside a line, inside the JSON,
//! inside a multi-byte character. The decoder works on bytes and keeps the
//! trailing partial line until its newline arrives, so the decoded event
//! sequence does not depend on where the cuts fall.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::lossy_string;
use crate::error::ProtocolError;

/// Prefix of every event-bearing line
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Message used when an `error` event carries no message of its own
const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

/// One decoded protocol event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// A piece of generated text
    Text {
        /// The text to append
        content: String,
    },
    /// The generation finished; carries the result metadata
    Done(DoneEvent),
    /// The server reported a failure for this request
    Error {
        /// Human-readable error message
        message: String,
    },
}

impl StreamEvent {
    /// Whether this event ends a session
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error { .. })
    }
}

/// Metadata carried by a `done` event
///
/// Every field is optional here; which ones are required is decided by the
/// session when it builds the result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DoneEvent {
    /// Canonical request ID echoed by the server
    #[serde(default)]
    pub request_id: Option<String>,
    /// Canonical username echoed by the server
    #[serde(default)]
    pub username: Option<String>,
    /// Tokens consumed
    #[serde(default)]
    pub tokens_used: Option<u64>,
    /// Server-side latency in milliseconds
    #[serde(default)]
    pub latency_ms: Option<f64>,
    /// Creation timestamp
    #[serde(default)]
    pub created_at: Option<String>,
    /// Completion timestamp
    #[serde(default)]
    pub completed_at: Option<String>,
}

impl DoneEvent {
    /// Read the metadata from a `done` payload.
    ///
    /// Fields of the wrong JSON type are tolerated: scalar IDs and names are
    /// stringified, numbers are accepted in any representation, and anything
    /// unusable is left unset.
    #[must_use]
    pub fn from_payload(value: &Value) -> Self {
        Self {
            request_id: lossy_string(value.get("request_id")),
            username: lossy_string(value.get("username")),
            tokens_used: value.get("tokens_used").and_then(lenient_count),
            latency_ms: value.get("latency_ms").and_then(Value::as_f64),
            created_at: lossy_string(value.get("created_at")),
            completed_at: lossy_string(value.get("completed_at")),
        }
    }
}

/// Non-negative count, truncating fractional values
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lenient_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u64)
    })
}

#[derive(Deserialize)]
struct TextPayload {
    content: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    message: Option<String>,
}

/// Decode one complete line (without its `\n`).
///
/// Returns `Ok(None)` for lines that carry no event: blank lines, lines
/// without the `data: ` prefix, payloads without a `type`, and unknown types.
///
/// # Errors
///
/// Returns a [`ProtocolError`] when a `data: ` line is not UTF-8, is not
/// JSON, or is a known event with the wrong shape.
pub fn decode_line(line: &[u8]) -> Result<Option<StreamEvent>, ProtocolError> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(None);
    };

    let payload = std::str::from_utf8(payload)?;
    let value: Value = serde_json::from_str(payload)?;

    let Some(tag) = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned)
    else {
        return Ok(None);
    };

    let event = match tag.as_str() {
        "text" => {
            let text: TextPayload = serde_json::from_value(value)?;
            StreamEvent::Text {
                content: text.content,
            }
        }
        "done" => StreamEvent::Done(DoneEvent::from_payload(&value)),
        "error" => {
            let error: ErrorPayload = serde_json::from_value(value)?;
            StreamEvent::Error {
                message: error
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            }
        }
        other => {
            tracing::debug!(event_type = other, "Ignoring unrecognised stream event");
            return Ok(None);
        }
    };

    Ok(Some(event))
}

/// Incremental decoder for one response body
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Bytes of the trailing line that has not seen its newline yet
    carry: Vec<u8>,
    /// Lines dropped because they could not be decoded
    malformed_lines: u64,
}

impl StreamDecoder {
    /// Create a decoder with an empty carry-over buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next fragment; returns the events completed by it
    pub fn push(&mut self, fragment: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in self.complete_lines(fragment) {
            self.process_line(&line, &mut events);
        }
        events
    }

    /// Flush the carry-over at end of stream.
    ///
    /// A final line the server did not terminate with `\n` is decoded here.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.carry);
        if !rest.is_empty() {
            self.process_line(&rest, &mut events);
        }
        events
    }

    /// Number of bytes waiting for a newline
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    /// Number of lines dropped as malformed so far
    #[must_use]
    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines
    }

    /// Append `fragment` to the carry-over and split off every complete line
    fn complete_lines(&mut self, fragment: &[u8]) -> Vec<Vec<u8>> {
        self.carry.extend_from_slice(fragment);

        let Some(last_newline) = self.carry.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };

        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);

        complete[..last_newline]
            .split(|b| *b == b'\n')
            .map(<[u8]>::to_vec)
            .collect()
    }

    fn process_line(&mut self, line: &[u8], events: &mut Vec<StreamEvent>) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }

        match decode_line(line) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => {
                self.malformed_lines += 1;
                tracing::warn!(
                    error = %e,
                    line = %String::from_utf8_lossy(line),
                    "Dropping malformed stream line"
                );
            }
        }
    }
}
