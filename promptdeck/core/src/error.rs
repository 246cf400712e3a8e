//! Error Types
//!
//! Errors raised by the transport and decoder, plus the failure value a
//! session carries once it reaches the `Failed` state.
//!
//! Only transport errors and session failures ever reach a surface. Protocol
//! errors are recovered inside the decoder (the offending line is dropped),
//! and an invalid draft is a silent no-op rather than an error.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from talking to the batching backend over HTTP
#[derive(Debug, Error)]
pub enum BackendError {
    /// The server answered with a non-success status
    #[error("{message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Human-readable message (`detail` from the body, or a generic one)
        message: String,
    },

    /// The request could not be sent or the body could not be read
    #[error("{0}")]
    Network(String),

    /// The response body was not what the endpoint promises
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    /// The configured base URL cannot be joined with an endpoint path
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// A single stream line that could not be decoded
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line was not valid UTF-8
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The `data: ` payload was not valid JSON, or a known event had the wrong shape
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Why a session failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Non-success status or network failure
    Transport,
    /// The server sent an explicit `error` event
    Stream,
    /// The stream ended without a usable `done` event
    Incomplete,
    /// The session was discarded while in flight
    Cancelled,
}

/// Terminal failure of a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Message shown to the user
    pub message: String,
}

/// Message for streams that end without a usable `done` event
pub const INCOMPLETE_RESPONSE: &str = "Incomplete response from server";

/// Message for sessions discarded mid-flight
pub const REQUEST_CANCELLED: &str = "Request cancelled";

impl SessionFailure {
    /// Transport-level failure
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transport,
            message: message.into(),
        }
    }

    /// Explicit error event from the server
    pub fn stream(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Stream,
            message: message.into(),
        }
    }

    /// Stream ended without a terminal event
    #[must_use]
    pub fn incomplete() -> Self {
        Self {
            kind: FailureKind::Incomplete,
            message: INCOMPLETE_RESPONSE.to_string(),
        }
    }

    /// Session discarded by its owner
    #[must_use]
    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: REQUEST_CANCELLED.to_string(),
        }
    }
}

impl From<&BackendError> for SessionFailure {
    fn from(e: &BackendError) -> Self {
        Self::transport(e.to_string())
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
