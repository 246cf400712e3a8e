//! Generation Requests
//!
//! Types that describe what a surface submits and what comes back when a
//! request completes.
//!
//! # Lifecycle
//!
//! A surface edits a [`RequestDraft`] (the "card"). Submitting a draft mints a
//! [`GenerationRequest`] with a fresh [`RequestId`]; the id is never reused, so
//! resubmitting the same draft always produces a new request. A successful
//! stream freezes a [`GenerationResult`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, client-generated request identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    /// Wrap an existing identifier (e.g. one echoed by the server)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique request ID
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request priority, carried on the wire as `0`, `1` or `2`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Priority {
    /// Detailed, slower answers
    Low,
    /// Balanced answers
    #[default]
    Medium,
    /// Short, fast answers
    High,
}

impl Priority {
    /// Numeric wire value
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Map a loosely-typed JSON value to a priority.
    ///
    /// Anything that is not one of the three wire integers becomes `Medium`.
    #[must_use]
    pub fn from_json_lossy(value: Option<&serde_json::Value>) -> Self {
        value
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| u8::try_from(n).ok())
            .and_then(|n| Self::try_from(n).ok())
            .unwrap_or_default()
    }

    /// Human-readable label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.as_u8()
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            other => Err(format!("invalid priority {other} (expected 0, 1 or 2)")),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "low" => Ok(Self::Low),
            "1" | "medium" | "med" => Ok(Self::Medium),
            "2" | "high" => Ok(Self::High),
            other => Err(format!("unknown priority '{other}' (low, medium, high)")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An unsubmitted request as edited by a surface
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    /// Who is asking
    #[serde(default)]
    pub username: String,
    /// The prompt text
    #[serde(default)]
    pub prompt: String,
    /// Requested priority
    #[serde(default)]
    pub priority: Priority,
}

impl RequestDraft {
    /// Create a draft
    pub fn new(username: impl Into<String>, prompt: impl Into<String>, priority: Priority) -> Self {
        Self {
            username: username.into(),
            prompt: prompt.into(),
            priority,
        }
    }

    /// Whether both the trimmed username and trimmed prompt are non-empty
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        !self.username.trim().is_empty() && !self.prompt.trim().is_empty()
    }

    /// Mint a request with a fresh ID and the current time.
    ///
    /// Username and prompt are trimmed. Validation is the session's job, so
    /// this never fails.
    #[must_use]
    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest {
            username: self.username.trim().to_string(),
            request_id: RequestId::generate(),
            prompt: self.prompt.trim().to_string(),
            created_at: Utc::now(),
            priority: self.priority,
        }
    }
}

/// Body of `POST /v1/query`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Who is asking
    pub username: String,
    /// Client-generated unique ID
    pub request_id: RequestId,
    /// The prompt text
    pub prompt: String,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    /// Requested priority
    pub priority: Priority,
}

impl GenerationRequest {
    /// Recover the editable draft this request was minted from
    #[must_use]
    pub fn to_draft(&self) -> RequestDraft {
        RequestDraft::new(self.username.clone(), self.prompt.clone(), self.priority)
    }
}

/// Final result of a successfully completed request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Request ID as echoed by the server
    pub request_id: RequestId,
    /// Username as echoed by the server
    pub username: String,
    /// Full generated text
    pub text: String,
    /// Tokens consumed by the generation
    pub tokens_used: u64,
    /// Server-measured latency in milliseconds
    pub latency_ms: f64,
    /// When the request was created (server timestamp)
    pub created_at: String,
    /// When the request completed (server timestamp)
    pub completed_at: String,
}

/// Current time in the ISO-8601 form used for fallback timestamps
pub(crate) fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
