//! HTTP Backend
//!
//! Talks to the batching server over plain HTTP with reqwest. Besides the
//! streamed `/v1/query` used by sessions, it exposes the dashboard endpoints
//! (analytics, history, settings, health).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::StatusCode;
use serde_json::Value;

use super::traits::{ByteStream, QueryBackend};
use crate::api::{self, AnalyticsResponse, ChatHistoryItem, HealthResponse, SettingsUpdate};
use crate::config::ClientConfig;
use crate::error::BackendError;
use crate::request::GenerationRequest;

const QUERY_PATH: &str = "/v1/query";
const ANALYTICS_PATH: &str = "/v1/analytics";
const CHAT_PATH: &str = "/v1/chat";
const SETTINGS_PATH: &str = "/v1/settings";
const HEALTH_PATH: &str = "/health";

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// reqwest-backed client for the batching server
#[derive(Clone, Debug)]
pub struct HttpBackend {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Build a backend from resolved configuration
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidUrl`] if the base URL does not parse, or
    /// [`BackendError::Network`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, BackendError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))?;

        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    /// Build a backend for `base_url` with default timeouts
    ///
    /// # Errors
    ///
    /// See [`HttpBackend::from_config`].
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        Self::from_config(&ClientConfig::with_base_url(base_url))
    }

    /// Base URL without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fetch dashboard counters
    ///
    /// # Errors
    ///
    /// Transport failures, or a non-success status with the server's
    /// `detail` (or "Analytics failed: <status>") as the message.
    pub async fn fetch_analytics(&self) -> Result<AnalyticsResponse, BackendError> {
        let response = self.http_client.get(self.endpoint(ANALYTICS_PATH)).send().await?;
        let response = check_status(response, "Analytics failed").await?;
        Ok(response.json::<AnalyticsResponse>().await?)
    }

    /// Fetch and normalise the chat history
    ///
    /// # Errors
    ///
    /// Transport failures, or a non-success status ("Chat history failed").
    pub async fn fetch_chat_history(&self) -> Result<Vec<ChatHistoryItem>, BackendError> {
        let response = self.http_client.get(self.endpoint(CHAT_PATH)).send().await?;
        let response = check_status(response, "Chat history failed").await?;
        let body = response.json::<Value>().await?;

        let items = api::normalize_history(body);
        tracing::debug!(count = items.len(), "Fetched chat history");
        Ok(items)
    }

    /// Send a partial settings update.
    ///
    /// Returns `Ok(false)` without touching the network when the update has
    /// no populated field.
    ///
    /// # Errors
    ///
    /// Transport failures, or a non-success status ("Settings update failed").
    pub async fn put_settings(&self, update: &SettingsUpdate) -> Result<bool, BackendError> {
        let Some(body) = update.to_body() else {
            tracing::debug!("Settings update is empty, nothing to send");
            return Ok(false);
        };

        let response = self
            .http_client
            .put(self.endpoint(SETTINGS_PATH))
            .json(&body)
            .send()
            .await?;
        check_status(response, "Settings update failed").await?;

        tracing::info!("Settings updated");
        Ok(true)
    }

    /// Fetch `/health`
    ///
    /// # Errors
    ///
    /// Transport failures, or a non-success status ("Health check failed").
    pub async fn health(&self) -> Result<HealthResponse, BackendError> {
        let response = self
            .http_client
            .get(self.endpoint(HEALTH_PATH))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;
        let response = check_status(response, "Health check failed").await?;
        Ok(response.json::<HealthResponse>().await?)
    }

    /// Whether the server answers `/health` with a success status
    pub async fn health_check(&self) -> bool {
        self.health().await.is_ok()
    }
}

#[async_trait]
impl QueryBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn open_query(&self, request: &GenerationRequest) -> Result<ByteStream, BackendError> {
        tracing::debug!(
            request_id = %request.request_id,
            priority = request.priority.as_u8(),
            "POST {QUERY_PATH}"
        );

        let response = self
            .http_client
            .post(self.endpoint(QUERY_PATH))
            .json(request)
            .send()
            .await?;
        let response = check_status(response, "Request failed").await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(BackendError::from))
            .boxed())
    }
}

/// Pass a success response through; turn anything else into
/// [`BackendError::Status`] carrying the body's `detail` when present
async fn check_status(
    response: reqwest::Response,
    context: &str,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("detail").and_then(detail_message));
    let message = detail.unwrap_or_else(|| status_message(context, status));

    tracing::warn!(status = status.as_u16(), %message, "Server rejected request");
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

fn detail_message(detail: &Value) -> Option<String> {
    match detail {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// "<context>: <code> <reason>"
fn status_message(context: &str, status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{context}: {} {reason}", status.as_u16()),
        None => format!("{context}: {}", status.as_u16()),
    }
}
