//! Dashboard API Payloads
//!
//! Typed bodies for the non-streaming endpoints: analytics, chat history and
//! settings. History entries come back loosely shaped, so they are normalised
//! here into flat records with defaults filled in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::Priority;

// ============================================================================
// Analytics
// ============================================================================

/// One point of the request-count time series
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSeriesPoint {
    /// Bucket label (usually a date)
    pub date: String,
    /// Requests in the bucket
    #[serde(alias = "requests")]
    pub count: u64,
}

/// One slice of the priority distribution
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityDistributionItem {
    /// Priority name
    pub name: String,
    /// Requests with that priority
    pub value: u64,
}

/// Body of `GET /v1/analytics`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsResponse {
    /// All requests ever recorded
    pub total_requests: u64,
    /// High-priority requests
    pub high_priority: u64,
    /// Medium-priority requests
    pub medium_priority: u64,
    /// Low-priority requests
    pub low_priority: u64,
    /// Request counts over time
    pub request_count_over_time: Vec<TimeSeriesPoint>,
    /// Requests per priority
    pub priority_distribution: Vec<PriorityDistributionItem>,
}

// ============================================================================
// Chat History
// ============================================================================

/// A flattened request/response pair from `GET /v1/chat`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistoryItem {
    /// Request ID, if either side recorded one
    pub request_id: Option<String>,
    /// Who asked
    pub username: String,
    /// The prompt
    pub query: String,
    /// The generated text, if the request completed
    pub response: Option<String>,
    /// Requested priority
    pub priority: Priority,
    /// When the request was created
    pub created_at: Option<String>,
    /// When the request completed
    pub completed_at: Option<String>,
}

/// Normalise a `GET /v1/chat` body.
///
/// Accepts a bare list or a list under `chats` or `items`. Anything else is an
/// empty history.
#[must_use]
pub fn normalize_history(data: Value) -> Vec<ChatHistoryItem> {
    let list = match data {
        Value::Array(items) => items,
        Value::Object(mut map) => match (map.remove("chats"), map.remove("items")) {
            (Some(Value::Array(items)), _) | (_, Some(Value::Array(items))) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    list.iter().map(normalize_history_item).collect()
}

/// Normalise one history entry
#[must_use]
pub fn normalize_history_item(item: &Value) -> ChatHistoryItem {
    let Some(item) = item.as_object() else {
        return ChatHistoryItem::default();
    };

    let empty = Map::new();
    let request = item
        .get("request")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let response = item
        .get("response")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    ChatHistoryItem {
        request_id: lossy_string(response.get("request_id"))
            .or_else(|| lossy_string(request.get("request_id"))),
        username: lossy_string(response.get("username"))
            .or_else(|| lossy_string(request.get("username")))
            .unwrap_or_default(),
        query: lossy_string(request.get("prompt")).unwrap_or_default(),
        response: lossy_string(response.get("text")),
        priority: Priority::from_json_lossy(request.get("priority")),
        created_at: lossy_string(request.get("created_at"))
            .or_else(|| lossy_string(response.get("created_at"))),
        completed_at: lossy_string(response.get("completed_at"))
            .or_else(|| lossy_string(item.get("timestamp"))),
    }
}

/// Stringify a JSON field; missing and `null` become `None`
pub(crate) fn lossy_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Token and latency budget for one priority level
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityThreshold {
    /// Maximum tokens
    pub tokens: u64,
    /// Target latency
    pub latency: f64,
}

/// Partial update for `PUT /v1/settings`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsUpdate {
    /// Upstream API key (empty strings are not sent)
    pub api_key: Option<String>,
    /// High-priority threshold
    pub high_priority: Option<PriorityThreshold>,
    /// Medium-priority threshold
    pub medium_priority: Option<PriorityThreshold>,
    /// Low-priority threshold
    pub low_priority: Option<PriorityThreshold>,
}

impl SettingsUpdate {
    /// Request body with only the populated fields, or `None` if there are none
    #[must_use]
    pub fn to_body(&self) -> Option<Value> {
        let body = SettingsBody {
            api_key: self.api_key.as_deref().filter(|k| !k.is_empty()),
            high_priority: self.high_priority,
            medium_priority: self.medium_priority,
            low_priority: self.low_priority,
        };
        if body.is_empty() {
            return None;
        }
        serde_json::to_value(&body).ok()
    }

    /// Whether the update would send nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_body().is_none()
    }
}

#[derive(Serialize)]
struct SettingsBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    high_priority: Option<PriorityThreshold>,
    #[serde(skip_serializing_if = "Option::is_none")]
    medium_priority: Option<PriorityThreshold>,
    #[serde(skip_serializing_if = "Option::is_none")]
    low_priority: Option<PriorityThreshold>,
}

impl SettingsBody<'_> {
    fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.high_priority.is_none()
            && self.medium_priority.is_none()
            && self.low_priority.is_none()
    }
}

/// Body of `GET /health`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthResponse {
    /// "ok" when healthy
    pub status: String,
    /// Server version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_analytics_accepts_requests_alias_and_missing_fields() {
        let body = json!({
            "total_requests": 10,
            "high_priority": 4,
            "request_count_over_time": [
                {"date": "2025-01-01", "count": 3},
                {"date": "2025-01-02", "requests": 7},
                {"date": "2025-01-03"}
            ],
            "priority_distribution": [{"name": "High", "value": 4}]
        });
        let analytics: AnalyticsResponse = serde_json::from_value(body).unwrap();

        assert_eq!(analytics.total_requests, 10);
        assert_eq!(analytics.medium_priority, 0);
        let counts: Vec<u64> = analytics
            .request_count_over_time
            .iter()
            .map(|p| p.count)
            .collect();
        assert_eq!(counts, vec![3, 7, 0]);
        assert_eq!(analytics.priority_distribution[0].name, "High");
    }

    #[test]
    fn test_history_wrapped_under_chats() {
        let body = json!({
            "chats": [{
                "timestamp": "2025-01-01T10:00:05",
                "request": {
                    "username": "ana",
                    "request_id": "req-1",
                    "prompt": "What is Rust?",
                    "created_at": "2025-01-01T10:00:00",
                    "priority": 2
                },
                "response": {
                    "request_id": "req-1",
                    "username": "ana",
                    "text": "A language.",
                    "tokens_used": 3,
                    "latency_ms": 120.0,
                    "created_at": "2025-01-01T10:00:00",
                    "completed_at": "2025-01-01T10:00:04"
                }
            }],
            "count": 1
        });

        let items = normalize_history(body);
        assert_eq!(
            items,
            vec![ChatHistoryItem {
                request_id: Some("req-1".to_string()),
                username: "ana".to_string(),
                query: "What is Rust?".to_string(),
                response: Some("A language.".to_string()),
                priority: Priority::High,
                created_at: Some("2025-01-01T10:00:00".to_string()),
                completed_at: Some("2025-01-01T10:00:04".to_string()),
            }]
        );
    }

    #[test]
    fn test_history_defaults() {
        let body = json!([
            "not an object",
            {"request": {"username": "bo", "prompt": "hi", "priority": "high"}, "timestamp": "t"},
            {"request": {"prompt": 42}, "response": {"username": null}}
        ]);

        let items = normalize_history(body);
        assert_eq!(items.len(), 3);

        assert_eq!(items[0], ChatHistoryItem::default());
        assert_eq!(items[0].priority, Priority::Medium);

        assert_eq!(items[1].username, "bo");
        assert_eq!(items[1].priority, Priority::Medium);
        assert_eq!(items[1].response, None);
        assert_eq!(items[1].completed_at.as_deref(), Some("t"));

        assert_eq!(items[2].username, "");
        assert_eq!(items[2].query, "42");
    }

    #[test]
    fn test_history_items_key_and_garbage() {
        let items = normalize_history(json!({"items": [{"request": {"prompt": "p"}}]}));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].query, "p");

        assert!(normalize_history(json!({"chats": null})).is_empty());
        assert!(normalize_history(json!("nope")).is_empty());
    }

    #[test]
    fn test_settings_body_omits_empty_fields() {
        let update = SettingsUpdate {
            api_key: Some(String::new()),
            high_priority: Some(PriorityThreshold {
                tokens: 512,
                latency: 100.0,
            }),
            ..Default::default()
        };

        assert_eq!(
            update.to_body(),
            Some(json!({"high_priority": {"tokens": 512, "latency": 100.0}}))
        );
    }

    #[test]
    fn test_settings_body_with_every_field() {
        let update = SettingsUpdate {
            api_key: Some("sk-test".to_string()),
            high_priority: Some(PriorityThreshold {
                tokens: 1024,
                latency: 500.0,
            }),
            medium_priority: Some(PriorityThreshold {
                tokens: 256,
                latency: 1500.5,
            }),
            low_priority: Some(PriorityThreshold {
                tokens: 64,
                latency: 3000.0,
            }),
        };

        assert_eq!(
            update.to_body(),
            Some(json!({
                "api_key": "sk-test",
                "high_priority": {"tokens": 1024, "latency": 500.0},
                "medium_priority": {"tokens": 256, "latency": 1500.5},
                "low_priority": {"tokens": 64, "latency": 3000.0},
            }))
        );
    }

    #[test]
    fn test_settings_empty_update() {
        assert!(SettingsUpdate::default().is_empty());
        let blank_key = SettingsUpdate {
            api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(blank_key.to_body().is_none());
    }
}
