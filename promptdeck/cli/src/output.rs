//! Terminal formatting for command results
//!
//! Everything here is pure so the CLI's output can be tested without a
//! server.

use serde::Serialize;

use promptdeck_core::{
    AnalyticsResponse, ChatHistoryItem, FailureKind, PriorityThreshold, RequestSession,
    SessionState,
};

/// One finished session as printed by `batch`
#[derive(Debug, Serialize, PartialEq)]
pub struct SessionReport {
    pub request_id: String,
    pub username: String,
    pub prompt: String,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
}

impl SessionReport {
    pub fn from_session(session: &RequestSession) -> Self {
        let request = session.request();
        let result = session.result();
        let failure = session.failure();

        Self {
            request_id: result.map_or_else(
                || request.request_id.to_string(),
                |r| r.request_id.to_string(),
            ),
            username: request.username.clone(),
            prompt: request.prompt.clone(),
            state: session.state().label(),
            text: result.map(|r| r.text.clone()),
            error: failure.map(|f| f.message.clone()),
            failure: failure.map(|f| f.kind),
            tokens_used: result.map(|r| r.tokens_used),
            latency_ms: result.map(|r| r.latency_ms),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == SessionState::Completed.label()
    }
}

/// The part of `current` not yet written, given `printed` bytes already out
pub fn unseen_suffix(current: &str, printed: usize) -> &str {
    current.get(printed..).unwrap_or("")
}

/// Parse `TOKENS:LATENCY` into a threshold
pub fn parse_threshold(raw: &str) -> Result<PriorityThreshold, String> {
    let (tokens, latency) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected TOKENS:LATENCY, got '{raw}'"))?;

    let tokens = tokens
        .trim()
        .parse::<u64>()
        .map_err(|e| format!("invalid token count '{tokens}': {e}"))?;
    let latency = latency
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid latency '{latency}': {e}"))?;
    if !latency.is_finite() || latency < 0.0 {
        return Err(format!("latency must be a non-negative number, got {latency}"));
    }

    Ok(PriorityThreshold { tokens, latency })
}

pub fn render_analytics(analytics: &AnalyticsResponse) -> String {
    let mut out = String::new();
    out.push_str(&format!("Total requests:  {}\n", analytics.total_requests));
    out.push_str(&format!("  High:          {}\n", analytics.high_priority));
    out.push_str(&format!("  Medium:        {}\n", analytics.medium_priority));
    out.push_str(&format!("  Low:           {}\n", analytics.low_priority));

    if !analytics.request_count_over_time.is_empty() {
        out.push_str("\nRequests over time:\n");
        for point in &analytics.request_count_over_time {
            out.push_str(&format!("  {:<12} {}\n", point.date, point.count));
        }
    }
    out
}

pub fn render_history(items: &[ChatHistoryItem]) -> String {
    if items.is_empty() {
        return "No chat history.\n".to_string();
    }

    let mut out = String::new();
    for item in items {
        let when = item
            .completed_at
            .as_deref()
            .or(item.created_at.as_deref())
            .unwrap_or("-");
        out.push_str(&format!(
            "[{when}] {} ({}): {}\n",
            display_or_dash(&item.username),
            item.priority.label(),
            item.query
        ));
        match &item.response {
            Some(text) => out.push_str(&format!("  -> {text}\n")),
            None => out.push_str("  -> (no response)\n"),
        }
    }
    out
}

fn display_or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use promptdeck_core::{Priority, TimeSeriesPoint};

    #[test]
    fn test_unseen_suffix() {
        assert_eq!(unseen_suffix("Hello", 0), "Hello");
        assert_eq!(unseen_suffix("Hello", 3), "lo");
        assert_eq!(unseen_suffix("Hello", 5), "");
        assert_eq!(unseen_suffix("Hi", 9), "");
    }

    #[test]
    fn test_parse_threshold() {
        assert_eq!(
            parse_threshold("512:100").unwrap(),
            PriorityThreshold {
                tokens: 512,
                latency: 100.0
            }
        );
        assert_eq!(parse_threshold(" 64 : 2.5 ").unwrap().latency, 2.5);
        assert!(parse_threshold("512").is_err());
        assert!(parse_threshold("x:1").is_err());
        assert!(parse_threshold("1:-4").is_err());
    }

    #[test]
    fn test_render_analytics() {
        let analytics = AnalyticsResponse {
            total_requests: 3,
            high_priority: 1,
            medium_priority: 1,
            low_priority: 1,
            request_count_over_time: vec![TimeSeriesPoint {
                date: "2025-01-01".to_string(),
                count: 3,
            }],
            priority_distribution: Vec::new(),
        };

        let text = render_analytics(&analytics);
        assert!(text.starts_with("Total requests:  3\n"));
        assert!(text.contains("  2025-01-01   3\n"));
    }

    #[test]
    fn test_render_history() {
        let items = vec![
            ChatHistoryItem {
                username: "ana".to_string(),
                query: "hi".to_string(),
                response: Some("hello".to_string()),
                priority: Priority::High,
                completed_at: Some("t1".to_string()),
                ..Default::default()
            },
            ChatHistoryItem::default(),
        ];

        assert_eq!(
            render_history(&items),
            "[t1] ana (High): hi\n  -> hello\n[-] - (Medium): \n  -> (no response)\n"
        );
        assert_eq!(render_history(&[]), "No chat history.\n");
    }
}
