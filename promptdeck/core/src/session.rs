//! Request Sessions
//!
//! The lifecycle of one submitted generation request.
//!
//! # State Machine
//!
//! ```text
//!   Idle ──submit──▶ Submitting ──accepted──▶ Streaming ──done──▶ Completed
//!                        │                      │  ▲
//!                        │                      │  └── text (append)
//!                        │                      │
//!                        └──rejected──┐         └──error / transport / EOF──┐
//!                                     ▼                                     ▼
//!                                   Failed ◀──────────────────────────────────
//! ```
//!
//! Every transition takes the session by value and returns the next one, so a
//! session is a plain value that can be snapshotted and published after each
//! step. `Completed` and `Failed` are terminal: all later inputs are ignored and
//! the first terminal transition wins.

use serde::{Deserialize, Serialize};

use crate::error::SessionFailure;
use crate::request::{now_iso8601, GenerationRequest, GenerationResult, RequestDraft, RequestId};
use crate::streaming::{DoneEvent, ResponseAccumulator, StreamEvent};

/// Lifecycle state of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, not yet submitted
    Idle,
    /// Submitted, waiting for the server to start the response body
    Submitting,
    /// Receiving events
    Streaming,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
}

impl SessionState {
    /// Whether no further transition is possible
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether the request is on the wire
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Submitting | Self::Streaming)
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Submitting => "Submitting",
            Self::Streaming => "Streaming",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

/// How a terminal session ended
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SessionOutcome {
    /// The server finished the generation
    Completed(GenerationResult),
    /// The request failed
    Failed(SessionFailure),
}

/// One request's lifecycle record
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSession {
    request: GenerationRequest,
    state: SessionState,
    accumulator: ResponseAccumulator,
    outcome: Option<SessionOutcome>,
}

impl RequestSession {
    /// Create an idle session for `request`
    #[must_use]
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            request,
            state: SessionState::Idle,
            accumulator: ResponseAccumulator::new(),
            outcome: None,
        }
    }

    /// Create an idle session for a fresh request minted from `draft`
    #[must_use]
    pub fn from_draft(draft: &RequestDraft) -> Self {
        Self::new(draft.to_request())
    }

    /// The request this session owns
    #[must_use]
    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// The client-generated request ID
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.request.request_id
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session has finished
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Text accumulated so far (empty once the session has failed)
    #[must_use]
    pub fn text(&self) -> &str {
        self.accumulator.as_str()
    }

    /// The frozen result, once completed
    #[must_use]
    pub fn result(&self) -> Option<&GenerationResult> {
        match &self.outcome {
            Some(SessionOutcome::Completed(result)) => Some(result),
            _ => None,
        }
    }

    /// The failure, once failed
    #[must_use]
    pub fn failure(&self) -> Option<&SessionFailure> {
        match &self.outcome {
            Some(SessionOutcome::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    /// The terminal outcome, if any
    #[must_use]
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// What a surface should display for this session right now.
    ///
    /// Partial text while streaming, the result text once completed, and only
    /// the error message once failed.
    #[must_use]
    pub fn visible_output(&self) -> &str {
        match &self.outcome {
            Some(SessionOutcome::Completed(result)) => &result.text,
            Some(SessionOutcome::Failed(failure)) => &failure.message,
            None => self.accumulator.as_str(),
        }
    }

    /// `Idle → Submitting`.
    ///
    /// A no-op when the trimmed username or prompt is empty, or when the
    /// session is not idle.
    #[must_use]
    pub fn submit(mut self) -> Self {
        if self.state != SessionState::Idle {
            return self;
        }
        if self.request.username.trim().is_empty() || self.request.prompt.trim().is_empty() {
            tracing::debug!(request_id = %self.request.request_id, "Ignoring submit of empty request");
            return self;
        }
        self.state = SessionState::Submitting;
        self
    }

    /// `Submitting → Streaming`, once the server starts the response body
    #[must_use]
    pub fn begin_streaming(mut self) -> Self {
        if self.state == SessionState::Submitting {
            self.state = SessionState::Streaming;
        }
        self
    }

    /// Apply one decoded event
    #[must_use]
    pub fn apply(mut self, event: &StreamEvent) -> Self {
        if self.state != SessionState::Streaming {
            if self.is_terminal() {
                tracing::trace!(
                    request_id = %self.request.request_id,
                    state = self.state.label(),
                    "Ignoring event for finished session"
                );
            }
            return self;
        }

        match event {
            StreamEvent::Text { content } => {
                self.accumulator.push(content);
                self
            }
            StreamEvent::Done(done) => self.complete(done),
            StreamEvent::Error { message } => self.fail(SessionFailure::stream(message.clone())),
        }
    }

    /// The response body ended
    #[must_use]
    pub fn end_of_stream(self) -> Self {
        if self.state == SessionState::Streaming {
            self.fail(SessionFailure::incomplete())
        } else {
            self
        }
    }

    /// `Submitting | Streaming → Failed`.
    ///
    /// Text accumulated so far is discarded.
    #[must_use]
    pub fn fail(mut self, failure: SessionFailure) -> Self {
        if !self.state.is_in_flight() {
            return self;
        }
        tracing::debug!(
            request_id = %self.request.request_id,
            kind = ?failure.kind,
            error = %failure,
            discarded_bytes = self.accumulator.len(),
            "Session failed"
        );
        self.state = SessionState::Failed;
        self.accumulator = ResponseAccumulator::new();
        self.outcome = Some(SessionOutcome::Failed(failure));
        self
    }

    fn complete(mut self, done: &DoneEvent) -> Self {
        let Some(request_id) = done.request_id.as_deref().filter(|id| !id.is_empty()) else {
            return self.fail(SessionFailure::incomplete());
        };

        let result = GenerationResult {
            request_id: RequestId::new(request_id),
            username: done
                .username
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| self.request.username.clone()),
            text: self.accumulator.as_str().to_string(),
            tokens_used: done.tokens_used.unwrap_or(0),
            latency_ms: done.latency_ms.unwrap_or(0.0),
            created_at: done.created_at.clone().unwrap_or_else(now_iso8601),
            completed_at: done.completed_at.clone().unwrap_or_else(now_iso8601),
        };

        self.state = SessionState::Completed;
        self.outcome = Some(SessionOutcome::Completed(result));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::request::Priority;
    use pretty_assertions::assert_eq;

    fn streaming_session() -> RequestSession {
        RequestSession::from_draft(&RequestDraft::new("ana", "Say hello", Priority::Medium))
            .submit()
            .begin_streaming()
    }

    fn text(content: &str) -> StreamEvent {
        StreamEvent::Text {
            content: content.to_string(),
        }
    }

    fn done(request_id: &str) -> StreamEvent {
        StreamEvent::Done(DoneEvent {
            request_id: Some(request_id.to_string()),
            username: Some("ana".to_string()),
            tokens_used: Some(3),
            latency_ms: Some(41.5),
            created_at: Some("2025-01-01T00:00:00".to_string()),
            completed_at: Some("2025-01-01T00:00:02".to_string()),
        })
    }

    fn run(session: RequestSession, events: &[StreamEvent]) -> RequestSession {
        events.iter().fold(session, RequestSession::apply)
    }

    #[test]
    fn test_lifecycle_to_completed() {
        let session = RequestSession::from_draft(&RequestDraft::new("ana", "hi", Priority::High));
        assert_eq!(session.state(), SessionState::Idle);

        let session = session.submit();
        assert_eq!(session.state(), SessionState::Submitting);

        let session = session.begin_streaming();
        assert_eq!(session.state(), SessionState::Streaming);

        let session = run(session, &[text("Hel"), text("lo"), done("srv-1")]);
        assert_eq!(session.state(), SessionState::Completed);

        let result = session.result().unwrap();
        assert_eq!(result.text, "Hello");
        assert_eq!(result.request_id.as_str(), "srv-1");
        assert_eq!(result.tokens_used, 3);
        assert_eq!(result.latency_ms, 41.5);
        assert_eq!(result.completed_at, "2025-01-01T00:00:02");
        assert_eq!(session.visible_output(), "Hello");
    }

    #[test]
    fn test_text_is_visible_while_streaming() {
        let session = run(streaming_session(), &[text("Hel")]);
        assert_eq!(session.state(), SessionState::Streaming);
        assert_eq!(session.visible_output(), "Hel");
        assert!(session.result().is_none());
    }

    #[test]
    fn test_done_without_text_yields_empty_result() {
        let session = run(streaming_session(), &[done("srv-2")]);
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.result().unwrap().text, "");
    }

    #[test]
    fn test_error_discards_partial_text() {
        let session = run(
            streaming_session(),
            &[
                text("ab"),
                text("cd"),
                StreamEvent::Error {
                    message: "x".to_string(),
                },
            ],
        );

        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.visible_output(), "x");
        assert_eq!(session.text(), "");
        assert_eq!(session.failure().unwrap().kind, FailureKind::Stream);
    }

    #[test]
    fn test_empty_username_or_prompt_stays_idle() {
        for draft in [
            RequestDraft::new("", "prompt", Priority::Low),
            RequestDraft::new("ana", "", Priority::Low),
            RequestDraft::new("ana", "   \t", Priority::Low),
        ] {
            let session = RequestSession::from_draft(&draft).submit();
            assert_eq!(session.state(), SessionState::Idle);
            assert!(session.outcome().is_none());
        }
    }

    #[test]
    fn test_duplicate_done_is_ignored() {
        let session = run(streaming_session(), &[text("one"), done("first")]);
        let before = session.clone();

        let session = run(session, &[text("two"), done("second")]);
        assert_eq!(session, before);
        assert_eq!(session.result().unwrap().request_id.as_str(), "first");
    }

    #[test]
    fn test_error_after_completion_is_ignored() {
        let session = run(streaming_session(), &[done("srv")]);
        let session = session.apply(&StreamEvent::Error {
            message: "late".to_string(),
        });
        let session = session.fail(SessionFailure::transport("late transport"));
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_first_failure_wins() {
        let session = streaming_session()
            .fail(SessionFailure::transport("connection reset"))
            .fail(SessionFailure::cancelled());
        assert_eq!(session.visible_output(), "connection reset");
    }

    #[test]
    fn test_done_without_request_id_is_incomplete() {
        let session = run(
            streaming_session(),
            &[text("abc"), StreamEvent::Done(DoneEvent::default())],
        );
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.visible_output(), "Incomplete response from server");

        let session = run(streaming_session(), &[done("")]);
        assert_eq!(session.failure().unwrap().kind, FailureKind::Incomplete);
    }

    #[test]
    fn test_done_fallbacks() {
        let session = run(
            streaming_session(),
            &[StreamEvent::Done(DoneEvent {
                request_id: Some("srv".to_string()),
                ..Default::default()
            })],
        );
        let result = session.result().unwrap();
        assert_eq!(result.username, "ana");
        assert_eq!(result.tokens_used, 0);
        assert_eq!(result.latency_ms, 0.0);
        assert!(!result.created_at.is_empty());
        assert!(!result.completed_at.is_empty());
    }

    #[test]
    fn test_end_of_stream_without_done() {
        let session = run(streaming_session(), &[text("partial")]).end_of_stream();
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.visible_output(), "Incomplete response from server");
    }

    #[test]
    fn test_end_of_stream_after_done_keeps_result() {
        let session = run(streaming_session(), &[text("ok"), done("srv")]).end_of_stream();
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.visible_output(), "ok");
    }

    #[test]
    fn test_rejected_before_streaming() {
        let session = RequestSession::from_draft(&RequestDraft::new("ana", "hi", Priority::Low))
            .submit()
            .fail(SessionFailure::transport("Request failed: 503 Service Unavailable"));
        assert_eq!(session.state(), SessionState::Failed);
        assert_eq!(session.failure().unwrap().kind, FailureKind::Transport);
    }

    #[test]
    fn test_events_before_streaming_are_ignored() {
        let session = RequestSession::from_draft(&RequestDraft::new("ana", "hi", Priority::Low))
            .submit()
            .apply(&text("early"));
        assert_eq!(session.state(), SessionState::Submitting);
        assert_eq!(session.text(), "");
    }

    #[test]
    fn test_idle_session_cannot_fail() {
        let session = RequestSession::from_draft(&RequestDraft::default())
            .fail(SessionFailure::transport("nope"));
        assert_eq!(session.state(), SessionState::Idle);
    }
}
