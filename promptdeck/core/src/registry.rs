//! Session Registry - Concurrent Request Fan-Out
//!
//! Owns every live [`RequestSession`], keyed by request ID, and drives each
//! one on its own task. Surfaces hold [`SessionHandle`]s and observe the
//! latest snapshot of a session without ever mutating it.
//!
//! # Architecture
//!
//! ```text
//!   submit_all([d1, d2, d3])
//!        │
//!        │  phase 1 (sync): validate, mark Submitting, register
//!        ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │ DashMap<RequestId, SessionEntry>                     │
//!   │  watch::Receiver<Arc<RequestSession>> + cancel token │
//!   └──────┬──────────────────┬──────────────────┬─────────┘
//!          │ phase 2: spawn   │                  │
//!   ┌──────▼──────┐    ┌──────▼──────┐    ┌──────▼──────┐
//!   │ drive(d1)   │    │ drive(d2)   │    │ drive(d3)   │
//!   │ open_query  │    │ open_query  │    │ open_query  │
//!   │ decode/apply│    │ decode/apply│    │ decode/apply│
//!   └─────────────┘    └─────────────┘    └─────────────┘
//! ```
//!
//! Each driver owns the only `watch::Sender` of its session, so the channel
//! closes when the driver returns. A failure in one driver never touches
//! another; the batch as a whole has no outcome.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::backend::QueryBackend;
use crate::error::SessionFailure;
use crate::request::{RequestDraft, RequestId};
use crate::session::{RequestSession, SessionState};
use crate::streaming::StreamDecoder;

type SessionSender = watch::Sender<Arc<RequestSession>>;
type SessionReceiver = watch::Receiver<Arc<RequestSession>>;

/// Read-only view of one session
///
/// Cloning a handle is cheap; every clone sees the same session.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: RequestId,
    rx: SessionReceiver,
}

impl SessionHandle {
    /// Request ID of the observed session
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Latest published snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<RequestSession> {
        Arc::clone(&self.rx.borrow())
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.rx.borrow().state()
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the terminal snapshot has been seen and the driver
    /// has stopped.
    pub async fn changed(&mut self) -> Option<Arc<RequestSession>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }

    /// Wait until the session is terminal and return the final snapshot
    pub async fn wait(mut self) -> Arc<RequestSession> {
        loop {
            let current = Arc::clone(&self.rx.borrow_and_update());
            if current.is_terminal() {
                return current;
            }
            if self.rx.changed().await.is_err() {
                return Arc::clone(&self.rx.borrow());
            }
        }
    }
}

/// Counts of registered sessions per state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegistrySummary {
    /// Registered sessions
    pub total: usize,
    /// Waiting for the server
    pub submitting: usize,
    /// Receiving text
    pub streaming: usize,
    /// Finished with a result
    pub completed: usize,
    /// Finished with an error
    pub failed: usize,
}

impl RegistrySummary {
    /// Sessions not yet terminal
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.submitting + self.streaming
    }
}

#[derive(Debug)]
struct SessionEntry {
    rx: SessionReceiver,
    cancel: CancellationToken,
}

/// A session registered but not yet running
struct PendingLaunch {
    session: RequestSession,
    publisher: SessionSender,
    cancel: CancellationToken,
}

/// Validate drafts and mark the valid ones `Submitting`.
///
/// Invalid drafts (empty trimmed username or prompt) are dropped; order of
/// the rest is kept. Nothing is registered or sent.
#[must_use]
pub fn prepare_batch(drafts: &[RequestDraft]) -> Vec<RequestSession> {
    drafts
        .iter()
        .filter(|draft| draft.is_submittable())
        .map(|draft| RequestSession::from_draft(draft).submit())
        .filter(|session| session.state() == SessionState::Submitting)
        .collect()
}

/// Registry of live sessions over one backend
pub struct SessionRegistry<B: QueryBackend + 'static> {
    backend: Arc<B>,
    sessions: Arc<DashMap<RequestId, SessionEntry>>,
}

impl<B: QueryBackend + 'static> Clone for SessionRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

impl<B: QueryBackend + 'static> SessionRegistry<B> {
    /// Create an empty registry over `backend`
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_shared_backend(Arc::new(backend))
    }

    /// Create an empty registry over a shared backend
    #[must_use]
    pub fn with_shared_backend(backend: Arc<B>) -> Self {
        Self {
            backend,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// The backend sessions are driven against
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Submit a single draft.
    ///
    /// Returns `None` (and sends nothing) when the draft is invalid.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit_one(&self, draft: &RequestDraft) -> Option<SessionHandle> {
        self.submit_all(std::slice::from_ref(draft)).pop()
    }

    /// Submit every valid draft concurrently.
    ///
    /// All valid sessions are registered as `Submitting` before any request
    /// leaves, so observers never see a half-launched batch. Handles come back
    /// in draft order.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit_all(&self, drafts: &[RequestDraft]) -> Vec<SessionHandle> {
        let prepared = prepare_batch(drafts);
        let skipped = drafts.len() - prepared.len();
        if skipped > 0 {
            tracing::debug!(skipped, "Skipping drafts with empty username or prompt");
        }
        if prepared.is_empty() {
            return Vec::new();
        }

        let (handles, launches): (Vec<_>, Vec<_>) =
            prepared.into_iter().map(|s| self.register(s)).unzip();

        tracing::info!(count = launches.len(), "Submitting batch");
        for launch in launches {
            self.launch(launch);
        }

        handles
    }

    fn register(&self, session: RequestSession) -> (SessionHandle, PendingLaunch) {
        let id = session.id().clone();
        let (publisher, rx) = watch::channel(Arc::new(session.clone()));
        let cancel = CancellationToken::new();

        let entry = SessionEntry {
            rx: rx.clone(),
            cancel: cancel.clone(),
        };
        if let Some(previous) = self.sessions.insert(id.clone(), entry) {
            tracing::warn!(request_id = %id, "Replacing live session with duplicate ID");
            previous.cancel.cancel();
        }

        let handle = SessionHandle { id, rx };
        let launch = PendingLaunch {
            session,
            publisher,
            cancel,
        };
        (handle, launch)
    }

    fn launch(&self, launch: PendingLaunch) {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(drive(
            backend,
            launch.session,
            launch.publisher,
            launch.cancel,
        ));
    }

    /// Observe a registered session
    #[must_use]
    pub fn get(&self, id: &RequestId) -> Option<SessionHandle> {
        self.sessions.get(id).map(|entry| {
            let mut rx = entry.rx.clone();
            rx.mark_unchanged();
            SessionHandle { id: id.clone(), rx }
        })
    }

    /// Latest snapshot of a registered session
    #[must_use]
    pub fn snapshot(&self, id: &RequestId) -> Option<Arc<RequestSession>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(&entry.rx.borrow()))
    }

    /// Remove a session, cancelling it if still in flight.
    ///
    /// Existing handles observe the `Cancelled` failure. Returns whether the
    /// session was registered.
    pub fn discard(&self, id: &RequestId) -> bool {
        match self.sessions.remove(id) {
            Some((_, entry)) => {
                entry.cancel.cancel();
                tracing::debug!(request_id = %id, "Session discarded");
                true
            }
            None => false,
        }
    }

    /// Submit the same username, prompt and priority again under a fresh ID,
    /// discarding the old session
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn resubmit(&self, id: &RequestId) -> Option<SessionHandle> {
        let draft = self.snapshot(id)?.request().to_draft();
        self.discard(id);
        self.submit_one(&draft)
    }

    /// Drop every terminal session, returning how many were removed
    pub fn clear_finished(&self) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| !entry.rx.borrow().is_terminal());
        before - self.sessions.len()
    }

    /// Cancel and remove every session
    pub fn cancel_all(&self) {
        for entry in self.sessions.iter() {
            entry.cancel.cancel();
        }
        self.sessions.clear();
    }

    /// Counts per state
    #[must_use]
    pub fn summary(&self) -> RegistrySummary {
        let mut summary = RegistrySummary::default();
        for entry in self.sessions.iter() {
            summary.total += 1;
            match entry.rx.borrow().state() {
                SessionState::Idle => {}
                SessionState::Submitting => summary.submitting += 1,
                SessionState::Streaming => summary.streaming += 1,
                SessionState::Completed => summary.completed += 1,
                SessionState::Failed => summary.failed += 1,
            }
        }
        summary
    }

    /// Latest snapshots keyed by ID
    #[must_use]
    pub fn snapshots(&self) -> HashMap<RequestId, Arc<RequestSession>> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(&entry.rx.borrow())))
            .collect()
    }

    /// IDs of registered sessions
    #[must_use]
    pub fn ids(&self) -> Vec<RequestId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn publish(publisher: &SessionSender, session: &RequestSession) {
    publisher.send_replace(Arc::new(session.clone()));
}

/// What observers can see change: the state and the amount of text
fn progress(session: &RequestSession) -> (SessionState, usize) {
    (session.state(), session.text().len())
}

/// Run one session from `Submitting` to a terminal state
async fn drive<B: QueryBackend + ?Sized>(
    backend: Arc<B>,
    mut session: RequestSession,
    publisher: SessionSender,
    cancel: CancellationToken,
) {
    let request_id = session.id().clone();
    tracing::debug!(request_id = %request_id, backend = backend.name(), "Opening query stream");

    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        opened = backend.open_query(session.request()) => Some(opened),
    };

    let mut stream = match opened {
        Some(Ok(stream)) => stream,
        Some(Err(e)) => {
            tracing::warn!(request_id = %request_id, error = %e, "Query rejected");
            session = session.fail(SessionFailure::from(&e));
            publish(&publisher, &session);
            return;
        }
        None => {
            session = session.fail(SessionFailure::cancelled());
            publish(&publisher, &session);
            return;
        }
    };

    session = session.begin_streaming();
    publish(&publisher, &session);

    let mut decoder = StreamDecoder::new();
    while !session.is_terminal() {
        let before = progress(&session);
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            next = stream.next() => Some(next),
        };

        session = match next {
            Some(Some(Ok(fragment))) => decoder
                .push(&fragment)
                .iter()
                .fold(session, RequestSession::apply),
            Some(Some(Err(e))) => {
                tracing::warn!(request_id = %request_id, error = %e, "Stream read failed");
                session.fail(SessionFailure::from(&e))
            }
            Some(None) => decoder
                .finish()
                .iter()
                .fold(session, RequestSession::apply)
                .end_of_stream(),
            None => session.fail(SessionFailure::cancelled()),
        };
        if progress(&session) != before {
            publish(&publisher, &session);
        }
    }

    tracing::info!(
        request_id = %request_id,
        state = session.state().label(),
        chars = session.visible_output().len(),
        malformed_lines = decoder.malformed_lines(),
        "Session finished"
    );
}
