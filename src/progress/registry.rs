use crate::progress::session::{
    percentage, ProgressFrame, ProgressSnapshot, ProgressStatus, ProgressUpdate,
};
use crate::{InstapressError, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Live state of one session
struct Session {
    operation: String,
    total_steps: u64,
    current_step: u64,
    status: ProgressStatus,
    message: String,
    details: Map<String, Value>,
    started_at: DateTime<Utc>,
    started: Instant,
    finished: Option<Instant>,
    cancel: CancellationToken,
    /// Bumped on every change so subscribers wake up
    version: watch::Sender<u64>,
}

impl Session {
    fn snapshot(&self, session_id: Uuid) -> ProgressSnapshot {
        ProgressSnapshot {
            session_id,
            operation: self.operation.clone(),
            status: self.status,
            current_step: self.current_step,
            total_steps: self.total_steps,
            percentage: percentage(self.current_step, self.total_steps),
            message: self.message.clone(),
            details: self.details.clone(),
            started_at: self.started_at,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }

    fn finish(&mut self, status: ProgressStatus) {
        self.status = status;
        self.finished = Some(Instant::now());
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }
}

/// Registry of live progress sessions keyed by handle
///
/// Cheap to clone; clones share the same table. Sessions stay in the table
/// after reaching a terminal status until a subscriber delivers the final
/// frame ([`ProgressRegistry::subscribe`]), the owner calls
/// [`ProgressRegistry::retire`], or [`ProgressRegistry::reap_terminal`]
/// collects them.
#[derive(Clone, Default)]
pub struct ProgressRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a session in `Starting` state and returns its handle
    pub fn create_session(&self, operation: &str, total_steps: u64) -> Uuid {
        let id = Uuid::new_v4();
        let (version, _) = watch::channel(0);
        let session = Session {
            operation: operation.to_string(),
            total_steps,
            current_step: 0,
            status: ProgressStatus::Starting,
            message: "Initializing...".to_string(),
            details: Map::new(),
            started_at: Utc::now(),
            started: Instant::now(),
            finished: None,
            cancel: CancellationToken::new(),
            version,
        };

        self.table().insert(id, session);
        tracing::debug!(session = %id, "Created progress session: {}", operation);
        id
    }

    /// Applies a partial update
    ///
    /// Steps beyond the total are stored as given and clamped only in the
    /// derived percentage. Updates to a session that already reached a
    /// terminal status are ignored.
    pub fn update(&self, id: Uuid, update: ProgressUpdate) -> Result<()> {
        let mut table = self.table();
        let session = table
            .get_mut(&id)
            .ok_or(InstapressError::SessionNotFound(id))?;

        if session.status.is_terminal() {
            tracing::debug!(session = %id, "Ignoring update to finished session");
            return Ok(());
        }

        if let Some(step) = update.step {
            session.current_step = step;
        }
        if let Some(message) = update.message {
            session.message = message;
        }
        if let Some(details) = update.details {
            session.details.extend(details);
        }
        match update.status {
            Some(status) if status.is_terminal() => session.finish(status),
            Some(status) => session.status = status,
            None => {}
        }

        session.notify();
        Ok(())
    }

    /// Marks the session `Complete` with `step == total`
    pub fn complete(&self, id: Uuid, message: Option<&str>) -> Result<()> {
        self.finish(id, ProgressStatus::Complete, message, |session| {
            session.current_step = session.total_steps;
        })
    }

    /// Marks the session `Error`
    pub fn fail(&self, id: Uuid, message: &str) -> Result<()> {
        self.finish(id, ProgressStatus::Error, Some(message), |_| {})
    }

    /// Marks the session `Cancelled` and trips its cancellation token
    ///
    /// Work already in flight is not interrupted; the owner notices at its
    /// next check and stops issuing new work.
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        let token = self.cancellation_token(id)?;
        self.finish(id, ProgressStatus::Cancelled, Some("Cancelled by request"), |_| {})?;
        token.cancel();
        tracing::info!(session = %id, "Progress session cancelled");
        Ok(())
    }

    /// Current snapshot, or `None` once the session has been removed
    pub fn read(&self, id: Uuid) -> Option<ProgressSnapshot> {
        self.table().get(&id).map(|s| s.snapshot(id))
    }

    pub fn is_cancelled(&self, id: Uuid) -> bool {
        self.table()
            .get(&id)
            .map(|s| s.status == ProgressStatus::Cancelled)
            .unwrap_or(false)
    }

    /// Token tripped when the session is cancelled
    pub fn cancellation_token(&self, id: Uuid) -> Result<CancellationToken> {
        self.table()
            .get(&id)
            .map(|s| s.cancel.clone())
            .ok_or(InstapressError::SessionNotFound(id))
    }

    /// Removes a session; returns whether it existed
    pub fn retire(&self, id: Uuid) -> bool {
        let removed = self.table().remove(&id).is_some();
        if removed {
            tracing::debug!(session = %id, "Retired progress session");
        }
        removed
    }

    /// Removes sessions that finished at least `grace` ago
    pub fn reap_terminal(&self, grace: Duration) -> usize {
        let mut table = self.table();
        let before = table.len();
        table.retain(|_, s| match s.finished {
            Some(finished) => finished.elapsed() < grace,
            None => true,
        });
        before - table.len()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Push stream of frames for one session
    ///
    /// Emits `connected`, then a `progress` frame whenever the snapshot
    /// changes (elapsed time alone does not count), and finally one
    /// `complete` or `error` frame, after which the session is retired and
    /// the stream ends. Returns `None` for an unknown handle.
    pub fn subscribe(&self, id: Uuid) -> Option<BoxStream<'static, ProgressFrame>> {
        let rx = self.table().get(&id)?.version.subscribe();

        let state = StreamState {
            registry: self.clone(),
            id,
            rx,
            last: None,
            phase: Phase::Connect,
        };

        Some(stream::unfold(state, next_frame).boxed())
    }

    fn finish(
        &self,
        id: Uuid,
        status: ProgressStatus,
        message: Option<&str>,
        apply: impl FnOnce(&mut Session),
    ) -> Result<()> {
        let mut table = self.table();
        let session = table
            .get_mut(&id)
            .ok_or(InstapressError::SessionNotFound(id))?;

        if session.status.is_terminal() {
            return Ok(());
        }

        apply(session);
        if let Some(message) = message {
            session.message = message.to_string();
        }
        session.finish(status);
        session.notify();
        Ok(())
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Uuid, Session>> {
        // Every mutation completes before the guard drops, so a poisoned
        // table is still consistent
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum Phase {
    Connect,
    Stream,
    Done,
}

struct StreamState {
    registry: ProgressRegistry,
    id: Uuid,
    rx: watch::Receiver<u64>,
    last: Option<ProgressSnapshot>,
    phase: Phase,
}

async fn next_frame(mut state: StreamState) -> Option<(ProgressFrame, StreamState)> {
    match state.phase {
        Phase::Done => return None,
        Phase::Connect => {
            state.phase = Phase::Stream;
            let frame = ProgressFrame::Connected {
                session_id: state.id,
            };
            return Some((frame, state));
        }
        Phase::Stream => {}
    }

    loop {
        let snapshot = state.registry.read(state.id)?;

        if snapshot.status.is_terminal() {
            state.registry.retire(state.id);
            state.phase = Phase::Done;
            let frame = match snapshot.status {
                ProgressStatus::Complete => ProgressFrame::Complete(snapshot),
                _ => ProgressFrame::Error(snapshot),
            };
            return Some((frame, state));
        }

        let changed = state
            .last
            .as_ref()
            .map(|last| !last.same_state(&snapshot))
            .unwrap_or(true);
        if changed {
            state.last = Some(snapshot.clone());
            return Some((ProgressFrame::Progress(snapshot), state));
        }

        // Sender dropped means the session was removed; the next read ends
        // the stream
        if state.rx.changed().await.is_err() {
            state.registry.read(state.id)?;
        }
    }
}
