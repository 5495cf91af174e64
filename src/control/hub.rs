//! Broadcast hub and observer session registry.
//!
//! # Responsibilities
//! - Track every connected observer and its outbound queue
//! - Fan each update out to all observers
//! - Prune observers whose queue is closed or full
//! - Tell the dispatcher about new observers so it can send a state snapshot
//!
//! # Design Decisions
//! - One bounded queue per observer; a broadcast never awaits a slow observer
//! - Sessions are snapshotted under the lock and delivered outside it
//! - Until an observer has received its initial snapshot, toggles are not
//!   delivered to it: the snapshot is taken later and already reflects them

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::control::protocol::Update;
use crate::observability::metrics;

/// Unique identifier for an observer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "observer-{}", self.0.simple())
    }
}

/// Receiving half of an observer's outbound queue.
pub type UpdateReceiver = mpsc::Receiver<Arc<Update>>;

struct Session {
    tx: mpsc::Sender<Arc<Update>>,
    synced: bool,
}

/// Registry of connected observers.
pub struct BroadcastHub {
    sessions: Mutex<HashMap<SessionId, Session>>,
    queue_depth: usize,
    joins: mpsc::UnboundedSender<SessionId>,
}

impl BroadcastHub {
    /// Create a hub. Every registration is reported on `joins`.
    pub fn new(queue_depth: usize, joins: mpsc::UnboundedSender<SessionId>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            queue_depth: queue_depth.max(1),
            joins,
        }
    }

    /// Add a new observer and announce it to the dispatcher.
    pub fn register(&self) -> (SessionId, UpdateReceiver) {
        let id = SessionId::new();
        let (tx, rx) = mpsc::channel(self.queue_depth);

        let count = {
            let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");
            sessions.insert(id, Session { tx, synced: false });
            sessions.len()
        };
        metrics::set_observers(count);
        tracing::info!(session_id = %id, observers = count, "Observer registered");

        if self.joins.send(id).is_err() {
            tracing::warn!(session_id = %id, "Dispatcher gone, observer will not receive initial state");
        }
        (id, rx)
    }

    /// Remove an observer. Returns false if it was already gone.
    pub fn unregister(&self, id: SessionId) -> bool {
        let (removed, count) = {
            let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");
            let removed = sessions.remove(&id).is_some();
            (removed, sessions.len())
        };
        if removed {
            metrics::set_observers(count);
            tracing::info!(session_id = %id, observers = count, "Observer unregistered");
        }
        removed
    }

    /// Deliver `update` to every observer, dropping the ones that fail.
    ///
    /// Returns the number of observers that accepted the update.
    pub fn broadcast(&self, update: Update) -> usize {
        let update = Arc::new(update);
        let targets: Vec<(SessionId, mpsc::Sender<Arc<Update>>)> = {
            let sessions = self.sessions.lock().expect("session registry mutex poisoned");
            sessions
                .iter()
                .filter(|(_, session)| session.synced || !update.is_state())
                .map(|(id, session)| (*id, session.tx.clone()))
                .collect()
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, tx) in targets {
            match deliver(&tx, Arc::clone(&update)) {
                Ok(()) => delivered += 1,
                Err(reason) => {
                    tracing::warn!(session_id = %id, update = update.name(), reason, "Dropping observer");
                    failed.push(id);
                }
            }
        }

        for id in failed {
            self.unregister(id);
        }
        delivered
    }

    /// Send the initial state snapshot to one observer and mark it synced.
    pub fn send_initial(&self, id: SessionId, update: Update) -> bool {
        let tx = {
            let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");
            match sessions.get_mut(&id) {
                Some(session) => {
                    session.synced = true;
                    session.tx.clone()
                }
                None => return false,
            }
        };

        match deliver(&tx, Arc::new(update)) {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(session_id = %id, reason, "Dropping observer");
                self.unregister(id);
                false
            }
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session registry mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn deliver(tx: &mpsc::Sender<Arc<Update>>, update: Arc<Update>) -> Result<(), &'static str> {
    match tx.try_send(update) {
        Ok(()) => Ok(()),
        Err(TrySendError::Full(_)) => Err("queue full"),
        Err(TrySendError::Closed(_)) => Err("transport closed"),
    }
}
