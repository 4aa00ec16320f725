//! Live observer set with best-effort fan-out
//!
//! Each observer owns a bounded outbound queue drained by its connection
//! task. Broadcasting never waits on an observer. When a payload cannot be
//! queued because the queue is full, the observer is marked lagging: it
//! receives nothing further until its connection task has drained the queue
//! and asked for a resync, which replaces the missed events with one stats
//! message. An observer that stays full past the lag timeout, or whose
//! receiver is gone, is dropped.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::debug;

/// Pre-serialized message shared by every recipient
pub type Payload = Arc<str>;

/// Sending half of an observer's outbound queue
pub type ObserverSender = mpsc::Sender<Payload>;

/// Identifies one registered observer
pub type ObserverId = u64;

/// How long an observer may stay lagging before it is dropped
pub const DEFAULT_LAG_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub delivered: usize,
    /// Observers that skipped this payload because their queue was full
    pub lagging: usize,
    pub dropped: usize,
}

struct Member {
    sender: ObserverSender,
    /// Set when a payload was skipped; cleared by a resync
    lagging_since: Mutex<Option<Instant>>,
}

pub struct ObserverRegistry {
    observers: RwLock<HashMap<ObserverId, Member>>,
    next_id: AtomicU64,
    lag_timeout: Duration,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::with_lag_timeout(DEFAULT_LAG_TIMEOUT)
    }

    pub fn with_lag_timeout(lag_timeout: Duration) -> Self {
        Self {
            observers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            lag_timeout,
        }
    }

    /// Add an observer, queueing `initial` for it before anything else.
    ///
    /// Returns `None` without adding the observer if the initial message
    /// cannot be queued.
    pub fn register(&self, sender: ObserverSender, initial: Payload) -> Option<ObserverId> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = sender.try_send(initial) {
            debug!(observer_id = id, error = %e, "Observer gone before registration");
            return None;
        }

        self.observers.write().insert(
            id,
            Member {
                sender,
                lagging_since: Mutex::new(None),
            },
        );
        Some(id)
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        self.observers.write().remove(&id).is_some()
    }

    /// Offer `payload` to every observer that is in sync
    pub fn broadcast(&self, payload: &Payload) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        let mut failed = Vec::new();

        {
            let observers = self.observers.read();
            for (&id, member) in observers.iter() {
                let mut lagging_since = member.lagging_since.lock();

                if let Some(since) = *lagging_since {
                    if member.sender.is_closed() {
                        debug!(observer_id = id, "Observer disconnected, dropping observer");
                        failed.push(id);
                    } else if since.elapsed() >= self.lag_timeout {
                        debug!(observer_id = id, "Observer stalled, dropping observer");
                        failed.push(id);
                    } else {
                        outcome.lagging += 1;
                    }
                    continue;
                }

                match member.sender.try_send(payload.clone()) {
                    Ok(()) => outcome.delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        debug!(observer_id = id, "Observer queue full, marking lagging");
                        *lagging_since = Some(Instant::now());
                        outcome.lagging += 1;
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!(observer_id = id, "Observer disconnected, dropping observer");
                        failed.push(id);
                    }
                }
            }
        }

        if !failed.is_empty() {
            let mut observers = self.observers.write();
            for id in &failed {
                if observers.remove(id).is_some() {
                    outcome.dropped += 1;
                }
            }
        }

        outcome
    }

    /// True if the observer skipped payloads and has not been resynced
    pub fn is_lagging(&self, id: ObserverId) -> bool {
        self.observers
            .read()
            .get(&id)
            .is_some_and(|member| member.lagging_since.lock().is_some())
    }

    /// Queue `payload` for a lagging observer and mark it in sync again.
    ///
    /// Returns false if the observer is unknown, not lagging, or still full.
    pub fn resync(&self, id: ObserverId, payload: Payload) -> bool {
        {
            let observers = self.observers.read();
            let Some(member) = observers.get(&id) else {
                return false;
            };
            let mut lagging_since = member.lagging_since.lock();
            if lagging_since.is_none() {
                return false;
            }

            match member.sender.try_send(payload) {
                Ok(()) => {
                    *lagging_since = None;
                    return true;
                }
                Err(TrySendError::Full(_)) => return false,
                Err(TrySendError::Closed(_)) => {}
            }
        }

        debug!(observer_id = id, "Observer disconnected, dropping observer");
        self.unregister(id);
        false
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.observers.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }
}

impl Default for ObserverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
