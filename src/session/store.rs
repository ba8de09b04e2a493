//! In-memory session store with per-sender locking

use crate::state_machine::{Session, SessionUpdate, Step};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, RwLock};

/// Held for the whole handling of one input; serializes a sender's events
pub type SenderGuard = OwnedMutexGuard<()>;

type SenderLock = Arc<AsyncMutex<()>>;

/// Process-wide mapping from sender id to session
///
/// Sessions are never handed out by reference: every read returns a clone.
/// State does not survive a restart.
pub struct SessionStore {
    entry: Step,
    sessions: RwLock<HashMap<String, Session>>,
    /// Only touched in short, non-async critical sections
    locks: Mutex<HashMap<String, SenderLock>>,
}

impl SessionStore {
    /// Create a store whose new sessions start at `entry`
    pub fn new(entry: Step) -> Self {
        Self {
            entry,
            sessions: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, sender_id: &str) -> SenderLock {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(sender_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Wait for exclusive access to one sender's session
    pub async fn lock(&self, sender_id: &str) -> SenderGuard {
        self.lock_for(sender_id).lock_owned().await
    }

    /// Exclusive access if nobody currently holds it
    pub fn try_lock(&self, sender_id: &str) -> Option<SenderGuard> {
        self.lock_for(sender_id).try_lock_owned().ok()
    }

    pub async fn get(&self, sender_id: &str) -> Option<Session> {
        self.sessions.read().await.get(sender_id).cloned()
    }

    /// Existing session, or a new one at the entry step
    pub async fn get_or_create(&self, sender_id: &str) -> Session {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(sender_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(sender_id, "Creating session");
                Session::new(sender_id, self.entry, Utc::now())
            })
            .clone()
    }

    /// Merge `update` into the session; `None` if there is no session
    pub async fn update(&self, sender_id: &str, update: SessionUpdate) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(sender_id)?;
        if let Some(step) = update.step {
            session.current_step = step;
        }
        session.collected.extend(update.fields);
        session.last_activity_at = Utc::now();
        Some(session.clone())
    }

    /// Refresh `last_activity_at` only
    pub async fn touch(&self, sender_id: &str) -> bool {
        self.update(sender_id, SessionUpdate::default()).await.is_some()
    }

    /// Remove the session; removing an absent one is fine
    pub async fn delete(&self, sender_id: &str) {
        if self.sessions.write().await.remove(sender_id).is_some() {
            tracing::debug!(sender_id, "Deleted session");
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove every session idle for longer than `max_idle` at `now`
    ///
    /// Sessions whose sender lock is held are mid-transition and skipped;
    /// the next sweep will see them again. Returns the number removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>, max_idle: chrono::Duration) -> usize {
        let candidates: Vec<String> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.is_idle(now, max_idle))
            .map(|s| s.sender_id.clone())
            .collect();

        let mut removed = 0;
        for sender_id in candidates {
            let Some(_guard) = self.try_lock(&sender_id) else {
                tracing::debug!(sender_id = %sender_id, "Skipping busy session during sweep");
                continue;
            };
            let mut sessions = self.sessions.write().await;
            // Re-check: it may have been touched between the scan and the lock
            if sessions
                .get(&sender_id)
                .is_some_and(|s| s.is_idle(now, max_idle))
            {
                sessions.remove(&sender_id);
                removed += 1;
            }
        }

        self.prune_locks();
        removed
    }

    /// Drop lock entries nobody holds or waits on
    fn prune_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    pub fn lock_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
