//! Periodic eviction of idle sessions

use super::SessionStore;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Background task that asks the store to evict idle sessions on a fixed
/// interval. Independent of the HTTP listener: start and stop it on its own.
pub struct SessionSweeper {
    store: Arc<SessionStore>,
    interval: Duration,
    max_idle: chrono::Duration,
    cancel: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionSweeper {
    pub fn new(store: Arc<SessionStore>, interval: Duration, max_idle: Duration) -> Self {
        Self {
            store,
            interval,
            max_idle: chrono::Duration::from_std(max_idle)
                .unwrap_or_else(|_| chrono::Duration::weeks(52)),
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Spawn the sweep loop; a no-op if already running
    pub fn start(&self) {
        let mut task_guard = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task_guard.as_ref().is_some_and(|t| !t.is_finished()) {
            tracing::debug!("Session sweeper already running");
            return;
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = Some(cancel.clone());

        let store = Arc::clone(&self.store);
        let period = self.interval;
        let max_idle = self.max_idle;

        *task_guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired(Utc::now(), max_idle).await;
                        if removed > 0 {
                            tracing::info!(removed, "Evicted idle sessions");
                        }
                    }
                }
            }
            tracing::debug!("Session sweeper stopped");
        }));

        tracing::info!(
            interval_secs = period.as_secs(),
            max_idle_secs = max_idle.num_seconds(),
            "Session sweeper started"
        );
    }

    /// Stop the loop and wait for it to exit
    pub async fn stop(&self) {
        if let Some(cancel) = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            cancel.cancel();
        }
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Session sweeper task ended abnormally");
            }
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }
}
