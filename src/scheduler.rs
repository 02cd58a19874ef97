//! Background maintenance for the session store
//!
//! Runs history eviction once at startup and then on a fixed interval, using
//! the history size and retention window from the current settings.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::commands::session_commands;
use crate::state::AppState;

/// Scheduler state for managing the background task
pub struct SchedulerState {
    /// Cancellation token to stop the scheduler
    cancel_token: CancellationToken,
    /// Handle to the scheduler task (for joining on shutdown)
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SchedulerState {
    pub fn new(cancel_token: CancellationToken, task_handle: tokio::task::JoinHandle<()>) -> Self {
        Self {
            cancel_token,
            task_handle: Some(task_handle),
        }
    }

    /// Stop the scheduler
    pub fn stop(&mut self) {
        self.cancel_token.cancel();
    }

    /// Stop the scheduler and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                log::error!("[Maintenance] Scheduler task ended abnormally: {:?}", e);
            }
        }
    }
}

/// Start the background maintenance loop.
///
/// The interval comes from `cleanupIntervalSecs` at start time.
pub fn start_scheduler(state: AppState) -> SchedulerState {
    let interval = Duration::from_secs(state.settings().cleanup_interval_secs.max(1));
    start_scheduler_with_interval(state, interval)
}

pub fn start_scheduler_with_interval(state: AppState, interval: Duration) -> SchedulerState {
    let cancel_token = CancellationToken::new();
    let cancel_token_clone = cancel_token.clone();

    let task_handle = tokio::spawn(async move {
        log::info!("[Maintenance] Starting session maintenance every {:?}", interval);
        run_cleanup(&state).await;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => run_cleanup(&state).await,
                _ = cancel_token_clone.cancelled() => {
                    log::info!("[Maintenance] Scheduler stopped");
                    break;
                }
            }
        }
    });

    SchedulerState::new(cancel_token, task_handle)
}

async fn run_cleanup(state: &AppState) {
    if let Err(e) = session_commands::cleanup_sessions(state).await {
        log::error!("[Maintenance] Session cleanup failed: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::ScriptedBackend;
    use crate::db::clock::{ManualClock, DAY_MILLIS};
    use crate::db::kv_store::MemoryKvStore;
    use crate::db::session_repo::SessionStore;
    use crate::models::message::Message;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_cleanup_runs_at_start() {
        let kv = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let sessions = SessionStore::with_clock(kv.clone(), clock.clone());

        sessions.save_session(vec![Message::user("old")], None);
        clock.set(40 * DAY_MILLIS);
        let fresh = sessions.save_session(vec![Message::user("new")], None);

        let state = AppState::new(kv, Arc::new(ScriptedBackend::new(vec![]))).with_sessions(sessions.clone());
        let scheduler = start_scheduler_with_interval(state, Duration::from_secs(3600));

        // The first pass runs before the first sleep.
        for _ in 0..100 {
            if sessions.get_all_sessions().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        scheduler.shutdown().await;

        let remaining = sessions.get_all_sessions();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, fresh.id);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let state = AppState::new(Arc::new(MemoryKvStore::new()), Arc::new(ScriptedBackend::new(vec![])));
        let scheduler = start_scheduler_with_interval(state, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_secs(1), scheduler.shutdown())
            .await
            .expect("scheduler did not stop");
    }
}
