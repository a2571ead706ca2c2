//! Background reclamation of expired artifacts.
//!
//! Two triggers: a periodic task owned by the daemon, and one-off sweeps
//! spawned when the registry grows past a threshold. Neither runs on the
//! request path.

use crate::artifacts::cache::{ArtifactCache, SweepReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Handle to the periodic sweep task.
///
/// The task runs until [`stop`](SweeperHandle::stop) is called or the
/// handle is dropped.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the task to exit and waits for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "artifact sweeper task failed");
        }
    }

    /// Returns true while the task has not finished.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Shortest interval the periodic sweeper will run at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Spawns a task that sweeps `cache` every `interval`.
///
/// The first sweep happens one interval after start. Intervals below
/// [`MIN_SWEEP_INTERVAL`] are raised to it.
pub fn spawn_sweeper(
    cache: Arc<ArtifactCache>,
    interval: Duration,
    max_age: Duration,
) -> SweeperHandle {
    let interval = if interval < MIN_SWEEP_INTERVAL {
        tracing::warn!(
            requested_ms = interval.as_millis() as u64,
            "sweep interval too short, using {:?}",
            MIN_SWEEP_INTERVAL
        );
        MIN_SWEEP_INTERVAL
    } else {
        interval
    };
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(handle) = spawn_background_sweep(Arc::clone(&cache), max_age) {
                        let _ = handle.await;
                    }
                }
                changed = shutdown_rx.changed() => {
                    // Sender dropped counts as shutdown too.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("artifact sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}

/// Runs one sweep on the blocking pool.
///
/// Returns `None` without spawning when another sweep of the same cache is
/// already running.
pub fn spawn_background_sweep(
    cache: Arc<ArtifactCache>,
    max_age: Duration,
) -> Option<JoinHandle<SweepReport>> {
    if !cache.begin_sweep() {
        return None;
    }
    Some(tokio::task::spawn_blocking(move || {
        let report = cache.sweep(max_age);
        cache.end_sweep();
        report
    }))
}
