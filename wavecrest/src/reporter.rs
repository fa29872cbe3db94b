use crate::tracker::ConnectionTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::info;

/// Periodic progress line over the connection counters.
///
/// Runs on its own task and only reads atomics, so it never holds up the
/// ramp or the connections it is reporting on.
pub struct ProgressReporter {
    task: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn spawn(tracker: Arc<ConnectionTracker>, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            if period.is_zero() {
                return;
            }

            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let snapshot = tracker.snapshot();
                info!(
                    attempted = snapshot.attempted,
                    connected = snapshot.succeeded,
                    failed = snapshot.failed,
                    disconnected = snapshot.disconnected,
                    alive = snapshot.alive(),
                    "progress"
                );
                println!("[progress] {snapshot}");
            }
        });

        Self { task }
    }

    pub fn stop(self) {
        self.task.abort();
    }
}
