use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Keepalive schedule for one open connection.
///
/// Lives inside the connection's own task, so stopping the connection stops
/// its heartbeat with no separate bookkeeping.
pub struct Heartbeat {
    interval: Option<Interval>,
}

impl Heartbeat {
    /// First tick fires one full `period` from now. A zero period disables it.
    pub fn every(period: Duration) -> Self {
        if period.is_zero() {
            return Self::disabled();
        }

        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(interval),
        }
    }

    pub fn disabled() -> Self {
        Self { interval: None }
    }

    /// Wait for the next tick. Never resolves when disabled.
    pub async fn tick(&mut self) {
        match &mut self.interval {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending().await,
        }
    }
}
