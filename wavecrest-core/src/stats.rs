use std::fmt;

/// Point-in-time view of the connection counters.
///
/// Snapshots are read so that `succeeded + failed <= attempted` and
/// `disconnected <= succeeded` always hold, even while connections churn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub disconnected: u64,
}

impl CounterSnapshot {
    pub fn alive(&self) -> u64 {
        self.succeeded.saturating_sub(self.disconnected)
    }

    /// Attempts that have neither completed a handshake nor failed yet.
    pub fn pending(&self) -> u64 {
        self.attempted
            .saturating_sub(self.succeeded)
            .saturating_sub(self.failed)
    }
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connected: {} | failed: {} | disconnected: {} | alive: {}",
            self.succeeded,
            self.failed,
            self.disconnected,
            self.alive()
        )
    }
}
