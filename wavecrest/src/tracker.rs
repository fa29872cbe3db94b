use std::sync::atomic::{AtomicU64, Ordering};
use wavecrest_core::CounterSnapshot;

#[cfg(feature = "metrics")]
use crate::instruments;

/// Run-wide connection counters.
///
/// Only [`ConnectionHandle`](crate::ConnectionHandle) state transitions call
/// the `record_*` methods, which is what makes each update happen once per
/// connection.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    disconnected: AtomicU64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&self) {
        self.attempted.fetch_add(1, Ordering::SeqCst);
        #[cfg(feature = "metrics")]
        instruments::connection_attempted();
    }

    pub(crate) fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
        #[cfg(feature = "metrics")]
        instruments::connection_succeeded();
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        #[cfg(feature = "metrics")]
        instruments::connection_failed();
    }

    pub(crate) fn record_disconnect(&self) {
        self.disconnected.fetch_add(1, Ordering::SeqCst);
        #[cfg(feature = "metrics")]
        instruments::connection_disconnected();
    }

    /// Read the counters without blocking any writer.
    pub fn snapshot(&self) -> CounterSnapshot {
        // NOTE: Each counter is only incremented after the one it is bounded by
        // (attempt -> success/failure -> disconnect), so loading in the reverse
        // order keeps the invariants true in the returned copy.
        let disconnected = self.disconnected.load(Ordering::SeqCst);
        let failed = self.failed.load(Ordering::SeqCst);
        let succeeded = self.succeeded.load(Ordering::SeqCst);
        let attempted = self.attempted.load(Ordering::SeqCst);

        CounterSnapshot {
            attempted,
            succeeded,
            failed,
            disconnected,
        }
    }
}
