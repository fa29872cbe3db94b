use crate::constants::{HISTOGRAM_SIGFIG, LATENCY_CEILING};
use hdrhistogram::Histogram;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistogramError {
    #[error("Latency sample {0:?} is outside the recordable range")]
    OutOfRange(Duration),

    #[error("Failed to allocate histogram: {0}")]
    Creation(String),
}

/// Percentile summary over every accepted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
}

/// Thread-safe latency recorder backed by an HDR histogram.
///
/// Samples are stored in nanoseconds with three significant figures of
/// precision. Every mutation goes through one mutex.
pub struct LatencyHistogram {
    inner: Mutex<Histogram<u64>>,
}

impl LatencyHistogram {
    pub fn new() -> Result<Self, HistogramError> {
        let ceiling = LATENCY_CEILING.as_nanos() as u64;
        let histogram = Histogram::new_with_bounds(1, ceiling, HISTOGRAM_SIGFIG)
            .map_err(|e| HistogramError::Creation(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(histogram),
        })
    }

    /// Record one sample. Samples at or above [`LATENCY_CEILING`] are refused.
    pub fn record(&self, latency: Duration) -> Result<(), HistogramError> {
        if latency >= LATENCY_CEILING {
            return Err(HistogramError::OutOfRange(latency));
        }
        // Sub-nanosecond samples cannot be represented; clamp to the lowest bucket.
        let nanos = (latency.as_nanos() as u64).max(1);
        self.lock()
            .record(nanos)
            .map_err(|_| HistogramError::OutOfRange(latency))
    }

    pub fn len(&self) -> u64 {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` until at least one sample has been recorded.
    pub fn summary(&self) -> Option<LatencySummary> {
        let histogram = self.lock();
        if histogram.is_empty() {
            return None;
        }

        let at = |q: f64| Duration::from_nanos(histogram.value_at_quantile(q));
        Some(LatencySummary {
            count: histogram.len(),
            min: Duration::from_nanos(histogram.min()),
            mean: Duration::from_nanos(histogram.mean().round() as u64),
            p50: at(0.50),
            p90: at(0.90),
            p95: at(0.95),
            p99: at(0.99),
            max: Duration::from_nanos(histogram.max()),
        })
    }

    // A panic while holding the lock leaves the histogram structurally valid,
    // so a poisoned mutex is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, Histogram<u64>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
