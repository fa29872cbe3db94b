//! Fan-out latency measurement
//!
//! One receiving connection listens while synthetic events are published
//! towards it. Sender and receiver share the process clock, so the one-way
//! latency is simply `received - sent` on the monotonic clock.
use crate::connection::{drive, endpoint_for, establish, ConnectionHandle};
use crate::error::BenchError;
use crate::heartbeat::Heartbeat;
use crate::summary::LatencyReport;
use crate::tracker::ConnectionTracker;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;
use wavecrest_core::{
    elapsed_between, monotonic_nanos, CredentialPool, EventPublisher, LatencyConfig,
    LatencyHistogram, LatencySummary, SyntheticEvent, LATENCY_CEILING, SHUTDOWN_GRACE,
};

#[cfg(feature = "metrics")]
use crate::instruments;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Not a benchmark event.
    Ignored,
    Accepted(Duration),
    /// Non-positive or stale latency.
    Rejected,
    /// Sequence number already counted.
    Duplicate,
}

/// Receiving side of the pipeline: filters, deduplicates and records samples.
pub struct LatencyRecorder {
    histogram: LatencyHistogram,
    received: AtomicU64,
    seen: Mutex<HashSet<u64>>,
}

impl LatencyRecorder {
    pub fn new() -> Result<Self, BenchError> {
        Ok(Self {
            histogram: LatencyHistogram::new()?,
            received: AtomicU64::new(0),
            seen: Mutex::new(HashSet::new()),
        })
    }

    /// Handle one inbound text frame received at `received_nanos`.
    pub fn observe(&self, text: &str, received_nanos: u64) -> Observation {
        match SyntheticEvent::parse(text) {
            Some(event) => self.observe_event(&event, received_nanos),
            None => Observation::Ignored,
        }
    }

    pub fn observe_event(&self, event: &SyntheticEvent, received_nanos: u64) -> Observation {
        let elapsed = elapsed_between(event.sent_at_nanos, received_nanos);
        if elapsed <= 0 || elapsed >= LATENCY_CEILING.as_nanos() as i128 {
            trace!("Discarding event {} with latency {elapsed}ns", event.sequence);
            return Observation::Rejected;
        }

        let first_delivery = self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event.sequence);
        if !first_delivery {
            return Observation::Duplicate;
        }

        let latency = Duration::from_nanos(elapsed as u64);
        if let Err(err) = self.histogram.record(latency) {
            warn!("Unable to record event {}: {err}", event.sequence);
            return Observation::Rejected;
        }
        self.received.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        instruments::latency_sample(latency);

        Observation::Accepted(latency)
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn summary(&self) -> Option<LatencySummary> {
        self.histogram.summary()
    }
}

/// The identity the receiving connection is registered under.
pub fn receiver_identity(config: &LatencyConfig, pool: &CredentialPool) -> Result<String, BenchError> {
    match &config.receiver_id {
        Some(id) => Ok(id.clone()),
        None => Ok(pool.first()?.provisioned_user_id()),
    }
}

/// Connect one receiver, publish `messages` events at it and report what arrived.
#[instrument(name = "latency", skip_all, fields(messages = config.messages))]
pub async fn run_latency<P: EventPublisher>(
    config: LatencyConfig,
    pool: &CredentialPool,
    publisher: &mut P,
) -> Result<LatencyReport, BenchError> {
    info!("Running latency measurement with config {:?}", &config);

    if config.progress_every == 0 {
        return Err(BenchError::Config("progress interval must be positive".into()));
    }

    let receiver_id = receiver_identity(&config, pool)?;
    let credential = pool.first()?;
    let url = endpoint_for(&Url::parse(&config.ws_url)?, credential.token());

    let tracker = Arc::new(ConnectionTracker::new());
    let handle = ConnectionHandle::new(credential.index(), tracker);
    let ws = establish(&handle, &url, config.connect_timeout)
        .await
        .map_err(BenchError::ReceiverConnect)?;
    info!("Receiver {receiver_id} connected");

    let recorder = Arc::new(LatencyRecorder::new()?);
    let heartbeat = Heartbeat::every(config.heartbeat_interval);
    let receiver = tokio::spawn({
        let recorder = recorder.clone();
        let handle = handle.clone();
        async move {
            drive(ws, handle, heartbeat, |text| {
                recorder.observe(text, monotonic_nanos());
            })
            .await
        }
    });

    // Give the server time to push its initial session data before measuring.
    sleep(config.settle).await;

    println!("Publishing {} events to {receiver_id}...", config.messages);
    let start = Instant::now();
    let published = publish_all(&config, &receiver_id, publisher, &recorder).await;

    if published.is_ok() {
        println!("Waiting for in-flight events...");
        sleep(config.drain).await;
    }
    let duration = start.elapsed();

    handle.close();
    if timeout(SHUTDOWN_GRACE, receiver).await.is_err() {
        warn!("Receiver did not close within {}", humantime::format_duration(SHUTDOWN_GRACE));
    }

    let sent = published?;
    info!("Latency measurement complete");
    Ok(LatencyReport::new(
        receiver_id,
        sent,
        recorder.received(),
        duration,
        recorder.summary(),
        config.thresholds,
    ))
}

async fn publish_all<P: EventPublisher>(
    config: &LatencyConfig,
    receiver_id: &str,
    publisher: &mut P,
    recorder: &LatencyRecorder,
) -> Result<u64, BenchError> {
    let mut sent = 0u64;
    for sequence in 1..=config.messages as u64 {
        let event = SyntheticEvent::new(sequence, receiver_id, &config.sender_id);
        publisher.publish(&event).await?;
        sent += 1;

        if !config.interval.is_zero() {
            sleep(config.interval).await;
        }

        if sent % config.progress_every as u64 == 0 {
            println!(
                "  sent {sent} / {}, received {}",
                config.messages,
                recorder.received()
            );
        }
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(sequence: u64, sent_at_nanos: u64) -> SyntheticEvent {
        SyntheticEvent::with_timestamp(sequence, "U_BENCH_0000", "U_BENCH_SENDER", sent_at_nanos)
    }

    #[test]
    fn accepts_positive_latency() {
        let recorder = LatencyRecorder::new().unwrap();
        let observation = recorder.observe_event(&event(1, 1_000), 5_000_000);
        assert_eq!(observation, Observation::Accepted(Duration::from_nanos(4_999_000)));
        assert_eq!(recorder.received(), 1);
    }

    #[test]
    fn rejects_non_positive_and_stale_latency() {
        let recorder = LatencyRecorder::new().unwrap();
        let ten_secs = LATENCY_CEILING.as_nanos() as u64;

        assert_eq!(recorder.observe_event(&event(1, 100), 100), Observation::Rejected);
        assert_eq!(recorder.observe_event(&event(2, 200), 100), Observation::Rejected);
        assert_eq!(
            recorder.observe_event(&event(3, 0), ten_secs),
            Observation::Rejected
        );
        assert_eq!(recorder.received(), 0);
        assert!(recorder.summary().is_none());
    }

    #[test]
    fn duplicates_are_counted_once() {
        let recorder = LatencyRecorder::new().unwrap();
        assert!(matches!(
            recorder.observe_event(&event(7, 10), 1_000),
            Observation::Accepted(_)
        ));
        assert_eq!(recorder.observe_event(&event(7, 10), 2_000), Observation::Duplicate);
        assert_eq!(recorder.received(), 1);
    }

    #[test]
    fn foreign_frames_are_ignored() {
        let recorder = LatencyRecorder::new().unwrap();
        assert_eq!(recorder.observe("heartbeat", 10), Observation::Ignored);
        assert_eq!(recorder.observe("{\"messageType\":0}", 10), Observation::Ignored);
    }

    #[test]
    fn receiver_identity_follows_first_credential() {
        let pool = CredentialPool::from_tokens(["a", "b"]);
        let mut config = LatencyConfig::default();
        assert_eq!(receiver_identity(&config, &pool).unwrap(), "U_BENCH_0000");

        config.receiver_id = Some("U_CUSTOM".to_string());
        assert_eq!(receiver_identity(&config, &pool).unwrap(), "U_CUSTOM");
    }

    #[test]
    fn empty_pool_is_a_setup_failure() {
        let config = LatencyConfig::default();
        let pool = CredentialPool::default();
        assert!(matches!(
            receiver_identity(&config, &pool),
            Err(BenchError::Credentials(_))
        ));
    }
}
