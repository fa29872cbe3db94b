//! Connection ramp
//!
//! Attempts are issued in fixed-size batches. Each attempt carries a
//! [`BatchSignal`] that returns one permit to the batch's [`BatchGate`] when
//! the attempt resolves, so the engine can wait for a batch without tracking
//! individual tasks.
use crate::connection::{drive, endpoint_for, establish, ConnectionHandle, ConnectionRegistry};
use crate::error::BenchError;
use crate::heartbeat::Heartbeat;
use crate::reporter::ProgressReporter;
use crate::summary::{BatchRecord, RampOutcome, RampReport};
use crate::tracker::ConnectionTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout, Instant};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};
use url::Url;
use wavecrest_core::{Credential, CredentialPool, RampConfig, SHUTDOWN_GRACE};

/// Completion gate for one batch of attempts.
pub struct BatchGate {
    semaphore: Arc<Semaphore>,
}

impl BatchGate {
    pub fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn signal(&self) -> BatchSignal {
        BatchSignal {
            semaphore: self.semaphore.clone(),
        }
    }

    /// Signals received and not yet consumed by a successful [`wait`](Self::wait).
    pub fn received(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for `count` signals, giving up after `deadline`.
    ///
    /// Returns whether every attempt resolved in time.
    pub async fn wait(&self, count: usize, deadline: Duration) -> bool {
        let Ok(count) = u32::try_from(count) else {
            return false;
        };

        match timeout(deadline, self.semaphore.acquire_many(count)).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            _ => false,
        }
    }
}

impl Default for BatchGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases one permit on its gate when dropped, so every exit path of an
/// attempt (success, failure, panic, abort) signals exactly once.
pub struct BatchSignal {
    semaphore: Arc<Semaphore>,
}

impl Drop for BatchSignal {
    fn drop(&mut self) {
        self.semaphore.add_permits(1);
    }
}

// An attempt task aborted mid-handshake still has to be counted.
struct AttemptGuard(ConnectionHandle);

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.0.mark_failed();
    }
}

pub struct RampEngine {
    config: RampConfig,
    base_url: Url,
    tracker: Arc<ConnectionTracker>,
    registry: Arc<ConnectionRegistry>,
    tasks: JoinSet<()>,
}

impl RampEngine {
    pub fn new(config: RampConfig) -> Result<Self, BenchError> {
        Self::with_tracker(config, Arc::new(ConnectionTracker::new()))
    }

    pub fn with_tracker(
        config: RampConfig,
        tracker: Arc<ConnectionTracker>,
    ) -> Result<Self, BenchError> {
        let base_url = Url::parse(&config.ws_url)?;
        Ok(Self {
            config,
            base_url,
            tracker,
            registry: Arc::new(ConnectionRegistry::new()),
            tasks: JoinSet::new(),
        })
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        self.tracker.clone()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    /// Issue `min(target, pool)` attempts in batches of `ramp_rate`.
    pub async fn ramp(&mut self, pool: &CredentialPool) -> RampOutcome {
        let mut target = self.config.target;
        if pool.len() < target {
            warn!(
                "Only {} credentials available for a target of {}; clamping target to {}",
                pool.len(),
                target,
                pool.len()
            );
            target = pool.len();
        }

        let rate = self.config.ramp_rate.get() as usize;
        let batch_count = self.config.batch_count(target);
        let credentials = pool.take(target);
        let start = Instant::now();
        let mut batches = Vec::with_capacity(batch_count);

        info!(
            "Ramping to {target} connections at {rate} per batch ({batch_count} batches)"
        );

        for (index, batch) in credentials.chunks(rate).enumerate() {
            let gate = BatchGate::new();
            for credential in batch {
                self.spawn_attempt(credential, gate.signal());
            }

            let resolved = gate.wait(batch.len(), self.config.batch_timeout).await;
            if !resolved {
                warn!(
                    "Batch {} did not resolve within {}; {} of {} attempts still pending",
                    index + 1,
                    humantime::format_duration(self.config.batch_timeout),
                    batch.len().saturating_sub(gate.received()),
                    batch.len()
                );
            }

            let paused_after = index + 1 < batch_count;
            batches.push(BatchRecord {
                index,
                size: batch.len(),
                resolved,
                paused_after,
            });
            debug!("Batch {} done: {}", index + 1, self.tracker.snapshot());

            if paused_after {
                sleep(self.config.batch_pause).await;
            }
        }

        RampOutcome {
            target,
            batches,
            elapsed: start.elapsed(),
            counters: self.tracker.snapshot(),
        }
    }

    fn spawn_attempt(&mut self, credential: &Credential, signal: BatchSignal) {
        let handle = ConnectionHandle::new(credential.index(), self.tracker.clone());
        self.registry.register(handle.clone());

        let url = endpoint_for(&self.base_url, credential.token());
        let connect_timeout = self.config.connect_timeout;
        let heartbeat_interval = self.config.heartbeat_interval;
        // Built before spawning so a task aborted before its first poll still counts.
        let guard = AttemptGuard(handle.clone());

        self.tasks.spawn(async move {
            let res = establish(&handle, &url, connect_timeout).await;
            drop(signal);
            drop(guard);

            match res {
                Ok(ws) => drive(ws, handle, Heartbeat::every(heartbeat_interval), |_| {}).await,
                Err(err) => debug!("Connection {} failed: {err}", handle.id()),
            }
        });
    }

    /// Keep every open connection alive for the configured hold.
    pub async fn hold(&mut self) {
        info!(
            "Holding connections for {}",
            humantime::format_duration(self.config.hold)
        );

        let deadline = Instant::now() + self.config.hold;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                // Reap finished tasks so the set does not grow with dead entries.
                Some(res) = self.tasks.join_next() => {
                    if let Err(err) = res {
                        if err.is_panic() {
                            error!("Connection task panicked: {err}");
                        }
                    }
                }
            }
        }
    }

    /// Close every connection and wait for their tasks to finish.
    pub async fn shutdown(&mut self) {
        self.registry.close_all();

        let drained = timeout(SHUTDOWN_GRACE, async {
            while self.tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(
                "{} connection tasks still running after {}; aborting",
                self.tasks.len(),
                humantime::format_duration(SHUTDOWN_GRACE)
            );
            self.tasks.shutdown().await;
        }
    }
}

/// Ramp to the target, hold, then tear everything down and judge the result.
#[instrument(name = "ramp", skip_all, fields(target = config.target, rate = config.ramp_rate.get()))]
pub async fn run_concurrent(
    config: RampConfig,
    pool: &CredentialPool,
) -> Result<RampReport, BenchError> {
    info!("Running connection ramp with config {:?}", &config);

    let thresholds = config.thresholds.clone();
    let report_interval = config.report_interval;
    let mut engine = RampEngine::new(config)?;
    let reporter = ProgressReporter::spawn(engine.tracker(), report_interval);

    let outcome = engine.ramp(pool).await;
    println!("{}", outcome);

    engine.hold().await;

    // Operator-initiated closes count as disconnects, so judge what survived
    // the hold before tearing anything down.
    let held = engine.tracker().snapshot();
    reporter.stop();
    engine.shutdown().await;

    info!("Connection ramp complete");
    Ok(RampReport::new(outcome, held, thresholds))
}
