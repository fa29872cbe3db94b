use crate::constants::*;
use std::num::NonZeroU32;
use std::time::Duration;

/// Pass/fail thresholds used when judging a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Thresholds {
    /// Live connections at the end of the hold needed for an outright pass.
    pub pass_alive: u64,
    /// Fraction of the target that must still be alive for a marginal pass.
    pub marginal_ratio: f64,
    /// Latency budget for the 99th percentile.
    pub p99: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            pass_alive: DEFAULT_PASS_ALIVE,
            marginal_ratio: DEFAULT_MARGINAL_RATIO,
            p99: DEFAULT_P99_THRESHOLD,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RampConfig {
    pub ws_url: String,
    pub target: usize,
    pub ramp_rate: NonZeroU32,
    pub hold: Duration,
    pub heartbeat_interval: Duration,
    pub report_interval: Duration,
    pub connect_timeout: Duration,
    pub batch_timeout: Duration,
    pub batch_pause: Duration,
    pub thresholds: Thresholds,
}

impl RampConfig {
    pub fn new(ws_url: &str) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            target: DEFAULT_TARGET_CONNECTIONS,
            ramp_rate: DEFAULT_RAMP_RATE,
            hold: DEFAULT_HOLD,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            connect_timeout: CONNECT_TIMEOUT,
            batch_timeout: BATCH_TIMEOUT,
            batch_pause: BATCH_PAUSE,
            thresholds: Thresholds::default(),
        }
    }

    /// Number of batches needed to issue `target` attempts at the configured rate.
    pub fn batch_count(&self, target: usize) -> usize {
        target.div_ceil(self.ramp_rate.get() as usize)
    }
}

impl Default for RampConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL)
    }
}

#[derive(Clone, Debug)]
pub struct LatencyConfig {
    pub ws_url: String,
    pub messages: usize,
    pub interval: Duration,
    pub settle: Duration,
    pub drain: Duration,
    pub connect_timeout: Duration,
    /// Heartbeat period on the receiving connection; zero disables it.
    pub heartbeat_interval: Duration,
    /// Overrides the receiving identity derived from the first credential.
    pub receiver_id: Option<String>,
    pub sender_id: String,
    pub progress_every: usize,
    pub thresholds: Thresholds,
}

impl LatencyConfig {
    pub fn new(ws_url: &str) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            messages: DEFAULT_MESSAGES,
            interval: DEFAULT_MESSAGE_INTERVAL,
            settle: DEFAULT_SETTLE,
            drain: DEFAULT_DRAIN,
            connect_timeout: CONNECT_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            receiver_id: None,
            sender_id: DEFAULT_SENDER_ID.to_string(),
            progress_every: DEFAULT_PROGRESS_EVERY,
            thresholds: Thresholds::default(),
        }
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_count_rounds_up() {
        let mut config = RampConfig::default();
        config.ramp_rate = NonZeroU32::new(20).unwrap();
        assert_eq!(config.batch_count(100), 5);
        assert_eq!(config.batch_count(101), 6);
        assert_eq!(config.batch_count(0), 0);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = RampConfig::default();
        assert_eq!(config.target, 5_000);
        assert_eq!(config.ramp_rate.get(), 200);
        assert_eq!(config.batch_timeout, Duration::from_secs(10));
        assert_eq!(config.thresholds.pass_alive, 5_000);
    }

    #[test]
    fn latency_receiver_heartbeats_like_ramp_connections() {
        let latency = LatencyConfig::default();
        assert_eq!(latency.heartbeat_interval, RampConfig::default().heartbeat_interval);
        assert_eq!(latency.heartbeat_interval, Duration::from_secs(30));
    }
}
