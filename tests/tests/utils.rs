use std::num::NonZeroU32;
use std::time::Duration;
use wavecrest::{CredentialPool, LatencyConfig, RampConfig};

#[allow(unused)]
pub fn token_pool(size: usize) -> CredentialPool {
    CredentialPool::from_tokens((0..size).map(|i| format!("token-{i:04}")))
}

/// A ramp config scaled down so a full run takes well under a second.
#[allow(unused)]
pub fn quick_ramp(ws_url: &str, target: usize, rate: u32) -> RampConfig {
    let mut config = RampConfig::new(ws_url);
    config.target = target;
    config.ramp_rate = NonZeroU32::new(rate).unwrap();
    config.hold = Duration::from_millis(200);
    config.heartbeat_interval = Duration::ZERO;
    config.report_interval = Duration::from_millis(100);
    config.connect_timeout = Duration::from_secs(2);
    config.batch_timeout = Duration::from_secs(3);
    config.batch_pause = Duration::from_millis(50);
    config.thresholds.pass_alive = target as u64;
    config
}

#[allow(unused)]
pub fn quick_latency(ws_url: &str, messages: usize) -> LatencyConfig {
    let mut config = LatencyConfig::new(ws_url);
    config.messages = messages;
    config.interval = Duration::from_millis(10);
    config.settle = Duration::from_millis(100);
    config.drain = Duration::from_millis(300);
    config.connect_timeout = Duration::from_secs(2);
    config.progress_every = 5;
    config
}

/// Poll `check` until it holds or `limit` elapses.
#[allow(unused)]
pub async fn eventually(limit: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
