use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_WS_URL: &str = "ws://localhost:5051/ws";
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_TOKENS_FILE: &str = "tokens.txt";

/// Pub/sub topic the messaging backend listens on for cross-node delivery.
pub const DEFAULT_TOPIC: &str = "message.topic";

pub const DEFAULT_TARGET_CONNECTIONS: usize = 5_000;
pub const DEFAULT_RAMP_RATE: NonZeroU32 = match NonZeroU32::new(200) {
    Some(rate) => rate,
    None => panic!("ramp rate must be non-zero"),
};
pub const DEFAULT_HOLD: Duration = Duration::from_secs(60);
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Upper bound on the wait for a single batch of attempts to resolve.
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(10);
/// TCP connect plus WebSocket upgrade must finish inside this window.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Pause between ramp batches, which turns the batch size into a per-second rate.
pub const BATCH_PAUSE: Duration = Duration::from_secs(1);
/// Grace period for connection tasks to flush their close frames on shutdown.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub const DEFAULT_MESSAGES: usize = 1_000;
pub const DEFAULT_MESSAGE_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);
pub const DEFAULT_DRAIN: Duration = Duration::from_secs(3);
pub const DEFAULT_PROGRESS_EVERY: usize = 100;

/// Samples at or above this value are treated as stale or clock anomalies.
pub const LATENCY_CEILING: Duration = Duration::from_secs(10);
pub const HISTOGRAM_SIGFIG: u8 = 3;

/// The default number of live connections for an outright pass.
pub const DEFAULT_PASS_ALIVE: u64 = 5_000;
/// The default fraction of the target that must survive for a marginal pass.
pub const DEFAULT_MARGINAL_RATIO: f64 = 0.95;
/// The default p99 latency budget for the fan-out path.
pub const DEFAULT_P99_THRESHOLD: Duration = Duration::from_millis(100);

pub const HEARTBEAT_PAYLOAD: &str = "heartbeat";

/// Marker placed in front of the monotonic send time inside `messageContent`.
pub const BENCH_NANO_PREFIX: &str = "BENCH_NANO:";
/// Provisioned benchmark accounts are named `U_BENCH_0000`, `U_BENCH_0001`, ...
/// The leading `U` is what the backend uses to route to a single user.
pub const BENCH_USER_PREFIX: &str = "U_BENCH_";
pub const DEFAULT_SENDER_ID: &str = "U_BENCH_SENDER";
pub const DEFAULT_SENDER_NICKNAME: &str = "sender";

/// `messageType` value for a plain chat message.
pub const CHAT_MESSAGE_TYPE: u8 = 2;
/// `contactType` value for a user (as opposed to a group) contact.
pub const USER_CONTACT_TYPE: u8 = 0;
