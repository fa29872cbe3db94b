//! # wavecrest
//!
//! Measures two things about a WebSocket messaging backend: how many
//! concurrent long-lived connections one instance sustains, and how long a
//! published event takes to reach a connected client through the backend's
//! fan-out path.
//!
//! ```no_run
//! use wavecrest::{run_concurrent, RampConfig, CredentialPool};
//!
//! # async fn example() -> Result<(), wavecrest::BenchError> {
//! let pool = CredentialPool::from_file("tokens.txt")?;
//! let report = run_concurrent(RampConfig::new("ws://localhost:5051/ws"), &pool).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

mod connection;
mod error;
mod heartbeat;
#[cfg(feature = "metrics")]
mod instruments;
mod latency;
mod publisher;
mod ramp;
mod reporter;
mod summary;
mod tracker;

pub use connection::{
    drive, endpoint_for, establish, open, ConnState, ConnectionHandle, ConnectionRegistry,
    WsStream,
};
pub use error::{BenchError, ConnectError};
pub use heartbeat::Heartbeat;
pub use latency::{receiver_identity, run_latency, LatencyRecorder, Observation};
pub use publisher::RedisPublisher;
pub use ramp::{run_concurrent, BatchGate, BatchSignal, RampEngine};
pub use reporter::ProgressReporter;
pub use summary::{
    judge_latency, judge_ramp, BatchRecord, LatencyReport, LatencyVerdict, RampOutcome,
    RampReport, RampVerdict,
};
pub use tracker::ConnectionTracker;

pub use wavecrest_core::*;
