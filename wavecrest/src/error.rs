use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;
use wavecrest_core::{CredentialError, HistogramError, PublishError};

/// Why a single connection attempt did not reach the open state.
///
/// These are counted and logged, never propagated past the attempt.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Handshake did not complete within {0:?}")]
    Timeout(Duration),

    #[error("Server rejected the upgrade with status {0}")]
    Rejected(u16),

    #[error("Transport error: {0}")]
    Transport(#[source] tungstenite::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Shutdown requested before the handshake completed")]
    Cancelled,
}

impl From<tungstenite::Error> for ConnectError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Http(response) => Self::Rejected(response.status().as_u16()),
            err => Self::Transport(err),
        }
    }
}

/// Scenario-level failure. Anything surfacing here aborts the run.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error("Invalid WebSocket endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("Receiving connection failed: {0}")]
    ReceiverConnect(#[source] ConnectError),

    #[error("Publishing failed: {0}")]
    Publish(#[from] PublishError),

    #[error("Latency histogram unavailable: {0}")]
    Histogram(#[from] HistogramError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
