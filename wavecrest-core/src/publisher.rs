use crate::event::SyntheticEvent;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Broker rejected publish: {0}")]
    Broker(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Injects synthetic events into the fan-out path of the system under test.
///
/// Delivery is fire-and-forget: a successful publish only means the broker
/// accepted the event, not that any subscriber received it.
#[allow(async_fn_in_trait)]
pub trait EventPublisher {
    async fn publish(&mut self, event: &SyntheticEvent) -> Result<(), PublishError>;
}
