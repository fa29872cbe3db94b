use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};
use wavecrest_core::{EventPublisher, PublishError, SyntheticEvent};

/// Publishes events on the Redis pub/sub topic the backend fans out from.
pub struct RedisPublisher {
    connection: MultiplexedConnection,
    topic: String,
}

impl RedisPublisher {
    pub async fn connect(redis_url: &str, topic: &str) -> Result<Self, PublishError> {
        let client = redis::Client::open(redis_url).map_err(broker)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(broker)?;
        info!("Connected to {redis_url}, publishing on {topic}");

        Ok(Self {
            connection,
            topic: topic.to_string(),
        })
    }
}

impl EventPublisher for RedisPublisher {
    async fn publish(&mut self, event: &SyntheticEvent) -> Result<(), PublishError> {
        let payload = event.encode()?;
        let subscribers: i64 = self
            .connection
            .publish(&self.topic, payload)
            .await
            .map_err(broker)?;

        if subscribers == 0 {
            debug!("Event {} reached no subscribers", event.sequence);
        }
        Ok(())
    }
}

fn broker(err: redis::RedisError) -> PublishError {
    PublishError::Broker(Box::new(err))
}
