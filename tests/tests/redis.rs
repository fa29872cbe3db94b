mod utils;
#[allow(unused)]
use utils::*;

// Needs a Redis server on the default URL.
#[cfg(feature = "integration")]
mod tests {
    use futures_util::StreamExt;
    use std::time::Duration;
    use wavecrest::{EventPublisher, RedisPublisher, SyntheticEvent, DEFAULT_REDIS_URL};

    #[tokio::test]
    async fn published_event_reaches_subscriber() -> anyhow::Result<()> {
        let topic = "wavecrest.test.topic";
        let client = redis::Client::open(DEFAULT_REDIS_URL)?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(topic).await?;

        let mut publisher = RedisPublisher::connect(DEFAULT_REDIS_URL, topic).await?;
        let event = SyntheticEvent::new(1, "U_BENCH_0000", "U_BENCH_SENDER");
        publisher.publish(&event).await?;

        let message = tokio::time::timeout(Duration::from_secs(2), pubsub.on_message().next())
            .await?
            .expect("subscription closed");
        let payload: String = message.get_payload()?;

        assert_eq!(SyntheticEvent::parse(&payload), Some(event));
        Ok(())
    }
}
