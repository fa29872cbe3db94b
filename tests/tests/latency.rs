mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_service::{MockBroker, MockService};
    use std::time::Duration;
    use wavecrest::{
        run_latency, BenchError, ConnectError, CredentialPool, EventPublisher, LatencyVerdict,
        PublishError, SyntheticEvent,
    };

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn dropped_events_are_reported_as_lost() {
        let pool = token_pool(1);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();
        let mut broker = service
            .broker()
            .with_delay(Duration::from_millis(50))
            .drop_when(|sequence| sequence == 3 || sequence == 7);

        let report = run_latency(quick_latency(&service.ws_url(), 10), &pool, &mut broker)
            .await
            .unwrap();

        assert_eq!(report.receiver_id, "U_BENCH_0000");
        assert_eq!(report.sent, 10);
        assert_eq!(report.received, 8);
        assert_eq!(report.lost(), 2);

        let latency = report.latency.unwrap();
        assert_eq!(latency.count, 8);
        assert!(latency.min >= Duration::from_millis(50));
        assert!(latency.max <= Duration::from_millis(110), "max was {:?}", latency.max);
        assert_eq!(report.verdict, LatencyVerdict::WithinBudget);
        assert!(logs_contain("Receiver U_BENCH_0000 connected"));
    }

    #[tokio::test]
    async fn session_bootstrap_frames_are_ignored() {
        let pool = token_pool(1);
        let service = MockService::builder()
            .credentials(&pool)
            .init_push(true)
            .spawn()
            .await
            .unwrap();
        let mut broker = service.broker();

        let report = run_latency(quick_latency(&service.ws_url(), 5), &pool, &mut broker)
            .await
            .unwrap();

        assert_eq!(report.sent, 5);
        assert_eq!(report.received, 5);
        assert_eq!(report.lost(), 0);
    }

    #[tokio::test]
    async fn rejected_receiver_aborts_the_run() {
        let service = MockService::builder().spawn().await.unwrap();
        let pool = CredentialPool::from_tokens(["not-a-user"]);
        let mut broker = service.broker();

        let err = run_latency(quick_latency(&service.ws_url(), 5), &pool, &mut broker)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BenchError::ReceiverConnect(ConnectError::Rejected(401))
        ));
    }

    #[tokio::test]
    async fn unroutable_receiver_gets_nothing() {
        let pool = token_pool(1);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();
        let mut broker = service.broker();

        let mut config = quick_latency(&service.ws_url(), 5);
        config.receiver_id = Some("G_BENCH_GROUP".to_string());
        let report = run_latency(config, &pool, &mut broker).await.unwrap();

        assert_eq!(report.sent, 5);
        assert_eq!(report.received, 0);
        assert!(report.latency.is_none());
        assert_eq!(report.verdict, LatencyVerdict::NoSamples);
        assert!(report.to_string().contains("Likely causes"));
    }

    #[tokio::test]
    async fn receiver_heartbeats_during_measurement() {
        let pool = token_pool(1);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();
        let mut broker = service.broker();

        let mut config = quick_latency(&service.ws_url(), 5);
        config.heartbeat_interval = Duration::from_millis(50);
        let report = run_latency(config, &pool, &mut broker).await.unwrap();

        assert_eq!(report.received, 5);
        // Settle, publish and drain span several periods.
        assert!(service.heartbeats() >= 3, "saw {}", service.heartbeats());
    }

    /// Publishes every event twice, like a broker with at-least-once delivery.
    struct DuplicatingBroker(MockBroker);

    impl EventPublisher for DuplicatingBroker {
        async fn publish(&mut self, event: &SyntheticEvent) -> Result<(), PublishError> {
            self.0.publish(event).await?;
            self.0.publish(event).await
        }
    }

    #[tokio::test]
    async fn duplicate_deliveries_are_counted_once() {
        let pool = token_pool(1);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();
        let mut broker = DuplicatingBroker(service.broker());

        let report = run_latency(quick_latency(&service.ws_url(), 6), &pool, &mut broker)
            .await
            .unwrap();

        assert_eq!(report.sent, 6);
        assert_eq!(report.received, 6);
        assert!(report.received <= report.sent);
    }
}
