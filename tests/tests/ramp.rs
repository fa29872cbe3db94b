mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_service::MockService;
    use std::num::NonZeroU32;
    use std::time::Duration;
    use wavecrest::{run_concurrent, RampEngine, RampVerdict};

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn target_is_clamped_to_pool() {
        let pool = token_pool(100);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();

        let mut engine = RampEngine::new(quick_ramp(&service.ws_url(), 150, 50)).unwrap();
        let outcome = engine.ramp(&pool).await;

        assert_eq!(outcome.target, 100);
        assert_eq!(outcome.batches.len(), 2);
        assert_eq!(outcome.counters.attempted, 100);
        assert_eq!(outcome.counters.succeeded, 100);
        assert!(logs_contain("clamping target to 100"));

        engine.shutdown().await;
        assert_eq!(engine.tracker().snapshot().disconnected, 100);
    }

    #[tokio::test]
    async fn batches_are_paced() {
        let pool = token_pool(100);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();

        let mut config = quick_ramp(&service.ws_url(), 100, 20);
        config.batch_pause = Duration::from_millis(100);
        let mut engine = RampEngine::new(config).unwrap();
        let outcome = engine.ramp(&pool).await;

        let sizes: Vec<_> = outcome.batches.iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![20; 5]);

        let pauses: Vec<_> = outcome.batches.iter().map(|b| b.paused_after).collect();
        assert_eq!(pauses, vec![true, true, true, true, false]);
        assert!(outcome.batches.iter().all(|b| b.resolved));

        // Four pauses, never one after the last batch.
        assert!(outcome.elapsed >= Duration::from_millis(400));
        assert!(outcome.elapsed < Duration::from_millis(1_400));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn stalled_handshake_is_counted_as_failed() {
        let pool = token_pool(3);
        let service = MockService::builder()
            .credentials(&pool)
            .stall_handshakes()
            .spawn()
            .await
            .unwrap();

        let mut config = quick_ramp(&service.ws_url(), 3, 3);
        config.connect_timeout = Duration::from_millis(300);
        let mut engine = RampEngine::new(config).unwrap();
        let outcome = engine.ramp(&pool).await;

        // The connect timeout resolves every attempt well before the batch deadline.
        assert!(outcome.batches[0].resolved);
        assert!(outcome.elapsed < Duration::from_secs(2));
        assert_eq!(outcome.counters.failed, 3);
        assert_eq!(outcome.counters.succeeded, 0);

        engine.shutdown().await;
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn late_batch_does_not_block_the_ramp() {
        let pool = token_pool(3);
        let service = MockService::builder()
            .credentials(&pool)
            .stall_handshakes()
            .spawn()
            .await
            .unwrap();

        let mut config = quick_ramp(&service.ws_url(), 3, 3);
        config.batch_timeout = Duration::from_millis(300);
        config.connect_timeout = Duration::from_millis(1_500);
        let mut engine = RampEngine::new(config).unwrap();
        let outcome = engine.ramp(&pool).await;

        assert!(!outcome.batches[0].resolved);
        assert!(outcome.elapsed >= Duration::from_millis(300));
        assert!(outcome.elapsed < Duration::from_millis(1_000), "took {:?}", outcome.elapsed);
        assert_eq!(outcome.counters.attempted, 3);
        assert_eq!(outcome.counters.pending(), 3);
        assert!(logs_contain("3 of 3 attempts still pending"));

        // Outstanding attempts keep running and resolve on their own timeout.
        let tracker = engine.tracker();
        assert!(eventually(Duration::from_secs(3), || tracker.snapshot().failed == 3).await);
        assert_eq!(tracker.snapshot().succeeded, 0);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_tokens_are_rejected() {
        let known = token_pool(2);
        let service = MockService::builder().credentials(&known).spawn().await.unwrap();

        let pool = token_pool(4);
        let mut engine = RampEngine::new(quick_ramp(&service.ws_url(), 4, 4)).unwrap();
        let outcome = engine.ramp(&pool).await;

        assert_eq!(outcome.counters.succeeded, 2);
        assert_eq!(outcome.counters.failed, 2);
        assert_eq!(service.rejected(), 2);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn accept_rate_limit_fails_excess_attempts() {
        let pool = token_pool(10);
        let service = MockService::builder()
            .credentials(&pool)
            .accept_rate(NonZeroU32::new(5).unwrap())
            .spawn()
            .await
            .unwrap();

        let mut engine = RampEngine::new(quick_ramp(&service.ws_url(), 10, 10)).unwrap();
        let outcome = engine.ramp(&pool).await;

        assert_eq!(outcome.counters.attempted, 10);
        assert_eq!(outcome.counters.succeeded + outcome.counters.failed, 10);
        assert!(outcome.counters.failed >= 1);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn server_disconnect_is_counted_once() {
        let pool = token_pool(5);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();

        let mut engine = RampEngine::new(quick_ramp(&service.ws_url(), 5, 5)).unwrap();
        engine.ramp(&pool).await;
        assert!(eventually(Duration::from_secs(2), || service.connected() == 5).await);

        assert_eq!(service.disconnect_user("U_BENCH_0002"), 1);
        let tracker = engine.tracker();
        assert!(eventually(Duration::from_secs(2), || tracker.snapshot().disconnected == 1).await);
        assert_eq!(tracker.snapshot().alive(), 4);
        assert_eq!(engine.registry().live(), 4);

        engine.shutdown().await;
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.disconnected, 5);
        assert_eq!(snapshot.alive(), 0);
    }

    #[tokio::test]
    async fn closing_twice_does_not_double_count() {
        let pool = token_pool(8);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();

        let mut engine = RampEngine::new(quick_ramp(&service.ws_url(), 8, 8)).unwrap();
        engine.ramp(&pool).await;

        let registry = engine.registry();
        registry.close_all();
        registry.close_all();
        engine.shutdown().await;

        let snapshot = engine.tracker().snapshot();
        assert_eq!(snapshot.succeeded, 8);
        assert_eq!(snapshot.disconnected, 8);
        assert!(eventually(Duration::from_secs(2), || service.connected() == 0).await);
    }

    #[tokio::test]
    async fn counter_invariants_hold_during_ramp() {
        let pool = token_pool(60);
        let known = token_pool(45);
        let service = MockService::builder().credentials(&known).spawn().await.unwrap();

        let mut engine = RampEngine::new(quick_ramp(&service.ws_url(), 60, 15)).unwrap();
        let tracker = engine.tracker();

        let watcher = tokio::spawn(async move {
            let mut samples = 0;
            loop {
                let snapshot = tracker.snapshot();
                assert!(snapshot.succeeded + snapshot.failed <= snapshot.attempted);
                assert!(snapshot.disconnected <= snapshot.succeeded);
                samples += 1;
                if snapshot.attempted == 60 && snapshot.pending() == 0 {
                    return samples;
                }
                tokio::task::yield_now().await;
            }
        });

        let outcome = engine.ramp(&pool).await;
        assert!(watcher.await.unwrap() > 0);
        assert_eq!(outcome.counters.attempted, 60);
        assert_eq!(outcome.counters.succeeded, 45);
        assert_eq!(outcome.counters.failed, 15);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn heartbeats_reach_the_server() {
        let pool = token_pool(4);
        let service = MockService::builder().credentials(&pool).spawn().await.unwrap();

        let mut config = quick_ramp(&service.ws_url(), 4, 4);
        config.heartbeat_interval = Duration::from_millis(100);
        config.hold = Duration::from_millis(350);
        let mut engine = RampEngine::new(config).unwrap();

        engine.ramp(&pool).await;
        // No heartbeat before a full interval has passed.
        assert_eq!(service.heartbeats(), 0);

        engine.hold().await;
        assert!(eventually(Duration::from_secs(1), || service.heartbeats() >= 8).await);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn full_run_passes_when_everything_survives() {
        let pool = token_pool(20);
        let service = MockService::builder()
            .credentials(&pool)
            .init_push(true)
            .spawn()
            .await
            .unwrap();

        let report = run_concurrent(quick_ramp(&service.ws_url(), 20, 10), &pool)
            .await
            .unwrap();

        assert_eq!(report.outcome.target, 20);
        assert_eq!(report.alive(), 20);
        assert_eq!(report.survival_rate(), 100.0);
        assert_eq!(report.verdict, RampVerdict::Pass);
        assert!(eventually(Duration::from_secs(2), || service.connected() == 0).await);
    }
}
