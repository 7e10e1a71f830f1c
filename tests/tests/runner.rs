mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_backend::prelude::*;
    use nfsbench::prelude::*;
    use nfsbench_core::ERROR_BACKOFF;
    use std::time::Duration;
    use tokio::time::Instant;

    async fn prepared(factory: &MockFactory, variant: &StorageVariant) {
        let mut conn = factory.connect(variant).await.unwrap();
        conn.create_benchmark_table().await.unwrap();
        conn.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(120_000)]
    async fn four_workers_fixed_latency() {
        init();

        let factory = MockFactory::new(
            "postgresql",
            MockConfig::default().latency(LatencyProfile::Fixed(Duration::from_millis(1))),
        );
        let variant = StorageVariant::direct();
        prepared(&factory, &variant).await;

        let workload = scenario("heavy_inserts", Duration::from_secs(2), 4, 100, "small")
            .workload()
            .unwrap();
        let output = WorkloadRunner::new(workload)
            .run(&factory, &variant)
            .await
            .unwrap();

        // 4 workers × (2000ms / 1ms) × 100
        assert!((760_000..=800_000).contains(&output.total_operations));
        assert_eq!(factory.record_count(&variant), output.total_operations);

        let stats = output.statistics;
        assert_eq!(stats.error_count, 0);
        assert_eq!(stats.total_operations * 100, output.total_operations);
        for latency in [
            stats.min_latency,
            stats.max_latency,
            stats.average_latency,
            stats.p50_latency,
            stats.p90_latency,
            stats.p95_latency,
            stats.p99_latency,
            stats.p999_latency,
        ] {
            assert_eq!(latency, Duration::from_millis(1));
        }
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(30_000)]
    async fn failing_inserts_stop_at_deadline() {
        init();

        let factory = MockFactory::new("postgresql", MockConfig::default().always_fail_inserts());
        let variant = StorageVariant::nfs();
        prepared(&factory, &variant).await;

        let duration = Duration::from_secs(2);
        let workload = scenario("heavy_inserts", duration, 4, 100, "medium")
            .workload()
            .unwrap();

        let start = Instant::now();
        let output = WorkloadRunner::new(workload)
            .run(&factory, &variant)
            .await
            .unwrap();

        assert!(start.elapsed() <= duration + ERROR_BACKOFF);
        assert!(output.statistics.error_count > 0);
        assert_eq!(output.statistics.total_operations, 0);
        assert_eq!(output.total_operations, 0);
        assert_eq!(factory.record_count(&variant), 0);
        assert_eq!(factory.open_connections(&variant), 0);
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(30_000)]
    async fn partial_error_rate() {
        init();

        let factory = MockFactory::new(
            "postgresql",
            MockConfig::default()
                .latency(LatencyProfile::Fixed(Duration::from_millis(5)))
                .error_rate(0.25),
        );
        let variant = StorageVariant::direct();
        prepared(&factory, &variant).await;

        let workload = scenario("heavy_inserts", Duration::from_secs(2), 2, 10, "small")
            .workload()
            .unwrap();
        let output = WorkloadRunner::new(workload)
            .run(&factory, &variant)
            .await
            .unwrap();

        let stats = output.statistics;
        assert!(stats.error_count > 0);
        assert!(stats.total_operations > 0);
        // failed batches are counted once and never recorded as latency
        assert_eq!(stats.total_operations * 10, output.total_operations);
        assert_eq!(factory.record_count(&variant), output.total_operations);
    }

    #[tokio::test(start_paused = true)]
    async fn metrics_are_labelled_by_variant() {
        let handle = init();

        let factory = MockFactory::new(
            "postgresql",
            MockConfig::default().latency(LatencyProfile::Fixed(Duration::from_millis(10))),
        );
        let variant = StorageVariant::new("nfs-v4");
        prepared(&factory, &variant).await;

        let workload = scenario("heavy_inserts", Duration::from_secs(1), 1, 1, "small")
            .workload()
            .unwrap();
        WorkloadRunner::new(workload)
            .run(&factory, &variant)
            .await
            .unwrap();

        let rendered = handle.render();
        assert!(rendered.contains("nfsbench_insert_latency"));
        assert!(rendered.contains(r#"variant="nfs-v4""#));
    }

    #[cfg(feature = "integration")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(60_000)]
    async fn skewed_latency_real_clock() {
        init();

        let factory = MockFactory::new(
            "postgresql",
            MockConfig::default().latency(LatencyProfile::SkewNormal {
                mean: Duration::from_millis(2),
                std: Duration::from_millis(1),
            }),
        );
        let variant = StorageVariant::direct();
        prepared(&factory, &variant).await;

        let workload = scenario("heavy_inserts", Duration::from_secs(5), 8, 50, "large")
            .workload()
            .unwrap();
        let stats = WorkloadRunner::new(workload)
            .run(&factory, &variant)
            .await
            .unwrap()
            .statistics;

        assert!(stats.min_latency <= stats.p50_latency);
        assert!(stats.p50_latency <= stats.p99_latency);
        assert!(stats.p99_latency <= stats.max_latency);
        assert!(stats.throughput_per_second > 0.);
    }
}
