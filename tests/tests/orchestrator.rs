mod utils;
#[allow(unused)]
use utils::*;

mod tests {
    use super::*;

    use mock_backend::prelude::*;
    use nfsbench::prelude::*;
    use nfsbench::OrchestratorError;
    use nfsbench_core::FINAL_RECORD_COUNT;
    use std::time::Duration;

    fn suite(dir: &std::path::Path) -> SuiteConfig {
        let mut config = SuiteConfig::new(vec![
            scenario("heavy_inserts", Duration::from_secs(2), 4, 10, "medium"),
            scenario("small_batches", Duration::from_secs(1), 8, 5, "small"),
            scenario("large_records", Duration::from_secs(1), 2, 10, "large"),
        ]);
        config.output_dir = dir.to_path_buf();
        config
    }

    fn read_json(path: std::path::PathBuf) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(120_000)]
    async fn nfs_slower_than_direct() -> anyhow::Result<()> {
        init();
        let dir = tempfile::tempdir()?;
        let config = suite(dir.path());

        // nfs: 4ms per batch, direct: 2ms per batch
        struct Split {
            direct: MockFactory,
            nfs: MockFactory,
        }

        impl BackendFactory for Split {
            type Backend = MockBackend;

            fn database(&self) -> &str {
                "postgresql"
            }

            async fn connect(
                &self,
                variant: &StorageVariant,
            ) -> Result<MockBackend, BackendError> {
                if variant == &StorageVariant::nfs() {
                    self.nfs.connect(variant).await
                } else {
                    self.direct.connect(variant).await
                }
            }
        }

        let fixed =
            |ms| MockConfig::default().latency(LatencyProfile::Fixed(Duration::from_millis(ms)));
        let factory = Split {
            direct: MockFactory::new("postgresql", fixed(2)),
            nfs: MockFactory::new("postgresql", fixed(4)),
        };

        let results = ScenarioOrchestrator::new(&config, &factory, JsonFileSink::new(dir.path()))
            .run_all()
            .await?;

        assert_eq!(results.scenario_results.len(), 6);
        assert_eq!(results.failed().count(), 0);
        assert_eq!(results.comparisons.len(), 3);
        for comparison in &results.comparisons {
            assert_eq!(comparison.baseline, StorageVariant::direct());
            assert_eq!(comparison.candidate, StorageVariant::nfs());
            assert_eq!(comparison.operations_per_second_percent, -50.);
            assert_eq!(comparison.average_latency_percent, 100.);
            assert_eq!(comparison.p95_latency_percent, 100.);
        }

        let heavy = read_json(dir.path().join("postgresql_heavy_inserts.json"))?;
        // 4 workers × 1000 batches × 10 on direct
        assert_eq!(heavy["direct"]["statistics"]["throughput"], 40_000);
        assert_eq!(heavy["direct"]["backend_stats"][FINAL_RECORD_COUNT], 40_000);
        assert_eq!(heavy["nfs"]["statistics"]["p50_latency_ns"], 4_000_000);
        assert!(heavy["direct"]["backend_stats"]["table_size_bytes"].as_u64().unwrap() > 0);

        let summary = read_json(dir.path().join("summary.json"))?;
        assert_eq!(summary["database"], "postgresql");
        assert!(summary["scenario_results"]
            .get("postgresql_small_batches_nfs")
            .is_some());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(60_000)]
    async fn unreachable_nfs_is_recorded() -> anyhow::Result<()> {
        init();
        let dir = tempfile::tempdir()?;
        let config = suite(dir.path());
        let factory = MockFactory::new(
            "mysql",
            MockConfig::default()
                .latency(LatencyProfile::Fixed(Duration::from_millis(5)))
                .fail_connect(StorageVariant::nfs()),
        );

        let results = ScenarioOrchestrator::new(&config, &factory, JsonFileSink::new(dir.path()))
            .run_all()
            .await?;

        assert_eq!(results.scenario_results.len(), 6);
        assert_eq!(results.failed().count(), 3);
        assert!(results.comparisons.is_empty());

        let file = read_json(dir.path().join("mysql_large_records.json"))?;
        assert_eq!(file["direct"]["success"], true);
        assert_eq!(file["nfs"]["success"], false);
        assert!(file["nfs"]["error"]
            .as_str()
            .unwrap()
            .contains("unreachable"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(60_000)]
    async fn fail_fast_keeps_partial_results() -> anyhow::Result<()> {
        init();
        let dir = tempfile::tempdir()?;
        let mut config = suite(dir.path());
        config.fail_fast = true;
        let factory = MockFactory::new(
            "postgresql",
            MockConfig::default()
                .latency(LatencyProfile::Fixed(Duration::from_millis(5)))
                .fail_setup(StorageVariant::nfs()),
        );

        let err = ScenarioOrchestrator::new(&config, &factory, JsonFileSink::new(dir.path()))
            .run_all()
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            OrchestratorError::FailFast { scenario, .. } if scenario == "heavy_inserts"
        ));

        // direct finished before nfs failed; later scenarios never started
        let heavy = read_json(dir.path().join("postgresql_heavy_inserts.json"))?;
        assert_eq!(heavy["direct"]["success"], true);
        assert_eq!(heavy["nfs"]["success"], false);
        assert!(!dir.path().join("postgresql_small_batches.json").exists());
        assert!(!dir.path().join("summary.json").exists());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(60_000)]
    async fn cancel_mid_suite() -> anyhow::Result<()> {
        init();
        let dir = tempfile::tempdir()?;
        let config = suite(dir.path());
        let factory = MockFactory::new(
            "postgresql",
            MockConfig::default().latency(LatencyProfile::Fixed(Duration::from_millis(5))),
        );

        let cancel = CancelSignal::new();
        let trip = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                // inside the nfs run of heavy_inserts
                tokio::time::sleep(Duration::from_secs(3)).await;
                cancel.cancel();
            })
        };

        let results = ScenarioOrchestrator::new(&config, &factory, JsonFileSink::new(dir.path()))
            .cancel_signal(cancel)
            .run_all()
            .await?;
        trip.await?;

        assert_eq!(results.scenario_results.len(), 2);
        let nfs = &results.scenario_results["postgresql_heavy_inserts_nfs"];
        assert!(nfs.success);
        assert!(nfs.duration < Duration::from_secs(2));
        assert!(dir.path().join("summary.json").exists());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    #[ntest::timeout(60_000)]
    async fn randomized_order_runs_everything() -> anyhow::Result<()> {
        init();
        let mut config = suite(std::path::Path::new("unused"));
        config.randomize_order = true;
        config.variants = vec![StorageVariant::nfs()];
        let factory = MockFactory::new(
            "sqlite",
            MockConfig::default().latency(LatencyProfile::Fixed(Duration::from_millis(5))),
        );

        let results = ScenarioOrchestrator::new(&config, &factory, nfsbench::NoopSink)
            .run_all()
            .await?;

        let mut keys: Vec<_> = results.scenario_results.keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "sqlite_heavy_inserts_nfs",
                "sqlite_large_records_nfs",
                "sqlite_small_batches_nfs"
            ]
        );
        assert!(results.comparisons.is_empty());
        Ok(())
    }
}
