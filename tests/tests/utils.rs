use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use nfsbench_core::{ScenarioDescriptor, PARAM_BATCH_SIZE, PARAM_RECORD_SIZE, PARAM_THREADS};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

/// Install logging and the metrics recorder once per test binary.
#[allow(unused)]
pub fn init() -> &'static PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    HANDLE.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_env_filter("nfsbench=debug,mock_backend=debug")
            .try_init();

        PrometheusBuilder::new()
            .install_recorder()
            .expect("metrics recorder is installed once")
    })
}

#[allow(unused)]
pub fn scenario(
    name: &str,
    duration: Duration,
    threads: usize,
    batch_size: usize,
    record_size: &str,
) -> ScenarioDescriptor {
    ScenarioDescriptor::new(name, duration)
        .parameter(PARAM_THREADS, threads)
        .parameter(PARAM_BATCH_SIZE, batch_size)
        .parameter(PARAM_RECORD_SIZE, record_size)
}
