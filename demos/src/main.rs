use anyhow::Result;
use mock_backend::prelude::*;
use nfsbench_runtime::BenchRuntime;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nfsbench=info")),
        )
        .init();

    // In-memory stand-in for a real database.
    let factory = MockFactory::new(
        "postgresql",
        MockConfig::default()
            .latency(LatencyProfile::SkewNormal {
                mean: Duration::from_millis(3),
                std: Duration::from_millis(1),
            })
            .rate_limit(RateLimit::Throttle(NonZeroU32::new(5_000).unwrap()))
            .error_rate(0.001),
    );

    BenchRuntime::new(factory).with_args()?.run().await?;
    Ok(())
}
