//! Command-line runtime
//!
//! Resolves a [`SuiteConfig`] from an optional JSON file plus command-line flags, then runs the
//! suite against a [`BackendFactory`] with Ctrl-C wired to cooperative cancellation.
use crate::error::RuntimeError;
use clap::Parser;
use nfsbench::{CancelSignal, JsonFileSink, ScenarioOrchestrator};
use nfsbench_core::{
    BackendFactory, ScenarioDescriptor, StorageVariant, SuiteConfig, SuiteResults,
    PARAM_BATCH_SIZE, PARAM_RECORD_SIZE, PARAM_THREADS,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn, Instrument};

#[derive(Parser, Debug, Default)]
#[command(version, about = "Benchmark a database on direct vs. NFS-mounted storage")]
pub struct BenchCli {
    /// JSON suite configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Only run these scenarios
    #[arg(short, long, value_delimiter = ',')]
    pub scenarios: Vec<String>,

    /// Only run against these storage types
    #[arg(long, value_delimiter = ',')]
    pub storage_types: Vec<String>,

    /// Base directory for result files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Abort the suite on the first failed scenario
    #[arg(long)]
    pub fail_fast: bool,

    /// Unmeasured warmup before each run, e.g. `10s`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub warmup: Option<Duration>,

    /// Pause between runs, e.g. `30s`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub cooldown: Option<Duration>,

    /// Shuffle scenario order
    #[arg(long)]
    pub randomize: bool,

    /// Print the execution plan without running anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Suite used when no configuration file is given.
pub fn default_suite() -> SuiteConfig {
    SuiteConfig::new(vec![ScenarioDescriptor::new(
        "heavy_inserts",
        Duration::from_secs(60),
    )
    .description("Concurrent batch inserts of medium sized records")
    .parameter(PARAM_THREADS, 4)
    .parameter(PARAM_BATCH_SIZE, 100)
    .parameter(PARAM_RECORD_SIZE, "medium")])
}

pub fn load_config(path: &Path) -> Result<SuiteConfig, RuntimeError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RuntimeError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| RuntimeError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}

/// Benchmark runtime.
///
/// # Example
///
/// ```ignore
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     BenchRuntime::new(PostgresFactory::default())
///         .with_args()?
///         .run()
///         .await?;
///     Ok(())
/// }
/// ```
pub struct BenchRuntime<F> {
    factory: F,
    config: SuiteConfig,
    dry_run: bool,
}

impl<F: BackendFactory> BenchRuntime<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            config: default_suite(),
            dry_run: false,
        }
    }

    pub fn config(mut self, config: SuiteConfig) -> Self {
        self.config = config;
        self
    }

    pub fn suite(&self) -> &SuiteConfig {
        &self.config
    }

    /// Apply the process arguments.
    ///
    /// `-c`, `--config` to load the suite from a JSON file
    ///
    /// `-s`, `--scenarios` and `--storage-types` to narrow the suite (comma separated)
    ///
    /// ```ignore
    /// $ ./nfsbench -c suite.json -s heavy_inserts --storage-types nfs --warmup 10s
    /// ```
    pub fn with_args(self) -> Result<Self, RuntimeError> {
        self.apply(BenchCli::parse())
    }

    pub fn apply(mut self, args: BenchCli) -> Result<Self, RuntimeError> {
        if let Some(path) = &args.config {
            self.config = load_config(path)?;
            debug!("Loaded suite from {}", path.display());
        }

        if !args.scenarios.is_empty() {
            for name in &args.scenarios {
                if !self.config.scenarios.iter().any(|s| &s.name == name) {
                    return Err(RuntimeError::UnknownScenario(name.clone()));
                }
            }
            self.config.filter_scenarios(&args.scenarios);
        }

        if !args.storage_types.is_empty() {
            for name in &args.storage_types {
                if !self.config.variants.contains(&StorageVariant::new(name.as_str())) {
                    return Err(RuntimeError::UnknownStorageType(name.clone()));
                }
            }
            self.config.filter_variants(&args.storage_types);
        }

        if let Some(output) = args.output {
            self.config.output_dir = output;
        }
        if let Some(warmup) = args.warmup {
            self.config.warmup = warmup;
        }
        if let Some(cooldown) = args.cooldown {
            self.config.cooldown = cooldown;
        }
        self.config.fail_fast |= args.fail_fast;
        self.config.randomize_order |= args.randomize;
        self.dry_run |= args.dry_run;

        Ok(self)
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the suite, or only log the plan in dry-run mode (returning `None`).
    #[instrument(name = "nfsbench", skip_all, fields(database = self.factory.database()))]
    pub async fn run(self) -> Result<Option<SuiteResults>, RuntimeError> {
        for scenario in self.config.enabled_scenarios() {
            scenario.workload()?;
        }

        if self.dry_run {
            self.log_plan();
            return Ok(None);
        }

        let cancel = CancelSignal::new();
        let interrupt = tokio::spawn(
            {
                let cancel = cancel.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        warn!("Interrupted, stopping after in-flight operations");
                        cancel.cancel();
                    }
                }
            }
            .in_current_span(),
        );

        let sink = JsonFileSink::timestamped(&self.config.output_dir);
        info!("Writing results to {}", sink.dir().display());

        let res = ScenarioOrchestrator::new(&self.config, &self.factory, sink)
            .cancel_signal(cancel)
            .run_all()
            .await;
        interrupt.abort();

        let results = res?;
        log_summary(&results);
        Ok(Some(results))
    }

    fn log_plan(&self) {
        let variants: Vec<_> = self.config.variants.iter().map(|v| v.as_str()).collect();
        info!(
            "Dry run for {} on [{}], results under {}",
            self.factory.database(),
            variants.join(", "),
            self.config.output_dir.display()
        );

        let mut total = Duration::ZERO;
        for scenario in self.config.enabled_scenarios() {
            if let Ok(workload) = scenario.workload() {
                info!("  {}: {workload}", scenario.name);
            }
            total += (scenario.duration + self.config.warmup) * variants.len() as u32;
        }
        info!(
            "Estimated run time: {}",
            humantime::format_duration(total)
        );
    }
}

fn log_summary(results: &SuiteResults) {
    for (key, result) in &results.scenario_results {
        match &result.statistics {
            Some(stats) if result.success => info!(
                "{key}: {:.1} ops/s, avg {}, p95 {}, p99 {}, {} errors",
                stats.throughput_per_second,
                humantime::format_duration(stats.average_latency),
                humantime::format_duration(stats.p95_latency),
                humantime::format_duration(stats.p99_latency),
                stats.error_count,
            ),
            _ => error!(
                "{key}: failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
