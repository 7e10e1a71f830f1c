//! In-memory storage backend
//!
//! Stands in for a real database when exercising the engine: inserts are counted instead of
//! written, latency is simulated with a configurable profile, and failures can be injected per
//! storage variant.
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nfsbench_core::{
    BackendAdapter, BackendError, BackendFactory, BackendStats, BenchmarkRecord, StorageVariant,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, SkewNormal};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub mod prelude {
    pub use crate::{LatencyProfile, MockBackend, MockConfig, MockFactory, RateLimit};
}

/// Simulated latency of a single batch insert.
#[derive(Clone, Debug, Default)]
pub enum LatencyProfile {
    #[default]
    None,
    Fixed(Duration),
    /// Right-skewed noise around `mean`, never negative.
    SkewNormal { mean: Duration, std: Duration },
}

/// Per-variant rate limit on batch inserts.
#[derive(Clone, Copy, Debug)]
pub enum RateLimit {
    /// Calls above the rate wait for capacity.
    Throttle(NonZeroU32),
    /// Calls above the rate fail immediately.
    Reject(NonZeroU32),
}

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    pub latency: LatencyProfile,
    pub rate_limit: Option<RateLimit>,
    /// Fraction of batch inserts that fail, in `[0, 1]`.
    pub error_rate: f64,
    pub fail_connect: HashSet<StorageVariant>,
    pub fail_setup: HashSet<StorageVariant>,
}

impl MockConfig {
    pub fn latency(mut self, latency: LatencyProfile) -> Self {
        self.latency = latency;
        self
    }

    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.rate_limit = Some(limit);
        self
    }

    pub fn error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate.clamp(0., 1.);
        self
    }

    pub fn always_fail_inserts(self) -> Self {
        self.error_rate(1.)
    }

    pub fn fail_connect(mut self, variant: StorageVariant) -> Self {
        self.fail_connect.insert(variant);
        self
    }

    pub fn fail_setup(mut self, variant: StorageVariant) -> Self {
        self.fail_setup.insert(variant);
        self
    }
}

/// Shared state for one variant's benchmark table.
#[derive(Default)]
struct Table {
    created: AtomicBool,
    records: AtomicU64,
    bytes: AtomicU64,
    connections: AtomicI64,
}

#[derive(Clone)]
struct Variant {
    table: Arc<Table>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

pub struct MockFactory {
    database: String,
    config: MockConfig,
    variants: Mutex<HashMap<StorageVariant, Variant>>,
}

impl MockFactory {
    pub fn new(database: &str, config: MockConfig) -> Self {
        Self {
            database: database.to_string(),
            config,
            variants: Mutex::new(HashMap::new()),
        }
    }

    /// Records currently stored for `variant`.
    pub fn record_count(&self, variant: &StorageVariant) -> u64 {
        self.variant(variant).table.records.load(Ordering::Relaxed)
    }

    /// Connections opened and not yet closed for `variant`.
    pub fn open_connections(&self, variant: &StorageVariant) -> i64 {
        self.variant(variant).table.connections.load(Ordering::Relaxed)
    }

    fn variant(&self, variant: &StorageVariant) -> Variant {
        let mut variants = self
            .variants
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        variants
            .entry(variant.clone())
            .or_insert_with(|| Variant {
                table: Arc::default(),
                limiter: self.config.rate_limit.map(|limit| {
                    let tps = match limit {
                        RateLimit::Throttle(tps) | RateLimit::Reject(tps) => tps,
                    };
                    Arc::new(rate_limiter(tps))
                }),
            })
            .clone()
    }
}

impl BackendFactory for MockFactory {
    type Backend = MockBackend;

    fn database(&self) -> &str {
        &self.database
    }

    async fn connect(&self, variant: &StorageVariant) -> Result<MockBackend, BackendError> {
        if self.config.fail_connect.contains(variant) {
            return Err(BackendError::Connect(format!(
                "{variant} storage is unreachable"
            )));
        }

        let Variant { table, limiter } = self.variant(variant);
        table.connections.fetch_add(1, Ordering::Relaxed);
        trace!("Opened mock connection to {variant}");

        Ok(MockBackend {
            name: format!("{}-{variant}", self.database),
            table,
            limiter,
            reject_over_limit: matches!(self.config.rate_limit, Some(RateLimit::Reject(_))),
            latency: self.config.latency.clone(),
            error_rate: self.config.error_rate,
            fail_setup: self.config.fail_setup.contains(variant),
            rng: SmallRng::from_entropy(),
            closed: false,
        })
    }
}

pub struct MockBackend {
    name: String,
    table: Arc<Table>,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    reject_over_limit: bool,
    latency: LatencyProfile,
    error_rate: f64,
    fail_setup: bool,
    rng: SmallRng,
    closed: bool,
}

impl MockBackend {
    fn delay(&mut self) -> Duration {
        match self.latency {
            LatencyProfile::None => Duration::ZERO,
            LatencyProfile::Fixed(latency) => latency,
            LatencyProfile::SkewNormal { mean, std } => {
                match SkewNormal::new(mean.as_secs_f64(), std.as_secs_f64(), 20.) {
                    Ok(dist) => Duration::from_secs_f64(dist.sample(&mut self.rng).max(0.)),
                    Err(err) => {
                        warn!("Invalid latency profile, falling back to the mean: {err}");
                        mean
                    }
                }
            }
        }
    }

    fn check_open(&self) -> Result<(), BackendError> {
        if self.closed {
            Err(BackendError::Operation("connection is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

impl BackendAdapter for MockBackend {
    async fn create_benchmark_table(&mut self) -> Result<(), BackendError> {
        self.check_open()?;
        if self.fail_setup {
            return Err(BackendError::Setup(
                "permission denied for schema public".to_string(),
            ));
        }
        self.table.created.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn clear_benchmark_table(&mut self) -> Result<(), BackendError> {
        self.check_open()?;
        if !self.table.created.load(Ordering::Relaxed) {
            return Err(BackendError::Setup(
                "relation \"benchmark_data\" does not exist".to_string(),
            ));
        }
        self.table.records.store(0, Ordering::Relaxed);
        self.table.bytes.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn insert_batch(&mut self, records: &[BenchmarkRecord]) -> Result<(), BackendError> {
        self.check_open()?;

        if let Some(limiter) = &self.limiter {
            if self.reject_over_limit {
                if limiter.check().is_err() {
                    return Err(BackendError::Operation("too many requests".to_string()));
                }
            } else {
                limiter.until_ready().await;
            }
        }

        let delay = self.delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.error_rate > 0. && self.rng.gen_bool(self.error_rate.min(1.)) {
            return Err(BackendError::Operation(
                "could not extend file: No space left on device".to_string(),
            ));
        }

        if !self.table.created.load(Ordering::Relaxed) {
            return Err(BackendError::Operation(
                "relation \"benchmark_data\" does not exist".to_string(),
            ));
        }

        let bytes: usize = records.iter().map(BenchmarkRecord::payload_len).sum();
        self.table
            .records
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        self.table.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn count_records(&mut self) -> Result<u64, BackendError> {
        self.check_open()?;
        Ok(self.table.records.load(Ordering::Relaxed))
    }

    async fn stats(&mut self) -> Result<BackendStats, BackendError> {
        self.check_open()?;
        let mut stats = BackendStats::new();
        stats.insert(
            "table_size_bytes".to_string(),
            self.table.bytes.load(Ordering::Relaxed).into(),
        );
        stats.insert(
            "open_connections".to_string(),
            self.table.connections.load(Ordering::Relaxed).into(),
        );
        Ok(stats)
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.check_open()?;
        self.closed = true;
        self.table.connections.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}

fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}
