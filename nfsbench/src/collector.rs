use nfsbench_core::{Statistics, StorageVariant};
use std::fmt::Display;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Default)]
struct CollectorState {
    latencies: Vec<Duration>,
    error_count: u64,
    throughput: u64,
    start: Option<Instant>,
    end: Option<Instant>,
}

/// Thread-safe accumulator for a single workload run.
///
/// All mutable state sits behind one mutex. Workers only ever append, so a poisoned lock still
/// holds consistent data and is recovered rather than propagated.
#[derive(Default)]
pub struct StatisticsCollector {
    state: Mutex<CollectorState>,
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    variant: Option<String>,
}

impl StatisticsCollector {
    /// Collector that emits no `metrics` data, e.g. for warmup runs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector that also reports to `metrics`, labelled with `variant`.
    pub fn for_variant(variant: &StorageVariant) -> Self {
        Self {
            state: Mutex::default(),
            variant: Some(variant.to_string()),
        }
    }

    pub fn start(&self) {
        self.lock().start = Some(Instant::now());
    }

    /// Must be called after every worker has stopped.
    pub fn end(&self) {
        let mut state = self.lock();
        let now = Instant::now();
        // end >= start, even when start() was never called
        state.start.get_or_insert(now);
        state.end = Some(now);
    }

    pub fn add_latency(&self, latency: Duration) {
        self.lock().latencies.push(latency);

        #[cfg(feature = "metrics")]
        if let Some(variant) = &self.variant {
            metrics::describe_histogram!(
                "nfsbench_insert_latency",
                metrics::Unit::Nanoseconds,
                "Latency of a single batch insert"
            );
            metrics::histogram!("nfsbench_insert_latency", "variant" => variant.clone())
                .record(latency.as_nanos() as f64);
        }
    }

    /// Count a failed operation. The error itself is not retained.
    pub fn add_error<E: Display + ?Sized>(&self, err: &E) {
        self.lock().error_count += 1;
        trace!("Operation failed: {err}");

        #[cfg(feature = "metrics")]
        if let Some(variant) = &self.variant {
            metrics::counter!("nfsbench_insert_errors", "variant" => variant.clone()).increment(1);
        }
    }

    pub fn set_throughput(&self, operations: u64) {
        self.lock().throughput = operations;
    }

    pub fn sample_count(&self) -> usize {
        self.lock().latencies.len()
    }

    pub fn error_count(&self) -> u64 {
        self.lock().error_count
    }

    /// Snapshot of everything collected so far.
    ///
    /// Does not mutate the collector; repeated calls return identical values. Before
    /// [`end`](Self::end) the duration is measured up to now, and without a
    /// [`start`](Self::start) it is zero.
    pub fn results(&self) -> Statistics {
        let state = self.lock();
        let total_duration = match (state.start, state.end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            (None, _) => Duration::ZERO,
        };

        Statistics::from_samples(
            state.latencies.clone(),
            total_duration,
            state.throughput,
            state.error_count,
        )
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn computes_snapshot() {
        let collector = StatisticsCollector::new();
        collector.start();
        for ms in [50, 10, 40, 20, 30] {
            collector.add_latency(Duration::from_millis(ms));
        }
        collector.add_error("connection reset");
        tokio::time::sleep(Duration::from_secs(2)).await;
        collector.set_throughput(500);
        collector.end();

        let stats = collector.results();
        assert_eq!(stats.total_duration, Duration::from_secs(2));
        assert_eq!(stats.total_operations, 5);
        assert_eq!(stats.throughput, 500);
        assert_eq!(stats.throughput_per_second, 250.);
        assert_eq!(stats.operations_per_second, 2.5);
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.min_latency, Duration::from_millis(10));
        assert_eq!(stats.max_latency, Duration::from_millis(50));
        assert_eq!(stats.average_latency, Duration::from_millis(30));
        assert_eq!(stats.p50_latency, Duration::from_millis(30));
        assert_eq!(stats.p90_latency, Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_idempotent() {
        let collector = StatisticsCollector::new();
        collector.start();
        collector.add_latency(Duration::from_millis(3));
        collector.add_latency(Duration::from_millis(1));
        collector.end();

        let first = collector.results();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(first, collector.results());
        assert_eq!(collector.sample_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_run() {
        let collector = StatisticsCollector::new();
        collector.start();
        collector.add_error("no space left on device");
        collector.add_error("no space left on device");
        assert_eq!(collector.error_count(), 2);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        collector.end();

        let stats = collector.results();
        assert_eq!(stats.total_duration, Duration::from_millis(1500));
        assert_eq!(stats.total_operations, 0);
        assert_eq!(stats.error_count, 2);
        assert_eq!(stats.average_latency, Duration::ZERO);
        assert_eq!(stats.p999_latency, Duration::ZERO);
    }

    #[test]
    fn unstarted_collector_has_zero_duration() {
        let collector = StatisticsCollector::new();
        assert_eq!(collector.results().total_duration, Duration::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_writers_lose_nothing() {
        const WRITERS: usize = 16;
        const SAMPLES: usize = 5_000;

        let collector = Arc::new(StatisticsCollector::for_variant(&StorageVariant::nfs()));
        collector.start();

        let handles: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let collector = collector.clone();
                tokio::spawn(async move {
                    for i in 0..SAMPLES {
                        collector.add_latency(Duration::from_micros((writer * i) as u64 % 997));
                        if i % 100 == 0 {
                            collector.add_error("transient");
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        collector.end();

        let stats = collector.results();
        assert_eq!(stats.total_operations, (WRITERS * SAMPLES) as u64);
        assert_eq!(stats.error_count, (WRITERS * SAMPLES / 100) as u64);
    }
}
