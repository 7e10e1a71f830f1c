//! Worker pool driving a backend for a bounded time window
use crate::collector::StatisticsCollector;
use crate::error::RunnerError;
use nfsbench_core::{
    BackendAdapter, BackendFactory, Statistics, StorageVariant, WorkloadConfig, ERROR_BACKOFF,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

mod worker;

use worker::Worker;

/// Shared, cloneable cancellation flag.
///
/// Workers observe it at the top of every iteration; in-flight operations are never interrupted.
#[derive(Clone, Debug, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Outcome of a single runner invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutput {
    pub statistics: Statistics,
    /// Logical operations merged from every worker (`batch_size` per successful batch).
    pub total_operations: u64,
}

#[derive(Clone, Debug)]
pub struct WorkloadRunner {
    workload: WorkloadConfig,
    warmup: Duration,
    backoff: Duration,
    cancel: CancelSignal,
}

impl WorkloadRunner {
    pub fn new(workload: WorkloadConfig) -> Self {
        Self {
            workload,
            warmup: Duration::ZERO,
            backoff: ERROR_BACKOFF,
            cancel: CancelSignal::new(),
        }
    }

    /// Run the worker loop for `warmup` before measuring. Warmup samples are discarded.
    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }

    /// Pause after a failed insert. Defaults to [`ERROR_BACKOFF`].
    pub fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn workload(&self) -> &WorkloadConfig {
        &self.workload
    }

    /// Connect one backend per worker, then [`drive`](Self::drive) them.
    ///
    /// Any connection failure aborts the run before measurement starts; connections opened so
    /// far are closed.
    #[instrument(name = "runner", skip_all, fields(database = factory.database(), %variant))]
    pub async fn run<F: BackendFactory>(
        &self,
        factory: &F,
        variant: &StorageVariant,
    ) -> Result<RunOutput, RunnerError> {
        let threads = self.workload.threads.get();
        let mut adapters = Vec::with_capacity(threads);

        for worker in 0..threads {
            match factory.connect(variant).await {
                Ok(adapter) => adapters.push(adapter),
                Err(source) => {
                    error!("Worker {worker} failed to connect: {source}");
                    close_all(adapters).await;
                    return Err(RunnerError::Connect {
                        worker,
                        variant: variant.clone(),
                        source,
                    });
                }
            }
        }
        debug!("Connected {threads} workers");

        self.drive(variant, adapters).await
    }

    /// Run one worker per adapter until the deadline or cancellation, then close every adapter.
    pub async fn drive<B: BackendAdapter + 'static>(
        &self,
        variant: &StorageVariant,
        adapters: Vec<B>,
    ) -> Result<RunOutput, RunnerError> {
        if adapters.is_empty() {
            return Err(RunnerError::NoWorkers);
        }

        let mut adapters = adapters;
        if !self.warmup.is_zero() && !self.cancel.is_cancelled() {
            info!("Warming up for {}", humantime::format_duration(self.warmup));
            let discarded = Arc::new(StatisticsCollector::new());
            adapters = self.phase(adapters, discarded, self.warmup).await?;
        }

        info!("Running {}", self.workload);
        let collector = Arc::new(StatisticsCollector::for_variant(variant));
        let adapters = self
            .phase(adapters, collector.clone(), self.workload.duration)
            .await?;
        close_all(adapters).await;

        let statistics = collector.results();
        info!(
            "Completed {} operations in {} ({:.1} ops/s, {} errors)",
            statistics.throughput,
            humantime::format_duration(statistics.total_duration),
            statistics.throughput_per_second,
            statistics.error_count,
        );

        Ok(RunOutput {
            total_operations: statistics.throughput,
            statistics,
        })
    }

    /// Spawn a worker per adapter and wait for all of them.
    ///
    /// `end()` and `set_throughput()` happen strictly after the join barrier.
    async fn phase<B: BackendAdapter + 'static>(
        &self,
        adapters: Vec<B>,
        collector: Arc<StatisticsCollector>,
        duration: Duration,
    ) -> Result<Vec<B>, RunnerError> {
        collector.start();
        let deadline = Instant::now() + duration;

        let handles: Vec<_> = adapters
            .into_iter()
            .enumerate()
            .map(|(id, adapter)| {
                let worker = Worker {
                    id,
                    adapter,
                    collector: collector.clone(),
                    batch_size: self.workload.batch_size,
                    record_size: self.workload.record_size,
                    backoff: self.backoff,
                    deadline,
                    cancel: self.cancel.clone(),
                };
                tokio::spawn(worker.run().in_current_span())
            })
            .collect();

        let mut returned = Vec::with_capacity(handles.len());
        let mut completed = 0u64;
        let mut failure = None;
        for handle in handles {
            match handle.await {
                Ok((adapter, count)) => {
                    completed += count;
                    returned.push(adapter);
                }
                Err(err) => {
                    error!("Worker task failed: {err}");
                    failure.get_or_insert(err);
                }
            }
        }

        collector.end();
        collector.set_throughput(completed);

        match failure {
            Some(err) => {
                close_all(returned).await;
                Err(err.into())
            }
            None => Ok(returned),
        }
    }
}

async fn close_all<B: BackendAdapter>(adapters: Vec<B>) {
    for mut adapter in adapters {
        if let Err(err) = adapter.close().await {
            warn!("Failed to close {}: {err}", adapter.name());
        }
    }
}
