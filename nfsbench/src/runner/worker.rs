use super::CancelSignal;
use crate::collector::StatisticsCollector;
use nfsbench_core::{BackendAdapter, RecordGenerator, RecordSize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// A single member of the pool. Owns its connection and record generator exclusively.
pub(super) struct Worker<B> {
    pub id: usize,
    pub adapter: B,
    pub collector: Arc<StatisticsCollector>,
    pub batch_size: NonZeroUsize,
    pub record_size: RecordSize,
    pub backoff: Duration,
    pub deadline: Instant,
    pub cancel: CancelSignal,
}

impl<B: BackendAdapter> Worker<B> {
    /// Loop until the deadline passes or the run is cancelled.
    ///
    /// Returns the connection along with the number of logical operations completed.
    pub async fn run(mut self) -> (B, u64) {
        let mut generator = RecordGenerator::new();
        let batch_size = self.batch_size.get();
        let mut completed = 0u64;

        while !self.cancel.is_cancelled() && Instant::now() < self.deadline {
            let records = generator.batch(batch_size, self.record_size);

            let start = Instant::now();
            let res = self.adapter.insert_batch(&records).await;
            let elapsed = start.elapsed();

            match res {
                Ok(()) => {
                    self.collector.add_latency(elapsed);
                    completed += batch_size as u64;
                }
                Err(err) => {
                    self.collector.add_error(&err);
                    let resume = (Instant::now() + self.backoff).min(self.deadline);
                    tokio::time::sleep_until(resume).await;
                }
            }

            // Backends that complete without suspending must not starve sibling workers.
            tokio::task::yield_now().await;
        }

        debug!(
            "Worker {} stopped after {completed} operations{}",
            self.id,
            if self.cancel.is_cancelled() {
                " (cancelled)"
            } else {
                ""
            }
        );
        (self.adapter, completed)
    }
}
