use crate::backend::BackendStats;
use crate::config::StorageVariant;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationNanoSeconds};
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

/// Statistics snapshot for a single runner invocation.
///
/// Derived entirely from the collector at snapshot time. Latency and duration fields are
/// serialized as integer nanoseconds.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "total_duration_ns")]
    pub total_duration: Duration,
    /// Number of recorded latency samples (one per batch call).
    pub total_operations: u64,
    /// Logical operations completed, set by the runner (batches count `batch_size` each).
    pub throughput: u64,
    pub operations_per_second: f64,
    pub throughput_per_second: f64,
    pub error_count: u64,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "average_latency_ns")]
    pub average_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "min_latency_ns")]
    pub min_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "max_latency_ns")]
    pub max_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "p50_latency_ns")]
    pub p50_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "p90_latency_ns")]
    pub p90_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "p95_latency_ns")]
    pub p95_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "p99_latency_ns")]
    pub p99_latency: Duration,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "p999_latency_ns")]
    pub p999_latency: Duration,
}

impl Statistics {
    /// Reduce raw samples into a snapshot.
    ///
    /// With no samples only duration, throughput and error count are populated.
    pub fn from_samples(
        mut samples: Vec<Duration>,
        total_duration: Duration,
        throughput: u64,
        error_count: u64,
    ) -> Self {
        let secs = total_duration.as_secs_f64();
        let per_second = |count: u64| {
            if secs > 0. {
                count as f64 / secs
            } else {
                0.
            }
        };

        let mut stats = Statistics {
            total_duration,
            throughput,
            throughput_per_second: per_second(throughput),
            error_count,
            ..Default::default()
        };

        if samples.is_empty() {
            return stats;
        }

        samples.sort_unstable();
        let sorted = samples;

        stats.total_operations = sorted.len() as u64;
        stats.operations_per_second = per_second(stats.total_operations);
        stats.average_latency = mean(&sorted);
        stats.min_latency = sorted[0];
        stats.max_latency = sorted[sorted.len() - 1];
        stats.p50_latency = floor_rank_percentile(&sorted, 50.);
        stats.p90_latency = floor_rank_percentile(&sorted, 90.);
        stats.p95_latency = floor_rank_percentile(&sorted, 95.);
        stats.p99_latency = floor_rank_percentile(&sorted, 99.);
        stats.p999_latency = floor_rank_percentile(&sorted, 99.9);
        stats
    }
}

/// Floor-rank percentile over an ascending slice.
///
/// `index = (p / 100) * len`. An integral index selects the sample at rank `index` (position
/// `index - 1`); otherwise the sample at position `floor(index)` is returned. No interpolation
/// between neighbours takes place. `p <= 0` yields the minimum and `p >= 100` the maximum.
pub fn floor_rank_percentile(sorted: &[Duration], percentile: f64) -> Duration {
    let Some(&last) = sorted.last() else {
        return Duration::ZERO;
    };

    if percentile <= 0. {
        return sorted[0];
    }
    if percentile >= 100. {
        return last;
    }

    let index = (percentile / 100.) * sorted.len() as f64;
    let rank = index as usize;
    if index.fract() == 0. {
        sorted[rank.saturating_sub(1)]
    } else {
        sorted.get(rank).copied().unwrap_or(last)
    }
}

/// Arithmetic mean using a 128-bit nanosecond accumulator.
fn mean(samples: &[Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }

    let total: u128 = samples.iter().map(Duration::as_nanos).sum();
    let avg = total / samples.len() as u128;
    Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX))
}

/// Outcome of one scenario × storage-variant pair.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub database: String,
    pub storage_type: StorageVariant,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "duration_ns")]
    pub duration: Duration,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
    #[serde(default)]
    pub backend_stats: BackendStats,
}

impl ScenarioResult {
    pub fn completed(
        name: &str,
        database: &str,
        storage_type: StorageVariant,
        statistics: Statistics,
        backend_stats: BackendStats,
    ) -> Self {
        Self {
            name: name.to_string(),
            database: database.to_string(),
            storage_type,
            duration: statistics.total_duration,
            success: true,
            error: None,
            statistics: Some(statistics),
            backend_stats,
        }
    }

    pub fn failed(
        name: &str,
        database: &str,
        storage_type: StorageVariant,
        duration: Duration,
        error: &dyn std::error::Error,
    ) -> Self {
        Self {
            name: name.to_string(),
            database: database.to_string(),
            storage_type,
            duration,
            success: false,
            error: Some(error.to_string()),
            statistics: None,
            backend_stats: BackendStats::new(),
        }
    }

    /// Suite-level key, `<database>_<scenario>_<variant>`.
    pub fn key(&self) -> String {
        format!("{}_{}_{}", self.database, self.name, self.storage_type)
    }
}

/// Relative cost of `candidate` over `baseline`, in percent.
pub fn overhead_percent(baseline: f64, candidate: f64) -> f64 {
    if baseline == 0. {
        return 0.;
    }
    ((candidate - baseline) / baseline) * 100.
}

/// Overhead of one variant against the baseline variant for a scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub scenario: String,
    pub baseline: StorageVariant,
    pub candidate: StorageVariant,
    pub operations_per_second_percent: f64,
    pub average_latency_percent: f64,
    pub p95_latency_percent: f64,
}

impl Comparison {
    /// `None` unless both sides completed.
    pub fn between(baseline: &ScenarioResult, candidate: &ScenarioResult) -> Option<Self> {
        let base = baseline.statistics.as_ref()?;
        let cand = candidate.statistics.as_ref()?;
        let nanos = |d: Duration| d.as_nanos() as f64;

        Some(Self {
            scenario: baseline.name.clone(),
            baseline: baseline.storage_type.clone(),
            candidate: candidate.storage_type.clone(),
            operations_per_second_percent: overhead_percent(
                base.operations_per_second,
                cand.operations_per_second,
            ),
            average_latency_percent: overhead_percent(
                nanos(base.average_latency),
                nanos(cand.average_latency),
            ),
            p95_latency_percent: overhead_percent(nanos(base.p95_latency), nanos(cand.p95_latency)),
        })
    }
}

/// Everything a suite run produced.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteResults {
    pub database: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    #[serde_as(as = "DurationNanoSeconds<u64>")]
    #[serde(rename = "total_duration_ns")]
    pub total_duration: Duration,
    pub scenario_results: BTreeMap<String, ScenarioResult>,
    pub comparisons: Vec<Comparison>,
}

impl SuiteResults {
    pub fn failed(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.scenario_results.values().filter(|r| !r.success)
    }
}
