//! Suite execution
//!
//! Pairs run strictly one after another: every enabled scenario against every configured
//! storage variant, each pair going through
//! `Pending → Connecting → Preparing → Running → Completed | Failed`.
use crate::error::{OrchestratorError, PairError};
use crate::runner::{CancelSignal, WorkloadRunner};
use crate::sink::ResultSink;
use nfsbench_core::{
    format_bytes, BackendAdapter, BackendFactory, BackendStats, Comparison, ScenarioDescriptor,
    ScenarioResult, StorageVariant, SuiteConfig, SuiteResults, WorkloadConfig, FINAL_RECORD_COUNT,
};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PairState {
    Pending,
    Connecting,
    Preparing,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for PairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            PairState::Pending => "pending",
            PairState::Connecting => "connecting",
            PairState::Preparing => "preparing",
            PairState::Running => "running",
            PairState::Completed => "completed",
            PairState::Failed => "failed",
        };
        f.write_str(state)
    }
}

struct Transitions(PairState);

impl Transitions {
    fn to(&mut self, next: PairState) {
        debug!("{} -> {next}", self.0);
        self.0 = next;
    }
}

pub struct ScenarioOrchestrator<'a, F, S> {
    config: &'a SuiteConfig,
    factory: &'a F,
    sink: S,
    cancel: CancelSignal,
}

impl<'a, F: BackendFactory, S: ResultSink> ScenarioOrchestrator<'a, F, S> {
    pub fn new(config: &'a SuiteConfig, factory: &'a F, sink: S) -> Self {
        Self {
            config,
            factory,
            sink,
            cancel: CancelSignal::new(),
        }
    }

    /// Shared with every runner. Once tripped, no further pairs are started.
    pub fn cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every enabled scenario against every configured variant.
    ///
    /// Failed pairs are recorded and the suite carries on, unless `fail_fast` is set, in which
    /// case the first failure aborts the suite.
    #[instrument(name = "suite", skip_all, fields(database = self.factory.database()))]
    pub async fn run_all(&self) -> Result<SuiteResults, OrchestratorError> {
        let mut scenarios: Vec<&ScenarioDescriptor> = self.config.enabled_scenarios().collect();
        if scenarios.is_empty() {
            return Err(OrchestratorError::NothingToRun);
        }
        if self.config.variants.is_empty() {
            return Err(OrchestratorError::NoVariants);
        }
        if self.config.randomize_order {
            scenarios.shuffle(&mut rand::thread_rng());
        }

        let database = self.factory.database();
        let started_at = OffsetDateTime::now_utc();
        let clock = Instant::now();
        info!(
            "Running {} scenarios against {} storage variants",
            scenarios.len(),
            self.config.variants.len()
        );

        let mut by_scenario: Vec<(&str, BTreeMap<StorageVariant, ScenarioResult>)> = vec![];
        let mut pairs_run = 0usize;

        'suite: for scenario in scenarios {
            let mut results = BTreeMap::new();

            for variant in &self.config.variants {
                if pairs_run > 0
                    && !self.config.cooldown.is_zero()
                    && !self.cancel.is_cancelled()
                {
                    debug!(
                        "Cooling down for {}",
                        humantime::format_duration(self.config.cooldown)
                    );
                    tokio::time::sleep(self.config.cooldown).await;
                }

                // checked after the cooldown so a cancel during it starts nothing
                if self.cancel.is_cancelled() {
                    warn!("Cancelled, skipping remaining scenarios");
                    if !results.is_empty() {
                        by_scenario.push((scenario.name.as_str(), results));
                    }
                    break 'suite;
                }
                pairs_run += 1;

                let started = Instant::now();
                let result = match self.run_pair(scenario, variant).await {
                    Ok(result) => result,
                    Err(source) => {
                        error!("Scenario {} failed on {variant} storage: {source}", scenario.name);
                        let failed = ScenarioResult::failed(
                            &scenario.name,
                            database,
                            variant.clone(),
                            started.elapsed(),
                            &source,
                        );

                        if self.config.fail_fast {
                            results.insert(variant.clone(), failed);
                            self.write_scenario(database, &scenario.name, &results);
                            return Err(OrchestratorError::FailFast {
                                scenario: scenario.name.clone(),
                                variant: variant.clone(),
                                source,
                            });
                        }
                        failed
                    }
                };

                results.insert(variant.clone(), result);
                self.write_scenario(database, &scenario.name, &results);
            }

            by_scenario.push((scenario.name.as_str(), results));
        }

        let comparisons = self.compare(&by_scenario);
        let scenario_results = by_scenario
            .into_iter()
            .flat_map(|(_, results)| results.into_values())
            .map(|result| (result.key(), result))
            .collect();

        let results = SuiteResults {
            database: database.to_string(),
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            total_duration: clock.elapsed(),
            scenario_results,
            comparisons,
        };

        let failed = results.failed().count();
        info!(
            "Suite finished in {}: {} pairs, {failed} failed",
            humantime::format_duration(results.total_duration),
            results.scenario_results.len(),
        );

        if let Err(err) = self.sink.write_summary(&results) {
            warn!("Failed to write summary: {err}");
        }

        Ok(results)
    }

    #[instrument(name = "pair", skip_all, fields(scenario = %scenario.name, %variant))]
    async fn run_pair(
        &self,
        scenario: &ScenarioDescriptor,
        variant: &StorageVariant,
    ) -> Result<ScenarioResult, PairError> {
        let mut state = Transitions(PairState::Pending);
        let res = self.connect_and_run(&mut state, scenario, variant).await;
        state.to(if res.is_ok() {
            PairState::Completed
        } else {
            PairState::Failed
        });
        res
    }

    async fn connect_and_run(
        &self,
        state: &mut Transitions,
        scenario: &ScenarioDescriptor,
        variant: &StorageVariant,
    ) -> Result<ScenarioResult, PairError> {
        let workload = scenario.workload()?;
        info!("Starting {} on {variant} storage: {workload}", scenario.name);

        state.to(PairState::Connecting);
        let mut control = self
            .factory
            .connect(variant)
            .await
            .map_err(PairError::Connect)?;

        let res = self
            .prepare_and_run(state, &mut control, scenario, workload, variant)
            .await;

        if let Err(err) = control.close().await {
            warn!("Failed to close {}: {err}", control.name());
        }
        res
    }

    async fn prepare_and_run(
        &self,
        state: &mut Transitions,
        control: &mut F::Backend,
        scenario: &ScenarioDescriptor,
        workload: WorkloadConfig,
        variant: &StorageVariant,
    ) -> Result<ScenarioResult, PairError> {
        state.to(PairState::Preparing);
        control
            .create_benchmark_table()
            .await
            .map_err(PairError::Prepare)?;
        control
            .clear_benchmark_table()
            .await
            .map_err(PairError::Prepare)?;

        state.to(PairState::Running);
        let output = WorkloadRunner::new(workload)
            .warmup(self.config.warmup)
            .cancel_signal(self.cancel.clone())
            .run(self.factory, variant)
            .await?;

        let mut backend_stats = match control.stats().await {
            Ok(stats) => stats,
            Err(err) => {
                warn!("Failed to read backend stats: {err}");
                BackendStats::new()
            }
        };
        match control.count_records().await {
            Ok(count) => {
                backend_stats.insert(FINAL_RECORD_COUNT.to_string(), count.into());
            }
            Err(err) => warn!("Failed to count records: {err}"),
        }

        if let Some(bytes) = backend_stats
            .get("table_size_bytes")
            .and_then(serde_json::Value::as_u64)
        {
            info!("Table size after run: {}", format_bytes(bytes));
        }

        Ok(ScenarioResult::completed(
            &scenario.name,
            self.factory.database(),
            variant.clone(),
            output.statistics,
            backend_stats,
        ))
    }

    fn write_scenario(
        &self,
        database: &str,
        scenario: &str,
        results: &BTreeMap<StorageVariant, ScenarioResult>,
    ) {
        if let Err(err) = self.sink.write_scenario(database, scenario, results) {
            warn!("Failed to write results for {scenario}: {err}");
        }
    }

    /// Overhead of every other variant against the first configured one.
    fn compare(
        &self,
        by_scenario: &[(&str, BTreeMap<StorageVariant, ScenarioResult>)],
    ) -> Vec<Comparison> {
        let Some((baseline, candidates)) = self.config.variants.split_first() else {
            return vec![];
        };

        let mut comparisons = vec![];
        for (scenario, results) in by_scenario {
            let Some(base) = results.get(baseline) else {
                continue;
            };

            for candidate in candidates {
                let Some(comparison) = results
                    .get(candidate)
                    .and_then(|cand| Comparison::between(base, cand))
                else {
                    continue;
                };

                info!(
                    "{scenario}: {candidate} vs {baseline}: ops/s {:+.1}%, avg latency {:+.1}%, p95 latency {:+.1}%",
                    comparison.operations_per_second_percent,
                    comparison.average_latency_percent,
                    comparison.p95_latency_percent,
                );
                comparisons.push(comparison);
            }
        }
        comparisons
    }
}
