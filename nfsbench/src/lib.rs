#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod collector;
mod error;
mod orchestrator;
pub mod runner;
pub mod sink;

pub use collector::StatisticsCollector;
pub use error::{OrchestratorError, PairError, RunnerError, SinkError};
pub use orchestrator::ScenarioOrchestrator;
pub use runner::{CancelSignal, RunOutput, WorkloadRunner};
pub use sink::{JsonFileSink, NoopSink, ResultSink};

pub mod prelude {
    pub use crate::orchestrator::ScenarioOrchestrator;
    pub use crate::runner::{CancelSignal, WorkloadRunner};
    pub use crate::sink::{JsonFileSink, ResultSink};
    pub use nfsbench_core::{
        BackendAdapter, BackendError, BackendFactory, BackendStats, BenchmarkRecord,
        ScenarioDescriptor, Statistics, StorageVariant, SuiteConfig, SuiteResults,
    };
}
