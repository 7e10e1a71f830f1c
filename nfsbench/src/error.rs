use nfsbench_core::{BackendError, ConfigError, StorageVariant};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to connect worker {worker} to {variant} storage: {source}")]
    Connect {
        worker: usize,
        variant: StorageVariant,
        #[source]
        source: BackendError,
    },

    #[error("Runner needs at least one backend connection")]
    NoWorkers,

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Why a single scenario × variant pair failed.
#[derive(Debug, Error)]
pub enum PairError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connect(BackendError),

    #[error(transparent)]
    Prepare(BackendError),

    #[error(transparent)]
    Runner(#[from] RunnerError),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Scenario `{scenario}` failed on {variant} storage: {source}")]
    FailFast {
        scenario: String,
        variant: StorageVariant,
        #[source]
        source: PairError,
    },

    #[error("No enabled scenarios to run")]
    NothingToRun,

    #[error("No storage variants configured")]
    NoVariants,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}
