use nfsbench::OrchestratorError;
use nfsbench_core::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to read config `{path}`: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config `{path}`: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown scenario `{0}`")]
    UnknownScenario(String),

    #[error("Unknown storage type `{0}`")]
    UnknownStorageType(String),

    #[error(transparent)]
    Suite(#[from] OrchestratorError),
}
