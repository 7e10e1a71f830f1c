use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Scenario `{scenario}` is missing parameter `{key}`")]
    MissingParameter { scenario: String, key: &'static str },

    #[error("Scenario `{scenario}` has an invalid `{key}` parameter: {reason}")]
    InvalidParameter {
        scenario: String,
        key: &'static str,
        reason: String,
    },

    #[error("Scenario `{0}` must run for at least one second")]
    ZeroDuration(String),

    #[error("Unknown record size `{0}` (expected small, medium or large)")]
    UnknownRecordSize(String),
}

/// Error surfaced by a storage backend.
///
/// Concrete backends live outside this crate, so the payload is kept as text or a boxed source
/// error rather than a closed set of driver errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to connect: {0}")]
    Connect(String),

    #[error("Failed to prepare benchmark table: {0}")]
    Setup(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
