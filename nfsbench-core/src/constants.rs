use std::time::Duration;

/// Pause taken by a worker after a failed batch insert before it tries again.
pub const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Default directory results are written under.
pub const DEFAULT_OUTPUT_DIR: &str = "./results";

pub const DIRECT_VARIANT: &str = "direct";
pub const NFS_VARIANT: &str = "nfs";

/// Scenario parameter keys
pub const PARAM_THREADS: &str = "threads";
pub const PARAM_BATCH_SIZE: &str = "batch_size";
pub const PARAM_RECORD_SIZE: &str = "record_size";

/// Backend stats key populated by the orchestrator once a run has finished.
pub const FINAL_RECORD_COUNT: &str = "final_record_count";
