//! Result sinks
//!
//! The orchestrator hands results to a [`ResultSink`] after every scenario × variant pair and
//! once more at the end of a suite. [`JsonFileSink`] writes them as pretty-printed JSON.
use crate::error::SinkError;
use nfsbench_core::{ScenarioResult, StorageVariant, SuiteResults};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use time::OffsetDateTime;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub const SUMMARY_FILE: &str = "summary.json";

pub trait ResultSink {
    /// Persist every variant's result for a scenario gathered so far.
    ///
    /// Called again whenever another variant of the same scenario finishes, so implementations
    /// should overwrite rather than append.
    fn write_scenario(
        &self,
        database: &str,
        scenario: &str,
        results: &BTreeMap<StorageVariant, ScenarioResult>,
    ) -> Result<(), SinkError>;

    fn write_summary(&self, results: &SuiteResults) -> Result<(), SinkError>;
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl ResultSink for NoopSink {
    fn write_scenario(
        &self,
        _database: &str,
        _scenario: &str,
        _results: &BTreeMap<StorageVariant, ScenarioResult>,
    ) -> Result<(), SinkError> {
        Ok(())
    }

    fn write_summary(&self, _results: &SuiteResults) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes `<database>_<scenario>.json` per scenario and `summary.json` into a directory.
#[derive(Clone, Debug)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sink writing into a fresh `run_<YYYYMMDD_HHMMSS>` (UTC) directory under `base`.
    pub fn timestamped(base: impl AsRef<Path>) -> Self {
        let now = OffsetDateTime::now_utc();
        let stamp = now
            .format(format_description!(
                "[year][month][day]_[hour][minute][second]"
            ))
            .unwrap_or_else(|_| now.unix_timestamp().to_string());

        Self::new(base.as_ref().join(format!("run_{stamp}")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scenario_path(&self, database: &str, scenario: &str) -> PathBuf {
        self.dir.join(format!("{database}_{scenario}.json"))
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), SinkError> {
        let io_err = |source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(path, json).map_err(io_err)?;

        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl ResultSink for JsonFileSink {
    fn write_scenario(
        &self,
        database: &str,
        scenario: &str,
        results: &BTreeMap<StorageVariant, ScenarioResult>,
    ) -> Result<(), SinkError> {
        self.write_json(&self.scenario_path(database, scenario), results)
    }

    fn write_summary(&self, results: &SuiteResults) -> Result<(), SinkError> {
        let path = self.dir.join(SUMMARY_FILE);
        self.write_json(&path, results)?;
        info!("Results written to {}", self.dir.display());
        Ok(())
    }
}
