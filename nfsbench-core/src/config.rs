use crate::constants::{
    DEFAULT_OUTPUT_DIR, DIRECT_VARIANT, NFS_VARIANT, PARAM_BATCH_SIZE, PARAM_RECORD_SIZE,
    PARAM_THREADS,
};
use crate::data::RecordSize;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{serde_as, DurationSeconds};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// One arm of a comparison (e.g. direct-attached vs. NFS-mounted storage).
///
/// Opaque to the engine beyond selecting a distinct backend connection target.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageVariant(String);

impl StorageVariant {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn direct() -> Self {
        Self::new(DIRECT_VARIANT)
    }

    pub fn nfs() -> Self {
        Self::new(NFS_VARIANT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StorageVariant {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Named workload configuration executed once per storage variant.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

fn enabled_by_default() -> bool {
    true
}

impl ScenarioDescriptor {
    pub fn new(name: &str, duration: Duration) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            enabled: true,
            duration,
            parameters: BTreeMap::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn parameter(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Resolve the typed workload parameters.
    ///
    /// Numbers are accepted either as JSON numbers or as numeric strings, since hand-written
    /// configs use both.
    pub fn workload(&self) -> Result<WorkloadConfig, ConfigError> {
        if self.duration.is_zero() {
            return Err(ConfigError::ZeroDuration(self.name.clone()));
        }

        let threads = self.non_zero(PARAM_THREADS)?;
        let batch_size = self.non_zero(PARAM_BATCH_SIZE)?;
        let record_size = match self.parameters.get(PARAM_RECORD_SIZE) {
            Some(Value::String(s)) => s.parse()?,
            Some(other) => {
                return Err(ConfigError::InvalidParameter {
                    scenario: self.name.clone(),
                    key: PARAM_RECORD_SIZE,
                    reason: format!("expected a string, found {other}"),
                })
            }
            None => return Err(self.missing(PARAM_RECORD_SIZE)),
        };

        Ok(WorkloadConfig {
            threads,
            batch_size,
            record_size,
            duration: self.duration,
        })
    }

    fn non_zero(&self, key: &'static str) -> Result<NonZeroUsize, ConfigError> {
        let value = self.parameters.get(key).ok_or_else(|| self.missing(key))?;
        let parsed = match value {
            Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
            Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        };

        parsed
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ConfigError::InvalidParameter {
                scenario: self.name.clone(),
                key,
                reason: format!("expected a positive integer, found {value}"),
            })
    }

    fn missing(&self, key: &'static str) -> ConfigError {
        ConfigError::MissingParameter {
            scenario: self.name.clone(),
            key,
        }
    }
}

/// Validated parameters for a single runner invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkloadConfig {
    pub threads: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub record_size: RecordSize,
    pub duration: Duration,
}

impl fmt::Display for WorkloadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} threads, batch size {}, {} records for {}",
            self.threads,
            self.batch_size,
            self.record_size,
            humantime::format_duration(self.duration)
        )
    }
}

/// Fully resolved suite configuration.
///
/// Built once (from a file, flags, or code) and handed to the orchestrator by reference.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    pub scenarios: Vec<ScenarioDescriptor>,
    pub variants: Vec<StorageVariant>,
    pub fail_fast: bool,
    pub output_dir: PathBuf,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub warmup: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub cooldown: Duration,
    pub randomize_order: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            scenarios: vec![],
            variants: vec![StorageVariant::direct(), StorageVariant::nfs()],
            fail_fast: false,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            warmup: Duration::ZERO,
            cooldown: Duration::ZERO,
            randomize_order: false,
        }
    }
}

impl SuiteConfig {
    pub fn new(scenarios: Vec<ScenarioDescriptor>) -> Self {
        Self {
            scenarios,
            ..Default::default()
        }
    }

    pub fn enabled_scenarios(&self) -> impl Iterator<Item = &ScenarioDescriptor> {
        self.scenarios.iter().filter(|s| s.enabled)
    }

    /// Enable exactly the named scenarios.
    pub fn filter_scenarios<S: AsRef<str>>(&mut self, names: &[S]) {
        let names: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        for scenario in &mut self.scenarios {
            scenario.enabled = names.contains(scenario.name.as_str());
        }
    }

    /// Keep only the named variants, preserving configured order.
    pub fn filter_variants<S: AsRef<str>>(&mut self, names: &[S]) {
        let names: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        self.variants.retain(|v| names.contains(v.as_str()));
    }
}
