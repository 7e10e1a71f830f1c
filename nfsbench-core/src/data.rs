use crate::error::ConfigError;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 .,!?-";
const MAX_NUMBER: i32 = 1_000_000;

/// Shape class of the synthetic records inserted by a scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSize {
    Small,
    Medium,
    Large,
}

impl RecordSize {
    /// Byte-length range of the record's text column.
    pub fn text_len_range(&self) -> std::ops::Range<usize> {
        match self {
            RecordSize::Small => 50..100,
            RecordSize::Medium => 200..400,
            RecordSize::Large => 500..1000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordSize::Small => "small",
            RecordSize::Medium => "medium",
            RecordSize::Large => "large",
        }
    }
}

impl fmt::Display for RecordSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordSize {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(RecordSize::Small),
            "medium" => Ok(RecordSize::Medium),
            "large" => Ok(RecordSize::Large),
            _ => Err(ConfigError::UnknownRecordSize(s.to_string())),
        }
    }
}

/// A single synthetic row: free text, an integer, and a JSON document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BenchmarkRecord {
    pub text: String,
    pub number: i32,
    pub json: String,
}

impl BenchmarkRecord {
    /// Approximate payload size in bytes, used by in-memory backends to report table size.
    pub fn payload_len(&self) -> usize {
        self.text.len() + std::mem::size_of::<i32>() + self.json.len()
    }
}

/// Generates batches of [`BenchmarkRecord`]s.
///
/// Each worker owns one; it is deliberately not `Sync`.
pub struct RecordGenerator {
    rng: SmallRng,
}

impl Default for RecordGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordGenerator {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn batch(&mut self, count: usize, size: RecordSize) -> Vec<BenchmarkRecord> {
        (0..count).map(|id| self.record(id, size)).collect()
    }

    pub fn record(&mut self, id: usize, size: RecordSize) -> BenchmarkRecord {
        let text_len = self.rng.gen_range(size.text_len_range());

        let payload = match size {
            RecordSize::Small => json!({
                "id": id,
                "type": "small",
            }),
            RecordSize::Medium => json!({
                "id": id,
                "type": "medium",
                "data": self.string(100),
                "timestamp": OffsetDateTime::now_utc().unix_timestamp(),
            }),
            RecordSize::Large => json!({
                "id": id,
                "type": "large",
                "data": self.string(200),
                "metadata": {
                    "created": OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
                    "version": "1.0",
                    "tags": ["benchmark", "test", "large"],
                },
                "content": self.string(300),
            }),
        };

        BenchmarkRecord {
            text: self.string(text_len),
            number: self.rng.gen_range(0..MAX_NUMBER),
            json: payload.to_string(),
        }
    }

    fn string(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| CHARSET[self.rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }
}

/// Render a byte count in binary units, e.g. `1.5 KB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }

    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }

    let suffix = b"KMGTPE"[exp] as char;
    format!("{:.1} {suffix}B", bytes as f64 / div as f64)
}
