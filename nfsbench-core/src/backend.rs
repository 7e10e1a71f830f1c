//! Storage backend capability set
//!
//! The engine is written once against these traits. Concrete engines (PostgreSQL, MySQL,
//! SQLite, ...) implement them outside of this workspace; `mock-backend` provides an in-memory
//! implementation. Implementors may use plain `async fn`.
use crate::config::StorageVariant;
use crate::data::BenchmarkRecord;
use crate::error::BackendError;
use std::collections::BTreeMap;
use std::future::Future;

/// Free-form backend statistics, e.g. `table_size_bytes` or `final_record_count`.
pub type BackendStats = BTreeMap<String, serde_json::Value>;

/// A single connection to a storage backend.
///
/// Connections are owned by exactly one worker and never shared, hence `&mut self`.
pub trait BackendAdapter: Send {
    fn create_benchmark_table(&mut self) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn clear_benchmark_table(&mut self) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn insert_batch(
        &mut self,
        records: &[BenchmarkRecord],
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn count_records(&mut self) -> impl Future<Output = Result<u64, BackendError>> + Send;

    fn stats(&mut self) -> impl Future<Output = Result<BackendStats, BackendError>> + Send;

    fn name(&self) -> &str;

    fn close(&mut self) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Opens backend connections for a storage variant.
pub trait BackendFactory: Send + Sync {
    type Backend: BackendAdapter + 'static;

    /// Database identifier reported in results, e.g. `postgresql`.
    fn database(&self) -> &str;

    fn connect(
        &self,
        variant: &StorageVariant,
    ) -> impl Future<Output = Result<Self::Backend, BackendError>> + Send;
}
