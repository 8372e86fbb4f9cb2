pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::FlagRecord;

pub use memory::MemoryStore;

/// Durable storage for flag records. Implementations must be thread-safe.
///
/// Records are unique by `name` only: an upsert for a known name replaces
/// that record, including its environment.
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Insert or overwrite the record for `record.name`. Must be durably
    /// committed before returning `Ok`.
    async fn upsert(&self, record: &FlagRecord) -> Result<(), StoreError>;

    /// Look up a record matching both `name` and `environment`.
    async fn get(&self, name: &str, environment: &str) -> Result<Option<FlagRecord>, StoreError>;

    /// All stored records, no ordering guarantee.
    async fn list(&self) -> Result<Vec<FlagRecord>, StoreError>;
}
