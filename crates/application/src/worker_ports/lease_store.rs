use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenure_core::AppResult;
use tenure_domain::{LeaseRecord, LeaseResourceKey};

/// Shared storage port backing task leases.
///
/// Any store that offers atomic create-if-absent, readable ownership metadata
/// and forced removal can implement this port.
#[async_trait]
pub trait TaskLeaseStore: Send + Sync {
    /// Atomically creates the resource when absent.
    ///
    /// Returns `false` when the resource already exists.
    async fn try_create(&self, key: &LeaseResourceKey, record: &LeaseRecord) -> AppResult<bool>;

    /// Reads the current record, if any.
    async fn read(&self, key: &LeaseResourceKey) -> AppResult<Option<LeaseRecord>>;

    /// Rewrites the renewal timestamp and returns false when `holder_id` no longer owns it.
    async fn touch(
        &self,
        key: &LeaseResourceKey,
        holder_id: &str,
        renewed_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Removes the resource regardless of holder. Missing resources are not an error.
    async fn remove(&self, key: &LeaseResourceKey) -> AppResult<()>;

    /// Removes the resource only when `holder_id` owns it and returns whether it did.
    async fn remove_if_holder(&self, key: &LeaseResourceKey, holder_id: &str) -> AppResult<bool>;
}
