use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenure_application::TaskLeaseStore;
use tenure_core::AppResult;
use tenure_domain::{LeaseRecord, LeaseResourceKey};
use tokio::sync::RwLock;

/// In-memory lease store for single-process runs.
///
/// Claims live only as long as the process, so it coordinates workers that
/// share one runtime and nothing else.
#[derive(Default)]
pub struct InMemoryTaskLeaseStore {
    records: RwLock<HashMap<String, LeaseRecord>>,
}

impl InMemoryTaskLeaseStore {
    /// Creates an empty in-memory lease store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskLeaseStore for InMemoryTaskLeaseStore {
    async fn try_create(&self, key: &LeaseResourceKey, record: &LeaseRecord) -> AppResult<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(key.as_str()) {
            return Ok(false);
        }

        records.insert(key.as_str().to_owned(), record.clone());
        Ok(true)
    }

    async fn read(&self, key: &LeaseResourceKey) -> AppResult<Option<LeaseRecord>> {
        Ok(self.records.read().await.get(key.as_str()).cloned())
    }

    async fn touch(
        &self,
        key: &LeaseResourceKey,
        holder_id: &str,
        renewed_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(key.as_str()) {
            Some(record) if record.is_held_by(holder_id) => {
                record.last_renewed_at = renewed_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove(&self, key: &LeaseResourceKey) -> AppResult<()> {
        self.records.write().await.remove(key.as_str());
        Ok(())
    }

    async fn remove_if_holder(&self, key: &LeaseResourceKey, holder_id: &str) -> AppResult<bool> {
        let mut records = self.records.write().await;
        if records
            .get(key.as_str())
            .is_some_and(|record| record.is_held_by(holder_id))
        {
            records.remove(key.as_str());
            return Ok(true);
        }

        Ok(false)
    }
}
