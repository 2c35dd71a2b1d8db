//! Redis-backed lease store shared by a worker fleet.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script};
use tenure_application::TaskLeaseStore;
use tenure_core::{AppError, AppResult};
use tenure_domain::{LeaseRecord, LeaseResourceKey};
use tracing::warn;

const TOUCH_LEASE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return 0
end
local ok, record = pcall(cjson.decode, current)
if ok and record['holder_id'] == ARGV[1] then
  redis.call('SET', KEYS[1], ARGV[2])
  return 1
end
return 0
"#;

const RELEASE_LEASE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return 0
end
local ok, record = pcall(cjson.decode, current)
if ok and record['holder_id'] == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

const UNREADABLE_HOLDER: &str = "<unreadable>";

/// Redis implementation of task lease storage.
#[derive(Clone)]
pub struct RedisTaskLeaseStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisTaskLeaseStore {
    /// Creates one store adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &LeaseResourceKey) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

fn encode_record(record: &LeaseRecord) -> AppResult<String> {
    serde_json::to_string(record)
        .map_err(|error| AppError::Internal(format!("failed to encode lease record: {error}")))
}

#[async_trait]
impl TaskLeaseStore for RedisTaskLeaseStore {
    async fn try_create(&self, key: &LeaseResourceKey, record: &LeaseRecord) -> AppResult<bool> {
        let payload = encode_record(record)?;
        let mut connection = self.connection().await?;

        connection
            .set_nx(self.key_for(key), payload)
            .await
            .map_err(|error| AppError::Internal(format!("failed to create task lease: {error}")))
    }

    async fn read(&self, key: &LeaseResourceKey) -> AppResult<Option<LeaseRecord>> {
        let mut connection = self.connection().await?;
        let payload: Option<String> = connection
            .get(self.key_for(key))
            .await
            .map_err(|error| AppError::Internal(format!("failed to read task lease: {error}")))?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        match serde_json::from_str::<LeaseRecord>(payload.as_str()) {
            Ok(record) => Ok(Some(record)),
            Err(error) => {
                // Without a readable heartbeat the claim is immediately stale.
                warn!(resource_key = %key, error = %error, "unreadable task lease");
                Ok(Some(LeaseRecord::new(
                    UNREADABLE_HOLDER,
                    DateTime::<Utc>::UNIX_EPOCH,
                )))
            }
        }
    }

    async fn touch(
        &self,
        key: &LeaseResourceKey,
        holder_id: &str,
        renewed_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let payload = encode_record(&LeaseRecord::new(holder_id, renewed_at))?;
        let mut connection = self.connection().await?;

        let renewed = Script::new(TOUCH_LEASE_SCRIPT)
            .key(self.key_for(key))
            .arg(holder_id)
            .arg(payload)
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to renew task lease: {error}")))?;

        Ok(renewed > 0)
    }

    async fn remove(&self, key: &LeaseResourceKey) -> AppResult<()> {
        let mut connection = self.connection().await?;

        connection
            .del::<_, ()>(self.key_for(key))
            .await
            .map_err(|error| AppError::Internal(format!("failed to break task lease: {error}")))
    }

    async fn remove_if_holder(&self, key: &LeaseResourceKey, holder_id: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let removed = Script::new(RELEASE_LEASE_SCRIPT)
            .key(self.key_for(key))
            .arg(holder_id)
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release task lease: {error}"))
            })?;

        Ok(removed > 0)
    }
}
