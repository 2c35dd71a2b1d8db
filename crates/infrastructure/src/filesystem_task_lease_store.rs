//! Shared-filesystem lease store.
//!
//! Creation writes a private scratch file and hard-links it onto the lease
//! path. Link creation fails when the path exists, which keeps
//! create-if-absent atomic on network file systems where exclusive open is
//! not reliable.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenure_application::TaskLeaseStore;
use tenure_core::{AppError, AppResult};
use tenure_domain::{LeaseRecord, LeaseResourceKey};
use tracing::warn;

const UNREADABLE_HOLDER: &str = "<unreadable>";

/// Filesystem implementation of task lease storage.
#[derive(Debug, Clone)]
pub struct FilesystemTaskLeaseStore {
    path_prefix: PathBuf,
}

impl FilesystemTaskLeaseStore {
    /// Creates a store placing leases at `{path_prefix}.{resource_key}`.
    #[must_use]
    pub fn new(path_prefix: impl Into<PathBuf>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
        }
    }

    /// Returns the lease file path for one resource key.
    #[must_use]
    pub fn lease_path(&self, key: &LeaseResourceKey) -> PathBuf {
        let mut name = OsString::from(self.path_prefix.as_os_str());
        name.push(format!(".{key}"));
        PathBuf::from(name)
    }

    async fn write_scratch(
        &self,
        key: &LeaseResourceKey,
        record: &LeaseRecord,
    ) -> AppResult<PathBuf> {
        let mut name = OsString::from(self.lease_path(key).as_os_str());
        name.push(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let scratch = PathBuf::from(name);

        let payload = serde_json::to_vec(record).map_err(|error| {
            AppError::Internal(format!("failed to encode lease record: {error}"))
        })?;
        tokio::fs::write(&scratch, payload).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to write lease scratch file '{}': {error}",
                scratch.display()
            ))
        })?;

        Ok(scratch)
    }

    async fn discard_scratch(scratch: &Path) {
        if let Err(error) = tokio::fs::remove_file(scratch).await
            && error.kind() != ErrorKind::NotFound
        {
            warn!(
                path = %scratch.display(),
                error = %error,
                "failed to remove lease scratch file"
            );
        }
    }

    async fn remove_path(path: &Path) -> AppResult<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(AppError::Internal(format!(
                "failed to remove lease file '{}': {error}",
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl TaskLeaseStore for FilesystemTaskLeaseStore {
    async fn try_create(&self, key: &LeaseResourceKey, record: &LeaseRecord) -> AppResult<bool> {
        let path = self.lease_path(key);
        let scratch = self.write_scratch(key, record).await?;
        let linked = tokio::fs::hard_link(&scratch, &path).await;
        Self::discard_scratch(&scratch).await;

        match linked {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(error) => Err(AppError::Internal(format!(
                "failed to create lease file '{}': {error}",
                path.display()
            ))),
        }
    }

    async fn read(&self, key: &LeaseResourceKey) -> AppResult<Option<LeaseRecord>> {
        let path = self.lease_path(key);
        let payload = match tokio::fs::read(&path).await {
            Ok(payload) => payload,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(AppError::Internal(format!(
                    "failed to read lease file '{}': {error}",
                    path.display()
                )));
            }
        };

        match serde_json::from_slice::<LeaseRecord>(&payload) {
            Ok(record) => Ok(Some(record)),
            Err(error) => {
                // Unparseable claims age out from their modification time.
                warn!(path = %path.display(), error = %error, "unreadable lease file");
                let modified_at = tokio::fs::metadata(&path)
                    .await
                    .and_then(|metadata| metadata.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                Ok(Some(LeaseRecord::new(UNREADABLE_HOLDER, modified_at)))
            }
        }
    }

    async fn touch(
        &self,
        key: &LeaseResourceKey,
        holder_id: &str,
        renewed_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let held = self
            .read(key)
            .await?
            .is_some_and(|record| record.is_held_by(holder_id));
        if !held {
            return Ok(false);
        }

        let path = self.lease_path(key);
        let scratch = self
            .write_scratch(key, &LeaseRecord::new(holder_id, renewed_at))
            .await?;
        if let Err(error) = tokio::fs::rename(&scratch, &path).await {
            Self::discard_scratch(&scratch).await;
            return Err(AppError::Internal(format!(
                "failed to renew lease file '{}': {error}",
                path.display()
            )));
        }

        Ok(true)
    }

    async fn remove(&self, key: &LeaseResourceKey) -> AppResult<()> {
        Self::remove_path(&self.lease_path(key)).await?;
        Ok(())
    }

    async fn remove_if_holder(&self, key: &LeaseResourceKey, holder_id: &str) -> AppResult<bool> {
        let held = self
            .read(key)
            .await?
            .is_some_and(|record| record.is_held_by(holder_id));
        if !held {
            return Ok(false);
        }

        Self::remove_path(&self.lease_path(key)).await
    }
}
