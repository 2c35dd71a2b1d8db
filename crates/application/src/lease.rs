//! Handle over one shared task lease.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tenure_core::{AppError, AppResult};
use tenure_domain::{LeaseRecord, LeaseResourceKey, LockState};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::worker_ports::TaskLeaseStore;

const DEFAULT_ACQUIRE_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// One process's handle over the shared lease of its task key.
///
/// The handle is owned by exactly one worker; the resource behind it is
/// contended by the whole fleet.
pub struct Lease {
    store: Arc<dyn TaskLeaseStore>,
    resource_key: LeaseResourceKey,
    holder_id: String,
    retry_interval: Duration,
}

impl Lease {
    /// Creates a lease handle identified by `holder_id`.
    #[must_use]
    pub fn new(
        store: Arc<dyn TaskLeaseStore>,
        resource_key: LeaseResourceKey,
        holder_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resource_key,
            holder_id: holder_id.into(),
            retry_interval: DEFAULT_ACQUIRE_RETRY_INTERVAL,
        }
    }

    /// Overrides the pause between acquisition attempts.
    #[must_use]
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval.max(Duration::from_millis(1));
        self
    }

    /// Returns this process's holder identity.
    #[must_use]
    pub fn holder_id(&self) -> &str {
        self.holder_id.as_str()
    }

    /// Returns the shared resource key.
    #[must_use]
    pub fn resource_key(&self) -> &LeaseResourceKey {
        &self.resource_key
    }

    /// Derives the current lock state from a fresh read of the resource.
    pub async fn state(&self, expiration_tolerance: Duration) -> AppResult<LockState> {
        let record = self.store.read(&self.resource_key).await?;
        Ok(LockState::observe(
            record.as_ref(),
            self.holder_id.as_str(),
            Utc::now(),
            tolerance_delta(expiration_tolerance),
        ))
    }

    /// Returns whether any process currently claims the resource.
    pub async fn is_claimed(&self) -> AppResult<bool> {
        Ok(self.store.read(&self.resource_key).await?.is_some())
    }

    /// Returns whether this process is the recorded holder.
    pub async fn i_am_holder(&self) -> AppResult<bool> {
        Ok(self
            .store
            .read(&self.resource_key)
            .await?
            .is_some_and(|record| record.is_held_by(self.holder_id.as_str())))
    }

    /// Returns whether the current claim missed its heartbeat for longer than `tolerance`.
    pub async fn is_stale(&self, tolerance: Duration) -> AppResult<bool> {
        Ok(self
            .store
            .read(&self.resource_key)
            .await?
            .is_some_and(|record| record.is_stale(Utc::now(), tolerance_delta(tolerance))))
    }

    /// Claims the resource, retrying until `timeout` elapses.
    ///
    /// Returns `AppError::Timeout` when another process keeps the resource.
    pub async fn acquire(&self, timeout: Duration) -> AppResult<()> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Err(AppError::Validation(format!(
                "acquire timeout of {}s is out of range",
                timeout.as_secs()
            )));
        };

        loop {
            let record = LeaseRecord::new(self.holder_id.as_str(), Utc::now());
            if self.store.try_create(&self.resource_key, &record).await? {
                debug!(
                    resource_key = %self.resource_key,
                    holder_id = %self.holder_id,
                    "lease acquired"
                );
                return Ok(());
            }

            if self.i_am_holder().await? {
                return Ok(());
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AppError::Timeout(format!(
                    "lease '{}' was not acquired within {}ms",
                    self.resource_key,
                    timeout.as_millis()
                )));
            }

            tokio::time::sleep(self.retry_interval.min(deadline - now)).await;
        }
    }

    /// Writes a fresh heartbeat; fails with `AppError::Conflict` when the claim was lost.
    pub async fn renew(&self) -> AppResult<()> {
        let renewed = self
            .store
            .touch(&self.resource_key, self.holder_id.as_str(), Utc::now())
            .await?;

        if !renewed {
            return Err(AppError::Conflict(format!(
                "lease '{}' is no longer held by '{}'",
                self.resource_key, self.holder_id
            )));
        }

        Ok(())
    }

    /// Forcibly removes the resource whoever holds it.
    pub async fn break_claim(&self) -> AppResult<()> {
        warn!(
            resource_key = %self.resource_key,
            holder_id = %self.holder_id,
            "breaking lease claim"
        );
        self.store.remove(&self.resource_key).await
    }

    /// Removes the resource if this process holds it.
    ///
    /// Returns whether a claim was removed; releasing twice is a no-op.
    pub async fn release(&self) -> AppResult<bool> {
        self.store
            .remove_if_holder(&self.resource_key, self.holder_id.as_str())
            .await
    }
}

fn tolerance_delta(tolerance: Duration) -> TimeDelta {
    TimeDelta::from_std(tolerance).unwrap_or(TimeDelta::MAX)
}
