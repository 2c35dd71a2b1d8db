use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Ownership metadata stored in the shared lease resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    /// Identity of the claiming process.
    pub holder_id: String,
    /// Last heartbeat written by the holder.
    pub last_renewed_at: DateTime<Utc>,
}

impl LeaseRecord {
    /// Creates a record stamped at `now`.
    #[must_use]
    pub fn new(holder_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            holder_id: holder_id.into(),
            last_renewed_at: now,
        }
    }

    /// Returns whether `holder_id` owns this record.
    #[must_use]
    pub fn is_held_by(&self, holder_id: &str) -> bool {
        self.holder_id == holder_id
    }

    /// Returns whether the holder missed its heartbeat for longer than `tolerance`.
    ///
    /// A timestamp in the future (clock skew) is never stale.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, tolerance: TimeDelta) -> bool {
        now.signed_duration_since(self.last_renewed_at) > tolerance
    }
}

/// Lease state as seen by one contender at one instant.
///
/// Derived fresh on every polling tick and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No claim exists.
    Unlocked,
    /// This process holds the claim.
    LockedBySelf,
    /// Another process holds the claim and keeps renewing it.
    LockedByOtherLive,
    /// Another process holds the claim but stopped renewing it.
    LockedByOtherExpired,
}

impl LockState {
    /// Classifies a stored record from the point of view of `holder_id`.
    #[must_use]
    pub fn observe(
        record: Option<&LeaseRecord>,
        holder_id: &str,
        now: DateTime<Utc>,
        tolerance: TimeDelta,
    ) -> Self {
        match record {
            None => Self::Unlocked,
            Some(record) if record.is_held_by(holder_id) => Self::LockedBySelf,
            Some(record) if record.is_stale(now, tolerance) => Self::LockedByOtherExpired,
            Some(_) => Self::LockedByOtherLive,
        }
    }

    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unlocked => "unlocked",
            Self::LockedBySelf => "locked_by_self",
            Self::LockedByOtherLive => "locked_by_other_live",
            Self::LockedByOtherExpired => "locked_by_other_expired",
        }
    }
}

/// Builds a process-unique lease holder identity from a readable worker id.
#[must_use]
pub fn new_holder_id(worker_id: &str) -> String {
    format!("{worker_id}:{}", uuid::Uuid::new_v4())
}
