use chrono::{DateTime, TimeDelta, Utc};

/// Self-imposed lifetime of one worker process.
///
/// The death time is fixed once at startup and never moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerLifespan {
    started_at: DateTime<Utc>,
    death_time: DateTime<Utc>,
}

impl WorkerLifespan {
    /// Creates a lifespan that ends `ttl` after `started_at`.
    ///
    /// A death time past the representable range saturates at the latest
    /// representable instant.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self {
            started_at,
            death_time: started_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Returns when the worker started.
    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the absolute death time.
    #[must_use]
    pub fn death_time(&self) -> DateTime<Utc> {
        self.death_time
    }

    /// Returns whether the worker must stop at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.death_time
    }
}
