use std::time::Duration;

use tenure_core::{AppError, AppResult};

use crate::lease_coordinator::AbdicationPolicy;

const MAX_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const MAX_EXPIRATION_TOLERANCE: Duration = Duration::from_secs(24 * 60 * 60);
const MAX_WORKER_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);
const HEARTBEATS_PER_TOLERANCE: u32 = 3;

/// Explicit configuration handed to one worker lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Bounded wait for winning the lease on an unlocked tick.
    pub acquire_timeout: Duration,
    /// Heartbeat silence after which a foreign claim is considered crashed.
    pub expiration_tolerance: Duration,
    /// Upper bound of the randomized worker lifetime.
    pub max_ttl: Duration,
    /// Pause between polling ticks.
    pub poll_interval: Duration,
    /// Reaction to a live foreign holder.
    pub abdication_policy: AbdicationPolicy,
    /// Destination for produced output.
    pub destination: String,
    /// Whether produced content must be encrypted.
    pub encrypt: bool,
    /// Staleness tolerance for downstream consumption.
    pub not_modified_tolerance: Duration,
}

impl WorkerSettings {
    /// Checks every bound is usable.
    pub fn validate(&self) -> AppResult<()> {
        check_range("acquire_timeout", self.acquire_timeout, MAX_ACQUIRE_TIMEOUT)?;
        check_range(
            "expiration_tolerance",
            self.expiration_tolerance,
            MAX_EXPIRATION_TOLERANCE,
        )?;
        check_range("poll_interval", self.poll_interval, MAX_POLL_INTERVAL)?;

        if self.max_ttl.as_secs() == 0 {
            return Err(AppError::Validation(
                "max_ttl must be at least one second".to_owned(),
            ));
        }

        if self.max_ttl > MAX_WORKER_TTL {
            return Err(AppError::Validation(format!(
                "max_ttl must not exceed {}s",
                MAX_WORKER_TTL.as_secs()
            )));
        }

        if self.destination.trim().is_empty() {
            return Err(AppError::Validation(
                "destination must not be empty".to_owned(),
            ));
        }

        Ok(())
    }

    /// Pause between lease renewals while a task runs.
    ///
    /// A fraction of the expiration tolerance, so a holder stuck in a long
    /// task never looks crashed to the rest of the fleet.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        (self.expiration_tolerance / HEARTBEATS_PER_TOLERANCE).max(Duration::from_millis(1))
    }
}

fn check_range(name: &str, value: Duration, max: Duration) -> AppResult<()> {
    if value.is_zero() {
        return Err(AppError::Validation(format!("{name} must be greater than zero")));
    }

    if value > max {
        return Err(AppError::Validation(format!(
            "{name} must not exceed {}s",
            max.as_secs()
        )));
    }

    Ok(())
}

/// Draws a lifetime uniformly between one second and `max_ttl` (whole seconds, inclusive).
pub fn random_worker_ttl(max_ttl: Duration) -> AppResult<Duration> {
    let max_seconds = max_ttl.as_secs();
    if max_seconds == 0 {
        return Err(AppError::Validation(
            "max_ttl must be at least one second".to_owned(),
        ));
    }

    let mut bytes = [0_u8; 8];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to draw worker ttl: {error}")))?;

    Ok(Duration::from_secs(
        1 + u64::from_le_bytes(bytes) % max_seconds,
    ))
}
