//! Per-tick lease decision logic.

use std::time::Duration;

use tenure_core::{AppError, AppResult};
use tenure_domain::LockState;
use tracing::{debug, warn};

use crate::lease::Lease;

/// What a worker does when a live foreign holder owns its lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbdicationPolicy {
    /// Shut the whole process down and let a supervisor respawn it.
    #[default]
    TerminateProcess,
    /// Skip the tick and keep polling.
    SkipTick,
}

impl AbdicationPolicy {
    /// Returns stable configuration value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TerminateProcess => "terminate",
            Self::SkipTick => "skip",
        }
    }

    /// Parses configuration value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "terminate" => Ok(Self::TerminateProcess),
            "skip" => Ok(Self::SkipTick),
            _ => Err(AppError::Validation(format!(
                "unknown abdication policy '{value}'"
            ))),
        }
    }
}

/// Why a tick ended without execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A live foreign holder owns the lease and the policy is to keep polling.
    HeldByOther,
    /// A stale foreign claim was broken; acquisition waits for the next tick.
    BrokeStaleClaim,
    /// Acquisition did not win within its timeout.
    AcquireTimedOut,
}

/// Outcome of one coordinator evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// This worker holds a fresh claim and must run the task now.
    Execute,
    /// Nothing runs this tick.
    Skip(SkipReason),
    /// A live foreign holder owns the lease; the process must shut down.
    Abdicate,
}

/// Decides each tick whether this worker runs, waits, reclaims or abdicates.
#[derive(Debug, Clone)]
pub struct LeaseCoordinator {
    acquire_timeout: Duration,
    expiration_tolerance: Duration,
    abdication_policy: AbdicationPolicy,
}

impl LeaseCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        acquire_timeout: Duration,
        expiration_tolerance: Duration,
        abdication_policy: AbdicationPolicy,
    ) -> Self {
        Self {
            acquire_timeout,
            expiration_tolerance,
            abdication_policy,
        }
    }

    /// Evaluates the lease once and returns this tick's decision.
    pub async fn evaluate(&self, lease: &Lease) -> AppResult<TickDecision> {
        let state = lease.state(self.expiration_tolerance).await?;

        match state {
            LockState::LockedByOtherLive => {
                warn!(
                    resource_key = %lease.resource_key(),
                    policy = self.abdication_policy.as_str(),
                    "someone else holds the lease"
                );
                Ok(match self.abdication_policy {
                    AbdicationPolicy::TerminateProcess => TickDecision::Abdicate,
                    AbdicationPolicy::SkipTick => TickDecision::Skip(SkipReason::HeldByOther),
                })
            }
            LockState::LockedByOtherExpired => {
                warn!(
                    resource_key = %lease.resource_key(),
                    tolerance_seconds = self.expiration_tolerance.as_secs(),
                    "lease expired, breaking it"
                );
                lease.break_claim().await?;
                Ok(TickDecision::Skip(SkipReason::BrokeStaleClaim))
            }
            LockState::Unlocked => match lease.acquire(self.acquire_timeout).await {
                Ok(()) => Ok(TickDecision::Execute),
                Err(error) if error.is_timeout() => {
                    debug!(
                        resource_key = %lease.resource_key(),
                        error = %error,
                        "unable to acquire lease"
                    );
                    Ok(TickDecision::Skip(SkipReason::AcquireTimedOut))
                }
                Err(error) => Err(error),
            },
            LockState::LockedBySelf => {
                lease.renew().await?;
                Ok(TickDecision::Execute)
            }
        }
    }
}
