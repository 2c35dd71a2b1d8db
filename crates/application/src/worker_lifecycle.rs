//! Polling loop owning the lease, the randomized lifetime and shutdown.

mod settings;


use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use tenure_core::{AppError, AppResult};
use tenure_domain::{TaskAssignment, WorkerLifespan};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::lease::Lease;
use crate::lease_coordinator::{LeaseCoordinator, TickDecision};
use crate::worker_ports::{TaskCatalogSource, TaskExecutor, TaskWorkOrder};

pub use settings::{WorkerSettings, random_worker_ttl};

/// Why the polling loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The randomized lifetime elapsed.
    TtlExpired,
    /// A termination signal arrived.
    Signalled,
    /// A live foreign holder owns the lease.
    Abdicated,
    /// The task disappeared from the catalog.
    TaskRetired,
}

impl ShutdownReason {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TtlExpired => "ttl_expired",
            Self::Signalled => "signalled",
            Self::Abdicated => "abdicated",
            Self::TaskRetired => "task_retired",
        }
    }
}

/// Final report of one worker lifecycle.
#[derive(Debug)]
pub struct WorkerExit {
    /// Why polling stopped.
    pub reason: ShutdownReason,
    /// Outcome of the shutdown release; `Ok(true)` when a held claim was removed.
    pub release: AppResult<bool>,
}

impl WorkerExit {
    /// Returns whether shutdown completed without losing track of the lease.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.release.is_ok()
    }
}

enum TickOutcome {
    Continue,
    Shutdown(ShutdownReason),
}

/// Worker process lifecycle: polls the coordinator until its lifetime ends.
pub struct WorkerLifecycle {
    assignment: TaskAssignment,
    settings: WorkerSettings,
    lease: Lease,
    coordinator: LeaseCoordinator,
    catalog_source: Arc<dyn TaskCatalogSource>,
    executor: Arc<dyn TaskExecutor>,
    lifespan: WorkerLifespan,
}

impl WorkerLifecycle {
    /// Validates settings and draws the randomized death time.
    pub fn new(
        assignment: TaskAssignment,
        settings: WorkerSettings,
        lease: Lease,
        catalog_source: Arc<dyn TaskCatalogSource>,
        executor: Arc<dyn TaskExecutor>,
    ) -> AppResult<Self> {
        settings.validate()?;

        let ttl = random_worker_ttl(settings.max_ttl)?;
        let ttl = TimeDelta::from_std(ttl)
            .map_err(|error| AppError::Validation(format!("invalid worker ttl: {error}")))?;
        let coordinator = LeaseCoordinator::new(
            settings.acquire_timeout,
            settings.expiration_tolerance,
            settings.abdication_policy,
        );

        Ok(Self {
            assignment,
            settings,
            lease,
            coordinator,
            catalog_source,
            executor,
            lifespan: WorkerLifespan::new(Utc::now(), ttl),
        })
    }

    /// Replaces the drawn lifespan.
    #[must_use]
    pub fn with_lifespan(mut self, lifespan: WorkerLifespan) -> Self {
        self.lifespan = lifespan;
        self
    }

    /// Returns the worker lifespan.
    #[must_use]
    pub fn lifespan(&self) -> WorkerLifespan {
        self.lifespan
    }

    /// Runs until the lifetime ends, a signal arrives or the worker abdicates.
    ///
    /// The lease is released exactly once after polling stops, whatever
    /// stopped it. `shutdown` flipping to `true` is observed at the next tick
    /// boundary and never interrupts a running task.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> WorkerExit {
        info!(
            task_key = %self.assignment.key(),
            composite = self.assignment.is_composite(),
            holder_id = %self.lease.holder_id(),
            resource_key = %self.lease.resource_key(),
            death_time = %self.lifespan.death_time(),
            "worker started"
        );

        let reason = self.poll(&mut shutdown).await;
        let release = self.lease.release().await;

        match &release {
            Ok(true) => info!(
                task_key = %self.assignment.key(),
                reason = reason.as_str(),
                "lease released"
            ),
            Ok(false) => debug!(
                task_key = %self.assignment.key(),
                reason = reason.as_str(),
                "no lease held at shutdown"
            ),
            Err(release_error) => error!(
                task_key = %self.assignment.key(),
                reason = reason.as_str(),
                error = %release_error,
                "failed to release lease"
            ),
        }

        WorkerExit { reason, release }
    }

    async fn poll(&self, shutdown: &mut watch::Receiver<bool>) -> ShutdownReason {
        loop {
            if *shutdown.borrow() {
                info!(task_key = %self.assignment.key(), "interrupted, releasing lease");
                return ShutdownReason::Signalled;
            }

            if self.lifespan.is_expired(Utc::now()) {
                info!(
                    task_key = %self.assignment.key(),
                    holder_id = %self.lease.holder_id(),
                    "worker should die now"
                );
                return ShutdownReason::TtlExpired;
            }

            match self.tick().await {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Shutdown(reason)) => return reason,
                Err(tick_error) if tick_error.is_timeout() => debug!(
                    task_key = %self.assignment.key(),
                    error = %tick_error,
                    "tick timed out"
                ),
                Err(tick_error) => warn!(
                    task_key = %self.assignment.key(),
                    error = %tick_error,
                    "an unknown error happened"
                ),
            }

            self.pause(shutdown).await;
        }
    }

    async fn pause(&self, shutdown: &mut watch::Receiver<bool>) {
        let interval = self.settings.poll_interval;
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    tokio::time::sleep(interval).await;
                }
            }
        }
    }

    async fn tick(&self) -> AppResult<TickOutcome> {
        match self.coordinator.evaluate(&self.lease).await? {
            TickDecision::Abdicate => Ok(TickOutcome::Shutdown(ShutdownReason::Abdicated)),
            TickDecision::Skip(_) => Ok(TickOutcome::Continue),
            TickDecision::Execute => self.run_task().await,
        }
    }

    async fn run_task(&self) -> AppResult<TickOutcome> {
        let catalog = self.catalog_source.discover().await?;
        let tasks = catalog.resolve(&self.assignment);

        if tasks.is_empty() {
            warn!(
                task_key = %self.assignment.key(),
                "task is not available anymore"
            );
            return Ok(TickOutcome::Shutdown(ShutdownReason::TaskRetired));
        }

        let order = TaskWorkOrder {
            task_key: self.assignment.key().as_str().to_owned(),
            holder_id: self.lease.holder_id().to_owned(),
            tasks,
            destination: self.settings.destination.clone(),
            encrypt: self.settings.encrypt,
            not_modified_tolerance_seconds: self.settings.not_modified_tolerance.as_secs(),
        };

        // Spawned so a panicking executor surfaces as a failed tick.
        let executor = self.executor.clone();
        let mut execution = tokio::spawn(async move { executor.execute(order).await });

        let period = self.settings.heartbeat_interval();
        let mut heartbeat = time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                joined = &mut execution => {
                    joined.map_err(|join_error| {
                        AppError::Internal(format!("task execution aborted: {join_error}"))
                    })??;
                    return Ok(TickOutcome::Continue);
                }
                _ = heartbeat.tick() => self.renew_during_execution(&execution).await?,
            }
        }
    }

    async fn renew_during_execution(
        &self,
        execution: &JoinHandle<AppResult<()>>,
    ) -> AppResult<()> {
        match self.lease.renew().await {
            Ok(()) => Ok(()),
            Err(AppError::Conflict(message)) => {
                execution.abort();
                warn!(
                    task_key = %self.assignment.key(),
                    holder_id = %self.lease.holder_id(),
                    "lease lost while the task was running, aborting it"
                );
                Err(AppError::Conflict(message))
            }
            Err(renew_error) => {
                warn!(
                    task_key = %self.assignment.key(),
                    error = %renew_error,
                    "failed to renew lease while the task was running"
                );
                Ok(())
            }
        }
    }
}
