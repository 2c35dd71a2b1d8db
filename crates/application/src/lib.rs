//! Application services and ports.

#![forbid(unsafe_code)]

mod lease;
mod lease_coordinator;
mod worker_lifecycle;
mod worker_ports;

#[cfg(test)]
mod test_fakes;

pub use lease::Lease;
pub use lease_coordinator::{AbdicationPolicy, LeaseCoordinator, SkipReason, TickDecision};
pub use worker_lifecycle::{
    ShutdownReason, WorkerExit, WorkerLifecycle, WorkerSettings, random_worker_ttl,
};
pub use worker_ports::{TaskCatalogSource, TaskExecutor, TaskLeaseStore, TaskWorkOrder};
