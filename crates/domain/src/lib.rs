//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod catalog;
mod lease;
mod lifespan;
mod task;

pub use catalog::{
    COMBINE_ACTION_TYPE, CatalogAction, CombinationRule, ResolvedTasks, TaskCatalog,
};
pub use lease::{LeaseRecord, LockState, new_holder_id};
pub use lifespan::WorkerLifespan;
pub use task::{LeaseResourceKey, TaskAssignment, TaskKey};
