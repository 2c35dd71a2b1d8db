mod catalog;
mod executor;
mod lease_store;

pub use catalog::TaskCatalogSource;
pub use executor::{TaskExecutor, TaskWorkOrder};
pub use lease_store::TaskLeaseStore;
