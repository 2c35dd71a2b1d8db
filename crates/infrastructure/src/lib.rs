//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod file_task_catalog_source;
mod filesystem_task_lease_store;
mod http_task_catalog_source;
mod http_task_executor;
mod in_memory_task_lease_store;
mod redis_task_lease_store;

pub use file_task_catalog_source::FileTaskCatalogSource;
pub use filesystem_task_lease_store::FilesystemTaskLeaseStore;
pub use http_task_catalog_source::HttpTaskCatalogSource;
pub use http_task_executor::HttpTaskExecutor;
pub use in_memory_task_lease_store::InMemoryTaskLeaseStore;
pub use redis_task_lease_store::RedisTaskLeaseStore;
