use async_trait::async_trait;
use serde::Serialize;
use tenure_core::AppResult;
use tenure_domain::ResolvedTasks;

/// Unit of work handed to the executor on a granted tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskWorkOrder {
    /// Task key the lease was granted for.
    pub task_key: String,
    /// Lease holder performing the work.
    pub holder_id: String,
    /// Resolved task descriptors keyed by primitive task key.
    pub tasks: ResolvedTasks,
    /// Destination for produced output.
    pub destination: String,
    /// Whether produced content must be encrypted.
    pub encrypt: bool,
    /// Staleness tolerance for downstream consumption.
    pub not_modified_tolerance_seconds: u64,
}

/// Port that performs the actual work once exclusivity is granted.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Runs one unit of work to completion.
    async fn execute(&self, order: TaskWorkOrder) -> AppResult<()>;
}
