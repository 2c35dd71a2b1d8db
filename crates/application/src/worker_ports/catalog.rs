use async_trait::async_trait;
use tenure_core::AppResult;
use tenure_domain::TaskCatalog;

/// Discovery port returning the current task catalog and combination rules.
#[async_trait]
pub trait TaskCatalogSource: Send + Sync {
    /// Fetches a fresh catalog snapshot.
    async fn discover(&self) -> AppResult<TaskCatalog>;
}
