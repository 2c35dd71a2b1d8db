use std::path::PathBuf;

use async_trait::async_trait;
use tenure_application::TaskCatalogSource;
use tenure_core::{AppError, AppResult};
use tenure_domain::TaskCatalog;

/// Catalog discovery from a JSON file on shared storage.
pub struct FileTaskCatalogSource {
    path: PathBuf,
}

impl FileTaskCatalogSource {
    /// Creates a source that re-reads `path` on every discovery.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TaskCatalogSource for FileTaskCatalogSource {
    async fn discover(&self) -> AppResult<TaskCatalog> {
        let payload = tokio::fs::read(&self.path).await.map_err(|error| {
            AppError::NotFound(format!(
                "task catalog '{}' is not readable: {error}",
                self.path.display()
            ))
        })?;

        serde_json::from_slice(&payload).map_err(|error| {
            AppError::Validation(format!(
                "task catalog '{}' is not valid: {error}",
                self.path.display()
            ))
        })
    }
}
