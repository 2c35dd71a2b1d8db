use async_trait::async_trait;
use tenure_application::TaskCatalogSource;
use tenure_core::{AppError, AppResult};
use tenure_domain::TaskCatalog;

/// Catalog discovery over an HTTP JSON endpoint.
pub struct HttpTaskCatalogSource {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpTaskCatalogSource {
    /// Creates a source that polls `endpoint` on every discovery.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TaskCatalogSource for HttpTaskCatalogSource {
    async fn discover(&self) -> AppResult<TaskCatalog> {
        let response = self
            .http_client
            .get(self.endpoint.as_str())
            .send()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to call task catalog endpoint: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_owned());
            return Err(AppError::Internal(format!(
                "task catalog endpoint returned status {}: {body}",
                status.as_u16()
            )));
        }

        response.json::<TaskCatalog>().await.map_err(|error| {
            AppError::Internal(format!("failed to parse task catalog response body: {error}"))
        })
    }
}
