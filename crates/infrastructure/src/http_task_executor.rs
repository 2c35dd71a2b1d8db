use std::time::Duration;

use async_trait::async_trait;
use tenure_application::{TaskExecutor, TaskWorkOrder};
use tenure_core::{AppError, AppResult};
use tracing::debug;

/// Executor that hands each work order to an HTTP endpoint.
pub struct HttpTaskExecutor {
    http_client: reqwest::Client,
    endpoint: String,
    max_attempts: u8,
    retry_backoff_ms: u64,
}

impl HttpTaskExecutor {
    /// Creates a new HTTP task executor.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        max_attempts: u8,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            max_attempts: max_attempts.max(1),
            retry_backoff_ms: retry_backoff_ms.max(50),
        }
    }
}

#[async_trait]
impl TaskExecutor for HttpTaskExecutor {
    async fn execute(&self, order: TaskWorkOrder) -> AppResult<()> {
        let mut attempt = 0_u8;
        let mut last_error: Option<String> = None;

        while attempt < self.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .http_client
                .post(self.endpoint.as_str())
                .header("X-Tenure-Task-Key", order.task_key.as_str())
                .header("X-Tenure-Holder-Id", order.holder_id.as_str())
                .json(&order)
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => {
                    debug!(
                        task_key = %order.task_key,
                        task_count = order.tasks.len(),
                        attempt,
                        "task executed"
                    );
                    return Ok(());
                }
                Ok(response)
                    if response.status().is_server_error()
                        || response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    last_error = Some(format!(
                        "transient HTTP status {} for task '{}'",
                        response.status(),
                        order.task_key
                    ));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
                    return Err(AppError::Validation(format!(
                        "task execution failed with status {status}: {body}"
                    )));
                }
                Err(error) => {
                    last_error = Some(format!("task execution transport error: {error}"));
                }
            }

            if attempt < self.max_attempts {
                let delay = self.retry_backoff_ms.saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(AppError::Internal(last_error.unwrap_or_else(|| {
            "task execution exhausted retries".to_owned()
        })))
    }
}
