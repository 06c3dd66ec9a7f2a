use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::backend::{TaskBackend, TaskListing};
use crate::store::PredictionId;
use crate::tasks::record::TaskKind;

/// reqwest implementation of the backend contract. One shared client, no
/// retries; poll-time callers are expected to tolerate transient failures.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/api/v2/{kind}/{database}/{id}` — root of all per-kind task
    /// routes on the remote service.
    fn api_endpoint(&self, prediction: &PredictionId, kind: TaskKind) -> String {
        format!(
            "{}/api/v2/{}/{}/{}",
            self.base_url,
            kind.tag(),
            prediction.database,
            prediction.id
        )
    }

    pub fn result_url(&self, prediction: &PredictionId, kind: TaskKind, hash: &str) -> String {
        format!(
            "{}/{}/public/result.json",
            self.api_endpoint(prediction, kind),
            hash
        )
    }

    /// Diagnostic log location of a failed task, derived by URL substitution
    /// from the result URL. Fetched on demand by the UI, never automatically.
    pub fn log_url(&self, prediction: &PredictionId, kind: TaskKind, hash: &str) -> String {
        self.result_url(prediction, kind, hash)
            .replace("result.json", "log")
    }
}

#[async_trait]
impl TaskBackend for HttpBackend {
    async fn post_task(
        &self,
        prediction: &PredictionId,
        kind: TaskKind,
        body: Value,
    ) -> Result<Value> {
        let url = format!("{}/post", self.api_endpoint(prediction, kind));
        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Task submission to {} failed: {}", url, status));
        }
        Ok(response.json().await?)
    }

    async fn list_tasks(&self, prediction: &PredictionId, kind: TaskKind) -> Result<TaskListing> {
        let url = format!("{}/tasks", self.api_endpoint(prediction, kind));
        let response = self
            .client
            .get(&url)
            // Listings must reflect the current queue, not a cached copy.
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn fetch_result(
        &self,
        prediction: &PredictionId,
        kind: TaskKind,
        hash: &str,
    ) -> Result<Value> {
        let url = self.result_url(prediction, kind, hash);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}
