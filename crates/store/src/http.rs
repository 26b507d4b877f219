//! HTTP backend — queries an external retrieval service.
//!
//! The service exposes `POST {base}/query` taking `{"query": ..., "k": ...}`
//! and returning `{"passages": [{"content", "source", "score"?}]}`, plus
//! `GET {base}/health` for liveness.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use visagent_core::error::StoreError;
use visagent_core::retrieval::{DocumentStore, RetrievedPassage};

/// A document store backed by an HTTP retrieval service.
pub struct HttpDocumentStore {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    passages: Vec<RetrievedPassage>,
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn query(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<RetrievedPassage>, StoreError> {
        let url = format!("{}/query", self.base_url);
        debug!(%url, k, "Querying document store");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "query": query, "k": k }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StoreError::Timeout(e.to_string())
                } else {
                    StoreError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::QueryFailed(format!(
                "status {status}: {body}"
            )));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| StoreError::MalformedResponse(e.to_string()))?;

        Ok(parsed.passages)
    }

    async fn health_check(&self) -> std::result::Result<bool, StoreError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(e.to_string()))?;

        Ok(response.status().is_success())
    }
}
