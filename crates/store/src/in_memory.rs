//! In-memory backend — useful for testing and ephemeral deployments.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use visagent_core::error::StoreError;
use visagent_core::retrieval::{DocumentStore, RetrievedPassage};

/// A document store that keyword-searches a Vec of passages.
/// Useful for testing and deployments where no retrieval service runs.
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<Vec<(String, String)>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Build a store pre-loaded with (content, source) pairs.
    pub fn with_documents(documents: Vec<(String, String)>) -> Self {
        Self {
            documents: Arc::new(RwLock::new(documents)),
        }
    }

    pub async fn add(&self, content: impl Into<String>, source: impl Into<String>) {
        self.documents
            .write()
            .await
            .push((content.into(), source.into()));
    }

    pub async fn count(&self) -> usize {
        self.documents.read().await.len()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn query(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<RetrievedPassage>, StoreError> {
        let documents = self.documents.read().await;
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();

        let mut results: Vec<RetrievedPassage> = documents
            .iter()
            .filter_map(|(content, source)| {
                let content_lower = content.to_lowercase();
                // Simple keyword relevance score
                let occurrences: usize = terms
                    .iter()
                    .map(|t| content_lower.matches(t).count())
                    .sum();
                if occurrences == 0 {
                    return None;
                }
                let score = occurrences as f32 / (content.len() as f32 / 100.0).max(1.0);
                Some(RetrievedPassage {
                    content: content.clone(),
                    source: source.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }
}
