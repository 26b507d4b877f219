//! DocumentStore trait — the abstraction over the passage retrieval backend.
//!
//! The store is a black-box nearest-neighbor search service: given a query
//! string it returns the k most relevant text passages with source
//! metadata. No ranking guarantees beyond "nearest by the store's own
//! metric".
//!
//! Implementations: HTTP retrieval service, in-memory keyword store.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A passage returned by the document store.
///
/// Ephemeral — produced per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// The passage text
    pub content: String,

    /// Source label (file name, document id, ...)
    pub source: String,

    /// Relevance score. Placeholder 0.0 when the backend supplies none.
    #[serde(default)]
    pub score: f32,
}

/// The core DocumentStore trait.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The backend name (e.g., "http", "in_memory").
    fn name(&self) -> &str;

    /// Return the top-k passages most relevant to `query`, in the store's
    /// own relevance order.
    async fn query(
        &self,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<RetrievedPassage>, StoreError>;

    /// Health check — can we reach the store?
    async fn health_check(&self) -> std::result::Result<bool, StoreError> {
        Ok(true)
    }
}
