//! Agent tools for visagent.
//!
//! Two tools ship with the backend:
//! - `visa_knowledge_query` — RAG over the visa document store
//! - `track_visa_status` — application status lookup against the
//!   tracking service
//!
//! Tools hold their adapters by constructor injection and are dispatched
//! by name through the core ToolRegistry.

pub mod knowledge_query;
pub mod track_status;

pub use knowledge_query::VisaKnowledgeTool;
pub use track_status::{HttpStatusChecker, StatusChecker, TrackOutcome, TrackVisaStatusTool};

use std::sync::Arc;
use visagent_core::provider::Provider;
use visagent_core::retrieval::DocumentStore;
use visagent_core::tool::ToolRegistry;

/// Build the standard tool registry from the injected adapters.
pub fn default_registry(
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn Provider>,
    model: impl Into<String>,
    temperature: f32,
    top_k: usize,
    checker: Arc<dyn StatusChecker>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(VisaKnowledgeTool::new(
        store,
        provider,
        model,
        temperature,
        top_k,
    )));
    registry.register(Box::new(TrackVisaStatusTool::new(checker)));
    registry
}
