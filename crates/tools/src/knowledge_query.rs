//! Knowledge base query tool — RAG over the visa document store.
//!
//! Retrieves the top-k passages for the question, joins them into a
//! context block, and runs a single-turn generation conditioned on that
//! context. The nested generation declares no tools, so it cannot recurse.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use visagent_core::error::ToolError;
use visagent_core::message::Message;
use visagent_core::provider::{Provider, ProviderRequest};
use visagent_core::retrieval::DocumentStore;
use visagent_core::tool::{Tool, ToolResult};

/// Fixed reply when retrieval or generation fails. Fed back to the
/// model as tool output so the request still completes.
const APOLOGY: &str =
    "Sorry, I couldn't look that up in the visa knowledge base right now. Please try again later.";

const ANSWER_SYSTEM_PROMPT: &str =
    "You are a visa information assistant. Answer concisely using only the given context.";

/// Answers general visa questions from the document store.
pub struct VisaKnowledgeTool {
    store: Arc<dyn DocumentStore>,
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    top_k: usize,
}

impl VisaKnowledgeTool {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            provider,
            model: model.into(),
            temperature,
            top_k: top_k.max(1),
        }
    }
}

#[async_trait]
impl Tool for VisaKnowledgeTool {
    fn name(&self) -> &str {
        "visa_knowledge_query"
    }

    fn description(&self) -> &str {
        "Answer a general visa question (requirements, fees, documents, processing times) \
         using the visa knowledge base. Use this for any visa question that is not a \
         request to track an existing application."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The user's visa question, in their own words"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError> {
        let question = arguments["question"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'question' argument".into()))?;

        debug!(tool = self.name(), "Querying knowledge base");

        let passages = match self.store.query(question, self.top_k).await {
            Ok(passages) => passages,
            Err(e) => {
                warn!(error = %e, "Document store query failed");
                return Ok(ToolResult {
                    call_id: String::new(),
                    success: false,
                    output: APOLOGY.into(),
                });
            }
        };

        let context = passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!("Context: {context}\n\nQuestion: {question}\nAnswer concisely.");

        // Single-turn generation, no tool declarations: this call cannot recurse.
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![Message::system(ANSWER_SYSTEM_PROMPT), Message::user(prompt)],
            temperature: self.temperature,
            max_tokens: None,
            tools: Vec::new(),
        };

        match self.provider.complete(request).await {
            Ok(response) => Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: response.message.content,
            }),
            Err(e) => {
                warn!(error = %e, "Knowledge base generation failed");
                Ok(ToolResult {
                    call_id: String::new(),
                    success: false,
                    output: APOLOGY.into(),
                })
            }
        }
    }
}
