//! The core agent loop: model round-trips with tool dispatch in between.

use std::sync::Arc;
use tracing::{debug, info, warn};
use visagent_core::error::{Error, ToolError};
use visagent_core::message::{Conversation, Message};
use visagent_core::provider::{Provider, ProviderRequest};
use visagent_core::tool::{ToolCall, ToolRegistry};

/// Default number of model round-trips before the loop gives up.
const DEFAULT_MAX_TURNS: usize = 10;

/// Returned when the turn ceiling hits without a usable assistant reply.
const FALLBACK_REPLY: &str =
    "I'm sorry, I could not complete your request. Please try rephrasing your question.";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful visa assistant. \
You can answer general visa questions with the visa_knowledge_query tool \
and track an existing application with the track_visa_status tool. \
Tracking requires the application reference number and the applicant's \
date of birth (YYYY-MM-DD); ask the user for any detail that is missing \
before calling the tool. Keep answers short and factual.";

/// Drives a conversation to completion against a provider and a tool set.
///
/// The loop owns no conversation state: callers pass the transcript in and
/// get it back extended. The system prompt is prepended at request-build
/// time and never stored, so a stored transcript contains only what the
/// user and the assistant actually exchanged.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: String,
    max_turns: usize,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        Self {
            provider,
            tools,
            model: model.into(),
            temperature: 0.4,
            max_tokens: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    /// Run the loop until the model produces a plain-text answer or the
    /// turn ceiling hits.
    ///
    /// The transcript is extended in strict chronological order: each
    /// assistant message, then one tool message per requested call, in call
    /// order. Tool failures become tool messages and the loop continues;
    /// only provider failures abort the request.
    pub async fn process(&self, conversation: &mut Conversation) -> Result<String, Error> {
        for turn in 1..=self.max_turns {
            let mut messages = Vec::with_capacity(conversation.messages.len() + 1);
            messages.push(Message::system(&self.system_prompt));
            messages.extend(conversation.messages.iter().cloned());

            let request = ProviderRequest {
                model: self.model.clone(),
                messages,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: self.tools.definitions(),
            };

            debug!(turn, "Requesting completion");
            let response = self.provider.complete(request).await?;
            let assistant = response.message;
            let tool_calls = assistant.tool_calls.clone();
            conversation.push(assistant.clone());

            if tool_calls.is_empty() {
                info!(turn, "Agent loop done");
                return Ok(assistant.content);
            }

            for tc in &tool_calls {
                let arguments: serde_json::Value =
                    serde_json::from_str(&tc.arguments).unwrap_or(serde_json::Value::Null);
                let call = ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                };

                let output = match self.tools.execute(&call).await {
                    Ok(result) => result.output,
                    Err(ToolError::NotFound(name)) => {
                        warn!(tool = %name, "Model requested unknown tool");
                        format!("Unknown tool: {name}")
                    }
                    Err(e) => {
                        warn!(tool = %tc.name, error = %e, "Tool execution failed");
                        format!("Error: {e}")
                    }
                };
                conversation.push(Message::tool_result(tc.id.clone(), output));
            }
        }

        warn!(max_turns = self.max_turns, "Turn limit reached");
        Ok(conversation
            .last_assistant_text()
            .map(String::from)
            .unwrap_or_else(|| FALLBACK_REPLY.to_string()))
    }
}
