//! `visagent ask` — Single-question mode.
//!
//! Builds the same component stack the gateway uses, runs one question
//! through the agent loop, and prints the answer. No session is kept:
//! each invocation is a fresh conversation.

use std::sync::Arc;
use visagent_agent::AgentLoop;
use visagent_config::AppConfig;
use visagent_core::message::{Conversation, Message};
use visagent_core::retrieval::DocumentStore;
use visagent_store::HttpDocumentStore;
use visagent_tools::{HttpStatusChecker, StatusChecker};

pub async fn run(message: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = visagent_providers::build_from_config(&config);
    let store: Arc<dyn DocumentStore> = Arc::new(HttpDocumentStore::new(&config.store.url));
    let checker: Arc<dyn StatusChecker> = Arc::new(HttpStatusChecker::new(
        &config.tracker.url,
        config.tracker.timeout_secs,
    ));
    let tools = Arc::new(visagent_tools::default_registry(
        store,
        provider.clone(),
        &config.default_model,
        config.default_temperature,
        config.store.top_k,
        checker,
    ));

    let mut agent = AgentLoop::new(provider, tools, &config.default_model)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_turns(config.agent.max_turns as usize);
    if let Some(prompt) = &config.agent.system_prompt_override {
        agent = agent.with_system_prompt(prompt);
    }

    let mut conv = Conversation::new();
    conv.push(Message::user(&message));

    eprint!("  Thinking...");
    let response = agent.process(&mut conv).await?;
    eprint!("\r             \r");
    println!("{response}");

    Ok(())
}
