//! HTTP API gateway for visagent.
//!
//! Exposes the chatbot over REST:
//! - `POST /query` — agentic request against the per-user session
//! - `POST /rag/query` — session-free retrieval + single-turn generation
//! - `GET /health` — liveness
//!
//! Built on Axum. All components are constructed once at startup into an
//! explicit `AppState`; failed startup probes put the gateway in degraded
//! mode (503 per request) instead of crashing it.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use visagent_agent::AgentLoop;
use visagent_core::message::Message;
use visagent_core::provider::{Provider, ProviderRequest};
use visagent_core::retrieval::DocumentStore;
use visagent_session::SessionStore;
use visagent_store::HttpDocumentStore;
use visagent_tools::{HttpStatusChecker, StatusChecker};

const RAG_SYSTEM_PROMPT: &str =
    "You are a visa information assistant. Answer concisely using only the given context.";

/// Shared application state for the gateway.
pub struct AppState {
    pub agent: Arc<AgentLoop>,
    pub sessions: Arc<SessionStore>,
    pub store: Arc<dyn DocumentStore>,
    pub provider: Arc<dyn Provider>,
    pub model: String,
    pub temperature: f32,
    pub top_k: usize,
    /// Set when a startup health probe failed; every query answers 503.
    pub degraded: bool,
}

type SharedState = Arc<AppState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/query", post(query_handler))
        .route("/rag/query", post(rag_handler))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
///
/// Builds provider, store, tools, agent, and session store ONCE and
/// shares them via Arc. Runs until ctrl-c, then clears all sessions.
pub async fn start(config: visagent_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    // === Build shared subsystems ONCE ===
    let provider = visagent_providers::build_from_config(&config);
    let store: Arc<dyn DocumentStore> = Arc::new(HttpDocumentStore::new(&config.store.url));
    let checker: Arc<dyn StatusChecker> = Arc::new(HttpStatusChecker::new(
        &config.tracker.url,
        config.tracker.timeout_secs,
    ));
    let tools = Arc::new(visagent_tools::default_registry(
        store.clone(),
        provider.clone(),
        &config.default_model,
        config.default_temperature,
        config.store.top_k,
        checker,
    ));

    let mut agent = AgentLoop::new(provider.clone(), tools, &config.default_model)
        .with_temperature(config.default_temperature)
        .with_max_tokens(config.default_max_tokens)
        .with_max_turns(config.agent.max_turns as usize);
    if let Some(prompt) = &config.agent.system_prompt_override {
        agent = agent.with_system_prompt(prompt);
    }

    let sessions = Arc::new(SessionStore::new(
        config.session.capacity,
        Duration::from_secs(config.session.ttl_secs),
    ));

    // Startup probes: a dead adapter degrades the gateway, never crashes it.
    let mut degraded = false;
    match provider.health_check().await {
        Ok(true) => info!(provider = provider.name(), "Provider healthy"),
        Ok(false) | Err(_) => {
            warn!(provider = provider.name(), "Provider unreachable, entering degraded mode");
            degraded = true;
        }
    }
    match store.health_check().await {
        Ok(true) => info!(store = store.name(), "Document store healthy"),
        Ok(false) | Err(_) => {
            warn!(store = store.name(), "Document store unreachable, entering degraded mode");
            degraded = true;
        }
    }

    let state = Arc::new(AppState {
        agent: Arc::new(agent),
        sessions,
        store,
        provider,
        model: config.default_model.clone(),
        temperature: config.default_temperature,
        top_k: config.store.top_k,
        degraded,
    });

    let app = build_router(state.clone());

    info!(addr = %addr, degraded, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped, clearing sessions");
    state.sessions.clear().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, detail: &str) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.to_string(),
        }),
    )
}

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    original_query: String,
    response: String,
}

/// The agentic endpoint: one request = one user turn against the session.
///
/// The per-user lock is held across load → process → store, so two
/// concurrent requests for the same user cannot interleave the transcript.
/// On failure the partial transcript is discarded; the session keeps its
/// last completed state.
async fn query_handler(
    State(state): State<SharedState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, HandlerError> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Field 'query' must be a non-empty string",
        ));
    }
    if state.degraded {
        return Err(reject(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
        ));
    }

    let user_id = payload
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("default-user");

    let _guard = state.sessions.lock_user(user_id).await;
    let mut conversation = state.sessions.get_or_create(user_id).await;
    conversation.push(Message::user(query));

    match state.agent.process(&mut conversation).await {
        Ok(response) => {
            state.sessions.put(user_id, conversation).await;
            Ok(Json(QueryResponse {
                original_query: payload.query.clone(),
                response,
            }))
        }
        Err(e) => {
            error!(user_id, error = %e, "Agent processing failed");
            Err(reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ))
        }
    }
}

#[derive(Serialize)]
struct RetrievedDocument {
    id: String,
    content: String,
    source: String,
    score: f32,
}

#[derive(Serialize)]
struct RagResponse {
    original_query: String,
    response: String,
    retrieved_documents: Vec<RetrievedDocument>,
}

/// The non-agentic endpoint: retrieve top-k, generate once, no session.
async fn rag_handler(
    State(state): State<SharedState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<RagResponse>, HandlerError> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Field 'query' must be a non-empty string",
        ));
    }
    if state.degraded {
        return Err(reject(
            StatusCode::SERVICE_UNAVAILABLE,
            "Service temporarily unavailable",
        ));
    }

    let passages = match state.store.query(query, state.top_k).await {
        Ok(passages) => passages,
        Err(e) => {
            error!(error = %e, "Retrieval failed");
            return Err(reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ));
        }
    };

    let context = passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!("Context: {context}\n\nQuestion: {query}\nAnswer concisely.");

    let request = ProviderRequest {
        model: state.model.clone(),
        messages: vec![Message::system(RAG_SYSTEM_PROMPT), Message::user(prompt)],
        temperature: state.temperature,
        max_tokens: None,
        tools: Vec::new(),
    };

    let response = match state.provider.complete(request).await {
        Ok(response) => response.message.content,
        Err(e) => {
            error!(error = %e, "RAG generation failed");
            return Err(reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
            ));
        }
    };

    let retrieved_documents = passages
        .into_iter()
        .enumerate()
        .map(|(i, p)| RetrievedDocument {
            id: format!("doc_{i}"),
            content: p.content,
            source: p.source,
            score: p.score,
        })
        .collect();

    Ok(Json(RagResponse {
        original_query: payload.query.clone(),
        response,
        retrieved_documents,
    }))
}
