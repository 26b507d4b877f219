//! End-to-end integration tests for the visagent backend.
//!
//! These tests exercise the full pipeline from HTTP request to agent
//! answer: gateway routing, session handling, the agent loop, and both
//! tools, with a scripted provider standing in for the LLM.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use visagent_agent::AgentLoop;
use visagent_core::error::ProviderError;
use visagent_core::message::{Message, MessageToolCall, Role};
use visagent_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use visagent_core::retrieval::DocumentStore;
use visagent_gateway::{AppState, build_router};
use visagent_session::SessionStore;
use visagent_store::InMemoryDocumentStore;
use visagent_tools::{StatusChecker, TrackOutcome, default_registry};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<ProviderResponse>>,
    requests: std::sync::Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: std::sync::Mutex::new(responses),
            requests: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(ProviderError::Network("script exhausted".into()));
        }
        Ok(responses.remove(0))
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock".into(),
    }
}

fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    let mut msg = Message::assistant("");
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: None,
        model: "mock".into(),
    }
}

fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

// ── Stub Checker ─────────────────────────────────────────────────────────

struct StubChecker {
    outcome: TrackOutcome,
    seen: std::sync::Mutex<Vec<(String, String)>>,
}

impl StubChecker {
    fn new(outcome: TrackOutcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            seen: std::sync::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl StatusChecker for StubChecker {
    async fn lookup(&self, reference_no: &str, date_of_birth: &str) -> TrackOutcome {
        self.seen
            .lock()
            .unwrap()
            .push((reference_no.to_string(), date_of_birth.to_string()));
        self.outcome.clone()
    }
}

// ── Test Harness ─────────────────────────────────────────────────────────

fn build_state(provider: Arc<ScriptedProvider>, checker: Arc<StubChecker>) -> Arc<AppState> {
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::with_documents(vec![
        (
            "Tourist visa fees are 100 USD, payable at submission.".into(),
            "fees.md".into(),
        ),
        (
            "Processing takes two to four weeks.".into(),
            "timeline.md".into(),
        ),
    ]));
    let tools = Arc::new(default_registry(
        store.clone(),
        provider.clone(),
        "mock",
        0.4,
        3,
        checker,
    ));
    let agent = Arc::new(AgentLoop::new(provider.clone(), tools, "mock"));
    Arc::new(AppState {
        agent,
        sessions: Arc::new(SessionStore::new(100, Duration::from_secs(1800))),
        store,
        provider,
        model: "mock".into(),
        temperature: 0.4,
        top_k: 3,
        degraded: false,
    })
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ── E2E: Simple exchange ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_plain_answer_stores_two_messages() {
    let provider = ScriptedProvider::new(vec![text_response("Hello! How can I help?")]);
    let checker = StubChecker::new(TrackOutcome::Failed);
    let state = build_state(provider.clone(), checker);
    let app = build_router(state.clone());

    let response = app
        .oneshot(json_post(
            "/query",
            serde_json::json!({"query": "hi", "user_id": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["response"], "Hello! How can I help?");

    let conv = state.sessions.get_or_create("alice").await;
    assert_eq!(conv.messages.len(), 2);
    assert_eq!(conv.messages[0].role, Role::User);
    assert_eq!(conv.messages[1].role, Role::Assistant);
    assert_eq!(provider.calls(), 1);
}

// ── E2E: Knowledge base question via tool ────────────────────────────────

#[tokio::test]
async fn e2e_knowledge_question_runs_nested_generation() {
    // Script: (1) agent turn requests the knowledge tool, (2) the tool's
    // nested single-turn generation, (3) the agent's final answer.
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![make_tool_call(
            "visa_knowledge_query",
            serde_json::json!({"question": "What are the tourist visa fees?"}),
        )]),
        text_response("Tourist visa fees are 100 USD."),
        text_response("The tourist visa fee is 100 USD, paid when you submit."),
    ]);
    let checker = StubChecker::new(TrackOutcome::Failed);
    let state = build_state(provider.clone(), checker);
    let app = build_router(state.clone());

    let response = app
        .oneshot(json_post(
            "/query",
            serde_json::json!({"query": "How much does a tourist visa cost?", "user_id": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["response"],
        "The tourist visa fee is 100 USD, paid when you submit."
    );

    // user, assistant tool-call shell, tool result, final assistant
    let conv = state.sessions.get_or_create("alice").await;
    assert_eq!(conv.messages.len(), 4);
    assert_eq!(conv.messages[2].role, Role::Tool);
    assert_eq!(conv.messages[2].content, "Tourist visa fees are 100 USD.");
    assert_eq!(
        conv.messages[2].tool_call_id.as_deref(),
        Some("call_visa_knowledge_query")
    );
    assert_eq!(provider.calls(), 3);

    // The nested generation declared no tools; the agent turns declared both.
    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests[0].tools.len(), 2);
    assert!(requests[1].tools.is_empty());
    assert_eq!(requests[2].tools.len(), 2);
}

// ── E2E: Status tracking ─────────────────────────────────────────────────

#[tokio::test]
async fn e2e_track_status_passes_exact_arguments() {
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![make_tool_call(
            "track_visa_status",
            serde_json::json!({"reference_no": "ABC123", "date_of_birth": "1990-01-01"}),
        )]),
        text_response("Your application ABC123 is approved."),
    ]);
    let checker = StubChecker::new(TrackOutcome::Status("Approved".into()));
    let state = build_state(provider, checker.clone());
    let app = build_router(state.clone());

    let response = app
        .oneshot(json_post(
            "/query",
            serde_json::json!({
                "query": "Track ABC123, born 1990-01-01",
                "user_id": "alice"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = checker.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "ABC123");
    assert_eq!(seen[0].1, "1990-01-01");

    let conv = state.sessions.get_or_create("alice").await;
    assert_eq!(conv.messages.len(), 4);
    assert_eq!(
        conv.messages[2].content,
        "The status for application ABC123 is: Approved"
    );
    assert_eq!(
        conv.messages[3].content,
        "Your application ABC123 is approved."
    );
}

#[tokio::test]
async fn e2e_tracking_timeout_still_completes_the_request() {
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![make_tool_call(
            "track_visa_status",
            serde_json::json!({"reference_no": "ABC123", "date_of_birth": "1990-01-01"}),
        )]),
        text_response("The tracking service is not responding right now."),
    ]);
    let checker = StubChecker::new(TrackOutcome::TimedOut);
    let state = build_state(provider, checker);
    let app = build_router(state.clone());

    let response = app
        .oneshot(json_post(
            "/query",
            serde_json::json!({"query": "Track ABC123, born 1990-01-01", "user_id": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let conv = state.sessions.get_or_create("alice").await;
    assert_eq!(
        conv.messages[2].content,
        "Error: the tracking service timed out."
    );
}

// ── E2E: Session continuity ──────────────────────────────────────────────

#[tokio::test]
async fn e2e_second_request_sees_the_prior_transcript() {
    let provider = ScriptedProvider::new(vec![
        text_response("You need a passport and two photos."),
        text_response("Yes, the photos must be recent."),
    ]);
    let checker = StubChecker::new(TrackOutcome::Failed);
    let state = build_state(provider.clone(), checker);
    let app = build_router(state.clone());

    let response = app
        .clone()
        .oneshot(json_post(
            "/query",
            serde_json::json!({"query": "What documents do I need?", "user_id": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_post(
            "/query",
            serde_json::json!({"query": "Do the photos have to be recent?", "user_id": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Second agent request carried system prompt + the three prior messages
    // + the new user message.
    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[1].messages[0].role, Role::System);
    assert_eq!(
        requests[1].messages[1].content,
        "What documents do I need?"
    );

    let conv = state.sessions.get_or_create("alice").await;
    assert_eq!(conv.messages.len(), 4);
}

#[tokio::test]
async fn e2e_users_do_not_share_sessions() {
    let provider = ScriptedProvider::new(vec![
        text_response("Answer for alice."),
        text_response("Answer for bob."),
    ]);
    let checker = StubChecker::new(TrackOutcome::Failed);
    let state = build_state(provider.clone(), checker);
    let app = build_router(state.clone());

    app.clone()
        .oneshot(json_post(
            "/query",
            serde_json::json!({"query": "alice question", "user_id": "alice"}),
        ))
        .await
        .unwrap();
    app.oneshot(json_post(
        "/query",
        serde_json::json!({"query": "bob question", "user_id": "bob"}),
    ))
    .await
    .unwrap();

    // Bob's request starts from an empty transcript.
    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests[1].messages.len(), 2);
    assert_eq!(requests[1].messages[1].content, "bob question");

    let alice = state.sessions.get_or_create("alice").await;
    let bob = state.sessions.get_or_create("bob").await;
    assert_eq!(alice.messages[0].content, "alice question");
    assert_eq!(bob.messages[0].content, "bob question");
}

// ── E2E: RAG endpoint ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_rag_query_is_session_free() {
    let provider = ScriptedProvider::new(vec![text_response("Fees are 100 USD.")]);
    let checker = StubChecker::new(TrackOutcome::Failed);
    let state = build_state(provider.clone(), checker);
    let app = build_router(state.clone());

    let response = app
        .oneshot(json_post(
            "/rag/query",
            serde_json::json!({"query": "visa fees", "user_id": "alice"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["original_query"], "visa fees");
    assert_eq!(body["response"], "Fees are 100 USD.");
    let docs = body["retrieved_documents"].as_array().unwrap();
    assert_eq!(docs[0]["id"], "doc_0");
    assert!(docs[0]["content"].as_str().unwrap().contains("100 USD"));

    // No session is created and no tools are declared.
    assert!(state.sessions.is_empty().await);
    let requests = provider.requests.lock().unwrap();
    assert!(requests[0].tools.is_empty());
}
