use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use uellogent::adapters::api_handler::{AdminKey, AppState};
use uellogent::adapters::downstream::CannedDownstream;
use uellogent::adapters::health_handler::HealthHandler;
use uellogent::adapters::rate_limit::{create_limiter, SharedRateLimiter};
use uellogent::adapters::session_registry::{AgentFactory, SessionRegistry};
use uellogent::adapters::tool_handler::{SupportTool, SupportToolSet};
use uellogent::agents::domain::{AgentKind, Message, MessageLog, ToolCall, ToolPort};
use uellogent::agents::llm::{LlmProvider, ScriptedProvider};
use uellogent::agents::memory::InMemoryHistoryStore;
use uellogent::agents::{QueryAgentConfig, SupportAgentConfig};
use uellogent::agents::{QueryAgent, SupportAgent};
use uellogent::persistence::InMemoryMessageLog;
use uellogent::retrieval::{
    HashingEmbedder, InMemoryIndex, IndexRetriever, Ingestor, StaticLoader, TextSplitter,
};

const ADMIN_KEY: &str = "s3cret";
const FAQ_URL: &str = "https://uellosend.com/faq";

struct TestApp {
    router: Router,
    log: Arc<InMemoryMessageLog>,
    downstream: Arc<CannedDownstream>,
    query_llm: Arc<ScriptedProvider>,
}

fn build_app(
    support_llm: ScriptedProvider,
    query_llm: ScriptedProvider,
    rate_limiter: Option<SharedRateLimiter>,
) -> TestApp {
    let log = Arc::new(InMemoryMessageLog::new());
    let message_log: Arc<dyn MessageLog> = log.clone();

    let downstream = Arc::new(
        CannedDownstream::new()
            .reply(SupportTool::VerifyCustomerExist, 200, json!(42))
            .reply(SupportTool::SendPasswordResetLink, 200, json!("sent")),
    );
    let tools: Arc<dyn ToolPort> = Arc::new(SupportToolSet::new(downstream.clone()));

    let support_llm: Arc<dyn LlmProvider> = Arc::new(support_llm);
    let factory: AgentFactory<SupportAgent> = {
        let log = message_log.clone();
        Arc::new(move || {
            Ok(SupportAgent::new(
                &SupportAgentConfig::default(),
                support_llm.clone(),
                tools.clone(),
                log.clone(),
            ))
        })
    };
    let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(900), factory));

    let embedder = Arc::new(HashingEmbedder::new(64));
    let index = Arc::new(InMemoryIndex::new());
    let query_llm = Arc::new(query_llm);
    let query_agent = QueryAgent::new(
        QueryAgentConfig::default(),
        query_llm.clone(),
        Arc::new(IndexRetriever::new(embedder.clone(), index.clone())),
        message_log.clone(),
    );

    let loader = StaticLoader::new().with_page(
        FAQ_URL,
        "FAQ",
        "How do I top up credit? Pay with mobile money and the credit arrives in minutes.",
    );
    let ingestor = Ingestor::new(
        Arc::new(loader),
        TextSplitter::new(500, 50),
        embedder,
        index,
    );

    let state = AppState {
        sessions: sessions.clone(),
        query_agent: Arc::new(query_agent),
        history: Arc::new(InMemoryHistoryStore::new(Duration::from_secs(900))),
        message_log,
        ingestor: Arc::new(ingestor),
        admin_key: AdminKey::new(Some(SecretString::from(ADMIN_KEY.to_string()))),
    };
    let health = Arc::new(HealthHandler::new(sessions, None));

    TestApp {
        router: uellogent::create_app(state, health, rate_limiter),
        log,
        downstream,
        query_llm,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("DELETE")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_root_banner() {
    let app = build_app(ScriptedProvider::new(), ScriptedProvider::new(), None);

    let (status, body) = send(&app.router, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("UelloGent Agent Server"));
    assert!(body["date"].as_str().is_some());
}

#[tokio::test]
async fn test_support_chat_runs_tools_and_audits() {
    let support = ScriptedProvider::new()
        .reply(Message::model_with_tools(
            "",
            vec![ToolCall::new(
                "call-1",
                "verify_customer_exist",
                json!({"customer_email": "jane@example.com"}),
            )],
        ))
        .reply(Message::model("Your account exists."));
    let app = build_app(support, ScriptedProvider::new(), None);

    let (status, body) = send(
        &app.router,
        post(
            "/agent/support/chat",
            json!({"query": "Is my account there? jane@example.com", "session_id": "s1"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "message": "Your account exists."}));

    let requests = app.downstream.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, json!({"email": "jane@example.com"}));

    let records = app.log.records(AgentKind::Support);
    assert_eq!(records.first().map(|r| r.role.as_str()), Some("user"));
    assert!(records
        .iter()
        .any(|r| r.text == "Tool called: verify_customer_exist"));
    assert_eq!(records.last().map(|r| r.text.as_str()), Some("Your account exists."));

    let (status, body) = send(
        &app.router,
        get(&format!("/agent/support/chat/messages/{}", ADMIN_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["messages"].as_array().map(|m| m.len()), Some(records.len()));
}

#[tokio::test]
async fn test_admin_endpoints_reject_wrong_key() {
    let app = build_app(ScriptedProvider::new(), ScriptedProvider::new(), None);
    let unauthorized = json!({"status": "ok", "messages": "Unauthorized"});

    let (status, body) = send(&app.router, get("/agent/support/chat/messages/nope")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, unauthorized);

    let (_, body) = send(&app.router, get("/agent/query/chat/messages/nope")).await;
    assert_eq!(body, unauthorized);

    let (status, body) = send(
        &app.router,
        post("/scraper", json!({"urls": [FAQ_URL], "admin_key": "nope"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, unauthorized);
}

#[tokio::test]
async fn test_support_session_delete() {
    let support = ScriptedProvider::new().reply(Message::model("Hello! How can I help?"));
    let app = build_app(support, ScriptedProvider::new(), None);

    let (status, body) = send(&app.router, delete("/agent/sessions/support/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Session not found"}));

    send(
        &app.router,
        post("/agent/support/chat", json!({"query": "hi", "session_id": "s2"})),
    )
    .await;

    let (status, body) = send(&app.router, delete("/agent/sessions/support/s2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Session deleted successfully");

    let (status, _) = send(&app.router, delete("/agent/sessions/support/s2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_model_failure_hides_details() {
    let app = build_app(
        ScriptedProvider::new().fail("quota exhausted for key AIza-secret"),
        ScriptedProvider::new(),
        None,
    );

    let (status, body) = send(
        &app.router,
        post("/agent/support/chat", json!({"query": "hi", "session_id": "s3"})),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"detail": "An unexpected internal error occurred. Please try again later."})
    );
}

#[tokio::test]
async fn test_query_chat_without_context_declines() {
    let query = ScriptedProvider::new().reply(Message::model("Hi, ask me about UelloSend."));
    let app = build_app(ScriptedProvider::new(), query, None);

    let (_, body) = send(
        &app.router,
        post("/agent/query/chat", json!({"query": "hello", "session_id": "q1"})),
    )
    .await;
    assert_eq!(body["message"], "Hi, ask me about UelloSend.");

    // Nothing indexed yet: the second turn never reaches the model
    let (status, body) = send(
        &app.router,
        post("/agent/query/chat", json!({"query": "pricing", "session_id": "q1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Unable to respond to the query: pricing.");
    assert_eq!(app.query_llm.calls(), 1);
}

#[tokio::test]
async fn test_scrape_then_grounded_answer() {
    let query = ScriptedProvider::new()
        .reply(Message::model("Hi!"))
        .reply(Message::model("Pay with mobile money."));
    let app = build_app(ScriptedProvider::new(), query, None);

    let (status, body) = send(
        &app.router,
        post(
            "/scraper",
            json!({"urls": [FAQ_URL, "https://uellosend.com/missing"], "admin_key": ADMIN_KEY}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "1 documents have been indexed.");

    send(
        &app.router,
        post("/agent/query/chat", json!({"query": "hello", "session_id": "q2"})),
    )
    .await;
    let (_, body) = send(
        &app.router,
        post(
            "/agent/query/chat",
            json!({"query": "How do I top up credit?", "session_id": "q2"}),
        ),
    )
    .await;
    assert_eq!(body["message"], "Pay with mobile money.");

    let requests = app.query_llm.requests();
    assert_eq!(requests.len(), 2);
    let grounded = &requests[1].messages.last().unwrap().content;
    assert!(grounded.contains("mobile money"));
    assert!(grounded.contains(FAQ_URL));
    assert_eq!(requests[1].seed, Some(23));

    let (status, _) = send(&app.router, delete("/agent/sessions/query/q2")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app.router, delete("/agent/sessions/query/q2")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"detail": "Session not found"}));
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let app = build_app(
        ScriptedProvider::new(),
        ScriptedProvider::new(),
        Some(create_limiter(1)),
    );
    let from = |ip: [u8; 4]| {
        let mut request = get("/");
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
        request
    };

    let (status, _) = send(&app.router, from([10, 0, 0, 1])).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, from([10, 0, 0, 1])).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body, json!({"detail": "Rate limit exceeded: 1 per 1 day"}));

    let (status, _) = send(&app.router, from([10, 0, 0, 2])).await;
    assert_eq!(status, StatusCode::OK);

    // Health checks are never limited
    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
