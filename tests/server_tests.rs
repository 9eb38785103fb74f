// REST surface tests - status mapping and history round-trips over HTTP.

use async_trait::async_trait;
use ciao_ai::chat::ChatService;
use ciao_ai::generate::{GenerateError, ResponseGenerator};
use ciao_ai::server;
use ciao_ai::types::ConversationHistory;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Deterministic reply derived from the user's message.
struct EchoGenerator;

#[async_trait]
impl ResponseGenerator for EchoGenerator {
    async fn generate(
        &self,
        user_message: &str,
        _history: &ConversationHistory,
    ) -> Result<String, GenerateError> {
        Ok(format!("Risposta a: {user_message}"))
    }
}

struct FailingGenerator;

#[async_trait]
impl ResponseGenerator for FailingGenerator {
    async fn generate(
        &self,
        _user_message: &str,
        _history: &ConversationHistory,
    ) -> Result<String, GenerateError> {
        Err(GenerateError::InvalidResponse("missing message field".into()))
    }
}

/// Blocks inside generate() until the gate receives a permit.
struct GatedGenerator {
    entered: Arc<Notify>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl ResponseGenerator for GatedGenerator {
    async fn generate(
        &self,
        _user_message: &str,
        _history: &ConversationHistory,
    ) -> Result<String, GenerateError> {
        self.entered.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| GenerateError::InvalidResponse("gate closed".into()))?;
        Ok("risposta".to_string())
    }
}

async fn spawn_server<G>(service: ChatService<G>) -> SocketAddr
where
    G: ResponseGenerator + 'static,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let app = server::app(Arc::new(service));
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("serve");
    });
    addr
}

#[tokio::test]
async fn chat_appends_turn_and_history_roundtrips() {
    let addr = spawn_server(ChatService::new(EchoGenerator)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/chat"))
        .json(&json!({"message": "Ciao", "session_id": "s1"}))
        .send()
        .await
        .expect("POST /chat");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("chat body");
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["reply"], "Risposta a: Ciao");
    assert_eq!(body["history"].as_array().expect("history").len(), 1);

    let history: Value = client
        .get(format!("http://{addr}/history/s1"))
        .send()
        .await
        .expect("GET /history")
        .json()
        .await
        .expect("history body");
    assert_eq!(history["session_id"], "s1");
    assert!(!history["created_at"].is_null());
    assert_eq!(history["history"], body["history"]);
}

#[tokio::test]
async fn empty_message_is_bad_request() {
    let addr = spawn_server(ChatService::new(EchoGenerator)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/chat"))
        .json(&json!({"message": "   ", "session_id": "s1"}))
        .send()
        .await
        .expect("POST /chat");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("error body");
    assert!(!body["error"].as_str().expect("error string").is_empty());
}

#[tokio::test]
async fn generator_failure_is_bad_gateway_and_history_stays_empty() {
    let addr = spawn_server(ChatService::new(FailingGenerator)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/chat"))
        .json(&json!({"message": "Ciao", "session_id": "s1"}))
        .send()
        .await
        .expect("POST /chat");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.expect("error body");
    assert!(!body["error"].as_str().expect("error string").is_empty());

    let history: Value = client
        .get(format!("http://{addr}/history/s1"))
        .send()
        .await
        .expect("GET /history")
        .json()
        .await
        .expect("history body");
    assert!(history["history"].as_array().expect("history").is_empty());
}

#[tokio::test]
async fn busy_session_is_conflict() {
    let entered = Arc::new(Notify::new());
    let gate = Arc::new(Semaphore::new(0));
    let addr = spawn_server(ChatService::new(GatedGenerator {
        entered: entered.clone(),
        gate: gate.clone(),
    }))
    .await;
    let client = reqwest::Client::new();

    let first = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .post(format!("http://{addr}/chat"))
                .json(&json!({"message": "Ciao", "session_id": "s1"}))
                .send()
                .await
                .expect("first POST /chat")
        })
    };
    entered.notified().await;

    let second = client
        .post(format!("http://{addr}/chat"))
        .json(&json!({"message": "Ancora tu?", "session_id": "s1"}))
        .send()
        .await
        .expect("second POST /chat");
    assert_eq!(second.status(), StatusCode::CONFLICT);

    gate.add_permits(1);
    let completed = first.await.expect("join first request");
    assert_eq!(completed.status(), StatusCode::OK);
}

#[tokio::test]
async fn clear_resets_session_history() {
    let addr = spawn_server(ChatService::new(EchoGenerator)).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/chat"))
        .json(&json!({"message": "Ciao", "session_id": "s1"}))
        .send()
        .await
        .expect("seed POST /chat");

    let response = client
        .post(format!("http://{addr}/clear"))
        .json(&json!({"session_id": "s1"}))
        .send()
        .await
        .expect("POST /clear");
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.expect("clear body");
    assert!(body["history"].as_array().expect("history").is_empty());
    assert!(body["reply"].is_null());
}
