//! End-to-end advisor flows: session restore, selection, and the
//! generate-routine exchange — against a real store, a catalog file on disk,
//! and (where needed) a live relay with a stub upstream.

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use glowd::advisor::client::RelayClient;
use glowd::advisor::{Advisor, ChatOptions, Role, ROUTINE_PROMPT};
use glowd::catalog::Catalog;
use glowd::config::{ChatSettings, GlowdConfig, RelaySettings};
use glowd::store::Store;
use glowd::AppContext;

const CATALOG_JSON: &str = r#"{
    "products": [
        {"id": 3, "name": "Silk Shampoo", "brand": "Aria", "category": "haircare",
         "description": "Gentle daily shampoo", "image": "https://img.example/3.png"},
        {"id": 7, "name": "Glow Cream", "brand": "Lumen", "category": "skincare",
         "description": "Rich night cream", "image": "https://img.example/7.png"},
        {"id": 12, "name": "Sun Veil", "brand": "Lumen", "category": "suncare",
         "description": "SPF 50 daily veil", "image": "https://img.example/12.png"}
    ]
}"#;

async fn catalog_from_disk(dir: &TempDir) -> Catalog {
    let path = dir.path().join("products.json");
    tokio::fs::write(&path, CATALOG_JSON).await.unwrap();
    Catalog::load(&reqwest::Client::new(), path.to_str().unwrap())
        .await
        .unwrap()
}

async fn advisor_with_endpoint(dir: &TempDir, endpoint: Option<String>) -> Advisor {
    let catalog = catalog_from_disk(dir).await;
    let store = Store::open(dir.path()).await.unwrap();
    Advisor::restore(
        catalog,
        store,
        RelayClient::new(endpoint),
        ChatOptions::default(),
    )
    .await
}

#[tokio::test]
async fn unconfigured_endpoint_surfaces_as_one_assistant_message() {
    let dir = TempDir::new().unwrap();
    let mut advisor = advisor_with_endpoint(&dir, None).await;
    advisor.toggle_selection(3).await;
    advisor.toggle_selection(7).await;

    advisor.generate_routine().await.unwrap();

    let assistant: Vec<_> = advisor
        .transcript()
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect();
    assert_eq!(assistant.len(), 1);
    assert!(assistant[0].content.contains("not configured"));
    // The selection is untouched by the failed exchange.
    assert_eq!(advisor.selection(), &[3, 7]);
}

#[tokio::test]
async fn unreachable_relay_surfaces_as_friendly_transport_message() {
    let dir = TempDir::new().unwrap();
    // Nothing listens on port 1 — connection refused, no retry.
    let mut advisor =
        advisor_with_endpoint(&dir, Some("http://127.0.0.1:1/".to_string())).await;
    advisor.toggle_selection(3).await;

    advisor.generate_routine().await.unwrap();

    let last = advisor.transcript().last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.contains("try again"));
}

#[tokio::test]
async fn selection_and_transcript_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let mut advisor = advisor_with_endpoint(&dir, None).await;
        advisor.toggle_selection(7).await;
        advisor.toggle_selection(12).await;
        advisor.generate_routine().await.unwrap();
    }
    let advisor = advisor_with_endpoint(&dir, None).await;
    assert_eq!(advisor.selection(), &[7, 12]);
    // The transcript replays verbatim: routine prompt + error reply.
    assert_eq!(advisor.transcript().len(), 2);
    assert_eq!(advisor.transcript()[0].content, ROUTINE_PROMPT);
}

// ─── Full chain: advisor → relay → stub upstream ──────────────────────────────

#[derive(Clone)]
struct Captured(Arc<Mutex<Vec<Value>>>);

async fn upstream(State(c): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
    c.0.lock().unwrap().push(body);
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": "Shampoo first, cream second." } }]
    }))
}

async fn spawn_stack() -> (String, Arc<Mutex<Vec<Value>>>) {
    let captured = Captured(Arc::new(Mutex::new(Vec::new())));
    let records = captured.0.clone();
    let router = Router::new()
        .route("/v1/chat/completions", post(upstream))
        .with_state(captured);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let config = GlowdConfig {
        port: 0,
        bind_address: "127.0.0.1".to_string(),
        data_dir: std::env::temp_dir(),
        log: "error".to_string(),
        log_format: "pretty".to_string(),
        catalog_source: "products.json".to_string(),
        relay: RelaySettings {
            upstream_url: format!("http://{upstream_addr}/v1/chat/completions"),
            api_key: Some("sk-test".to_string()),
            ..RelaySettings::default()
        },
        chat: ChatSettings::default(),
    };
    let ctx = Arc::new(AppContext::new(Arc::new(config)));
    let relay_router = glowd::relay::build_router(ctx);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, relay_router).await.unwrap();
    });

    (format!("http://{relay_addr}/"), records)
}

#[tokio::test]
async fn routine_flows_through_relay_and_back_into_the_transcript() {
    let (relay_url, records) = spawn_stack().await;
    let dir = TempDir::new().unwrap();
    let mut advisor = advisor_with_endpoint(&dir, Some(relay_url)).await;
    advisor.toggle_selection(3).await;
    advisor.toggle_selection(7).await;

    let reply = advisor.generate_routine().await.unwrap().clone();
    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "Shampoo first, cream second.");

    // The upstream saw the tagged product context ahead of the user prompt.
    let records = records.lock().unwrap();
    let messages = records[0]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    let context = messages[0]["content"].as_str().unwrap();
    assert!(context.starts_with("PRODUCTS_JSON:"));
    let embedded: Value =
        serde_json::from_str(context.trim_start_matches("PRODUCTS_JSON:")).unwrap();
    let ids: Vec<i64> = embedded
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 7]);
    assert_eq!(
        messages.last().unwrap()["content"].as_str().unwrap(),
        ROUTINE_PROMPT
    );

    // And the image URL never leaves the client.
    assert!(embedded[0].get("image").is_none());
}

#[tokio::test]
async fn follow_up_question_rides_with_selection_context() {
    let (relay_url, records) = spawn_stack().await;
    let dir = TempDir::new().unwrap();
    let mut advisor = advisor_with_endpoint(&dir, Some(relay_url)).await;
    advisor.toggle_selection(12).await;

    let reply = advisor.ask("Can I use this in winter?").await.clone();
    assert_eq!(reply.role, Role::Assistant);

    let records = records.lock().unwrap();
    let messages = records[0]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(
        messages.last().unwrap()["content"].as_str().unwrap(),
        "Can I use this in winter?"
    );
}
