// relay/mod.rs — chat relay proxy.
//
// Axum HTTP server that accepts a chat-style request, injects the
// server-held credential, forwards to the upstream completion API, and
// returns a normalized response. Stateless per request; the only shared
// resources are the read-only config and a reused HTTP client.
//
// Endpoints:
//   POST    /         relay a chat request upstream
//   OPTIONS /         CORS preflight (empty 200)
//   GET     /health   liveness probe
//
// Every response — including every error response — carries the fixed
// permissive CORS header set; browser clients call this endpoint directly.

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RelaySettings;
use crate::AppContext;

/// Marker prefix for the system message carrying serialized product context.
/// Wire contract: consumers use it to tell structured product data apart from
/// free-form chat. The relay itself treats everything after it as opaque.
pub const PRODUCTS_MARKER: &str = "PRODUCTS_JSON:";

pub async fn start_relay_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("relay listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", post(relay).options(preflight))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::map_response(attach_cors))
        .with_state(ctx)
}

/// Attach the fixed CORS header set to every outgoing response. The set is
/// constant by contract — error responses and the preflight carry it too.
async fn attach_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// CORS preflight — empty 200; headers come from [`attach_cors`].
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let uptime = ctx.started_at.elapsed().as_secs();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
    }))
}

/// `POST /` — the single relay operation.
async fn relay(State(ctx): State<Arc<AppContext>>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();

    // The credential gates everything: without it there is no authenticated
    // upstream call to make, whatever the body looks like.
    let Some(api_key) = ctx.config.relay.api_key.clone() else {
        warn!(%request_id, "relay request rejected — no upstream credential configured");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "GLOWD_API_KEY not configured on the relay" }),
        );
    };

    let Ok(request) = serde_json::from_slice::<Value>(&body) else {
        return error_response(StatusCode::BAD_REQUEST, json!({ "error": "Invalid JSON" }));
    };

    let upstream_body = upstream_body_from(&request, &ctx.config.relay);
    info!(
        %request_id,
        messages = upstream_body["messages"].as_array().map(Vec::len).unwrap_or(0),
        model = %upstream_body["model"].as_str().unwrap_or("?"),
        "forwarding chat request upstream"
    );

    match forward(&ctx, &api_key, &upstream_body).await {
        Ok(data) => {
            // Simplify for the client: assistant text in `result` where the
            // upstream reply follows the choices[0].message.content shape,
            // null otherwise.
            let result = data["choices"][0]["message"]["content"]
                .as_str()
                .map(str::to_owned);
            (
                StatusCode::OK,
                Json(json!({ "success": true, "result": result, "raw": data })),
            )
                .into_response()
        }
        Err(e) => {
            warn!(%request_id, err = %e, "upstream request failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Request failed", "details": e.to_string() }),
            )
        }
    }
}

/// Build the upstream request body from a relayed request, applying defaults.
///
/// - `messages` must be a JSON array; anything else is treated as empty.
/// - A non-null `selected` value is serialized and prepended as a system
///   message tagged with [`PRODUCTS_MARKER`].
/// - `model` and `max_tokens` default when unspecified; `temperature`
///   defaults whenever it is not a number.
fn upstream_body_from(request: &Value, defaults: &RelaySettings) -> Value {
    let mut messages: Vec<Value> = request
        .get("messages")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    if let Some(selected) = request.get("selected").filter(|v| !v.is_null()) {
        match serde_json::to_string(selected) {
            Ok(products_json) => messages.insert(
                0,
                json!({
                    "role": "system",
                    "content": format!("{PRODUCTS_MARKER}{products_json}"),
                }),
            ),
            // Should not happen for a Value we just parsed; skip the context
            // message rather than fail the whole request.
            Err(e) => warn!(err = %e, "could not serialize `selected` — omitting product context"),
        }
    }

    let model = request
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(&defaults.model);
    let max_tokens = request
        .get("max_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(defaults.max_tokens);
    let temperature = request
        .get("temperature")
        .and_then(Value::as_f64)
        .unwrap_or(defaults.temperature);

    json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
        "temperature": temperature,
    })
}

/// POST the assembled body to the upstream completion endpoint and parse the
/// reply as JSON. A network error or a non-JSON body is the caller's 500.
async fn forward(ctx: &AppContext, api_key: &str, body: &Value) -> Result<Value> {
    let resp = ctx
        .http
        .post(&ctx.config.relay.upstream_url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await?;
    let data: Value = resp.json().await?;
    Ok(data)
}

fn error_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}
