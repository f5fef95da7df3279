//! HTTP tool surface.
//!
//! | Route        | Behavior                                             |
//! |--------------|------------------------------------------------------|
//! | `GET /health`| check the remote platform; 200 healthy, 503 otherwise|
//! | `GET /tools` | `{tools, count}`                                     |
//! | `POST /call` | `{tool, arguments}` → 200 with a `ResultEnvelope`    |
//! | `GET /sse`   | keep-alive comments only                             |
//!
//! Tool-level failures are still 200; only a malformed request is 400.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::dispatch::Dispatcher;
use crate::envelope::{ErrorKind, ResultEnvelope};

#[derive(Debug, Clone)]
struct HttpState {
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
}

/// Build the tool router.
pub fn router(
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    max_body_bytes: usize,
) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tools", get(list_tools))
        .route("/call", post(call_tool))
        .route("/sse", get(sse))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(HttpState {
            dispatcher,
            shutdown,
        })
}

/// Serve the tool router on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    max_body_bytes: usize,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "tool HTTP surface listening");

    let app = router(dispatcher, shutdown.clone(), max_body_bytes);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.dispatcher.health().await {
        Ok(remote) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": env!("CARGO_PKG_NAME"),
                "remote": remote,
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": env!("CARGO_PKG_NAME"),
                    "error": err.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn list_tools(State(state): State<HttpState>) -> Json<Value> {
    let tools = state.dispatcher.registry().describe();
    Json(json!({ "count": tools.len(), "tools": tools }))
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
        .into_response()
}

async fn call_tool(State(state): State<HttpState>, body: Bytes) -> Response {
    let request: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => return bad_request(format!("invalid JSON body: {e}")),
    };
    let Some(tool) = request.get("tool").and_then(Value::as_str).map(str::to_string) else {
        return bad_request("missing 'tool' field");
    };
    let arguments = request.get("arguments").cloned().unwrap_or(Value::Null);

    // A dropped connection must not cancel the remote call already in flight.
    let dispatcher = state.dispatcher.clone();
    let task = tokio::spawn(async move { dispatcher.call(&tool, arguments).await });

    let envelope = match task.await {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(error = %e, "tool call task failed");
            ResultEnvelope::err(ErrorKind::UnknownError, "tool call aborted")
        }
    };

    (StatusCode::OK, Json(envelope)).into_response()
}

async fn sse(State(state): State<HttpState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Emits nothing; the stream ends at shutdown so graceful shutdown can finish.
    let stream = futures::stream::unfold(state.shutdown, |shutdown| async move {
        shutdown.cancelled().await;
        None::<(Result<Event, Infallible>, CancellationToken)>
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}
