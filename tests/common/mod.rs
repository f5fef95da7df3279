//! Shared helpers: an axum fake of the remote platform on an ephemeral port.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use workflow_bridge::client::{RemoteApiClient, RetryPolicy};
use workflow_bridge::types::RemoteConfig;

pub const API_KEY: &str = "integration-key";

/// Serve `router` on 127.0.0.1 and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// Client with fast retries, pointed at `base_url`.
pub fn client(base_url: &str) -> RemoteApiClient {
    let config = RemoteConfig {
        base_url: base_url.to_string(),
        api_key: API_KEY.to_string(),
        timeout: Duration::from_secs(5),
        max_retries: 3,
    };
    RemoteApiClient::new(&config).unwrap().with_retry_policy(
        RetryPolicy::default()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1)),
    )
}

/// Base URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// In-memory platform state behind the fake.
#[derive(Clone, Default)]
pub struct FakePlatform {
    pub workflows: Arc<Mutex<Vec<Value>>>,
    pub executions: Arc<Mutex<Vec<Value>>>,
    pub requests: Arc<AtomicUsize>,
}

impl FakePlatform {
    pub fn with_workflows(workflows: Vec<Value>) -> Self {
        let fake = Self::default();
        *fake.workflows.lock().unwrap() = workflows;
        fake
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Router mimicking the platform's `/api/v1` surface.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/v1/workflows", get(list_workflows))
            .route("/api/v1/workflows/{id}", get(get_workflow).delete(delete_workflow))
            .route("/api/v1/workflows/{id}/activate", post(activate))
            .route("/api/v1/workflows/{id}/deactivate", post(deactivate))
            .route("/api/v1/workflows/{id}/execute", post(execute))
            .route("/api/v1/executions", get(list_executions))
            .with_state(self.clone())
    }
}

fn authorized(fake: &FakePlatform, headers: &HeaderMap) -> Result<(), Response> {
    fake.requests.fetch_add(1, Ordering::SeqCst);
    match headers.get("X-N8N-API-KEY").and_then(|v| v.to_str().ok()) {
        Some(API_KEY) => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "unauthorized"})),
        )
            .into_response()),
    }
}

fn missing() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"message": "Workflow not found"})),
    )
        .into_response()
}

fn find(fake: &FakePlatform, id: &str) -> Option<Value> {
    fake.workflows
        .lock()
        .unwrap()
        .iter()
        .find(|w| w["id"] == id)
        .cloned()
}

fn set_active(fake: &FakePlatform, id: &str, active: bool) -> Option<Value> {
    let mut workflows = fake.workflows.lock().unwrap();
    let workflow = workflows.iter_mut().find(|w| w["id"] == id)?;
    workflow["active"] = json!(active);
    Some(workflow.clone())
}

async fn list_workflows(State(fake): State<FakePlatform>, headers: HeaderMap) -> Response {
    if let Err(resp) = authorized(&fake, &headers) {
        return resp;
    }
    let workflows = fake.workflows.lock().unwrap().clone();
    Json(json!({"data": workflows, "nextCursor": null})).into_response()
}

async fn get_workflow(
    State(fake): State<FakePlatform>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorized(&fake, &headers) {
        return resp;
    }
    match find(&fake, &id) {
        Some(workflow) => Json(workflow).into_response(),
        None => missing(),
    }
}

async fn delete_workflow(
    State(fake): State<FakePlatform>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorized(&fake, &headers) {
        return resp;
    }
    let mut workflows = fake.workflows.lock().unwrap();
    let before = workflows.len();
    workflows.retain(|w| w["id"] != id.as_str());
    if workflows.len() == before {
        return missing();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn activate(
    State(fake): State<FakePlatform>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorized(&fake, &headers) {
        return resp;
    }
    match set_active(&fake, &id, true) {
        Some(workflow) => Json(workflow).into_response(),
        None => missing(),
    }
}

async fn deactivate(
    State(fake): State<FakePlatform>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorized(&fake, &headers) {
        return resp;
    }
    match set_active(&fake, &id, false) {
        Some(workflow) => Json(workflow).into_response(),
        None => missing(),
    }
}

async fn execute(
    State(fake): State<FakePlatform>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(resp) = authorized(&fake, &headers) {
        return resp;
    }
    if find(&fake, &id).is_none() {
        return missing();
    }
    Json(json!({
        "id": "1001",
        "workflowId": id,
        "finished": false,
        "mode": "manual",
        "startedAt": "2024-05-02T10:00:00.000Z"
    }))
    .into_response()
}

async fn list_executions(
    State(fake): State<FakePlatform>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(resp) = authorized(&fake, &headers) {
        return resp;
    }
    let limit: usize = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(100);
    let executions: Vec<Value> = fake
        .executions
        .lock()
        .unwrap()
        .iter()
        .filter(|e| match params.get("workflowId") {
            Some(id) => e["workflowId"] == id.as_str(),
            None => true,
        })
        .take(limit)
        .cloned()
        .collect();
    Json(json!({"data": executions, "nextCursor": null})).into_response()
}
