//! Integration tests for the remote client against a fake platform.

mod common;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{client, dead_url, serve, FakePlatform};
use workflow_bridge::client::{ApiErrorKind, ExecutionQuery, ExecutionStatus, RetryPolicy};
use workflow_bridge::types::RemoteConfig;
use workflow_bridge::{ErrorKind, RemoteApiClient, ResultEnvelope, WorkflowApi};

#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/v1/workflows/{id}",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "boom"})))
                        .into_response()
                } else {
                    Json(json!({"id": "wf-1", "name": "Recovered"})).into_response()
                }
            }),
        )
        .with_state(hits.clone());
    let base = serve(router).await;

    let workflow = client(&base).get_workflow("wf-1").await.unwrap();
    assert_eq!(workflow["name"], "Recovered");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_exhausted_retries_return_last_error() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/v1/workflows/{id}",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                (StatusCode::BAD_GATEWAY, "upstream down")
            }),
        )
        .with_state(hits.clone());
    let base = serve(router).await;

    let err = client(&base).get_workflow("wf-1").await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::Server);
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.message(), "upstream down");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_slow_responses_time_out_and_are_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/v1/workflows/{id}",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"id": "wf-1"}))
            }),
        )
        .with_state(hits.clone());
    let base = serve(router).await;

    let config = RemoteConfig {
        base_url: base,
        api_key: common::API_KEY.to_string(),
        timeout: Duration::from_millis(100),
        max_retries: 3,
    };
    let client = RemoteApiClient::new(&config).unwrap().with_retry_policy(
        RetryPolicy::default()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(1)),
    );

    let err = client.get_workflow("wf-1").await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::Timeout);
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    let envelope: ResultEnvelope = err.into();
    assert_eq!(envelope.error_kind(), Some(ErrorKind::TimeoutError));
}

#[tokio::test]
async fn test_wrong_api_key_fails_once_as_authentication() {
    let fake = FakePlatform::default();
    let base = serve(fake.router()).await;

    let config = RemoteConfig {
        base_url: base,
        api_key: "wrong-key".to_string(),
        ..Default::default()
    };
    let client = RemoteApiClient::new(&config).unwrap();

    let err = client.list_workflows().await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::Authentication);
    assert_eq!(err.status(), Some(401));
    assert_eq!(fake.request_count(), 1);
}

#[tokio::test]
async fn test_not_found_carries_remote_message() {
    let fake = FakePlatform::default();
    let base = serve(fake.router()).await;

    let err = client(&base).get_workflow("missing").await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::NotFound);
    assert_eq!(err.message(), "Workflow not found");
    assert_eq!(fake.request_count(), 1);
}

#[tokio::test]
async fn test_unreachable_remote_is_connection_error() {
    let base = dead_url().await;
    let err = client(&base).health_check().await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::Connection);
}

#[tokio::test]
async fn test_listing_follows_next_cursor() {
    let seen: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
    let router = Router::new()
        .route(
            "/api/v1/workflows",
            get(
                |State(seen): State<Arc<Mutex<Vec<HashMap<String, String>>>>>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    seen.lock().unwrap().push(params.clone());
                    match params.get("cursor").map(String::as_str) {
                        None => Json(json!({
                            "data": [{"id": "1"}, {"id": "2"}],
                            "nextCursor": "page-2"
                        })),
                        Some("page-2") => Json(json!({
                            "data": [{"id": "3"}],
                            "nextCursor": null
                        })),
                        Some(_) => Json(json!({"data": []})),
                    }
                },
            ),
        )
        .with_state(seen.clone());
    let base = serve(router).await;

    let workflows = client(&base).list_workflows().await.unwrap();
    let ids: Vec<&str> = workflows.iter().filter_map(|w| w["id"].as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].get("limit").map(String::as_str), Some("250"));
    assert_eq!(seen[1].get("cursor").map(String::as_str), Some("page-2"));
}

#[tokio::test]
async fn test_list_executions_sends_filters() {
    let seen: Arc<Mutex<Option<HashMap<String, String>>>> = Arc::default();
    let router = Router::new()
        .route(
            "/api/v1/executions",
            get(
                |State(seen): State<Arc<Mutex<Option<HashMap<String, String>>>>>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    *seen.lock().unwrap() = Some(params);
                    Json(json!({"data": [
                        {"id": "1", "status": "error"},
                        {"id": "2", "status": "error"},
                        {"id": "3", "status": "error"}
                    ]}))
                },
            ),
        )
        .with_state(seen.clone());
    let base = serve(router).await;

    let query = ExecutionQuery {
        workflow_id: Some("wf-9".to_string()),
        status: Some(ExecutionStatus::Error),
        limit: 2,
        include_data: true,
    };
    let executions = client(&base).list_executions(&query).await.unwrap();
    assert_eq!(executions.len(), 2);

    let params = seen.lock().unwrap().clone().unwrap();
    assert_eq!(params.get("workflowId").map(String::as_str), Some("wf-9"));
    assert_eq!(params.get("status").map(String::as_str), Some("error"));
    assert_eq!(params.get("includeData").map(String::as_str), Some("true"));
    assert_eq!(params.get("limit").map(String::as_str), Some("2"));
}

#[tokio::test]
async fn test_delete_accepts_empty_body() {
    let fake = FakePlatform::with_workflows(vec![json!({"id": "wf-1", "name": "Doomed"})]);
    let base = serve(fake.router()).await;

    client(&base).delete_workflow("wf-1").await.unwrap();
    assert!(fake.workflows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_execute_wraps_input_under_data() {
    let body: Arc<Mutex<Option<Value>>> = Arc::default();
    let router = Router::new()
        .route(
            "/api/v1/workflows/{id}/execute",
            axum::routing::post(
                |State(body): State<Arc<Mutex<Option<Value>>>>,
                 Json(payload): Json<Value>| async move {
                    *body.lock().unwrap() = Some(payload);
                    Json(json!({"id": "77", "finished": false}))
                },
            ),
        )
        .with_state(body.clone());
    let base = serve(router).await;

    let run = client(&base)
        .execute_workflow("wf-1", Some(json!({"order": 42})))
        .await
        .unwrap();
    assert_eq!(run["id"], "77");
    assert_eq!(body.lock().unwrap().clone(), Some(json!({"data": {"order": 42}})));
}

#[tokio::test]
async fn test_health_check_reports_healthy() {
    let fake = FakePlatform::default();
    let base = serve(fake.router()).await;

    let health = client(&base).health_check().await.unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["url"].as_str().unwrap().starts_with(&base));
}
