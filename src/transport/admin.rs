//! Administrative surface for the external management console.
//!
//! Runs on its own port next to the tool transport. `GET /` and
//! `GET /health` are open; everything else needs `Authorization: Bearer
//! <token>`. The token is only checked for a minimum length of
//! [`MIN_TOKEN_LEN`] characters; the console authenticates its own users.

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

use crate::client::models::is_active;
use crate::client::{
    ApiError, ApiErrorKind, ExecutionQuery, ExecutionRecord, ExecutionStatus, WorkflowApi,
};
use crate::tools::health::percent;
use crate::types::Config;

/// Shortest bearer token accepted.
pub const MIN_TOKEN_LEN: usize = 10;

/// Executions inspected for the daily statistics.
const STATS_WINDOW: usize = 250;

/// Console origins allowed in development.
const DEFAULT_ORIGINS: [&str; 2] = ["http://localhost:8000", "http://127.0.0.1:8000"];

#[derive(Clone)]
struct AdminState {
    api: Arc<dyn WorkflowApi>,
    config: Arc<Config>,
    started: Instant,
}

/// Build the admin router.
pub fn router(api: Arc<dyn WorkflowApi>, config: Arc<Config>) -> Router {
    let cors = cors_layer(&config);
    let state = AdminState {
        api,
        config,
        started: Instant::now(),
    };

    let protected = Router::new()
        .route("/status", get(status))
        .route("/workflows", get(list_workflows))
        .route("/workflows/stats", get(workflow_stats))
        .route("/workflows/{id}", get(get_workflow))
        .route("/workflows/{id}/activate", post(activate_workflow))
        .route("/workflows/{id}/deactivate", post(deactivate_workflow))
        .route("/workflows/{id}/execute", post(execute_workflow))
        .route("/config", get(get_config).put(update_config))
        .route_layer(middleware::from_fn(require_bearer));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .merge(protected)
        .fallback(|| async { detail(StatusCode::NOT_FOUND, "Not Found") })
        .layer(cors)
        .with_state(state)
}

/// Serve the admin router on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    api: Arc<dyn WorkflowApi>,
    config: Arc<Config>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "admin surface listening");

    axum::serve(listener, router(api, config))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = DEFAULT_ORIGINS
        .iter()
        .map(|o| o.to_string())
        .chain(config.portal.portal_url.clone())
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid console origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

// =============================================================================
// Errors and auth
// =============================================================================

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

/// Map a remote failure: 404 for missing resources, 500 for everything else.
fn remote_failure(action: &str, err: &ApiError) -> Response {
    tracing::error!(action, error = %err, "admin request failed");
    let status = if err.kind() == ApiErrorKind::NotFound {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    detail(status, format!("Failed to {action}: {err}"))
}

/// Validate the `Authorization` header value.
pub fn check_bearer(headers: &HeaderMap) -> Result<(), &'static str> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .ok_or("Missing authorization header")?
        .to_str()
        .map_err(|_| "Invalid authorization header format. Use 'Bearer <token>'")?;

    let (scheme, token) = raw
        .trim()
        .split_once(char::is_whitespace)
        .ok_or("Invalid authorization header format. Use 'Bearer <token>'")?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err("Invalid authentication scheme. Use 'Bearer <token>'");
    }
    if token.trim().chars().count() < MIN_TOKEN_LEN {
        return Err("Invalid token");
    }
    Ok(())
}

async fn require_bearer(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }
    match check_bearer(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            tracing::debug!(path = %request.uri().path(), reason, "admin request rejected");
            detail(StatusCode::UNAUTHORIZED, reason)
        }
    }
}

// =============================================================================
// Open endpoints
// =============================================================================

async fn index() -> Json<Value> {
    Json(json!({
        "service": "workflow-bridge management API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "status": "/status",
    }))
}

async fn health(State(state): State<AdminState>) -> Json<Value> {
    let (reachable, errors) = match state.api.health_check().await {
        Ok(_) => (true, Vec::new()),
        Err(err) => {
            tracing::warn!(error = %err, "admin health check: remote unreachable");
            (false, vec![format!("remote platform unreachable: {err}")])
        }
    };

    Json(json!({
        "healthy": reachable,
        "remote_reachable": reachable,
        "errors": errors,
    }))
}

// =============================================================================
// Protected endpoints
// =============================================================================

async fn status(State(state): State<AdminState>) -> Json<Value> {
    let connected = state.api.health_check().await.is_ok();
    Json(json!({
        "status": if connected { "operational" } else { "degraded" },
        "uptime_seconds": state.started.elapsed().as_secs_f64(),
        "remote_connected": connected,
        "remote_url": state.config.remote.base_url,
        "tool_port": state.config.server.port,
        "management_port": state.config.server.admin_port,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
struct WorkflowListParams {
    #[serde(default)]
    active_only: bool,
    search: Option<String>,
}

async fn list_workflows(
    State(state): State<AdminState>,
    Query(params): Query<WorkflowListParams>,
) -> Response {
    let workflows = match state.api.list_workflows().await {
        Ok(workflows) => workflows,
        Err(err) => return remote_failure("list workflows", &err),
    };

    let needle = params.search.as_deref().map(str::to_lowercase);
    let selected: Vec<Value> = workflows
        .into_iter()
        .filter(|w| !params.active_only || is_active(w))
        .filter(|w| match &needle {
            Some(needle) => w
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|name| name.to_lowercase().contains(needle)),
            None => true,
        })
        .collect();

    Json(json!({ "count": selected.len(), "workflows": selected })).into_response()
}

async fn workflow_stats(State(state): State<AdminState>) -> Response {
    let workflows = match state.api.list_workflows().await {
        Ok(workflows) => workflows,
        Err(err) => return remote_failure("fetch workflow stats", &err),
    };
    let query = ExecutionQuery {
        limit: STATS_WINDOW,
        ..ExecutionQuery::default()
    };
    let executions: Vec<ExecutionRecord> = match state.api.list_executions(&query).await {
        Ok(executions) => executions.iter().map(ExecutionRecord::from_value).collect(),
        Err(err) => return remote_failure("fetch workflow stats", &err),
    };

    Json(compute_stats(&workflows, &executions, Utc::now().date_naive())).into_response()
}

/// Workflow counts plus today's (UTC) execution figures.
pub fn compute_stats(
    workflows: &[Value],
    executions: &[ExecutionRecord],
    today: NaiveDate,
) -> Value {
    let total = workflows.len();
    let active = workflows.iter().filter(|w| is_active(w)).count();

    let todays: Vec<&ExecutionRecord> = executions
        .iter()
        .filter(|e| e.started_at_utc().is_some_and(|t| t.date_naive() == today))
        .collect();
    let successes = todays
        .iter()
        .filter(|e| e.status == ExecutionStatus::Success)
        .count();
    let error_workflows: HashSet<&str> = todays
        .iter()
        .filter(|e| e.status == ExecutionStatus::Error)
        .filter_map(|e| e.workflow_id.as_deref())
        .collect();

    json!({
        "total_workflows": total,
        "active_workflows": active,
        "paused_workflows": total - active,
        "error_workflows": error_workflows.len(),
        "total_executions_today": todays.len(),
        "success_rate": percent(successes, todays.len()),
    })
}

async fn get_workflow(State(state): State<AdminState>, Path(id): Path<String>) -> Response {
    match state.api.get_workflow(&id).await {
        Ok(workflow) => Json(json!({ "success": true, "workflow": workflow })).into_response(),
        Err(err) => remote_failure("get workflow", &err),
    }
}

async fn activate_workflow(State(state): State<AdminState>, Path(id): Path<String>) -> Response {
    match state.api.activate_workflow(&id).await {
        Ok(data) => {
            tracing::info!(workflow_id = %id, "workflow activated from console");
            Json(json!({ "success": true, "workflow_id": id, "data": data })).into_response()
        }
        Err(err) => remote_failure("activate workflow", &err),
    }
}

async fn deactivate_workflow(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Response {
    match state.api.deactivate_workflow(&id).await {
        Ok(data) => {
            tracing::info!(workflow_id = %id, "workflow deactivated from console");
            Json(json!({ "success": true, "workflow_id": id, "data": data })).into_response()
        }
        Err(err) => remote_failure("deactivate workflow", &err),
    }
}

async fn execute_workflow(State(state): State<AdminState>, Path(id): Path<String>) -> Response {
    match state.api.execute_workflow(&id, None).await {
        Ok(execution) => Json(json!({
            "success": true,
            "workflow_id": id,
            "execution_id": execution.get("id"),
        }))
        .into_response(),
        Err(err) => remote_failure("execute workflow", &err),
    }
}

async fn get_config(State(state): State<AdminState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "remote_url": config.remote.base_url,
        "api_key_set": !config.remote.api_key.is_empty(),
        "timeout_secs": config.remote.timeout.as_secs(),
        "max_retries": config.remote.max_retries,
        "server_mode": config.server.mode,
        "tool_port": config.server.port,
        "management_port": config.server.admin_port,
        "log_level": config.observability.log_level,
        "log_format": config.observability.log_format,
        "rate_limiting_enabled": config.rate_limit.enabled,
        "rate_limit_requests": config.rate_limit.requests_per_minute,
    }))
}

async fn update_config() -> Response {
    detail(
        StatusCode::NOT_IMPLEMENTED,
        "Configuration updates require a restart. Update the environment and restart the service.",
    )
}
