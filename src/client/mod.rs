//! Remote platform API client.
//!
//! [`RemoteApiClient`] owns the single pooled HTTP client of the process and
//! is the only code that talks to the platform. Every call goes through
//! [`RemoteApiClient::request`], which applies the per-request timeout, the
//! [`RetryPolicy`] and the status classification of [`ApiError`], and logs
//! one event per attempt.
//!
//! Operations depend on the [`WorkflowApi`] trait rather than the concrete
//! client so they can be exercised against mocks.

pub mod error;
pub mod models;
pub mod retry;

pub use error::{ApiError, ApiErrorKind};
pub use models::{ExecutionQuery, ExecutionRecord, ExecutionStatus, WorkflowSummary};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Instant;
use url::Url;

use crate::types::{Error, RemoteConfig, Result};

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Page size requested from list endpoints (the platform's maximum).
const PAGE_SIZE: usize = 250;

/// Upper bound on pages followed for a single listing.
const MAX_PAGES: usize = 100;

/// Typed surface of the remote platform used by the operation set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Cheap reachability check.
    async fn health_check(&self) -> std::result::Result<Value, ApiError>;

    /// Every workflow, in the order the platform returns them.
    async fn list_workflows(&self) -> std::result::Result<Vec<Value>, ApiError>;

    async fn get_workflow(&self, workflow_id: &str) -> std::result::Result<Value, ApiError>;

    async fn create_workflow(&self, workflow: Value) -> std::result::Result<Value, ApiError>;

    async fn update_workflow(
        &self,
        workflow_id: &str,
        workflow: Value,
    ) -> std::result::Result<Value, ApiError>;

    async fn delete_workflow(&self, workflow_id: &str) -> std::result::Result<(), ApiError>;

    async fn activate_workflow(&self, workflow_id: &str) -> std::result::Result<Value, ApiError>;

    async fn deactivate_workflow(&self, workflow_id: &str)
        -> std::result::Result<Value, ApiError>;

    /// Trigger a manual run; returns without waiting for completion.
    async fn execute_workflow(
        &self,
        workflow_id: &str,
        data: Option<Value>,
    ) -> std::result::Result<Value, ApiError>;

    /// Most recent executions matching the query, newest first.
    async fn list_executions(
        &self,
        query: &ExecutionQuery,
    ) -> std::result::Result<Vec<Value>, ApiError>;
}

/// Pooled, retrying client for the platform's versioned REST API.
#[derive(Debug, Clone)]
pub struct RemoteApiClient {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl RemoteApiClient {
    /// Build the client from configuration. The connection pool lives as long
    /// as the client (and its clones).
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url())
            .map_err(|e| Error::config(format!("invalid remote base URL: {e}")))?;

        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| Error::config("API key contains characters not allowed in a header"))?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            base_url = %base_url,
            timeout_secs = config.timeout.as_secs(),
            "remote client initialized"
        );

        Ok(Self {
            http,
            base_url,
            retry: RetryPolicy::default().with_max_attempts(config.max_retries),
        })
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Issue one logical call: `method` on the path built from `segments`
    /// (each percent-encoded), with retries. Success yields the parsed JSON
    /// body (`{}` for empty bodies); failure yields the last error seen.
    pub async fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> std::result::Result<Value, ApiError> {
        let url = self.endpoint(segments)?;
        let path = format!("/{}", segments.join("/"));
        let mut attempt: u32 = 1;

        loop {
            let started = Instant::now();
            let outcome = self.send_once(method.clone(), url.clone(), query, body).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(value) => {
                    tracing::info!(
                        method = %method,
                        path = %path,
                        attempt,
                        outcome = "ok",
                        latency_ms,
                        "remote call"
                    );
                    return Ok(value);
                }
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        method = %method,
                        path = %path,
                        attempt,
                        outcome = "retry",
                        kind = %err.kind(),
                        status = err.status(),
                        latency_ms,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "remote call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::error!(
                        method = %method,
                        path = %path,
                        attempt,
                        outcome = "error",
                        kind = %err.kind(),
                        status = err.status(),
                        latency_ms,
                        error = %err,
                        "remote call"
                    );
                    return Err(err);
                }
            }
        }
    }

    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Unknown {
                status: None,
                message: format!("base URL '{}' cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> std::result::Result<Value, ApiError> {
        let mut request = self.http.request(method, url).query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        if status.is_success() {
            if status == reqwest::StatusCode::NO_CONTENT || bytes.is_empty() {
                return Ok(json!({}));
            }
            return serde_json::from_slice(&bytes).map_err(|e| ApiError::Unknown {
                status: Some(status.as_u16()),
                message: format!("invalid JSON in response: {e}"),
            });
        }

        let message = serde_json::from_slice::<Value>(&bytes)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| {
                let text = String::from_utf8_lossy(&bytes).trim().to_string();
                if text.is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                } else {
                    text
                }
            });

        Err(ApiError::from_status(status.as_u16(), message))
    }

    /// Follow `nextCursor` until the listing is exhausted or `limit` items
    /// were collected.
    async fn collect_pages(
        &self,
        segments: &[&str],
        base_query: Vec<(&str, String)>,
        limit: Option<usize>,
    ) -> std::result::Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page_size = match limit {
                Some(limit) => PAGE_SIZE.min(limit - items.len()),
                None => PAGE_SIZE,
            };
            let mut query = base_query.clone();
            query.push(("limit", page_size.to_string()));
            if let Some(cursor) = &cursor {
                query.push(("cursor", cursor.clone()));
            }

            let page = self.request(Method::GET, segments, &query, None).await?;
            let next = models::next_cursor(&page);
            items.extend(models::extract_list(page));

            if let Some(limit) = limit {
                if items.len() >= limit {
                    items.truncate(limit);
                    break;
                }
            }
            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl WorkflowApi for RemoteApiClient {
    async fn health_check(&self) -> std::result::Result<Value, ApiError> {
        self.request(Method::GET, &["workflows"], &[("limit", "1".to_string())], None)
            .await?;
        Ok(json!({
            "status": "healthy",
            "url": self.base_url.as_str(),
            "message": "Successfully connected to the remote platform",
        }))
    }

    async fn list_workflows(&self) -> std::result::Result<Vec<Value>, ApiError> {
        let workflows = self.collect_pages(&["workflows"], Vec::new(), None).await?;
        tracing::debug!(count = workflows.len(), "listed workflows");
        Ok(workflows)
    }

    async fn get_workflow(&self, workflow_id: &str) -> std::result::Result<Value, ApiError> {
        self.request(Method::GET, &["workflows", workflow_id], &[], None)
            .await
    }

    async fn create_workflow(&self, workflow: Value) -> std::result::Result<Value, ApiError> {
        self.request(Method::POST, &["workflows"], &[], Some(&workflow))
            .await
    }

    async fn update_workflow(
        &self,
        workflow_id: &str,
        workflow: Value,
    ) -> std::result::Result<Value, ApiError> {
        self.request(Method::PUT, &["workflows", workflow_id], &[], Some(&workflow))
            .await
    }

    async fn delete_workflow(&self, workflow_id: &str) -> std::result::Result<(), ApiError> {
        self.request(Method::DELETE, &["workflows", workflow_id], &[], None)
            .await?;
        Ok(())
    }

    async fn activate_workflow(&self, workflow_id: &str) -> std::result::Result<Value, ApiError> {
        self.request(Method::POST, &["workflows", workflow_id, "activate"], &[], None)
            .await
    }

    async fn deactivate_workflow(
        &self,
        workflow_id: &str,
    ) -> std::result::Result<Value, ApiError> {
        self.request(Method::POST, &["workflows", workflow_id, "deactivate"], &[], None)
            .await
    }

    async fn execute_workflow(
        &self,
        workflow_id: &str,
        data: Option<Value>,
    ) -> std::result::Result<Value, ApiError> {
        let payload = match data {
            Some(data) => json!({ "data": data }),
            None => json!({}),
        };
        self.request(
            Method::POST,
            &["workflows", workflow_id, "execute"],
            &[],
            Some(&payload),
        )
        .await
    }

    async fn list_executions(
        &self,
        query: &ExecutionQuery,
    ) -> std::result::Result<Vec<Value>, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(workflow_id) = &query.workflow_id {
            params.push(("workflowId", workflow_id.clone()));
        }
        if let Some(status) = query.status {
            params.push(("status", status.as_str().to_string()));
        }
        if query.include_data {
            params.push(("includeData", "true".to_string()));
        }

        let executions = self
            .collect_pages(&["executions"], params, Some(query.limit.max(1)))
            .await?;
        tracing::debug!(count = executions.len(), "listed executions");
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing_test::traced_test;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn client_for(base_url: String) -> RemoteApiClient {
        let config = RemoteConfig {
            base_url,
            api_key: "test-api-key".to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        };
        RemoteApiClient::new(&config)
            .unwrap()
            .with_retry_policy(
                RetryPolicy::default()
                    .with_max_attempts(3)
                    .with_base_delay(Duration::from_millis(1)),
            )
    }

    #[tokio::test]
    #[traced_test]
    async fn test_one_log_event_per_attempt() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/api/v1/workflows/{id}",
            get(move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        (StatusCode::BAD_GATEWAY, "upstream down".to_string())
                    } else {
                        (StatusCode::OK, r#"{"id":"1","name":"A"}"#.to_string())
                    }
                }
            }),
        );
        let client = client_for(serve(router).await);

        let workflow = client.get_workflow("1").await.unwrap();
        assert_eq!(workflow["name"], "A");
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        logs_assert(|lines: &[&str]| {
            let attempts = lines.iter().filter(|l| l.contains("remote call")).count();
            if attempts == 3 {
                Ok(())
            } else {
                Err(format!("expected 3 remote call events, saw {attempts}"))
            }
        });
        assert!(logs_contain("outcome=\"retry\""));
        assert!(logs_contain("outcome=\"ok\""));
    }

    #[tokio::test]
    async fn test_path_segments_are_encoded() {
        let client = client_for("http://localhost:5678".to_string());
        let url = client.endpoint(&["workflows", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5678/api/v1/workflows/a%20b%2Fc");
    }
}
