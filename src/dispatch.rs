//! Transport-independent tool dispatch.
//!
//! Both transports hand every call to [`Dispatcher::call`]: rate-limit
//! check, registry lookup, argument validation, execution. Whatever happens,
//! the caller gets a [`ResultEnvelope`] back.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::client::{ApiError, WorkflowApi};
use crate::envelope::ResultEnvelope;
use crate::rate_limiter::RateLimiter;
use crate::tools::ToolRegistry;

/// Shared entry point for tool calls. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    api: Arc<dyn WorkflowApi>,
    limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.registry.len())
            .field("rate_limited", &self.limiter.is_enabled())
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        api: Arc<dyn WorkflowApi>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            registry,
            api,
            limiter,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Check the remote platform.
    pub async fn health(&self) -> Result<Value, ApiError> {
        self.api.health_check().await
    }

    /// Run one tool call end to end.
    pub async fn call(&self, tool: &str, arguments: Value) -> ResultEnvelope {
        let call_id = Uuid::new_v4();
        let span = tracing::info_span!("tool_call", %call_id, tool);
        async move {
            let started = Instant::now();
            let envelope = self.call_inner(tool, arguments).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            match envelope.error() {
                None => tracing::info!(success = true, latency_ms, "tool call finished"),
                Some(error) => tracing::warn!(
                    success = false,
                    kind = %error.kind,
                    latency_ms,
                    message = %error.message,
                    "tool call finished"
                ),
            }
            envelope
        }
        .instrument(span)
        .await
    }

    async fn call_inner(&self, tool: &str, arguments: Value) -> ResultEnvelope {
        if let Err(err) = self.limiter.check().await {
            return err.into();
        }

        let Some(entry) = self.registry.get(tool) else {
            return ResultEnvelope::tool_not_found(tool);
        };

        let args = match entry.spec.validate(&arguments) {
            Ok(args) => args,
            Err(err) => return err.into(),
        };

        entry.operation.execute(self.api.as_ref(), args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockWorkflowApi;
    use crate::envelope::ErrorKind;
    use crate::types::RateLimitSettings;
    use serde_json::json;
    use tracing_test::traced_test;

    fn dispatcher(api: MockWorkflowApi, limiter: RateLimiter) -> Dispatcher {
        Dispatcher::new(
            Arc::new(ToolRegistry::with_all_operations()),
            Arc::new(api),
            Arc::new(limiter),
        )
    }

    #[tokio::test]
    async fn test_unknown_tool_makes_no_remote_call() {
        let mut api = MockWorkflowApi::new();
        api.expect_list_workflows().times(0);
        api.expect_get_workflow().times(0);

        let env = dispatcher(api, RateLimiter::disabled())
            .call("bogus", json!({}))
            .await;
        assert_eq!(env.error_kind(), Some(ErrorKind::NotFound));
        assert_eq!(env.error().unwrap().message, "tool 'bogus' not found");
    }

    #[tokio::test]
    async fn test_validation_before_execution() {
        let mut api = MockWorkflowApi::new();
        api.expect_execute_workflow().times(0);

        let env = dispatcher(api, RateLimiter::disabled())
            .call("execute_workflow", json!({"data": "not an object"}))
            .await;
        assert_eq!(
            env.error().unwrap().message,
            "workflow_id: missing required field; data: expected object, got string"
        );
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_without_remote_call() {
        let mut api = MockWorkflowApi::new();
        api.expect_list_workflows()
            .times(1)
            .returning(|| Ok(vec![]));
        let limiter = RateLimiter::new(&RateLimitSettings {
            enabled: true,
            requests_per_minute: 1,
        });
        let dispatcher = dispatcher(api, limiter);

        assert!(dispatcher.call("list_workflows", Value::Null).await.is_success());
        let env = dispatcher.call("list_workflows", Value::Null).await;
        assert_eq!(env.error_kind(), Some(ErrorKind::RateLimitError));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_call_is_logged_with_tool_name() {
        let mut api = MockWorkflowApi::new();
        api.expect_list_workflows().returning(|| Ok(vec![]));

        dispatcher(api, RateLimiter::disabled())
            .call("list_workflows", json!({"status": "all"}))
            .await;
        assert!(logs_contain("tool call finished"));
        assert!(logs_contain("list_workflows"));
    }
}
