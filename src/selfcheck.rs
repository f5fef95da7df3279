//! Operator self-check (`workflow-bridge --check`).
//!
//! Runs a fixed sequence of checks against the configured remote platform
//! and reports each one. Every check runs even after a failure so the
//! operator sees the whole picture at once.

use serde::Serialize;
use std::fmt;

use crate::client::{ApiErrorKind, ExecutionQuery, WorkflowApi};
use crate::tools::{Operation, ToolRegistry};
use crate::types::Config;

/// Result of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

impl CheckOutcome {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }
}

/// All check outcomes, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct SelfCheckReport {
    pub checks: Vec<CheckOutcome>,
}

impl SelfCheckReport {
    /// `true` when no check failed. Warnings do not fail the check.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.status != CheckStatus::Fail)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

impl fmt::Display for SelfCheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "workflow-bridge self-check")?;
        writeln!(f)?;
        for check in &self.checks {
            let tag = match check.status {
                CheckStatus::Pass => "PASS",
                CheckStatus::Warn => "WARN",
                CheckStatus::Fail => "FAIL",
            };
            writeln!(f, "[{tag}] {}: {}", check.name, check.message)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{} passed, {} warnings, {} failed",
            self.count(CheckStatus::Pass),
            self.count(CheckStatus::Warn),
            self.count(CheckStatus::Fail)
        )
    }
}

/// Run every check.
pub async fn run(
    config: &Config,
    api: &dyn WorkflowApi,
    registry: &ToolRegistry,
) -> SelfCheckReport {
    let mut checks = Vec::with_capacity(5);

    checks.push(CheckOutcome::new(
        "configuration",
        CheckStatus::Pass,
        format!(
            "remote {} (timeout {}s, {} attempts)",
            config.remote.base_url,
            config.remote.timeout.as_secs(),
            config.remote.max_retries
        ),
    ));

    checks.push(match api.health_check().await {
        Ok(_) => CheckOutcome::new("connectivity", CheckStatus::Pass, "remote platform reachable"),
        Err(err) => CheckOutcome::new("connectivity", CheckStatus::Fail, err.to_string()),
    });

    checks.push(match api.list_workflows().await {
        Ok(workflows) => CheckOutcome::new(
            "workflow listing",
            CheckStatus::Pass,
            format!("{} workflows visible", workflows.len()),
        ),
        Err(err) => CheckOutcome::new("workflow listing", CheckStatus::Fail, err.to_string()),
    });

    let query = ExecutionQuery {
        limit: 1,
        ..ExecutionQuery::default()
    };
    checks.push(match api.list_executions(&query).await {
        Ok(_) => CheckOutcome::new(
            "execution access",
            CheckStatus::Pass,
            "execution history readable",
        ),
        Err(err) if err.kind() == ApiErrorKind::Authentication => CheckOutcome::new(
            "execution access",
            CheckStatus::Fail,
            format!("API key cannot read executions: {err}"),
        ),
        Err(err) => CheckOutcome::new("execution access", CheckStatus::Warn, err.to_string()),
    });

    let expected = Operation::ALL.len();
    checks.push(if registry.len() == expected {
        CheckOutcome::new(
            "tool registry",
            CheckStatus::Pass,
            format!("{} tools registered", registry.len()),
        )
    } else {
        CheckOutcome::new(
            "tool registry",
            CheckStatus::Fail,
            format!("{} of {} tools registered", registry.len(), expected),
        )
    });

    SelfCheckReport { checks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, MockWorkflowApi};
    use serde_json::json;

    #[tokio::test]
    async fn test_all_checks_pass() {
        let mut api = MockWorkflowApi::new();
        api.expect_health_check().returning(|| Ok(json!({"status": "healthy"})));
        api.expect_list_workflows().returning(|| Ok(vec![json!({"id": "1"})]));
        api.expect_list_executions()
            .withf(|q| q.limit == 1)
            .returning(|_| Ok(vec![]));

        let report = run(&Config::default(), &api, &ToolRegistry::with_all_operations()).await;
        assert!(report.passed());
        assert_eq!(report.count(CheckStatus::Pass), 5);
        assert!(report.to_string().contains("[PASS] workflow listing: 1 workflows visible"));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_later_checks() {
        let mut api = MockWorkflowApi::new();
        api.expect_health_check()
            .returning(|| Err(ApiError::Connection { message: "refused".into() }));
        api.expect_list_workflows()
            .times(1)
            .returning(|| Err(ApiError::Connection { message: "refused".into() }));
        api.expect_list_executions()
            .times(1)
            .returning(|_| Err(ApiError::from_status(403, "forbidden")));

        let report = run(&Config::default(), &api, &ToolRegistry::new()).await;
        assert!(!report.passed());
        assert_eq!(report.checks.len(), 5);
        assert_eq!(report.count(CheckStatus::Fail), 4);
    }
}
