//! Views over the remote platform's JSON payloads.
//!
//! The client hands raw `serde_json::Value`s to the operation layer; these
//! types pull out the handful of fields the bridge reasons about and are
//! lenient about shape (ids as strings or numbers, tags as strings or
//! `{name}` objects, timestamps optional).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unwrap a list response, accepting `{"data": [...]}` or a bare array.
pub fn extract_list(response: Value) -> Vec<Value> {
    match response {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Pagination cursor of a list response, if another page exists.
pub fn next_cursor(response: &Value) -> Option<String> {
    response
        .get("nextCursor")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn id_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn opt_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// Tag names of a workflow.
pub fn tag_names(workflow: &Value) -> Vec<String> {
    workflow
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(|tag| match tag {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => {
                        obj.get("name").and_then(Value::as_str).map(str::to_string)
                    }
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Activation flag, `false` when absent.
pub fn is_active(workflow: &Value) -> bool {
    workflow.get("active").and_then(Value::as_bool).unwrap_or(false)
}

/// Compact listing form of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: Option<String>,
    pub name: Option<String>,
    pub active: bool,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl WorkflowSummary {
    pub fn from_value(workflow: &Value) -> Self {
        Self {
            id: id_string(workflow.get("id")),
            name: opt_string(workflow.get("name")),
            active: is_active(workflow),
            tags: tag_names(workflow),
            created_at: opt_string(workflow.get("createdAt")),
            updated_at: opt_string(workflow.get("updatedAt")),
        }
    }
}

/// Status of one execution as seen by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Running,
    Waiting,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Waiting => "waiting",
        }
    }

    /// Derive the status of a raw execution.
    ///
    /// An explicit `status` field wins. Older payloads only carry
    /// `finished`/`stoppedAt`: finished means success, stopped without
    /// finishing means error, anything else is still running.
    pub fn derive(execution: &Value) -> Self {
        if let Some(status) = execution.get("status").and_then(Value::as_str) {
            match status {
                "success" => return ExecutionStatus::Success,
                "error" | "crashed" | "failed" | "canceled" | "cancelled" => {
                    return ExecutionStatus::Error
                }
                "running" | "new" => return ExecutionStatus::Running,
                "waiting" => return ExecutionStatus::Waiting,
                _ => {}
            }
        }

        let finished = execution
            .get("finished")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let stopped = execution
            .get("stoppedAt")
            .map(|v| !v.is_null())
            .unwrap_or(false);

        if finished {
            ExecutionStatus::Success
        } else if stopped {
            ExecutionStatus::Error
        } else {
            ExecutionStatus::Running
        }
    }
}

/// One execution, read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRecord {
    pub id: Option<String>,
    pub workflow_id: Option<String>,
    pub workflow_name: Option<String>,
    pub status: ExecutionStatus,
    pub mode: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_data: Option<Value>,
}

impl ExecutionRecord {
    pub fn from_value(execution: &Value) -> Self {
        Self {
            id: id_string(execution.get("id")),
            workflow_id: id_string(execution.get("workflowId")),
            workflow_name: execution
                .get("workflowData")
                .and_then(|w| w.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
            status: ExecutionStatus::derive(execution),
            mode: opt_string(execution.get("mode")),
            started_at: opt_string(execution.get("startedAt")),
            finished_at: opt_string(execution.get("stoppedAt")),
            finished: execution
                .get("finished")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            data: execution.get("data").filter(|d| !d.is_null()).cloned(),
            execution_data: execution
                .get("executionData")
                .filter(|d| !d.is_null())
                .cloned(),
        }
    }

    /// Start time, when present and RFC 3339.
    pub fn started_at_utc(&self) -> Option<DateTime<Utc>> {
        self.started_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Filters for listing executions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionQuery {
    pub workflow_id: Option<String>,
    /// Server-side status filter; `None` means all.
    pub status: Option<ExecutionStatus>,
    pub limit: usize,
    pub include_data: bool,
}

impl Default for ExecutionQuery {
    fn default() -> Self {
        Self {
            workflow_id: None,
            status: None,
            limit: 20,
            include_data: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_list_shapes() {
        assert_eq!(extract_list(json!({"data": [1, 2]})).len(), 2);
        assert_eq!(extract_list(json!([1, 2, 3])).len(), 3);
        assert!(extract_list(json!({"items": [1]})).is_empty());
        assert!(extract_list(json!("nope")).is_empty());
    }

    #[test]
    fn test_next_cursor() {
        assert_eq!(next_cursor(&json!({"nextCursor": "abc"})).as_deref(), Some("abc"));
        assert_eq!(next_cursor(&json!({"nextCursor": null})), None);
        assert_eq!(next_cursor(&json!({"nextCursor": ""})), None);
    }

    #[test]
    fn test_summary_tag_forms() {
        let wf = json!({
            "id": 7,
            "name": "Email Sync",
            "active": true,
            "tags": ["email", {"id": "t1", "name": "sync"}, 3],
            "createdAt": "2024-01-01T00:00:00.000Z"
        });
        let summary = WorkflowSummary::from_value(&wf);
        assert_eq!(summary.id.as_deref(), Some("7"));
        assert_eq!(summary.tags, vec!["email", "sync"]);
        assert!(summary.active);
        assert_eq!(summary.updated_at, None);
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(
            ExecutionStatus::derive(&json!({"status": "success"})),
            ExecutionStatus::Success
        );
        assert_eq!(ExecutionStatus::derive(&json!({"status": "crashed"})), ExecutionStatus::Error);
        assert_eq!(
            ExecutionStatus::derive(&json!({"status": "waiting"})),
            ExecutionStatus::Waiting
        );
        assert_eq!(ExecutionStatus::derive(&json!({"status": "new"})), ExecutionStatus::Running);
        assert_eq!(
            ExecutionStatus::derive(
                &json!({"finished": true, "stoppedAt": "2024-01-01T00:00:05Z"})
            ),
            ExecutionStatus::Success
        );
        assert_eq!(
            ExecutionStatus::derive(
                &json!({"finished": false, "stoppedAt": "2024-01-01T00:00:05Z"})
            ),
            ExecutionStatus::Error
        );
        assert_eq!(ExecutionStatus::derive(&json!({"finished": false})), ExecutionStatus::Running);
    }

    #[test]
    fn test_execution_record_fields() {
        let record = ExecutionRecord::from_value(&json!({
            "id": "42",
            "workflowId": "7",
            "workflowData": {"name": "Email Sync"},
            "mode": "manual",
            "status": "error",
            "startedAt": "2024-03-01T10:00:00.000Z",
            "stoppedAt": "2024-03-01T10:00:02.000Z",
            "data": null,
            "executionData": {"nodes": []}
        }));
        assert_eq!(record.id.as_deref(), Some("42"));
        assert_eq!(record.workflow_name.as_deref(), Some("Email Sync"));
        assert_eq!(record.status, ExecutionStatus::Error);
        assert!(record.data.is_none());
        assert_eq!(record.execution_data, Some(json!({"nodes": []})));
        assert_eq!(
            record.started_at_utc().unwrap().to_rfc3339(),
            "2024-03-01T10:00:00+00:00"
        );
    }
}
