//! The closed set of workflow operations exposed as tools.
//!
//! Each [`Operation`] owns its [`ToolSpec`] and an input record decoded from
//! the validated arguments. Execution is a stateless adapter over
//! [`WorkflowApi`]; every outcome is returned as a [`ResultEnvelope`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use super::health::HealthAggregator;
use super::schema::{ParamDef, ParamType, ToolSpec, ValidationError};
use crate::client::models::{is_active, tag_names};
use crate::client::{
    ApiError, ExecutionQuery, ExecutionRecord, ExecutionStatus, WorkflowApi, WorkflowSummary,
};
use crate::envelope::{ErrorKind, ResultEnvelope};

/// Failure inside an operation, before it is enveloped.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<OperationError> for ResultEnvelope {
    fn from(err: OperationError) -> Self {
        match err {
            OperationError::Validation(e) => e.into(),
            OperationError::Api(e) => e.into(),
            OperationError::Encode(e) => {
                ResultEnvelope::err(ErrorKind::UnknownError, e.to_string())
            }
        }
    }
}

type OpResult = Result<Value, OperationError>;

/// Every tool the bridge offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListWorkflows,
    GetWorkflowDetails,
    CreateWorkflow,
    UpdateWorkflow,
    ActivateWorkflow,
    DeactivateWorkflow,
    DeleteWorkflow,
    SearchWorkflows,
    ExecuteWorkflow,
    GetExecutions,
    GetWorkflowHealth,
}

impl Operation {
    pub const ALL: [Operation; 11] = [
        Operation::ListWorkflows,
        Operation::GetWorkflowDetails,
        Operation::CreateWorkflow,
        Operation::UpdateWorkflow,
        Operation::ActivateWorkflow,
        Operation::DeactivateWorkflow,
        Operation::DeleteWorkflow,
        Operation::SearchWorkflows,
        Operation::ExecuteWorkflow,
        Operation::GetExecutions,
        Operation::GetWorkflowHealth,
    ];

    /// Tool name on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Operation::ListWorkflows => "list_workflows",
            Operation::GetWorkflowDetails => "get_workflow_details",
            Operation::CreateWorkflow => "create_workflow",
            Operation::UpdateWorkflow => "update_workflow",
            Operation::ActivateWorkflow => "activate_workflow",
            Operation::DeactivateWorkflow => "deactivate_workflow",
            Operation::DeleteWorkflow => "delete_workflow",
            Operation::SearchWorkflows => "search_workflows",
            Operation::ExecuteWorkflow => "execute_workflow",
            Operation::GetExecutions => "get_executions",
            Operation::GetWorkflowHealth => "get_workflow_health",
        }
    }

    /// Tool metadata and parameter schema.
    pub fn spec(self) -> ToolSpec {
        let workflow_id = |verb: &str| {
            ParamDef::required(
                "workflow_id",
                ParamType::String,
                &format!("ID of the workflow to {verb}"),
            )
        };

        match self {
            Operation::ListWorkflows => ToolSpec::new(
                self.name(),
                "List all workflows. Filter by activation status to see only active or inactive workflows.",
                vec![ParamDef::optional(
                    "status",
                    ParamType::one_of(&["active", "inactive", "all"]),
                    "Filter workflows by activation status",
                )
                .with_default(json!("all"))],
            ),
            Operation::GetWorkflowDetails => ToolSpec::new(
                self.name(),
                "Get detailed information about a workflow including its nodes, connections and settings.",
                vec![workflow_id("retrieve")],
            ),
            Operation::CreateWorkflow => ToolSpec::new(
                self.name(),
                "Create a new workflow. A name is required; nodes, connections and settings are optional.",
                vec![
                    ParamDef::required("name", ParamType::String, "Name of the workflow"),
                    ParamDef::optional("nodes", ParamType::Array, "Array of node definitions")
                        .with_default(json!([])),
                    ParamDef::optional(
                        "connections",
                        ParamType::Object,
                        "Node connections definition",
                    )
                    .with_default(json!({})),
                    ParamDef::optional("settings", ParamType::Object, "Workflow settings")
                        .with_default(json!({})),
                    ParamDef::optional(
                        "tags",
                        ParamType::StringList,
                        "Tags for organizing workflows",
                    )
                    .with_default(json!([])),
                    ParamDef::optional(
                        "active",
                        ParamType::Boolean,
                        "Whether to activate the workflow immediately",
                    )
                    .with_default(json!(false)),
                ],
            ),
            Operation::UpdateWorkflow => ToolSpec::new(
                self.name(),
                "Update an existing workflow. Only the fields provided are changed.",
                vec![
                    workflow_id("update"),
                    ParamDef::optional("name", ParamType::String, "New name for the workflow"),
                    ParamDef::optional(
                        "nodes",
                        ParamType::Array,
                        "Updated array of node definitions",
                    ),
                    ParamDef::optional(
                        "connections",
                        ParamType::Object,
                        "Updated node connections",
                    ),
                    ParamDef::optional("settings", ParamType::Object, "Updated workflow settings"),
                    ParamDef::optional("tags", ParamType::StringList, "Updated tags"),
                    ParamDef::optional("active", ParamType::Boolean, "Updated activation status"),
                ],
            ),
            Operation::ActivateWorkflow => ToolSpec::new(
                self.name(),
                "Activate a workflow so it starts processing triggers and webhooks.",
                vec![workflow_id("activate")],
            ),
            Operation::DeactivateWorkflow => ToolSpec::new(
                self.name(),
                "Deactivate a workflow so it stops processing triggers and webhooks.",
                vec![workflow_id("deactivate")],
            ),
            Operation::DeleteWorkflow => ToolSpec::new(
                self.name(),
                "Permanently delete a workflow. This cannot be undone and requires confirm=true.",
                vec![
                    workflow_id("delete"),
                    ParamDef::required(
                        "confirm",
                        ParamType::Boolean,
                        "Confirmation flag to prevent accidental deletion",
                    ),
                ],
            ),
            Operation::SearchWorkflows => ToolSpec::new(
                self.name(),
                "Search workflows by name or tag (case-insensitive substring match).",
                vec![
                    ParamDef::required(
                        "query",
                        ParamType::String,
                        "Text to match against workflow names and tags",
                    ),
                    ParamDef::optional(
                        "active_only",
                        ParamType::Boolean,
                        "Only return active workflows",
                    )
                    .with_default(json!(false)),
                ],
            ),
            Operation::ExecuteWorkflow => ToolSpec::new(
                self.name(),
                "Manually trigger a workflow run. Returns as soon as the run is accepted.",
                vec![
                    workflow_id("execute"),
                    ParamDef::optional(
                        "data",
                        ParamType::Object,
                        "Optional input data passed to the workflow",
                    ),
                ],
            ),
            Operation::GetExecutions => ToolSpec::new(
                self.name(),
                "Get execution history, optionally filtered by workflow and status.",
                vec![
                    ParamDef::optional(
                        "workflow_id",
                        ParamType::String,
                        "Filter executions by workflow ID",
                    ),
                    ParamDef::optional(
                        "status",
                        ParamType::one_of(&["success", "error", "waiting", "all"]),
                        "Filter executions by status",
                    )
                    .with_default(json!("all")),
                    ParamDef::optional(
                        "limit",
                        ParamType::Integer,
                        "Maximum number of executions to return",
                    )
                    .with_default(json!(20))
                    .with_range(1, 250),
                    ParamDef::optional(
                        "include_data",
                        ParamType::Boolean,
                        "Include full execution data",
                    )
                    .with_default(json!(false)),
                ],
            ),
            Operation::GetWorkflowHealth => ToolSpec::new(
                self.name(),
                "Get health statistics for a workflow based on its recent execution history.",
                vec![
                    workflow_id("check"),
                    ParamDef::optional(
                        "limit",
                        ParamType::Integer,
                        "Number of recent executions to analyze",
                    )
                    .with_default(json!(100))
                    .with_range(10, 1000),
                ],
            ),
        }
    }

    /// Run the operation on already validated arguments.
    pub async fn execute(self, api: &dyn WorkflowApi, args: Map<String, Value>) -> ResultEnvelope {
        match self.run(api, args).await {
            Ok(data) => ResultEnvelope::ok(data),
            Err(err) => {
                tracing::debug!(tool = self.name(), error = %err, "operation failed");
                err.into()
            }
        }
    }

    async fn run(self, api: &dyn WorkflowApi, args: Map<String, Value>) -> OpResult {
        match self {
            Operation::ListWorkflows => list_workflows(api, decode(args)?).await,
            Operation::GetWorkflowDetails => get_workflow_details(api, decode(args)?).await,
            Operation::CreateWorkflow => create_workflow(api, decode(args)?).await,
            Operation::UpdateWorkflow => update_workflow(api, decode(args)?).await,
            Operation::ActivateWorkflow => set_active(api, decode(args)?, true).await,
            Operation::DeactivateWorkflow => set_active(api, decode(args)?, false).await,
            Operation::DeleteWorkflow => delete_workflow(api, decode(args)?).await,
            Operation::SearchWorkflows => search_workflows(api, decode(args)?).await,
            Operation::ExecuteWorkflow => execute_workflow(api, decode(args)?).await,
            Operation::GetExecutions => get_executions(api, decode(args)?).await,
            Operation::GetWorkflowHealth => get_workflow_health(api, decode(args)?).await,
        }
    }
}

/// Decode validated arguments into an input record.
fn decode<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T, OperationError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| ValidationError::single("arguments", e.to_string()).into())
}

// =============================================================================
// Input records
// =============================================================================

#[derive(Debug, Deserialize)]
struct ListWorkflowsInput {
    #[serde(default = "all")]
    status: String,
}

#[derive(Debug, Deserialize)]
struct WorkflowIdInput {
    workflow_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateWorkflowInput {
    name: String,
    #[serde(default)]
    nodes: Vec<Value>,
    #[serde(default)]
    connections: Map<String, Value>,
    #[serde(default)]
    settings: Map<String, Value>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    active: bool,
}

#[derive(Debug, Deserialize)]
struct UpdateWorkflowInput {
    workflow_id: String,
    name: Option<String>,
    nodes: Option<Vec<Value>>,
    connections: Option<Map<String, Value>>,
    settings: Option<Map<String, Value>>,
    tags: Option<Vec<String>>,
    active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DeleteWorkflowInput {
    workflow_id: String,
    confirm: bool,
}

#[derive(Debug, Deserialize)]
struct SearchWorkflowsInput {
    query: String,
    #[serde(default)]
    active_only: bool,
}

#[derive(Debug, Deserialize)]
struct ExecuteWorkflowInput {
    workflow_id: String,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GetExecutionsInput {
    workflow_id: Option<String>,
    #[serde(default = "all")]
    status: String,
    #[serde(default = "default_execution_limit")]
    limit: usize,
    #[serde(default)]
    include_data: bool,
}

#[derive(Debug, Deserialize)]
struct WorkflowHealthInput {
    workflow_id: String,
    #[serde(default = "default_health_window")]
    limit: usize,
}

fn all() -> String {
    "all".to_string()
}

fn default_execution_limit() -> usize {
    20
}

fn default_health_window() -> usize {
    100
}

// =============================================================================
// Shared helpers
// =============================================================================

fn name_of(workflow: &Value) -> &str {
    workflow.get("name").and_then(Value::as_str).unwrap_or("Unknown")
}

/// Case-insensitive substring match on the name or any tag.
pub fn matches_query(workflow: &Value, query: &str) -> bool {
    let needle = query.to_lowercase();
    name_of(workflow).to_lowercase().contains(&needle)
        || tag_names(workflow)
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle))
}

fn summaries<'a>(workflows: impl IntoIterator<Item = &'a Value>) -> Vec<WorkflowSummary> {
    workflows.into_iter().map(WorkflowSummary::from_value).collect()
}

// =============================================================================
// Operations
// =============================================================================

async fn list_workflows(api: &dyn WorkflowApi, input: ListWorkflowsInput) -> OpResult {
    let workflows = api.list_workflows().await?;
    let wanted: Option<bool> = match input.status.as_str() {
        "active" => Some(true),
        "inactive" => Some(false),
        _ => None,
    };

    let selected: Vec<WorkflowSummary> = summaries(
        workflows
            .iter()
            .filter(|w| wanted.map_or(true, |active| is_active(w) == active)),
    );

    Ok(json!({
        "total_count": selected.len(),
        "filter": input.status,
        "workflows": selected,
    }))
}

async fn get_workflow_details(api: &dyn WorkflowApi, input: WorkflowIdInput) -> OpResult {
    let workflow = api.get_workflow(&input.workflow_id).await?;
    let nodes = workflow.get("nodes").cloned().unwrap_or_else(|| json!([]));
    let node_count = nodes.as_array().map_or(0, Vec::len);

    Ok(json!({
        "id": workflow.get("id"),
        "name": workflow.get("name"),
        "active": is_active(&workflow),
        "tags": tag_names(&workflow),
        "nodes": nodes,
        "connections": workflow.get("connections").cloned().unwrap_or_else(|| json!({})),
        "settings": workflow.get("settings").cloned().unwrap_or_else(|| json!({})),
        "static_data": workflow.get("staticData"),
        "created_at": workflow.get("createdAt"),
        "updated_at": workflow.get("updatedAt"),
        "node_count": node_count,
        "version_id": workflow.get("versionId"),
    }))
}

async fn create_workflow(api: &dyn WorkflowApi, input: CreateWorkflowInput) -> OpResult {
    let body = json!({
        "name": input.name,
        "nodes": input.nodes,
        "connections": input.connections,
        "settings": input.settings,
        "tags": input.tags,
        "active": input.active,
    });
    let created = api.create_workflow(body).await?;
    tracing::info!(workflow_id = ?created.get("id"), "workflow created");

    Ok(json!({
        "id": created.get("id"),
        "name": created.get("name"),
        "active": created.get("active"),
        "created_at": created.get("createdAt"),
        "message": format!("Successfully created workflow '{}'", name_of(&created)),
    }))
}

async fn update_workflow(api: &dyn WorkflowApi, input: UpdateWorkflowInput) -> OpResult {
    let current = api.get_workflow(&input.workflow_id).await?;
    let keep = |key: &str, fallback: Value| current.get(key).cloned().unwrap_or(fallback);

    let body = json!({
        "name": input.name.map_or_else(|| keep("name", Value::Null), Value::from),
        "nodes": input.nodes.map_or_else(|| keep("nodes", json!([])), Value::from),
        "connections": input
            .connections
            .map_or_else(|| keep("connections", json!({})), Value::Object),
        "settings": input.settings.map_or_else(|| keep("settings", json!({})), Value::Object),
        "tags": input.tags.map_or_else(|| keep("tags", json!([])), Value::from),
        "active": input.active.map_or_else(|| Value::Bool(is_active(&current)), Value::Bool),
    });

    let updated = api.update_workflow(&input.workflow_id, body).await?;
    tracing::info!(workflow_id = %input.workflow_id, "workflow updated");

    Ok(json!({
        "id": updated.get("id"),
        "name": updated.get("name"),
        "active": updated.get("active"),
        "updated_at": updated.get("updatedAt"),
        "message": format!("Successfully updated workflow '{}'", name_of(&updated)),
    }))
}

/// Activation is idempotent: the remote toggle is only called when the
/// current state differs from the target.
async fn set_active(api: &dyn WorkflowApi, input: WorkflowIdInput, target: bool) -> OpResult {
    let verb = if target { "activated" } else { "deactivated" };
    let current = api.get_workflow(&input.workflow_id).await?;

    if is_active(&current) == target {
        return Ok(json!({
            "id": current.get("id").cloned().unwrap_or_else(|| json!(input.workflow_id)),
            "name": current.get("name"),
            "active": target,
            "changed": false,
            "message": format!(
                "Workflow '{}' is already {}",
                name_of(&current),
                if target { "active" } else { "inactive" }
            ),
        }));
    }

    let workflow = if target {
        api.activate_workflow(&input.workflow_id).await?
    } else {
        api.deactivate_workflow(&input.workflow_id).await?
    };
    tracing::info!(workflow_id = %input.workflow_id, active = target, "workflow {verb}");

    Ok(json!({
        "id": workflow.get("id").cloned().unwrap_or_else(|| json!(input.workflow_id)),
        "name": workflow.get("name").or_else(|| current.get("name")),
        "active": workflow.get("active").and_then(Value::as_bool).unwrap_or(target),
        "changed": true,
        "message": format!("Successfully {} workflow '{}'", verb, name_of(&current)),
    }))
}

async fn delete_workflow(api: &dyn WorkflowApi, input: DeleteWorkflowInput) -> OpResult {
    if !input.confirm {
        return Err(ValidationError::single(
            "confirm",
            "deletion requires explicit confirmation, set it to true",
        )
        .into());
    }

    let workflow = api.get_workflow(&input.workflow_id).await?;
    let name = name_of(&workflow).to_string();
    api.delete_workflow(&input.workflow_id).await?;
    tracing::info!(workflow_id = %input.workflow_id, "workflow deleted");

    Ok(json!({
        "id": input.workflow_id,
        "name": name,
        "deleted": true,
        "message": format!("Successfully deleted workflow '{name}'"),
    }))
}

async fn search_workflows(api: &dyn WorkflowApi, input: SearchWorkflowsInput) -> OpResult {
    let workflows = api.list_workflows().await?;
    let matches: Vec<WorkflowSummary> = summaries(
        workflows
            .iter()
            .filter(|w| !input.active_only || is_active(w))
            .filter(|w| matches_query(w, &input.query)),
    );

    Ok(json!({
        "query": input.query,
        "total_matches": matches.len(),
        "active_filter": input.active_only,
        "workflows": matches,
    }))
}

async fn execute_workflow(api: &dyn WorkflowApi, input: ExecuteWorkflowInput) -> OpResult {
    let execution = api
        .execute_workflow(&input.workflow_id, input.data)
        .await?;
    let status = ExecutionStatus::derive(&execution);
    let execution_id = execution
        .get("id")
        .map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_default();
    tracing::info!(
        workflow_id = %input.workflow_id,
        execution_id = %execution_id,
        "workflow triggered"
    );

    Ok(json!({
        "execution_id": execution.get("id"),
        "workflow_id": input.workflow_id,
        "status": status.as_str(),
        "mode": execution.get("mode").and_then(Value::as_str).unwrap_or("manual"),
        "started_at": execution.get("startedAt"),
        "stopped_at": execution.get("stoppedAt"),
        "finished": execution.get("finished").and_then(Value::as_bool).unwrap_or(false),
        "data": execution.get("data"),
        "message": format!("Workflow execution {}: {}", status.as_str(), execution_id),
    }))
}

async fn get_executions(api: &dyn WorkflowApi, input: GetExecutionsInput) -> OpResult {
    let status = match input.status.as_str() {
        "success" => Some(ExecutionStatus::Success),
        "error" => Some(ExecutionStatus::Error),
        "waiting" => Some(ExecutionStatus::Waiting),
        _ => None,
    };
    let query = ExecutionQuery {
        workflow_id: input.workflow_id.clone(),
        status,
        limit: input.limit,
        include_data: input.include_data,
    };

    let records: Vec<ExecutionRecord> = api
        .list_executions(&query)
        .await?
        .iter()
        .map(ExecutionRecord::from_value)
        .map(|mut record| {
            if !input.include_data {
                record.data = None;
                record.execution_data = None;
            }
            record
        })
        .collect();

    let count = |s: ExecutionStatus| records.iter().filter(|r| r.status == s).count();

    Ok(json!({
        "total_count": records.len(),
        "success_count": count(ExecutionStatus::Success),
        "error_count": count(ExecutionStatus::Error),
        "running_count": count(ExecutionStatus::Running),
        "waiting_count": count(ExecutionStatus::Waiting),
        "filters": {
            "workflow_id": input.workflow_id,
            "status": input.status,
            "limit": input.limit,
            "include_data": input.include_data,
        },
        "executions": records,
    }))
}

async fn get_workflow_health(api: &dyn WorkflowApi, input: WorkflowHealthInput) -> OpResult {
    let workflow = api.get_workflow(&input.workflow_id).await?;
    let query = ExecutionQuery {
        workflow_id: Some(input.workflow_id.clone()),
        limit: input.limit,
        ..ExecutionQuery::default()
    };
    let records: Vec<ExecutionRecord> = api
        .list_executions(&query)
        .await?
        .iter()
        .map(ExecutionRecord::from_value)
        .collect();

    let report =
        HealthAggregator::default().assess(&input.workflow_id, &workflow, &records, input.limit);
    Ok(serde_json::to_value(report)?)
}

// =============================================================================
// Tests
// =============================================================================
