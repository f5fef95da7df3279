//! Workflow health aggregation.
//!
//! Pure computation over a workflow's metadata and a window of its recent
//! executions: counts, rates, a qualitative verdict and operator-facing
//! recommendations. No I/O; the operation layer fetches the inputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ExecutionRecord, ExecutionStatus};

// =============================================================================
// Configuration
// =============================================================================

/// Success-rate thresholds (percent) for each verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Minimum success rate for `excellent` (default: 95).
    pub excellent: f64,
    /// Minimum success rate for `good` (default: 80).
    pub good: f64,
    /// Minimum success rate for `fair` (default: 50).
    pub fair: f64,
    /// Error rate above which the error rate is called high (default: 20).
    pub high_error_rate: f64,
    /// Error rate above which the error rate is called moderate (default: 5).
    pub moderate_error_rate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            excellent: 95.0,
            good: 80.0,
            fair: 50.0,
            high_error_rate: 20.0,
            moderate_error_rate: 5.0,
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// Qualitative verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

/// Counts and rates over the analyzed window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total_executions: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub waiting_count: usize,
    pub running_count: usize,
    /// Percent, one decimal place.
    pub success_rate: f64,
    /// Percent, one decimal place.
    pub error_rate: f64,
    pub analyzed_executions: usize,
}

impl ExecutionStats {
    pub fn from_records(records: &[ExecutionRecord], analyzed: usize) -> Self {
        let count = |status: ExecutionStatus| records.iter().filter(|r| r.status == status).count();
        let total = records.len();
        let success_count = count(ExecutionStatus::Success);
        let error_count = count(ExecutionStatus::Error);

        Self {
            total_executions: total,
            success_count,
            error_count,
            waiting_count: count(ExecutionStatus::Waiting),
            running_count: count(ExecutionStatus::Running),
            success_rate: percent(success_count, total),
            error_rate: percent(error_count, total),
            analyzed_executions: analyzed,
        }
    }
}

/// `part / total * 100`, rounded to one decimal; 0 when `total` is 0.
pub fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 1000.0).round() / 10.0
}

/// Full health report for one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub workflow_id: String,
    pub workflow_name: String,
    pub is_active: bool,
    pub health_status: HealthStatus,
    pub statistics: ExecutionStats,
    pub recommendations: Vec<String>,
}

// =============================================================================
// Aggregator
// =============================================================================

/// Derives [`HealthReport`]s using a fixed set of thresholds.
#[derive(Debug, Clone, Default)]
pub struct HealthAggregator {
    thresholds: HealthThresholds,
}

impl HealthAggregator {
    /// Verdict for a success rate over `total` executions.
    pub fn classify(&self, success_rate: f64, total: usize) -> HealthStatus {
        if total == 0 {
            HealthStatus::Unknown
        } else if success_rate >= self.thresholds.excellent {
            HealthStatus::Excellent
        } else if success_rate >= self.thresholds.good {
            HealthStatus::Good
        } else if success_rate >= self.thresholds.fair {
            HealthStatus::Fair
        } else {
            HealthStatus::Poor
        }
    }

    /// Build the report for `workflow` (raw remote JSON) from its executions.
    ///
    /// `analyzed` is the window size that was requested.
    pub fn assess(
        &self,
        workflow_id: &str,
        workflow: &Value,
        executions: &[ExecutionRecord],
        analyzed: usize,
    ) -> HealthReport {
        let statistics = ExecutionStats::from_records(executions, analyzed);
        let is_active = crate::client::models::is_active(workflow);
        let health_status = self.classify(statistics.success_rate, statistics.total_executions);
        let recommendations = self.recommend(&statistics, health_status, is_active);

        HealthReport {
            workflow_id: workflow_id.to_string(),
            workflow_name: workflow
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            is_active,
            health_status,
            statistics,
            recommendations,
        }
    }

    fn recommend(
        &self,
        stats: &ExecutionStats,
        status: HealthStatus,
        is_active: bool,
    ) -> Vec<String> {
        let mut out = Vec::new();

        if stats.total_executions == 0 {
            out.push(if is_active {
                "No execution history. Verify the workflow's triggers are configured correctly."
            } else {
                "No execution history and the workflow is inactive. Activate it to start processing."
            }
            .to_string());
        }

        if stats.error_rate > self.thresholds.high_error_rate {
            out.push(format!(
                "High error rate ({}%). Review the workflow logs and fix failing nodes.",
                stats.error_rate
            ));
        } else if stats.error_rate > self.thresholds.moderate_error_rate {
            out.push(format!(
                "Moderate error rate ({}%). Investigate recent failures.",
                stats.error_rate
            ));
        }

        if !is_active && stats.error_count > 0 {
            out.push(
                "Workflow is inactive with recent errors. Review the failures before reactivating."
                    .to_string(),
            );
        }

        if status == HealthStatus::Excellent {
            out.push("Workflow is running smoothly.".to_string());
        }

        if out.is_empty() {
            out.push("Workflow health is acceptable. Continue monitoring for issues.".to_string());
        }

        out
    }
}

// =============================================================================
// Tests
// =============================================================================
