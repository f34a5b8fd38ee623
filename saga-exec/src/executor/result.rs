use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use saga_core::{Details, NotFoundError, StepStatus};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// Outcome of one step, as recorded in `details.steps`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StepReport {
    pub status: StepStatus,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CompensationReport {
    /// Steps considered for compensation, most recently completed first.
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub compensated: Vec<String>,
    #[serde(default)]
    pub skipped: Vec<String>,
    /// Step name to compensation error.
    #[serde(default)]
    pub failed: BTreeMap<String, String>,
}

impl CompensationReport {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Typed view of `ExecutionResult::details`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub trace_id: String,
    pub saga: String,
    pub steps: BTreeMap<String, StepReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(default)]
    pub failed_steps: Vec<String>,
    #[serde(default)]
    pub compensation: CompensationReport,
    #[serde(default)]
    pub cancelled: bool,
}

impl RunReport {
    pub fn to_details(&self) -> Details {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => Details::new(),
            Err(e) => {
                tracing::warn!(error = %e, run_id = %self.run_id, "failed to encode run report");
                Details::new()
            }
        }
    }

    pub fn from_details(details: &Details) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(details.clone()))
    }

    pub fn step_status(&self, step: &str) -> Option<StepStatus> {
        self.steps.get(step).map(|s| s.status)
    }
}
