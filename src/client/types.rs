use serde::{Deserialize, Serialize};
use std::fmt;

/// Fully qualified workflow to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTarget {
    pub project: String,
    pub location: String,
    pub workflow: String,
}

impl WorkflowTarget {
    /// `projects/{p}/locations/{l}/workflows/{w}`
    pub fn resource_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/workflows/{}",
            self.project, self.location, self.workflow
        )
    }
}

/// Opaque execution name returned by the trigger call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionHandle(pub String);

impl ExecutionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing execution id of the full resource name
    pub fn short_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote execution lifecycle state
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    #[default]
    StateUnspecified,
    Queued,
    Active,
    Succeeded,
    Failed,
    Cancelled,
    Unavailable,
    #[serde(other)]
    Unknown,
}

impl ExecutionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Succeeded | ExecutionState::Failed | ExecutionState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::StateUnspecified => "STATE_UNSPECIFIED",
            ExecutionState::Queued => "QUEUED",
            ExecutionState::Active => "ACTIVE",
            ExecutionState::Succeeded => "SUCCEEDED",
            ExecutionState::Failed => "FAILED",
            ExecutionState::Cancelled => "CANCELLED",
            ExecutionState::Unavailable => "UNAVAILABLE",
            ExecutionState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error details attached to a failed execution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Execution resource as returned by the status call.
///
/// `argument` and `result` arrive as JSON-encoded strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: ExecutionState,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub argument: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<ExecutionError>,
    #[serde(default)]
    pub workflow_revision_id: Option<String>,
    #[serde(default)]
    pub call_log_level: Option<String>,
}
