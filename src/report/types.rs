use crate::runner::state::{ResourceResult, RunSummary, TestSessionReport};
use serde::{Deserialize, Serialize};

/// Test results for report generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    pub session_id: String,
    pub resources: Vec<ResourceResult>,
    pub summary: RunSummary,
    pub total_duration_ms: Option<u64>,
    pub generated_at: String,
}

impl From<&TestSessionReport> for TestResults {
    fn from(session: &TestSessionReport) -> Self {
        Self {
            session_id: session.session_id.clone(),
            resources: session.resources.clone(),
            summary: session.summary.clone(),
            total_duration_ms: session.total_duration_ms,
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}
