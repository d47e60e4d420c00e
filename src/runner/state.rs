use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

use crate::assertions::AssertionResult;
use crate::client::{ExecutionRecord, ExecutionState};
use crate::parser::types::WorkflowTestPlan;

/// Overall status of one workflow test.
///
/// Mirrors the remote terminal state unless an assertion failed or the
/// pipeline errored, in which case it is `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TestStatus {
    #[serde(rename = "SUCCEEDED")]
    Succeeded,
    #[serde(rename = "FAILED")]
    ExecutionFailed,
    #[serde(rename = "CANCELLED")]
    Cancelled,
    #[serde(rename = "Failed")]
    Failed,
}

impl TestStatus {
    /// Status for a test whose poll reached `state` and whose assertions produced `assertions`
    pub fn derive(state: ExecutionState, assertions: &[AssertionResult]) -> Self {
        if assertions.iter().any(|a| !a.result) {
            return TestStatus::Failed;
        }
        match state {
            ExecutionState::Succeeded => TestStatus::Succeeded,
            ExecutionState::Failed => TestStatus::ExecutionFailed,
            ExecutionState::Cancelled => TestStatus::Cancelled,
            _ => TestStatus::Failed,
        }
    }

    pub fn is_pass(&self) -> bool {
        !matches!(self, TestStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Succeeded => "SUCCEEDED",
            TestStatus::ExecutionFailed => "FAILED",
            TestStatus::Cancelled => "CANCELLED",
            TestStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution metadata flattened into a test result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub execution_name: Option<String>,
    pub execution_state: Option<ExecutionState>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub execution_duration: Option<String>,
    pub argument: Option<String>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub workflow_revision_id: Option<String>,
}

impl From<&ExecutionRecord> for ExecutionSummary {
    fn from(record: &ExecutionRecord) -> Self {
        let error = record.error.as_ref().map(|e| {
            match (&e.payload, &e.context) {
                (Some(payload), Some(context)) => format!("{} ({})", payload, context),
                (Some(payload), None) => payload.clone(),
                (None, Some(context)) => context.clone(),
                (None, None) => String::new(),
            }
        });
        Self {
            execution_name: (!record.name.is_empty()).then(|| record.name.clone()),
            execution_state: Some(record.state),
            start_time: record.start_time.clone(),
            end_time: record.end_time.clone(),
            execution_duration: record.duration.clone(),
            argument: record.argument.clone(),
            result: record.result.clone(),
            error,
            workflow_revision_id: record.workflow_revision_id.clone(),
        }
    }
}

/// Final record for one workflow test
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTestResult {
    pub test_name: String,
    pub workflow: String,
    pub status: TestStatus,
    #[serde(flatten)]
    pub execution: ExecutionSummary,
    pub assertions: Vec<AssertionResult>,
    /// Why the test failed before or outside assertion evaluation
    pub detail: Option<String>,
    pub poll_attempts: u32,
    pub duration_ms: u64,
}

impl WorkflowTestResult {
    pub fn passed(&self) -> bool {
        self.status.is_pass()
    }

    pub fn failed_assertions(&self) -> impl Iterator<Item = &AssertionResult> {
        self.assertions.iter().filter(|a| !a.result)
    }
}

/// Builder that times one test from start to finish
#[derive(Debug)]
pub struct TestState {
    test_name: String,
    workflow: String,
    started_at: Instant,
    execution: ExecutionSummary,
    poll_attempts: u32,
}

impl TestState {
    pub fn start(plan: &WorkflowTestPlan) -> Self {
        Self {
            test_name: plan.name.clone(),
            workflow: plan.target.workflow.clone(),
            started_at: Instant::now(),
            execution: ExecutionSummary::default(),
            poll_attempts: 0,
        }
    }

    pub fn triggered(&mut self, execution_name: &str) {
        self.execution.execution_name = Some(execution_name.to_string());
    }

    /// Record the last execution record seen, terminal or not
    pub fn observed(&mut self, record: &ExecutionRecord, attempts: u32) {
        let name = self.execution.execution_name.take();
        self.execution = ExecutionSummary::from(record);
        if self.execution.execution_name.is_none() {
            self.execution.execution_name = name;
        }
        self.poll_attempts = attempts;
    }

    pub fn record_attempts(&mut self, attempts: u32) {
        self.poll_attempts = attempts;
    }

    /// Finish with assertion results from a terminal execution
    pub fn complete(self, assertions: Vec<AssertionResult>) -> WorkflowTestResult {
        let state = self.execution.execution_state.unwrap_or_default();
        let status = TestStatus::derive(state, &assertions);
        self.finish(status, assertions, None)
    }

    /// Finish as failed before assertions could run
    pub fn fail(self, detail: String) -> WorkflowTestResult {
        self.finish(TestStatus::Failed, Vec::new(), Some(detail))
    }

    fn finish(
        self,
        status: TestStatus,
        assertions: Vec<AssertionResult>,
        detail: Option<String>,
    ) -> WorkflowTestResult {
        WorkflowTestResult {
            test_name: self.test_name,
            workflow: self.workflow,
            status,
            execution: self.execution,
            assertions,
            detail,
            poll_attempts: self.poll_attempts,
            duration_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

/// All test results for one resource block
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceResult {
    pub resource: String,
    pub kind: String,
    pub tests: Vec<WorkflowTestResult>,
}

impl ResourceResult {
    pub fn passed(&self) -> bool {
        self.tests.iter().all(|t| t.passed())
    }
}

/// Counts rolled up over every resource
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub all_passed: bool,
}

impl RunSummary {
    pub fn from_resources(resources: &[ResourceResult]) -> Self {
        let (passed, failed) = resources
            .iter()
            .flat_map(|r| r.tests.iter())
            .fold((0, 0), |(p, f), test| {
                if test.passed() {
                    (p + 1, f)
                } else {
                    (p, f + 1)
                }
            });

        RunSummary {
            total: passed + failed,
            passed,
            failed,
            all_passed: failed == 0,
        }
    }

    pub fn exit_code(&self) -> i32 {
        if self.all_passed {
            0
        } else {
            1
        }
    }
}

/// Everything produced by one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSessionReport {
    pub session_id: String,
    pub resources: Vec<ResourceResult>,
    pub summary: RunSummary,
    pub total_duration_ms: Option<u64>,
}
