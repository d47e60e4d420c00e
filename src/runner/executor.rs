use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::events::{EventEmitter, TestEvent};
use super::poller::ExecutionPoller;
use super::state::{TestState, WorkflowTestResult};
use crate::assertions::evaluate_assertions;
use crate::client::WorkflowsApi;
use crate::extract::normalize_execution;
use crate::parser::types::WorkflowTestPlan;

/// Runs one workflow test: trigger, poll, assert.
///
/// Every failure along the way is folded into the returned result, so a
/// caller always gets exactly one [`WorkflowTestResult`] per plan.
#[derive(Clone)]
pub struct WorkflowTestExecutor {
    api: Arc<dyn WorkflowsApi>,
    emitter: EventEmitter,
    cancel: Option<Arc<AtomicBool>>,
}

impl WorkflowTestExecutor {
    pub fn new(api: Arc<dyn WorkflowsApi>, emitter: EventEmitter) -> Self {
        Self {
            api,
            emitter,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub async fn run(&self, plan: &WorkflowTestPlan) -> WorkflowTestResult {
        self.emitter.emit(TestEvent::TestStarted {
            test_name: plan.name.clone(),
            workflow: plan.target.workflow.clone(),
        });

        let result = self.execute(plan).await;

        if result.passed() {
            log::info!("Test Passed: {}", result.test_name);
        } else {
            log::error!("Test Failed: {}", result.test_name);
            if let Some(detail) = &result.detail {
                log::error!("  {}", detail);
            }
            for assertion in result.failed_assertions() {
                log::error!("  {}", assertion.message);
            }
        }

        self.emitter.emit(TestEvent::TestFinished {
            test_name: result.test_name.clone(),
            status: result.status,
            duration_ms: result.duration_ms,
            detail: result.detail.clone(),
        });

        result
    }

    async fn execute(&self, plan: &WorkflowTestPlan) -> WorkflowTestResult {
        let mut state = TestState::start(plan);

        let handle = match self
            .api
            .trigger(&plan.target, plan.argument.as_ref())
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                return state.fail(format!(
                    "Failed to trigger workflow {}: {}",
                    plan.target.workflow, e
                ))
            }
        };

        log::info!("{}: triggered execution {}", plan.name, handle);
        state.triggered(handle.as_str());
        self.emitter.emit(TestEvent::ExecutionTriggered {
            test_name: plan.name.clone(),
            execution: handle.short_id().to_string(),
        });

        let mut poller =
            ExecutionPoller::new(self.api.as_ref(), &plan.polling, &self.emitter, &plan.name);
        if let Some(flag) = &self.cancel {
            poller = poller.with_cancel(flag.clone());
        }

        match poller.poll(&handle).await {
            Ok(success) => {
                state.observed(&success.record, success.attempts);
                let document = normalize_execution(&success.record);
                let assertions = evaluate_assertions(&document, &plan.assertions);
                state.complete(assertions)
            }
            Err(failure) => {
                match &failure.last_record {
                    Some(record) => state.observed(record, failure.attempts),
                    None => state.record_attempts(failure.attempts),
                }
                state.fail(failure.error.to_string())
            }
        }
    }
}
