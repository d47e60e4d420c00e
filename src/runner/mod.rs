pub mod events;
pub mod executor;
pub mod poller;
pub mod state;

use anyhow::Result;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use crate::client::{Credentials, HttpWorkflowsClient, WorkflowsApi};
use crate::parser::types::{ResourcePlan, WorkflowTestPlan};
use crate::utils::config::Config;

pub use events::*;
pub use executor::WorkflowTestExecutor;
pub use poller::{Backoff, ExecutionPoller, PollFailure, PollSuccess};
pub use state::*;

/// Options for one `run` invocation
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output: std::path::PathBuf,
    pub report: bool,
    pub strict: bool,
}

/// Load, validate and run every smoke test under `path`.
///
/// Config errors surface as `Err` before any remote call. Test failures do
/// not; they are counted in the returned summary.
pub async fn run_smoke_tests(
    path: &Path,
    options: &RunOptions,
    cancel: Arc<AtomicBool>,
) -> Result<RunSummary> {
    let config = crate::parser::load_config(path)?;
    let plans = crate::parser::build_plan(&config, path, options.strict)?;
    let credentials = Credentials::from_env()?;

    let settings = Config::default();
    let base_url = config
        .api_base_url
        .clone()
        .unwrap_or_else(|| crate::utils::config::DEFAULT_API_BASE_URL.to_string());
    let client = HttpWorkflowsClient::new(
        &base_url,
        credentials,
        std::time::Duration::from_secs(settings.request_timeout_secs),
    )?;

    let (emitter, receiver) = EventEmitter::new();
    let listener = tokio::spawn(ConsoleEventListener::listen(receiver));

    let runner = SmokeTestRunner::new(Arc::new(client), emitter)
        .with_cancel(cancel)
        .with_max_parallel(config.max_parallel);
    let session = runner.run_all(&plans).await;
    drop(runner);
    let _ = listener.await;

    crate::report::console::print_summary(&session);

    if options.report {
        std::fs::create_dir_all(&options.output)?;
        crate::report::write_reports(&session, &options.output)?;
    }

    Ok(session.summary)
}

/// Fans workflow tests out per resource and collects their results
pub struct SmokeTestRunner {
    executor: WorkflowTestExecutor,
    emitter: EventEmitter,
    max_parallel: Option<usize>,
}

impl SmokeTestRunner {
    pub fn new(api: Arc<dyn WorkflowsApi>, emitter: EventEmitter) -> Self {
        Self {
            executor: WorkflowTestExecutor::new(api, emitter.clone()),
            emitter,
            max_parallel: None,
        }
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.executor = self.executor.with_cancel(flag);
        self
    }

    /// Bound concurrent tests per resource. `None` runs every test at once.
    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.max_parallel = max_parallel.filter(|n| *n > 0);
        self
    }

    /// Run resources one after another, tests within a resource concurrently
    pub async fn run_all(&self, resources: &[ResourcePlan]) -> TestSessionReport {
        let session_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        self.emitter.emit(TestEvent::SessionStarted {
            session_id: session_id.clone(),
            resource_count: resources.len(),
            test_count: resources.iter().map(|r| r.tests.len()).sum(),
        });

        let mut results = Vec::with_capacity(resources.len());
        for resource in resources {
            results.push(self.run_resource(resource).await);
        }

        let summary = RunSummary::from_resources(&results);
        let duration_ms = started.elapsed().as_millis() as u64;
        self.emitter.emit(TestEvent::SessionFinished {
            summary: summary.clone(),
            duration_ms,
        });

        TestSessionReport {
            session_id,
            resources: results,
            summary,
            total_duration_ms: Some(duration_ms),
        }
    }

    /// Run every test of one resource and return one result per test
    pub async fn run_resource(&self, resource: &ResourcePlan) -> ResourceResult {
        self.emitter.emit(TestEvent::ResourceStarted {
            resource: resource.name.clone(),
            test_count: resource.tests.len(),
        });

        let semaphore = self.max_parallel.map(|n| Arc::new(Semaphore::new(n)));
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(resource.tests.len());

        for plan in &resource.tests {
            let executor = self.executor.clone();
            let plan_owned = plan.clone();
            let semaphore = semaphore.clone();
            let sender = sender.clone();

            let handle = tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let result = executor.run(&plan_owned).await;
                let _ = sender.send(result);
            });
            handles.push((plan, handle));
        }
        drop(sender);

        // Completion order
        let mut tests = Vec::with_capacity(handles.len());
        while let Some(result) = receiver.recv().await {
            tests.push(result);
        }

        for (plan, handle) in handles {
            if let Err(e) = handle.await {
                tests.push(self.crashed(plan, &e));
            }
        }

        tests.sort_by(|a, b| a.test_name.cmp(&b.test_name));

        let passed = tests.iter().filter(|t| t.passed()).count();
        self.emitter.emit(TestEvent::ResourceFinished {
            resource: resource.name.clone(),
            passed,
            failed: tests.len() - passed,
        });

        ResourceResult {
            resource: resource.name.clone(),
            kind: resource.kind.to_string(),
            tests,
        }
    }

    fn crashed(&self, plan: &WorkflowTestPlan, error: &tokio::task::JoinError) -> WorkflowTestResult {
        let detail = if error.is_panic() {
            format!("Task panicked while running {}", plan.name)
        } else {
            format!("Task aborted while running {}: {}", plan.name, error)
        };
        log::error!("Test Failed: {}", plan.name);
        log::error!("  {}", detail);

        let result = TestState::start(plan).fail(detail);
        self.emitter.emit(TestEvent::TestFinished {
            test_name: result.test_name.clone(),
            status: result.status,
            duration_ms: result.duration_ms,
            detail: result.detail.clone(),
        });
        result
    }
}
