use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::client::WorkflowTarget;
use crate::utils::config::Config;

/// Represents a parsed smoke-test configuration from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmokeConfig {
    /// Default GCP project for every test that does not override it
    #[serde(default, alias = "project")]
    pub project_id: Option<String>,

    /// Default workflow location (region)
    #[serde(default, alias = "region")]
    pub location: Option<String>,

    /// Override for the executions API endpoint (emulators, proxies)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Upper bound on concurrently running tests within one resource
    #[serde(default)]
    pub max_parallel: Option<usize>,

    /// Polling defaults applied to every test
    #[serde(default)]
    pub defaults: PollingOverrides,

    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
}

impl SmokeConfig {
    /// Fold another config file into this one. Scalars already set here win,
    /// resources are appended.
    pub fn merge(&mut self, other: SmokeConfig) {
        if self.project_id.is_none() {
            self.project_id = other.project_id;
        }
        if self.location.is_none() {
            self.location = other.location;
        }
        if self.api_base_url.is_none() {
            self.api_base_url = other.api_base_url;
        }
        if self.max_parallel.is_none() {
            self.max_parallel = other.max_parallel;
        }
        self.defaults = self.defaults.or(&other.defaults);
        self.resources.extend(other.resources);
    }

    pub fn test_count(&self) -> usize {
        self.resources.iter().map(|r| r.tests.len()).sum()
    }
}

/// Class of remote target a resource block exercises
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[serde(alias = "workflow", alias = "cloud_workflows")]
    Workflows,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Workflows => write!(f, "workflows"),
        }
    }
}

/// A resource block: one class of remote target plus the tests against it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(rename = "type", alias = "resource")]
    pub kind: ResourceKind,

    /// Optional display name, defaults to the resource type
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub tests: Vec<WorkflowTestSpec>,
}

impl ResourceSpec {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.kind.to_string())
    }
}

/// One workflow to trigger, poll and assert on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTestSpec {
    pub name: String,

    /// Workflow identifier (the short name, not the full resource path)
    #[serde(alias = "workflow_name", alias = "workflow_id")]
    pub workflow: String,

    /// Argument passed to the execution, serialized to a JSON string on trigger
    #[serde(default)]
    pub argument: Option<serde_json::Value>,

    #[serde(default, alias = "project")]
    pub project_id: Option<String>,

    #[serde(default, alias = "region")]
    pub location: Option<String>,

    #[serde(default)]
    pub polling: PollingOverrides,

    #[serde(default)]
    pub assertions: Vec<AssertionSpec>,
}

/// Declarative check against the normalized execution document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssertionSpec {
    /// Dotted/bracketed path, e.g. `result.items[0].id`
    #[serde(alias = "path")]
    pub key: String,

    #[serde(rename = "type", alias = "data_type")]
    pub data_type: String,

    pub method: String,

    /// Absent for unary methods such as `is_truthy`
    #[serde(default)]
    pub expected: Option<serde_json::Value>,
}

/// Polling values as written in YAML; any field may be left out
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PollingOverrides {
    #[serde(default, alias = "initial_delay")]
    pub initial_delay_seconds: Option<f64>,

    #[serde(default, alias = "max_delay")]
    pub max_delay_seconds: Option<f64>,

    #[serde(default)]
    pub max_retries: Option<u32>,

    #[serde(default, alias = "timeout")]
    pub timeout_seconds: Option<u64>,
}

impl PollingOverrides {
    /// Fill unset fields from `fallback`
    pub fn or(&self, fallback: &PollingOverrides) -> PollingOverrides {
        PollingOverrides {
            initial_delay_seconds: self.initial_delay_seconds.or(fallback.initial_delay_seconds),
            max_delay_seconds: self.max_delay_seconds.or(fallback.max_delay_seconds),
            max_retries: self.max_retries.or(fallback.max_retries),
            timeout_seconds: self.timeout_seconds.or(fallback.timeout_seconds),
        }
    }

    /// Resolve against built-in defaults. Unrepresentable delays fall back to
    /// the built-in values; `validate_config` reports them as errors.
    pub fn resolve(&self, builtin: &Config) -> PollingConfig {
        let initial_delay = self
            .initial_delay_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(Duration::from_millis(builtin.initial_delay_ms));
        let max_delay = self
            .max_delay_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(Duration::from_millis(builtin.max_delay_ms));

        PollingConfig {
            initial_delay,
            max_delay,
            max_retries: self.max_retries.unwrap_or(builtin.max_retries),
            timeout: Duration::from_secs(self.timeout_seconds.unwrap_or(builtin.timeout_secs)),
        }
    }
}

/// Fully resolved polling parameters for one test
#[derive(Debug, Clone, PartialEq)]
pub struct PollingConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
    pub timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        PollingOverrides::default().resolve(&Config::default())
    }
}

/// A validated test ready to execute
#[derive(Debug, Clone)]
pub struct WorkflowTestPlan {
    pub name: String,
    pub target: WorkflowTarget,
    pub argument: Option<serde_json::Value>,
    pub polling: PollingConfig,
    pub assertions: Vec<AssertionSpec>,
}

/// A validated resource block ready to execute
#[derive(Debug, Clone)]
pub struct ResourcePlan {
    pub name: String,
    pub kind: ResourceKind,
    pub tests: Vec<WorkflowTestPlan>,
}
