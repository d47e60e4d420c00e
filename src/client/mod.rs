pub mod http;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClientError;

pub use http::{Credentials, HttpWorkflowsClient};
pub use types::*;

/// Access to the remote workflow executions API.
///
/// The runner only talks to the provider through this trait.
#[async_trait]
pub trait WorkflowsApi: Send + Sync {
    /// Start a new execution and return its handle
    async fn trigger(
        &self,
        target: &WorkflowTarget,
        argument: Option<&Value>,
    ) -> Result<ExecutionHandle, ClientError>;

    /// Fetch the current state of an execution
    async fn get_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionRecord, ClientError>;
}
