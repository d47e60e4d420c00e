use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::types::{ExecutionHandle, ExecutionRecord, WorkflowTarget};
use super::WorkflowsApi;
use crate::error::{ClientError, ConfigError};
use crate::utils::config::AUTH_TOKEN_ENV;

/// Bearer token for the executions API
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    /// Read the token from `AUTH_TOKEN`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(AUTH_TOKEN_ENV) {
            Some(token) if !token.trim().is_empty() => Ok(Self {
                token: token.trim().to_string(),
            }),
            _ => Err(ConfigError::MissingCredential(AUTH_TOKEN_ENV)),
        }
    }

    pub fn bearer(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(***)")
    }
}

/// reqwest-backed client for the Cloud Workflows executions API
pub struct HttpWorkflowsClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpWorkflowsClient {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn executions_url(&self, target: &WorkflowTarget) -> String {
        format!("{}/v1/{}/executions", self.base_url, target.resource_path())
    }

    fn execution_url(&self, handle: &ExecutionHandle) -> String {
        format!("{}/v1/{}", self.base_url, handle.as_str().trim_start_matches('/'))
    }
}

/// Request body for the trigger call; the API wants the argument JSON-encoded
fn trigger_body(argument: Option<&Value>) -> Value {
    match argument {
        Some(arg) => serde_json::json!({ "argument": arg.to_string() }),
        None => serde_json::json!({}),
    }
}

async fn read_error(res: reqwest::Response) -> ClientError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    ClientError::Status { status, body }
}

#[async_trait]
impl WorkflowsApi for HttpWorkflowsClient {
    async fn trigger(
        &self,
        target: &WorkflowTarget,
        argument: Option<&Value>,
    ) -> Result<ExecutionHandle, ClientError> {
        let url = self.executions_url(target);
        log::debug!("POST {}", url);

        let res = self
            .client
            .post(&url)
            .bearer_auth(self.credentials.bearer())
            .json(&trigger_body(argument))
            .send()
            .await?;

        if res.status() != reqwest::StatusCode::OK {
            return Err(read_error(res).await);
        }

        let record: ExecutionRecord = res
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        if record.name.is_empty() {
            return Err(ClientError::Decode(
                "trigger response has no execution name".to_string(),
            ));
        }
        Ok(ExecutionHandle(record.name))
    }

    async fn get_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionRecord, ClientError> {
        let url = self.execution_url(handle);
        log::debug!("GET {}", url);

        let res = self
            .client
            .get(&url)
            .bearer_auth(self.credentials.bearer())
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(read_error(res).await);
        }

        res.json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpWorkflowsClient {
        let credentials = Credentials::from_lookup(|_| Some("token".to_string())).unwrap();
        HttpWorkflowsClient::new(
            "https://workflowexecutions.googleapis.com/",
            credentials,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let err = Credentials::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("AUTH_TOKEN")));

        let err = Credentials::from_lookup(|_| Some("   ".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(_)));
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let credentials = Credentials::from_lookup(|_| Some("secret".to_string())).unwrap();
        assert!(!format!("{:?}", credentials).contains("secret"));
    }

    #[test]
    fn test_urls() {
        let client = client();
        let target = WorkflowTarget {
            project: "p".into(),
            location: "europe-west1".into(),
            workflow: "sample".into(),
        };
        assert_eq!(
            client.executions_url(&target),
            "https://workflowexecutions.googleapis.com/v1/projects/p/locations/europe-west1/workflows/sample/executions"
        );

        let handle = ExecutionHandle("projects/p/locations/l/workflows/w/executions/e1".into());
        assert_eq!(
            client.execution_url(&handle),
            "https://workflowexecutions.googleapis.com/v1/projects/p/locations/l/workflows/w/executions/e1"
        );
    }

    #[test]
    fn test_trigger_body_encodes_argument() {
        let body = trigger_body(Some(&serde_json::json!({"input": 1})));
        assert_eq!(body["argument"], serde_json::json!("{\"input\":1}"));
        assert_eq!(trigger_body(None), serde_json::json!({}));
    }
}
