use thiserror::Error;

/// Fatal problems found before any remote call is made
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing credential: environment variable {0} is not set")]
    MissingCredential(&'static str),

    #[error("No configuration path given and {0} is not set")]
    MissingConfigPath(&'static str),

    #[error("No config files found under {0}")]
    NoConfigFiles(String),

    #[error("Invalid configuration in {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Errors raised by the workflow executions API client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// Non-terminal endings of a poll loop
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PollError {
    #[error("Maximum retries reached ({retries}) waiting for execution {execution}")]
    RetriesExhausted { execution: String, retries: u32 },

    #[error("Timed out after {elapsed_secs}s waiting for execution {execution}")]
    TimedOut { execution: String, elapsed_secs: u64 },

    #[error("Polling cancelled for execution {execution}")]
    Cancelled { execution: String },
}

impl PollError {
    pub fn execution(&self) -> &str {
        match self {
            PollError::RetriesExhausted { execution, .. }
            | PollError::TimedOut { execution, .. }
            | PollError::Cancelled { execution } => execution,
        }
    }
}
