/// Environment variable holding the bearer token for the executions API
pub const AUTH_TOKEN_ENV: &str = "AUTH_TOKEN";

/// Environment variable pointing at the config file or directory
pub const CONFIG_PATH_ENV: &str = "SMOKE_TEST_PATH";

/// Google Cloud Workflows executions endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://workflowexecutions.googleapis.com";

/// Built-in polling defaults
pub struct Config {
    /// First delay between status polls (ms)
    pub initial_delay_ms: u64,

    /// Cap for the doubling delay (ms)
    pub max_delay_ms: u64,

    /// Status polls allowed before giving up
    pub max_retries: u32,

    /// Wall-clock budget for one execution (s)
    pub timeout_secs: u64,

    /// Per-request HTTP timeout (s)
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            max_delay_ms: 60_000,
            max_retries: 30,
            timeout_secs: 900,
            request_timeout_secs: 30,
        }
    }
}
