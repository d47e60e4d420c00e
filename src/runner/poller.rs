//! Execution polling with exponential backoff.
//!
//! A poll loop ends on the first of: a terminal execution state, the retry
//! cap, the wall-clock timeout, or cancellation. The timeout is only checked
//! between polls, so a sleep can overshoot it by at most one backoff interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::events::{EventEmitter, TestEvent};
use crate::client::{ExecutionHandle, ExecutionRecord, WorkflowsApi};
use crate::error::PollError;
use crate::parser::types::PollingConfig;

/// Doubling delay sequence capped at `max`
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        Some(delay)
    }
}

/// Execution reached a terminal state
#[derive(Debug, Clone)]
pub struct PollSuccess {
    pub record: ExecutionRecord,
    pub attempts: u32,
}

/// Poll loop gave up
#[derive(Debug, Clone)]
pub struct PollFailure {
    pub error: PollError,
    /// Last successfully read record, if any
    pub last_record: Option<ExecutionRecord>,
    pub attempts: u32,
}

/// Drives one execution to a terminal state
pub struct ExecutionPoller<'a> {
    api: &'a dyn WorkflowsApi,
    config: &'a PollingConfig,
    emitter: &'a EventEmitter,
    cancel: Option<Arc<AtomicBool>>,
    test_name: &'a str,
}

impl<'a> ExecutionPoller<'a> {
    pub fn new(
        api: &'a dyn WorkflowsApi,
        config: &'a PollingConfig,
        emitter: &'a EventEmitter,
        test_name: &'a str,
    ) -> Self {
        Self {
            api,
            config,
            emitter,
            cancel: None,
            test_name,
        }
    }

    /// Stop polling once `flag` is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    pub async fn poll(&self, handle: &ExecutionHandle) -> Result<PollSuccess, PollFailure> {
        let started = Instant::now();
        let mut backoff = Backoff::new(self.config.initial_delay, self.config.max_delay);
        let mut retries = 0u32;
        let mut last_record: Option<ExecutionRecord> = None;

        let fail = |error: PollError, last_record: Option<ExecutionRecord>, attempts: u32| {
            log::warn!(
                "{}: gave up on {} after {} polls: {}",
                self.test_name,
                error.execution(),
                attempts,
                error
            );
            PollFailure {
                error,
                last_record,
                attempts,
            }
        };

        loop {
            if self.is_cancelled() {
                return Err(fail(
                    PollError::Cancelled {
                        execution: handle.to_string(),
                    },
                    last_record,
                    retries,
                ));
            }

            let elapsed = started.elapsed();
            if elapsed > self.config.timeout {
                return Err(fail(
                    PollError::TimedOut {
                        execution: handle.to_string(),
                        elapsed_secs: elapsed.as_secs(),
                    },
                    last_record,
                    retries,
                ));
            }

            let state = match self.api.get_execution(handle).await {
                Ok(record) if record.state.is_terminal() => {
                    log::info!(
                        "{}: execution {} finished with state {}",
                        self.test_name,
                        handle.short_id(),
                        record.state
                    );
                    return Ok(PollSuccess {
                        record,
                        attempts: retries + 1,
                    });
                }
                Ok(record) => {
                    log::debug!(
                        "{}: execution {} is {}",
                        self.test_name,
                        handle.short_id(),
                        record.state
                    );
                    let state = record.state.to_string();
                    last_record = Some(record);
                    Some(state)
                }
                Err(e) => {
                    log::warn!(
                        "{}: failed to read execution {}: {}",
                        self.test_name,
                        handle.short_id(),
                        e
                    );
                    None
                }
            };

            retries += 1;
            if retries >= self.config.max_retries {
                return Err(fail(
                    PollError::RetriesExhausted {
                        execution: handle.to_string(),
                        retries,
                    },
                    last_record,
                    retries,
                ));
            }

            let delay = backoff.next().unwrap_or(self.config.max_delay);
            self.emitter.emit(TestEvent::PollRetrying {
                test_name: self.test_name.to_string(),
                attempt: retries,
                max_retries: self.config.max_retries,
                state,
                delay_ms: delay.as_millis() as u64,
            });
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ExecutionState, WorkflowTarget};
    use crate::error::ClientError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Replays a fixed sequence of poll outcomes, repeating the last one
    struct ScriptedApi {
        script: Vec<Option<ExecutionState>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedApi {
        fn new(script: Vec<Option<ExecutionState>>) -> Self {
            Self {
                script,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1] - w[0]).collect()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl WorkflowsApi for ScriptedApi {
        async fn trigger(
            &self,
            _target: &WorkflowTarget,
            _argument: Option<&Value>,
        ) -> Result<ExecutionHandle, ClientError> {
            Ok(ExecutionHandle("exec".into()))
        }

        async fn get_execution(&self, handle: &ExecutionHandle) -> Result<ExecutionRecord, ClientError> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Instant::now());
                calls.len() - 1
            };
            let step = self
                .script
                .get(index)
                .or_else(|| self.script.last())
                .copied()
                .flatten();
            match step {
                Some(state) => Ok(ExecutionRecord {
                    name: handle.to_string(),
                    state,
                    ..Default::default()
                }),
                None => Err(ClientError::Decode("connection reset".into())),
            }
        }
    }

    fn config(initial_ms: u64, max_ms: u64, max_retries: u32, timeout_secs: u64) -> PollingConfig {
        PollingConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            max_retries,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    fn handle() -> ExecutionHandle {
        ExecutionHandle("projects/p/locations/l/workflows/w/executions/e1".into())
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let delays: Vec<u64> = Backoff::new(Duration::from_secs(1), Duration::from_secs(10))
            .take(6)
            .map(|d| d.as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);

        let max = Duration::from_millis(300);
        let mut previous: Option<Duration> = None;
        for delay in Backoff::new(Duration::from_millis(70), max).take(20) {
            assert!(delay <= max);
            if let Some(prev) = previous {
                assert_eq!(delay, (prev * 2).min(max));
            }
            previous = Some(delay);
        }
    }

    #[test]
    fn test_backoff_initial_above_max_is_capped() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(2));
        assert_eq!(backoff.next(), Some(Duration::from_secs(2)));
        assert_eq!(backoff.next(), Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_on_first_poll() {
        let api = ScriptedApi::new(vec![Some(ExecutionState::Succeeded)]);
        let emitter = EventEmitter::default();
        let cfg = config(100, 1000, 5, 60);

        let success = ExecutionPoller::new(&api, &cfg, &emitter, "t")
            .poll(&handle())
            .await
            .unwrap();
        assert_eq!(success.record.state, ExecutionState::Succeeded);
        assert_eq!(success.attempts, 1);
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_observed_between_polls() {
        let api = ScriptedApi::new(vec![
            Some(ExecutionState::Active),
            Some(ExecutionState::Active),
            Some(ExecutionState::Active),
            Some(ExecutionState::Succeeded),
        ]);
        let emitter = EventEmitter::default();
        let cfg = config(100, 1000, 10, 60);

        let success = ExecutionPoller::new(&api, &cfg, &emitter, "t")
            .poll(&handle())
            .await
            .unwrap();
        assert_eq!(success.attempts, 4);
        assert_eq!(
            api.gaps(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_capped_at_max() {
        let api = ScriptedApi::new(vec![
            Some(ExecutionState::Active),
            Some(ExecutionState::Active),
            Some(ExecutionState::Active),
            Some(ExecutionState::Failed),
        ]);
        let emitter = EventEmitter::default();
        let cfg = config(100, 250, 10, 60);

        let success = ExecutionPoller::new(&api, &cfg, &emitter, "t")
            .poll(&handle())
            .await
            .unwrap();
        assert_eq!(success.record.state, ExecutionState::Failed);
        assert_eq!(
            api.gaps(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(250)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried_with_backoff() {
        let api = ScriptedApi::new(vec![None, None, Some(ExecutionState::Succeeded)]);
        let emitter = EventEmitter::default();
        let cfg = config(50, 1000, 10, 60);

        let success = ExecutionPoller::new(&api, &cfg, &emitter, "t")
            .poll(&handle())
            .await
            .unwrap();
        assert_eq!(success.attempts, 3);
        assert_eq!(
            api.gaps(),
            vec![Duration::from_millis(50), Duration::from_millis(100)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_retries_reached() {
        let api = ScriptedApi::new(vec![Some(ExecutionState::Active)]);
        let emitter = EventEmitter::default();
        let cfg = config(10, 100, 2, 600);

        let failure = ExecutionPoller::new(&api, &cfg, &emitter, "t")
            .poll(&handle())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, PollError::RetriesExhausted { retries: 2, .. }));
        assert!(failure.error.to_string().contains("Maximum retries reached"));
        assert_eq!(failure.error.execution(), handle().as_str());
        assert_eq!(api.call_count(), 2);
        assert_eq!(
            failure.last_record.map(|r| r.state),
            Some(ExecutionState::Active)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_overshoots_by_at_most_one_interval() {
        let api = ScriptedApi::new(vec![None]);
        let emitter = EventEmitter::default();
        let cfg = config(1000, 4000, 1000, 10);

        let started = Instant::now();
        let failure = ExecutionPoller::new(&api, &cfg, &emitter, "t")
            .poll(&handle())
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(failure.error, PollError::TimedOut { .. }));
        assert!(failure.last_record.is_none());
        assert!(elapsed > cfg.timeout);
        assert!(elapsed <= cfg.timeout + cfg.max_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_flag_stops_polling() {
        let api = ScriptedApi::new(vec![Some(ExecutionState::Active)]);
        let emitter = EventEmitter::default();
        let cfg = config(10, 100, 100, 600);
        let flag = Arc::new(AtomicBool::new(true));

        let failure = ExecutionPoller::new(&api, &cfg, &emitter, "t")
            .with_cancel(flag)
            .poll(&handle())
            .await
            .unwrap_err();
        assert!(matches!(failure.error, PollError::Cancelled { .. }));
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_events_are_emitted() {
        let api = ScriptedApi::new(vec![Some(ExecutionState::Active), Some(ExecutionState::Succeeded)]);
        let (emitter, mut receiver) = EventEmitter::new();
        let cfg = config(10, 100, 5, 60);

        ExecutionPoller::new(&api, &cfg, &emitter, "t")
            .poll(&handle())
            .await
            .unwrap();

        match receiver.try_recv().unwrap() {
            TestEvent::PollRetrying {
                attempt,
                state,
                delay_ms,
                ..
            } => {
                assert_eq!(attempt, 1);
                assert_eq!(state.as_deref(), Some("ACTIVE"));
                assert_eq!(delay_ms, 10);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
