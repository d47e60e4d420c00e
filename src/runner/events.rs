use super::state::{RunSummary, TestStatus};
use tokio::sync::broadcast;

/// Run events for real-time console updates
#[derive(Debug, Clone)]
pub enum TestEvent {
    // Session events
    SessionStarted {
        session_id: String,
        resource_count: usize,
        test_count: usize,
    },
    SessionFinished {
        summary: RunSummary,
        duration_ms: u64,
    },

    // Resource events
    ResourceStarted {
        resource: String,
        test_count: usize,
    },
    ResourceFinished {
        resource: String,
        passed: usize,
        failed: usize,
    },

    // Workflow test events
    TestStarted {
        test_name: String,
        workflow: String,
    },
    ExecutionTriggered {
        test_name: String,
        execution: String,
    },
    PollRetrying {
        test_name: String,
        attempt: u32,
        max_retries: u32,
        state: Option<String>,
        delay_ms: u64,
    },
    TestFinished {
        test_name: String,
        status: TestStatus,
        duration_ms: u64,
        detail: Option<String>,
    },
}

/// Event emitter for broadcasting run events.
///
/// Cloned into every component that reports progress.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<TestEvent>,
}

impl EventEmitter {
    pub fn new() -> (Self, broadcast::Receiver<TestEvent>) {
        let (sender, receiver) = broadcast::channel(256);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: TestEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }
}

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration as StdDuration;

/// Console event listener for printing real-time updates
pub struct ConsoleEventListener;

impl ConsoleEventListener {
    pub async fn listen(mut receiver: broadcast::Receiver<TestEvent>) {
        use colored::Colorize;
        use indicatif::ProgressDrawTarget;
        use std::io::IsTerminal;

        // Hidden draw target when piped so CI logs stay free of escape codes
        let multi = if std::io::stdout().is_terminal() {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        // One spinner per running workflow test, keyed by test name
        let mut spinners: HashMap<String, ProgressBar> = HashMap::new();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("    {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::debug!("Console listener skipped {} events", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            match event {
                TestEvent::SessionStarted {
                    session_id,
                    resource_count,
                    test_count,
                } => {
                    multi
                        .println(format!(
                            "\n{} Smoke test session started: {} ({} resources, {} tests)",
                            "▶".green().bold(),
                            session_id.cyan(),
                            resource_count,
                            test_count
                        ))
                        .ok();
                }

                TestEvent::SessionFinished { summary, duration_ms } => {
                    for (_, pb) in spinners.drain() {
                        pb.finish_and_clear();
                    }
                    println!("\n{} Smoke test session finished", "■".blue().bold());
                    println!(
                        "  {} passed, {} failed ({} total)",
                        summary.passed.to_string().green(),
                        summary.failed.to_string().red(),
                        summary.total
                    );
                    println!("  Duration: {}ms", duration_ms);
                }

                TestEvent::ResourceStarted { resource, test_count } => {
                    println!(
                        "\n  {} Resource: {} ({} tests)",
                        "→".blue(),
                        resource.white().bold(),
                        test_count
                    );
                }

                TestEvent::ResourceFinished {
                    resource,
                    passed,
                    failed,
                } => {
                    let status = if failed == 0 {
                        "PASSED".green().bold()
                    } else {
                        format!("FAILED ({}/{} passed)", passed, passed + failed)
                            .red()
                            .bold()
                    };
                    println!("  {} Resource {} [{}]", "←".blue(), resource, status);
                }

                TestEvent::TestStarted { test_name, workflow } => {
                    let pb = multi.add(ProgressBar::new_spinner());
                    pb.set_style(style.clone());
                    pb.set_message(format!("{} ({})... ", test_name, workflow.dimmed()));
                    pb.enable_steady_tick(StdDuration::from_millis(100));
                    spinners.insert(test_name, pb);
                }

                TestEvent::ExecutionTriggered { test_name, execution } => {
                    if let Some(pb) = spinners.get(&test_name) {
                        pb.set_message(format!("{} [{}] polling... ", test_name, execution.dimmed()));
                    }
                }

                TestEvent::PollRetrying {
                    test_name,
                    attempt,
                    max_retries,
                    state,
                    delay_ms,
                } => {
                    if let Some(pb) = spinners.get(&test_name) {
                        let state = state.unwrap_or_else(|| "unreachable".to_string());
                        pb.set_message(format!(
                            "{} {} {}",
                            test_name,
                            state.dimmed(),
                            format!("↻ poll {}/{}, next in {}ms", attempt, max_retries, delay_ms)
                                .yellow()
                        ));
                    }
                }

                TestEvent::TestFinished {
                    test_name,
                    status,
                    duration_ms,
                    detail,
                } => {
                    if let Some(pb) = spinners.remove(&test_name) {
                        pb.finish_and_clear();
                    }
                    let line = if status.is_pass() {
                        format!(
                            "    {} {} [{}] ({}ms)",
                            "✓".green(),
                            test_name,
                            status.to_string().green(),
                            duration_ms
                        )
                    } else {
                        format!(
                            "    {} {} [{}] ({}ms){}",
                            "✗".red(),
                            test_name,
                            status.to_string().red(),
                            duration_ms,
                            detail
                                .map(|d| format!(" - {}", d).dimmed().to_string())
                                .unwrap_or_default()
                        )
                    };
                    multi.println(line).ok();
                }
            }
        }
    }
}
