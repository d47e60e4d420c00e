use colored::Colorize;

use crate::runner::state::{RunSummary, TestSessionReport, WorkflowTestResult};

/// The line CI pipelines grep for
pub fn summary_line(summary: &RunSummary) -> String {
    format!(
        "Test Execution Summary: {} tests executed, {} tests passed, {} tests failed",
        summary.total, summary.passed, summary.failed
    )
}

/// Plain-text block describing one workflow test
pub fn format_test(test: &WorkflowTestResult) -> String {
    let mut lines = vec![format!("{} [{}]", test.test_name, test.status)];
    lines.push(format!("  workflow: {}", test.workflow));

    let execution = &test.execution;
    if let Some(name) = &execution.execution_name {
        lines.push(format!("  execution: {}", name));
    }
    if let Some(state) = execution.execution_state {
        lines.push(format!("  state: {}", state));
    }
    match (&execution.start_time, &execution.end_time) {
        (Some(start), Some(end)) => lines.push(format!("  started: {}  ended: {}", start, end)),
        (Some(start), None) => lines.push(format!("  started: {}", start)),
        _ => {}
    }
    if let Some(duration) = &execution.execution_duration {
        lines.push(format!("  execution duration: {}", duration));
    }
    lines.push(format!(
        "  polls: {}  wall time: {}ms",
        test.poll_attempts, test.duration_ms
    ));
    if let Some(error) = &execution.error {
        lines.push(format!("  error: {}", error));
    }
    if let Some(detail) = &test.detail {
        lines.push(format!("  detail: {}", detail));
    }
    for assertion in &test.assertions {
        let mark = if assertion.result { "ok" } else { "FAIL" };
        lines.push(format!("  [{}] {}", mark, assertion.message));
    }

    lines.join("\n")
}

/// Print every test grouped by resource, then the summary line
pub fn print_summary(session: &TestSessionReport) {
    println!("\n{}", "=== Smoke Test Results ===".bold());

    for resource in &session.resources {
        println!("\n{} {}", "Resource:".bold(), resource.resource.cyan());
        for test in &resource.tests {
            let block = format_test(test);
            if test.passed() {
                println!("{}", block.green());
            } else {
                println!("{}", block.red());
            }
        }
    }

    let line = summary_line(&session.summary);
    println!();
    if session.summary.all_passed {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line.red().bold());
    }
    log::info!("{}", line);
}
