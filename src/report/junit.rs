use super::types::TestResults;
use crate::runner::state::{ResourceResult, WorkflowTestResult};
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;
use std::path::{Path, PathBuf};

pub const JUNIT_FILE: &str = "junit.xml";

fn seconds(ms: u64) -> String {
    (ms as f64 / 1000.0).to_string()
}

/// Generate JUnit XML report string from TestResults
pub fn generate_junit_xml(results: &TestResults) -> Result<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let total_tests = results.summary.total;
    let failures = results.summary.failed;
    let total_duration = results.total_duration_ms.unwrap_or_else(|| {
        results
            .resources
            .iter()
            .flat_map(|r| r.tests.iter())
            .map(|t| t.duration_ms)
            .sum()
    });

    // <testsuites>
    let mut suites_start = BytesStart::new("testsuites");
    suites_start.push_attribute(("name", "smoke-tester-run"));
    suites_start.push_attribute(("tests", total_tests.to_string().as_str()));
    suites_start.push_attribute(("failures", failures.to_string().as_str()));
    suites_start.push_attribute(("skipped", "0"));
    suites_start.push_attribute(("time", seconds(total_duration).as_str()));
    writer.write_event(Event::Start(suites_start))?;

    // One <testsuite> per resource block
    for resource in &results.resources {
        write_test_suite(&mut writer, resource, results)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let result = writer.into_inner().into_inner();
    let xml = String::from_utf8(result)?;
    Ok(xml)
}

fn write_test_suite<W: std::io::Write>(
    writer: &mut Writer<W>,
    resource: &ResourceResult,
    results: &TestResults,
) -> Result<()> {
    let failures = resource.tests.iter().filter(|t| !t.passed()).count();
    let duration: u64 = resource.tests.iter().map(|t| t.duration_ms).sum();

    let mut suite_start = BytesStart::new("testsuite");
    suite_start.push_attribute(("name", resource.resource.as_str()));
    suite_start.push_attribute(("tests", resource.tests.len().to_string().as_str()));
    suite_start.push_attribute(("failures", failures.to_string().as_str()));
    suite_start.push_attribute(("skipped", "0"));
    suite_start.push_attribute(("id", results.session_id.as_str()));
    suite_start.push_attribute(("time", seconds(duration).as_str()));
    suite_start.push_attribute(("timestamp", results.generated_at.as_str()));
    writer.write_event(Event::Start(suite_start))?;

    for test in &resource.tests {
        write_test_case(writer, &resource.resource, test)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    Ok(())
}

fn write_test_case<W: std::io::Write>(
    writer: &mut Writer<W>,
    resource: &str,
    test: &WorkflowTestResult,
) -> Result<()> {
    let mut case_start = BytesStart::new("testcase");
    let classname = format!("{}.{}", resource, test.workflow);

    case_start.push_attribute(("name", test.test_name.as_str()));
    case_start.push_attribute(("classname", classname.as_str()));
    case_start.push_attribute(("time", seconds(test.duration_ms).as_str()));

    writer.write_event(Event::Start(case_start))?;

    if !test.passed() {
        let mut lines: Vec<&str> = Vec::new();
        if let Some(detail) = &test.detail {
            lines.push(detail);
        }
        lines.extend(test.failed_assertions().map(|a| a.message.as_str()));

        let message = lines.first().copied().unwrap_or("Test failed");
        let kind = if test.detail.is_some() {
            "ExecutionError"
        } else {
            "AssertionError"
        };

        let mut fail_start = BytesStart::new("failure");
        fail_start.push_attribute(("message", message));
        fail_start.push_attribute(("type", kind));
        writer.write_event(Event::Start(fail_start))?;
        writer.write_event(Event::Text(BytesText::new(&lines.join("\n"))))?;
        writer.write_event(Event::End(BytesEnd::new("failure")))?;
    }

    if let Some(execution) = &test.execution.execution_name {
        let state = test
            .execution
            .execution_state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        writer.write_event(Event::Start(BytesStart::new("system-out")))?;
        writer.write_event(Event::Text(BytesText::new(&format!(
            "execution: {}\nstate: {}\npoll attempts: {}",
            execution, state, test.poll_attempts
        ))))?;
        writer.write_event(Event::End(BytesEnd::new("system-out")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Write report to file
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<PathBuf> {
    let xml = generate_junit_xml(results)?;
    let path = output_dir.join(JUNIT_FILE);
    std::fs::write(&path, xml)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertions::AssertionResult;
    use crate::client::ExecutionState;
    use crate::runner::state::{ExecutionSummary, RunSummary, TestStatus};

    fn test_result(name: &str, status: TestStatus) -> WorkflowTestResult {
        WorkflowTestResult {
            test_name: name.to_string(),
            workflow: "orders".to_string(),
            status,
            execution: ExecutionSummary {
                execution_name: Some(format!("projects/p/locations/l/workflows/orders/executions/{}", name)),
                execution_state: Some(ExecutionState::Succeeded),
                ..Default::default()
            },
            assertions: vec![],
            detail: None,
            poll_attempts: 2,
            duration_ms: 1500,
        }
    }

    #[test]
    fn test_generate_junit_xml() {
        let mut failing = test_result("Checkout Flow", TestStatus::Failed);
        failing.assertions.push(AssertionResult {
            key: "result.total".to_string(),
            result: false,
            message: "Assertion failed for 'result.total' (int equals): expected 5 but got 3".to_string(),
        });
        let mut rejected = test_result("Refund Flow", TestStatus::Failed);
        rejected.execution = ExecutionSummary::default();
        rejected.detail = Some("Failed to trigger workflow orders: HTTP 403: denied".to_string());

        let results = TestResults {
            session_id: "test-session".to_string(),
            resources: vec![ResourceResult {
                resource: "workflows".to_string(),
                kind: "workflows".to_string(),
                tests: vec![test_result("Login Flow", TestStatus::Succeeded), failing, rejected],
            }],
            summary: RunSummary {
                total: 3,
                passed: 1,
                failed: 2,
                all_passed: false,
            },
            total_duration_ms: Some(3500),
            generated_at: "2023-01-01 12:00:00".to_string(),
        };

        let xml = generate_junit_xml(&results).expect("Failed to generate XML");

        assert!(xml.contains(r#"<testsuites name="smoke-tester-run""#));
        assert!(xml.contains(r#"<testsuite name="workflows""#));
        assert!(xml.contains(r#"tests="3""#));
        assert!(xml.contains(r#"failures="2""#));
        assert!(xml.contains(r#"<testcase name="Login Flow" classname="workflows.orders""#));
        assert!(xml.contains("expected 5 but got 3"));
        assert!(xml.contains(r#"type="ExecutionError""#));
        assert!(xml.contains("HTTP 403: denied"));
        assert_eq!(xml.matches("<failure").count(), 2);
        assert_eq!(xml.matches("<system-out>").count(), 2);
    }
}
