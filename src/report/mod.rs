pub mod console;
pub mod json;
pub mod junit;
pub mod types;

use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::runner::state::TestSessionReport;

/// Re-render a saved `test-results.json` in another format
pub async fn generate_report(
    results_path: &Path,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let results = std::fs::read_to_string(results_path)?;
    let test_results: types::TestResults = serde_json::from_str(&results)?;

    match format {
        "json" => json::generate(&test_results, output).await,
        "junit" => {
            let xml = junit::generate_junit_xml(&test_results)?;
            match output {
                Some(path) => {
                    std::fs::write(path, xml)?;
                    println!("JUnit report saved to: {}", path.display());
                }
                None => println!("{}", xml),
            }
            Ok(())
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}

/// Write `test-results.json` and `junit.xml` for a finished session
pub fn write_reports(session: &TestSessionReport, output_dir: &Path) -> Result<()> {
    let results = types::TestResults::from(session);

    let json_path = json::write_report(&results, output_dir)?;
    println!(
        "\n{} JSON report saved to: {}",
        "📄".to_string().blue(),
        json_path.display().to_string().cyan()
    );

    let junit_path = junit::write_report(&results, output_dir)?;
    println!(
        "{} JUnit report saved to: {}",
        "📊".to_string().blue(),
        junit_path.display().to_string().cyan()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::state::{ResourceResult, RunSummary};

    fn session() -> TestSessionReport {
        TestSessionReport {
            session_id: "s-1".into(),
            resources: vec![ResourceResult {
                resource: "workflows".into(),
                kind: "workflows".into(),
                tests: vec![],
            }],
            summary: RunSummary {
                all_passed: true,
                ..Default::default()
            },
            total_duration_ms: Some(12),
        }
    }

    #[tokio::test]
    async fn test_written_results_can_be_regenerated() {
        let dir = tempfile::tempdir().unwrap();
        write_reports(&session(), dir.path()).unwrap();

        let results_path = dir.path().join(json::RESULTS_FILE);
        assert!(results_path.exists());
        assert!(dir.path().join(junit::JUNIT_FILE).exists());

        let out = dir.path().join("regenerated.xml");
        generate_report(&results_path, "junit", Some(&out)).await.unwrap();
        let xml = std::fs::read_to_string(out).unwrap();
        assert!(xml.contains(r#"<testsuite name="workflows""#));
    }

    #[tokio::test]
    async fn test_unknown_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_reports(&session(), dir.path()).unwrap();
        let err = generate_report(&dir.path().join(json::RESULTS_FILE), "html", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown format"));
    }
}
