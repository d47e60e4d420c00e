use super::types::TestResults;
use anyhow::Result;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE: &str = "test-results.json";

/// Generate JSON report
pub async fn generate(results: &TestResults, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Write `test-results.json` into `output_dir`
pub fn write_report(results: &TestResults, output_dir: &Path) -> Result<PathBuf> {
    let path = output_dir.join(RESULTS_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(results)?)?;
    Ok(path)
}
