use super::types::{
    PollingOverrides, ResourcePlan, ResourceSpec, SmokeConfig, WorkflowTestPlan,
    WorkflowTestSpec,
};
use crate::assertions::AssertionKind;
use crate::client::WorkflowTarget;
use crate::error::ConfigError;
use crate::utils::config::Config;
use anyhow::Result;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load a config file, or every YAML file under a directory
pub fn load_config(path: &Path) -> Result<SmokeConfig> {
    let files = collect_config_files(path)?;

    let mut config = SmokeConfig::default();
    for file in &files {
        log::debug!("Loading config file {}", file.display());
        config.merge(parse_config_file(file)?);
    }
    Ok(config)
}

/// Parse a single YAML config file
pub fn parse_config_file(path: &Path) -> Result<SmokeConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Invalid {
        path: path.display().to_string(),
        message: format!("failed to read file: {}", e),
    })?;

    parse_yaml_content(&content, path)
}

/// Parse YAML content into a SmokeConfig
pub fn parse_yaml_content(content: &str, source_path: &Path) -> Result<SmokeConfig> {
    serde_yaml::from_str(content).map_err(|e| {
        ConfigError::Invalid {
            path: source_path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

fn collect_config_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        return Err(ConfigError::Invalid {
            path: path.display().to_string(),
            message: "path does not exist".to_string(),
        }
        .into());
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ConfigError::NoConfigFiles(path.display().to_string()).into());
    }
    Ok(files)
}

/// How serious a validation finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One problem found while validating a config
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Location in the config, e.g. `workflows/Sample-test/assertions[1]`
    pub location: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}: {}", level, self.location, self.message)
    }
}

/// Check a loaded config for problems that would make a run meaningless.
///
/// Unknown assertion kinds are warnings: they still run and fail at
/// evaluation time.
pub fn validate_config(config: &SmokeConfig) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if config.resources.is_empty() {
        issues.push(error("config", "no resources declared"));
    }
    if config.max_parallel == Some(0) {
        issues.push(error("config", "max_parallel must be at least 1"));
    }
    validate_polling(&config.defaults, "defaults", &mut issues);

    for resource in &config.resources {
        let resource_name = resource.display_name();
        if resource.tests.is_empty() {
            issues.push(warning(&resource_name, "resource has no tests"));
        }

        let mut seen = HashSet::new();
        for test in &resource.tests {
            let location = format!("{}/{}", resource_name, test.name);
            if !seen.insert(test.name.as_str()) {
                issues.push(error(&location, "duplicate test name in resource"));
            }
            validate_test(config, test, &location, &mut issues);
        }
    }

    issues
}

fn validate_test(
    config: &SmokeConfig,
    test: &WorkflowTestSpec,
    location: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    if test.name.trim().is_empty() {
        issues.push(error(location, "test name is empty"));
    }
    if test.workflow.trim().is_empty() {
        issues.push(error(location, "workflow is empty"));
    }
    if test.project_id.as_ref().or(config.project_id.as_ref()).is_none() {
        issues.push(error(location, "project_id is not set for test or config"));
    }
    if test.location.as_ref().or(config.location.as_ref()).is_none() {
        issues.push(error(location, "location is not set for test or config"));
    }

    let effective = test.polling.or(&config.defaults);
    validate_polling(&effective, location, issues);

    for (index, assertion) in test.assertions.iter().enumerate() {
        let at = format!("{}/assertions[{}]", location, index);
        match AssertionKind::resolve(&assertion.data_type, &assertion.method) {
            None => issues.push(warning(
                &at,
                &format!(
                    "unknown assertion strategy (type '{}', method '{}')",
                    assertion.data_type, assertion.method
                ),
            )),
            Some(kind) if !kind.method.is_unary() && assertion.expected.is_none() => {
                issues.push(warning(
                    &at,
                    &format!("method '{}' needs an expected value", kind.method),
                ))
            }
            Some(_) => {}
        }
        if assertion.key.trim().is_empty() {
            issues.push(error(&at, "assertion key is empty"));
        }
    }
}

fn validate_polling(polling: &PollingOverrides, location: &str, issues: &mut Vec<ValidationIssue>) {
    let builtin = Config::default();
    let initial = polling
        .initial_delay_seconds
        .unwrap_or(builtin.initial_delay_ms as f64 / 1000.0);
    let max = polling
        .max_delay_seconds
        .unwrap_or(builtin.max_delay_ms as f64 / 1000.0);

    if Duration::try_from_secs_f64(initial).is_err() {
        issues.push(error(
            location,
            "initial_delay_seconds must be a non-negative number of representable size",
        ));
    }
    if Duration::try_from_secs_f64(max).is_err() {
        issues.push(error(
            location,
            "max_delay_seconds must be a non-negative number of representable size",
        ));
    }
    if initial.is_finite() && max.is_finite() && initial > max {
        issues.push(error(
            location,
            &format!(
                "initial_delay_seconds ({}) exceeds max_delay_seconds ({})",
                initial, max
            ),
        ));
    }
    if polling.max_retries == Some(0) {
        issues.push(error(location, "max_retries must be at least 1"));
    }
    if polling.timeout_seconds == Some(0) {
        issues.push(error(location, "timeout_seconds must be at least 1"));
    }
}

fn error(location: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        severity: Severity::Error,
        location: location.to_string(),
        message: message.to_string(),
    }
}

fn warning(location: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        severity: Severity::Warning,
        location: location.to_string(),
        message: message.to_string(),
    }
}

/// Validate and resolve a config into executable resource plans.
///
/// Errors always abort; warnings abort only when `strict` is set.
pub fn build_plan(
    config: &SmokeConfig,
    source: &Path,
    strict: bool,
) -> Result<Vec<ResourcePlan>, ConfigError> {
    let issues = validate_config(config);
    for issue in issues.iter().filter(|i| i.severity == Severity::Warning) {
        log::warn!("{}", issue);
    }

    let blocking: Vec<String> = issues
        .iter()
        .filter(|i| strict || i.severity == Severity::Error)
        .map(|i| i.to_string())
        .collect();
    if !blocking.is_empty() {
        return Err(ConfigError::Invalid {
            path: source.display().to_string(),
            message: blocking.join("; "),
        });
    }

    let builtin = Config::default();
    Ok(config
        .resources
        .iter()
        .map(|resource| plan_resource(config, resource, &builtin))
        .collect())
}

fn plan_resource(config: &SmokeConfig, resource: &ResourceSpec, builtin: &Config) -> ResourcePlan {
    let tests = resource
        .tests
        .iter()
        .map(|test| WorkflowTestPlan {
            name: test.name.clone(),
            target: WorkflowTarget {
                // Presence checked by validate_config
                project: test
                    .project_id
                    .clone()
                    .or_else(|| config.project_id.clone())
                    .unwrap_or_default(),
                location: test
                    .location
                    .clone()
                    .or_else(|| config.location.clone())
                    .unwrap_or_default(),
                workflow: test.workflow.clone(),
            },
            argument: test.argument.clone(),
            polling: test.polling.or(&config.defaults).resolve(builtin),
            assertions: test.assertions.clone(),
        })
        .collect();

    ResourcePlan {
        name: resource.display_name(),
        kind: resource.kind,
        tests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
project_id: demo-project
location: europe-west1
defaults:
  initial_delay_seconds: 1
  max_delay_seconds: 8
resources:
  - type: workflows
    tests:
      - name: Sample-test
        workflow: sample-workflow
        argument:
          input: 1
        polling:
          max_retries: 5
        assertions:
          - key: state
            type: string
            method: equals
            expected: SUCCEEDED
          - key: result.count
            type: int
            method: equals
            expected: 5
      - name: ComplexResponseTest
        workflow: complex-workflow
        location: us-central1
        assertions:
          - key: result.items
            type: list
            method: is_truthy
"#;

    #[test]
    fn test_parse_simple_config() {
        let config = parse_yaml_content(SAMPLE, Path::new("smoke.yaml")).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("demo-project"));
        assert_eq!(config.resources.len(), 1);
        assert_eq!(config.test_count(), 2);

        let first = &config.resources[0].tests[0];
        assert_eq!(first.assertions.len(), 2);
        assert_eq!(first.assertions[1].expected, Some(serde_json::json!(5)));
        assert!(config.resources[0].tests[1].assertions[0].expected.is_none());
    }

    #[test]
    fn test_build_plan_resolves_polling_and_target() {
        let config = parse_yaml_content(SAMPLE, Path::new("smoke.yaml")).unwrap();
        let plan = build_plan(&config, Path::new("smoke.yaml"), false).unwrap();

        let first = &plan[0].tests[0];
        assert_eq!(first.polling.initial_delay, Duration::from_secs(1));
        assert_eq!(first.polling.max_delay, Duration::from_secs(8));
        assert_eq!(first.polling.max_retries, 5);
        assert_eq!(first.polling.timeout, Duration::from_secs(Config::default().timeout_secs));

        let second = &plan[0].tests[1];
        assert_eq!(second.target.project, "demo-project");
        assert_eq!(second.target.location, "us-central1");
        assert_eq!(second.polling.max_retries, Config::default().max_retries);
    }

    #[test]
    fn test_unknown_resource_type_is_config_error() {
        let yaml = r#"
resources:
  - type: buckets
    tests: []
"#;
        let err = parse_yaml_content(yaml, Path::new("bad.yaml")).unwrap_err();
        let config_err = err.downcast_ref::<ConfigError>().expect("config error");
        assert!(matches!(config_err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("buckets"));
    }

    #[test]
    fn test_unknown_assertion_is_warning_unless_strict() {
        let yaml = r#"
project_id: p
location: l
resources:
  - type: workflows
    tests:
      - name: t
        workflow: w
        assertions:
          - key: result
            type: uuid
            method: equals
            expected: abc
"#;
        let config = parse_yaml_content(yaml, Path::new("a.yaml")).unwrap();
        let issues = validate_config(&config);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.contains("uuid"));

        assert!(build_plan(&config, Path::new("a.yaml"), false).is_ok());
        assert!(build_plan(&config, Path::new("a.yaml"), true).is_err());
    }

    #[test]
    fn test_validation_errors() {
        let yaml = r#"
resources:
  - type: workflows
    tests:
      - name: dup
        workflow: w
        polling:
          initial_delay_seconds: 10
          max_delay_seconds: 1
          max_retries: 0
      - name: dup
        workflow: ""
"#;
        let config = parse_yaml_content(yaml, Path::new("b.yaml")).unwrap();
        let messages: Vec<String> = validate_config(&config)
            .into_iter()
            .filter(|i| i.severity == Severity::Error)
            .map(|i| i.message)
            .collect();

        assert!(messages.iter().any(|m| m.contains("duplicate test name")));
        assert!(messages.iter().any(|m| m.contains("workflow is empty")));
        assert!(messages.iter().any(|m| m.contains("project_id is not set")));
        assert!(messages.iter().any(|m| m.contains("exceeds max_delay_seconds")));
        assert!(messages.iter().any(|m| m.contains("max_retries must be at least 1")));
    }

    #[test]
    fn test_load_config_directory_merges_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "project_id: p\nlocation: l\nresources:\n  - type: workflows\n    tests:\n      - name: one\n        workflow: w1\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "project_id: ignored\nresources:\n  - type: workflows\n    name: second\n    tests:\n      - name: two\n        workflow: w2\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not yaml").unwrap();

        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.project_id.as_deref(), Some("p"));
        assert_eq!(config.resources.len(), 2);
        assert_eq!(config.resources[1].display_name(), "second");
    }

    #[test]
    fn test_oversized_delay_is_config_error() {
        let yaml = r#"
project_id: p
location: l
defaults:
  max_delay_seconds: 1.0e20
resources:
  - type: workflows
    tests:
      - name: t
        workflow: w
"#;
        let config = parse_yaml_content(yaml, Path::new("c.yaml")).unwrap();
        let issues = validate_config(&config);
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("max_delay_seconds")));

        let err = build_plan(&config, Path::new("c.yaml"), false).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        // Unvalidated resolution falls back instead of panicking
        let polling = config.defaults.resolve(&Config::default());
        assert_eq!(
            polling.max_delay,
            Duration::from_millis(Config::default().max_delay_ms)
        );
    }

    #[test]
    fn test_unreadable_config_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_file = dir.path().join("x.yaml");
        std::fs::create_dir(&not_a_file).unwrap();

        let err = parse_config_file(&not_a_file).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Invalid { path, message }) => {
                assert!(path.ends_with("x.yaml"));
                assert!(message.contains("failed to read file"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_load_config_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NoConfigFiles(_))
        ));
    }
}
