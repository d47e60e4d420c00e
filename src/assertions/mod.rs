pub mod compare;
pub mod kind;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::{self, Extracted};
use crate::parser::types::AssertionSpec;

pub use kind::{AssertionKind, Comparison, DataType, Method};

/// Outcome of one assertion against one execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub key: String,
    pub result: bool,
    pub message: String,
}

impl AssertionResult {
    fn pass(spec: &AssertionSpec, kind: &AssertionKind, actual: &Extracted<'_>) -> Self {
        let message = match &spec.expected {
            Some(expected) if !kind.method.is_unary() => format!(
                "'{}' {} {} ({}): got {}",
                spec.key, kind.method, expected, kind.data_type, actual
            ),
            _ => format!("'{}' {} ({}): got {}", spec.key, kind.method, kind.data_type, actual),
        };
        Self {
            key: spec.key.clone(),
            result: true,
            message,
        }
    }

    fn fail(spec: &AssertionSpec, message: String) -> Self {
        Self {
            key: spec.key.clone(),
            result: false,
            message,
        }
    }
}

/// Evaluate every assertion against the document, one result each, in order.
pub fn evaluate_assertions(document: &Value, specs: &[AssertionSpec]) -> Vec<AssertionResult> {
    specs
        .iter()
        .map(|spec| evaluate_assertion(document, spec))
        .collect()
}

/// Evaluate a single assertion. Never panics on bad config or data.
pub fn evaluate_assertion(document: &Value, spec: &AssertionSpec) -> AssertionResult {
    let Some(kind) = AssertionKind::resolve(&spec.data_type, &spec.method) else {
        log::warn!(
            "Unknown assertion strategy for '{}': type '{}', method '{}'",
            spec.key,
            spec.data_type,
            spec.method
        );
        return AssertionResult::fail(
            spec,
            format!(
                "Unknown assertion strategy: type '{}' with method '{}'",
                spec.data_type, spec.method
            ),
        );
    };

    // A malformed path compares as absent; the parse problem goes in the message
    let (actual, path_error) = match extract::lookup(document, &spec.key) {
        Ok(actual) => (actual, None),
        Err(e) => {
            log::warn!("Invalid key path '{}': {}", spec.key, e);
            (Extracted::Absent, Some(format!(" [invalid key path: {}]", e)))
        }
    };
    let path_note = path_error.unwrap_or_default();

    let outcome = match (kind.comparison(), &spec.expected) {
        (Comparison::Unary(check), _) => check(&actual),
        (Comparison::Binary(check), Some(expected)) => check(&actual, expected, kind.data_type),
        (Comparison::Binary(_), None) => Err(format!("method '{}' needs an expected value", kind.method)),
    };

    match outcome {
        Ok(()) => {
            log::debug!("Assertion passed for '{}'", spec.key);
            let mut result = AssertionResult::pass(spec, &kind, &actual);
            result.message.push_str(&path_note);
            result
        }
        Err(cause) => {
            log::debug!("Assertion failed for '{}': {}", spec.key, cause);
            AssertionResult::fail(
                spec,
                format!(
                    "Assertion failed for '{}' ({}): {}{}",
                    spec.key, kind, cause, path_note
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(key: &str, data_type: &str, method: &str, expected: Option<Value>) -> AssertionSpec {
        AssertionSpec {
            key: key.to_string(),
            data_type: data_type.to_string(),
            method: method.to_string(),
            expected,
        }
    }

    #[test]
    fn test_int_equals_pass_and_fail() {
        let assertion = spec("result.count", "int", "equals", Some(json!(5)));

        let passing = evaluate_assertion(&json!({"result": {"count": 5}}), &assertion);
        assert!(passing.result);
        assert_eq!(passing.key, "result.count");

        let failing = evaluate_assertion(&json!({"result": {"count": 3}}), &assertion);
        assert!(!failing.result);
        assert!(failing.message.contains("result.count"));
        assert!(failing.message.contains("expected 5"));
        assert!(failing.message.contains("got 3"));
    }

    #[test]
    fn test_missing_key_truthiness() {
        let doc = json!({"result": {}});
        assert!(!evaluate_assertion(&doc, &spec("result.flag", "bool", "is_truthy", None)).result);
        assert!(evaluate_assertion(&doc, &spec("result.flag", "bool", "is_falsy", None)).result);
        assert!(evaluate_assertion(&doc, &spec("result.flag", "any", "is_null", None)).result);
    }

    #[test]
    fn test_unary_ignores_expected_value() {
        let doc = json!({"result": {"items": [1]}});
        let result = evaluate_assertion(&doc, &spec("result.items", "list", "is_truthy", Some(json!(false))));
        assert!(result.result);
    }

    #[test]
    fn test_unknown_strategy_produces_single_failure() {
        let doc = json!({"state": "SUCCEEDED"});
        let specs = vec![
            spec("state", "uuid", "equals", Some(json!("x"))),
            spec("state", "string", "equals", Some(json!("SUCCEEDED"))),
        ];

        let results = evaluate_assertions(&doc, &specs);
        assert_eq!(results.len(), 2);
        assert!(!results[0].result);
        assert!(results[0].message.contains("Unknown assertion strategy"));
        assert!(results[0].message.contains("uuid"));
        assert!(results[0].message.contains("equals"));
        assert!(results[1].result);
    }

    #[test]
    fn test_missing_expected_and_bad_path() {
        let doc = json!({"result": 1});
        let missing = evaluate_assertion(&doc, &spec("result", "int", "greater_than", None));
        assert!(!missing.result);
        assert!(missing.message.contains("needs an expected value"));

        let bad_path = evaluate_assertion(&doc, &spec("result..x", "int", "is_not_null", None));
        assert!(!bad_path.result);
        assert!(bad_path.message.contains("invalid key path"));
        assert!(bad_path.message.contains("empty segment"));
    }

    #[test]
    fn test_malformed_path_compares_as_absent() {
        let doc = json!({"result": 1});

        let falsy = evaluate_assertion(&doc, &spec("result..x", "any", "is_falsy", None));
        assert!(falsy.result);
        assert!(falsy.message.contains("invalid key path"));

        let null = evaluate_assertion(&doc, &spec("result[", "any", "is_null", None));
        assert!(null.result);
        assert!(null.message.contains("unclosed '['"));

        let equals = evaluate_assertion(&doc, &spec("result..x", "int", "equals", Some(json!(1))));
        assert!(!equals.result);
        assert!(equals.message.contains("invalid key path"));
    }

    #[test]
    fn test_failures_do_not_short_circuit() {
        let doc = json!({"result": {"a": 1, "b": "x"}});
        let specs = vec![
            spec("result.a", "int", "equals", Some(json!(2))),
            spec("result.b", "string", "equals", Some(json!("x"))),
            spec("result.c", "string", "is_not_null", None),
        ];
        let outcomes: Vec<bool> = evaluate_assertions(&doc, &specs)
            .iter()
            .map(|r| r.result)
            .collect();
        assert_eq!(outcomes, vec![false, true, false]);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let doc = json!({"state": "SUCCEEDED", "result": {"count": 3}});
        let specs = vec![
            spec("state", "string", "equals", Some(json!("SUCCEEDED"))),
            spec("result.count", "int", "greater_than", Some(json!(5))),
            spec("result.none", "weird", "equals", None),
        ];
        assert_eq!(evaluate_assertions(&doc, &specs), evaluate_assertions(&doc, &specs));
    }
}
