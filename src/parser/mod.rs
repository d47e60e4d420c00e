pub mod types;
pub mod yaml;

pub use types::*;
pub use yaml::{build_plan, load_config, validate_config, Severity, ValidationIssue};
