pub mod assertions;
pub mod client;
pub mod error;
pub mod extract;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use error::{ClientError, ConfigError, PollError};
pub use report::generate_report;
pub use runner::{run_smoke_tests, RunOptions};
