use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smoke_tester::error::ConfigError;
use smoke_tester::parser::{self, Severity};
use smoke_tester::utils::config::CONFIG_PATH_ENV;
use smoke_tester::{report, runner};

const EXIT_CONFIG_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "smoke-tester")]
#[command(version = "0.1.0")]
#[command(about = "Smoke tests for deployed Cloud Workflows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger every configured workflow test and check the results
    Run {
        /// Config file or directory (defaults to $SMOKE_TEST_PATH)
        path: Option<PathBuf>,

        /// Output directory for reports
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Write test-results.json and junit.xml
        #[arg(long, default_value = "false")]
        report: bool,

        /// Treat config warnings as errors
        #[arg(long, default_value = "false")]
        strict: bool,

        /// Debug logging
        #[arg(short, long, default_value = "false")]
        verbose: bool,
    },

    /// Load and validate config without calling the API
    Validate {
        /// Config file or directory (defaults to $SMOKE_TEST_PATH)
        path: Option<PathBuf>,
    },

    /// Generate report from test results
    Report {
        /// Path to test results JSON
        results: PathBuf,

        /// Output format (json, junit)
        #[arg(short, long, default_value = "junit")]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
}

fn resolve_path(path: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match path {
        Some(p) => Ok(p),
        None => std::env::var_os(CONFIG_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingConfigPath(CONFIG_PATH_ENV)),
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Run {
            path,
            output,
            report,
            strict,
            verbose,
        } => {
            init_logging(verbose);
            let path = resolve_path(path)?;

            println!(
                "{} Running smoke tests from: {}",
                "▶".green().bold(),
                path.display()
            );

            let cancel = Arc::new(AtomicBool::new(false));
            let cancel_handler = cancel.clone();
            ctrlc::set_handler(move || {
                println!("\n\n{} Cancelling, waiting for pollers to stop...", "⏹️ ".yellow());
                cancel_handler.store(true, Ordering::SeqCst);
            })?;

            let options = runner::RunOptions {
                output,
                report,
                strict,
            };
            let summary = runner::run_smoke_tests(&path, &options, cancel).await?;
            Ok(summary.exit_code())
        }

        Commands::Validate { path } => {
            init_logging(false);
            let path = resolve_path(path)?;
            let config = parser::load_config(&path)?;
            let issues = parser::validate_config(&config);

            for issue in &issues {
                match issue.severity {
                    Severity::Error => println!("{} {}", "✗".red(), issue),
                    Severity::Warning => println!("{} {}", "!".yellow(), issue),
                }
            }

            let errors = issues
                .iter()
                .filter(|i| i.severity == Severity::Error)
                .count();
            if errors > 0 {
                println!(
                    "{} {} error(s), {} warning(s)",
                    "✗".red().bold(),
                    errors,
                    issues.len() - errors
                );
                return Ok(EXIT_CONFIG_ERROR);
            }

            println!(
                "{} {} ({} tests, {} warning(s))",
                "✓".green().bold(),
                path.display(),
                config.test_count(),
                issues.len()
            );
            Ok(0)
        }

        Commands::Report {
            results,
            format,
            output,
        } => {
            init_logging(false);
            println!(
                "{} Generating {} report from: {}",
                "📊".to_string().blue(),
                format.cyan(),
                results.display()
            );
            report::generate_report(&results, &format, output.as_deref())
                .await
                .with_context(|| format!("Failed to render {}", results.display()))?;
            Ok(0)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            if e.downcast_ref::<ConfigError>().is_some() {
                EXIT_CONFIG_ERROR
            } else {
                1
            }
        }
    };

    std::process::exit(code);
}
