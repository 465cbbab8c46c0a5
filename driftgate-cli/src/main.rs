//! driftgate CLI — run the data validation gate from the terminal.
//!
//! Exit codes: 0 when the data passes, 1 when validation fails, 2 on any
//! runtime error (unreadable input, unwritable output, bad configuration).

mod commands;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// driftgate: schema and drift validation for training data
#[derive(Parser, Debug)]
#[command(name = "driftgate", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (relative paths are resolved against it)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Extra configuration file; takes precedence over the workspace config
    /// and DRIFTGATE_* environment variables, but not over command flags
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the full gate: schema checks, drift detection, persistence
    Validate {
        /// Train (base) dataset
        #[arg(long)]
        train: Option<PathBuf>,
        /// Test (candidate) dataset
        #[arg(long)]
        test: Option<PathBuf>,
        /// Schema contract
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Directory for validated datasets and the drift report
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// p-values below this are drift
        #[arg(long)]
        threshold: Option<f64>,
        /// Also write failing datasets under invalid/
        #[arg(long)]
        route_invalid: bool,
        /// Write the validation artifact as JSON to this path
        #[arg(long)]
        artifact: Option<PathBuf>,
    },
    /// Compare two datasets column by column without the schema check
    Drift {
        /// Base (reference) dataset
        #[arg(long)]
        base: PathBuf,
        /// Candidate dataset
        #[arg(long)]
        candidate: PathBuf,
        /// p-values below this are drift
        #[arg(long)]
        threshold: Option<f64>,
        /// Write the drift report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Check one dataset against a schema contract
    Schema {
        /// Dataset to check
        #[arg(long)]
        dataset: PathBuf,
        /// Schema contract (defaults to the configured one)
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Pretty-print a drift report
    Report {
        /// Path to a report written by `validate` or `drift`
        path: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "driftgate", "driftgate")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "driftgate.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let options = commands::GlobalOptions {
        workspace,
        config_file: cli.config,
    };
    match commands::handle_command(cli.command, &options).await {
        Ok(verdict) => verdict.exit_code(),
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
