//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Test Suite and Vault Execution Engine
#[derive(Parser, Debug)]
#[command(name = "crucible")]
#[command(author = "hephaex@gmail.com")]
#[command(version = "0.1.2")]
#[command(about = "Run test suites and multi-phase vault pipelines")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a configuration file
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a test suite
    Run(RunArgs),

    /// Run a vault pipeline
    Vault(VaultArgs),

    /// List available suites and vaults
    List(ListArgs),

    /// View archived results
    Results(ResultsArgs),

    /// Validate definition files
    Check(CheckArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite id to execute
    pub suite: String,

    /// Run cases in parallel
    #[arg(short, long)]
    pub parallel: bool,

    /// Number of concurrent cases (when parallel)
    #[arg(short = 'c', long)]
    pub max_concurrent: Option<usize>,

    /// Whole-run timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Webhook URL notified when the run finishes
    #[arg(long)]
    pub notify: Option<String>,

    /// Only notify when the run fails
    #[arg(long)]
    pub notify_on_failure: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Definitions directory
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Status poll interval in milliseconds
    #[arg(long, default_value = "250")]
    pub poll_ms: u64,
}

/// Arguments for the vault command
#[derive(Parser, Debug)]
pub struct VaultArgs {
    /// Vault id to execute
    pub vault: String,

    /// Webhook URL notified when the pipeline finishes
    #[arg(long)]
    pub notify: Option<String>,

    /// Only notify when the pipeline fails
    #[arg(long)]
    pub notify_on_failure: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Definitions directory
    #[arg(short, long)]
    pub dir: Option<String>,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Show per-case and per-phase lines
    #[arg(short, long)]
    pub detailed: bool,

    /// Definitions directory
    #[arg(long)]
    pub dir: Option<String>,
}

/// Arguments for the results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Show one archived execution
    #[arg(short, long)]
    pub execution: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export results to a CSV file
    #[arg(long)]
    pub export: Option<String>,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Definitions directory
    #[arg(short, long)]
    pub dir: Option<String>,
}
