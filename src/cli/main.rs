//! PAD lane detection demo CLI
//!
//! Parses arguments, sets up tracing and runs the demo pipeline against the
//! chosen PAD root, printing progress to stdout.

use super::config::CliConfigBuilder;
use crate::{
    pipeline::DemoPipeline,
    report::Console,
    tracing_config::{events, init_cli_tracing, TracingFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run the PAD lane detection demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "pad-lane-demo")]
pub struct Cli {
    /// PyTorch Auto Drive root directory [default: .]
    #[arg(long, value_name = "PATH", env = "PAD_DEMO_ROOT")]
    pub root: Option<PathBuf>,

    /// Python interpreter used for the visualization scripts [default: python]
    #[arg(long, value_name = "PROGRAM")]
    pub python: Option<String>,

    /// JSON file overriding the default demo configuration
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-request download timeout in seconds [default: none]
    #[arg(long, value_name = "SECS")]
    pub fetch_timeout: Option<u64>,

    /// Disable download progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format on stderr
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = TracingFormat::Console)]
    pub log_format: TracingFormat,
}

/// Main CLI entry point
///
/// Returns a failure exit code when the run ends before the summary.
pub async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let session_id =
        init_cli_tracing(cli.verbose, cli.log_format).context("Failed to initialize tracing")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    tracing::debug!(
        session_id = %session_id,
        root = %config.root.display(),
        "Resolved configuration"
    );

    let pipeline = DemoPipeline::from_config(config).context("Failed to set up demo")?;

    let mut console = Console::stdout();
    let report = pipeline.run(&mut console).await;

    if let Some(error) = &report.failure {
        events::error_with_context(error, &format!("demo stopped at {}", report.final_stage()));
    }

    if report.completed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
