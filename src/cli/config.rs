//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{DemoConfig, DemoConfigBuilder};
use anyhow::{Context, Result};

/// Convert CLI arguments to a `DemoConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the configuration: file (or defaults) first, then flags on top
    pub(crate) fn from_cli(cli: &Cli) -> Result<DemoConfig> {
        let base = match &cli.config {
            Some(path) => DemoConfig::from_json_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => DemoConfig::default(),
        };

        let mut builder = DemoConfigBuilder::from_config(base);
        if let Some(root) = &cli.root {
            builder = builder.root(root);
        }
        if let Some(python) = &cli.python {
            builder = builder.python(python);
        }
        if cli.fetch_timeout.is_some() {
            builder = builder.fetch_timeout_secs(cli.fetch_timeout);
        }
        if cli.no_progress {
            builder = builder.show_progress(false);
        }

        builder.build().context("Invalid configuration")
    }
}
