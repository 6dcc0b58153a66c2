//! Command-line interface for the Certbot updater.
//!
//! # Available Commands
//!
//! - `run` - Upgrade Certbot if a newer signed release is available
//! - `check` - Report whether an upgrade is available without installing
//! - `task` - Manage the scheduled renewal and auto-update task
//!
//! # Global Options
//!
//! - `--verbose` / `-v`: Debug output
//! - `--quiet` / `-q`: Errors only
//! - `--config` / `-c`: Alternate configuration file
//!
//! Logging goes to stdout through `tracing-subscriber`; `RUST_LOG` overrides
//! the level chosen by the flags.
//!
//! # Examples
//!
//! ```bash
//! # Unattended upgrade, as run by the scheduled task
//! certbot-updater run
//!
//! # See what would happen
//! certbot-updater check --verbose
//!
//! # Register the scheduled task (elevated shell)
//! certbot-updater task create
//! ```

mod common;
mod task;
mod upgrade;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Runtime settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter directive; `None` keeps only errors
    pub log_level: Option<String>,
    /// Alternate configuration file
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Install the global tracing subscriber.
    ///
    /// `RUST_LOG` wins over the configured level. Calling this twice is harmless.
    pub fn init_logging(&self) {
        let default_level = self.log_level.clone().unwrap_or_else(|| "error".to_string());
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stdout)
            .with_target(false)
            .try_init();
    }
}

/// Keeps Certbot for Windows up to date with signed releases.
#[derive(Parser)]
#[command(
    name = "certbot-updater",
    about = "Keep Certbot up to date with signed releases",
    version,
    long_about = "Checks the Certbot release feed, and when a newer release exists downloads its installer, \
                  verifies the Authenticode signature against the pinned publisher key, then reinstalls Certbot silently."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to an alternate configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Upgrade Certbot if a newer release is available
    Run(upgrade::RunCommand),

    /// Report whether an upgrade is available without installing it
    Check(upgrade::CheckCommand),

    /// Manage the scheduled renewal and auto-update task
    Task(task::TaskCommand),
}

impl Cli {
    /// Execute the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Translate the global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Execute with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute(&config).await,
            Commands::Check(cmd) => cmd.execute(&config).await,
            Commands::Task(cmd) => cmd.execute(&config).await,
        }
    }
}
