//! `run` and `check` commands.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CliConfig;
use super::common::build_updater;
use crate::upgrade::{UpdateOutcome, UpgradeDecision};

/// Upgrade Certbot if a newer signed release is available.
///
/// Exits with status 0 when Certbot is already current or was upgraded, and
/// 1 on any failure. Nothing is retried; the next scheduled run tries again.
#[derive(Args, Debug)]
pub struct RunCommand {}

impl RunCommand {
    /// Run the full workflow.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let updater = build_updater(config).await?;

        match updater.run().await? {
            UpdateOutcome::UpToDate {
                current,
                ..
            } => {
                println!("{}", format!("Certbot {current} is up to date").green());
            }
            UpdateOutcome::Installed {
                previous,
                version,
            } => {
                println!("{}", format!("Upgraded Certbot from {previous} to {version}").green().bold());
            }
        }
        Ok(())
    }
}

/// Report whether an upgrade is available without installing it.
#[derive(Args, Debug)]
pub struct CheckCommand {}

impl CheckCommand {
    /// Resolve versions and print the decision.
    pub async fn execute(self, config: &CliConfig) -> Result<()> {
        let updater = build_updater(config).await?;

        match updater.check().await? {
            UpgradeDecision::NoActionNeeded {
                current,
                latest,
            } => {
                println!(
                    "{}",
                    format!("Certbot {current} is up to date (latest release is {latest})").green()
                );
            }
            UpgradeDecision::UpgradeTo {
                current,
                version,
                installer,
            } => {
                println!("{}", format!("Upgrade available: {current} -> {version}").yellow());
                println!("Installer: {}", installer.download_url);
                println!("Run `certbot-updater run` to install it");
            }
        }
        Ok(())
    }
}
