//! `task` command: lifecycle of the scheduled renewal and auto-update task.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use std::sync::Arc;

use super::CliConfig;
use crate::core::UpdaterError;
use crate::schedule::{CreateOutcome, ScheduledTask};
use crate::utils::process::SystemRunner;

/// Manage the task that runs `certbot renew` and the updater twice a day.
#[derive(Args, Debug)]
pub struct TaskCommand {
    #[command(subcommand)]
    action: TaskAction,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum TaskAction {
    /// Show the task status
    Status,
    /// Create the task and enable it
    Create,
    /// Delete the task
    Delete,
    /// Enable the task
    Enable,
    /// Disable the task without deleting it
    Disable,
}

impl TaskCommand {
    /// Run the selected action.
    pub async fn execute(self, _config: &CliConfig) -> Result<()> {
        if !cfg!(windows) {
            return Err(UpdaterError::PlatformNotSupported {
                operation: "Scheduled task management".to_string(),
            }
            .into());
        }

        let updater_path =
            std::env::current_exe().context("Failed to locate the updater executable")?;
        let task = ScheduledTask::new(Arc::new(SystemRunner), updater_path);
        let name = task.name().to_string();

        match self.action {
            TaskAction::Status => {
                let status = task.status().await?;
                println!("Task name: {}", status.name);
                println!("State: {}", status.state.to_string().cyan());
            }
            TaskAction::Create => match task.create().await? {
                CreateOutcome::AlreadyExists => {
                    println!("{}", format!("The task {name} already exists.").yellow());
                }
                CreateOutcome::Created => {
                    println!("{}", format!("The task {name} has been created and is enabled.").green());
                }
            },
            TaskAction::Delete => {
                task.delete().await?;
                println!("{}", format!("The task {name} has been deleted.").green());
            }
            TaskAction::Enable => {
                task.enable().await?;
                println!("{}", format!("The task {name} has been enabled.").green());
            }
            TaskAction::Disable => {
                task.disable().await?;
                println!("{}", format!("The task {name} has been disabled.").green());
            }
        }
        Ok(())
    }
}
