//! Windows scheduled task that renews certificates and runs the updater.
//!
//! The task runs `certbot renew` followed by `certbot-updater run` twice a
//! day as `SYSTEM`. All operations go through PowerShell's ScheduledTasks
//! module on the [`CommandRunner`] seam; PowerShell reports most failures on
//! stderr with a zero exit code, so any stderr output counts as an error.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::constants::SCHEDULED_TASK_NAME;
use crate::core::UpdaterError;
use crate::utils::powershell;
use crate::utils::process::CommandRunner;
use crate::utils::security::powershell_literal;

const IS_ADMIN_SCRIPT: &str = "([Security.Principal.WindowsPrincipal][Security.Principal.WindowsIdentity]::GetCurrent()).IsInRole([Security.Principal.WindowsBuiltInRole]::Administrator)";

/// State of a scheduled task as reported by the Task Scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// 0
    Unknown,
    /// 1
    Disabled,
    /// 2
    Queued,
    /// 3
    Ready,
    /// 4
    Running,
}

impl TaskState {
    /// Map the numeric `State` property of `Get-ScheduledTask`.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Disabled,
            2 => Self::Queued,
            3 => Self::Ready,
            4 => Self::Running,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "Unknown",
            Self::Disabled => "Disabled",
            Self::Queued => "Queued",
            Self::Ready => "Ready",
            Self::Running => "Running",
        };
        f.write_str(name)
    }
}

/// Name and state of the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatus {
    /// Registered task name
    pub name: String,
    /// Current state
    pub state: TaskState,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawTask {
    task_name: String,
    #[serde(default)]
    state: Option<i64>,
}

/// Result of [`ScheduledTask::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The task was registered
    Created,
    /// A task with the same name was already registered
    AlreadyExists,
}

/// Manages the renewal and auto-update task.
pub struct ScheduledTask {
    runner: Arc<dyn CommandRunner>,
    name: String,
    updater_path: PathBuf,
}

impl ScheduledTask {
    /// Task named [`SCHEDULED_TASK_NAME`] running the updater at `updater_path`.
    pub fn new(runner: Arc<dyn CommandRunner>, updater_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            name: SCHEDULED_TASK_NAME.to_string(),
            updater_path: updater_path.into(),
        }
    }

    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the current process runs with administrative rights.
    pub async fn is_admin(&self) -> Result<bool, UpdaterError> {
        let output = powershell::run_script(self.runner.as_ref(), IS_ADMIN_SCRIPT)
            .await?
            .check(powershell::POWERSHELL)?;
        Ok(output.stdout.trim().eq_ignore_ascii_case("true"))
    }

    async fn require_admin(&self) -> Result<(), UpdaterError> {
        if self.is_admin().await? { Ok(()) } else { Err(UpdaterError::AdminRightsRequired) }
    }

    async fn run(&self, operation: &str, script: &str) -> Result<String, UpdaterError> {
        debug!("Scheduled task: {} {}", operation, self.name);
        let output = powershell::run_script(self.runner.as_ref(), script).await?;
        let stderr = output.stderr.trim();
        if !stderr.is_empty() || !output.success() {
            return Err(UpdaterError::ScheduledTaskCommand {
                operation: operation.to_string(),
                name: self.name.clone(),
                stderr: if stderr.is_empty() {
                    format!("powershell exited with {:?}", output.code)
                } else {
                    stderr.to_string()
                },
            });
        }
        Ok(output.stdout)
    }

    /// Current state of the task.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::TaskNotFound`] when the task is not registered.
    pub async fn status(&self) -> Result<TaskStatus, UpdaterError> {
        let script = format!(
            "Get-ScheduledTask -TaskName {} -ErrorAction Ignore | ConvertTo-Json -Depth 1",
            powershell_literal(&self.name)
        );
        let stdout = self.run("getting", &script).await?;

        if stdout.trim().is_empty() {
            return Err(UpdaterError::TaskNotFound {
                name: self.name.clone(),
            });
        }

        let raw: RawTask =
            serde_json::from_str(stdout.trim()).map_err(|e| UpdaterError::ScheduledTaskCommand {
                operation: "getting".to_string(),
                name: self.name.clone(),
                stderr: format!("unexpected output: {e}"),
            })?;

        Ok(TaskStatus {
            name: raw.task_name,
            state: TaskState::from_code(raw.state.unwrap_or(0)),
        })
    }

    /// Register the task, enabled, unless it already exists.
    pub async fn create(&self) -> Result<CreateOutcome, UpdaterError> {
        self.require_admin().await?;

        match self.status().await {
            Ok(_) => return Ok(CreateOutcome::AlreadyExists),
            Err(UpdaterError::TaskNotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        self.run("creating", &self.create_script()).await?;
        Ok(CreateOutcome::Created)
    }

    /// Registration script.
    #[must_use]
    pub fn create_script(&self) -> String {
        let inner = format!(
            "certbot renew; & {} run",
            powershell_literal(&self.updater_path.to_string_lossy())
        );
        let argument = format!("-NoProfile -WindowStyle Hidden -Command \"{inner}\"");
        let description = "Execute twice a day the 'certbot renew' command to renew certificates if needed, then upgrade Certbot if a new release is available.";

        format!(
            "$action = New-ScheduledTaskAction -Execute 'Powershell.exe' -Argument {argument}; \
             $triggerAM = New-ScheduledTaskTrigger -Daily -At 12am; \
             $triggerPM = New-ScheduledTaskTrigger -Daily -At 12pm; \
             $principal = New-ScheduledTaskPrincipal -UserId 'SYSTEM' -LogonType S4U -RunLevel Highest; \
             Register-ScheduledTask -Action $action -Trigger $triggerAM,$triggerPM -TaskName {name} -Description {description} -Principal $principal | Out-Null",
            argument = powershell_literal(&argument),
            name = powershell_literal(&self.name),
            description = powershell_literal(description),
        )
    }

    /// Remove the task.
    pub async fn delete(&self) -> Result<(), UpdaterError> {
        self.require_admin().await?;
        self.status().await?;
        let script =
            format!("Unregister-ScheduledTask -TaskName {} -Confirm:$false", powershell_literal(&self.name));
        self.run("deleting", &script).await?;
        Ok(())
    }

    /// Enable the task.
    pub async fn enable(&self) -> Result<(), UpdaterError> {
        self.require_admin().await?;
        self.status().await?;
        let script =
            format!("Enable-ScheduledTask -TaskName {} | Out-Null", powershell_literal(&self.name));
        self.run("enabling", &script).await?;
        Ok(())
    }

    /// Disable the task without removing it.
    pub async fn disable(&self) -> Result<(), UpdaterError> {
        self.require_admin().await?;
        self.status().await?;
        let script =
            format!("Disable-ScheduledTask -TaskName {} | Out-Null", powershell_literal(&self.name));
        self.run("disabling", &script).await?;
        Ok(())
    }
}
