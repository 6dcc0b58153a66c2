//! Running PowerShell snippets through a [`CommandRunner`].
//!
//! Authenticode inspection, event log writes, the administrator check and
//! scheduled task management are all thin PowerShell scripts. They share the
//! invocation flags and timeout defined here.

use std::ffi::OsString;
use std::path::Path;

use super::process::{CommandOutput, CommandRunner};
use crate::constants::POWERSHELL_TIMEOUT;
use crate::core::UpdaterError;

/// PowerShell executable name.
pub const POWERSHELL: &str = "powershell.exe";

/// Arguments that run `script` non-interactively without loading profiles.
#[must_use]
pub fn script_args(script: &str) -> Vec<OsString> {
    ["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-Command", script]
        .into_iter()
        .map(OsString::from)
        .collect()
}

/// Run `script` and return its captured output, whatever the exit code.
pub async fn run_script(
    runner: &dyn CommandRunner,
    script: &str,
) -> Result<CommandOutput, UpdaterError> {
    runner.run(Path::new(POWERSHELL), &script_args(script), Some(POWERSHELL_TIMEOUT)).await
}
