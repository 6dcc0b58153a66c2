//! External process execution.
//!
//! Every program the updater launches (the installed `certbot`, PowerShell,
//! `reg.exe`, the uninstaller and the installer) goes through the
//! [`CommandRunner`] trait so that the workflow can be exercised without
//! touching the host. [`SystemRunner`] is the production implementation and
//! delegates to the [`ProcessCommand`] builder.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::core::UpdaterError;

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured standard output (lossy UTF-8)
    pub stdout: String,
    /// Captured standard error (lossy UTF-8)
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the process exited with code 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Convert a non-zero exit into [`UpdaterError::ProcessFailed`].
    pub fn check(self, program: &str) -> Result<Self, UpdaterError> {
        if self.success() {
            Ok(self)
        } else {
            Err(UpdaterError::ProcessFailed {
                program: program.to_string(),
                code: self.code,
                stderr: self.stderr,
            })
        }
    }
}

/// Seam for launching external programs.
///
/// Implementations return `Ok` for any process that ran to completion,
/// whatever its exit code; launch failures and timeouts are errors.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and wait for it, bounded by `limit` if given.
    async fn run(
        &self,
        program: &Path,
        args: &[OsString],
        limit: Option<Duration>,
    ) -> Result<CommandOutput, UpdaterError>;

    /// Like [`CommandRunner::run`], with `tail` appended verbatim as the last argument.
    ///
    /// NSIS parses `/D=` and `_?=` itself from the raw command line and only
    /// recognizes them unquoted at the very end, so they cannot go through the
    /// regular quoting of `args`. Off Windows the tail is an ordinary argument.
    async fn run_with_raw_tail(
        &self,
        program: &Path,
        args: &[OsString],
        tail: &OsStr,
        limit: Option<Duration>,
    ) -> Result<CommandOutput, UpdaterError> {
        let mut all = args.to_vec();
        all.push(tail.to_os_string());
        self.run(program, &all, limit).await
    }
}

/// Runs programs on the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[OsString],
        limit: Option<Duration>,
    ) -> Result<CommandOutput, UpdaterError> {
        ProcessCommand::new(program).args(args.iter().cloned()).with_timeout(limit).execute().await
    }

    async fn run_with_raw_tail(
        &self,
        program: &Path,
        args: &[OsString],
        tail: &OsStr,
        limit: Option<Duration>,
    ) -> Result<CommandOutput, UpdaterError> {
        ProcessCommand::new(program)
            .args(args.iter().cloned())
            .raw_tail(tail)
            .with_timeout(limit)
            .execute()
            .await
    }
}

/// Fluent builder for a single process invocation.
///
/// ```rust,no_run
/// use certbot_updater::utils::process::ProcessCommand;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), certbot_updater::core::UpdaterError> {
/// let output = ProcessCommand::new("certbot")
///     .arg("--version")
///     .with_timeout(Some(Duration::from_secs(60)))
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
pub struct ProcessCommand {
    program: PathBuf,
    args: Vec<OsString>,
    raw_tail: Option<OsString>,
    timeout_duration: Option<Duration>,
}

impl ProcessCommand {
    /// Start building an invocation of `program`.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            raw_tail: None,
            timeout_duration: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `tail` as the final argument without any quoting on Windows.
    pub fn raw_tail(mut self, tail: impl Into<OsString>) -> Self {
        self.raw_tail = Some(tail.into());
        self
    }

    /// Bound the wait for the process; `None` waits indefinitely.
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    fn display_command(&self) -> String {
        let mut rendered = self.program.display().to_string();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        if let Some(tail) = &self.raw_tail {
            rendered.push(' ');
            rendered.push_str(&tail.to_string_lossy());
        }
        rendered
    }

    /// Launch the process, wait for it and capture its output.
    ///
    /// The child is killed if the timeout elapses.
    pub async fn execute(self) -> Result<CommandOutput, UpdaterError> {
        let program = self.program.display().to_string();
        debug!(target: "process", "Executing command: {}", self.display_command());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(tail) = &self.raw_tail {
            #[cfg(windows)]
            cmd.raw_arg(tail);
            #[cfg(not(windows))]
            cmd.arg(tail);
        }

        let child = cmd.spawn().map_err(|e| UpdaterError::ProcessLaunchFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        let output_future = child.wait_with_output();
        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        target: "process",
                        "Command timed out after {} seconds: {}",
                        duration.as_secs(),
                        program
                    );
                    return Err(UpdaterError::ProcessTimeout {
                        program,
                        seconds: duration.as_secs(),
                    });
                }
            },
            None => output_future.await,
        }
        .map_err(|e| UpdaterError::ProcessLaunchFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        trace!(target: "process", "{} exited with {:?}", program, result.code);
        if !result.stderr.trim().is_empty() {
            debug!(target: "process", "{}", result.stderr.trim());
        }

        Ok(result)
    }
}
