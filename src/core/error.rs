//! Error handling for the updater
//!
//! This module provides the error taxonomy of the auto-update workflow and the
//! user-facing rendering used by the CLI. The error system follows two rules:
//! 1. **Strongly-typed errors** so that the driver can tell a recoverable local
//!    problem from a fatal network, security or process failure
//! 2. **User-friendly messages** with actionable suggestions when the binary
//!    is run by hand instead of by the scheduler
//!
//! # Error Categories
//!
//! - **Recoverable local**: [`UpdaterError::VersionParse`]
//! - **Network**: feed, download and release asset selection failures
//! - **Security**: missing or invalid signatures and signer key mismatches
//! - **Process**: uninstaller/installer launch or exit failures
//! - **Configuration**: invalid overrides, undecodable public keys
//! - **Scheduler**: scheduled task management failures
//!
//! Use [`user_friendly_error`] to convert any error into an [`ErrorContext`]
//! with details and a suggestion.
//!
//! # Examples
//!
//! ```rust,no_run
//! use certbot_updater::core::{ErrorCategory, UpdaterError};
//!
//! let error = UpdaterError::SignerKeyMismatch {
//!     path: "certbot-2.0.0-win32.exe".to_string(),
//! };
//! assert_eq!(error.category(), ErrorCategory::Security);
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Coarse classification of an [`UpdaterError`].
///
/// Only [`ErrorCategory::RecoverableLocal`] is ever absorbed by the workflow;
/// every other category aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The local version could not be determined; the sentinel is used instead.
    RecoverableLocal,
    /// The feed or the installer could not be fetched or understood.
    Network,
    /// The downloaded artifact is not trustworthy.
    Security,
    /// An external process failed or could not be started.
    Process,
    /// Configuration overrides are invalid.
    Configuration,
    /// Scheduled task management failed.
    Scheduler,
    /// Local file system failure.
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RecoverableLocal => "recoverable",
            Self::Network => "network",
            Self::Security => "security",
            Self::Process => "process",
            Self::Configuration => "configuration",
            Self::Scheduler => "scheduler",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

/// The main error type for updater operations.
///
/// Each variant carries enough context (URL, path, program, status) for the
/// audit log entry to be useful on its own, since unattended runs are usually
/// investigated long after the fact.
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// No `major.minor.patch` triple could be extracted from the input.
    #[error("No version number found in '{input}'")]
    VersionParse {
        /// The text that was searched
        input: String,
    },

    /// The release feed could not be reached or returned a non-success status.
    #[error("Release feed unreachable at {url}: {reason}")]
    FeedUnreachable {
        /// Feed URL
        url: String,
        /// Transport error, timeout or HTTP status
        reason: String,
    },

    /// The release feed answered with something that is not a release object.
    #[error("Release feed at {url} returned a malformed release: {reason}")]
    FeedMalformed {
        /// Feed URL
        url: String,
        /// Deserialization error
        reason: String,
    },

    /// The latest release has no asset matching the installer pattern.
    #[error("No installer asset matching '{pattern}' in release {tag}")]
    NoInstallerAsset {
        /// Release tag
        tag: String,
        /// Installer name pattern
        pattern: String,
    },

    /// More than one asset matches the installer pattern.
    #[error("{count} assets match installer pattern '{pattern}' in release {tag}")]
    AmbiguousInstallerAsset {
        /// Release tag
        tag: String,
        /// Installer name pattern
        pattern: String,
        /// Number of matching assets
        count: usize,
    },

    /// The asset name cannot be used as a plain file name.
    #[error("Refusing to download asset with unsafe name '{name}'")]
    InvalidAssetName {
        /// Offending asset name
        name: String,
    },

    /// The installer download failed.
    #[error("Failed to download installer from {url}: {reason}")]
    DownloadFailed {
        /// Asset download URL
        url: String,
        /// Transport error, timeout or HTTP status
        reason: String,
    },

    /// The downloaded file carries no Authenticode signature.
    #[error("Installer {path} is not signed")]
    SignatureMissing {
        /// Path of the inspected file
        path: String,
    },

    /// The signature exists but the platform trust store rejected it.
    #[error("Installer {path} has an invalid signature (status: {status}): {message}")]
    SignatureInvalid {
        /// Path of the inspected file
        path: String,
        /// Status reported by the platform
        status: String,
        /// Status message reported by the platform
        message: String,
    },

    /// The signature is valid but was not produced by the pinned publisher key.
    #[error("Installer {path} is signed by an untrusted publisher key")]
    SignerKeyMismatch {
        /// Path of the inspected file
        path: String,
    },

    /// The signature could not be inspected at all.
    #[error("Failed to inspect signature of {path}: {reason}")]
    SignatureInspectionFailed {
        /// Path of the inspected file
        path: String,
        /// What went wrong
        reason: String,
    },

    /// The operation needs a platform facility that is not available here.
    #[error("{operation} is not supported on this platform")]
    PlatformNotSupported {
        /// Operation that was attempted
        operation: String,
    },

    /// An external program could not be started.
    #[error("Failed to launch {program}: {reason}")]
    ProcessLaunchFailed {
        /// Program path or name
        program: String,
        /// OS error
        reason: String,
    },

    /// An external program exited unsuccessfully.
    #[error("{program} exited with {}", exit_code_label(.code))]
    ProcessFailed {
        /// Program path or name
        program: String,
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// An external program did not finish in time.
    #[error("{program} did not finish within {seconds} seconds")]
    ProcessTimeout {
        /// Program path or name
        program: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// A configuration value is invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// The trusted public key could not be decoded.
    #[error("Invalid trusted public key: {reason}")]
    InvalidPublicKey {
        /// Decoding error
        reason: String,
    },

    /// The scheduled task does not exist.
    #[error("Task {name} does not exist")]
    TaskNotFound {
        /// Task name
        name: String,
    },

    /// The scheduled task operation needs an elevated shell.
    #[error("Subcommand must be run on a shell with administrative rights")]
    AdminRightsRequired,

    /// A scheduled task PowerShell command reported an error.
    #[error("Error encountered while {operation} the {name} task: {stderr}")]
    ScheduledTaskCommand {
        /// Operation in progressive form ("creating", "deleting", ...)
        operation: String,
        /// Task name
        name: String,
        /// PowerShell error output
        stderr: String,
    },

    /// Local I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl UpdaterError {
    /// Classify this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::VersionParse { .. } => ErrorCategory::RecoverableLocal,
            Self::FeedUnreachable { .. }
            | Self::FeedMalformed { .. }
            | Self::NoInstallerAsset { .. }
            | Self::AmbiguousInstallerAsset { .. }
            | Self::InvalidAssetName { .. }
            | Self::DownloadFailed { .. } => ErrorCategory::Network,
            Self::SignatureMissing { .. }
            | Self::SignatureInvalid { .. }
            | Self::SignerKeyMismatch { .. }
            | Self::SignatureInspectionFailed { .. }
            | Self::PlatformNotSupported { .. } => ErrorCategory::Security,
            Self::ProcessLaunchFailed { .. }
            | Self::ProcessFailed { .. }
            | Self::ProcessTimeout { .. } => ErrorCategory::Process,
            Self::ConfigError { .. } | Self::InvalidPublicKey { .. } => {
                ErrorCategory::Configuration
            }
            Self::TaskNotFound { .. }
            | Self::AdminRightsRequired
            | Self::ScheduledTaskCommand { .. } => ErrorCategory::Scheduler,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether the workflow must stop on this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self.category(), ErrorCategory::RecoverableLocal)
    }

    /// Shorthand for [`UpdaterError::ConfigError`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }
}

/// An error wrapped with optional details and a suggestion for the user.
#[derive(Debug)]
pub struct ErrorContext {
    /// Human readable error message
    pub message: String,
    /// Category, when the error is an [`UpdaterError`]
    pub category: Option<ErrorCategory>,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context from a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            category: None,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with helpful suggestions.
///
/// [`UpdaterError`]s anywhere in the chain get category-specific advice;
/// other errors keep their full `anyhow` chain as details.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(updater_error) = error.chain().find_map(|e| e.downcast_ref::<UpdaterError>()) {
        let mut context = create_error_context(updater_error);
        if error.chain().count() > 1 {
            context.message = format!("{error:#}");
        }
        return context;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::PermissionDenied
    {
        return ErrorContext::new(format!("{error:#}")).with_suggestion(
            "Run the updater from an elevated (Administrator) shell or as the SYSTEM account",
        );
    }

    ErrorContext::new(format!("{error:#}"))
}

fn create_error_context(error: &UpdaterError) -> ErrorContext {
    let mut context = ErrorContext::new(error.to_string());
    context.category = Some(error.category());

    match error {
        UpdaterError::FeedUnreachable { .. } | UpdaterError::FeedMalformed { .. } => context
            .with_details("The latest release could not be determined, so nothing was changed")
            .with_suggestion(
                "Check network connectivity or override the feed with the upgrade_api_url setting",
            ),
        UpdaterError::DownloadFailed { .. } => context
            .with_details("The installed version was left untouched")
            .with_suggestion("The next scheduled run will retry the download"),
        UpdaterError::NoInstallerAsset { .. } | UpdaterError::AmbiguousInstallerAsset { .. } => {
            context.with_suggestion(
                "Check the installer_pattern setting against the asset names of the release",
            )
        }
        UpdaterError::SignatureMissing { .. }
        | UpdaterError::SignatureInvalid { .. }
        | UpdaterError::SignerKeyMismatch { .. } => context
            .with_details("The installer was rejected and never executed")
            .with_suggestion(
                "Do not install this file manually; report the release to the Certbot maintainers",
            ),
        UpdaterError::PlatformNotSupported { .. } => {
            context.with_details("This operation relies on Windows PowerShell")
        }
        UpdaterError::ProcessFailed { stderr, .. } if !stderr.trim().is_empty() => {
            context.with_details(stderr.trim().to_string())
        }
        UpdaterError::ConfigError { .. } | UpdaterError::InvalidPublicKey { .. } => context
            .with_suggestion(
                "Fix the value in the configuration file, environment or HKLM\\Software\\Certbot",
            ),
        UpdaterError::TaskNotFound { .. } => context.with_suggestion(
            "Create it using the following command: 'certbot-updater task create'",
        ),
        UpdaterError::AdminRightsRequired => {
            context.with_suggestion("Start PowerShell with 'Run as administrator'")
        }
        _ => context,
    }
}
