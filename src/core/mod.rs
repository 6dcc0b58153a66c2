//! Core types shared by every part of the updater.
//!
//! # Error Management
//!
//! - [`UpdaterError`] - the workflow error taxonomy, with [`UpdaterError::category`]
//!   separating the one recoverable condition from the fatal ones
//! - [`ErrorContext`] - user-facing wrapper with details and a suggestion
//! - [`user_friendly_error`] - convert any `anyhow::Error` for CLI display
//!
//! Every workflow step returns `Result<T, UpdaterError>`; the CLI boundary
//! works with `anyhow` and renders failures through [`user_friendly_error`].

pub mod error;

pub use error::{ErrorCategory, ErrorContext, UpdaterError, user_friendly_error};

/// Result alias used by the workflow steps.
pub type Result<T, E = UpdaterError> = std::result::Result<T, E>;
