//! Host interaction helpers
//!
//! # Modules
//!
//! - [`process`] - The [`CommandRunner`](process::CommandRunner) seam and the
//!   tokio-based process builder behind it
//! - [`powershell`] - Non-interactive PowerShell invocation
//! - [`security`] - Validation and quoting of untrusted strings
//! - [`temp`] - The self-removing staging directory
//!
//! # Example
//!
//! ```rust,no_run
//! use certbot_updater::utils::security::validate_asset_file_name;
//! use certbot_updater::utils::temp::StagingDir;
//!
//! # fn example() -> anyhow::Result<()> {
//! validate_asset_file_name("certbot-beta-installer-win32.exe")?;
//! let staging = StagingDir::new("upgrade")?;
//! let target = staging.path().join("certbot-beta-installer-win32.exe");
//! # let _ = target;
//! staging.close()?;
//! # Ok(())
//! # }
//! ```

pub mod powershell;
pub mod process;
pub mod security;
pub mod temp;

pub use process::{CommandOutput, CommandRunner, ProcessCommand, SystemRunner};
pub use security::{powershell_literal, validate_asset_file_name};
pub use temp::StagingDir;
