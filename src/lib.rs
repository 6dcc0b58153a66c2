//! certbot-updater - signed auto-upgrades for Certbot on Windows
//!
//! Certbot for Windows ships as an NSIS installer signed with the publisher's
//! Authenticode certificate. This crate keeps an installation current without
//! supervision: it compares the installed version with the latest release on
//! a feed, downloads the installer, accepts it only if the signature is valid
//! *and* made with a pinned publisher key, then silently reinstalls Certbot.
//!
//! # Architecture Overview
//!
//! - [`upgrade::VersionResolver`] decides whether an upgrade is needed
//! - [`upgrade::UpdateExecutor`] downloads, verifies and installs
//! - [`upgrade::AutoUpdater`] drives both and reports the outcome
//!
//! External programs go through [`utils::process::CommandRunner`] and
//! signature inspection through [`upgrade::SignatureInspector`], so the whole
//! workflow runs against fakes in tests.
//!
//! # Core Modules
//!
//! - [`audit`] - Audit trail to stdout, a JSON-lines file and the Windows event log
//! - [`cli`] - Command-line interface
//! - [`config`] - Configuration from environment, TOML file and registry
//! - [`constants`] - Timeouts and well-known names
//! - [`core`] - Error taxonomy and user-facing error rendering
//! - [`schedule`] - The scheduled renewal and auto-update task
//! - [`upgrade`] - Version resolution and the install pipeline
//! - [`utils`] - Process execution, quoting and staging directories
//! - [`version`] - `major.minor.patch` extraction and ordering
//!
//! # Example
//!
//! ```rust,no_run
//! use certbot_updater::version::Version;
//!
//! let installed = Version::extract_or_sentinel("certbot 1.9.0");
//! let latest = Version::extract_or_sentinel("v1.10.0");
//! assert!(installed < latest);
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod schedule;
pub mod upgrade;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
