//! Installed and published version discovery.
//!
//! [`VersionResolver`] answers the first question of every run: is there a
//! newer Certbot than the one installed, and if so which asset installs it?

use regex::Regex;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::release::{ReleaseAsset, ReleaseDescriptor, ReleaseFeed};
use crate::audit::Reporter;
use crate::constants::VERSION_COMMAND_TIMEOUT;
use crate::core::UpdaterError;
use crate::utils::process::CommandRunner;
use crate::version::Version;

/// Outcome of comparing the installed version with the latest release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// The installed version is current or newer.
    NoActionNeeded {
        /// Installed version
        current: Version,
        /// Latest published version
        latest: Version,
    },
    /// A newer release should be installed.
    UpgradeTo {
        /// Installed version (`0.0.0` if unknown)
        current: Version,
        /// Version being installed
        version: Version,
        /// The installer asset to download
        installer: ReleaseAsset,
    },
}

impl fmt::Display for UpgradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoActionNeeded {
                current,
                latest,
            } => write!(f, "Certbot {current} is up to date (latest is {latest})"),
            Self::UpgradeTo {
                current,
                version,
                installer,
            } => write!(f, "Certbot {current} can be upgraded to {version} using {}", installer.name),
        }
    }
}

/// Compare `current` with `release` and pick the installer asset.
///
/// A tag without a version triple is treated as `0.0.0`, so it never triggers
/// an upgrade.
///
/// # Errors
///
/// [`UpdaterError::NoInstallerAsset`] when no asset matches `pattern` and
/// [`UpdaterError::AmbiguousInstallerAsset`] when several do. Neither is
/// checked when no upgrade is needed.
pub fn decide(
    current: &Version,
    release: &ReleaseDescriptor,
    pattern: &Regex,
) -> Result<UpgradeDecision, UpdaterError> {
    let latest = Version::extract_or_sentinel(&release.tag_name);

    if *current >= latest {
        return Ok(UpgradeDecision::NoActionNeeded {
            current: current.clone(),
            latest,
        });
    }

    let mut matches = release.matching_assets(pattern);
    let installer = match (matches.next(), matches.next()) {
        (Some(asset), None) => asset.clone(),
        (None, _) => {
            return Err(UpdaterError::NoInstallerAsset {
                tag: release.tag_name.clone(),
                pattern: pattern.to_string(),
            });
        }
        (Some(_), Some(_)) => {
            return Err(UpdaterError::AmbiguousInstallerAsset {
                tag: release.tag_name.clone(),
                pattern: pattern.to_string(),
                count: release.matching_assets(pattern).count(),
            });
        }
    };

    Ok(UpgradeDecision::UpgradeTo {
        current: current.clone(),
        version: latest,
        installer,
    })
}

/// Finds the installed and the latest published Certbot versions.
pub struct VersionResolver {
    runner: Arc<dyn CommandRunner>,
    certbot_command: String,
    feed: ReleaseFeed,
    pattern: Regex,
    reporter: Reporter,
}

impl VersionResolver {
    /// Create a resolver.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        certbot_command: impl Into<String>,
        feed: ReleaseFeed,
        pattern: Regex,
        reporter: Reporter,
    ) -> Self {
        Self {
            runner,
            certbot_command: certbot_command.into(),
            feed,
            pattern,
            reporter,
        }
    }

    /// Version of the installed Certbot, or `0.0.0` if it cannot be determined.
    ///
    /// Runs `<certbot_command> --version` and reads the version from stdout,
    /// falling back to stderr. Every failure is reported as a warning.
    pub async fn current_version(&self) -> Version {
        match self.read_installed_version().await {
            Ok(version) => {
                debug!("Installed Certbot version is {}", version);
                version
            }
            Err(e) => {
                self.reporter
                    .warn(format!(
                        "Could not determine the installed Certbot version, assuming 0.0.0: {e}"
                    ))
                    .await;
                Version::sentinel()
            }
        }
    }

    async fn read_installed_version(&self) -> Result<Version, UpdaterError> {
        let program = which::which(&self.certbot_command)
            .unwrap_or_else(|_| PathBuf::from(&self.certbot_command));
        let args = [OsString::from("--version")];

        let output = self
            .runner
            .run(&program, &args, Some(VERSION_COMMAND_TIMEOUT))
            .await?
            .check(&self.certbot_command)?;

        Version::extract(&output.stdout).or_else(|_| Version::extract(&output.stderr))
    }

    /// Fetch the latest release from the feed.
    pub async fn latest_release(&self) -> Result<ReleaseDescriptor, UpdaterError> {
        self.feed.latest().await
    }

    /// The installed version and the latest release.
    ///
    /// Only a feed failure is an error; an unknown local version or a tag
    /// without a version is reported as a warning.
    pub async fn versions(&self) -> Result<(Version, ReleaseDescriptor), UpdaterError> {
        let current = self.current_version().await;
        let release = self.latest_release().await?;

        if Version::extract(&release.tag_name).is_err() {
            self.reporter
                .warn(format!(
                    "Release tag '{}' does not contain a version, treating it as 0.0.0",
                    release.tag_name
                ))
                .await;
        }

        Ok((current, release))
    }

    /// [`decide`] with this resolver's installer pattern.
    pub fn decide(
        &self,
        current: &Version,
        release: &ReleaseDescriptor,
    ) -> Result<UpgradeDecision, UpdaterError> {
        decide(current, release, &self.pattern)
    }
}
