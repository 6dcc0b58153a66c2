//! The download, verify and install pipeline.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use super::download::Downloader;
use super::release::ReleaseAsset;
use super::verification::{SignatureInspector, verify_report};
use crate::audit::Reporter;
use crate::config::{TrustedPublicKey, UpdaterConfig};
use crate::constants::UNINSTALLER_FILE_NAME;
use crate::core::UpdaterError;
use crate::utils::process::CommandRunner;
use crate::utils::temp::StagingDir;
use crate::version::Version;

/// Progress of an updater run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Nothing has happened yet
    Start,
    /// Installed and latest versions are known
    VersionChecked,
    /// Terminal: the installed version is current
    NoActionNeeded,
    /// Fetching the installer
    Downloading,
    /// Checking the installer's signature and publisher key
    Verifying,
    /// Running the previous version's uninstaller
    Uninstalling,
    /// Running the new installer
    Installing,
    /// Terminal: the new version is installed
    Done,
    /// Terminal: a step failed
    Aborted,
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "checking versions",
            Self::VersionChecked => "deciding on an upgrade",
            Self::NoActionNeeded => "up to date",
            Self::Downloading => "downloading the installer",
            Self::Verifying => "verifying the installer signature",
            Self::Uninstalling => "uninstalling the previous version",
            Self::Installing => "running the installer",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// A pipeline failure and the state it happened in.
#[derive(Debug)]
pub struct StepFailure {
    /// State that was active when the step failed
    pub state: UpdateState,
    /// The failure
    pub error: UpdaterError,
}

/// Installs a verified release over the current installation.
pub struct UpdateExecutor {
    runner: Arc<dyn CommandRunner>,
    inspector: Arc<dyn SignatureInspector>,
    downloader: Downloader,
    trusted_key: TrustedPublicKey,
    install_dir: PathBuf,
    staging_parent: PathBuf,
    reporter: Reporter,
}

impl UpdateExecutor {
    /// Executor for the installation described by `config`.
    pub fn new(
        config: &UpdaterConfig,
        runner: Arc<dyn CommandRunner>,
        inspector: Arc<dyn SignatureInspector>,
        reporter: Reporter,
    ) -> Result<Self, UpdaterError> {
        Ok(Self {
            runner,
            inspector,
            downloader: Downloader::new(config.download_timeout)?,
            trusted_key: config.signing_public_key.clone(),
            install_dir: config.install_dir.clone(),
            staging_parent: std::env::temp_dir(),
            reporter,
        })
    }

    /// Create staging directories under `parent` instead of the system temp dir.
    #[must_use]
    pub fn with_staging_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.staging_parent = parent.into();
        self
    }

    /// Download, verify and install `installer` as `version`.
    ///
    /// The staging directory is removed before this returns, whatever the outcome.
    pub async fn execute(&self, version: &Version, installer: &ReleaseAsset) -> Result<(), StepFailure> {
        let mut state = UpdateState::Downloading;

        let staging = StagingDir::new_in(&self.staging_parent, "upgrade").map_err(|e| StepFailure {
            state,
            error: e.into(),
        })?;

        let result = self.run_steps(staging.path(), version, installer, &mut state).await;

        if let Err(e) = staging.close() {
            warn!("Failed to remove staging directory: {}", e);
        }

        result.map_err(|error| StepFailure {
            state,
            error,
        })
    }

    async fn run_steps(
        &self,
        staging: &Path,
        version: &Version,
        installer: &ReleaseAsset,
        state: &mut UpdateState,
    ) -> Result<(), UpdaterError> {
        *state = UpdateState::Downloading;
        self.reporter
            .info(format!("Downloading Certbot {version} installer from {}", installer.download_url))
            .await;
        let downloaded = self.downloader.download(installer, staging).await?;
        self.reporter
            .info(format!(
                "Downloaded {} ({} bytes, SHA-256 {})",
                installer.name, downloaded.size, downloaded.sha256
            ))
            .await;

        *state = UpdateState::Verifying;
        let report = self.inspector.inspect(&downloaded.path).await?;
        verify_report(&report, &self.trusted_key, &downloaded.path)?;
        self.reporter
            .info("Installer signature is valid and matches the trusted publisher key.")
            .await;

        let uninstaller = self.install_dir.join(UNINSTALLER_FILE_NAME);
        if uninstaller.is_file() {
            *state = UpdateState::Uninstalling;
            self.reporter.info("Uninstalling the previous Certbot version...").await;
            let in_place = uninstall_in_place_arg(&self.install_dir);
            self.runner
                .run_with_raw_tail(&uninstaller, &silent(), &in_place, None)
                .await?
                .check(&uninstaller.display().to_string())?;
            remove_leftover(&uninstaller).await?;
        } else {
            self.reporter
                .info(format!(
                    "No previous installation found in {}, skipping uninstall.",
                    self.install_dir.display()
                ))
                .await;
        }

        *state = UpdateState::Installing;
        self.reporter.info(format!("Installing Certbot {version}...")).await;
        let target = install_dir_arg(&self.install_dir);
        self.runner
            .run_with_raw_tail(&downloaded.path, &silent(), &target, None)
            .await?
            .check(&installer.name)?;

        *state = UpdateState::Done;
        self.reporter.info(format!("Certbot {version} is installed.")).await;
        Ok(())
    }
}

fn silent() -> [OsString; 1] {
    [OsString::from("/S")]
}

/// `/D=<install_dir>`: the installer's target directory.
///
/// NSIS takes everything after `/D=` up to the end of the command line, so
/// this must be passed as the raw last argument.
#[must_use]
pub fn install_dir_arg(install_dir: &Path) -> OsString {
    let mut arg = OsString::from("/D=");
    arg.push(install_dir.as_os_str());
    arg
}

/// `_?=<install_dir>`: run the uninstaller in place.
///
/// Without it the uninstaller copies itself to the temp dir, starts the copy
/// and exits at once, so waiting on it does not wait for the uninstall. Must
/// be passed as the raw last argument.
#[must_use]
pub fn uninstall_in_place_arg(install_dir: &Path) -> OsString {
    let mut arg = OsString::from("_?=");
    arg.push(install_dir.as_os_str());
    arg
}

/// An uninstaller run in place cannot delete itself.
async fn remove_leftover(uninstaller: &Path) -> Result<(), UpdaterError> {
    match tokio::fs::remove_file(uninstaller).await {
        Ok(()) => {
            debug!("Removed {}", uninstaller.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
