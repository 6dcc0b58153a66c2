//! Certbot auto-upgrade.
//!
//! A run has two phases. [`VersionResolver`] compares the installed Certbot
//! with the latest release on the feed; if a newer release exists,
//! [`UpdateExecutor`] installs it:
//!
//! ```text
//! 1. Version check
//!    ├── certbot --version (failure => 0.0.0 and a warning)
//!    └── GET <upgrade_api_url> (failure => abort)
//!
//! 2. Download (only when the release is newer)
//!    ├── staging directory <tmp>/certbot-updater_upgrade_<uuid>
//!    └── installer streamed to disk, SHA-256 recorded
//!
//! 3. Verification
//!    ├── Authenticode status must be Valid
//!    └── signer public key must equal the pinned key
//!
//! 4. Install
//!    ├── <install_dir>/uninstall.exe /S _?=<install_dir> (if present, then deleted)
//!    └── <installer> /S /D=<install_dir>
//!
//! 5. Cleanup
//!    └── staging directory removed on every path
//! ```
//!
//! Every step is reported through the [`Reporter`]. Any failure aborts the run
//! with a single error event naming the step that failed; nothing is retried.
//!
//! # Example
//!
//! ```rust,no_run
//! use certbot_updater::audit::Reporter;
//! use certbot_updater::config::UpdaterConfig;
//! use certbot_updater::upgrade::{AutoUpdater, UpdateOutcome, platform_inspector};
//! use certbot_updater::utils::process::SystemRunner;
//! use std::sync::{Arc, Mutex};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::default();
//! let runner = Arc::new(SystemRunner);
//! let updater = AutoUpdater::new(
//!     &config,
//!     runner.clone(),
//!     platform_inspector(runner),
//!     Reporter::new(),
//! )?;
//!
//! match updater.run().await? {
//!     UpdateOutcome::UpToDate { current, .. } => println!("Certbot {current} is current"),
//!     UpdateOutcome::Installed { version, .. } => println!("Installed Certbot {version}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod download;
pub mod executor;
pub mod release;
pub mod verification;
pub mod version_check;

#[cfg(test)]
mod tests;

pub use executor::{StepFailure, UpdateExecutor, UpdateState};
pub use release::{ReleaseAsset, ReleaseDescriptor, ReleaseFeed};
pub use verification::{
    AuthenticodeInspector, SignatureInspector, SignatureReport, SignatureStatus,
    UnsupportedInspector, platform_inspector, verify_report,
};
pub use version_check::{UpgradeDecision, VersionResolver, decide};

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::audit::Reporter;
use crate::config::UpdaterConfig;
use crate::core::UpdaterError;
use crate::utils::process::CommandRunner;
use crate::version::Version;

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Nothing to do.
    UpToDate {
        /// Installed version
        current: Version,
        /// Latest published version
        latest: Version,
    },
    /// A new version was installed.
    Installed {
        /// Version that was installed before (`0.0.0` if unknown)
        previous: Version,
        /// Version now installed
        version: Version,
    },
}

/// Runs the whole upgrade workflow.
pub struct AutoUpdater {
    resolver: VersionResolver,
    executor: UpdateExecutor,
    reporter: Reporter,
    state: Mutex<UpdateState>,
}

impl AutoUpdater {
    /// Wire up resolver and executor from `config`.
    pub fn new(
        config: &UpdaterConfig,
        runner: Arc<dyn CommandRunner>,
        inspector: Arc<dyn SignatureInspector>,
        reporter: Reporter,
    ) -> Result<Self, UpdaterError> {
        let feed = ReleaseFeed::new(&config.upgrade_api_url, config.feed_timeout)?;
        let resolver = VersionResolver::new(
            runner.clone(),
            &config.certbot_command,
            feed,
            config.installer_pattern.clone(),
            reporter.clone(),
        );
        let executor = UpdateExecutor::new(config, runner, inspector, reporter.clone())?;

        Ok(Self {
            resolver,
            executor,
            reporter,
            state: Mutex::new(UpdateState::Start),
        })
    }

    /// Create staging directories under `parent`.
    #[must_use]
    pub fn with_staging_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.executor = self.executor.with_staging_parent(parent);
        self
    }

    /// State reached by the last `check` or `run`.
    ///
    /// Steps inside the executor are not tracked here; a failure in one of
    /// them leaves the updater [`UpdateState::Aborted`].
    #[must_use]
    pub fn state(&self) -> UpdateState {
        self.state.lock().map_or(UpdateState::Aborted, |s| *s)
    }

    fn enter(&self, state: UpdateState) {
        debug!("Upgrade state: {}", state);
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    /// Decide whether an upgrade is available without installing anything.
    pub async fn check(&self) -> Result<UpgradeDecision, UpdaterError> {
        let decision = self.resolve().await?;
        self.reporter.info(decision.to_string()).await;
        Ok(decision)
    }

    /// Check for a newer Certbot and install it.
    pub async fn run(&self) -> Result<UpdateOutcome, UpdaterError> {
        self.reporter.info("Starting Certbot auto-upgrade...").await;

        Ok(match self.resolve().await? {
            UpgradeDecision::NoActionNeeded {
                current,
                latest,
            } => {
                self.enter(UpdateState::NoActionNeeded);
                self.reporter
                    .info(format!(
                        "Certbot {current} is up to date (latest release is {latest}), nothing to do."
                    ))
                    .await;
                UpdateOutcome::UpToDate {
                    current,
                    latest,
                }
            }
            UpgradeDecision::UpgradeTo {
                current,
                version,
                installer,
            } => {
                self.reporter
                    .info(format!("Upgrading Certbot from {current} to {version}."))
                    .await;

                self.enter(UpdateState::Downloading);
                if let Err(failure) = self.executor.execute(&version, &installer).await {
                    return Err(self.abort(failure.state, failure.error).await);
                }
                self.enter(UpdateState::Done);

                UpdateOutcome::Installed {
                    previous: current,
                    version,
                }
            }
        })
    }

    async fn resolve(&self) -> Result<UpgradeDecision, UpdaterError> {
        self.enter(UpdateState::Start);
        let (current, release) = match self.resolver.versions().await {
            Ok(found) => found,
            Err(e) => return Err(self.abort(UpdateState::Start, e).await),
        };

        self.enter(UpdateState::VersionChecked);
        match self.resolver.decide(&current, &release) {
            Ok(decision) => Ok(decision),
            Err(e) => Err(self.abort(UpdateState::VersionChecked, e).await),
        }
    }

    async fn abort(&self, state: UpdateState, error: UpdaterError) -> UpdaterError {
        self.enter(UpdateState::Aborted);
        self.reporter
            .error(format!("Certbot auto-upgrade aborted while {state}: {error}"))
            .await;
        error
    }
}
