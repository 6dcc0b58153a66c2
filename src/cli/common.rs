//! Setup shared by the commands.

use anyhow::{Context, Result};
use std::sync::Arc;

use super::CliConfig;
use crate::audit::Reporter;
use crate::config::{EnvStore, KeyValueStore, UpdaterConfig, default_store};
use crate::core::UpdaterError;
use crate::upgrade::{AutoUpdater, platform_inspector};
use crate::utils::process::{CommandRunner, SystemRunner};

/// Build an updater wired to the host.
///
/// Setup failures are reported to whatever audit sinks the configuration
/// still allows before they are returned.
pub async fn build_updater(cli: &CliConfig) -> Result<AutoUpdater> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner);

    let store = match default_store(cli.config_path.clone(), runner.clone()).await {
        Ok(store) => store,
        Err(e) => {
            report_setup_failure(&EnvStore::default(), runner, &e).await;
            return Err(e).context("Failed to open configuration sources");
        }
    };

    let config = match UpdaterConfig::load(&store).await {
        Ok(config) => config,
        Err(e) => {
            report_setup_failure(&store, runner, &e).await;
            return Err(e).context("Failed to load configuration");
        }
    };

    let reporter = Reporter::from_config(&config, runner.clone());
    let inspector = platform_inspector(runner.clone());
    match AutoUpdater::new(&config, runner, inspector, reporter.clone()) {
        Ok(updater) => Ok(updater),
        Err(e) => {
            reporter.error(setup_failure_message(&e)).await;
            Err(e.into())
        }
    }
}

async fn report_setup_failure(
    store: &dyn KeyValueStore,
    runner: Arc<dyn CommandRunner>,
    error: &UpdaterError,
) {
    let fallback = UpdaterConfig::load_audit_settings(store).await;
    Reporter::from_config(&fallback, runner).error(setup_failure_message(error)).await;
}

fn setup_failure_message(error: &UpdaterError) -> String {
    format!("Certbot auto-upgrade aborted while loading the configuration: {error}")
}
