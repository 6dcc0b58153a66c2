//! Configuration for the updater.
//!
//! Values come from three places, highest precedence first:
//!
//! 1. **Environment** - `CERTBOT_UPDATER_<KEY>` variables
//! 2. **Configuration file** - a flat TOML table at `$CERTBOT_UPDATER_CONFIG`
//!    or `<config dir>/certbot-updater/config.toml`
//! 3. **Registry** (Windows only) - values under `HKLM\Software\Certbot`, where
//!    the installer records `CertbotUpgradeApiURL` and `CertbotSigningPubKey`
//!
//! Anything left unset falls back to the built-in defaults documented on
//! [`UpdaterConfig`].
//!
//! # Modules
//!
//! - `store` - the [`KeyValueStore`] trait and its implementations
//! - `global` - [`UpdaterConfig`], the resolved settings for a run
//! - `signing_key` - [`TrustedPublicKey`], the pinned installer signer
//!
//! # Example
//!
//! ```rust,no_run
//! use certbot_updater::config::{UpdaterConfig, default_store};
//! use certbot_updater::utils::process::SystemRunner;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = default_store(None, Arc::new(SystemRunner)).await?;
//! let config = UpdaterConfig::load(&store).await?;
//! println!("Installing into {}", config.install_dir.display());
//! # Ok(())
//! # }
//! ```

mod global;
mod signing_key;
mod store;

pub use global::{UpdaterConfig, default_install_dir};
pub use signing_key::TrustedPublicKey;
pub use store::{
    EnvStore, KeyValueStore, LayeredStore, MemoryStore, RegistryStore, TomlFileStore,
    default_store, keys,
};
