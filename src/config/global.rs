//! Effective updater configuration.
//!
//! [`UpdaterConfig::load`] reads every key from a [`KeyValueStore`] (usually
//! the [`LayeredStore`](super::LayeredStore) built by
//! [`default_store`](super::default_store)) and fills in built-in defaults for
//! anything unset.
//!
//! | Key | Default |
//! |-----|---------|
//! | `upgrade_api_url` | GitHub "latest release" endpoint for certbot/certbot |
//! | `signing_public_key` | built-in Certbot publisher key |
//! | `install_dir` | `%ProgramFiles(x86)%\Certbot` on Windows, `/opt/certbot` elsewhere |
//! | `certbot_command` | `certbot` |
//! | `installer_pattern` | `^certbot-.*-win32\.exe$` |
//! | `audit_log_path` | `<local data dir>/certbot-updater/audit.log`; empty disables unless a lower layer sets a path |
//! | `event_log` | `true` on Windows, `false` elsewhere |
//! | `feed_timeout_secs` | `60` |
//! | `download_timeout_secs` | `3600` |

use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::signing_key::TrustedPublicKey;
use super::store::{KeyValueStore, keys};
use crate::constants::{
    DEFAULT_CERTBOT_COMMAND, DEFAULT_INSTALLER_PATTERN, DEFAULT_SIGNING_PUBLIC_KEY,
    DEFAULT_UPGRADE_API_URL, DOWNLOAD_TIMEOUT, FEED_TIMEOUT, UNINSTALLER_FILE_NAME,
};
use crate::core::UpdaterError;

/// Settings for one updater run.
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Release feed URL.
    pub upgrade_api_url: String,
    /// Key the installer's signer must match.
    pub signing_public_key: TrustedPublicKey,
    /// Certbot installation directory, passed to the installer as `/D=`.
    pub install_dir: PathBuf,
    /// Program run with `--version` to detect the installed release.
    pub certbot_command: String,
    /// Selects the installer among the release assets.
    pub installer_pattern: Regex,
    /// JSON-lines audit log, if enabled.
    pub audit_log_path: Option<PathBuf>,
    /// Whether audit events also go to the Windows event log.
    pub event_log: bool,
    /// Feed request timeout.
    pub feed_timeout: Duration,
    /// Installer download timeout.
    pub download_timeout: Duration,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            upgrade_api_url: DEFAULT_UPGRADE_API_URL.to_string(),
            signing_public_key: TrustedPublicKey::parse(DEFAULT_SIGNING_PUBLIC_KEY)
                .expect("built-in signing key is valid base64"),
            install_dir: default_install_dir(),
            certbot_command: DEFAULT_CERTBOT_COMMAND.to_string(),
            installer_pattern: default_installer_pattern(),
            audit_log_path: default_audit_log_path(),
            event_log: cfg!(windows),
            feed_timeout: FEED_TIMEOUT,
            download_timeout: DOWNLOAD_TIMEOUT,
        }
    }
}

impl UpdaterConfig {
    /// Resolve the configuration from `store`.
    ///
    /// # Errors
    ///
    /// Fails when a store cannot be read or a value is malformed (bad URL
    /// scheme, undecodable key, invalid regex, non-numeric timeout).
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self, UpdaterError> {
        let mut config = Self::default();

        if let Some(url) = non_empty(store.get(keys::UPGRADE_API_URL).await?) {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(UpdaterError::config(format!(
                    "'{}' must be an http(s) URL, got '{url}'",
                    keys::UPGRADE_API_URL
                )));
            }
            config.upgrade_api_url = url;
        }

        if let Some(key) = non_empty(store.get(keys::SIGNING_PUBLIC_KEY).await?) {
            config.signing_public_key = TrustedPublicKey::parse(&key)?;
        }

        if let Some(dir) = non_empty(store.get(keys::INSTALL_DIR).await?) {
            config.install_dir = PathBuf::from(dir);
        }

        if let Some(command) = non_empty(store.get(keys::CERTBOT_COMMAND).await?) {
            config.certbot_command = command;
        }

        if let Some(pattern) = non_empty(store.get(keys::INSTALLER_PATTERN).await?) {
            config.installer_pattern = Regex::new(&pattern).map_err(|e| {
                UpdaterError::config(format!("Invalid {} '{pattern}': {e}", keys::INSTALLER_PATTERN))
            })?;
        }

        if let Some(path) = store.get(keys::AUDIT_LOG_PATH).await? {
            config.audit_log_path = audit_path(&path);
        }

        if let Some(flag) = non_empty(store.get(keys::EVENT_LOG).await?) {
            config.event_log = parse_bool(keys::EVENT_LOG, &flag)?;
        }

        if let Some(secs) = non_empty(store.get(keys::FEED_TIMEOUT_SECS).await?) {
            config.feed_timeout = parse_secs(keys::FEED_TIMEOUT_SECS, &secs)?;
        }

        if let Some(secs) = non_empty(store.get(keys::DOWNLOAD_TIMEOUT_SECS).await?) {
            config.download_timeout = parse_secs(keys::DOWNLOAD_TIMEOUT_SECS, &secs)?;
        }

        debug!(
            "Configuration: feed={}, install_dir={}, pattern={}",
            config.upgrade_api_url,
            config.install_dir.display(),
            config.installer_pattern
        );
        Ok(config)
    }

    /// Defaults plus the audit settings `store` can still provide.
    ///
    /// Used to report a failed [`UpdaterConfig::load`]; unreadable or
    /// malformed values fall back to the defaults instead of failing again.
    pub async fn load_audit_settings(store: &dyn KeyValueStore) -> Self {
        let mut config = Self::default();

        if let Ok(Some(path)) = store.get(keys::AUDIT_LOG_PATH).await {
            config.audit_log_path = audit_path(&path);
        }

        if let Ok(Some(flag)) = store.get(keys::EVENT_LOG).await
            && let Ok(enabled) = parse_bool(keys::EVENT_LOG, flag.trim())
        {
            config.event_log = enabled;
        }

        config
    }

    /// Path of the uninstaller left by a previous installation.
    #[must_use]
    pub fn uninstaller_path(&self) -> PathBuf {
        self.install_dir.join(UNINSTALLER_FILE_NAME)
    }
}

fn audit_path(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    (!value.is_empty()).then(|| PathBuf::from(value))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, UpdaterError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(UpdaterError::config(format!("'{key}' must be a boolean, got '{value}'"))),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration, UpdaterError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(UpdaterError::config(format!(
            "'{key}' must be a positive number of seconds, got '{value}'"
        ))),
    }
}

fn default_installer_pattern() -> Regex {
    Regex::new(DEFAULT_INSTALLER_PATTERN).expect("default installer pattern is valid")
}

/// `%ProgramFiles(x86)%\Certbot` on Windows, `/opt/certbot` elsewhere.
pub fn default_install_dir() -> PathBuf {
    if cfg!(windows) {
        let program_files = std::env::var("ProgramFiles(x86)")
            .or_else(|_| std::env::var("ProgramFiles"))
            .unwrap_or_else(|_| r"C:\Program Files (x86)".to_string());
        PathBuf::from(program_files).join("Certbot")
    } else {
        PathBuf::from("/opt/certbot")
    }
}

fn default_audit_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("certbot-updater").join("audit.log"))
}
