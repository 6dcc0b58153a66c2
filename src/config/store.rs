//! Key-value stores that supply configuration overrides.
//!
//! The Windows installer and the integration tests write overrides to
//! `HKLM\Software\Certbot`; administrators on other setups prefer a TOML file
//! or environment variables. All of them are read through [`KeyValueStore`]
//! using the canonical snake_case keys from [`keys`], and [`LayeredStore`]
//! combines them so that the first store holding a value wins.

use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};

use crate::constants::{CONFIG_PATH_ENV, ENV_PREFIX, POWERSHELL_TIMEOUT, REGISTRY_KEY};
use crate::core::UpdaterError;
use crate::utils::process::CommandRunner;

/// Canonical configuration keys.
pub mod keys {
    /// Release feed URL.
    pub const UPGRADE_API_URL: &str = "upgrade_api_url";
    /// Trusted signer public key, base64 or PEM.
    pub const SIGNING_PUBLIC_KEY: &str = "signing_public_key";
    /// Certbot installation directory.
    pub const INSTALL_DIR: &str = "install_dir";
    /// Command used to query the installed version.
    pub const CERTBOT_COMMAND: &str = "certbot_command";
    /// Regex selecting the installer asset.
    pub const INSTALLER_PATTERN: &str = "installer_pattern";
    /// Persistent JSON-lines audit log; empty disables it.
    pub const AUDIT_LOG_PATH: &str = "audit_log_path";
    /// Whether to write audit events to the Windows event log.
    pub const EVENT_LOG: &str = "event_log";
    /// Feed request timeout in seconds.
    pub const FEED_TIMEOUT_SECS: &str = "feed_timeout_secs";
    /// Installer download timeout in seconds.
    pub const DOWNLOAD_TIMEOUT_SECS: &str = "download_timeout_secs";

    /// Every key, in documentation order.
    pub const ALL: &[&str] = &[
        UPGRADE_API_URL,
        SIGNING_PUBLIC_KEY,
        INSTALL_DIR,
        CERTBOT_COMMAND,
        INSTALLER_PATTERN,
        AUDIT_LOG_PATH,
        EVENT_LOG,
        FEED_TIMEOUT_SECS,
        DOWNLOAD_TIMEOUT_SECS,
    ];
}

/// A read-only source of configuration values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Look up `key`; `Ok(None)` means the store has no value for it.
    async fn get(&self, key: &str) -> Result<Option<String>, UpdaterError>;

    /// Short name used in log messages.
    fn name(&self) -> &str;
}

/// In-memory store, used when embedding the updater and in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    /// Add or replace a value.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, UpdaterError> {
        Ok(self.values.get(key).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Environment variables named `CERTBOT_UPDATER_<KEY>`.
#[derive(Debug, Clone)]
pub struct EnvStore {
    prefix: String,
}

impl Default for EnvStore {
    fn default() -> Self {
        Self {
            prefix: ENV_PREFIX.to_string(),
        }
    }
}

impl EnvStore {
    /// Store reading variables with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Variable name for `key`.
    #[must_use]
    pub fn variable_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.to_uppercase())
    }
}

#[async_trait]
impl KeyValueStore for EnvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, UpdaterError> {
        Ok(std::env::var(self.variable_name(key)).ok())
    }

    fn name(&self) -> &str {
        "environment"
    }
}

/// Flat TOML table keyed by the canonical keys.
///
/// ```toml
/// upgrade_api_url = "https://mirror.example.org/releases/latest"
/// install_dir = 'D:\Certbot'
/// download_timeout_secs = 7200
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlFileStore {
    table: toml::Table,
}

impl TomlFileStore {
    /// Default location: `$CERTBOT_UPDATER_CONFIG` or `<config dir>/certbot-updater/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("certbot-updater").join("config.toml"))
    }

    /// Load `path`; a missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::ConfigError`] when the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, UpdaterError> {
        if !path.exists() {
            debug!("No configuration file at {}", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            UpdaterError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let table = Self::parse(&content)
            .map_err(|e| UpdaterError::config(format!("Failed to parse {}: {e}", path.display())))?;

        debug!("Loaded configuration file {}", path.display());
        Ok(Self::from_table(table))
    }

    /// Parse TOML text into a table for [`TomlFileStore::from_table`].
    pub fn parse(content: &str) -> Result<toml::Table, toml::de::Error> {
        content.parse::<toml::Table>()
    }

    /// Build a store from an already parsed table.
    #[must_use]
    pub const fn from_table(table: toml::Table) -> Self {
        Self {
            table,
        }
    }
}

#[async_trait]
impl KeyValueStore for TomlFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, UpdaterError> {
        let Some(value) = self.table.get(key) else {
            return Ok(None);
        };
        match value {
            toml::Value::String(s) => Ok(Some(s.clone())),
            toml::Value::Integer(i) => Ok(Some(i.to_string())),
            toml::Value::Boolean(b) => Ok(Some(b.to_string())),
            other => Err(UpdaterError::config(format!(
                "Key '{key}' must be a string, integer or boolean, found {}",
                other.type_str()
            ))),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

static REG_VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+(REG_[A-Z_]+)\s+(.*?)\s*$").expect("registry regex is valid")
});

/// Values under `HKLM\Software\Certbot`, read with `reg.exe query`.
pub struct RegistryStore {
    runner: Arc<dyn CommandRunner>,
    key: String,
}

impl RegistryStore {
    /// Store reading the default Certbot registry key.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            key: REGISTRY_KEY.to_string(),
        }
    }

    /// Registry value name for a canonical key.
    ///
    /// The names written by the Windows installer are kept; other keys use
    /// `Certbot` followed by the key in CamelCase.
    #[must_use]
    pub fn value_name(key: &str) -> String {
        match key {
            keys::UPGRADE_API_URL => "CertbotUpgradeApiURL".to_string(),
            keys::SIGNING_PUBLIC_KEY => "CertbotSigningPubKey".to_string(),
            other => {
                let camel: String = other
                    .split('_')
                    .map(|part| {
                        let mut chars = part.chars();
                        chars
                            .next()
                            .map(|first| first.to_uppercase().chain(chars).collect::<String>())
                            .unwrap_or_default()
                    })
                    .collect();
                format!("Certbot{camel}")
            }
        }
    }

    /// Extract the data of `value_name` from `reg query` output.
    #[must_use]
    pub fn parse_query_output(output: &str, value_name: &str) -> Option<String> {
        output.lines().find_map(|line| {
            let captures = REG_VALUE_LINE.captures(line)?;
            captures[1].eq_ignore_ascii_case(value_name).then(|| captures[3].to_string())
        })
    }
}

#[async_trait]
impl KeyValueStore for RegistryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, UpdaterError> {
        let value_name = Self::value_name(key);
        let args: Vec<OsString> = vec![
            "query".into(),
            self.key.clone().into(),
            "/v".into(),
            value_name.clone().into(),
        ];
        let output = self.runner.run(Path::new("reg"), &args, Some(POWERSHELL_TIMEOUT)).await?;

        // reg.exe exits with 1 when the key or value does not exist
        if !output.success() {
            trace!("Registry value {}\\{} not set", self.key, value_name);
            return Ok(None);
        }

        Ok(Self::parse_query_output(&output.stdout, &value_name))
    }

    fn name(&self) -> &str {
        "registry"
    }
}

/// Stores consulted in order; the first value found wins.
#[derive(Default)]
pub struct LayeredStore {
    layers: Vec<Box<dyn KeyValueStore>>,
}

impl LayeredStore {
    /// Create an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a store with lower precedence than the existing ones.
    #[must_use]
    pub fn with_layer(mut self, store: impl KeyValueStore + 'static) -> Self {
        self.layers.push(Box::new(store));
        self
    }

    /// Number of layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether there are no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for LayeredStore {
    async fn get(&self, key: &str) -> Result<Option<String>, UpdaterError> {
        // An empty value (e.g. `VAR=`) does not hide the layers below. It is
        // returned only when no layer has a real value.
        let mut empty = None;
        for layer in &self.layers {
            match layer.get(key).await? {
                Some(value) if value.trim().is_empty() => {
                    empty.get_or_insert(value);
                }
                Some(value) => {
                    debug!("Configuration '{}' set by {} store", key, layer.name());
                    return Ok(Some(value));
                }
                None => {}
            }
        }
        Ok(empty)
    }

    fn name(&self) -> &str {
        "layered"
    }
}

/// The standard stack: environment, then configuration file, then (on Windows) the registry.
pub async fn default_store(
    config_path: Option<PathBuf>,
    runner: Arc<dyn CommandRunner>,
) -> Result<LayeredStore, UpdaterError> {
    let mut store = LayeredStore::new().with_layer(EnvStore::default());

    if let Some(path) = config_path.or_else(TomlFileStore::default_path) {
        store = store.with_layer(TomlFileStore::load(&path).await?);
    }

    if cfg!(windows) {
        store = store.with_layer(RegistryStore::new(runner));
    }

    Ok(store)
}
