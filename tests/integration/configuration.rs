//! Layered configuration sources.

use certbot_updater::config::{
    EnvStore, KeyValueStore, LayeredStore, MemoryStore, TomlFileStore, UpdaterConfig, keys,
};
use certbot_updater::constants::DEFAULT_SIGNING_PUBLIC_KEY;
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const ENV_URL: &str = "CERTBOT_UPDATER_UPGRADE_API_URL";

#[tokio::test]
#[serial]
async fn test_environment_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "upgrade_api_url = \"http://file.example/latest\"\ninstall_dir = \"/srv/certbot\"\ndownload_timeout_secs = 120\n",
    )
    .unwrap();

    unsafe {
        std::env::set_var(ENV_URL, "http://env.example/latest");
    }

    let store = LayeredStore::new()
        .with_layer(EnvStore::default())
        .with_layer(TomlFileStore::load(&path).await.unwrap());
    let config = UpdaterConfig::load(&store).await;

    unsafe {
        std::env::remove_var(ENV_URL);
    }

    let config = config.unwrap();
    assert_eq!(config.upgrade_api_url, "http://env.example/latest");
    assert_eq!(config.install_dir, PathBuf::from("/srv/certbot"));
    assert_eq!(config.download_timeout, Duration::from_secs(120));
    assert_eq!(config.signing_public_key.to_base64(), DEFAULT_SIGNING_PUBLIC_KEY);
}

#[tokio::test]
#[serial]
async fn test_environment_store_reads_prefixed_variables() {
    unsafe {
        std::env::set_var("CERTBOT_UPDATER_EVENT_LOG", "false");
    }
    let value = EnvStore::default().get(keys::EVENT_LOG).await.unwrap();
    unsafe {
        std::env::remove_var("CERTBOT_UPDATER_EVENT_LOG");
    }
    assert_eq!(value.as_deref(), Some("false"));
}

#[tokio::test]
async fn test_pem_key_override() {
    let pem = "-----BEGIN RSA PUBLIC KEY-----\nMIIBCgKCAQEA\n-----END RSA PUBLIC KEY-----";
    let store = MemoryStore::new().with(keys::SIGNING_PUBLIC_KEY, pem);
    let config = UpdaterConfig::load(&store).await.unwrap();
    assert_eq!(config.signing_public_key.as_bytes(), &[0x30, 0x82, 0x01, 0x0a, 0x02, 0x82, 0x01, 0x01, 0x00]);
}

#[tokio::test]
async fn test_empty_audit_path_disables_file_log() {
    let store = MemoryStore::new().with(keys::AUDIT_LOG_PATH, "  ");
    let config = UpdaterConfig::load(&store).await.unwrap();
    assert_eq!(config.audit_log_path, None);
}

#[tokio::test]
#[serial]
async fn test_empty_environment_value_falls_through_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "upgrade_api_url = \"http://file.example/latest\"\n").unwrap();

    unsafe {
        std::env::set_var(ENV_URL, "");
    }

    let store = LayeredStore::new()
        .with_layer(EnvStore::default())
        .with_layer(TomlFileStore::load(&path).await.unwrap());
    let config = UpdaterConfig::load(&store).await;

    unsafe {
        std::env::remove_var(ENV_URL);
    }

    assert_eq!(config.unwrap().upgrade_api_url, "http://file.example/latest");
}
