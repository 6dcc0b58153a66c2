//! Upgrade runs against a mock release feed.

use std::sync::Arc;
use std::time::Duration;

use certbot_updater::audit::{FileAuditLog, Reporter};
use certbot_updater::config::{TrustedPublicKey, UpdaterConfig};
use certbot_updater::core::UpdaterError;
use certbot_updater::test_utils::{FakeInspector, FakeResponse, FakeRunner, release_json};
use certbot_updater::upgrade::{AutoUpdater, UpdateOutcome};
use certbot_updater::version::Version;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::Sandbox;

const INSTALLER: &str = "certbot-beta-installer-win32.exe";

async fn mount_release(server: &MockServer, tag: &str) {
    let download = format!("{}/download/{INSTALLER}", server.uri());
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(release_json(tag, &[(INSTALLER, &download)])),
        )
        .mount(server)
        .await;
}

async fn mount_installer(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/download/{INSTALLER}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MZ installer".to_vec()))
        .expect(expected)
        .mount(server)
        .await;
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run_binary(mut cmd: assert_cmd::Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.assert()).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_feed_timeout_exits_nonzero_without_touching_install_dir() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/latest"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(release_json("v1.10.0", &[]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let sandbox = Sandbox::new();
    std::fs::write(sandbox.install_dir().join("uninstall.exe"), b"MZ").unwrap();

    let mut cmd = sandbox.command();
    cmd.env("CERTBOT_UPDATER_UPGRADE_API_URL", format!("{}/releases/latest", server.uri()))
        .env("CERTBOT_UPDATER_FEED_TIMEOUT_SECS", "1")
        .arg("run");

    run_binary(cmd)
        .await
        .code(1)
        .stderr(predicate::str::contains("Release feed unreachable"))
        .stderr(predicate::str::contains("timed out"));

    assert_eq!(sandbox.install_dir_entries(), vec!["uninstall.exe"]);

    let events = sandbox.audit_events();
    let errors: Vec<_> = events.iter().filter(|e| e["severity"] == "Error").collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["message"].as_str().unwrap().contains("checking versions"));
    // The missing certbot command is only a warning
    assert!(events.iter().any(|e| e["severity"] == "Warning"));
}

#[cfg(not(windows))]
#[tokio::test(flavor = "multi_thread")]
async fn test_check_reports_available_upgrade() {
    let server = MockServer::start().await;
    mount_release(&server, "v1.10.0").await;
    mount_installer(&server, 0).await;

    let sandbox = Sandbox::new();
    let mut cmd = sandbox.command();
    cmd.env("CERTBOT_UPDATER_UPGRADE_API_URL", format!("{}/releases/latest", server.uri()))
        .arg("check");

    run_binary(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("Upgrade available: 0.0.0 -> 1.10.0"));

    assert!(sandbox.install_dir_entries().is_empty());
}

#[cfg(not(windows))]
#[tokio::test(flavor = "multi_thread")]
async fn test_run_refuses_to_install_without_authenticode() {
    let server = MockServer::start().await;
    mount_release(&server, "v1.10.0").await;
    mount_installer(&server, 1).await;

    let sandbox = Sandbox::new();
    let mut cmd = sandbox.command();
    cmd.env("CERTBOT_UPDATER_UPGRADE_API_URL", format!("{}/releases/latest", server.uri()))
        .arg("run");

    run_binary(cmd)
        .await
        .code(1)
        .stderr(predicate::str::contains("not supported on this platform"));

    assert!(sandbox.install_dir_entries().is_empty());
    let events = sandbox.audit_events();
    let last = events.last().unwrap();
    assert_eq!(last["severity"], "Error");
    assert!(last["message"].as_str().unwrap().contains("verifying the installer signature"));
}

#[tokio::test]
async fn test_library_upgrade_writes_audit_file() {
    let server = MockServer::start().await;
    mount_release(&server, "v1.10.0").await;
    mount_installer(&server, 1).await;

    let install_dir = TempDir::new().unwrap();
    let staging = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let audit_path = logs.path().join("audit.log");
    let key = vec![7u8; 16];

    let config = UpdaterConfig {
        upgrade_api_url: format!("{}/releases/latest", server.uri()),
        signing_public_key: TrustedPublicKey::from_bytes(key.clone()),
        install_dir: install_dir.path().to_path_buf(),
        audit_log_path: Some(audit_path.clone()),
        event_log: false,
        ..UpdaterConfig::default()
    };

    let runner = Arc::new(
        FakeRunner::new()
            .on("certbot", FakeResponse::ok("certbot 1.9.0\n"))
            .on("certbot-beta-installer-win32", FakeResponse::ok("")),
    );
    let reporter = Reporter::new().with_sink(Arc::new(FileAuditLog::new(&audit_path)));
    let updater =
        AutoUpdater::new(&config, runner.clone(), Arc::new(FakeInspector::valid(&key)), reporter)
            .unwrap()
            .with_staging_parent(staging.path());

    let outcome = updater.run().await.unwrap();
    assert_eq!(
        outcome,
        UpdateOutcome::Installed {
            previous: Version::new(1, 9, 0),
            version: Version::new(1, 10, 0),
        }
    );

    let log = std::fs::read_to_string(&audit_path).unwrap();
    let messages: Vec<String> = log
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(event["severity"], "Information");
            event["message"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(messages.first().unwrap(), "Starting Certbot auto-upgrade...");
    assert_eq!(messages.last().unwrap(), "Certbot 1.10.0 is installed.");
    assert!(messages.iter().any(|m| m.contains("SHA-256")));

    assert!(std::fs::read_dir(staging.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_library_rejects_wrong_publisher() {
    let server = MockServer::start().await;
    mount_release(&server, "v2.0.0").await;
    mount_installer(&server, 1).await;

    let install_dir = TempDir::new().unwrap();
    std::fs::write(install_dir.path().join("uninstall.exe"), b"MZ").unwrap();
    let staging = TempDir::new().unwrap();

    let config = UpdaterConfig {
        upgrade_api_url: format!("{}/releases/latest", server.uri()),
        signing_public_key: TrustedPublicKey::from_bytes(vec![1, 2, 3]),
        install_dir: install_dir.path().to_path_buf(),
        audit_log_path: None,
        event_log: false,
        ..UpdaterConfig::default()
    };

    let runner = Arc::new(
        FakeRunner::new()
            .on("certbot", FakeResponse::ok("certbot 1.9.0"))
            .on("uninstall", FakeResponse::ok(""))
            .on("certbot-beta-installer-win32", FakeResponse::ok("")),
    );
    let updater = AutoUpdater::new(
        &config,
        runner.clone(),
        Arc::new(FakeInspector::valid(&[4, 5, 6])),
        Reporter::new(),
    )
    .unwrap()
    .with_staging_parent(staging.path());

    let err = updater.run().await.unwrap_err();
    assert!(matches!(err, UpdaterError::SignerKeyMismatch { .. }));
    assert_eq!(runner.calls().len(), 1);
    assert!(install_dir.path().join("uninstall.exe").exists());
    assert!(std::fs::read_dir(staging.path()).unwrap().next().is_none());
}
