#[cfg(test)]
#[allow(clippy::module_inception)]
mod tests {
    use super::super::*;
    use crate::audit::{MemoryAuditLog, Reporter, Severity};
    use crate::config::TrustedPublicKey;
    use crate::test_utils::{FakeInspector, FakeResponse, FakeRunner, release_json};
    use std::ffi::OsString;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INSTALLER: &str = "certbot-beta-installer-win32.exe";
    const INSTALLER_STEM: &str = "certbot-beta-installer-win32";
    const SIGNER_KEY: &[u8] = &[0x30, 0x82, 0x01, 0x0a, 0x02];

    struct Harness {
        server: MockServer,
        install_dir: TempDir,
        staging: TempDir,
        audit: Arc<MemoryAuditLog>,
    }

    impl Harness {
        async fn new() -> Self {
            crate::test_utils::init_test_logging(None);
            Self {
                server: MockServer::start().await,
                install_dir: TempDir::new().unwrap(),
                staging: TempDir::new().unwrap(),
                audit: Arc::new(MemoryAuditLog::new()),
            }
        }

        fn config(&self) -> UpdaterConfig {
            UpdaterConfig {
                upgrade_api_url: format!("{}/releases/latest", self.server.uri()),
                signing_public_key: TrustedPublicKey::from_bytes(SIGNER_KEY.to_vec()),
                install_dir: self.install_dir.path().to_path_buf(),
                audit_log_path: None,
                event_log: false,
                ..UpdaterConfig::default()
            }
        }

        fn download_url(&self) -> String {
            format!("{}/download/{INSTALLER}", self.server.uri())
        }

        async fn serve_release(&self, tag: &str) {
            let body = release_json(tag, &[(INSTALLER, &self.download_url()), ("certbot.tar.gz", "x")]);
            Mock::given(method("GET"))
                .and(path("/releases/latest"))
                .and(header("accept", "application/vnd.github+json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.server)
                .await;
        }

        async fn serve_installer(&self, expected_requests: u64) {
            Mock::given(method("GET"))
                .and(path(format!("/download/{INSTALLER}")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(b"MZ fake installer".to_vec()))
                .expect(expected_requests)
                .mount(&self.server)
                .await;
        }

        fn add_uninstaller(&self) {
            std::fs::write(self.install_dir.path().join("uninstall.exe"), b"MZ").unwrap();
        }

        fn updater(&self, runner: Arc<FakeRunner>, inspector: Arc<FakeInspector>) -> AutoUpdater {
            let reporter = Reporter::new().with_sink(self.audit.clone());
            AutoUpdater::new(&self.config(), runner, inspector, reporter)
                .unwrap()
                .with_staging_parent(self.staging.path())
        }

        fn staging_is_empty(&self) -> bool {
            std::fs::read_dir(self.staging.path()).unwrap().next().is_none()
        }

        fn messages(&self) -> Vec<String> {
            self.audit.events().into_iter().map(|e| e.message).collect()
        }
    }

    fn runner_with(version_output: &str) -> FakeRunner {
        FakeRunner::new()
            .on("certbot", FakeResponse::ok(version_output))
            .on("uninstall", FakeResponse::ok(""))
            .on(INSTALLER_STEM, FakeResponse::ok(""))
    }

    #[tokio::test]
    async fn test_upgrade_end_to_end() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        harness.serve_installer(1).await;
        harness.add_uninstaller();

        let runner = Arc::new(runner_with("certbot 1.9.0\n"));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let outcome = harness.updater(runner.clone(), inspector.clone()).run().await.unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::Installed {
                previous: Version::new(1, 9, 0),
                version: Version::new(1, 10, 0),
            }
        );

        let stems: Vec<String> = runner.calls().iter().map(|c| c.stem()).collect();
        assert_eq!(stems, vec!["certbot", "uninstall", INSTALLER_STEM]);

        // Directory arguments go last and unquoted
        let dir = harness.install_dir.path().as_os_str();
        let uninstall = &runner.calls_to("uninstall")[0];
        assert_eq!(uninstall.program, harness.install_dir.path().join("uninstall.exe"));
        assert_eq!(uninstall.args, vec![OsString::from("/S")]);
        let mut in_place = OsString::from("_?=");
        in_place.push(dir);
        assert_eq!(uninstall.raw_tail, Some(in_place));

        let install = &runner.calls_to(INSTALLER_STEM)[0];
        assert_eq!(install.args, vec![OsString::from("/S")]);
        let mut target = OsString::from("/D=");
        target.push(dir);
        assert_eq!(install.raw_tail, Some(target));

        // The in-place uninstaller cannot delete itself
        assert!(!harness.install_dir.path().join("uninstall.exe").exists());

        assert_eq!(inspector.inspected().len(), 1);
        assert!(harness.staging_is_empty());
        assert!(harness.messages().contains(&"Certbot 1.10.0 is installed.".to_string()));
        assert!(harness.audit.with_severity(Severity::Error).is_empty());
    }

    #[tokio::test]
    async fn test_states_after_run() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        harness.serve_installer(1).await;

        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let current = harness.updater(Arc::new(runner_with("certbot 1.10.0")), inspector.clone());
        assert_eq!(current.state(), UpdateState::Start);
        current.run().await.unwrap();
        assert_eq!(current.state(), UpdateState::NoActionNeeded);

        let outdated = harness.updater(Arc::new(runner_with("certbot 1.9.0")), inspector);
        outdated.run().await.unwrap();
        assert_eq!(outdated.state(), UpdateState::Done);
    }

    #[tokio::test]
    async fn test_up_to_date_does_nothing() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        harness.serve_installer(0).await;

        let runner = Arc::new(runner_with("certbot 1.10.0"));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let outcome = harness.updater(runner.clone(), inspector.clone()).run().await.unwrap();

        assert!(matches!(outcome, UpdateOutcome::UpToDate { .. }));
        assert_eq!(runner.calls().len(), 1);
        assert!(inspector.inspected().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_local_version_upgrades_with_warning() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        harness.serve_installer(1).await;

        let runner = Arc::new(
            FakeRunner::new()
                .on("certbot", FakeResponse::LaunchFailure)
                .on(INSTALLER_STEM, FakeResponse::ok("")),
        );
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let outcome = harness.updater(runner.clone(), inspector).run().await.unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::Installed {
                previous: Version::sentinel(),
                version: Version::new(1, 10, 0),
            }
        );
        assert_eq!(harness.audit.with_severity(Severity::Warning).len(), 1);
        // No uninstaller in the install dir
        assert!(runner.calls_to("uninstall").is_empty());
        assert!(harness.messages().iter().any(|m| m.contains("skipping uninstall")));
    }

    #[tokio::test]
    async fn test_hung_version_command_assumes_oldest() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;

        let runner = Arc::new(runner_with("").on("certbot", FakeResponse::Timeout));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let decision = harness.updater(runner, inspector).check().await.unwrap();

        match decision {
            UpgradeDecision::UpgradeTo {
                current,
                version,
                ..
            } => {
                assert_eq!(current, Version::sentinel());
                assert_eq!(version, Version::new(1, 10, 0));
            }
            other => panic!("unexpected: {other:?}"),
        }
        let warnings = harness.audit.with_severity(Severity::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("assuming 0.0.0"), "{}", warnings[0].message);
        assert!(warnings[0].message.contains("did not finish within 60 seconds"), "{}", warnings[0].message);
    }

    #[tokio::test]
    async fn test_version_read_from_stderr() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;

        let runner = Arc::new(FakeRunner::new().on(
            "certbot",
            FakeResponse::Output(crate::utils::process::CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: "certbot 1.10.0\n".to_string(),
            }),
        ));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let decision = harness.updater(runner, inspector).check().await.unwrap();
        assert!(matches!(decision, UpgradeDecision::NoActionNeeded { .. }));
        assert!(harness.audit.with_severity(Severity::Warning).is_empty());
    }

    #[tokio::test]
    async fn test_feed_error_is_fatal() {
        let harness = Harness::new().await;
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&harness.server)
            .await;

        let runner = Arc::new(runner_with("certbot 1.9.0"));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let err = harness.updater(runner.clone(), inspector).run().await.unwrap_err();

        assert!(matches!(err, UpdaterError::FeedUnreachable { .. }));
        assert!(runner.calls_to(INSTALLER_STEM).is_empty());
        let errors = harness.audit.with_severity(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("checking versions"));
    }

    #[tokio::test]
    async fn test_malformed_feed_is_fatal() {
        let harness = Harness::new().await;
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>rate limited</html>"))
            .mount(&harness.server)
            .await;

        let runner = Arc::new(runner_with("certbot 1.9.0"));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let err = harness.updater(runner, inspector).run().await.unwrap_err();
        assert!(matches!(err, UpdaterError::FeedMalformed { .. }));
    }

    #[tokio::test]
    async fn test_no_matching_asset_aborts_before_download() {
        let harness = Harness::new().await;
        let body = release_json("v1.10.0", &[("certbot-1.10.0.tar.gz", "x")]);
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&harness.server)
            .await;
        harness.serve_installer(0).await;

        let runner = Arc::new(runner_with("certbot 1.9.0"));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let updater = harness.updater(runner, inspector);
        let err = updater.run().await.unwrap_err();

        assert!(matches!(err, UpdaterError::NoInstallerAsset { .. }));
        assert!(harness.staging_is_empty());
        assert_eq!(updater.state(), UpdateState::Aborted);

        // The versions were known, the asset lookup failed
        let errors = harness.audit.with_severity(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("while deciding on an upgrade"), "{}", errors[0].message);
    }

    #[tokio::test]
    async fn test_key_mismatch_aborts_before_install() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        harness.serve_installer(1).await;
        harness.add_uninstaller();

        let runner = Arc::new(runner_with("certbot 1.9.0"));
        let inspector = Arc::new(FakeInspector::valid(&[0xde, 0xad, 0xbe, 0xef]));
        let err = harness.updater(runner.clone(), inspector).run().await.unwrap_err();

        assert!(matches!(err, UpdaterError::SignerKeyMismatch { .. }));
        assert!(runner.calls_to("uninstall").is_empty());
        assert!(runner.calls_to(INSTALLER_STEM).is_empty());
        assert!(harness.staging_is_empty());
        assert!(harness.install_dir.path().join("uninstall.exe").exists());

        let errors = harness.audit.with_severity(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("verifying the installer signature"));
    }

    #[tokio::test]
    async fn test_bad_signature_status_aborts() {
        for (status, expect_missing) in
            [(SignatureStatus::NotSigned, true), (SignatureStatus::HashMismatch, false)]
        {
            let harness = Harness::new().await;
            harness.serve_release("v1.10.0").await;
            harness.serve_installer(1).await;

            let runner = Arc::new(runner_with("certbot 1.9.0"));
            let inspector = Arc::new(FakeInspector::with_status(status));
            let err = harness.updater(runner.clone(), inspector).run().await.unwrap_err();

            if expect_missing {
                assert!(matches!(err, UpdaterError::SignatureMissing { .. }));
            } else {
                assert!(matches!(err, UpdaterError::SignatureInvalid { .. }));
            }
            assert_eq!(runner.calls().len(), 1, "only certbot --version may run");
            assert!(harness.staging_is_empty());
        }
    }

    #[tokio::test]
    async fn test_download_failure_cleans_up() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        Mock::given(method("GET"))
            .and(path(format!("/download/{INSTALLER}")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&harness.server)
            .await;

        let runner = Arc::new(runner_with("certbot 1.9.0"));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let err = harness.updater(runner, inspector.clone()).run().await.unwrap_err();

        assert!(matches!(err, UpdaterError::DownloadFailed { .. }));
        assert!(inspector.inspected().is_empty());
        assert!(harness.staging_is_empty());
        assert!(harness.messages().iter().any(|m| m.contains("downloading the installer")));
    }

    #[tokio::test]
    async fn test_download_timeout_cleans_up() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        Mock::given(method("GET"))
            .and(path(format!("/download/{INSTALLER}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(b"MZ fake installer".to_vec())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&harness.server)
            .await;

        let config = UpdaterConfig {
            download_timeout: Duration::from_millis(200),
            ..harness.config()
        };
        let runner = Arc::new(runner_with("certbot 1.9.0"));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let reporter = Reporter::new().with_sink(harness.audit.clone());
        let updater = AutoUpdater::new(&config, runner.clone(), inspector.clone(), reporter)
            .unwrap()
            .with_staging_parent(harness.staging.path());

        match updater.run().await {
            Err(UpdaterError::DownloadFailed {
                reason,
                ..
            }) => assert!(reason.contains("timed out"), "{reason}"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(harness.staging_is_empty());
        assert!(inspector.inspected().is_empty());
        assert!(runner.calls_to(INSTALLER_STEM).is_empty());
        let errors = harness.audit.with_severity(Severity::Error);
        assert!(errors[0].message.contains("downloading the installer"));
    }

    #[tokio::test]
    async fn test_uninstaller_failure_stops_install() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        harness.serve_installer(1).await;
        harness.add_uninstaller();

        let runner = Arc::new(
            runner_with("certbot 1.9.0").on("uninstall", FakeResponse::exit(2, "uninstall failed")),
        );
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let err = harness.updater(runner.clone(), inspector).run().await.unwrap_err();

        assert!(matches!(err, UpdaterError::ProcessFailed { code: Some(2), .. }));
        assert!(runner.calls_to(INSTALLER_STEM).is_empty());
        assert!(harness.staging_is_empty());
    }

    #[tokio::test]
    async fn test_installer_failure_is_reported() {
        let harness = Harness::new().await;
        harness.serve_release("v1.10.0").await;
        harness.serve_installer(1).await;

        let runner =
            Arc::new(runner_with("certbot 1.9.0").on(INSTALLER_STEM, FakeResponse::exit(1, "")));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let err = harness.updater(runner, inspector).run().await.unwrap_err();

        assert!(matches!(err, UpdaterError::ProcessFailed { .. }));
        assert!(harness.staging_is_empty());
        let errors = harness.audit.with_severity(Severity::Error);
        assert!(errors[0].message.contains("running the installer"));
        assert!(!harness.messages().iter().any(|m| m.ends_with("is installed.")));
    }

    #[tokio::test]
    async fn test_unparsable_tag_is_treated_as_oldest() {
        let harness = Harness::new().await;
        harness.serve_release("nightly").await;
        harness.serve_installer(0).await;

        let runner = Arc::new(runner_with("garbage"));
        let inspector = Arc::new(FakeInspector::valid(SIGNER_KEY));
        let outcome = harness.updater(runner, inspector).run().await.unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::UpToDate {
                current: Version::sentinel(),
                latest: Version::sentinel(),
            }
        );
        // One warning for the local version, one for the tag
        assert_eq!(harness.audit.with_severity(Severity::Warning).len(), 2);
    }

    #[tokio::test]
    async fn test_feed_timeout() {
        let harness = Harness::new().await;
        Mock::given(method("GET"))
            .and(path("/releases/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(release_json("v9.9.9", &[]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&harness.server)
            .await;

        let config = UpdaterConfig {
            feed_timeout: Duration::from_millis(200),
            ..harness.config()
        };
        let runner = Arc::new(runner_with("certbot 1.9.0"));
        let updater = AutoUpdater::new(
            &config,
            runner,
            Arc::new(FakeInspector::valid(SIGNER_KEY)),
            Reporter::new(),
        )
        .unwrap();

        match updater.run().await {
            Err(UpdaterError::FeedUnreachable {
                reason,
                ..
            }) => assert!(reason.contains("timed out"), "{reason}"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
