//! Integration test suite for certbot-updater
//!
//! End-to-end tests of the binary and the public library API. The release
//! feed and installer downloads are served by `wiremock`; install
//! directories, configuration files and audit logs live in temporary
//! directories, so nothing on the host is touched.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: Argument parsing, help output and error rendering
//! - **configuration**: Layered configuration sources
//! - **workflow**: Upgrade runs against a mock feed

mod cli;
mod configuration;
mod workflow;

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Isolated environment for running the binary.
pub struct Sandbox {
    root: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("install")).unwrap();
        Self {
            root,
        }
    }

    pub fn install_dir(&self) -> PathBuf {
        self.root.path().join("install")
    }

    pub fn audit_log(&self) -> PathBuf {
        self.root.path().join("logs").join("audit.log")
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.path().join("config.toml")
    }

    /// The binary with every configuration source pointed into the sandbox.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("certbot-updater").unwrap();
        cmd.env_remove("RUST_LOG")
            .env("CERTBOT_UPDATER_CONFIG", self.config_file())
            .env("CERTBOT_UPDATER_INSTALL_DIR", self.install_dir())
            .env("CERTBOT_UPDATER_AUDIT_LOG_PATH", self.audit_log())
            .env("CERTBOT_UPDATER_EVENT_LOG", "false")
            .env("CERTBOT_UPDATER_CERTBOT_COMMAND", "certbot-not-installed-7c1e");
        cmd
    }

    /// Audit events written so far, as parsed JSON lines.
    pub fn audit_events(&self) -> Vec<serde_json::Value> {
        std::fs::read_to_string(self.audit_log())
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Names of the entries in the install directory.
    pub fn install_dir_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.install_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}
