//! Argument parsing and error rendering of the binary.

use predicates::prelude::*;

use super::Sandbox;

#[test]
fn test_help_lists_commands() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("task"));
}

#[test]
fn test_version_flag() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_command_fails() {
    let sandbox = Sandbox::new();
    sandbox.command().arg("frobnicate").assert().failure();
}

#[test]
fn test_invalid_configuration_exits_with_error() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .env("CERTBOT_UPDATER_FEED_TIMEOUT_SECS", "soon")
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("feed_timeout_secs"))
        .stderr(predicate::str::contains("suggestion"));

    // Reported to the audit log even though the configuration never loaded
    let events = sandbox.audit_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["severity"], "Error");
    let message = events[0]["message"].as_str().unwrap();
    assert!(message.contains("while loading the configuration"), "{message}");
    assert!(message.contains("feed_timeout_secs"), "{message}");
}

#[test]
fn test_invalid_configuration_file_exits_with_error() {
    let sandbox = Sandbox::new();
    std::fs::write(sandbox.config_file(), "install_dir = [").unwrap();
    sandbox
        .command()
        .env_remove("CERTBOT_UPDATER_INSTALL_DIR")
        .arg("check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse"));

    let events = sandbox.audit_events();
    assert_eq!(events.len(), 1);
    assert!(events[0]["message"].as_str().unwrap().contains("Failed to parse"));
}

#[cfg(not(windows))]
#[test]
fn test_task_management_requires_windows() {
    let sandbox = Sandbox::new();
    sandbox
        .command()
        .args(["task", "status"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not supported on this platform"));
}
