//! Global constants used throughout the updater.
//!
//! Timeouts, default locations and the well-known names shared with the
//! Windows installer live here so that magic values stay discoverable.

use std::time::Duration;

/// Default release feed queried for the latest Certbot release.
pub const DEFAULT_UPGRADE_API_URL: &str =
    "https://api.github.com/repos/certbot/certbot/releases/latest";

/// Built-in public key of the Certbot release signing certificate.
///
/// This is the base64 encoding of the DER `RSAPublicKey` returned by
/// `X509Certificate.GetPublicKey()` for the signing certificate. It can be
/// overridden through the `signing_public_key` configuration key.
pub const DEFAULT_SIGNING_PUBLIC_KEY: &str = "MIIBCgKCAQEA2lh7ssBsdT8bP+2Kvh+AIvXUSg38dWCqWYleVwW+3yYyCojkkgEOZUAmPbp30H6ZvqlWU4MGEkXRQdDEecfoPW6MZpB0lcmd3cw3PS66VOi8LaMBBk5GzXLjYiMCgYMOjh9m7uNvcngxUVwveatmtm/KCSHSvDiDxtiQBFhWVa0jcyW4HYCuQlmLIvyttsquw8lGSY590MhdLQPi46XUqnaXTR57Mrob3l3gJIcLoFvh+p4M33NpFQgLTbm2rPIZcdbDwk4ZgOKjQQ6YS6QDcvQ3kBA9rlcufEv2xUbE22rX4bDe+gCuh7QqZ/TFH0DygPc5zSWMoat9SR/F0edBbwIDAQAB";

/// Regex matched against release asset names to find the Windows installer.
pub const DEFAULT_INSTALLER_PATTERN: &str = r"^certbot-.*-win32\.exe$";

/// Command used to query the locally installed Certbot version.
pub const DEFAULT_CERTBOT_COMMAND: &str = "certbot";

/// Uninstaller file name inside the install directory.
pub const UNINSTALLER_FILE_NAME: &str = "uninstall.exe";

/// Timeout for fetching the release feed (60 seconds).
pub const FEED_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for downloading the installer (1 hour).
///
/// Installers bundle a full Python runtime and can be large on slow links.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Timeout for `certbot --version` (60 seconds).
pub const VERSION_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for PowerShell helper invocations (120 seconds).
pub const POWERSHELL_TIMEOUT: Duration = Duration::from_secs(120);

/// Registry key holding configuration overrides written by the installer.
pub const REGISTRY_KEY: &str = r"HKLM\Software\Certbot";

/// Windows event log receiving audit events.
pub const EVENT_LOG_NAME: &str = "Certbot";

/// Event source registered in [`EVENT_LOG_NAME`].
pub const EVENT_LOG_SOURCE: &str = "certbot-updater";

/// Name of the scheduled task that renews certificates and runs the updater.
pub const SCHEDULED_TASK_NAME: &str = "Certbot Renew and Auto-Update Task";

/// Prefix for environment variable overrides (`CERTBOT_UPDATER_<KEY>`).
pub const ENV_PREFIX: &str = "CERTBOT_UPDATER_";

/// Environment variable pointing at an alternate configuration file.
pub const CONFIG_PATH_ENV: &str = "CERTBOT_UPDATER_CONFIG";

/// User agent sent with every HTTP request.
pub fn user_agent() -> String {
    format!("certbot-updater/{}", env!("CARGO_PKG_VERSION"))
}
