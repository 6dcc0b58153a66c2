//! Test utilities for the updater
//!
//! Fakes for the seams that touch the host ([`FakeRunner`] for external
//! programs, [`FakeInspector`] for Authenticode) plus logging setup, so the
//! whole workflow can run in tests on any platform.
//!
//! # Example
//!
//! ```rust,no_run
//! use certbot_updater::test_utils::{FakeResponse, FakeRunner};
//!
//! let runner = FakeRunner::new()
//!     .on("certbot", FakeResponse::ok("certbot 1.9.0\n"))
//!     .on("uninstall", FakeResponse::ok(""));
//! ```

pub mod fakes;

pub use fakes::{FakeInspector, FakeResponse, FakeRunner, RecordedCall};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` if given, otherwise `RUST_LOG`; does nothing when neither is set.
///
/// ```bash
/// RUST_LOG=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// GitHub-style release JSON with one asset per `(name, url)` pair.
#[must_use]
pub fn release_json(tag: &str, assets: &[(&str, &str)]) -> serde_json::Value {
    serde_json::json!({
        "tag_name": tag,
        "name": format!("Certbot {tag}"),
        "assets": assets
            .iter()
            .map(|(name, url)| serde_json::json!({
                "name": name,
                "browser_download_url": url,
            }))
            .collect::<Vec<_>>(),
    })
}
