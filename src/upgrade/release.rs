//! Release feed client.
//!
//! The feed is a single JSON object in the shape of GitHub's "latest release"
//! endpoint. Only the tag and the asset list are read; unknown fields are
//! ignored so mirrors can serve a trimmed document.

use regex::Regex;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::constants::user_agent;
use crate::core::UpdaterError;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    /// File name of the asset
    pub name: String,
    /// Direct download URL
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// The latest published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDescriptor {
    /// Release tag, typically `vX.Y.Z`
    pub tag_name: String,
    /// Attached files
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseDescriptor {
    /// Assets whose name matches `pattern`.
    pub fn matching_assets<'a>(
        &'a self,
        pattern: &'a Regex,
    ) -> impl Iterator<Item = &'a ReleaseAsset> + 'a {
        self.assets.iter().filter(move |asset| pattern.is_match(&asset.name))
    }
}

/// HTTP client for the release feed.
#[derive(Debug, Clone)]
pub struct ReleaseFeed {
    client: reqwest::Client,
    url: String,
}

impl ReleaseFeed {
    /// Client for `url` whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, UpdaterError> {
        let url = url.into();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .default_headers(headers)
            .build()
            .map_err(|e| UpdaterError::FeedUnreachable {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            url,
        })
    }

    /// Fetch and decode the latest release.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::FeedUnreachable`] for transport failures, timeouts and
    /// non-success statuses; [`UpdaterError::FeedMalformed`] when the body is
    /// not a release object.
    pub async fn latest(&self) -> Result<ReleaseDescriptor, UpdaterError> {
        debug!("Fetching latest release from {}", self.url);

        let unreachable = |reason: String| UpdaterError::FeedUnreachable {
            url: self.url.clone(),
            reason,
        };

        let response =
            self.client.get(&self.url).send().await.map_err(|e| unreachable(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unreachable(format!("HTTP {status}")));
        }

        let body = response.bytes().await.map_err(|e| unreachable(describe(&e)))?;
        let release: ReleaseDescriptor =
            serde_json::from_slice(&body).map_err(|e| UpdaterError::FeedMalformed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        debug!("Latest release is {} with {} assets", release.tag_name, release.assets.len());
        Ok(release)
    }
}

/// Render a reqwest error, calling out timeouts explicitly.
pub(crate) fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() { format!("request timed out ({error})") } else { error.to_string() }
}
