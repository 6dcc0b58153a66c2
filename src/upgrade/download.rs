//! Installer download.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::release::{ReleaseAsset, describe};
use crate::constants::user_agent;
use crate::core::UpdaterError;
use crate::utils::security::validate_asset_file_name;

/// A fully written installer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedInstaller {
    /// Location of the file
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the content
    pub sha256: String,
    /// Size in bytes
    pub size: u64,
}

/// Streams release assets to disk.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: reqwest::Client,
}

impl Downloader {
    /// Downloader whose transfers give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, UpdaterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| UpdaterError::DownloadFailed {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
        })
    }

    /// Download `asset` to `<dir>/<asset name>`, hashing it on the way.
    ///
    /// The asset name is validated before anything is requested.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::InvalidAssetName`] for unsafe names,
    /// [`UpdaterError::DownloadFailed`] for transport failures, timeouts and
    /// non-success statuses, [`UpdaterError::Io`] when the file cannot be written.
    pub async fn download(
        &self,
        asset: &ReleaseAsset,
        dir: &Path,
    ) -> Result<DownloadedInstaller, UpdaterError> {
        validate_asset_file_name(&asset.name)?;
        let path = dir.join(&asset.name);

        let failed = |reason: String| UpdaterError::DownloadFailed {
            url: asset.download_url.clone(),
            reason,
        };

        debug!("Downloading {} to {}", asset.download_url, path.display());
        let mut response =
            self.client.get(&asset.download_url).send().await.map_err(|e| failed(describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }

        let mut file = tokio::fs::File::create(&path).await?;
        let mut hasher = Sha256::new();
        let mut size = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(|e| failed(describe(&e)))? {
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        let sha256 = hex::encode(hasher.finalize());
        debug!("Downloaded {} bytes, sha256 {}", size, sha256);

        Ok(DownloadedInstaller {
            path,
            sha256,
            size,
        })
    }
}
