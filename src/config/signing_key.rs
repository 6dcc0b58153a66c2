//! The pinned publisher key that installers must be signed with.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt;

use crate::core::UpdaterError;

/// Public key of the only certificate allowed to sign Certbot installers.
///
/// The bytes must use the same encoding that Windows reports for the signer
/// certificate (`X509Certificate.GetPublicKey()`); comparison is byte for
/// byte. The key can be supplied as bare base64 or wrapped in PEM armor.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustedPublicKey {
    bytes: Vec<u8>,
}

impl TrustedPublicKey {
    /// Decode a base64 or PEM encoded key.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::InvalidPublicKey`] when the text is not valid
    /// base64 or decodes to nothing.
    pub fn parse(encoded: &str) -> Result<Self, UpdaterError> {
        let body: String = encoded
            .lines()
            .map(str::trim)
            .filter(|line| !line.starts_with("-----"))
            .collect();

        let bytes = STANDARD.decode(body.as_bytes()).map_err(|e| UpdaterError::InvalidPublicKey {
            reason: e.to_string(),
        })?;

        if bytes.is_empty() {
            return Err(UpdaterError::InvalidPublicKey {
                reason: "key is empty".to_string(),
            });
        }

        Ok(Self {
            bytes,
        })
    }

    /// Wrap raw key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
        }
    }

    /// Whether `candidate` is exactly this key.
    #[must_use]
    pub fn matches(&self, candidate: &[u8]) -> bool {
        self.bytes == candidate
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Base64 encoding of the key.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

impl fmt::Debug for TrustedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustedPublicKey").field("len", &self.bytes.len()).finish()
    }
}
