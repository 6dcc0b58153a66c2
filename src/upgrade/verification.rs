//! Installer signature checks.
//!
//! Two independent gates: Windows must report the Authenticode signature as
//! `Valid`, and the signer's public key must equal the pinned
//! [`TrustedPublicKey`]. [`AuthenticodeInspector`] asks PowerShell for the
//! report; other platforms get [`UnsupportedInspector`], which refuses every
//! file.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::TrustedPublicKey;
use crate::core::UpdaterError;
use crate::utils::powershell;
use crate::utils::process::CommandRunner;
use crate::utils::security::powershell_literal;

/// Authenticode verdict reported by Windows for a file.
///
/// Mirrors `System.Management.Automation.SignatureStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Signature present, intact and chained to a trusted root
    Valid,
    /// The file carries no signature
    NotSigned,
    /// The file was modified after signing
    HashMismatch,
    /// The signing certificate is not trusted
    NotTrusted,
    /// The signature is not supported for this file type
    NotSupportedFileFormat,
    /// The certificate chain could not be validated
    Incompatible,
    /// Windows could not determine the status
    UnknownError,
    /// Any status this build does not know about
    Other(String),
}

impl SignatureStatus {
    /// Parse the status name printed by PowerShell.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "Valid" => Self::Valid,
            "NotSigned" => Self::NotSigned,
            "HashMismatch" => Self::HashMismatch,
            "NotTrusted" => Self::NotTrusted,
            "NotSupportedFileFormat" => Self::NotSupportedFileFormat,
            "Incompatible" => Self::Incompatible,
            "UnknownError" => Self::UnknownError,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Valid => "Valid",
            Self::NotSigned => "NotSigned",
            Self::HashMismatch => "HashMismatch",
            Self::NotTrusted => "NotTrusted",
            Self::NotSupportedFileFormat => "NotSupportedFileFormat",
            Self::Incompatible => "Incompatible",
            Self::UnknownError => "UnknownError",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// What the platform says about a file's embedded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureReport {
    /// Trust verdict
    pub status: SignatureStatus,
    /// Human readable explanation of the verdict
    pub status_message: String,
    /// Subject of the signer certificate, if any
    pub subject: Option<String>,
    /// Public key of the signer certificate, if any
    pub signer_public_key: Option<Vec<u8>>,
}

/// Inspects embedded code signatures.
#[async_trait]
pub trait SignatureInspector: Send + Sync {
    /// Report on the signature of the file at `path`.
    async fn inspect(&self, path: &Path) -> Result<SignatureReport, UpdaterError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawReport {
    status: String,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    signer_public_key: Option<String>,
}

/// Reads Authenticode signatures with PowerShell's `Get-AuthenticodeSignature`.
pub struct AuthenticodeInspector {
    runner: Arc<dyn CommandRunner>,
}

impl AuthenticodeInspector {
    /// Inspector launching PowerShell through `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
        }
    }

    /// Script printing the signature of `path` as one JSON object.
    #[must_use]
    pub fn script(path: &Path) -> String {
        format!(
            "$ErrorActionPreference = 'Stop'; \
             $sig = Get-AuthenticodeSignature -LiteralPath {}; \
             $cert = $sig.SignerCertificate; \
             [pscustomobject]@{{ \
             Status = $sig.Status.ToString(); \
             StatusMessage = $sig.StatusMessage; \
             Subject = $(if ($cert) {{ $cert.Subject }} else {{ $null }}); \
             SignerPublicKey = $(if ($cert) {{ [Convert]::ToBase64String($cert.GetPublicKey()) }} else {{ $null }}) \
             }} | ConvertTo-Json -Compress",
            powershell_literal(&path.to_string_lossy())
        )
    }

    /// Decode the JSON printed by [`AuthenticodeInspector::script`].
    pub fn parse_report(path: &Path, json: &str) -> Result<SignatureReport, UpdaterError> {
        let failed = |reason: String| UpdaterError::SignatureInspectionFailed {
            path: path.display().to_string(),
            reason,
        };

        let raw: RawReport = serde_json::from_str(json.trim())
            .map_err(|e| failed(format!("unexpected PowerShell output: {e}")))?;

        let signer_public_key = match raw.signer_public_key.filter(|k| !k.is_empty()) {
            Some(encoded) => Some(
                STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| failed(format!("signer public key is not base64: {e}")))?,
            ),
            None => None,
        };

        Ok(SignatureReport {
            status: SignatureStatus::from_name(&raw.status),
            status_message: raw.status_message.unwrap_or_default(),
            subject: raw.subject,
            signer_public_key,
        })
    }
}

#[async_trait]
impl SignatureInspector for AuthenticodeInspector {
    async fn inspect(&self, path: &Path) -> Result<SignatureReport, UpdaterError> {
        debug!("Inspecting Authenticode signature of {}", path.display());

        let output = powershell::run_script(self.runner.as_ref(), &Self::script(path)).await?;
        if !output.success() {
            return Err(UpdaterError::SignatureInspectionFailed {
                path: path.display().to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }

        Self::parse_report(path, &output.stdout)
    }
}

/// Inspector for platforms without Authenticode; always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedInspector;

#[async_trait]
impl SignatureInspector for UnsupportedInspector {
    async fn inspect(&self, _path: &Path) -> Result<SignatureReport, UpdaterError> {
        Err(UpdaterError::PlatformNotSupported {
            operation: "Authenticode signature verification".to_string(),
        })
    }
}

/// The inspector for the current platform.
pub fn platform_inspector(runner: Arc<dyn CommandRunner>) -> Arc<dyn SignatureInspector> {
    if cfg!(windows) {
        Arc::new(AuthenticodeInspector::new(runner))
    } else {
        Arc::new(UnsupportedInspector)
    }
}

/// Accept `report` only if the signature is valid and made with `trusted`.
///
/// Trust-store validation and key pinning are independent: a valid signature
/// from another publisher is rejected, and so is an invalid signature from the
/// pinned key.
pub fn verify_report(
    report: &SignatureReport,
    trusted: &TrustedPublicKey,
    path: &Path,
) -> Result<(), UpdaterError> {
    let path_str = path.display().to_string();

    match &report.status {
        SignatureStatus::Valid => {}
        SignatureStatus::NotSigned => {
            return Err(UpdaterError::SignatureMissing {
                path: path_str,
            });
        }
        status => {
            return Err(UpdaterError::SignatureInvalid {
                path: path_str,
                status: status.to_string(),
                message: report.status_message.clone(),
            });
        }
    }

    match &report.signer_public_key {
        Some(key) if trusted.matches(key) => {
            info!(
                "Installer signed by trusted publisher{}",
                report.subject.as_deref().map(|s| format!(" {s}")).unwrap_or_default()
            );
            Ok(())
        }
        _ => Err(UpdaterError::SignerKeyMismatch {
            path: path_str,
        }),
    }
}
