//! Validation of untrusted strings before they reach the file system or a shell.
//!
//! Release metadata is untrusted until the downloaded artifact has passed
//! signature verification, so anything taken from it (asset names in
//! particular) is checked here before use.

use std::path::{Component, Path};

use crate::core::UpdaterError;

/// Ensure an asset name can be used as a plain file name inside a directory.
///
/// Rejects empty names, names containing `/` or `\`, drive prefixes, `.`/`..`
/// and names with control characters.
///
/// # Examples
/// ```
/// use certbot_updater::utils::security::validate_asset_file_name;
///
/// assert!(validate_asset_file_name("certbot-2.0.0-win32.exe").is_ok());
/// assert!(validate_asset_file_name("../certbot.exe").is_err());
/// assert!(validate_asset_file_name(r"C:\Windows\certbot.exe").is_err());
/// ```
pub fn validate_asset_file_name(name: &str) -> Result<(), UpdaterError> {
    let invalid = || UpdaterError::InvalidAssetName {
        name: name.to_string(),
    };

    if name.is_empty()
        || name.contains(['/', '\\', ':'])
        || name.chars().any(char::is_control)
        || name == "."
        || name == ".."
    {
        return Err(invalid());
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}

/// Quote a string as a PowerShell single-quoted literal.
///
/// Single quotes are the only character with special meaning inside a
/// single-quoted PowerShell string; they are escaped by doubling.
///
/// # Examples
/// ```
/// use certbot_updater::utils::security::powershell_literal;
///
/// assert_eq!(powershell_literal(r"C:\Temp\a.exe"), r"'C:\Temp\a.exe'");
/// assert_eq!(powershell_literal("it's"), "'it''s'");
/// ```
#[must_use]
pub fn powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
