//! Version extraction and comparison.
//!
//! Certbot versions reach the updater as free-form text: the output of
//! `certbot --version` (`certbot 1.9.0`) and release tags (`v1.10.0`).
//! [`Version`] extracts the first `major.minor.patch` triple from such text
//! and orders versions numerically component by component, so that
//! `1.10.0 > 1.9.0` even though the strings compare the other way.
//!
//! Anything after the triple (`-beta1`, `.dev0`, `+build`) is ignored, which
//! keeps comparisons total: two inputs that share a triple are equal.
//!
//! # Examples
//!
//! ```rust
//! use certbot_updater::version::Version;
//!
//! let installed = Version::extract("certbot 1.9.0").unwrap();
//! let latest: Version = "v1.10.0".parse().unwrap();
//! assert!(installed < latest);
//! assert_eq!(Version::extract_or_sentinel("command not found"), Version::sentinel());
//! ```

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::core::UpdaterError;

static TRIPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("version regex is valid"));

/// A `major.minor.patch` version.
///
/// Backed by [`semver::Version`] without pre-release or build metadata, so
/// ordering is plain lexicographic-numeric ordering on the triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(semver::Version);

impl Version {
    /// Create a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// The lowest possible version, `0.0.0`.
    ///
    /// Substituted when the installed version cannot be determined, which makes
    /// any published release look newer.
    #[must_use]
    pub const fn sentinel() -> Self {
        Self::new(0, 0, 0)
    }

    /// Whether this is the sentinel `0.0.0`.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    /// Extract the first `major.minor.patch` triple found in `text`.
    ///
    /// # Errors
    ///
    /// Returns [`UpdaterError::VersionParse`] when no triple is present or a
    /// component does not fit in a `u64`.
    pub fn extract(text: &str) -> Result<Self, UpdaterError> {
        let parse_error = || UpdaterError::VersionParse {
            input: text.trim().to_string(),
        };

        let captures = TRIPLE.captures(text).ok_or_else(parse_error)?;
        let component = |index: usize| -> Result<u64, UpdaterError> {
            captures[index].parse::<u64>().map_err(|_| parse_error())
        };

        Ok(Self::new(component(1)?, component(2)?, component(3)?))
    }

    /// Like [`Version::extract`] but falls back to [`Version::sentinel`].
    #[must_use]
    pub fn extract_or_sentinel(text: &str) -> Self {
        Self::extract(text).unwrap_or_else(|_| Self::sentinel())
    }

    /// Major component.
    #[must_use]
    pub const fn major(&self) -> u64 {
        self.0.major
    }

    /// Minor component.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Patch component.
    #[must_use]
    pub const fn patch(&self) -> u64 {
        self.0.patch
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::sentinel()
    }
}

impl FromStr for Version {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::extract(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0.major, self.0.minor, self.0.patch)
    }
}
