//! Semantic version bumping for releases.

use std::fmt;
use std::str::FromStr;

use semver::Version;

use crate::error::{Error, Result};

/// Type of semantic version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BumpType {
    /// Major version bump (1.0.0 -> 2.0.0).
    Major,
    /// Minor version bump (1.0.0 -> 1.1.0).
    Minor,
    /// Patch version bump (1.0.0 -> 1.0.1).
    #[default]
    Patch,
}

impl BumpType {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            BumpType::Major => "major",
            BumpType::Minor => "minor",
            BumpType::Patch => "patch",
        }
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "major" => Ok(BumpType::Major),
            "minor" => Ok(BumpType::Minor),
            "patch" => Ok(BumpType::Patch),
            other => Err(Error::Release(format!(
                "Invalid bump type: {}. Expected major, minor or patch",
                other
            ))),
        }
    }
}

/// Returns `current` bumped by `bump_type`.
///
/// Pre-release and build metadata are dropped.
///
/// # Errors
///
/// Returns [`Error::Release`] if `current` is not a semantic version or the
/// bumped component would overflow.
pub fn bump_version(current: &str, bump_type: BumpType) -> Result<String> {
    let version = Version::parse(current.trim())
        .map_err(|e| Error::Release(format!("Invalid version {}: {}", current, e)))?;

    let increment = |component: u64| {
        component.checked_add(1).ok_or_else(|| {
            Error::Release(format!(
                "Cannot apply {} bump to {}: version component overflows",
                bump_type, current
            ))
        })
    };

    let new_version = match bump_type {
        BumpType::Major => Version::new(increment(version.major)?, 0, 0),
        BumpType::Minor => Version::new(version.major, increment(version.minor)?, 0),
        BumpType::Patch => Version::new(version.major, version.minor, increment(version.patch)?),
    };

    Ok(new_version.to_string())
}
