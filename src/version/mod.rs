//! Version parsing and ordering.
//!
//! Mod versions look like semantic versions but allow a trailing "special"
//! segment (`1.6c`) and a prerelease segment (`1.1-pre`). Minor and patch
//! may be omitted and default to zero.

mod requirement;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::ModInstallerError;

pub use requirement::VersionRequirement;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)(?:\.([0-9]+)(?:\.([0-9]+))?)?([A-Za-z0-9_]+)?(?:-([A-Za-z0-9_]+))?$")
        .expect("version pattern is a valid regex")
});

/// A parsed version. Two versions are equal iff they compare as equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: u32,
    special: String,
    prerelease: String,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            ..Default::default()
        }
    }

    /// Parse a version string, ignoring a leading `v` or `V`.
    pub fn parse(version: &str) -> Result<Self, ModInstallerError> {
        let trimmed = version.trim();
        let stripped = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let invalid = || ModInstallerError::InvalidVersionFormat(version.to_string());
        let captures = VERSION_PATTERN.captures(stripped).ok_or_else(invalid)?;

        let number = |index: usize| -> Result<u32, ModInstallerError> {
            match captures.get(index) {
                Some(m) => m.as_str().parse().map_err(|_| invalid()),
                None => Ok(0),
            }
        };
        let text = |index: usize| {
            captures
                .get(index)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            special: text(4),
            prerelease: text(5),
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    pub fn special(&self) -> &str {
        &self.special
    }

    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    /// The first version of the next major line: `1.4.2-pre` -> `2.0.0`.
    /// `None` when the major number is already the largest possible.
    pub fn next_major(&self) -> Option<Self> {
        self.major.checked_add(1).map(|major| Self::new(major, 0, 0))
    }
}

/// Empty sorts first.
fn compare_special(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

/// Empty sorts last: a prerelease comes before its release.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| compare_special(&self.special, &other.special))
            .then_with(|| compare_prerelease(&self.prerelease, &other.prerelease))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}{}", self.major, self.minor, self.patch, self.special)?;
        if !self.prerelease.is_empty() {
            write!(f, "-{}", self.prerelease)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ModInstallerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}
