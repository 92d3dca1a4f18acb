use std::fmt;

use super::Version;
use crate::error::ModInstallerError;

/// A constraint on the version of a dependency.
///
/// `1.2.0` matches exactly that version, `^1.2.0` matches every version in
/// `[1.2.0, 2.0.0)`. A caret on the largest major number has no upper bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequirement {
    Exact(Version),
    Caret { min: Version, max: Option<Version> },
}

impl VersionRequirement {
    pub fn parse(requirement: &str) -> Result<Self, ModInstallerError> {
        let requirement = requirement.trim();
        match requirement.strip_prefix('^') {
            Some(rest) => {
                let min = Version::parse(rest)?;
                let max = min.next_major();
                Ok(VersionRequirement::Caret { min, max })
            }
            None => Ok(VersionRequirement::Exact(Version::parse(requirement)?)),
        }
    }

    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        match self {
            VersionRequirement::Exact(expected) => expected == version,
            VersionRequirement::Caret { min, max } => {
                min <= version && max.as_ref().is_none_or(|max| version < max)
            }
        }
    }
}

impl fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRequirement::Exact(version) => write!(f, "{}", version),
            VersionRequirement::Caret { min, .. } => write!(f, "^{}", min),
        }
    }
}
