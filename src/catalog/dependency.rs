use serde::{Deserialize, Serialize};
use std::fmt;

use crate::version::{Version, VersionRequirement};

/// A declared dependency: a mod name plus a requirement string.
///
/// Identity is the pair `(name, version)`, so `C 1.0.0` and `C ^1.1.0` are
/// distinct entries even though they name the same mod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModDependency {
    pub name: String,
    pub version: String,
}

impl ModDependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// An unparsable requirement is never satisfied.
    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        match VersionRequirement::parse(&self.version) {
            Ok(requirement) => requirement.is_satisfied_by(version),
            Err(e) => {
                log::debug!("Ignoring requirement of {}: {}", self.name, e);
                false
            }
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.version)
    }
}

impl fmt::Display for ModDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Ordered set of dependencies, insertion order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModDependencies {
    dependencies: Vec<ModDependency>,
}

impl ModDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `dependency` unless an identical one is already present.
    pub fn add(&mut self, dependency: ModDependency) {
        if !self.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }

    pub fn contains(&self, dependency: &ModDependency) -> bool {
        self.dependencies.contains(dependency)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModDependency> {
        self.dependencies.iter()
    }
}

impl Extend<ModDependency> for ModDependencies {
    fn extend<T: IntoIterator<Item = ModDependency>>(&mut self, iter: T) {
        for dependency in iter {
            self.add(dependency);
        }
    }
}

impl FromIterator<ModDependency> for ModDependencies {
    fn from_iter<T: IntoIterator<Item = ModDependency>>(iter: T) -> Self {
        let mut result = ModDependencies::new();
        result.extend(iter);
        result
    }
}

impl<'a> IntoIterator for &'a ModDependencies {
    type Item = &'a ModDependency;
    type IntoIter = std::slice::Iter<'a, ModDependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.dependencies.iter()
    }
}

impl fmt::Display for ModDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.dependencies.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", names.join(", "))
    }
}
