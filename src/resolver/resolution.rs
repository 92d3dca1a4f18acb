use crate::catalog::{ModDefinition, ModDefinitions, ModDependencies};
use crate::error::ModInstallerError;
use crate::installation::Installations;

/// The plan computed for installing one mod.
///
/// `install` is in dependency-first order. A resolution with missing or
/// unresolvable dependencies must not be executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    pub install: ModDefinitions,
    pub uninstall: Installations,
    pub missing_dependencies: Option<ModDependencies>,
    pub unresolvable_dependencies: Option<ModDependencies>,
}

impl Resolution {
    pub fn has_missing_dependencies(&self) -> bool {
        self.missing_dependencies
            .as_ref()
            .is_some_and(|d| !d.is_empty())
    }

    pub fn has_unresolvable_dependencies(&self) -> bool {
        self.unresolvable_dependencies
            .as_ref()
            .is_some_and(|d| !d.is_empty())
    }

    pub fn is_erroneous(&self) -> bool {
        self.has_missing_dependencies() || self.has_unresolvable_dependencies()
    }

    /// Nothing to install or uninstall.
    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.uninstall.is_empty()
    }

    /// Why the plan cannot be executed; missing dependencies take precedence.
    pub fn error(&self) -> Option<ModInstallerError> {
        match (&self.missing_dependencies, &self.unresolvable_dependencies) {
            (Some(missing), _) if self.has_missing_dependencies() => {
                Some(ModInstallerError::MissingDependency(missing.clone()))
            }
            (_, Some(unresolvable)) if self.has_unresolvable_dependencies() => {
                Some(ModInstallerError::UnresolvableDependency(unresolvable.clone()))
            }
            _ => None,
        }
    }
}

/// Outcome of looking up one group of requirements on the same mod.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolution {
    pub requested: ModDependencies,
    /// Definitions satisfying at least one of the requirements.
    pub available: ModDefinitions,
    /// Highest version satisfying all requirements.
    pub best_match: Option<ModDefinition>,
}

impl DependencyResolution {
    pub fn is_available(&self) -> bool {
        !self.available.is_empty()
    }
}
