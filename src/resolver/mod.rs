//! Dependency resolution.
//!
//! Given a mod to install and the current installations, the resolver
//! computes which definitions to install (dependency-first) and which
//! installations to remove, or reports the requirements that cannot be met.
//!
//! The search is greedy: it repeatedly picks the first group of
//! requirements on one mod name that the planned state does not satisfy and
//! installs the highest version meeting all of them. Only the last failing
//! group is reported.

mod resolution;

use log::debug;

use crate::catalog::{ModDefinition, ModDefinitions, ModDependencies, ModDependency};
use crate::installation::Installations;

pub use resolution::{DependencyResolution, Resolution};

/// Read-only view on the available definitions.
pub trait Catalog {
    /// Every definition satisfying `dependency`, in catalog order.
    fn matching(&self, dependency: &ModDependency) -> ModDefinitions;

    /// The definition published under exactly this name and version.
    fn get_mod_definition(&self, name: &str, version: &str) -> Option<ModDefinition>;
}

impl Catalog for ModDefinitions {
    fn matching(&self, dependency: &ModDependency) -> ModDefinitions {
        ModDefinitions::matching(self, dependency)
    }

    fn get_mod_definition(&self, name: &str, version: &str) -> Option<ModDefinition> {
        self.get(name, version).cloned()
    }
}

pub struct DependencyResolver<'a, C: Catalog + ?Sized> {
    catalog: &'a C,
    installations: &'a Installations,
}

impl<'a, C: Catalog + ?Sized> DependencyResolver<'a, C> {
    pub fn new(catalog: &'a C, installations: &'a Installations) -> Self {
        Self {
            catalog,
            installations,
        }
    }

    #[tracing::instrument(skip(self, target), fields(target = %target))]
    pub fn resolve(&self, target: &ModDefinition) -> Resolution {
        let mut installed = self.installed_definitions();
        let mut resolution = Resolution::default();

        let mut next = Some(target.clone());
        while let Some(current) = next.take() {
            self.replace(&mut installed, &mut resolution, current);

            let Some(group) = first_unsatisfied_group(&installed) else {
                break;
            };

            let dependency_resolution = self.find_matching_version(group);
            debug!(
                "Unsatisfied requirements {} -> {:?}",
                dependency_resolution.requested,
                dependency_resolution.best_match.as_ref().map(|d| d.display_name())
            );

            if !dependency_resolution.is_available() {
                resolution.missing_dependencies = Some(dependency_resolution.requested);
                continue;
            }

            match dependency_resolution.best_match {
                Some(best) if resolution.install.contains(&best) => {
                    // Going back to an already planned version would never end.
                    resolution.unresolvable_dependencies = Some(dependency_resolution.requested);
                }
                Some(best) => next = Some(best),
                None => {
                    resolution.unresolvable_dependencies = Some(dependency_resolution.requested);
                }
            }
        }

        self.consolidate(&mut resolution);
        resolution
    }

    /// Definitions of all current installations still known to the catalog.
    fn installed_definitions(&self) -> ModDefinitions {
        self.installations
            .iter()
            .filter_map(|installation| {
                let definition = self
                    .catalog
                    .get_mod_definition(&installation.name, &installation.version);
                if definition.is_none() {
                    debug!("{} is no longer in any source", installation.display_name());
                }
                definition
            })
            .collect()
    }

    /// Plans `definition` in place of every other version of the same mod.
    fn replace(
        &self,
        installed: &mut ModDefinitions,
        resolution: &mut Resolution,
        definition: ModDefinition,
    ) {
        installed.remove_name(&definition.name);
        for installation in self.installations.with_name(&definition.name) {
            if !resolution.uninstall.contains(&installation) {
                resolution.uninstall.add(installation);
            }
        }

        installed.add(definition.clone());
        resolution.install.add(definition);
    }

    fn find_matching_version(&self, requested: ModDependencies) -> DependencyResolution {
        let matching: Vec<ModDefinitions> = requested
            .iter()
            .map(|dependency| self.catalog.matching(dependency))
            .collect();

        let available = matching
            .iter()
            .fold(ModDefinitions::new(), |union, each| {
                ModDefinitions::merge(&union, each)
            });

        let candidates = matching
            .iter()
            .skip(1)
            .fold(matching.first().cloned().unwrap_or_default(), |acc, each| {
                ModDefinitions::intersect(&acc, each)
            });

        DependencyResolution {
            requested,
            available,
            best_match: candidates.latest().cloned(),
        }
    }

    /// Drops no-op pairs and already installed definitions, then puts the
    /// install list into dependency-first order.
    fn consolidate(&self, resolution: &mut Resolution) {
        let planned = std::mem::take(&mut resolution.install);
        for definition in planned {
            let uninstall = resolution
                .uninstall
                .iter()
                .find(|installation| installation.matches(&definition))
                .cloned();

            if let Some(uninstall) = uninstall {
                resolution.uninstall.remove(&uninstall);
                continue;
            }

            if self.installations.contains_definition(&definition) {
                continue;
            }

            resolution.install.add(definition);
        }

        resolution.install.reverse();
    }
}

fn first_unsatisfied_group(installed: &ModDefinitions) -> Option<ModDependencies> {
    installed
        .all_dependencies_grouped_by_name()
        .into_iter()
        .map(|(_, group)| group)
        .find(|group| !installed.satisfies_all(group))
}
