use serde::{Deserialize, Serialize};

use super::{ModDefinition, ModDependencies, ModDependency};

/// Ordered collection of definitions without duplicates (by name and
/// version). Insertion order is preserved and acts as catalog order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<ModDefinition>", into = "Vec<ModDefinition>")]
pub struct ModDefinitions {
    definitions: Vec<ModDefinition>,
}

impl ModDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `definition` unless one with the same identity is present.
    pub fn add(&mut self, definition: ModDefinition) {
        if !self.contains(&definition) {
            self.definitions.push(definition);
        }
    }

    pub fn contains(&self, definition: &ModDefinition) -> bool {
        self.definitions.contains(definition)
    }

    pub fn remove(&mut self, definition: &ModDefinition) {
        self.definitions.retain(|d| d != definition);
    }

    /// Removes every version of the named mod.
    pub fn remove_name(&mut self, name: &str) {
        self.definitions.retain(|d| d.name != name);
    }

    pub fn with_name(&self, name: &str) -> ModDefinitions {
        self.iter().filter(|d| d.name == name).cloned().collect()
    }

    /// Looks up a definition by name and published version string.
    pub fn get(&self, name: &str, version: &str) -> Option<&ModDefinition> {
        self.iter()
            .find(|d| d.name == name && d.version() == version)
    }

    pub fn matching(&self, dependency: &ModDependency) -> ModDefinitions {
        self.iter().filter(|d| d.satisfies(dependency)).cloned().collect()
    }

    /// Members of `a` that are also in `b`, in the order of `a`.
    pub fn intersect(a: &ModDefinitions, b: &ModDefinitions) -> ModDefinitions {
        a.iter().filter(|d| b.contains(d)).cloned().collect()
    }

    /// Members of `a` followed by the members of `b` not in `a`.
    pub fn merge(a: &ModDefinitions, b: &ModDefinitions) -> ModDefinitions {
        let mut result = a.clone();
        result.extend(b.iter().cloned());
        result
    }

    /// All declared dependencies grouped by the name of the required mod.
    /// Groups are ordered by first appearance.
    pub fn all_dependencies_grouped_by_name(&self) -> Vec<(String, ModDependencies)> {
        let mut groups: Vec<(String, ModDependencies)> = Vec::new();
        for dependency in self.iter().flat_map(|d| d.dependencies.iter()) {
            match groups.iter_mut().find(|(name, _)| *name == dependency.name) {
                Some((_, group)) => group.add(dependency.clone()),
                None => {
                    let mut group = ModDependencies::new();
                    group.add(dependency.clone());
                    groups.push((dependency.name.clone(), group));
                }
            }
        }
        groups
    }

    pub fn satisfies(&self, dependency: &ModDependency) -> bool {
        self.iter().any(|d| d.satisfies(dependency))
    }

    /// True if every requirement is met by some member. Different members
    /// may satisfy different requirements.
    pub fn satisfies_all(&self, dependencies: &ModDependencies) -> bool {
        dependencies.iter().all(|dependency| self.satisfies(dependency))
    }

    /// The member with the highest version; the earliest one on ties.
    pub fn latest(&self) -> Option<&ModDefinition> {
        self.iter().fold(None, |best: Option<&ModDefinition>, candidate| match best {
            Some(best) if best.parsed_version() >= candidate.parsed_version() => Some(best),
            _ => Some(candidate),
        })
    }

    /// The latest version of every mod, ordered by first appearance of
    /// the mod name.
    pub fn latest_versions(&self) -> ModDefinitions {
        let mut names: Vec<&str> = Vec::new();
        for definition in self.iter() {
            if !names.contains(&definition.name.as_str()) {
                names.push(&definition.name);
            }
        }

        names
            .into_iter()
            .filter_map(|name| self.with_name(name).latest().cloned())
            .collect()
    }

    /// Definitions sorted newest first; stable for equal versions.
    pub fn sorted_newest_first(&self) -> ModDefinitions {
        let mut sorted = self.definitions.clone();
        sorted.sort_by(|a, b| b.parsed_version().cmp(a.parsed_version()));
        Self { definitions: sorted }
    }

    pub fn reverse(&mut self) {
        self.definitions.reverse();
    }

    pub fn first(&self) -> Option<&ModDefinition> {
        self.definitions.first()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModDefinition> {
        self.definitions.iter()
    }
}

impl Extend<ModDefinition> for ModDefinitions {
    fn extend<T: IntoIterator<Item = ModDefinition>>(&mut self, iter: T) {
        for definition in iter {
            self.add(definition);
        }
    }
}

impl FromIterator<ModDefinition> for ModDefinitions {
    fn from_iter<T: IntoIterator<Item = ModDefinition>>(iter: T) -> Self {
        let mut result = ModDefinitions::new();
        result.extend(iter);
        result
    }
}

impl From<Vec<ModDefinition>> for ModDefinitions {
    fn from(definitions: Vec<ModDefinition>) -> Self {
        definitions.into_iter().collect()
    }
}

impl From<ModDefinitions> for Vec<ModDefinition> {
    fn from(definitions: ModDefinitions) -> Self {
        definitions.definitions
    }
}

impl IntoIterator for ModDefinitions {
    type Item = ModDefinition;
    type IntoIter = std::vec::IntoIter<ModDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.into_iter()
    }
}

impl<'a> IntoIterator for &'a ModDefinitions {
    type Item = &'a ModDefinition;
    type IntoIter = std::slice::Iter<'a, ModDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.definitions.iter()
    }
}
