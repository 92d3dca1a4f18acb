//! Records of installed mods and the files they produced.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::ModDefinition;
use crate::runtime::Runtime;
use crate::version::Version;

/// One installed mod version.
///
/// `assets` lists every path the install produced, relative to the mods
/// directory and `/`-separated. It is the only list of paths an uninstall
/// may delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_definition: Option<String>,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub assets: Vec<String>,
}

impl Installation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Starts an empty record for `definition`.
    pub fn for_definition(definition: &ModDefinition) -> Self {
        Self {
            source_definition: definition.source_definition.clone(),
            name: definition.name.clone(),
            version: definition.version().to_string(),
            assets: Vec::new(),
        }
    }

    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets.extend(assets.into_iter().map(Into::into));
        self
    }

    pub fn add_asset(&mut self, asset: impl Into<String>) {
        self.assets.push(asset.into());
    }

    pub fn is_asset_referenced(&self, asset: &str) -> bool {
        self.assets.iter().any(|a| a == asset)
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.version)
    }

    /// Same mod name and the same version. Versions are compared parsed so
    /// that `v1.0` matches `1.0.0`; unparsable versions compare as text.
    pub fn matches(&self, definition: &ModDefinition) -> bool {
        if self.name != definition.name {
            return false;
        }
        match Version::parse(&self.version) {
            Ok(version) => &version == definition.parsed_version(),
            Err(_) => self.version == definition.version(),
        }
    }
}

/// All installation records, in installation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installations {
    #[serde(default)]
    installations: Vec<Installation>,
}

impl Installations {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No installations at {:?}", path);
            return Ok(Self::default());
        }
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(content.trim_start_matches('\u{feff}'))
            .with_context(|| format!("Failed to parse installations from {:?}", path))
    }

    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !runtime.exists(parent)
        {
            runtime.create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        runtime
            .write(path, content.as_bytes())
            .with_context(|| format!("Failed to save installations to {:?}", path))
    }

    pub fn add(&mut self, installation: Installation) {
        self.installations.push(installation);
    }

    /// Removes the first record equal to `installation`.
    pub fn remove(&mut self, installation: &Installation) -> bool {
        match self.installations.iter().position(|i| i == installation) {
            Some(index) => {
                self.installations.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, installation: &Installation) -> bool {
        self.installations.contains(installation)
    }

    pub fn contains_definition(&self, definition: &ModDefinition) -> bool {
        self.installations.iter().any(|i| i.matches(definition))
    }

    pub fn with_name(&self, name: &str) -> Installations {
        self.iter().filter(|i| i.name == name).cloned().collect()
    }

    pub fn with_asset(&self, asset: &str) -> Installations {
        self.iter()
            .filter(|i| i.is_asset_referenced(asset))
            .cloned()
            .collect()
    }

    pub fn is_asset_referenced(&self, asset: &str) -> bool {
        self.iter().any(|i| i.is_asset_referenced(asset))
    }

    pub fn len(&self) -> usize {
        self.installations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.installations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Installation> {
        self.installations.iter()
    }
}

impl FromIterator<Installation> for Installations {
    fn from_iter<T: IntoIterator<Item = Installation>>(iter: T) -> Self {
        Self {
            installations: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Installations {
    type Item = Installation;
    type IntoIter = std::vec::IntoIter<Installation>;

    fn into_iter(self) -> Self::IntoIter {
        self.installations.into_iter()
    }
}

impl<'a> IntoIterator for &'a Installations {
    type Item = &'a Installation;
    type IntoIter = std::slice::Iter<'a, Installation>;

    fn into_iter(self) -> Self::IntoIter {
        self.installations.iter()
    }
}
