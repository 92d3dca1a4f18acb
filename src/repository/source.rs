use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::description::SourceDescription;
use crate::catalog::{ModDefinition, ModDefinitions, ModDependency};
use crate::http::strip_bom;
use crate::runtime::Runtime;

/// Schema version of source content produced by this build. Sources stored
/// with another version are refreshed without their cached ETag.
pub const SCHEMA_VERSION: &str = "3";

pub const PARAMETER_ETAG: &str = "ETag";
pub const PARAMETER_VERSION: &str = "version";

/// One catalog, fetched from the description behind `definition`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Source {
    pub definition: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub parameters: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub definitions: Vec<String>,
    pub mod_definitions: ModDefinitions,
}

impl Source {
    /// Builds a source from a fetched description, filling in what the
    /// releases leave out from the description itself.
    pub fn from_description(definition: &str, description: SourceDescription) -> Self {
        let now = Utc::now();
        let mut source = Source {
            definition: definition.to_string(),
            name: description.name.unwrap_or_default(),
            url: description.url.unwrap_or_default(),
            description: description.description.unwrap_or_default(),
            parameters: description.parameters,
            definitions: description.definitions,
            mod_definitions: ModDefinitions::new(),
        };

        for mut release in description.releases {
            if release.name.is_empty() {
                release.name = source.name.clone();
            }
            if is_blank(&release.url) {
                release.url = non_empty(&source.url).or_else(|| non_empty(definition));
            }
            if is_blank(&release.description) {
                release.description = non_empty(&source.description);
            }
            release.last_updated = Some(now);
            release.source_definition = Some(definition.to_string());

            source.mod_definitions.add(release);
        }

        source
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn set_parameter(&mut self, name: &str, value: impl Into<String>) {
        self.parameters.insert(name.to_string(), value.into());
    }

    pub fn remove_parameter(&mut self, name: &str) {
        self.parameters.remove(name);
    }

    pub fn etag(&self) -> Option<&str> {
        self.parameter(PARAMETER_ETAG)
    }

    pub fn requires_migration(&self) -> bool {
        self.parameter(PARAMETER_VERSION) != Some(SCHEMA_VERSION)
    }

    /// Takes over the content of a freshly loaded copy of this source.
    pub fn update(&mut self, refreshed: Source) {
        self.name = refreshed.name;
        self.url = refreshed.url;
        self.description = refreshed.description;
        self.definitions = refreshed.definitions;
        self.mod_definitions = refreshed.mod_definitions;
        self.parameters = refreshed.parameters;
    }

    pub fn matching(&self, dependency: &ModDependency) -> ModDefinitions {
        self.mod_definitions.matching(dependency)
    }

    pub fn get_mod_definition(&self, name: &str, version: &str) -> Option<&ModDefinition> {
        self.mod_definitions.get(name, version)
    }

    pub fn latest_versions(&self) -> ModDefinitions {
        self.mod_definitions.latest_versions()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.mod_definitions
            .iter()
            .filter_map(|d| d.last_updated)
            .max()
    }
}

/// All registered sources, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sources {
    sources: Vec<Source>,
    #[serde(
        with = "crate::catalog::lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(rename = "snapshotETag", skip_serializing_if = "Option::is_none")]
    pub snapshot_etag: Option<String>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No sources at {:?}", path);
            return Ok(Self::default());
        }
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(strip_bom(&content))
            .with_context(|| format!("Failed to parse sources from {:?}", path))
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
            .with_context(|| format!("Failed to save sources to {:?}", path))
    }

    pub fn add(&mut self, source: Source) {
        self.sources.push(source);
    }

    pub fn contains(&self, definition: &str) -> bool {
        self.sources.iter().any(|s| s.definition == definition)
    }

    pub fn get(&self, index: usize) -> Option<&Source> {
        self.sources.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Source> {
        self.sources.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Source> {
        self.sources.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Source> {
        self.sources.iter_mut()
    }
}

impl<'a> IntoIterator for &'a Sources {
    type Item = &'a Source;
    type IntoIter = std::slice::Iter<'a, Source>;

    fn into_iter(self) -> Self::IntoIter {
        self.sources.iter()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
