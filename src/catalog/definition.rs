use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ModDependency;
use crate::error::ModInstallerError;
use crate::version::Version;

/// One downloadable artifact of a mod release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub url: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_directory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip_directory: Option<String>,
}

impl Asset {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Whether the asset is unpacked as a zip archive instead of copied.
    ///
    /// An explicit `type` decides; without one the URL suffix does.
    pub fn is_zip(&self) -> bool {
        match self.kind.as_deref() {
            None | Some("") => self.url.to_lowercase().ends_with(".zip"),
            Some(kind) => kind.eq_ignore_ascii_case("zip"),
        }
    }

    /// The file name of the asset in the local cache: the last URL segment
    /// without query string or trailing slash.
    pub fn file_name(&self) -> String {
        let without_query = self.url.split(['?', '#']).next().unwrap_or_default();
        let trimmed = without_query.trim_end_matches('/');
        trimmed
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("asset")
            .to_string()
    }
}

/// One published version of a mod.
///
/// Identity is `(name, parsed version)`; the version string is parsed
/// when the definition is built or deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ModDefinitionRecord", into = "ModDefinitionRecord")]
pub struct ModDefinition {
    pub name: String,
    version: String,
    parsed_version: Version,
    pub author: Option<String>,
    pub description: Option<String>,
    pub changes: Option<String>,
    pub release_date: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    pub source_definition: Option<String>,
    pub url: Option<String>,
    pub assets: Vec<Asset>,
    pub dependencies: Vec<ModDependency>,
}

/// Serialized form of a [`ModDefinition`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModDefinitionRecord {
    #[serde(default)]
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<String>,
    #[serde(default, with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(default, with = "lenient_date", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Asset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ModDependency>,
}

impl TryFrom<ModDefinitionRecord> for ModDefinition {
    type Error = ModInstallerError;

    fn try_from(record: ModDefinitionRecord) -> Result<Self, Self::Error> {
        let parsed_version = Version::parse(&record.version)?;
        Ok(Self {
            name: record.name,
            version: record.version,
            parsed_version,
            author: record.author,
            description: record.description,
            changes: record.changes,
            release_date: record.release_date,
            last_updated: record.last_updated,
            source_definition: record.source_definition,
            url: record.url,
            assets: record.assets,
            dependencies: record.dependencies,
        })
    }
}

impl From<ModDefinition> for ModDefinitionRecord {
    fn from(definition: ModDefinition) -> Self {
        Self {
            name: definition.name,
            version: definition.version,
            author: definition.author,
            description: definition.description,
            changes: definition.changes,
            release_date: definition.release_date,
            last_updated: definition.last_updated,
            source_definition: definition.source_definition,
            url: definition.url,
            assets: definition.assets,
            dependencies: definition.dependencies,
        }
    }
}

impl ModDefinition {
    pub fn new(name: impl Into<String>, version: &str) -> Result<Self, ModInstallerError> {
        ModDefinitionRecord {
            name: name.into(),
            version: version.to_string(),
            ..Default::default()
        }
        .try_into()
    }

    pub fn with_dependency(mut self, name: &str, requirement: &str) -> Self {
        self.dependencies.push(ModDependency::new(name, requirement));
        self
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.push(asset);
        self
    }

    /// The version string as published.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn parsed_version(&self) -> &Version {
        &self.parsed_version
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.name, self.version)
    }

    pub fn depends_on(&self, mod_name: &str) -> bool {
        self.dependencies.iter().any(|d| d.name == mod_name)
    }

    pub fn satisfies(&self, dependency: &ModDependency) -> bool {
        self.name == dependency.name && dependency.is_satisfied_by(&self.parsed_version)
    }
}

impl PartialEq for ModDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.parsed_version == other.parsed_version
    }
}

impl Eq for ModDefinition {}

impl std::hash::Hash for ModDefinition {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.parsed_version.hash(state);
    }
}

impl fmt::Display for ModDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Dates in catalogs come as RFC 3339, as `2018-05-01T12:00:00.000+0000`, or
/// as a plain `2018-05-01`.
pub(crate) mod lenient_date {
    use chrono::{DateTime, NaiveDate, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&date.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => parse(raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{}'", raw))),
        }
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
            return Some(date.with_timezone(&Utc));
        }
        if let Ok(date) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
            return Some(date.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|date| date.and_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_uses_parsed_version() {
        let a = ModDefinition::new("A", "1.0").unwrap();
        let b = ModDefinition::new("A", "v1.0.0").unwrap();
        let c = ModDefinition::new("B", "1.0").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(b.version(), "v1.0.0");
    }

    #[test]
    fn test_new_rejects_invalid_version() {
        assert!(matches!(
            ModDefinition::new("A", "next"),
            Err(ModInstallerError::InvalidVersionFormat(_))
        ));
    }

    #[test]
    fn test_satisfies_checks_name_and_requirement() {
        let definition = ModDefinition::new("C", "1.2.0").unwrap();
        assert!(definition.satisfies(&ModDependency::new("C", "^1.0.0")));
        assert!(!definition.satisfies(&ModDependency::new("C", "1.0.0")));
        assert!(!definition.satisfies(&ModDependency::new("D", "^1.0.0")));
    }

    #[test]
    fn test_depends_on() {
        let definition = ModDefinition::new("A", "1.2.0")
            .unwrap()
            .with_dependency("C", "1.0.0");
        assert!(definition.depends_on("C"));
        assert!(!definition.depends_on("B"));
    }

    #[test]
    fn test_deserialize_camel_case_and_ignore_unknown() {
        let json = r#"{
            "name": "A",
            "version": "1.2.0",
            "releaseDate": "2018-05-01T12:00:00.000+0000",
            "lastUpdated": "2019-01-02T03:04:05Z",
            "sourceDefinition": "https://github.com/owner/repo",
            "assets": [{"url": "https://example.com/a.zip", "type": "zip", "zipDirectory": "mods"}],
            "dependencies": [{"name": "C", "version": "^1.0.0"}],
            "somethingNew": 42
        }"#;

        let definition: ModDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.name, "A");
        assert_eq!(definition.parsed_version(), &Version::new(1, 2, 0));
        assert_eq!(definition.assets[0].zip_directory.as_deref(), Some("mods"));
        assert_eq!(definition.dependencies[0], ModDependency::new("C", "^1.0.0"));
        assert!(definition.release_date.is_some());
        assert!(definition.last_updated.is_some());
    }

    #[test]
    fn test_deserialize_invalid_version_fails() {
        let result: Result<ModDefinition, _> =
            serde_json::from_str(r#"{"name": "A", "version": "one"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_omits_absent_fields() {
        let definition = ModDefinition::new("A", "1.0.0").unwrap();
        let json = serde_json::to_string(&definition).unwrap();
        assert_eq!(json, r#"{"name":"A","version":"1.0.0"}"#);
    }

    #[test]
    fn test_asset_is_zip() {
        assert!(Asset::new("https://example.com/mod.zip").is_zip());
        assert!(Asset::new("https://example.com/MOD.ZIP").is_zip());
        assert!(!Asset::new("https://example.com/mod.dll").is_zip());

        let typed = Asset {
            kind: Some("zip".to_string()),
            ..Asset::new("https://example.com/download?id=4")
        };
        assert!(typed.is_zip());

        let forced_file = Asset {
            kind: Some("file".to_string()),
            ..Asset::new("https://example.com/mod.zip")
        };
        assert!(!forced_file.is_zip());
    }

    #[test]
    fn test_asset_file_name() {
        assert_eq!(Asset::new("https://example.com/files/mod.dll").file_name(), "mod.dll");
        assert_eq!(
            Asset::new("https://example.com/files/mod.zip?raw=true").file_name(),
            "mod.zip"
        );
        assert_eq!(Asset::new("https://example.com/files/latest/").file_name(), "latest");
    }

    #[test]
    fn test_lenient_date_formats() {
        assert!(lenient_date::parse("2018-05-01").is_some());
        assert!(lenient_date::parse("2018-05-01T12:00:00+02:00").is_some());
        assert!(lenient_date::parse("yesterday").is_none());
    }
}
