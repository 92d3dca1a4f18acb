//! Command line operations on top of [`ModInstaller`].

use anyhow::{Result, anyhow};
use log::warn;
use std::str::FromStr;
use std::sync::Arc;

use crate::catalog::ModDefinition;
use crate::config::Config;
use crate::http::{HttpClient, Transport};
use crate::installer::ModInstaller;
use crate::progress::ProgressListener;
use crate::runtime::Runtime;

mod install;
mod list;
mod plan;
mod search;
mod sources;

pub use install::{install, uninstall};
pub use list::list;
pub use plan::plan;
pub use search::search;
pub use sources::{add_source, refresh};

/// `NAME` or `NAME@VERSION` on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModSpec {
    pub name: String,
    pub version: Option<String>,
}

impl FromStr for ModSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, version) = match s.split_once('@') {
            Some((name, version)) => (name.trim(), Some(version.trim())),
            None => (s.trim(), None),
        };
        if name.is_empty() {
            return Err(anyhow!("Invalid mod '{}', expected NAME or NAME@VERSION", s));
        }
        if version.is_some_and(str::is_empty) {
            return Err(anyhow!("Missing version in '{}'", s));
        }

        Ok(ModSpec {
            name: name.to_string(),
            version: version.map(str::to_string),
        })
    }
}

/// Creates the installer described by `config`, prints its progress to
/// `progress` and loads the saved state.
pub fn open<R: Runtime>(
    runtime: R,
    config: &Config,
    progress: Arc<dyn ProgressListener>,
) -> Result<ModInstaller<R, HttpClient>> {
    let mut installer = config.installer(runtime)?;
    installer.subscribe_progress(progress);
    installer.initialize()?;

    if installer.is_source_migration_required() {
        warn!("Sources were saved by an older version, run `modpm refresh --force`");
    } else if !installer.sources().is_empty() && installer.are_sources_old() {
        warn!("Sources are older than 30 days, run `modpm refresh`");
    }
    Ok(installer)
}

/// The definition `spec` names; the newest version when none is given.
pub fn find_definition<R: Runtime, T: Transport>(
    installer: &ModInstaller<R, T>,
    spec: &ModSpec,
) -> Result<ModDefinition> {
    let found = match &spec.version {
        Some(version) => installer.get_mod_definition(&spec.name, version).cloned(),
        None => installer.get_mod_definitions(&spec.name).first().cloned(),
    };

    found.ok_or_else(|| match &spec.version {
        Some(version) => anyhow!("{} {} is not available from any source", spec.name, version),
        None => anyhow!("{} is not available from any source", spec.name),
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use std::fs;
    use std::path::Path;

    use crate::http::MockTransport;
    use crate::installer::ModInstaller;
    use crate::repository::GithubEndpoints;
    use crate::runtime::RealRuntime;

    pub const CATALOG: &str = r#"{
        "name": "Valheim Mods",
        "author": "modder",
        "releases": [
            {"name": "Bags", "version": "1.0", "description": "More room", "assets": [{"url": "https://example.com/1.0/Bags.dll"}]},
            {"name": "Bags", "version": "1.1", "description": "More room", "dependencies": [{"name": "Core", "version": "^2.0"}], "assets": [{"url": "https://example.com/1.1/Bags.dll"}]},
            {"name": "Core", "version": "2.0", "assets": [{"url": "https://example.com/Core.dll"}]},
            {"name": "Orphan", "version": "0.1", "dependencies": [{"name": "Ghost", "version": "1.0"}]}
        ]
    }"#;

    /// An initialized installer below `dir` knowing [`CATALOG`]. Every
    /// download returns the asset's file name as content.
    pub async fn installer(dir: &Path) -> ModInstaller<RealRuntime, MockTransport> {
        let description = dir.join("catalog.json");
        fs::write(&description, CATALOG).unwrap();

        let mut transport = MockTransport::new();
        transport.expect_download().returning(|url, _| {
            Ok(url.rsplit('/').next().unwrap_or_default().as_bytes().to_vec())
        });

        let mut installer = ModInstaller::new(
            RealRuntime,
            transport,
            dir.join("mod-installer"),
            dir.join("mods"),
            GithubEndpoints::default(),
        );
        installer.initialize().unwrap();
        installer
            .register_source(&description.to_string_lossy())
            .await
            .unwrap();
        installer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mod_spec() {
        assert_eq!(
            "Bags".parse::<ModSpec>().unwrap(),
            ModSpec {
                name: "Bags".to_string(),
                version: None
            }
        );
        assert_eq!(
            "Bags@1.0".parse::<ModSpec>().unwrap(),
            ModSpec {
                name: "Bags".to_string(),
                version: Some("1.0".to_string())
            }
        );
        assert!("@1.0".parse::<ModSpec>().is_err());
        assert!("Bags@".parse::<ModSpec>().is_err());
    }

    #[tokio::test]
    async fn test_find_definition() {
        let dir = tempfile::tempdir().unwrap();
        let installer = testing::installer(dir.path()).await;

        let latest = find_definition(&installer, &"Bags".parse().unwrap()).unwrap();
        assert_eq!(latest.display_name(), "Bags 1.1");

        let exact = find_definition(&installer, &"Bags@1.0".parse().unwrap()).unwrap();
        assert_eq!(exact.display_name(), "Bags 1.0");

        let err = find_definition(&installer, &"Bags@3.0".parse().unwrap()).unwrap_err();
        assert_eq!(err.to_string(), "Bags 3.0 is not available from any source");
        assert!(find_definition(&installer, &"Nope".parse().unwrap()).is_err());
    }
}
