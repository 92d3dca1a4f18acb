use anyhow::{Context, Result};
use log::debug;

use super::description::{GithubRelease, SourceDescription};
use super::locator::{GithubEndpoints, SourceLocator};
use super::source::{PARAMETER_ETAG, PARAMETER_VERSION, SCHEMA_VERSION, Source};
use crate::http::{Transport, strip_bom};
use crate::runtime::Runtime;

/// Outcome of loading a source description.
#[derive(Debug)]
pub enum Loaded {
    /// The server reported the cached content as current.
    Unmodified,
    Source(Source),
}

/// Fetches and post-processes source descriptions.
pub struct SourceLoader<'a, R: Runtime, T: Transport + ?Sized> {
    runtime: &'a R,
    transport: &'a T,
    endpoints: &'a GithubEndpoints,
}

impl<'a, R: Runtime, T: Transport + ?Sized> SourceLoader<'a, R, T> {
    pub fn new(runtime: &'a R, transport: &'a T, endpoints: &'a GithubEndpoints) -> Self {
        Self {
            runtime,
            transport,
            endpoints,
        }
    }

    /// Loads the source behind `definition`. With an `etag` the server may
    /// answer [`Loaded::Unmodified`].
    #[tracing::instrument(skip(self))]
    pub async fn load(&self, definition: &str, etag: Option<String>) -> Result<Loaded> {
        let locator = SourceLocator::parse(definition)?;

        let (mut description, response_etag) = match locator.description_url(self.endpoints) {
            Some(url) => {
                let response = self.transport.fetch(&url, etag).await?;
                if response.is_not_modified() {
                    debug!("{} is unmodified", definition);
                    return Ok(Loaded::Unmodified);
                }
                (parse_description(&response.body, &url)?, response.etag)
            }
            None => (self.read_description(&locator, definition)?, None),
        };

        match &locator {
            SourceLocator::GitRepo { .. } => {
                if description.needs_release_details() && !description.releases.is_empty() {
                    let releases = self.github_releases(&locator).await?;
                    description.fill_from_github(definition, &releases);
                }
            }
            SourceLocator::DirectUrl(_) => description.fill_authors(),
            SourceLocator::File(_) => {}
        }

        if let Some(etag) = response_etag {
            description.parameters.insert(PARAMETER_ETAG.to_string(), etag);
        }
        description
            .parameters
            .insert(PARAMETER_VERSION.to_string(), SCHEMA_VERSION.to_string());

        Ok(Loaded::Source(Source::from_description(definition, description)))
    }

    fn read_description(
        &self,
        locator: &SourceLocator,
        definition: &str,
    ) -> Result<SourceDescription> {
        let SourceLocator::File(path) = locator else {
            anyhow::bail!("No description location for {}", definition);
        };
        let content = self
            .runtime
            .read_to_string(path)
            .with_context(|| format!("Could not read source description {:?}", path))?;
        parse_description(&content, definition)
    }

    async fn github_releases(&self, locator: &SourceLocator) -> Result<Vec<GithubRelease>> {
        let Some(url) = locator.releases_url(self.endpoints) else {
            return Ok(Vec::new());
        };
        let response = self.transport.fetch(&url, None).await?;
        serde_json::from_str(&response.body)
            .with_context(|| format!("Could not parse GitHub releases from {}", url))
    }
}

fn parse_description(content: &str, origin: &str) -> Result<SourceDescription> {
    serde_json::from_str(strip_bom(content))
        .with_context(|| format!("Could not deserialize source description from {}", origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ModInstallerError, as_installer_error};
    use crate::http::{FetchResponse, MockTransport};
    use crate::runtime::MockRuntime;
    use chrono::Utc;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    const RAW_URL: &str =
        "https://raw.githubusercontent.com/owner/bags/master/mod-installer-description.json";
    const RELEASES_URL: &str = "https://api.github.com/repos/owner/bags/releases";

    fn ok(body: &str, etag: Option<&str>) -> FetchResponse {
        FetchResponse {
            status: 200,
            body: body.to_string(),
            etag: etag.map(str::to_string),
        }
    }

    fn unwrap_source(loaded: Loaded) -> Source {
        match loaded {
            Loaded::Source(source) => source,
            Loaded::Unmodified => panic!("Expected a source"),
        }
    }

    #[tokio::test]
    async fn test_load_github_source_with_release_details() {
        let runtime = MockRuntime::new();
        let mut transport = MockTransport::new();
        transport
            .expect_fetch()
            .with(eq(RAW_URL), eq(None::<String>))
            .times(1)
            .returning(|_, _| {
                Ok(ok(
                    r#"{"name": "Bags", "releases": [{"version": "1.0"}]}"#,
                    Some("\"e1\""),
                ))
            });
        transport
            .expect_fetch()
            .with(eq(RELEASES_URL), eq(None::<String>))
            .times(1)
            .returning(|_, _| {
                Ok(ok(
                    r#"[{"name": "1.0", "html_url": "https://github.com/owner/bags/releases/tag/1.0", "body": "First",
                        "assets": [{"name": "Bags.dll", "browser_download_url": "https://github.com/owner/bags/releases/download/1.0/Bags.dll"}]}]"#,
                    None,
                ))
            });
        let endpoints = GithubEndpoints::default();
        let loader = SourceLoader::new(&runtime, &transport, &endpoints);

        let source = unwrap_source(
            loader
                .load("https://github.com/owner/bags", None)
                .await
                .unwrap(),
        );

        assert_eq!(source.name, "Bags");
        assert_eq!(source.etag(), Some("\"e1\""));
        assert!(!source.requires_migration());
        let release = source.get_mod_definition("Bags", "1.0").unwrap();
        assert_eq!(release.changes.as_deref(), Some("First"));
        assert_eq!(release.assets.len(), 1);
        assert_eq!(
            release.source_definition.as_deref(),
            Some("https://github.com/owner/bags")
        );
    }

    #[tokio::test]
    async fn test_load_github_source_skips_api_when_complete() {
        let runtime = MockRuntime::new();
        let mut transport = MockTransport::new();
        transport.expect_fetch().times(1).returning(|_, _| {
            Ok(ok(
                r#"{"name": "Bags", "releases": [{"version": "1.0", "url": "u", "changes": "c", "assets": [{"url": "https://example.com/Bags.dll"}]}]}"#,
                None,
            ))
        });
        let endpoints = GithubEndpoints::default();
        let loader = SourceLoader::new(&runtime, &transport, &endpoints);

        let source = unwrap_source(
            loader
                .load("https://github.com/owner/bags", None)
                .await
                .unwrap(),
        );
        assert_eq!(source.mod_definitions.len(), 1);
    }

    #[tokio::test]
    async fn test_load_unmodified() {
        let runtime = MockRuntime::new();
        let mut transport = MockTransport::new();
        transport
            .expect_fetch()
            .with(eq("https://example.com/mods.json"), eq(Some("\"e1\"".to_string())))
            .returning(|_, etag| {
                Ok(FetchResponse {
                    status: 304,
                    body: String::new(),
                    etag,
                })
            });
        let endpoints = GithubEndpoints::default();
        let loader = SourceLoader::new(&runtime, &transport, &endpoints);

        let loaded = loader
            .load("https://example.com/mods.json", Some("\"e1\"".to_string()))
            .await
            .unwrap();
        assert!(matches!(loaded, Loaded::Unmodified));
    }

    #[tokio::test]
    async fn test_load_direct_url_fills_authors() {
        let runtime = MockRuntime::new();
        let mut transport = MockTransport::new();
        transport.expect_fetch().returning(|_, _| {
            Ok(ok(
                r#"{"name": "Pack", "author": "someone", "definitions": ["https://github.com/owner/bags"],
                    "releases": [{"version": "2.0"}]}"#,
                None,
            ))
        });
        let endpoints = GithubEndpoints::default();
        let loader = SourceLoader::new(&runtime, &transport, &endpoints);

        let source = unwrap_source(
            loader
                .load("https://example.com/mods.json", None)
                .await
                .unwrap(),
        );

        assert_eq!(source.definitions, vec!["https://github.com/owner/bags"]);
        let release = source.get_mod_definition("Pack", "2.0").unwrap();
        assert_eq!(release.author.as_deref(), Some("someone"));
        assert_eq!(release.url.as_deref(), Some("https://example.com/mods.json"));
        assert_eq!(source.etag(), None);
    }

    #[tokio::test]
    async fn test_load_file_source() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from("/data/description.json")))
            .returning(|_| {
                Ok("\u{feff}{\"name\": \"Local\", \"releases\": [{\"version\": \"0.1\"}]}".to_string())
            });
        let transport = MockTransport::new();
        let endpoints = GithubEndpoints::default();
        let loader = SourceLoader::new(&runtime, &transport, &endpoints);

        let source = unwrap_source(loader.load("/data/description.json", None).await.unwrap());

        assert_eq!(source.name, "Local");
        assert!(source.get_mod_definition("Local", "0.1").is_some());
    }

    #[tokio::test]
    async fn test_load_invalid_description() {
        let runtime = MockRuntime::new();
        let mut transport = MockTransport::new();
        transport
            .expect_fetch()
            .returning(|_, _| Ok(ok("<html>not json</html>", None)));
        let endpoints = GithubEndpoints::default();
        let loader = SourceLoader::new(&runtime, &transport, &endpoints);

        let err = loader
            .load("https://example.com/mods.json", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Could not deserialize source description"));
    }

    #[tokio::test]
    async fn test_load_propagates_rate_limit() {
        let runtime = MockRuntime::new();
        let mut transport = MockTransport::new();
        let reset = Utc::now();
        transport.expect_fetch().returning(move |_, _| {
            Err(ModInstallerError::RateLimited { reset }.into())
        });
        let endpoints = GithubEndpoints::default();
        let loader = SourceLoader::new(&runtime, &transport, &endpoints);

        let err = loader
            .load("https://github.com/owner/bags", None)
            .await
            .unwrap_err();
        assert_eq!(
            as_installer_error(&err),
            Some(&ModInstallerError::RateLimited { reset })
        );
    }
}
