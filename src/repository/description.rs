use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::catalog::{Asset, ModDefinition};

/// The JSON document a source locator points to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceDescription {
    pub name: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub releases: Vec<ModDefinition>,
    pub definitions: Vec<String>,
    pub parameters: BTreeMap<String, String>,
}

impl SourceDescription {
    /// Releases without an author are attributed to the description's author.
    pub fn fill_authors(&mut self) {
        let Some(author) = self.author.as_ref() else {
            return;
        };
        for release in &mut self.releases {
            if release.author.is_none() {
                release.author = Some(author.clone());
            }
        }
    }

    /// Whether any release lacks details a GitHub release can supply.
    pub fn needs_release_details(&self) -> bool {
        self.releases.iter().any(|release| {
            is_blank(&release.url) || is_blank(&release.changes) || release.assets.is_empty()
        })
    }

    /// Completes releases from the GitHub release named like their version.
    ///
    /// Releases without a GitHub counterpart link to the tag page of the
    /// repository at `definition`.
    pub fn fill_from_github(&mut self, definition: &str, github_releases: &[GithubRelease]) {
        for release in &mut self.releases {
            let github_release = github_releases
                .iter()
                .find(|r| r.name.as_deref() == Some(release.version()));

            if is_blank(&release.url) {
                release.url = Some(
                    github_release
                        .and_then(|r| r.html_url.clone())
                        .unwrap_or_else(|| {
                            format!("{}/releases/tag/{}", definition, release.version())
                        }),
                );
            }

            if is_blank(&release.changes) {
                release.changes = Some(
                    github_release
                        .and_then(|r| r.body.clone())
                        .unwrap_or_default(),
                );
            }

            if release.release_date.is_none() {
                release.release_date = github_release.and_then(|r| r.published_at);
            }

            if release.assets.is_empty()
                && let Some(github_release) = github_release
            {
                release.assets = github_release
                    .assets
                    .iter()
                    .map(|asset| Asset::new(asset.browser_download_url.clone()))
                    .collect();
            }
        }
    }
}

/// Entry of the GitHub releases API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GithubRelease {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GithubAsset {
    #[serde(default)]
    pub name: String,
    pub browser_download_url: String,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}
