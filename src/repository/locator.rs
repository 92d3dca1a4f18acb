use regex::Regex;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::error::ModInstallerError;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_RAW_URL: &str = "https://raw.githubusercontent.com";

/// Name of the description file at the root of a GitHub repository.
pub const DESCRIPTION_FILE: &str = "mod-installer-description.json";

static GITHUB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^https://github\.com/([A-Z0-9_.-]+)/([A-Z0-9_.-]+?)/?$")
        .expect("GitHub source pattern is valid")
});

/// Base URLs used for GitHub repository sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubEndpoints {
    pub api_url: String,
    pub raw_url: String,
}

impl Default for GithubEndpoints {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            raw_url: DEFAULT_RAW_URL.to_string(),
        }
    }
}

/// Where a source description lives, derived from its definition string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocator {
    /// `https://github.com/<owner>/<repo>`
    GitRepo { owner: String, repo: String },
    /// Any other `http://` or `https://` URL pointing at a description.
    DirectUrl(String),
    /// A description file on the local filesystem.
    File(PathBuf),
}

impl SourceLocator {
    /// Picks the first kind of locator that accepts `definition`.
    pub fn parse(definition: &str) -> Result<Self, ModInstallerError> {
        let definition = definition.trim();
        if definition.is_empty() {
            return Err(ModInstallerError::UnsupportedSource(definition.to_string()));
        }

        if let Some(captures) = GITHUB_PATTERN.captures(definition) {
            return Ok(SourceLocator::GitRepo {
                owner: captures[1].to_string(),
                repo: captures[2].to_string(),
            });
        }

        if definition.starts_with("http://") || definition.starts_with("https://") {
            return Ok(SourceLocator::DirectUrl(definition.to_string()));
        }

        Ok(SourceLocator::File(PathBuf::from(definition)))
    }

    /// URL of the description document, `None` for local files.
    pub fn description_url(&self, endpoints: &GithubEndpoints) -> Option<String> {
        match self {
            SourceLocator::GitRepo { owner, repo } => Some(format!(
                "{}/{}/{}/master/{}",
                endpoints.raw_url.trim_end_matches('/'),
                owner,
                repo,
                DESCRIPTION_FILE
            )),
            SourceLocator::DirectUrl(url) => Some(url.clone()),
            SourceLocator::File(_) => None,
        }
    }

    /// URL of the GitHub releases API for repository sources.
    pub fn releases_url(&self, endpoints: &GithubEndpoints) -> Option<String> {
        match self {
            SourceLocator::GitRepo { owner, repo } => Some(format!(
                "{}/repos/{}/{}/releases",
                endpoints.api_url.trim_end_matches('/'),
                owner,
                repo
            )),
            _ => None,
        }
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocator::GitRepo { owner, repo } => {
                write!(f, "https://github.com/{}/{}", owner, repo)
            }
            SourceLocator::DirectUrl(url) => write!(f, "{}", url),
            SourceLocator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_github_repository() {
        let locator = SourceLocator::parse("https://github.com/Owner-1/My-Mod").unwrap();
        assert_eq!(
            locator,
            SourceLocator::GitRepo {
                owner: "Owner-1".to_string(),
                repo: "My-Mod".to_string()
            }
        );

        let locator = SourceLocator::parse("HTTPS://GITHUB.COM/owner/repo/").unwrap();
        assert!(matches!(locator, SourceLocator::GitRepo { ref repo, .. } if repo == "repo"));
    }

    #[test]
    fn test_parse_github_deeper_path_is_direct_url() {
        let locator =
            SourceLocator::parse("https://github.com/owner/repo/raw/master/list.json").unwrap();
        assert!(matches!(locator, SourceLocator::DirectUrl(_)));
    }

    #[test]
    fn test_parse_direct_url() {
        let locator = SourceLocator::parse("http://example.com/mods.json").unwrap();
        assert_eq!(
            locator,
            SourceLocator::DirectUrl("http://example.com/mods.json".to_string())
        );
    }

    #[test]
    fn test_parse_file() {
        let locator = SourceLocator::parse("/data/description.json").unwrap();
        assert_eq!(
            locator,
            SourceLocator::File(PathBuf::from("/data/description.json"))
        );
    }

    #[test]
    fn test_parse_empty_is_unsupported() {
        assert!(matches!(
            SourceLocator::parse("  "),
            Err(ModInstallerError::UnsupportedSource(_))
        ));
    }

    #[test]
    fn test_urls() {
        let endpoints = GithubEndpoints {
            api_url: "http://localhost:1234/".to_string(),
            raw_url: "http://localhost:1234/raw".to_string(),
        };
        let locator = SourceLocator::parse("https://github.com/owner/repo").unwrap();

        assert_eq!(
            locator.description_url(&endpoints).as_deref(),
            Some("http://localhost:1234/raw/owner/repo/master/mod-installer-description.json")
        );
        assert_eq!(
            locator.releases_url(&endpoints).as_deref(),
            Some("http://localhost:1234/repos/owner/repo/releases")
        );

        let file = SourceLocator::parse("description.json").unwrap();
        assert_eq!(file.description_url(&endpoints), None);
        assert_eq!(file.releases_url(&endpoints), None);
    }

    #[test]
    fn test_default_endpoints() {
        let locator = SourceLocator::parse("https://github.com/owner/repo").unwrap();
        assert_eq!(
            locator
                .description_url(&GithubEndpoints::default())
                .as_deref(),
            Some("https://raw.githubusercontent.com/owner/repo/master/mod-installer-description.json")
        );
    }
}
