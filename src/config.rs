use anyhow::Result;
use log::debug;
use std::path::PathBuf;

use crate::http::HttpClient;
use crate::installer::ModInstaller;
use crate::repository::{DEFAULT_API_URL, DEFAULT_RAW_URL, GithubEndpoints};
use crate::runtime::Runtime;

pub const STATE_DIR: &str = "mod-installer";
pub const MODS_DIR: &str = "mods";

/// Locations and credentials of one modpm invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Game directory holding the state and mods directories.
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub mods_dir: PathBuf,
    pub github_api_url: String,
    pub github_raw_url: String,
    pub token: Option<String>,
}

impl Config {
    /// Resolves `root` against the working directory (the working directory
    /// itself when absent) and picks up `GITHUB_TOKEN`.
    pub fn new<R: Runtime>(
        runtime: &R,
        root: Option<PathBuf>,
        api_url: Option<String>,
        raw_url: Option<String>,
    ) -> Result<Self> {
        let current_dir = runtime.current_dir()?;
        let root = match root {
            Some(root) if root.is_absolute() => root,
            Some(root) => current_dir.join(root),
            None => current_dir,
        };

        let token = runtime
            .env_var("GITHUB_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        if let Some(token) = &token {
            debug!("Using GITHUB_TOKEN for authentication: {}", mask(token));
        }

        Ok(Self {
            state_dir: root.join(STATE_DIR),
            mods_dir: root.join(MODS_DIR),
            root,
            github_api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            github_raw_url: raw_url.unwrap_or_else(|| DEFAULT_RAW_URL.to_string()),
            token,
        })
    }

    pub fn endpoints(&self) -> GithubEndpoints {
        GithubEndpoints {
            api_url: self.github_api_url.clone(),
            raw_url: self.github_raw_url.clone(),
        }
    }

    pub fn http_client(&self) -> Result<HttpClient> {
        HttpClient::with_token(self.token.as_deref())
    }

    /// An installer over the network transport. Call
    /// [`ModInstaller::initialize`] before use.
    pub fn installer<R: Runtime>(&self, runtime: R) -> Result<ModInstaller<R, HttpClient>> {
        Ok(ModInstaller::new(
            runtime,
            self.http_client()?,
            self.state_dir.clone(),
            self.mods_dir.clone(),
            self.endpoints(),
        ))
    }
}

fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*********".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
