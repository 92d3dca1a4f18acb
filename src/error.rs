//! Domain failures of the mod installer.
//!
//! These are carried inside `anyhow::Error` and recovered by callers with
//! `downcast_ref::<ModInstallerError>()` when they need to react to a
//! specific condition (e.g. showing the rate limit reset time).

use chrono::{DateTime, Local, Utc};

use crate::catalog::ModDependencies;

#[derive(Debug, Clone, PartialEq)]
pub enum ModInstallerError {
    /// A version string did not match the version grammar.
    InvalidVersionFormat(String),
    /// No catalog entry satisfies any of the requirements.
    MissingDependency(ModDependencies),
    /// Requirements exist, but no single version satisfies all of them.
    UnresolvableDependency(ModDependencies),
    /// The remote API refused further requests until `reset`.
    RateLimited { reset: DateTime<Utc> },
    /// The host of the given URL could not be reached.
    HostUnreachable(String),
    /// A file system operation failed.
    Filesystem(String),
    /// No source locator recognizes the given definition.
    UnsupportedSource(String),
    /// The named mod has no installation.
    NotInstalled(String),
}

impl std::fmt::Display for ModInstallerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModInstallerError::InvalidVersionFormat(version) => {
                write!(f, "Invalid version format: '{}'", version)
            }
            ModInstallerError::MissingDependency(dependencies) => {
                write!(f, "Missing dependencies: {}", dependencies)
            }
            ModInstallerError::UnresolvableDependency(dependencies) => {
                write!(f, "Unresolvable dependencies: {}", dependencies)
            }
            ModInstallerError::RateLimited { reset } => {
                write!(
                    f,
                    "Rate limit exceeded. Try again after {}.",
                    reset.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                )
            }
            ModInstallerError::HostUnreachable(host) => {
                write!(f, "Unknown host {}. Are you offline?", host)
            }
            ModInstallerError::Filesystem(msg) => write!(f, "File system error: {}", msg),
            ModInstallerError::UnsupportedSource(definition) => {
                write!(f, "Unsupported source definition: {}", definition)
            }
            ModInstallerError::NotInstalled(name) => write!(f, "{} is not installed", name),
        }
    }
}

impl std::error::Error for ModInstallerError {}

/// Returns the domain error carried by `error`, if any.
pub fn as_installer_error(error: &anyhow::Error) -> Option<&ModInstallerError> {
    error.downcast_ref::<ModInstallerError>()
}
