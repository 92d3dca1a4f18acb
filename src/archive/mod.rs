//! Placement of archive entries below the mods directory.

mod zip;

use std::path::{Component, Path, PathBuf};

use crate::runtime::path::to_ledger_path;
use crate::runtime::{normalize_path, relative_path};

pub use zip::ZipExtractor;

/// Where the entries of an archive are written.
#[derive(Debug, Clone, Copy)]
pub struct Destination<'a> {
    /// Ledger paths are relative to this directory; nothing is written
    /// outside of it.
    pub root: &'a Path,
    /// Directory the entries are extracted into.
    pub directory: &'a Path,
    /// Only entries below this archive directory are extracted, relative
    /// to it.
    pub zip_directory: Option<&'a str>,
}

/// What to do with one archive entry.
#[derive(Debug, PartialEq, Eq)]
pub enum EntryTarget {
    /// Outside of the selected zip directory, or the directory itself.
    Skip,
    /// Absolute or escaping; reported and ignored.
    Invalid,
    /// Path relative to the destination directory.
    Path(PathBuf),
}

/// Maps an entry name to its place in the destination directory.
pub fn entry_target(entry_name: &str, zip_directory: Option<&str>) -> EntryTarget {
    let raw = Path::new(entry_name);
    if entry_name.starts_with(['/', '\\']) || raw.has_root() || raw.is_absolute() {
        return EntryTarget::Invalid;
    }

    let zip_directory = zip_directory
        .map(|d| d.trim_matches('/'))
        .filter(|d| !d.is_empty());
    let relative = match zip_directory {
        None => normalize_path(raw),
        Some(directory) => match raw.strip_prefix(directory) {
            Ok(rest) => normalize_path(rest),
            Err(_) => return EntryTarget::Skip,
        },
    };

    if relative.as_os_str().is_empty() {
        return EntryTarget::Skip;
    }
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return EntryTarget::Invalid;
    }

    EntryTarget::Path(relative)
}

/// The ledger form of `target` relative to `root`, or `None` when it lies
/// outside of `root`.
pub fn ledger_path(root: &Path, target: &Path) -> Option<String> {
    relative_path(root, target)
        .map(|relative| to_ledger_path(&relative))
        .filter(|ledger| !ledger.is_empty())
}

pub fn invalid_entry_warning(entry_name: &str) -> String {
    format!("WARNING: Entry '{}' is invalid and will be ignored!", entry_name)
}
