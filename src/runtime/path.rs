//! Path utility functions for normalization and containment checks.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
/// This does not access the filesystem and does not follow symlinks.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Keep a leading `..` that cannot be popped so escapes stay visible
                let can_pop = matches!(result.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    result.pop();
                } else {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Check if a path is under a given directory by comparing normalized path components.
///
/// `/mods/lib/../../etc/passwd` is NOT under `/mods`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Express `path` relative to `root`, or `None` if it lies outside of `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = normalize_path(root);
    let path = normalize_path(path);
    if !is_path_under(&path, &root) {
        return None;
    }

    let result = pathdiff::diff_paths(&path, &root)?;
    if result.is_absolute() {
        return None;
    }

    Some(result)
}

/// Render a relative path the way it is stored in an installation ledger:
/// components joined with `/` regardless of platform.
pub fn to_ledger_path(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_removes_dots() {
        assert_eq!(
            normalize_path(Path::new("/mods/./lib/../plugins")),
            PathBuf::from("/mods/plugins")
        );
    }

    #[test]
    fn test_normalize_path_keeps_leading_parent() {
        assert_eq!(
            normalize_path(Path::new("../../evil.txt")),
            PathBuf::from("../../evil.txt")
        );
        assert_eq!(
            normalize_path(Path::new("a/../../evil.txt")),
            PathBuf::from("../evil.txt")
        );
    }

    #[test]
    fn test_normalize_path_relative() {
        assert_eq!(
            normalize_path(Path::new("lib/./shared.dll")),
            PathBuf::from("lib/shared.dll")
        );
    }

    #[test]
    fn test_is_path_under_simple() {
        assert!(is_path_under(
            Path::new("/game/mods/lib/shared.dll"),
            Path::new("/game/mods")
        ));
        assert!(is_path_under(Path::new("/game/mods"), Path::new("/game/mods")));
    }

    #[test]
    fn test_is_path_under_partial_component_match() {
        assert!(!is_path_under(
            Path::new("/game/mods-backup/file.txt"),
            Path::new("/game/mods")
        ));
    }

    #[test]
    fn test_is_path_under_directory_traversal() {
        assert!(!is_path_under(
            Path::new("/game/mods/../../evil.txt"),
            Path::new("/game/mods")
        ));
        assert!(!is_path_under(
            Path::new("/game/mods/lib/../../save.dat"),
            Path::new("/game/mods")
        ));
    }

    #[test]
    fn test_relative_path_inside_root() {
        assert_eq!(
            relative_path(Path::new("/game/mods"), Path::new("/game/mods/lib/a.dll")),
            Some(PathBuf::from("lib/a.dll"))
        );
    }

    #[test]
    fn test_relative_path_outside_root() {
        assert_eq!(
            relative_path(Path::new("/game/mods"), Path::new("/game/mods/../evil.txt")),
            None
        );
        assert_eq!(
            relative_path(Path::new("/game/mods"), Path::new("/etc/passwd")),
            None
        );
    }

    #[test]
    fn test_to_ledger_path_uses_forward_slashes() {
        let path: PathBuf = ["lib", "sub", "shared.dll"].iter().collect();
        assert_eq!(to_ledger_path(&path), "lib/sub/shared.dll");
    }
}
