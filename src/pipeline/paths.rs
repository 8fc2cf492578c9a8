use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolve a configured directory against the project root.
///
/// Absolute paths are returned unchanged.
pub(crate) fn resolve_root_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Absolute form of `path` suitable for ancestry checks.
///
/// Existing paths are canonicalized so symlinks can't hide an overlap. Paths
/// that don't exist yet are made absolute and normalized lexically.
pub(crate) fn comparable_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving current directory")?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
