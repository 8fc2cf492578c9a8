//! Path helpers shared by discovery, artifact naming, and the overlay.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// List every regular file under `root`, recursing into all subdirectories.
///
/// Entries are sorted by file name within each directory, so the result is
/// stable across runs and doubles as the addon discovery order. Symlinks are
/// followed; a symlink loop surfaces as an error from the walker.
pub fn list_files_recursively(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry.with_context(|| format!("listing '{}'", root.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Swap the `from` suffix of `name` for `to`.
///
/// Names that don't end with `from` pass through unchanged.
pub fn replace_extension(name: &str, from: &str, to: &str) -> String {
    match name.strip_suffix(from) {
        Some(stem) => format!("{stem}{to}"),
        None => name.to_string(),
    }
}

/// Render a relative path with `/` separators.
///
/// Artifact locations end up in JSON, so they must not depend on the host's
/// separator. Fails on non-UTF-8 components and on anything that is not a
/// plain relative component.
pub fn to_slash_path(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part.to_str().with_context(|| {
                    format!("path '{}' is not valid UTF-8", relative.display())
                })?;
                parts.push(part);
            }
            Component::CurDir => {}
            _ => anyhow::bail!(
                "path '{}' must be relative without '..' or root components",
                relative.display()
            ),
        }
    }
    Ok(parts.join("/"))
}
