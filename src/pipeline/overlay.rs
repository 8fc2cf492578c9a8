//! Static-file overlay onto the output root.
//!
//! Addon artifacts and static files share one output root, so neither side may
//! silently replace the other. A static file whose destination already exists
//! is skipped and reported; everything else is copied.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of [`overlay_static_files`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayReport {
    /// Files (and symlinks) written to the output.
    pub copied: usize,
    /// Destinations that already existed, in walk order.
    pub collisions: Vec<PathBuf>,
}

/// Copy the tree under `static_dir` onto `out_dir`, preserving structure.
///
/// Directories are merged. Files and symlinks are skipped when anything other
/// than a directory already sits at their destination; that collision is
/// logged and recorded but does not stop the overlay. Symlinks are recreated,
/// not followed.
pub fn overlay_static_files(static_dir: &Path, out_dir: &Path) -> Result<OverlayReport> {
    if !static_dir.is_dir() {
        bail!(
            "static files directory '{}' does not exist",
            static_dir.display()
        );
    }

    let mut report = OverlayReport::default();
    for entry in WalkDir::new(static_dir).sort_by_file_name().min_depth(1) {
        let entry =
            entry.with_context(|| format!("walking static files '{}'", static_dir.display()))?;
        let relative = entry
            .path()
            .strip_prefix(static_dir)
            .with_context(|| format!("relativizing '{}'", entry.path().display()))?;
        let dst = out_dir.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dst)
                .with_context(|| format!("creating directory '{}'", dst.display()))?;
            continue;
        }

        if let Ok(existing) = dst.symlink_metadata() {
            if existing.is_dir() {
                bail!(
                    "cannot copy static file '{}' over directory '{}'",
                    entry.path().display(),
                    dst.display()
                );
            }
            tracing::warn!(
                destination = %dst.display(),
                "{} already exists, can't copy static file",
                dst.display()
            );
            report.collisions.push(dst);
            continue;
        }

        if file_type.is_symlink() {
            let target = fs::read_link(entry.path())
                .with_context(|| format!("reading symlink '{}'", entry.path().display()))?;
            std::os::unix::fs::symlink(&target, &dst)
                .with_context(|| format!("creating symlink '{}'", dst.display()))?;
        } else {
            fs::copy(entry.path(), &dst).with_context(|| {
                format!(
                    "copying static file '{}' -> '{}'",
                    entry.path().display(),
                    dst.display()
                )
            })?;
        }
        report.copied += 1;
    }

    tracing::info!(
        copied = report.copied,
        collisions = report.collisions.len(),
        "copied {} static files",
        report.copied
    );
    Ok(report)
}
