use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::AddonError;
use super::paths::{comparable_path, resolve_root_path};

/// Config file looked up at the project root when `--config` isn't given.
pub const DEFAULT_CONFIG_FILENAME: &str = "addon-dist.toml";

pub const DEFAULT_OUT_DIR: &str = "dist";
pub const DEFAULT_ADDONS_DIR: &str = "src/addons";
pub const DEFAULT_STATIC_DIR: &str = "src/static";
pub const DEFAULT_ARTIFACTS_SUBDIR: &str = "addons";
pub const DEFAULT_META_INDEX: &str = "addons.json";
pub const DEFAULT_MODULE_SUFFIX: &str = ".addon.toml";
pub const DEFAULT_ARTIFACT_SUFFIX: &str = ".json";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddonDistToml {
    #[serde(default)]
    build: BuildToml,
}

/// `[build]` table. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildToml {
    pub out_dir: Option<String>,
    pub addons_dir: Option<String>,
    pub static_dir: Option<String>,
    pub artifacts_subdir: Option<String>,
    pub meta_index: Option<String>,
    pub module_suffix: Option<String>,
    pub artifact_suffix: Option<String>,
}

/// Fully resolved directories and naming rules for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    /// Project root the other directories were resolved against.
    pub root: PathBuf,
    /// Output root. Deleted and recreated on every build.
    pub out_dir: PathBuf,
    pub addons_dir: PathBuf,
    pub static_dir: PathBuf,
    /// Artifact directory, relative to `out_dir`.
    pub artifacts_subdir: String,
    /// Meta index file, relative to `out_dir`.
    pub meta_index: String,
    pub module_suffix: String,
    pub artifact_suffix: String,
}

impl BuildLayout {
    /// Apply defaults to `build`, validate, and resolve paths against `root`.
    pub fn resolve(root: &Path, build: BuildToml) -> Result<Self> {
        let artifacts_subdir = build
            .artifacts_subdir
            .unwrap_or_else(|| DEFAULT_ARTIFACTS_SUBDIR.to_string());
        let meta_index = build
            .meta_index
            .unwrap_or_else(|| DEFAULT_META_INDEX.to_string());
        let module_suffix = build
            .module_suffix
            .unwrap_or_else(|| DEFAULT_MODULE_SUFFIX.to_string());
        let artifact_suffix = build
            .artifact_suffix
            .unwrap_or_else(|| DEFAULT_ARTIFACT_SUFFIX.to_string());

        require_output_relative(&artifacts_subdir, "artifacts_subdir")?;
        require_output_relative(&meta_index, "meta_index")?;
        require_non_empty(&module_suffix, "module_suffix")?;
        require_non_empty(&artifact_suffix, "artifact_suffix")?;

        let resolve = |raw: Option<&str>, default: &str| {
            resolve_root_path(root, Path::new(raw.unwrap_or(default)))
        };
        let layout = Self {
            root: root.to_path_buf(),
            out_dir: resolve(build.out_dir.as_deref(), DEFAULT_OUT_DIR),
            addons_dir: resolve(build.addons_dir.as_deref(), DEFAULT_ADDONS_DIR),
            static_dir: resolve(build.static_dir.as_deref(), DEFAULT_STATIC_DIR),
            artifacts_subdir,
            meta_index,
            module_suffix,
            artifact_suffix,
        };
        layout.check_out_dir()?;
        Ok(layout)
    }

    /// Point the build at another output root, relative to [`Self::root`].
    ///
    /// The layout is left unchanged when the new root fails
    /// [`Self::check_out_dir`].
    pub fn set_out_dir(&mut self, out_dir: &Path) -> Result<()> {
        let previous = std::mem::replace(
            &mut self.out_dir,
            resolve_root_path(&self.root, out_dir),
        );
        if let Err(err) = self.check_out_dir() {
            self.out_dir = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Refuse output roots that a reset would take the project down with.
    ///
    /// `out_dir` may not be, or contain, the addons directory, the static
    /// directory, or the project root.
    pub fn check_out_dir(&self) -> Result<()> {
        let out_dir = comparable_path(&self.out_dir)?;
        let protected = [
            ("addons directory", &self.addons_dir),
            ("static files directory", &self.static_dir),
            ("project root", &self.root),
        ];
        for (what, dir) in protected {
            if comparable_path(dir)?.starts_with(&out_dir) {
                return Err(AddonError::InvalidConfig {
                    field: "out_dir",
                    reason: format!(
                        "'{}' would delete the {what} '{}'",
                        self.out_dir.display(),
                        dir.display()
                    ),
                }
                .into());
            }
        }
        Ok(())
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.out_dir.join(&self.artifacts_subdir)
    }

    pub fn meta_index_path(&self) -> PathBuf {
        self.out_dir.join(&self.meta_index)
    }
}

/// Load the layout for a project.
///
/// With `config_path` the file must exist. Without it, `addon-dist.toml` at
/// `root` is used when present and the defaults otherwise.
pub fn load_layout(root: &Path, config_path: Option<&Path>) -> Result<BuildLayout> {
    let config_path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let candidate = root.join(DEFAULT_CONFIG_FILENAME);
            candidate.is_file().then_some(candidate)
        }
    };

    let parsed = match &config_path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading build config '{}'", path.display()))?;
            toml::from_str::<AddonDistToml>(&text)
                .with_context(|| format!("parsing build config '{}'", path.display()))?
        }
        None => AddonDistToml::default(),
    };

    BuildLayout::resolve(root, parsed.build).with_context(|| match &config_path {
        Some(path) => format!("invalid build config '{}'", path.display()),
        None => "invalid default build config".to_string(),
    })
}

fn require_non_empty(value: &str, field: &'static str) -> Result<(), AddonError> {
    if value.is_empty() {
        return Err(AddonError::InvalidConfig {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn require_output_relative(value: &str, field: &'static str) -> Result<(), AddonError> {
    require_non_empty(value, field)?;
    let candidate = Path::new(value);
    if candidate.is_absolute() {
        return Err(AddonError::InvalidConfig {
            field,
            reason: format!("must be relative to the output directory, got '{value}'"),
        });
    }
    for component in candidate.components() {
        if matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        ) {
            return Err(AddonError::InvalidConfig {
                field,
                reason: format!("contains invalid traversal/root component in '{value}'"),
            });
        }
    }
    if !candidate
        .components()
        .any(|component| matches!(component, Component::Normal(_)))
    {
        return Err(AddonError::InvalidConfig {
            field,
            reason: format!("must name a path below the output directory, got '{value}'"),
        });
    }
    Ok(())
}
