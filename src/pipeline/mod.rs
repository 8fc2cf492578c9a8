//! Full addon build: reset output, build every addon, write the meta index,
//! overlay static files.
//!
//! ```text
//! <addons_dir>/**/<name><module_suffix>
//!        │  discover (sorted walk)
//!        ▼
//!   AddonLoader::load ──► AddonBuilder (data + path) ──► build hook
//!        │                                                  │
//!        │                        get_meta_json ◄───────────┤
//!        ▼                                                  ▼
//! <out_dir>/<meta_index>            <out_dir>/<artifacts_subdir>/<name><artifact_suffix>
//!        │
//!        ▼
//! overlay <static_dir> onto <out_dir> (collisions skipped)
//! ```

pub mod config;
pub mod overlay;
mod paths;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::addon::{Addon, AddonLoader, AddonSource};
use crate::artifact::{AddonBuilder, PATH_FIELD};
use crate::error::AddonError;
use crate::paths::{list_files_recursively, replace_extension, to_slash_path};

pub use config::{load_layout, BuildLayout, BuildToml};
pub use overlay::{overlay_static_files, OverlayReport};

/// A discovered addon and where its artifact goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAddon {
    pub source: AddonSource,
    /// Output-relative artifact location, e.g. `/addons/x.json`.
    pub path: String,
}

impl PlannedAddon {
    /// Artifact file on disk under `out_dir`.
    pub fn artifact_file(&self, out_dir: &Path) -> PathBuf {
        out_dir.join(self.path.trim_start_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Built addons in discovery order.
    pub addons: Vec<PlannedAddon>,
    pub meta_index: PathBuf,
    pub overlay: OverlayReport,
}

/// Run the whole pipeline.
///
/// Any addon failure aborts the build; artifacts already written for earlier
/// addons stay on disk and no meta index is written. Static collisions do not
/// abort and are returned in the report.
pub fn build(layout: &BuildLayout, loader: &dyn AddonLoader) -> Result<BuildReport> {
    reset_output_dir(layout)?;

    let planned = discover_addons(layout)?;
    let mut metas: Vec<Map<String, Value>> = Vec::with_capacity(planned.len());
    for addon in &planned {
        let meta = build_addon(layout, loader, addon)?;
        metas.push(meta);
    }

    let meta_index = layout.meta_index_path();
    write_json(&meta_index, &metas)?;
    info!(
        addons = metas.len(),
        "added metadata of {} addons in {}",
        metas.len(),
        meta_index.display()
    );

    let overlay = overlay_static_files(&layout.static_dir, &layout.out_dir)?;

    Ok(BuildReport {
        addons: planned,
        meta_index,
        overlay,
    })
}

/// Discover and load every addon without writing anything.
///
/// Fails on the same module errors as [`build`].
pub fn check_addons(layout: &BuildLayout, loader: &dyn AddonLoader) -> Result<Vec<PlannedAddon>> {
    let planned = discover_addons(layout)?;
    for addon in &planned {
        load_addon(loader, &addon.source)?;
    }
    Ok(planned)
}

/// Module files under the addons root, in discovery order, with their
/// artifact locations.
pub fn discover_addons(layout: &BuildLayout) -> Result<Vec<PlannedAddon>> {
    if !layout.addons_dir.is_dir() {
        bail!(
            "addons directory '{}' does not exist",
            layout.addons_dir.display()
        );
    }

    let mut planned = Vec::new();
    for file in list_files_recursively(&layout.addons_dir)? {
        let relative = file
            .strip_prefix(&layout.addons_dir)
            .with_context(|| format!("relativizing '{}'", file.display()))?;
        let relative = to_slash_path(relative)?;
        if !relative.ends_with(&layout.module_suffix) {
            debug!(file = %relative, "skipping non-module file");
            continue;
        }
        let path = artifact_path(layout, &relative)?;
        planned.push(PlannedAddon {
            source: AddonSource { file, relative },
            path,
        });
    }
    Ok(planned)
}

/// Output-relative artifact location for a module path.
pub fn artifact_path(layout: &BuildLayout, relative: &str) -> Result<String> {
    let subdir = to_slash_path(Path::new(&layout.artifacts_subdir))?;
    let artifact = replace_extension(relative, &layout.module_suffix, &layout.artifact_suffix);
    if subdir.is_empty() {
        return Ok(format!("/{artifact}"));
    }
    Ok(format!("/{subdir}/{artifact}"))
}

fn reset_output_dir(layout: &BuildLayout) -> Result<()> {
    layout.check_out_dir()?;
    let out_dir = &layout.out_dir;
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).with_context(|| {
            format!("removing existing output directory '{}'", out_dir.display())
        })?;
        info!("deleted existing {} directory", out_dir.display());
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory '{}'", out_dir.display()))?;
    let artifacts_dir = layout.artifacts_dir();
    fs::create_dir_all(&artifacts_dir).with_context(|| {
        format!("creating artifact directory '{}'", artifacts_dir.display())
    })?;
    Ok(())
}

fn load_addon(loader: &dyn AddonLoader, source: &AddonSource) -> Result<Box<dyn Addon>> {
    let addon = loader
        .load(source)
        .with_context(|| format!("loading addon '{}'", source.relative))?;
    if addon.data().is_none() && addon.build_hook().is_none() {
        return Err(AddonError::EmptyModule {
            module: source.relative.clone(),
        }
        .into());
    }
    Ok(addon)
}

/// Build one addon, write its artifact, and return its meta record.
fn build_addon(
    layout: &BuildLayout,
    loader: &dyn AddonLoader,
    planned: &PlannedAddon,
) -> Result<Map<String, Value>> {
    let source = &planned.source;
    let addon = load_addon(loader, source)?;

    let mut seed = addon.data().cloned().unwrap_or_default();
    seed.insert(PATH_FIELD.to_string(), Value::String(planned.path.clone()));
    let mut builder = AddonBuilder::new(seed)?;

    if let Some(hook) = addon.build_hook() {
        hook.build(&mut builder)
            .with_context(|| format!("running build hook for '{}'", source.relative))?;
    }

    let meta = builder.get_meta_json();
    write_json(&planned.artifact_file(&layout.out_dir), &builder.get_full_json())?;
    info!(addon = %source.relative, "built addon: {}", source.relative);
    Ok(meta)
}

fn write_json(path: &Path, value: &impl serde::Serialize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory '{}'", parent.display()))?;
    }
    let bytes = serde_json::to_vec(value)
        .with_context(|| format!("serializing '{}'", path.display()))?;
    fs::write(path, bytes).with_context(|| format!("writing '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addon::{AddonModule, TomlAddonLoader};
    use serde_json::json;
    use tempfile::TempDir;

    struct Project {
        _temp: TempDir,
        layout: BuildLayout,
    }

    impl Project {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let layout = BuildLayout::resolve(temp.path(), BuildToml::default()).unwrap();
            fs::create_dir_all(&layout.addons_dir).unwrap();
            fs::create_dir_all(&layout.static_dir).unwrap();
            Self {
                _temp: temp,
                layout,
            }
        }

        fn addon(&self, relative: &str, text: &str) {
            let file = self.layout.addons_dir.join(relative);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, text).unwrap();
        }

        fn static_file(&self, relative: &str, text: &str) {
            let file = self.layout.static_dir.join(relative);
            fs::create_dir_all(file.parent().unwrap()).unwrap();
            fs::write(file, text).unwrap();
        }

        fn read_json(&self, relative: &str) -> Value {
            let bytes = fs::read(self.layout.out_dir.join(relative)).unwrap();
            serde_json::from_slice(&bytes).unwrap()
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_build_data_and_hook_addons() {
        let project = Project::new();
        project.addon("x.addon.toml", "");
        project.addon("y.addon.toml", "");

        let loader = |source: &AddonSource| -> Result<Box<dyn Addon>> {
            match source.relative.as_str() {
                "x.addon.toml" => Ok(Box::new(AddonModule::with_data(object(json!({
                    "name": "X",
                    "body": "payload",
                }))))),
                "y.addon.toml" => Ok(Box::new(AddonModule::with_hook(|b| {
                    b.set_name("Y");
                    Ok(())
                }))),
                other => panic!("unexpected module {other}"),
            }
        };

        let report = build(&project.layout, &loader).unwrap();

        assert_eq!(report.addons.len(), 2);
        assert_eq!(
            project.read_json("addons/x.json"),
            json!({ "name": "X", "body": "payload" })
        );
        assert_eq!(project.read_json("addons/y.json"), json!({ "name": "Y" }));
        assert_eq!(
            project.read_json("addons.json"),
            json!([
                { "name": "X", "path": "/addons/x.json" },
                { "name": "Y", "path": "/addons/y.json" },
            ])
        );
    }

    #[test]
    fn test_build_from_module_files() {
        let project = Project::new();
        project.addon(
            "themes/dark.addon.toml",
            r#"
            [data]
            name = "Dark"
            authors = "ann"
            css = "body { background: black }"

            [[build]]
            op = "set_thumbnail"
            value = "dark.png"
            "#,
        );
        project.addon("README.md", "not a module");

        let report = build(&project.layout, &TomlAddonLoader).unwrap();

        assert_eq!(report.addons.len(), 1);
        assert_eq!(report.addons[0].path, "/addons/themes/dark.json");
        assert_eq!(
            project.read_json("addons/themes/dark.json"),
            json!({
                "name": "Dark",
                "authors": "ann",
                "css": "body { background: black }",
                "thumbnail": "dark.png",
            })
        );
        assert_eq!(
            project.read_json("addons.json"),
            json!([{
                "name": "Dark",
                "thumbnail": "dark.png",
                "authors": ["ann"],
                "path": "/addons/themes/dark.json",
            }])
        );
        assert!(!project.layout.out_dir.join("addons/README.md").exists());
    }

    #[test]
    fn test_empty_module_aborts_build() {
        let project = Project::new();
        project.addon("a.addon.toml", "[data]\nname = \"A\"\n");
        project.addon("b.addon.toml", "# nothing here\n");
        project.addon("c.addon.toml", "[data]\nname = \"C\"\n");

        let err = build(&project.layout, &TomlAddonLoader).unwrap_err();

        assert_eq!(
            err.downcast_ref::<AddonError>(),
            Some(&AddonError::EmptyModule {
                module: "b.addon.toml".into()
            })
        );
        let out = &project.layout.out_dir;
        assert!(out.join("addons/a.json").exists());
        assert!(!out.join("addons/b.json").exists());
        assert!(!out.join("addons/c.json").exists());
        assert!(!out.join("addons.json").exists());
    }

    #[test]
    fn test_custom_loader_without_capabilities_is_rejected() {
        let project = Project::new();
        project.addon("x.addon.toml", "");

        let loader = |_: &AddonSource| -> Result<Box<dyn Addon>> {
            Ok(Box::new(AddonModule::default()))
        };
        let err = build(&project.layout, &loader).unwrap_err();
        assert!(err.downcast_ref::<AddonError>().is_some());
    }

    #[test]
    fn test_build_resets_previous_output() {
        let project = Project::new();
        project.addon("x.addon.toml", "[data]\nname = \"X\"\n");
        fs::create_dir_all(project.layout.out_dir.join("stale")).unwrap();
        fs::write(project.layout.out_dir.join("stale/old.json"), "{}").unwrap();

        build(&project.layout, &TomlAddonLoader).unwrap();

        assert!(!project.layout.out_dir.join("stale").exists());
        assert!(project.layout.out_dir.join("addons/x.json").exists());
    }

    #[test]
    fn test_static_overlay_skips_artifact_collision() {
        let project = Project::new();
        project.addon("x.addon.toml", "[data]\nname = \"X\"\n");
        project.static_file("addons/x.json", "{\"name\":\"static\"}");
        project.static_file("index.html", "<html>");
        project.static_file("addons/icons/x.svg", "<svg/>");

        let report = build(&project.layout, &TomlAddonLoader).unwrap();

        assert_eq!(report.overlay.copied, 2);
        assert_eq!(
            report.overlay.collisions,
            vec![project.layout.out_dir.join("addons/x.json")]
        );
        assert_eq!(project.read_json("addons/x.json"), json!({ "name": "X" }));
        assert!(project.layout.out_dir.join("index.html").is_file());
        assert!(project.layout.out_dir.join("addons/icons/x.svg").is_file());
    }

    #[test]
    fn test_static_file_can_collide_with_meta_index() {
        let project = Project::new();
        project.addon("x.addon.toml", "[data]\nname = \"X\"\n");
        project.static_file("addons.json", "[]");

        let report = build(&project.layout, &TomlAddonLoader).unwrap();

        assert_eq!(report.overlay.copied, 0);
        assert_eq!(report.overlay.collisions.len(), 1);
        assert_eq!(
            project.read_json("addons.json"),
            json!([{ "name": "X", "path": "/addons/x.json" }])
        );
    }

    #[test]
    fn test_hook_sees_seeded_path_and_data() {
        let project = Project::new();
        project.addon("x.addon.toml", "");

        let loader = |_: &AddonSource| -> Result<Box<dyn Addon>> {
            let module = AddonModule::new(
                Some(object(json!({ "name": "seed", "path": "/ignored" }))),
                Some(Box::new(|b: &mut AddonBuilder| -> Result<()> {
                    assert_eq!(b.path(), Some("/addons/x.json"));
                    assert_eq!(b.get_meta_json()["name"], json!("seed"));
                    b.set_authors("ann");
                    Ok(())
                })),
            );
            Ok(Box::new(module))
        };

        build(&project.layout, &loader).unwrap();
        assert_eq!(
            project.read_json("addons.json"),
            json!([{ "name": "seed", "authors": ["ann"], "path": "/addons/x.json" }])
        );
    }

    #[test]
    fn test_hook_error_aborts_build() {
        let project = Project::new();
        project.addon("x.addon.toml", "");

        let loader = |_: &AddonSource| -> Result<Box<dyn Addon>> {
            Ok(Box::new(AddonModule::with_hook(|_| {
                Err(anyhow::anyhow!("hook exploded"))
            })))
        };
        let err = build(&project.layout, &loader).unwrap_err();
        assert!(format!("{err:#}").contains("hook exploded"));
        assert!(!project.layout.out_dir.join("addons/x.json").exists());
    }

    #[test]
    fn test_check_addons_lists_without_writing() {
        let project = Project::new();
        project.addon("b.addon.toml", "[[build]]\nop = \"set_name\"\nvalue = \"B\"\n");
        project.addon("a/nested.addon.toml", "[data]\nname = \"N\"\n");

        let planned = check_addons(&project.layout, &TomlAddonLoader).unwrap();

        let paths: Vec<&str> = planned.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["/addons/a/nested.json", "/addons/b.json"]);
        assert!(!project.layout.out_dir.exists());
    }

    #[test]
    fn test_out_dir_over_sources_leaves_them_alone() {
        let mut project = Project::new();
        project.addon("x.addon.toml", "[data]\nname = \"X\"\n");
        let source = project.layout.addons_dir.join("x.addon.toml");
        project.layout.out_dir = project.layout.root.join("src");

        let err = build(&project.layout, &TomlAddonLoader).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<AddonError>(),
            Some(AddonError::InvalidConfig { field: "out_dir", .. })
        ));
        assert!(source.is_file());
        assert!(project.layout.static_dir.is_dir());
    }

    #[test]
    fn test_missing_addons_dir() {
        let project = Project::new();
        fs::remove_dir_all(&project.layout.addons_dir).unwrap();
        assert!(build(&project.layout, &TomlAddonLoader).is_err());
    }

    #[test]
    fn test_artifact_path_uses_configured_suffixes() {
        let temp = TempDir::new().unwrap();
        let build = BuildToml {
            artifacts_subdir: Some("packs/v1".into()),
            module_suffix: Some(".src.js".into()),
            ..BuildToml::default()
        };
        let layout = BuildLayout::resolve(temp.path(), build).unwrap();
        assert_eq!(artifact_path(&layout, "a/b.src.js").unwrap(), "/packs/v1/a/b.json");
        // Non-matching names keep their name.
        assert_eq!(artifact_path(&layout, "a/b.txt").unwrap(), "/packs/v1/a/b.txt");
    }

    #[test]
    fn test_artifact_path_never_doubles_the_slash() {
        let mut project = Project::new();
        project.layout.artifacts_subdir = "./".into();
        assert_eq!(
            artifact_path(&project.layout, "x.addon.toml").unwrap(),
            "/x.json"
        );
    }
}
