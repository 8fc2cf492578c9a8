//! Turning discovered module files into [`Addon`] descriptors.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Addon, AddonModule, BuildHook, BuilderOp, OpScript};
use crate::error::AddonError;

/// A module file found under the addons root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddonSource {
    /// Location on disk.
    pub file: PathBuf,
    /// Path relative to the addons root, `/`-separated.
    pub relative: String,
}

/// Loads the descriptor behind an [`AddonSource`].
///
/// The file-backed [`TomlAddonLoader`] is the default. Compiled-in addons can
/// be served by any other implementation, including a plain closure.
pub trait AddonLoader {
    fn load(&self, source: &AddonSource) -> Result<Box<dyn Addon>>;
}

impl<F> AddonLoader for F
where
    F: Fn(&AddonSource) -> Result<Box<dyn Addon>>,
{
    fn load(&self, source: &AddonSource) -> Result<Box<dyn Addon>> {
        self(source)
    }
}

/// On-disk shape of an addon module file.
///
/// Both sections stay TOML until [`table_to_json`] has converted them, so
/// datetimes and non-finite floats never reach the artifact in serde's
/// internal representation.
///
/// ```toml
/// [data]
/// name = "Dark theme"
/// authors = "ann"
///
/// [[build]]
/// op = "set_thumbnail"
/// value = "dark.png"
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AddonModuleToml {
    data: Option<toml::Table>,
    build: Option<Vec<toml::Table>>,
}

/// Reads `[data]` and `[[build]]` from TOML module files.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlAddonLoader;

impl TomlAddonLoader {
    /// Parse module text. `origin` names the module in errors.
    pub fn parse(origin: &str, text: &str) -> Result<AddonModule> {
        let parsed: AddonModuleToml = toml::from_str(text)
            .with_context(|| format!("parsing addon module '{}'", origin))?;

        let data = parsed
            .data
            .map(|table| table_to_json(table, "data"))
            .transpose()
            .with_context(|| format!("converting data of addon module '{}'", origin))?;
        let hook = match parsed.build {
            Some(tables) => {
                let ops = parse_ops(tables)
                    .with_context(|| format!("parsing build ops of addon module '{}'", origin))?;
                Some(Box::new(OpScript(ops)) as Box<dyn BuildHook>)
            }
            None => None,
        };
        let module = AddonModule::new(data, hook);
        if module.is_empty() {
            return Err(AddonError::EmptyModule {
                module: origin.to_string(),
            }
            .into());
        }
        Ok(module)
    }

    fn read(file: &Path) -> Result<String> {
        fs::read_to_string(file)
            .with_context(|| format!("reading addon module '{}'", file.display()))
    }
}

impl AddonLoader for TomlAddonLoader {
    fn load(&self, source: &AddonSource) -> Result<Box<dyn Addon>> {
        let text = Self::read(&source.file)?;
        let module = Self::parse(&source.relative, &text)?;
        Ok(Box::new(module))
    }
}

fn parse_ops(tables: Vec<toml::Table>) -> Result<Vec<BuilderOp>> {
    tables
        .into_iter()
        .enumerate()
        .map(|(index, table)| {
            let field = format!("build[{index}]");
            let op = Value::Object(table_to_json(table, &field)?);
            serde_json::from_value(op).with_context(|| format!("invalid builder op {field}"))
        })
        .collect()
}

/// Convert a TOML table to a JSON object, keeping key order.
///
/// `field` is the dotted location of `table`, used in errors.
fn table_to_json(table: toml::Table, field: &str) -> Result<Map<String, Value>> {
    table
        .into_iter()
        .map(|(key, value)| {
            let value = toml_to_json(value, &format!("{field}.{key}"))?;
            Ok((key, value))
        })
        .collect()
}

/// Datetimes become their RFC 3339 text. NaN and infinities have no JSON
/// form and are rejected.
fn toml_to_json(value: toml::Value, field: &str) -> Result<Value> {
    Ok(match value {
        toml::Value::String(text) => Value::String(text),
        toml::Value::Integer(number) => Value::from(number),
        toml::Value::Float(number) => match serde_json::Number::from_f64(number) {
            Some(number) => Value::Number(number),
            None => bail!("field '{field}' is {number}, which JSON cannot represent"),
        },
        toml::Value::Boolean(flag) => Value::Bool(flag),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| toml_to_json(item, &format!("{field}[{index}]")))
                .collect::<Result<_>>()?,
        ),
        toml::Value::Table(table) => Value::Object(table_to_json(table, field)?),
    })
}
