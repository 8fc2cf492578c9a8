//! Per-addon artifact document.
//!
//! [`AddonBuilder`] accumulates one addon's JSON document. The orchestrator
//! seeds it with the addon's declarative data plus the artifact `path`, hands
//! it to the addon's build hook, then reads back two views:
//!
//! - [`AddonBuilder::get_full_json`] - the persisted artifact (no `path`)
//! - [`AddonBuilder::get_meta_json`] - the record that goes into the meta index

use serde_json::{Map, Value};

use crate::error::AddonError;

/// Fields copied into the meta index, in output order.
pub const ADDON_META_FIELDS: &[&str] = &["name", "description", "thumbnail", "authors", "path"];

/// Field holding the output-relative artifact location.
pub const PATH_FIELD: &str = "path";

const AUTHORS_FIELD: &str = "authors";

/// Mutable JSON document for a single addon.
#[derive(Debug, Clone)]
pub struct AddonBuilder {
    json: Map<String, Value>,
}

impl AddonBuilder {
    /// Create a builder from the initial document.
    ///
    /// The document must carry a non-empty string `path`.
    pub fn new(initial: Map<String, Value>) -> Result<Self, AddonError> {
        match initial.get(PATH_FIELD) {
            Some(Value::String(path)) if !path.is_empty() => {}
            _ => return Err(AddonError::MissingPath),
        }
        let mut builder = Self { json: Map::new() };
        builder.apply_fields(initial);
        Ok(builder)
    }

    /// Shallow-merge `fields` into the document. Existing keys are overwritten.
    pub fn apply_fields(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            self.json.insert(key, value);
        }
    }

    /// Overwrite `name`.
    pub fn set_name(&mut self, name: impl Into<Value>) {
        self.json.insert("name".to_string(), name.into());
    }

    /// Overwrite `description`.
    pub fn set_description(&mut self, description: impl Into<Value>) {
        self.json.insert("description".to_string(), description.into());
    }

    /// Overwrite `thumbnail`.
    pub fn set_thumbnail(&mut self, thumbnail: impl Into<Value>) {
        self.json.insert("thumbnail".to_string(), thumbnail.into());
    }

    /// Set `authors`, wrapping a single value into a one-element array.
    pub fn set_authors(&mut self, authors: impl Into<Value>) {
        self.json
            .insert(AUTHORS_FIELD.to_string(), normalize_authors(authors.into()));
    }

    /// The whitelisted subset of the document, in [`ADDON_META_FIELDS`] order.
    ///
    /// `authors` is always an array here, even when declarative data supplied
    /// a bare value.
    pub fn get_meta_json(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        for field in ADDON_META_FIELDS {
            if let Some(value) = self.json.get(*field) {
                let value = if *field == AUTHORS_FIELD {
                    normalize_authors(value.clone())
                } else {
                    value.clone()
                };
                meta.insert(field.to_string(), value);
            }
        }
        meta
    }

    /// The complete document without the internal `path` field.
    pub fn get_full_json(&self) -> Map<String, Value> {
        self.json
            .iter()
            .filter(|(key, _)| key.as_str() != PATH_FIELD)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Current output-relative artifact location.
    pub fn path(&self) -> Option<&str> {
        self.json.get(PATH_FIELD).and_then(Value::as_str)
    }
}

fn normalize_authors(authors: Value) -> Value {
    match authors {
        Value::Array(_) => authors,
        other => Value::Array(vec![other]),
    }
}
