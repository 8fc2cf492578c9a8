//! Addon descriptors.
//!
//! An addon is anything that can contribute to an artifact document. It may
//! carry declarative data, a build hook, or both:
//!
//! - [`Addon`] trait - the two-capability contract the orchestrator consumes
//! - [`BuildHook`] trait - imperative step that receives the [`AddonBuilder`]
//! - [`BuilderOp`] - declarative builder calls, so module files can express
//!   a build hook without compiled code
//!
//! # Example
//!
//! ```rust
//! use addon_dist::addon::{AddonModule, set_name, set_authors};
//! use serde_json::json;
//!
//! // Compiled-in hook
//! let hooked = AddonModule::with_hook(|builder| {
//!     builder.set_name("Y");
//!     Ok(())
//! });
//!
//! // Declarative ops, as a module file would load them
//! let scripted = AddonModule::with_ops(vec![set_name("Z"), set_authors(json!("ann"))]);
//! # let _ = (hooked, scripted);
//! ```

pub mod loader;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::artifact::AddonBuilder;

pub use loader::{AddonLoader, AddonSource, TomlAddonLoader};

/// Something the orchestrator can turn into an artifact.
pub trait Addon {
    /// Declarative fields merged into the document before the hook runs.
    fn data(&self) -> Option<&Map<String, Value>>;

    /// Imperative build step, invoked once with the seeded builder.
    fn build_hook(&self) -> Option<&dyn BuildHook>;
}

/// Imperative build step for one addon.
pub trait BuildHook {
    fn build(&self, builder: &mut AddonBuilder) -> Result<()>;
}

impl<F> BuildHook for F
where
    F: Fn(&mut AddonBuilder) -> Result<()>,
{
    fn build(&self, builder: &mut AddonBuilder) -> Result<()> {
        self(builder)
    }
}

/// Builder calls that a module file can list in place of a compiled hook.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum BuilderOp {
    SetName { value: Value },
    SetDescription { value: Value },
    SetThumbnail { value: Value },
    /// Scalars are wrapped into a one-element array.
    SetAuthors { value: Value },
    /// Shallow merge of several fields at once.
    ApplyFields { fields: Map<String, Value> },
}

impl BuilderOp {
    pub fn apply(&self, builder: &mut AddonBuilder) {
        match self {
            BuilderOp::SetName { value } => builder.set_name(value.clone()),
            BuilderOp::SetDescription { value } => builder.set_description(value.clone()),
            BuilderOp::SetThumbnail { value } => builder.set_thumbnail(value.clone()),
            BuilderOp::SetAuthors { value } => builder.set_authors(value.clone()),
            BuilderOp::ApplyFields { fields } => builder.apply_fields(fields.clone()),
        }
    }
}

/// A sequence of [`BuilderOp`]s applied in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpScript(pub Vec<BuilderOp>);

impl BuildHook for OpScript {
    fn build(&self, builder: &mut AddonBuilder) -> Result<()> {
        for op in &self.0 {
            op.apply(builder);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helper functions for readable op lists
// ─────────────────────────────────────────────────────────────────────────────

pub fn set_name(value: impl Into<Value>) -> BuilderOp {
    BuilderOp::SetName { value: value.into() }
}

pub fn set_description(value: impl Into<Value>) -> BuilderOp {
    BuilderOp::SetDescription { value: value.into() }
}

pub fn set_thumbnail(value: impl Into<Value>) -> BuilderOp {
    BuilderOp::SetThumbnail { value: value.into() }
}

pub fn set_authors(value: impl Into<Value>) -> BuilderOp {
    BuilderOp::SetAuthors { value: value.into() }
}

pub fn apply_fields(fields: Map<String, Value>) -> BuilderOp {
    BuilderOp::ApplyFields { fields }
}

/// Concrete descriptor returned by the loaders.
#[derive(Default)]
pub struct AddonModule {
    data: Option<Map<String, Value>>,
    hook: Option<Box<dyn BuildHook>>,
}

impl AddonModule {
    /// Data-only addon.
    pub fn with_data(data: Map<String, Value>) -> Self {
        Self::new(Some(data), None)
    }

    /// Hook-only addon with compiled-in logic.
    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(&mut AddonBuilder) -> Result<()> + 'static,
    {
        Self::new(None, Some(Box::new(hook)))
    }

    /// Hook-only addon driven by declarative ops.
    pub fn with_ops(ops: Vec<BuilderOp>) -> Self {
        Self::new(None, Some(Box::new(OpScript(ops))))
    }

    pub fn new(data: Option<Map<String, Value>>, hook: Option<Box<dyn BuildHook>>) -> Self {
        Self { data, hook }
    }

    /// True when the module supplies neither data nor a hook.
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.hook.is_none()
    }
}

impl Addon for AddonModule {
    fn data(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()
    }

    fn build_hook(&self) -> Option<&dyn BuildHook> {
        self.hook.as_deref()
    }
}

impl std::fmt::Debug for AddonModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonModule")
            .field("data", &self.data)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}
