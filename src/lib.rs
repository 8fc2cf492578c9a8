//! Compiles a tree of addon definition modules into JSON artifacts.
//!
//! Every build starts from an empty output directory and produces:
//!
//! - **Artifacts** - one JSON document per addon module
//! - **Meta index** - a single JSON array with the listing fields of every addon
//! - **Static overlay** - a static-files tree merged on top, never overwriting
//!   anything the build already wrote
//!
//! # Architecture
//!
//! ```text
//! addon-dist (this crate)
//!     │
//!     ├── paths     - recursive listing, suffix substitution
//!     ├── artifact  - AddonBuilder: one addon's document, full + meta views
//!     ├── addon     - Addon / BuildHook traits, BuilderOp, module loaders
//!     └── pipeline  - build orchestration, layout config, static overlay
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use addon_dist::addon::TomlAddonLoader;
//! use addon_dist::pipeline::{build, load_layout};
//! use std::path::Path;
//!
//! let layout = load_layout(Path::new("."), None)?;
//! let report = build(&layout, &TomlAddonLoader)?;
//! println!("built {} addons", report.addons.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod addon;
pub mod artifact;
pub mod error;
pub mod paths;
pub mod pipeline;

pub use addon::{Addon, AddonLoader, AddonModule, AddonSource, BuildHook, BuilderOp};
pub use artifact::{AddonBuilder, ADDON_META_FIELDS};
pub use error::AddonError;
pub use pipeline::{build, BuildLayout, BuildReport};
