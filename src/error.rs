//! Typed configuration errors.
//!
//! Everything else in the crate propagates `anyhow::Error`; these variants are
//! the ones callers may want to tell apart, via `downcast_ref::<AddonError>()`.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddonError {
    #[error("artifact builder needs to be constructed with a non-empty 'path' field")]
    MissingPath,

    #[error("{module}: no data or build hook specified")]
    EmptyModule { module: String },

    #[error("invalid build config '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}
