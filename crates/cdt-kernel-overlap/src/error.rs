//! Error types for overlap resolution.

use cdt_kernel_tessellate::{Stage, TessError};
use thiserror::Error;

/// Errors that can occur while resolving overlaps.
#[derive(Error, Debug)]
pub enum OverlapError {
    /// An input mesh was not validated as a closed manifold; refining it
    /// would only spread the defects.
    #[error("object {object} is not a validated closed mesh (stage {stage:?})")]
    UntrustedInput {
        /// Index of the object in the input slice.
        object: usize,
        /// Stage the object was in.
        stage: Stage,
    },

    /// A mesh stopped validating after a refinement pass.
    #[error("object {object} has {issues} defects after refinement")]
    Inconsistent {
        /// Index of the object in the input slice.
        object: usize,
        /// Number of defects the validator found.
        issues: usize,
    },

    /// Bad caller input.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// TOML parameter text could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Error from the tessellation state while splitting.
    #[error(transparent)]
    Tessellate(#[from] TessError),
}

/// Result type for overlap resolution.
pub type Result<T> = std::result::Result<T, OverlapError>;
