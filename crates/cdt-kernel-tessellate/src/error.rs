//! Error types for tessellation.

use cdt_kernel_brep::{BrepError, EdgeId, FaceId};
use cdt_kernel_triangulate::TriangulateError;
use thiserror::Error;

use crate::TessStatus;

/// Errors that can occur during tessellation.
#[derive(Error, Debug)]
pub enum TessError {
    /// An edge is not shared by exactly two trims (open or plate-mode geometry).
    #[error("edge {edge:?} has {trims} trims, expected 2")]
    NonManifoldEdge {
        /// Offending edge.
        edge: EdgeId,
        /// Number of trims found.
        trims: usize,
    },

    /// A face's trimmed parameter region has no measurable area.
    #[error("face {face:?} has a degenerate surface domain (area {area})")]
    DegenerateSurface {
        /// Offending face.
        face: FaceId,
        /// Estimated area.
        area: f64,
    },

    /// Bad caller input: unknown face ids, wrong stage, bad parameters.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The outer loop of a face could not be built. Recorded per face.
    #[error("face {face:?}: cannot build outer loop: {reason}")]
    OuterLoop {
        /// Failed face.
        face: FaceId,
        /// What went wrong.
        reason: String,
    },

    /// The face polygon could not be triangulated. Recorded per face.
    #[error("face {face:?}: triangulation failed: {source}")]
    Triangulate {
        /// Failed face.
        face: FaceId,
        /// Triangulator error.
        source: TriangulateError,
    },

    /// Ear clipping and the Delaunay fallback both failed on a repair
    /// region. Fatal for the whole mesh.
    #[error("face {face:?}: local repair failed in both triangulators: {source}")]
    RepairExhausted {
        /// Face being repaired.
        face: FaceId,
        /// Error from the fallback triangulator.
        source: TriangulateError,
    },

    /// A whole-solid run did not finish [`TessStatus::Complete`].
    #[error("tessellation incomplete: {0:?}")]
    Incomplete(TessStatus),

    /// TOML parameter text could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// B-rep lookup failure.
    #[error(transparent)]
    Brep(#[from] BrepError),
}

/// Result type for tessellation operations.
pub type Result<T> = std::result::Result<T, TessError>;
