#![warn(missing_docs)]

//! Planar polygon triangulation for the CDT tessellation kernel.
//!
//! Two triangulators operate on index lists into a shared 2D point array:
//!
//! - [`ear_clip`] triangulates one simple polygon.
//! - [`constrained_delaunay`] triangulates an outer polygon with holes and
//!   free interior points, keeping every loop segment as a constrained edge
//!   and flipping all other edges until they are locally Delaunay.
//!
//! All orientation and in-circle decisions go through exact predicates.
//! Output triangles are always counterclockwise.

mod cdt;
mod earclip;

pub use cdt::{constrained_delaunay, CdtInput, Triangulation};
pub use earclip::ear_clip;

use thiserror::Error;

/// Errors raised by the triangulators.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TriangulateError {
    /// A polygon needs at least three corners.
    #[error("polygon has {0} points, need at least 3")]
    TooFewPoints(usize),
    /// The polygon encloses no area.
    #[error("polygon has zero area")]
    ZeroArea,
    /// Ear clipping stalled; the polygon is self-intersecting or degenerate.
    #[error("no ear found with {remaining} vertices left")]
    NoEar {
        /// Ring length at the point of failure.
        remaining: usize,
    },
    /// No bridge from the outer boundary to a hole avoids every loop segment.
    #[error("cannot bridge hole {0} to the outer boundary")]
    HoleBridge(usize),
    /// Edge flipping did not settle within its budget.
    #[error("edge flipping exceeded {0} flips")]
    FlipBudget(usize),
}

/// Result type for triangulation.
pub type Result<T> = std::result::Result<T, TriangulateError>;
