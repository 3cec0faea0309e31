#![warn(missing_docs)]

//! Watertight tessellation of trimmed B-rep solids.
//!
//! Converts a B-rep into a closed triangle mesh by:
//! 1. Sampling every edge once, shared by both adjacent faces
//! 2. Building each face's trim loops in parameter space from those samples
//! 3. Adding a filtered grid of interior points on curved faces
//! 4. Constrained Delaunay triangulation per face (in parallel)
//! 5. Mapping back to 3D through a shared point pool
//! 6. Scrubbing and locally repairing degenerate triangles
//! 7. Validating the result as a closed, consistently oriented manifold
//!
//! ```
//! use cdt_kernel_brep::make_cube;
//! use cdt_kernel_tessellate::{TessState, TessStatus, TessellationParams};
//!
//! let mut state = TessState::new(make_cube(1.0, 1.0, 1.0).unwrap(), TessellationParams::default()).unwrap();
//! assert_eq!(state.tessellate(None).unwrap(), TessStatus::Complete);
//! let bot = state.mesh(true).unwrap();
//! assert_eq!(bot.num_triangles(), 12);
//! ```

mod assemble;
pub mod audit;
mod error;
mod face;
mod params;
mod refine;
mod repair;
pub mod sampler;
mod state;

pub use audit::{AuditRecord, AuditTrail, DefectKind, Diagnostic};
pub use error::{Result, TessError};
pub use face::SurfaceTopology;
pub use params::TessellationParams;
pub use refine::SplitKind;
pub use sampler::EdgeSample;
pub use state::{BoundarySegment, FaceStatus, FaceTess, Stage, TessState, TessStatus};

use cdt_kernel_brep::Brep;
use cdt_kernel_mesh::BotMesh;

/// Tessellate a whole solid and return its mesh with normals.
///
/// Fails unless every face tessellated and the mesh validated.
pub fn tessellate_brep(brep: Brep, params: &TessellationParams) -> Result<BotMesh> {
    let mut state = TessState::new(brep, params.clone())?;
    match state.tessellate(None)? {
        TessStatus::Complete => state.mesh(true),
        status => Err(TessError::Incomplete(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdt_kernel_brep::make_cylinder;

    #[test]
    fn test_tessellate_brep_complete() {
        let bot = tessellate_brep(make_cylinder(1.0, 2.0).unwrap(), &TessellationParams::default()).unwrap();
        assert!(bot.validate().is_valid());
        assert!(bot.normals.is_some());
    }

    #[test]
    fn test_tessellate_brep_rejects_partial() {
        let mut brep = make_cylinder(1.0, 2.0).unwrap();
        let face = brep.faces.keys().next().unwrap();
        brep.faces[face].outer_loop = None;
        let err = tessellate_brep(brep, &TessellationParams::default()).unwrap_err();
        assert!(matches!(err, TessError::Incomplete(TessStatus::Partial)));
    }
}
