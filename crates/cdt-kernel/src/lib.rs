#![warn(missing_docs)]

//! Watertight tessellation of trimmed B-rep solids, with overlap
//! resolution between solids that share a scene.
//!
//! [`Scene`] is the entry point: add B-reps, each is tessellated into a
//! closed mesh on arrival, then [`Scene::resolve_overlaps`] refines the
//! meshes until no two objects' triangles cut through each other.
//!
//! # Example
//!
//! ```
//! use cdt_kernel::{Scene, SceneConfig};
//! use cdt_kernel_brep::make_cube;
//!
//! let mut scene = Scene::new(SceneConfig::default());
//! let (id, status) = scene.add(make_cube(1.0, 1.0, 1.0).unwrap()).unwrap();
//! assert_eq!(status.code(), 0);
//! assert_eq!(scene.mesh(id, false).unwrap().num_triangles(), 12);
//! ```

pub use cdt_kernel_brep;
pub use cdt_kernel_geom;
pub use cdt_kernel_math;
pub use cdt_kernel_mesh;
pub use cdt_kernel_overlap;
pub use cdt_kernel_tessellate;
pub use cdt_kernel_triangulate;

use cdt_kernel_brep::{Brep, BrepError};
use cdt_kernel_math::{Aabb3, Transform};
use cdt_kernel_mesh::BotMesh;
use cdt_kernel_overlap::{resolve_overlaps, OverlapError, OverlapParams, OverlapReport};
use cdt_kernel_tessellate::{TessError, TessState, TessStatus, TessellationParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from scene operations.
#[derive(Error, Debug)]
pub enum KernelError {
    /// B-rep construction or transform failed.
    #[error(transparent)]
    Brep(#[from] BrepError),
    /// Tessellation failed.
    #[error(transparent)]
    Tessellate(#[from] TessError),
    /// Overlap resolution failed.
    #[error(transparent)]
    Overlap(#[from] OverlapError),
    /// Configuration text could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    /// No object with this index.
    #[error("no object {0} in scene")]
    UnknownObject(usize),
}

/// Result type for scene operations.
pub type Result<T> = std::result::Result<T, KernelError>;

/// Parameters for every stage, loadable from one TOML document with
/// `[tessellation]` and `[overlap]` tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Per-object tessellation.
    pub tessellation: TessellationParams,
    /// Cross-object refinement.
    pub overlap: OverlapParams,
}

impl SceneConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.tessellation.validate()?;
        config.overlap.validate()?;
        Ok(config)
    }
}

/// A set of independently tessellated solids.
#[derive(Debug)]
pub struct Scene {
    config: SceneConfig,
    objects: Vec<TessState>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(config: SceneConfig) -> Self {
        Self {
            config,
            objects: Vec::new(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Tessellate `brep` and add it, returning its index and status.
    ///
    /// Partially tessellated objects are kept so their diagnostics can be
    /// inspected, but overlap resolution will refuse to run on them.
    pub fn add(&mut self, brep: Brep) -> Result<(usize, TessStatus)> {
        let mut state = TessState::new(brep, self.config.tessellation.clone())?;
        let status = state.tessellate(None)?;
        self.objects.push(state);
        Ok((self.objects.len() - 1, status))
    }

    /// Apply a rigid motion to `brep` and add it.
    pub fn add_transformed(&mut self, mut brep: Brep, t: &Transform) -> Result<(usize, TessStatus)> {
        brep.transform(t)?;
        self.add(brep)
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the scene has no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Tessellation state of object `id`.
    pub fn object(&self, id: usize) -> Option<&TessState> {
        self.objects.get(id)
    }

    /// Output mesh of object `id`.
    pub fn mesh(&self, id: usize, want_normals: bool) -> Result<BotMesh> {
        let state = self.objects.get(id).ok_or(KernelError::UnknownObject(id))?;
        Ok(state.mesh(want_normals)?)
    }

    /// Output meshes of every object, in insertion order.
    pub fn meshes(&self, want_normals: bool) -> Result<Vec<BotMesh>> {
        (0..self.objects.len())
            .map(|id| self.mesh(id, want_normals))
            .collect()
    }

    /// Refine all objects so no two of them interpenetrate.
    pub fn resolve_overlaps(&mut self) -> Result<OverlapReport> {
        Ok(resolve_overlaps(&mut self.objects, &self.config.overlap)?)
    }
}

/// Total triangle area of a mesh.
pub fn surface_area(mesh: &BotMesh) -> f64 {
    mesh.triangles()
        .iter()
        .map(|t| {
            let (a, b, c) = (mesh.vertex(t[0]), mesh.vertex(t[1]), mesh.vertex(t[2]));
            0.5 * (b - a).cross(&(c - a)).norm()
        })
        .sum()
}

/// Bounds of a mesh's vertices.
pub fn bounding_box(mesh: &BotMesh) -> Aabb3 {
    Aabb3::from_points(&mesh.points())
}
