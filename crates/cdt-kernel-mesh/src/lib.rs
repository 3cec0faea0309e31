#![warn(missing_docs)]

//! Mesh data structures for the CDT tessellation kernel.
//!
//! - [`Pool`]: the arenas of 3D points and normals. Mesh vertices are pool
//!   indices, so two faces that share a point share the same index.
//! - [`Uedge`]: a direction-free vertex pair used as the edge join key.
//! - [`CMesh`]: the triangles of one face with their edge adjacency.
//! - [`Bvh`]: a surface-area-heuristic bounding volume tree over boxes.
//! - [`BotMesh`] and [`validate_solid`]: the flat output mesh and the
//!   closed-manifold checker.

pub mod bot;
pub mod bvh;
pub mod cmesh;
pub mod pool;
pub mod uedge;
pub mod validate;

pub use bot::BotMesh;
pub use bvh::{Bvh, BvhNode};
pub use cmesh::{CMesh, Tri, TriId};
pub use pool::Pool;
pub use uedge::Uedge;
pub use validate::{validate_solid, SolidReport, ValidationOptions};
