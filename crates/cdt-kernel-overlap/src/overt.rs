//! Mesh vertices boxed for proximity queries.

use std::collections::BTreeSet;

use cdt_kernel_math::{Aabb3, Point3};
use cdt_kernel_mesh::Bvh;
use cdt_kernel_tessellate::TessState;

/// A mesh vertex wrapped with a bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapVertex {
    /// Pool point of the vertex.
    pub point: usize,
    /// Its position.
    pub position: Point3,
    /// Box around `position`.
    pub bbox: Aabb3,
}

/// Box tree over the vertices of one object's mesh.
///
/// Built from the current triangles; rebuild after the mesh changes.
#[derive(Debug, Clone, Default)]
pub struct VertexIndex {
    vertices: Vec<OverlapVertex>,
    tree: Bvh<usize>,
}

impl VertexIndex {
    /// Index every vertex used by `state`'s triangles, each boxed with
    /// half-width `pad`.
    pub fn build(state: &TessState, pad: f64) -> Self {
        let points: BTreeSet<usize> = state.faces().flat_map(|(_, f)| f.mesh.points()).collect();
        let vertices: Vec<OverlapVertex> = points
            .into_iter()
            .map(|point| {
                let position = state.pool().point(point);
                let mut bbox = Aabb3::from_points([&position]);
                bbox.expand(pad);
                OverlapVertex {
                    point,
                    position,
                    bbox,
                }
            })
            .collect();
        let tree = Bvh::build(vertices.iter().enumerate().map(|(i, v)| (i, v.bbox)));
        Self { vertices, tree }
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Whether the mesh had no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertices within `radius` of `p`, by pool point.
    pub fn near(&self, p: &Point3, radius: f64) -> Vec<&OverlapVertex> {
        let mut window = Aabb3::from_points([p]);
        window.expand(radius);
        let mut out: Vec<&OverlapVertex> = self
            .tree
            .query(&window)
            .into_iter()
            .map(|i| &self.vertices[i])
            .filter(|v| (v.position - p).norm() <= radius)
            .collect();
        out.sort_by_key(|v| v.point);
        out
    }
}
