//! Per-face triangle mesh with unordered-edge adjacency.

use std::collections::{BTreeSet, HashMap};

use cdt_kernel_math::{triangle_cross, Aabb3, Point3, Vec3};
use slotmap::{new_key_type, SlotMap};

use crate::{Bvh, Pool, Uedge};

new_key_type! {
    /// Handle to a triangle inside a [`CMesh`].
    pub struct TriId;
}

/// A triangle: three pool point indices in winding order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tri {
    /// Pool point indices.
    pub v: [usize; 3],
    /// Flagged for repair; still part of the mesh until removed.
    pub degenerate: bool,
}

impl Tri {
    /// The three unordered edges.
    pub fn uedges(&self) -> [Uedge; 3] {
        [
            Uedge::new(self.v[0], self.v[1]),
            Uedge::new(self.v[1], self.v[2]),
            Uedge::new(self.v[2], self.v[0]),
        ]
    }

    /// Whether two corners are the same pool point.
    pub fn is_collapsed(&self) -> bool {
        self.v[0] == self.v[1] || self.v[1] == self.v[2] || self.v[2] == self.v[0]
    }

    /// The corner not on `e`.
    pub fn apex(&self, e: &Uedge) -> Option<usize> {
        self.v.iter().copied().find(|&x| !e.contains(x))
    }

    /// Corner positions.
    pub fn corners(&self, pool: &Pool) -> [Point3; 3] {
        [pool.point(self.v[0]), pool.point(self.v[1]), pool.point(self.v[2])]
    }
}

/// Triangles of one face, with an unordered-edge map and per-point normals.
///
/// Triangle removal is lazy with respect to ids: a removed id never
/// resolves again, and new triangles receive fresh ids.
#[derive(Debug, Clone, Default)]
pub struct CMesh {
    tris: SlotMap<TriId, Tri>,
    edges: HashMap<Uedge, Vec<TriId>>,
    normals: HashMap<usize, usize>,
}

impl CMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a triangle.
    pub fn add(&mut self, v: [usize; 3]) -> TriId {
        let tri = Tri { v, degenerate: false };
        let id = self.tris.insert(tri);
        for e in tri.uedges() {
            self.edges.entry(e).or_default().push(id);
        }
        id
    }

    /// Remove a triangle, returning it.
    pub fn remove(&mut self, id: TriId) -> Option<Tri> {
        let tri = self.tris.remove(id)?;
        for e in tri.uedges() {
            if let Some(list) = self.edges.get_mut(&e) {
                list.retain(|&t| t != id);
                if list.is_empty() {
                    self.edges.remove(&e);
                }
            }
        }
        Some(tri)
    }

    /// Look up a triangle.
    pub fn get(&self, id: TriId) -> Option<&Tri> {
        self.tris.get(id)
    }

    /// Flag a triangle as degenerate.
    pub fn mark_degenerate(&mut self, id: TriId) {
        if let Some(t) = self.tris.get_mut(id) {
            t.degenerate = true;
        }
    }

    /// Clear the degenerate flag of a triangle.
    pub fn clear_degenerate(&mut self, id: TriId) {
        if let Some(t) = self.tris.get_mut(id) {
            t.degenerate = false;
        }
    }

    /// Triangles currently flagged degenerate.
    pub fn degenerate(&self) -> Vec<TriId> {
        self.tris
            .iter()
            .filter(|(_, t)| t.degenerate)
            .map(|(id, _)| id)
            .collect()
    }

    /// Iterate over live triangles.
    pub fn iter(&self) -> impl Iterator<Item = (TriId, &Tri)> {
        self.tris.iter()
    }

    /// Number of live triangles.
    pub fn len(&self) -> usize {
        self.tris.len()
    }

    /// Whether there are no triangles.
    pub fn is_empty(&self) -> bool {
        self.tris.is_empty()
    }

    /// Triangles using edge `e`.
    pub fn edge_tris(&self, e: &Uedge) -> &[TriId] {
        self.edges.get(e).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The other triangle on `e`, when exactly two share it.
    pub fn neighbor(&self, id: TriId, e: &Uedge) -> Option<TriId> {
        match self.edge_tris(e) {
            [a, b] if *a == id => Some(*b),
            [a, b] if *b == id => Some(*a),
            _ => None,
        }
    }

    /// Every edge with at least one triangle.
    pub fn uedges(&self) -> impl Iterator<Item = &Uedge> {
        self.edges.keys()
    }

    /// Edges used by a single triangle of this mesh.
    pub fn boundary_uedges(&self) -> Vec<Uedge> {
        let mut out: Vec<Uedge> = self
            .edges
            .iter()
            .filter(|(_, t)| t.len() == 1)
            .map(|(e, _)| *e)
            .collect();
        out.sort_unstable();
        out
    }

    /// Attach a pool normal to a pool point for this face.
    pub fn set_normal(&mut self, point: usize, normal: usize) {
        self.normals.insert(point, normal);
    }

    /// Pool normal attached to `point`, if any.
    pub fn normal_of(&self, point: usize) -> Option<usize> {
        self.normals.get(&point).copied()
    }

    /// Pool points referenced by live triangles, ascending.
    pub fn points(&self) -> BTreeSet<usize> {
        self.tris.values().flat_map(|t| t.v).collect()
    }

    /// Un-normalized normal of a triangle (length is twice the area).
    pub fn cross(&self, id: TriId, pool: &Pool) -> Option<Vec3> {
        let [a, b, c] = self.tris.get(id)?.corners(pool);
        Some(triangle_cross(&a, &b, &c))
    }

    /// Bounds of the whole mesh.
    pub fn bbox(&self, pool: &Pool) -> Aabb3 {
        let mut b = Aabb3::empty();
        for t in self.tris.values() {
            for p in t.corners(pool) {
                b.include_point(&p);
            }
        }
        b
    }

    /// Longest edge of a triangle.
    pub fn longest_edge(&self, id: TriId, pool: &Pool) -> Option<Uedge> {
        let tri = self.tris.get(id)?;
        tri.uedges()
            .into_iter()
            .max_by(|a, b| edge_length(a, pool).total_cmp(&edge_length(b, pool)))
    }

    /// Tree over triangle boxes.
    pub fn build_tree(&self, pool: &Pool) -> Bvh<TriId> {
        Bvh::build(
            self.tris
                .iter()
                .map(|(id, t)| (id, Aabb3::from_points(&t.corners(pool)))),
        )
    }

    /// Split every triangle on `e` at pool point `mid`, keeping winding.
    /// Returns the new triangles.
    pub fn split_edge(&mut self, e: &Uedge, mid: usize) -> Vec<TriId> {
        let old: Vec<TriId> = self.edge_tris(e).to_vec();
        let mut out = Vec::with_capacity(old.len() * 2);
        for id in old {
            let Some(tri) = self.remove(id) else { continue };
            let Some(k) = (0..3).find(|&k| {
                let (a, b) = (tri.v[k], tri.v[(k + 1) % 3]);
                Uedge::new(a, b) == *e
            }) else {
                continue;
            };
            let (a, b, c) = (tri.v[k], tri.v[(k + 1) % 3], tri.v[(k + 2) % 3]);
            out.push(self.add([a, mid, c]));
            out.push(self.add([mid, b, c]));
        }
        out
    }
}

/// Length of an edge in model space.
pub fn edge_length(e: &Uedge, pool: &Pool) -> f64 {
    (pool.point(e.hi) - pool.point(e.lo)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> (Pool, CMesh) {
        let mut pool = Pool::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            pool.add_point(Point3::new(x, y, 0.0));
        }
        let mut m = CMesh::new();
        m.add([0, 1, 2]);
        m.add([0, 2, 3]);
        (pool, m)
    }

    #[test]
    fn test_adjacency() {
        let (_, m) = square();
        let diag = Uedge::new(2, 0);
        assert_eq!(m.edge_tris(&diag).len(), 2);
        let (t0, _) = m.iter().next().unwrap();
        assert!(m.neighbor(t0, &diag).is_some());
        assert_eq!(m.boundary_uedges().len(), 4);
        assert_eq!(m.points().len(), 4);
    }

    #[test]
    fn test_remove_updates_edges() {
        let (_, mut m) = square();
        let (t0, _) = m.iter().next().unwrap();
        m.remove(t0).unwrap();
        assert!(m.get(t0).is_none());
        assert_eq!(m.edge_tris(&Uedge::new(0, 1)).len(), 0);
        assert_eq!(m.edge_tris(&Uedge::new(0, 2)).len(), 1);
        assert!(m.remove(t0).is_none());
    }

    #[test]
    fn test_split_shared_edge_keeps_area_and_winding() {
        let (mut pool, mut m) = square();
        let mid = pool.add_point(Point3::new(0.5, 0.5, 0.0));
        let new = m.split_edge(&Uedge::new(0, 2), mid);
        assert_eq!(new.len(), 4);
        assert_eq!(m.len(), 4);
        let mut area = 0.0;
        for (id, _) in m.iter() {
            let n = m.cross(id, &pool).unwrap();
            assert!(n.z > 0.0);
            area += 0.5 * n.norm();
        }
        assert_relative_eq!(area, 1.0);
        assert!(m.edge_tris(&Uedge::new(0, 2)).is_empty());
    }

    #[test]
    fn test_longest_edge_and_tree() {
        let (pool, m) = square();
        let (t0, _) = m.iter().next().unwrap();
        assert_eq!(m.longest_edge(t0, &pool), Some(Uedge::new(0, 2)));
        let tree = m.build_tree(&pool);
        assert_eq!(tree.len(), 2);
        let hits = tree.query(&Aabb3::new(Point3::new(0.9, 0.05, 0.0), Point3::new(0.95, 0.06, 0.0)));
        assert_eq!(hits.len(), 2);
        let miss = tree.query(&Aabb3::new(Point3::new(2.0, 2.0, 0.0), Point3::new(3.0, 3.0, 0.0)));
        assert!(miss.is_empty());
    }

    #[test]
    fn test_degenerate_flags() {
        let (_, mut m) = square();
        let (t0, _) = m.iter().next().unwrap();
        m.mark_degenerate(t0);
        assert_eq!(m.degenerate(), vec![t0]);
        assert!(!m.get(t0).unwrap().is_collapsed());
        m.clear_degenerate(t0);
        assert!(m.degenerate().is_empty());
    }
}
