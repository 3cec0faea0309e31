//! Point and normal arenas.

use cdt_kernel_math::{Point3, Vec3};

/// Process-owned arenas of 3D points and unit normals.
///
/// Indices are stable: entries are appended, never moved or removed.
#[derive(Debug, Clone, Default)]
pub struct Pool {
    /// Points, addressed by index.
    pub points: Vec<Point3>,
    /// Normals, addressed by index.
    pub normals: Vec<Vec3>,
}

impl Pool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point and return its index.
    pub fn add_point(&mut self, p: Point3) -> usize {
        self.points.push(p);
        self.points.len() - 1
    }

    /// Append a normal and return its index.
    pub fn add_normal(&mut self, n: Vec3) -> usize {
        self.normals.push(n);
        self.normals.len() - 1
    }

    /// Point at `i`.
    pub fn point(&self, i: usize) -> Point3 {
        self.points[i]
    }

    /// Normal at `i`.
    pub fn normal(&self, i: usize) -> Vec3 {
        self.normals[i]
    }

    /// Number of points.
    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Move every entry of `staged` to the end of this pool. Returns the
    /// offsets to add to staged point and normal indices.
    pub fn append(&mut self, staged: Pool) -> (usize, usize) {
        let offsets = (self.points.len(), self.normals.len());
        self.points.extend(staged.points);
        self.normals.extend(staged.normals);
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_offsets() {
        let mut pool = Pool::new();
        pool.add_point(Point3::origin());
        let mut staged = Pool::new();
        let local = staged.add_point(Point3::new(1.0, 2.0, 3.0));
        staged.add_normal(Vec3::z());
        let (po, no) = pool.append(staged);
        assert_eq!(po, 1);
        assert_eq!(no, 0);
        assert_eq!(pool.point(po + local), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(pool.normal(no), Vec3::z());
    }
}
