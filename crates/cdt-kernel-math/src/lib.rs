#![warn(missing_docs)]

//! Math types for the CDT tessellation kernel.
//!
//! Thin wrappers around nalgebra providing the point, vector, and transform
//! types shared by every kernel crate, plus tolerance constants, axis-aligned
//! bounding boxes, and exact orientation predicates.

pub mod bbox;
pub mod predicates;

pub use bbox::{Aabb2, Aabb3};

use nalgebra::{Matrix3, Matrix4, Unit, Vector2, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 4x4 affine transformation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Uniform scale by `s` about the origin.
    pub fn uniform_scale(s: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 0)] = s;
        m[(1, 1)] = s;
        m[(2, 2)] = s;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Compose: `self` then `other` (self * other).
    pub fn then(&self, other: &Transform) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Transform a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }

    /// Transform a direction vector (ignores translation).
    pub fn apply_vec(&self, v: &Vec3) -> Vec3 {
        let r = self.matrix * Vector4::new(v.x, v.y, v.z, 0.0);
        Vec3::new(r.x, r.y, r.z)
    }

    /// Whether the linear part is orthonormal (rotation plus translation).
    pub fn is_rigid(&self) -> bool {
        let m = self.matrix.fixed_view::<3, 3>(0, 0);
        let gram = m.transpose() * m;
        (gram - Matrix3::identity()).amax() < 1e-9
    }

    /// Inverse of this transform, if it exists.
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|matrix| Self { matrix })
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Un-normalized normal of triangle `(a, b, c)`; its length is twice the area.
pub fn triangle_cross(a: &Point3, b: &Point3, c: &Point3) -> Vec3 {
    (b - a).cross(&(c - a))
}

/// Area of triangle `(a, b, c)`.
pub fn triangle_area(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    0.5 * triangle_cross(a, b, c).norm()
}

/// Signed area of a closed 2D polygon (positive when counterclockwise).
pub fn polygon_area_2d(pts: &[Point2]) -> f64 {
    let n = pts.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += pts[i].x * pts[j].y - pts[j].x * pts[i].y;
    }
    area / 2.0
}

/// Distance from `p` to the segment `a`-`b` in 2D.
pub fn point_segment_distance_2d(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < 1e-300 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + t * ab)).norm()
}

/// Distance from `p` to the segment `a`-`b` in 3D.
pub fn point_segment_distance(p: &Point3, a: &Point3, b: &Point3) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < 1e-300 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + t * ab)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let p = Point3::new(1.0, 2.0, 3.0);
        let result = t.apply_point(&p);
        assert_relative_eq!(result.x, 11.0);
        assert_relative_eq!(result.y, 22.0);
        assert_relative_eq!(result.z, 33.0);
    }

    #[test]
    fn test_translation_ignores_vectors() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let v = t.apply_vec(&Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(v.x, 1.0);
        assert_relative_eq!(v.y, 0.0);
    }

    #[test]
    fn test_rotation_z_90() {
        let t = Transform::rotation_z(PI / 2.0);
        let result = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert_relative_eq!(result.y, 1.0);
    }

    #[test]
    fn test_compose_and_inverse() {
        let t = Transform::translation(1.0, 0.0, 0.0).then(&Transform::uniform_scale(2.0));
        let p = t.apply_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p.x, 3.0);
        let back = t.inverse().unwrap().apply_point(&p);
        assert_relative_eq!(back.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(back.z, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rigidity() {
        assert!(Transform::rotation_z(0.3).then(&Transform::translation(1.0, 2.0, 3.0)).is_rigid());
        assert!(!Transform::uniform_scale(2.0).is_rigid());
    }

    #[test]
    fn test_polygon_area_orientation() {
        let ccw = [
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        assert_relative_eq!(polygon_area_2d(&ccw), 2.0);
        let cw: Vec<Point2> = ccw.iter().rev().copied().collect();
        assert_relative_eq!(polygon_area_2d(&cw), -2.0);
    }

    #[test]
    fn test_segment_distance() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(10.0, 0.0);
        assert_relative_eq!(point_segment_distance_2d(&Point2::new(5.0, 3.0), &a, &b), 3.0);
        assert_relative_eq!(point_segment_distance_2d(&Point2::new(-4.0, 3.0), &a, &b), 5.0);
        let d = point_segment_distance(
            &Point3::new(5.0, 0.0, 2.0),
            &Point3::origin(),
            &Point3::new(10.0, 0.0, 0.0),
        );
        assert_relative_eq!(d, 2.0);
    }

    #[test]
    fn test_triangle_area() {
        let a = triangle_area(
            &Point3::origin(),
            &Point3::new(1.0, 0.0, 0.0),
            &Point3::new(0.0, 1.0, 0.0),
        );
        assert_relative_eq!(a, 0.5);
    }
}
