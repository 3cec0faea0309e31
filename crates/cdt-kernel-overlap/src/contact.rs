//! Triangle-triangle contact classification.
//!
//! Plane sides are decided with exact `orient3d`; the contact set is then
//! built from edge/plane crossings in both directions, and its extent
//! decides whether the pair only touches or truly interpenetrates.

use cdt_kernel_math::predicates::{orient3d, Sign};
use cdt_kernel_math::{point_segment_distance, triangle_cross, Point3};

/// How two triangles from different objects meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Contact {
    /// No common point.
    Disjoint,
    /// They meet in a single point.
    Vertex,
    /// The common set lies along an edge of one of them.
    Edge,
    /// Both lie in one plane.
    Coplanar,
    /// A crossing segment through the interior of both.
    Overlap,
}

impl Contact {
    /// Whether refinement should act on this contact.
    pub fn is_actionable(self) -> bool {
        self == Contact::Overlap
    }
}

/// Per-kind contact counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactCounts {
    /// Single-point touches.
    pub vertex: usize,
    /// Touches along an edge.
    pub edge: usize,
    /// Coplanar pairs.
    pub coplanar: usize,
    /// Interpenetrating pairs.
    pub overlap: usize,
}

impl ContactCounts {
    /// Count one classified pair; disjoint pairs are not counted.
    pub fn record(&mut self, contact: Contact) {
        match contact {
            Contact::Disjoint => {}
            Contact::Vertex => self.vertex += 1,
            Contact::Edge => self.edge += 1,
            Contact::Coplanar => self.coplanar += 1,
            Contact::Overlap => self.overlap += 1,
        }
    }
}

/// Classify the contact between triangles `a` and `b`.
///
/// `tolerance` scales the shortest edge of the smaller triangle into the
/// distance under which contact points merge or count as lying on an edge.
pub fn classify(a: &[Point3; 3], b: &[Point3; 3], tolerance: f64) -> Contact {
    let sb = b.map(|p| orient3d(&a[0], &a[1], &a[2], &p));
    if strictly_one_side(&sb) {
        return Contact::Disjoint;
    }
    let sa = a.map(|p| orient3d(&b[0], &b[1], &b[2], &p));
    if strictly_one_side(&sa) {
        return Contact::Disjoint;
    }
    if sb.iter().all(|s| *s == Sign::Zero) {
        return Contact::Coplanar;
    }

    let tol = tolerance * shortest_edge(smaller(a, b));
    let mut points = Vec::with_capacity(6);
    crossings(a, &sa, b, tol, &mut points);
    crossings(b, &sb, a, tol, &mut points);
    dedupe(&mut points, tol);

    if points.is_empty() {
        return Contact::Disjoint;
    }
    if spread(&points) <= tol {
        return Contact::Vertex;
    }
    if along_an_edge(&points, a, tol) || along_an_edge(&points, b, tol) {
        return Contact::Edge;
    }
    Contact::Overlap
}

fn strictly_one_side(signs: &[Sign; 3]) -> bool {
    signs.iter().all(|s| *s == Sign::Positive) || signs.iter().all(|s| *s == Sign::Negative)
}

fn area2(t: &[Point3; 3]) -> f64 {
    triangle_cross(&t[0], &t[1], &t[2]).norm()
}

fn smaller<'a>(a: &'a [Point3; 3], b: &'a [Point3; 3]) -> &'a [Point3; 3] {
    if area2(a) <= area2(b) {
        a
    } else {
        b
    }
}

fn shortest_edge(t: &[Point3; 3]) -> f64 {
    (0..3)
        .map(|k| (t[(k + 1) % 3] - t[k]).norm())
        .fold(f64::INFINITY, f64::min)
}

/// Points where edges of `t` meet the plane of `other` inside `other`.
/// `signs` are the sides of `t`'s corners relative to that plane.
fn crossings(t: &[Point3; 3], signs: &[Sign; 3], other: &[Point3; 3], tol: f64, out: &mut Vec<Point3>) {
    let n = triangle_cross(&other[0], &other[1], &other[2]);
    let dist = |p: &Point3| n.dot(&(p - other[0]));
    for i in 0..3 {
        let j = (i + 1) % 3;
        let hit = match (signs[i], signs[j]) {
            (Sign::Zero, _) => Some(t[i]),
            (Sign::Positive, Sign::Negative) | (Sign::Negative, Sign::Positive) => {
                let (di, dj) = (dist(&t[i]), dist(&t[j]));
                let s = di / (di - dj);
                Some(t[i] + (t[j] - t[i]) * s)
            }
            _ => None,
        };
        if let Some(p) = hit.filter(|p| inside(other, p, tol)) {
            out.push(p);
        }
    }
}

/// Whether `p`, assumed to lie in the plane of `t`, is inside `t` or within
/// `tol` of it.
fn inside(t: &[Point3; 3], p: &Point3, tol: f64) -> bool {
    let n = triangle_cross(&t[0], &t[1], &t[2]);
    let nn = n.norm();
    if nn == 0.0 {
        return false;
    }
    (0..3).all(|k| {
        let edge = t[(k + 1) % 3] - t[k];
        let len = edge.norm();
        len > 0.0 && edge.cross(&(p - t[k])).dot(&n) / (nn * len) >= -tol
    })
}

fn dedupe(points: &mut Vec<Point3>, tol: f64) {
    let mut kept: Vec<Point3> = Vec::with_capacity(points.len());
    for p in points.drain(..) {
        if kept.iter().all(|q| (p - q).norm() > tol) {
            kept.push(p);
        }
    }
    *points = kept;
}

fn spread(points: &[Point3]) -> f64 {
    let mut worst: f64 = 0.0;
    for (i, p) in points.iter().enumerate() {
        for q in &points[i + 1..] {
            worst = worst.max((p - q).norm());
        }
    }
    worst
}

fn along_an_edge(points: &[Point3], t: &[Point3; 3], tol: f64) -> bool {
    (0..3).any(|k| {
        let (a, b) = (t[k], t[(k + 1) % 3]);
        points.iter().all(|p| point_segment_distance(p, &a, &b) <= tol)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-6;

    fn tri(p: [[f64; 3]; 3]) -> [Point3; 3] {
        p.map(|[x, y, z]| Point3::new(x, y, z))
    }

    fn floor() -> [Point3; 3] {
        tri([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]])
    }

    #[test]
    fn test_separated_planes() {
        let b = tri([[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 2.0]]);
        assert_eq!(classify(&floor(), &b, TOL), Contact::Disjoint);
    }

    #[test]
    fn test_plane_crossing_outside_triangle() {
        // Pierces the floor's plane at x = 5, far from the floor triangle.
        let b = tri([[5.0, 0.0, -1.0], [5.0, 1.0, -1.0], [5.0, 0.5, 1.0]]);
        assert_eq!(classify(&floor(), &b, TOL), Contact::Disjoint);
    }

    #[test]
    fn test_piercing_is_overlap() {
        let b = tri([[0.5, 0.5, -1.0], [0.5, 1.0, 1.0], [0.5, 0.2, 1.0]]);
        let c = classify(&floor(), &b, TOL);
        assert_eq!(c, Contact::Overlap);
        assert!(c.is_actionable());
    }

    #[test]
    fn test_corner_touch() {
        let b = tri([[0.5, 0.5, 0.0], [0.5, 1.0, 1.0], [1.0, 0.5, 1.0]]);
        assert_eq!(classify(&floor(), &b, TOL), Contact::Vertex);
    }

    #[test]
    fn test_edge_resting_on_face() {
        // Wall standing on the floor: the common set is its own bottom edge.
        let b = tri([[0.2, 0.2, 0.0], [1.0, 0.2, 0.0], [0.6, 0.2, 1.0]]);
        let c = classify(&floor(), &b, TOL);
        assert_eq!(c, Contact::Edge);
        assert!(!c.is_actionable());
    }

    #[test]
    fn test_shared_hinge_edge() {
        // Two faces of a convex corner meeting along x axis.
        let b = tri([[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 2.0]]);
        assert_eq!(classify(&floor(), &b, TOL), Contact::Edge);
    }

    #[test]
    fn test_coplanar() {
        let b = tri([[0.5, 0.5, 0.0], [3.0, 0.5, 0.0], [0.5, 3.0, 0.0]]);
        assert_eq!(classify(&floor(), &b, TOL), Contact::Coplanar);
    }

    #[test]
    fn test_near_touch_within_tolerance_is_edge() {
        let b = tri([[0.2, 0.2, -1e-9], [1.0, 0.2, -1e-9], [0.6, 0.2, 1.0]]);
        assert_eq!(classify(&floor(), &b, 1e-6), Contact::Edge);
    }

    #[test]
    fn test_counts() {
        let mut counts = ContactCounts::default();
        for c in [Contact::Disjoint, Contact::Overlap, Contact::Edge, Contact::Overlap] {
            counts.record(c);
        }
        assert_eq!(counts.overlap, 2);
        assert_eq!(counts.edge, 1);
        assert_eq!(counts.vertex + counts.coplanar, 0);
    }
}
