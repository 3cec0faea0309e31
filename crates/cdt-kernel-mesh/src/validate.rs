//! Closed-manifold checks for flat triangle meshes.

use std::collections::HashMap;

use cdt_kernel_math::{triangle_cross, Point3};
use tracing::debug;

use crate::Uedge;

/// Edge and face defects found by [`validate_solid`].
///
/// An empty report means every edge is shared by exactly two triangles that
/// walk it in opposite directions and no triangle is degenerate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolidReport {
    /// Triangles with repeated corners or (near) zero area, by index.
    pub degenerate: Vec<usize>,
    /// Edges used by more than two triangles.
    pub excess: Vec<Uedge>,
    /// Edges used by a single triangle.
    pub unmatched: Vec<Uedge>,
    /// Edges whose two triangles walk it in the same direction.
    pub misoriented: Vec<Uedge>,
}

impl SolidReport {
    /// Whether no defect was found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issue_count() == 0
    }

    /// Total number of defects.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.degenerate.len() + self.excess.len() + self.unmatched.len() + self.misoriented.len()
    }
}

/// Options for solid validation.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Twice the area below which a triangle counts as degenerate, relative
    /// to its longest edge squared.
    pub degenerate_ratio: f64,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            degenerate_ratio: 1e-12,
        }
    }
}

/// Whether triangle `(a, b, c)` has (near) zero area for its size.
pub fn is_degenerate(a: &Point3, b: &Point3, c: &Point3, ratio: f64) -> bool {
    let longest = (b - a)
        .norm_squared()
        .max((c - b).norm_squared())
        .max((a - c).norm_squared());
    longest == 0.0 || triangle_cross(a, b, c).norm() <= ratio * longest
}

/// Validate a mesh given as points and corner-index triples.
pub fn validate_solid(points: &[Point3], triangles: &[[usize; 3]], options: &ValidationOptions) -> SolidReport {
    let mut report = SolidReport::default();
    // Per edge: (uses walking lo -> hi, uses walking hi -> lo).
    let mut uses: HashMap<Uedge, (usize, usize)> = HashMap::new();

    for (i, t) in triangles.iter().enumerate() {
        let collapsed = t[0] == t[1] || t[1] == t[2] || t[2] == t[0];
        if collapsed || is_degenerate(&points[t[0]], &points[t[1]], &points[t[2]], options.degenerate_ratio) {
            report.degenerate.push(i);
        }
        for k in 0..3 {
            let (a, b) = (t[k], t[(k + 1) % 3]);
            if a == b {
                continue;
            }
            let entry = uses.entry(Uedge::new(a, b)).or_default();
            if a < b {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }

    for (e, (fwd, back)) in uses {
        match fwd + back {
            1 => report.unmatched.push(e),
            2 if fwd != 1 => report.misoriented.push(e),
            2 => {}
            _ => report.excess.push(e),
        }
    }
    report.excess.sort_unstable();
    report.unmatched.sort_unstable();
    report.misoriented.sort_unstable();

    debug!(
        triangles = triangles.len(),
        degenerate = report.degenerate.len(),
        excess = report.excess.len(),
        unmatched = report.unmatched.len(),
        misoriented = report.misoriented.len(),
        "validated solid mesh"
    );
    report
}
