//! Constrained Delaunay triangulation of a polygon with holes and interior points.
//!
//! The polygon is first bridged and ear clipped, then every unconstrained
//! edge is flipped until locally Delaunay (Lawson). Interior points are
//! inserted one at a time by splitting the triangle or edge that contains
//! them, each followed by local flips.

use std::collections::{HashMap, HashSet};

use cdt_kernel_math::predicates::{incircle, orient2d, Sign};
use cdt_kernel_math::Point2;

use crate::earclip::{bridge_holes, clip_ring, oriented_ring};
use crate::{Result, TriangulateError};

/// Input to [`constrained_delaunay`]. All fields index into `points`.
#[derive(Debug, Clone, Copy)]
pub struct CdtInput<'a> {
    /// Point coordinates.
    pub points: &'a [Point2],
    /// Outer boundary, either winding.
    pub outer: &'a [usize],
    /// Hole boundaries, either winding.
    pub holes: &'a [Vec<usize>],
    /// Free interior points.
    pub interior: &'a [usize],
}

/// Output of [`constrained_delaunay`].
#[derive(Debug, Clone, Default)]
pub struct Triangulation {
    /// Counterclockwise triangles.
    pub triangles: Vec<[usize; 3]>,
    /// Interior points that were not inserted: outside the domain, on a
    /// constrained edge, or coincident with an existing vertex.
    pub skipped: Vec<usize>,
}

/// Triangulate `input`, keeping every loop segment as an edge of the result.
pub fn constrained_delaunay(input: &CdtInput<'_>) -> Result<Triangulation> {
    let points = input.points;
    let outer = oriented_ring(points, input.outer, true)?;
    let holes = input
        .holes
        .iter()
        .map(|h| oriented_ring(points, h, false))
        .collect::<Result<Vec<_>>>()?;

    let mut constrained = HashSet::new();
    for lp in std::iter::once(&outer).chain(holes.iter()) {
        for k in 0..lp.len() {
            constrained.insert(undirected(lp[k], lp[(k + 1) % lp.len()]));
        }
    }

    let ring = bridge_holes(points, outer, &holes)?;
    let triangles = clip_ring(points, ring)?;

    let mut mesh = FlipMesh::new(points, triangles, constrained);
    let mut all: Vec<(usize, usize)> = mesh.edges.keys().copied().collect();
    // Flip order decides ties between cocircular points; keep it stable.
    all.sort_unstable();
    mesh.legalize(all)?;

    let mut skipped = Vec::new();
    for &p in input.interior {
        if !mesh.insert(p)? {
            skipped.push(p);
        }
    }

    Ok(Triangulation {
        triangles: mesh.tris,
        skipped,
    })
}

fn undirected(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Triangles plus a directed-edge index, supporting flips and splits.
struct FlipMesh<'a> {
    points: &'a [Point2],
    tris: Vec<[usize; 3]>,
    edges: HashMap<(usize, usize), usize>,
    constrained: HashSet<(usize, usize)>,
}

impl<'a> FlipMesh<'a> {
    fn new(points: &'a [Point2], tris: Vec<[usize; 3]>, constrained: HashSet<(usize, usize)>) -> Self {
        let mut edges = HashMap::with_capacity(tris.len() * 3);
        for (ti, t) in tris.iter().enumerate() {
            for k in 0..3 {
                edges.insert((t[k], t[(k + 1) % 3]), ti);
            }
        }
        Self {
            points,
            tris,
            edges,
            constrained,
        }
    }

    fn set(&mut self, slot: usize, tri: [usize; 3]) {
        let old = self.tris[slot];
        for k in 0..3 {
            let e = (old[k], old[(k + 1) % 3]);
            if self.edges.get(&e) == Some(&slot) {
                self.edges.remove(&e);
            }
        }
        self.tris[slot] = tri;
        for k in 0..3 {
            self.edges.insert((tri[k], tri[(k + 1) % 3]), slot);
        }
    }

    fn push(&mut self, tri: [usize; 3]) {
        let slot = self.tris.len();
        self.tris.push(tri);
        for k in 0..3 {
            self.edges.insert((tri[k], tri[(k + 1) % 3]), slot);
        }
    }

    /// Vertex of `slot` opposite the directed edge `a -> b`.
    fn apex(&self, slot: usize, a: usize, b: usize) -> Option<usize> {
        let t = self.tris[slot];
        (0..3)
            .find(|&k| t[k] == a && t[(k + 1) % 3] == b)
            .map(|k| t[(k + 2) % 3])
    }

    /// Flip edges from `stack` until none violates the empty-circle test.
    fn legalize(&mut self, mut stack: Vec<(usize, usize)>) -> Result<()> {
        let budget = (self.tris.len() + 16).saturating_mul(self.tris.len() + 16);
        let mut flips = 0;
        while let Some((a, b)) = stack.pop() {
            if self.constrained.contains(&undirected(a, b)) {
                continue;
            }
            let (Some(&t1), Some(&t2)) = (self.edges.get(&(a, b)), self.edges.get(&(b, a))) else {
                continue;
            };
            let (Some(c), Some(d)) = (self.apex(t1, a, b), self.apex(t2, b, a)) else {
                continue;
            };
            let p = self.points;
            if incircle(&p[a], &p[b], &p[c], &p[d]) <= 0.0 {
                continue;
            }
            if orient2d(&p[c], &p[a], &p[d]) != Sign::Positive
                || orient2d(&p[d], &p[b], &p[c]) != Sign::Positive
            {
                continue;
            }
            self.set(t1, [c, a, d]);
            self.set(t2, [d, b, c]);
            flips += 1;
            if flips > budget {
                return Err(TriangulateError::FlipBudget(budget));
            }
            stack.extend([(a, d), (d, b), (b, c), (c, a)]);
        }
        Ok(())
    }

    /// Insert point `p`. Returns `false` when the point is skipped.
    fn insert(&mut self, p: usize) -> Result<bool> {
        let pts = self.points;
        let pp = &pts[p];
        let mut hit = None;
        for (slot, t) in self.tris.iter().enumerate() {
            let signs = [
                orient2d(&pts[t[0]], &pts[t[1]], pp),
                orient2d(&pts[t[1]], &pts[t[2]], pp),
                orient2d(&pts[t[2]], &pts[t[0]], pp),
            ];
            if signs.iter().all(|&s| s != Sign::Negative) {
                hit = Some((slot, signs));
                break;
            }
        }
        let Some((slot, signs)) = hit else {
            return Ok(false);
        };
        let [a, b, c] = self.tris[slot];
        let zeros: Vec<usize> = (0..3).filter(|&k| signs[k] == Sign::Zero).collect();

        match zeros.as_slice() {
            [] => {
                self.set(slot, [a, b, p]);
                self.push([b, c, p]);
                self.push([c, a, p]);
                self.legalize(vec![(a, b), (b, c), (c, a)])?;
                Ok(true)
            }
            [k] => {
                let t = self.tris[slot];
                let (ea, eb) = (t[*k], t[(*k + 1) % 3]);
                let ec = t[(*k + 2) % 3];
                if self.constrained.contains(&undirected(ea, eb)) {
                    return Ok(false);
                }
                let Some(&other) = self.edges.get(&(eb, ea)) else {
                    return Ok(false);
                };
                let Some(ed) = self.apex(other, eb, ea) else {
                    return Ok(false);
                };
                self.set(slot, [ea, p, ec]);
                self.push([p, eb, ec]);
                self.set(other, [eb, p, ed]);
                self.push([p, ea, ed]);
                self.legalize(vec![(eb, ec), (ec, ea), (ea, ed), (ed, eb)])?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
