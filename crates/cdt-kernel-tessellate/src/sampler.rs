//! Edge sampling.
//!
//! Every edge is sampled once, in its own curve parameter, and the samples
//! are shared by both faces that use it. Each sample carries the `(u, v)` of
//! both trims and one pool point, so the two faces meet on identical
//! vertices no matter how their interiors are triangulated.

use cdt_kernel_brep::{Brep, EdgeId, FaceId, VertexId};
use cdt_kernel_geom::{CurveKind, SurfaceKind};
use cdt_kernel_math::{point_segment_distance, Aabb2, Point2, Vec3};
use cdt_kernel_mesh::Pool;
use slotmap::SecondaryMap;

use crate::{Result, TessError, TessellationParams};

/// One sample on an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSample {
    /// Edge the sample lies on.
    pub edge: EdgeId,
    /// Curve parameter.
    pub t: f64,
    /// Pool point.
    pub point: usize,
    /// Parameter-space position in each trim, in `Edge::trims` order.
    pub trim_uv: [Point2; 2],
    /// Outward pool normal in each trim's face, when the surface defines one.
    pub normals: [Option<usize>; 2],
}

/// Length bounds for the segments of one edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentLengths {
    /// Segments longer than this are split.
    pub max: f64,
    /// Segments shorter than this are never split.
    pub min: f64,
}

/// Outward unit normal of `face` at `uv`, honoring the face's reversed flag.
pub(crate) fn outward_normal(brep: &Brep, face: FaceId, uv: Point2) -> Option<Vec3> {
    let n = brep.face_surface(face).normal(uv)?.into_inner();
    Some(if brep.faces[face].reversed { -n } else { n })
}

/// Bounds of every trim of `face` in parameter space.
pub(crate) fn face_uv_bounds(brep: &Brep, face: FaceId) -> Aabb2 {
    const STEPS: usize = 8;
    let mut bounds = Aabb2::empty();
    for lp in brep.face_loops(face) {
        for &trim in &brep.loops[lp].trims {
            let (d0, d1) = brep.trim_domain(trim);
            for i in 0..=STEPS {
                let t = d0 + (d1 - d0) * i as f64 / STEPS as f64;
                bounds.include_point(&brep.trim_uv(trim, t));
            }
        }
    }
    bounds
}

/// Estimate the model-space area of a face by integrating `|Su × Sv|` on a
/// coarse grid over its trimmed parameter bounds.
pub fn face_area(brep: &Brep, face: FaceId) -> f64 {
    const GRID: usize = 8;
    let bounds = face_uv_bounds(brep, face);
    if bounds.is_empty() {
        return 0.0;
    }
    let surface = brep.face_surface(face);
    let (du, dv) = (bounds.width() / GRID as f64, bounds.height() / GRID as f64);
    let mut area = 0.0;
    for i in 0..GRID {
        for j in 0..GRID {
            let uv = Point2::new(
                bounds.min.x + (i as f64 + 0.5) * du,
                bounds.min.y + (j as f64 + 0.5) * dv,
            );
            area += surface.d_du(uv).cross(&surface.d_dv(uv)).norm() * du * dv;
        }
    }
    area
}

/// Segment length bounds for `edge`: the smaller adjacent face wins.
pub fn segment_lengths(
    brep: &Brep,
    edge: EdgeId,
    areas: &SecondaryMap<FaceId, f64>,
    params: &TessellationParams,
) -> SegmentLengths {
    let max = brep
        .edge_faces(edge)
        .into_iter()
        .filter_map(|f| areas.get(f))
        .map(|a| a.sqrt() / params.length_divisor)
        .fold(f64::INFINITY, f64::min);
    SegmentLengths {
        max,
        min: max * params.min_length_fraction,
    }
}

/// Check that `edge` is used by exactly two trims.
pub(crate) fn check_manifold(brep: &Brep, edge: EdgeId) -> Result<()> {
    let trims = brep.edges[edge].trims.len();
    if trims == 2 {
        Ok(())
    } else {
        Err(TessError::NonManifoldEdge { edge, trims })
    }
}

/// Curve parameters of the samples of `edge`, first and last included.
///
/// Deterministic: depends only on the edge geometry and `lengths`. Line edges
/// between two planar faces are never split by length.
pub fn edge_parameters(
    brep: &Brep,
    edge: EdgeId,
    lengths: SegmentLengths,
    params: &TessellationParams,
) -> Vec<f64> {
    let e = &brep.edges[edge];
    let curve = brep.curves[e.curve].as_ref();
    let planar = brep
        .edge_faces(edge)
        .into_iter()
        .all(|f| brep.face_surface(f).surface_type() == SurfaceKind::Plane);
    let split_by_length = !(planar && curve.curve_type() == CurveKind::Line);

    let (t0, t1) = e.domain;
    let initial = if e.is_closed() {
        params.closed_edge_segments
    } else {
        1
    };

    let needs_split = |ta: f64, tb: f64| -> bool {
        let (pa, pb) = (curve.evaluate(ta), curve.evaluate(tb));
        let chord = (pb - pa).norm();
        if chord <= lengths.min {
            return false;
        }
        if split_by_length && chord > lengths.max {
            return true;
        }
        let mid = curve.evaluate(0.5 * (ta + tb));
        if point_segment_distance(&mid, &pa, &pb) > params.chord_fraction * chord {
            return true;
        }
        let (ua, ub) = (curve.tangent(ta), curve.tangent(tb));
        ua.norm() > 0.0 && ub.norm() > 0.0 && ua.angle(&ub) > params.max_turn
    };

    let mut out = vec![t0];
    for k in 0..initial {
        let ta = t0 + (t1 - t0) * k as f64 / initial as f64;
        let tb = if k + 1 == initial {
            t1
        } else {
            t0 + (t1 - t0) * (k + 1) as f64 / initial as f64
        };
        subdivide(ta, tb, 0, params.max_depth, &needs_split, &mut out);
    }
    out
}

fn subdivide(
    ta: f64,
    tb: f64,
    depth: u32,
    max_depth: u32,
    needs_split: &impl Fn(f64, f64) -> bool,
    out: &mut Vec<f64>,
) {
    if depth < max_depth && needs_split(ta, tb) {
        let mid = 0.5 * (ta + tb);
        subdivide(ta, mid, depth + 1, max_depth, needs_split, out);
        subdivide(mid, tb, depth + 1, max_depth, needs_split, out);
    } else {
        out.push(tb);
    }
}

/// Sample `edge` and add its interior points and trim normals to `pool`.
///
/// The first and last samples reuse the pool points of the edge's vertices.
pub fn sample_edge(
    brep: &Brep,
    edge: EdgeId,
    lengths: SegmentLengths,
    params: &TessellationParams,
    vertex_points: &SecondaryMap<VertexId, usize>,
    pool: &mut Pool,
) -> Result<Vec<EdgeSample>> {
    check_manifold(brep, edge)?;
    let e = &brep.edges[edge];
    let trims = [e.trims[0], e.trims[1]];
    let ts = edge_parameters(brep, edge, lengths, params);
    let last = ts.len() - 1;

    let vertex_point = |v: VertexId| {
        vertex_points
            .get(v)
            .copied()
            .ok_or_else(|| TessError::InvalidArguments(format!("vertex {v:?} has no pool point")))
    };

    let mut samples = Vec::with_capacity(ts.len());
    for (i, &t) in ts.iter().enumerate() {
        let point = if i == 0 {
            vertex_point(e.start)?
        } else if i == last {
            vertex_point(e.end)?
        } else {
            pool.add_point(brep.edge_point(edge, t))
        };
        let trim_uv = trims.map(|tr| brep.trim_uv(tr, t));
        let mut normals = [None, None];
        for k in 0..2 {
            let face = brep.trims[trims[k]].face;
            normals[k] = outward_normal(brep, face, trim_uv[k]).map(|n| pool.add_normal(n));
        }
        samples.push(EdgeSample {
            edge,
            t,
            point,
            trim_uv,
            normals,
        });
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cdt_kernel_brep::{make_cube, make_cylinder, make_sphere};
    use cdt_kernel_math::Point3;
    use std::f64::consts::PI;

    fn areas(brep: &Brep) -> SecondaryMap<FaceId, f64> {
        brep.faces.keys().map(|f| (f, face_area(brep, f))).collect()
    }

    #[test]
    fn test_face_area_estimates() {
        let cube = make_cube(2.0, 3.0, 4.0).unwrap();
        let total: f64 = cube.faces.keys().map(|f| face_area(&cube, f)).sum();
        assert_relative_eq!(total, 2.0 * (6.0 + 8.0 + 12.0), epsilon = 1e-9);

        let sphere = make_sphere(Point3::origin(), 1.0).unwrap();
        let f = sphere.faces.keys().next().unwrap();
        // Midpoint rule on an 8x8 grid is within a few percent.
        assert_relative_eq!(face_area(&sphere, f), 4.0 * PI, max_relative = 0.05);
    }

    #[test]
    fn test_planar_line_edges_are_not_split() {
        let cube = make_cube(10.0, 10.0, 10.0).unwrap();
        let a = areas(&cube);
        let params = TessellationParams::default();
        for edge in cube.edges.keys() {
            let lengths = segment_lengths(&cube, edge, &a, &params);
            assert_relative_eq!(lengths.max, 1.0, epsilon = 1e-9);
            assert_eq!(edge_parameters(&cube, edge, lengths, &params).len(), 2);
        }
    }

    #[test]
    fn test_circle_sampling_is_bounded_and_deterministic() {
        let cyl = make_cylinder(1.0, 1.0).unwrap();
        let a = areas(&cyl);
        let params = TessellationParams::default();
        for edge in cyl.edges.keys() {
            let lengths = segment_lengths(&cyl, edge, &a, &params);
            let ts = edge_parameters(&cyl, edge, lengths, &params);
            assert_eq!(ts, edge_parameters(&cyl, edge, lengths, &params));
            assert!(ts.windows(2).all(|w| w[0] < w[1]));
            for w in ts.windows(2) {
                let chord = (cyl.edge_point(edge, w[1]) - cyl.edge_point(edge, w[0])).norm();
                assert!(chord <= lengths.max + 1e-12);
            }
            if cyl.edges[edge].is_closed() {
                assert!(ts.len() - 1 >= params.closed_edge_segments);
            }
        }
    }

    #[test]
    fn test_samples_share_vertices_and_match_trims() {
        let cyl = make_cylinder(1.0, 2.0).unwrap();
        let a = areas(&cyl);
        let params = TessellationParams::default();
        let mut pool = Pool::new();
        let vertex_points: SecondaryMap<VertexId, usize> = cyl
            .vertices
            .iter()
            .map(|(id, v)| (id, pool.add_point(v.point)))
            .collect();
        for edge in cyl.edges.keys() {
            let lengths = segment_lengths(&cyl, edge, &a, &params);
            let samples = sample_edge(&cyl, edge, lengths, &params, &vertex_points, &mut pool).unwrap();
            let e = &cyl.edges[edge];
            assert_eq!(samples[0].point, vertex_points[e.start]);
            assert_eq!(samples.last().unwrap().point, vertex_points[e.end]);
            for s in &samples {
                let p = pool.point(s.point);
                for k in 0..2 {
                    let face = cyl.trims[e.trims[k]].face;
                    let on_surface = cyl.face_surface(face).evaluate(s.trim_uv[k]);
                    assert_relative_eq!(p, on_surface, epsilon = 1e-9);
                    assert!(s.normals[k].is_some());
                }
            }
        }
    }
}
