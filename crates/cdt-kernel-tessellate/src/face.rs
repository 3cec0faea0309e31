//! Per-face tessellation.
//!
//! A face is triangulated in its own parameter space: the trim loops come
//! from the shared edge samples, interior points come from a grid filtered
//! against the trims, and the constrained Delaunay triangulator joins them.
//! New points and normals go to a face-local staging pool so faces can run
//! in parallel; the assembler merges the stages afterwards.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use cdt_kernel_brep::{Brep, EdgeId, FaceId, LoopId, TrimId, VertexId};
use cdt_kernel_geom::{Surface, SurfaceKind};
use cdt_kernel_math::{point_segment_distance_2d, polygon_area_2d, Aabb2, Point2};
use cdt_kernel_mesh::{Bvh, Pool};
use cdt_kernel_triangulate::{constrained_delaunay, CdtInput};
use slotmap::SecondaryMap;
use tracing::debug;

use crate::sampler::{outward_normal, EdgeSample};
use crate::{Result, TessError, TessellationParams};

/// Grid columns across a closed direction. With fewer, one interior column
/// can reach both copies of the seam.
const MIN_CLOSED_DIVISIONS: usize = 4;

/// Re-triangulation passes spent removing edges that wrap the seam.
const SEAM_PASSES: usize = 4;

/// How the parameter space of a surface closes on itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceTopology {
    /// No periodic direction: repeated pool points along a loop are noise.
    Open,
    /// Closed in `u` or `v`: the same pool point legitimately appears at
    /// both ends of the period.
    Periodic,
}

impl SurfaceTopology {
    /// Classify a surface.
    pub fn of(surface: &dyn Surface) -> Self {
        if surface.is_closed_u() || surface.is_closed_v() {
            SurfaceTopology::Periodic
        } else {
            SurfaceTopology::Open
        }
    }
}

/// Index into either the shared pool or a face's staging pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum PoolRef {
    Shared(usize),
    Staged(usize),
}

impl PoolRef {
    pub(crate) fn resolve(self, staged_offset: usize) -> usize {
        match self {
            PoolRef::Shared(i) => i,
            PoolRef::Staged(i) => staged_offset + i,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LoopPoint {
    uv: Point2,
    point: usize,
    normal: Option<PoolRef>,
    trim: TrimId,
    edge: Option<EdgeId>,
    singular: bool,
}

/// Read-only context shared by every face job.
pub(crate) struct FaceInput<'a> {
    pub brep: &'a Brep,
    pub samples: &'a SecondaryMap<EdgeId, Vec<EdgeSample>>,
    pub vertex_points: &'a SecondaryMap<VertexId, usize>,
    pub areas: &'a SecondaryMap<FaceId, f64>,
    pub params: &'a TessellationParams,
}

/// Result of tessellating one face, before merging into the shared pool.
#[derive(Debug)]
pub(crate) struct FaceOutput {
    pub face: FaceId,
    /// Parameter-space points, loops first then used interior points.
    pub uv: Vec<Point2>,
    pub points: Vec<PoolRef>,
    pub normals: Vec<Option<PoolRef>>,
    /// Trim and edge of loop points; `None` for interior points.
    pub sources: Vec<Option<(TrimId, Option<EdgeId>)>>,
    /// Counterclockwise in `(u, v)`.
    pub triangles: Vec<[usize; 3]>,
    pub staged: Pool,
}

/// Tessellate one face.
pub(crate) fn tessellate_face(input: &FaceInput<'_>, face: FaceId) -> Result<FaceOutput> {
    let brep = input.brep;
    let surface = brep.face_surface(face);
    let topology = SurfaceTopology::of(surface);
    let mut staged = Pool::new();

    let outer_err = |reason: &str| TessError::OuterLoop {
        face,
        reason: reason.to_string(),
    };
    let outer_id = brep.faces[face]
        .outer_loop
        .ok_or_else(|| outer_err("face has no outer loop"))?;
    let mut outer = loop_points(input, face, outer_id, topology, &mut staged)?;
    if outer.len() < 3 {
        return Err(outer_err("fewer than three distinct points"));
    }
    let outer_uv: Vec<Point2> = outer.iter().map(|p| p.uv).collect();
    let area = polygon_area_2d(&outer_uv);
    let bounds = Aabb2::from_points(&outer_uv);
    let scale = bounds.width().powi(2) + bounds.height().powi(2);
    if !(area.abs() > 1e-14 * scale) {
        return Err(outer_err("outer loop encloses no area"));
    }
    if area < 0.0 {
        outer.reverse();
    }

    let mut loops = vec![outer];
    for &lp in &brep.faces[face].inner_loops {
        let mut hole = loop_points(input, face, lp, topology, &mut staged)?;
        if hole.len() < 3 {
            debug!(?face, ?lp, "skipping hole with fewer than three points");
            continue;
        }
        let uv: Vec<Point2> = hole.iter().map(|p| p.uv).collect();
        if polygon_area_2d(&uv) > 0.0 {
            hole.reverse();
        }
        loops.push(hole);
    }

    let mut uv: Vec<Point2> = Vec::new();
    let mut ranges = Vec::with_capacity(loops.len());
    for lp in &loops {
        let start = uv.len();
        uv.extend(lp.iter().map(|p| p.uv));
        ranges.push((start..uv.len()).collect::<Vec<usize>>());
    }
    let n_loop = uv.len();

    let loop_uv: Vec<Vec<Point2>> = loops
        .iter()
        .map(|lp| lp.iter().map(|p| p.uv).collect())
        .collect();
    let max_len = input
        .areas
        .get(face)
        .map_or(f64::INFINITY, |a| a.sqrt() / input.params.length_divisor);
    let mut grid = interior_points(surface, &loop_uv, max_len, input.params);

    let loop_keys: Vec<PoolRef> = loops.iter().flatten().map(|p| PoolRef::Shared(p.point)).collect();
    let boundary: HashSet<(usize, usize)> = ranges
        .iter()
        .flat_map(|r| (0..r.len()).map(move |k| ordered(r[k], r[(k + 1) % r.len()])))
        .collect();
    let mut pass = 0;
    let cdt = loop {
        uv.truncate(n_loop);
        uv.extend_from_slice(&grid);
        let interior: Vec<usize> = (n_loop..uv.len()).collect();
        let cdt = constrained_delaunay(&CdtInput {
            points: &uv,
            outer: &ranges[0],
            holes: &ranges[1..],
            interior: &interior,
        })
        .map_err(|source| TessError::Triangulate { face, source })?;
        if topology == SurfaceTopology::Open || pass == SEAM_PASSES {
            break cdt;
        }
        let keys: Vec<PoolRef> = loop_keys
            .iter()
            .copied()
            .chain((n_loop..uv.len()).map(PoolRef::Staged))
            .collect();
        let wrapped = wrapped_edges(&cdt.triangles, &keys, &boundary);
        if wrapped.is_empty() {
            break cdt;
        }
        debug!(?face, edges = wrapped.len(), pass, "splitting edges that wrap the seam");
        grid.extend(wrapped.iter().map(|&(a, b)| uv[a] + (uv[b] - uv[a]) * 0.5));
        pass += 1;
    };
    let interior: Vec<usize> = (n_loop..uv.len()).collect();
    if !cdt.skipped.is_empty() {
        debug!(?face, skipped = cdt.skipped.len(), "interior points not inserted");
    }

    // Keep loop points and the interior points the triangulation used.
    let used: HashSet<usize> = cdt.triangles.iter().flatten().copied().collect();
    let mut remap = vec![usize::MAX; uv.len()];
    let mut out = FaceOutput {
        face,
        uv: Vec::with_capacity(uv.len()),
        points: Vec::with_capacity(uv.len()),
        normals: Vec::with_capacity(uv.len()),
        sources: Vec::with_capacity(uv.len()),
        triangles: Vec::with_capacity(cdt.triangles.len()),
        staged: Pool::new(),
    };
    for p in loops.iter().flatten() {
        remap[out.uv.len()] = out.uv.len();
        out.uv.push(p.uv);
        out.points.push(PoolRef::Shared(p.point));
        out.normals.push(p.normal);
        out.sources.push(Some((p.trim, p.edge)));
    }
    for &i in &interior {
        if !used.contains(&i) {
            continue;
        }
        remap[i] = out.uv.len();
        let p = uv[i];
        out.uv.push(p);
        out.points
            .push(PoolRef::Staged(staged.add_point(surface.evaluate(p))));
        out.normals.push(
            outward_normal(brep, face, p).map(|n| PoolRef::Staged(staged.add_normal(n))),
        );
        out.sources.push(None);
    }
    out.triangles = cdt
        .triangles
        .iter()
        .map(|t| t.map(|i| remap[i]))
        .collect();
    out.staged = staged;
    Ok(out)
}

/// Walk the trims of a loop and collect its points, dropping each trim's
/// last point (the next trim starts there).
fn loop_points(
    input: &FaceInput<'_>,
    face: FaceId,
    lp: LoopId,
    topology: SurfaceTopology,
    staged: &mut Pool,
) -> Result<Vec<LoopPoint>> {
    let brep = input.brep;
    let mut out: Vec<LoopPoint> = Vec::new();
    for &trim_id in &brep.loops[lp].trims {
        let trim = &brep.trims[trim_id];
        match trim.edge {
            Some(edge) => {
                let samples = input.samples.get(edge).ok_or_else(|| {
                    TessError::InvalidArguments(format!("edge {edge:?} was not sampled"))
                })?;
                let k = brep.edges[edge]
                    .trims
                    .iter()
                    .position(|&t| t == trim_id)
                    .ok_or_else(|| {
                        TessError::InvalidArguments(format!("trim {trim_id:?} not on its edge"))
                    })?;
                let n = samples.len();
                let order: Vec<usize> = if trim.reversed {
                    (1..n).rev().collect()
                } else {
                    (0..n.saturating_sub(1)).collect()
                };
                out.extend(order.into_iter().map(|i| {
                    let s = &samples[i];
                    LoopPoint {
                        uv: s.trim_uv[k],
                        point: s.point,
                        normal: s.normals[k].map(PoolRef::Shared),
                        trim: trim_id,
                        edge: Some(edge),
                        singular: false,
                    }
                }));
            }
            None => {
                let vertex = trim.vertex.ok_or_else(|| {
                    TessError::InvalidArguments(format!("trim {trim_id:?} has no edge or vertex"))
                })?;
                let point = *input.vertex_points.get(vertex).ok_or_else(|| {
                    TessError::InvalidArguments(format!("vertex {vertex:?} has no pool point"))
                })?;
                let (d0, d1) = brep.trim_domain(trim_id);
                let n = input.params.singular_samples;
                for i in 0..n {
                    let uv = brep.trim_uv(trim_id, d0 + (d1 - d0) * i as f64 / n as f64);
                    let normal = outward_normal(brep, face, uv)
                        .map(|nv| PoolRef::Staged(staged.add_normal(nv)));
                    out.push(LoopPoint {
                        uv,
                        point,
                        normal,
                        trim: trim_id,
                        edge: None,
                        singular: true,
                    });
                }
            }
        }
    }

    if topology == SurfaceTopology::Open {
        out.dedup_by(|b, a| a.point == b.point && !a.singular && !b.singular);
        while out.len() > 1 {
            let (first, last) = (out[0], out[out.len() - 1]);
            if first.point == last.point && !first.singular && !last.singular {
                out.pop();
            } else {
                break;
            }
        }
    }
    Ok(out)
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Interior triangulator edges whose model-space pair of points is reached
/// from more than one place in a periodic domain. Lifted to 3D, such a pair
/// carries more than two triangles.
fn wrapped_edges(
    triangles: &[[usize; 3]],
    keys: &[PoolRef],
    boundary: &HashSet<(usize, usize)>,
) -> Vec<(usize, usize)> {
    let mut uses: BTreeMap<(PoolRef, PoolRef), (usize, BTreeSet<(usize, usize)>)> = BTreeMap::new();
    for t in triangles {
        let k = t.map(|i| keys[i]);
        // Collapsed on a pole; dropped at merge.
        if k[0] == k[1] || k[1] == k[2] || k[2] == k[0] {
            continue;
        }
        for j in 0..3 {
            let n = (j + 1) % 3;
            let pair = if k[j] < k[n] { (k[j], k[n]) } else { (k[n], k[j]) };
            let entry = uses.entry(pair).or_default();
            entry.0 += 1;
            entry.1.insert(ordered(t[j], t[n]));
        }
    }
    uses.into_values()
        .filter(|(count, _)| *count > 2)
        .flat_map(|(_, edges)| edges)
        .filter(|e| !boundary.contains(e))
        .collect()
}

/// Even-odd containment over every loop of the face.
fn inside_loops(loops: &[Vec<Point2>], p: &Point2) -> bool {
    let mut inside = false;
    for lp in loops {
        let n = lp.len();
        for i in 0..n {
            let (a, b) = (lp[i], lp[(i + 1) % n]);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
    }
    inside
}

/// Model-space length of the straight parameter line from `a` to `b`.
fn mapped_length(surface: &dyn Surface, a: Point2, b: Point2) -> f64 {
    const STEPS: usize = 16;
    let mut len = 0.0;
    let mut prev = surface.evaluate(a);
    for i in 1..=STEPS {
        let p = surface.evaluate(a + (b - a) * (i as f64 / STEPS as f64));
        len += (p - prev).norm();
        prev = p;
    }
    len
}

/// Grid points strictly inside the face, away from every trim segment.
/// Planar faces get none.
fn interior_points(
    surface: &dyn Surface,
    loops: &[Vec<Point2>],
    max_len: f64,
    params: &TessellationParams,
) -> Vec<Point2> {
    if surface.surface_type() == SurfaceKind::Plane || !max_len.is_finite() {
        return Vec::new();
    }
    let bounds = Aabb2::from_points(loops.iter().flatten());
    let (u_mid, v_mid) = (
        0.5 * (bounds.min.x + bounds.max.x),
        0.5 * (bounds.min.y + bounds.max.y),
    );
    let divisions = |len: f64, closed: bool| {
        let n = ((len / max_len - 1e-9).ceil() as usize).clamp(1, params.max_grid);
        if closed {
            n.max(MIN_CLOSED_DIVISIONS)
        } else {
            n
        }
    };
    let nu = divisions(
        mapped_length(
            surface,
            Point2::new(bounds.min.x, v_mid),
            Point2::new(bounds.max.x, v_mid),
        ),
        surface.is_closed_u(),
    );
    let nv = divisions(
        mapped_length(
            surface,
            Point2::new(u_mid, bounds.min.y),
            Point2::new(u_mid, bounds.max.y),
        ),
        surface.is_closed_v(),
    );
    let (du, dv) = (bounds.width() / nu as f64, bounds.height() / nv as f64);
    let clearance = params.interior_clearance * du.min(dv);

    let segments: Vec<(Point2, Point2)> = loops
        .iter()
        .flat_map(|lp| (0..lp.len()).map(move |i| (lp[i], lp[(i + 1) % lp.len()])))
        .collect();
    let tree = Bvh::build(
        segments
            .iter()
            .enumerate()
            .map(|(i, (a, b))| (i, Aabb2::from_points([a, b]).to_flat_3d())),
    );

    let mut out = Vec::new();
    for i in 1..nu {
        for j in 1..nv {
            let p = Point2::new(bounds.min.x + i as f64 * du, bounds.min.y + j as f64 * dv);
            if !inside_loops(loops, &p) {
                continue;
            }
            let mut window = Aabb2::from_points([&p]).to_flat_3d();
            window.expand(clearance);
            let near_trim = tree.query(&window).into_iter().any(|s| {
                let (a, b) = segments[s];
                point_segment_distance_2d(&p, &a, &b) < clearance
            });
            if !near_trim {
                out.push(p);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdt_kernel_geom::{CylinderSurface, Plane};
    use cdt_kernel_math::Point3;
    use std::f64::consts::PI;

    fn rect(w: f64, h: f64) -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(w, 0.0),
            Point2::new(w, h),
            Point2::new(0.0, h),
        ]
    }

    #[test]
    fn test_topology() {
        assert_eq!(SurfaceTopology::of(&Plane::xy_at(Point3::origin())), SurfaceTopology::Open);
        assert_eq!(SurfaceTopology::of(&CylinderSurface::new(1.0)), SurfaceTopology::Periodic);
    }

    #[test]
    fn test_inside_loops_respects_holes() {
        let outer = rect(4.0, 4.0);
        let hole: Vec<Point2> = rect(2.0, 2.0)
            .into_iter()
            .map(|p| p + cdt_kernel_math::Vec2::new(1.0, 1.0))
            .collect();
        let loops = vec![outer, hole];
        assert!(inside_loops(&loops, &Point2::new(0.5, 0.5)));
        assert!(!inside_loops(&loops, &Point2::new(2.0, 2.0)));
        assert!(!inside_loops(&loops, &Point2::new(5.0, 2.0)));
    }

    #[test]
    fn test_wrapped_edges_found_across_seam() {
        // Strip closed in u: corners at u = 0 and u = 2 are the same points,
        // and the lone interior point 6 reaches both copies.
        let tris = [[0, 1, 6], [1, 2, 6], [2, 3, 6], [3, 4, 6], [4, 5, 6], [5, 0, 6]];
        let boundary: HashSet<(usize, usize)> = (0..6).map(|k| ordered(k, (k + 1) % 6)).collect();
        let mut keys: Vec<PoolRef> = [0, 1, 0, 2, 3, 2].map(PoolRef::Shared).to_vec();
        keys.push(PoolRef::Staged(6));
        assert_eq!(
            wrapped_edges(&tris, &keys, &boundary),
            vec![(0, 6), (2, 6), (3, 6), (5, 6)]
        );

        let open: Vec<PoolRef> = (0..6).map(PoolRef::Shared).chain([PoolRef::Staged(6)]).collect();
        assert!(wrapped_edges(&tris, &open, &boundary).is_empty());
    }

    #[test]
    fn test_closed_direction_gets_several_columns() {
        // A thin cylinder would otherwise get a single interior column.
        let cyl = CylinderSurface::new(0.05);
        let loops = vec![rect(2.0 * PI, 10.0)];
        let params = TessellationParams::default();
        let pts = interior_points(&cyl, &loops, 0.2, &params);
        let mut columns: Vec<f64> = pts.iter().map(|p| p.x).collect();
        columns.sort_by(f64::total_cmp);
        columns.dedup();
        assert_eq!(columns.len(), MIN_CLOSED_DIVISIONS - 1);
    }

    #[test]
    fn test_interior_grid_keeps_clearance() {
        let cyl = CylinderSurface::new(1.0);
        let loops = vec![rect(2.0 * PI, 1.0)];
        let params = TessellationParams::default();
        let pts = interior_points(&cyl, &loops, 0.25, &params);
        // 25 x 4 cells: 24 x 3 interior nodes.
        assert_eq!(pts.len(), 72);
        for p in &pts {
            assert!(p.x > 0.05 && p.x < 2.0 * PI - 0.05);
            assert!(p.y > 0.05 && p.y < 0.95);
        }
        assert!(interior_points(&Plane::xy_at(Point3::origin()), &loops, 0.25, &params).is_empty());
    }
}
