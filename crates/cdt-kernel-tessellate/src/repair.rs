//! Local re-triangulation of bad triangles.
//!
//! A flagged triangle and its neighbor across the longest edge form a small
//! region. Its boundary loop is projected onto a best-fit plane and clipped
//! again, keeping the loop direction so the rest of the mesh still matches.

use std::collections::{HashMap, HashSet};

use cdt_kernel_math::predicates::orient2d_value;
use cdt_kernel_math::{polygon_area_2d, Point2, Vec3};
use cdt_kernel_mesh::cmesh::edge_length;
use cdt_kernel_mesh::validate::is_degenerate;
use cdt_kernel_mesh::{CMesh, Pool, TriId, Uedge};
use cdt_kernel_triangulate::{constrained_delaunay, ear_clip, CdtInput, TriangulateError};

use crate::TessellationParams;

const NEAR_COLLINEAR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RepairOutcome {
    Repaired,
    /// Nothing better was found, or the region was not a simple loop.
    Skipped,
}

/// Re-triangulate the region around `seed`.
///
/// Errors only when both triangulators fail on the region loop.
pub(crate) fn repair_region(
    mesh: &mut CMesh,
    pool: &Pool,
    seed: TriId,
    params: &TessellationParams,
) -> Result<RepairOutcome, TriangulateError> {
    let Some(&tri) = mesh.get(seed) else {
        return Ok(RepairOutcome::Skipped);
    };
    let mut edges = tri.uedges();
    edges.sort_by(|a, b| edge_length(b, pool).total_cmp(&edge_length(a, pool)));
    let Some(other) = edges.iter().find_map(|e| mesh.neighbor(seed, e)) else {
        return Ok(RepairOutcome::Skipped);
    };
    let region = [seed, other];
    let Some(ring) = boundary_ring(mesh, &region) else {
        return Ok(RepairOutcome::Skipped);
    };
    if ring.len() < 3 {
        return Ok(RepairOutcome::Skipped);
    }

    let normal = region_normal(mesh, pool, &ring);
    if normal.norm() == 0.0 {
        return Ok(RepairOutcome::Skipped);
    }
    let normal = normal.normalize();
    let helper = if normal.x.abs() < 0.9 { Vec3::x() } else { Vec3::y() };
    let x = normal.cross(&helper).normalize();
    let y = normal.cross(&x);
    let mut flat: Vec<Point2> = ring
        .iter()
        .map(|&p| {
            let v = pool.point(p).coords;
            Point2::new(v.dot(&x), v.dot(&y))
        })
        .collect();
    let ccw = polygon_area_2d(&flat) > 0.0;
    nudge_collinear(&mut flat, ccw, params.repair_nudge);

    let old: HashSet<[usize; 3]> = region
        .iter()
        .filter_map(|&id| mesh.get(id))
        .map(|t| sorted(t.v))
        .collect();
    // Lifted triangles follow the ring, so a clockwise ring faces away from `normal`.
    let facing = if ccw { normal } else { -normal };
    let accept = |tris: &[[usize; 3]]| -> bool {
        let mut changed = false;
        for t in tris {
            let [a, b, c] = [pool.point(t[0]), pool.point(t[1]), pool.point(t[2])];
            if is_degenerate(&a, &b, &c, params.collinear_tolerance) {
                return false;
            }
            if cdt_kernel_math::triangle_cross(&a, &b, &c).dot(&facing) <= 0.0 {
                return false;
            }
            for k in 0..3 {
                let e = Uedge::new(t[k], t[(k + 1) % 3]);
                if mesh.edge_tris(&e).iter().any(|id| !region.contains(id)) && !on_ring(&ring, &e) {
                    return false;
                }
            }
            changed |= !old.contains(&sorted(*t));
        }
        changed
    };
    let lift = |local: Vec<[usize; 3]>| -> Vec<[usize; 3]> {
        local
            .into_iter()
            .map(|[a, b, c]| {
                if ccw {
                    [ring[a], ring[b], ring[c]]
                } else {
                    [ring[a], ring[c], ring[b]]
                }
            })
            .collect()
    };

    let m = ring.len();
    let mut clipped_any = false;
    let mut chosen = None;
    for r in 0..m {
        let polygon: Vec<usize> = (0..m).map(|i| (i + r) % m).collect();
        if let Ok(local) = ear_clip(&flat, &polygon) {
            clipped_any = true;
            let tris = lift(local);
            if accept(&tris) {
                chosen = Some(tris);
                break;
            }
        }
    }
    if chosen.is_none() {
        let outer: Vec<usize> = (0..m).collect();
        match constrained_delaunay(&CdtInput {
            points: &flat,
            outer: &outer,
            holes: &[],
            interior: &[],
        }) {
            Ok(cdt) => {
                let tris = lift(cdt.triangles);
                if accept(&tris) {
                    chosen = Some(tris);
                }
            }
            Err(err) if !clipped_any => return Err(err),
            Err(_) => {}
        }
    }

    let Some(tris) = chosen else {
        return Ok(RepairOutcome::Skipped);
    };
    for id in region {
        mesh.remove(id);
    }
    for t in tris {
        mesh.add(t);
    }
    Ok(RepairOutcome::Repaired)
}

fn sorted(mut v: [usize; 3]) -> [usize; 3] {
    v.sort_unstable();
    v
}

fn on_ring(ring: &[usize], e: &Uedge) -> bool {
    (0..ring.len()).any(|i| Uedge::new(ring[i], ring[(i + 1) % ring.len()]) == *e)
}

/// Boundary of a set of triangles as one directed loop, if it is simple.
fn boundary_ring(mesh: &CMesh, region: &[TriId]) -> Option<Vec<usize>> {
    let directed: Vec<(usize, usize)> = region
        .iter()
        .filter_map(|&id| mesh.get(id))
        .flat_map(|t| (0..3).map(move |k| (t.v[k], t.v[(k + 1) % 3])))
        .collect();
    let all: HashSet<(usize, usize)> = directed.iter().copied().collect();
    let boundary: Vec<(usize, usize)> = directed
        .into_iter()
        .filter(|&(a, b)| !all.contains(&(b, a)))
        .collect();

    let mut next = HashMap::with_capacity(boundary.len());
    for &(a, b) in &boundary {
        if next.insert(a, b).is_some() {
            return None;
        }
    }
    let start = boundary.first()?.0;
    let mut ring = Vec::with_capacity(boundary.len());
    let mut cur = start;
    loop {
        ring.push(cur);
        cur = *next.get(&cur)?;
        if cur == start {
            break;
        }
        if ring.len() > boundary.len() {
            return None;
        }
    }
    (ring.len() == boundary.len()).then_some(ring)
}

/// Sum of the ring's vertex normals, or its Newell normal when any is missing.
fn region_normal(mesh: &CMesh, pool: &Pool, ring: &[usize]) -> Vec3 {
    let normals: Option<Vec3> = ring
        .iter()
        .map(|&p| mesh.normal_of(p).map(|n| pool.normal(n)))
        .sum();
    match normals {
        Some(n) if n.norm() > 0.0 => n,
        _ => {
            let mut n = Vec3::zeros();
            for i in 0..ring.len() {
                let a = pool.point(ring[i]).coords;
                let b = pool.point(ring[(i + 1) % ring.len()]).coords;
                n += a.cross(&b);
            }
            n
        }
    }
}

/// Push corners that sit on the line through their neighbors toward the
/// inside of the loop.
fn nudge_collinear(points: &mut [Point2], ccw: bool, fraction: f64) {
    let m = points.len();
    let original = points.to_vec();
    for i in 0..m {
        let (prev, p, next) = (original[(i + m - 1) % m], original[i], original[(i + 1) % m]);
        let d = next - prev;
        let scale = d.norm_squared();
        if scale == 0.0 || orient2d_value(&prev, &p, &next).abs() > NEAR_COLLINEAR * scale {
            continue;
        }
        let left = cdt_kernel_math::Vec2::new(-d.y, d.x).normalize();
        let inward = if ccw { left } else { -left };
        let step = (p - prev).norm().min((next - p).norm()) * fraction;
        points[i] = p + inward * step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdt_kernel_math::Point3;

    /// Square split through a point on its diagonal, leaving a collinear
    /// triangle `(0, 4, 2)` next to `(0, 2, 3)`.
    fn sliver_square() -> (Pool, CMesh, TriId) {
        let mut pool = Pool::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.5)] {
            pool.add_point(Point3::new(x, y, 0.0));
            pool.add_normal(Vec3::z());
        }
        let mut mesh = CMesh::new();
        for p in 0..5 {
            mesh.set_normal(p, p);
        }
        mesh.add([0, 1, 4]);
        mesh.add([4, 1, 2]);
        let bad = mesh.add([0, 4, 2]);
        mesh.add([0, 2, 3]);
        (pool, mesh, bad)
    }

    #[test]
    fn test_collinear_triangle_is_replaced() {
        let (pool, mut mesh, bad) = sliver_square();
        let params = TessellationParams::default();
        let out = repair_region(&mut mesh, &pool, bad, &params).unwrap();
        assert_eq!(out, RepairOutcome::Repaired);
        assert!(mesh.get(bad).is_none());
        assert_eq!(mesh.len(), 4);
        let mut area = 0.0;
        for (id, t) in mesh.iter() {
            let [a, b, c] = t.corners(&pool);
            assert!(!is_degenerate(&a, &b, &c, params.collinear_tolerance));
            let n = mesh.cross(id, &pool).unwrap();
            assert!(n.z > 0.0);
            area += 0.5 * n.norm();
        }
        approx::assert_relative_eq!(area, 1.0, epsilon = 1e-12);
        // Every interior edge still has two triangles.
        for e in mesh.uedges() {
            let n = mesh.edge_tris(e).len();
            assert!(n == 1 || n == 2);
        }
        assert_eq!(mesh.boundary_uedges().len(), 4);
    }

    #[test]
    fn test_clockwise_region_keeps_its_winding() {
        // Same square wound against its vertex normals.
        let (pool, mesh, _) = sliver_square();
        let mut flipped = CMesh::new();
        for p in 0..5 {
            flipped.set_normal(p, p);
        }
        let mut bad = None;
        for (_, t) in mesh.iter() {
            let id = flipped.add([t.v[0], t.v[2], t.v[1]]);
            if t.v == [0, 4, 2] {
                bad = Some(id);
            }
        }
        let out = repair_region(&mut flipped, &pool, bad.unwrap(), &TessellationParams::default()).unwrap();
        assert_eq!(out, RepairOutcome::Repaired);
        assert_eq!(flipped.len(), 4);
        for (id, _) in flipped.iter() {
            assert!(flipped.cross(id, &pool).unwrap().z < 0.0);
        }
    }

    #[test]
    fn test_coincident_ring_exhausts_both_triangulators() {
        let mut pool = Pool::new();
        for _ in 0..4 {
            pool.add_point(Point3::new(1.0, 1.0, 1.0));
            pool.add_normal(Vec3::z());
        }
        let mut mesh = CMesh::new();
        for p in 0..4 {
            mesh.set_normal(p, p);
        }
        let seed = mesh.add([0, 1, 2]);
        mesh.add([0, 2, 3]);
        assert_eq!(
            repair_region(&mut mesh, &pool, seed, &TessellationParams::default()),
            Err(TriangulateError::ZeroArea)
        );
        assert_eq!(mesh.len(), 2);
    }

    #[test]
    fn test_isolated_triangle_is_skipped() {
        let mut pool = Pool::new();
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)] {
            pool.add_point(Point3::new(x, y, 0.0));
        }
        let mut mesh = CMesh::new();
        let id = mesh.add([0, 1, 2]);
        let out = repair_region(&mut mesh, &pool, id, &TessellationParams::default()).unwrap();
        assert_eq!(out, RepairOutcome::Skipped);
        assert_eq!(mesh.len(), 1);
    }

    #[test]
    fn test_boundary_ring_of_two_triangles() {
        let (_, mesh, bad) = sliver_square();
        let other = mesh
            .iter()
            .find(|(_, t)| t.v == [0, 2, 3])
            .map(|(id, _)| id)
            .unwrap();
        let ring = boundary_ring(&mesh, &[bad, other]).unwrap();
        assert_eq!(ring.len(), 4);
        for w in [(0, 4), (4, 2), (2, 3), (3, 0)] {
            let i = ring.iter().position(|&p| p == w.0).unwrap();
            assert_eq!(ring[(i + 1) % 4], w.1);
        }
    }
}
