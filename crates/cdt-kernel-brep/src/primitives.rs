//! Primitive solids: box, cylinder, sphere, and tube.

use std::collections::HashMap;
use std::f64::consts::PI;

use cdt_kernel_geom::{
    Circle2d, Circle3d, CylinderSurface, Line2d, Line3d, Plane, SphereSurface, Surface,
};
use cdt_kernel_math::{Point2, Point3, Vec3};

use crate::{Brep, BrepError, EdgeId, LoopKind, Result, TrimKind, VertexId};

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(BrepError::InvalidDimension { name, value })
    }
}

/// Build a box with corner at the origin and dimensions `(sx, sy, sz)`.
///
/// 6 planar faces, 12 line edges, 8 vertices. Every plane is framed so its
/// normal points outward and every loop runs counterclockwise in `(u, v)`.
/// ```text
///     v4----v5
///    /|    /|
///   v7----v6|    z
///   | v0--|-v1   | y
///   |/    |/     |/
///   v3----v2     +---x
/// ```
pub fn make_cube(sx: f64, sy: f64, sz: f64) -> Result<Brep> {
    positive("sx", sx)?;
    positive("sy", sy)?;
    positive("sz", sz)?;
    let mut b = Brep::new();

    let v = [
        b.add_vertex(Point3::new(0.0, 0.0, 0.0)),
        b.add_vertex(Point3::new(sx, 0.0, 0.0)),
        b.add_vertex(Point3::new(sx, sy, 0.0)),
        b.add_vertex(Point3::new(0.0, sy, 0.0)),
        b.add_vertex(Point3::new(0.0, 0.0, sz)),
        b.add_vertex(Point3::new(sx, 0.0, sz)),
        b.add_vertex(Point3::new(sx, sy, sz)),
        b.add_vertex(Point3::new(0.0, sy, sz)),
    ];

    // Corner order is counterclockwise seen from outside; normal = x_dir × y_dir.
    let face_defs: [([usize; 4], Point3, Vec3, Vec3); 6] = [
        ([0, 3, 2, 1], Point3::origin(), Vec3::y(), Vec3::x()),
        ([4, 5, 6, 7], Point3::new(0.0, 0.0, sz), Vec3::x(), Vec3::y()),
        ([0, 1, 5, 4], Point3::origin(), Vec3::x(), Vec3::z()),
        ([2, 3, 7, 6], Point3::new(0.0, sy, 0.0), Vec3::z(), Vec3::x()),
        ([0, 4, 7, 3], Point3::origin(), Vec3::z(), Vec3::y()),
        ([1, 2, 6, 5], Point3::new(sx, 0.0, 0.0), Vec3::y(), Vec3::z()),
    ];

    let mut edge_map: HashMap<(VertexId, VertexId), EdgeId> = HashMap::new();

    for (corners, origin, x_dir, y_dir) in face_defs {
        let plane = Plane::new(origin, x_dir, y_dir);
        let uv: Vec<Point2> = corners
            .iter()
            .map(|&i| plane.project(&b.vertices[v[i]].point))
            .collect();
        let surface = b.add_surface(Box::new(plane));
        let face = b.add_face(surface, false);
        let lp = b.add_loop(face, LoopKind::Outer);

        for j in 0..4 {
            let (a, c) = (v[corners[j]], v[corners[(j + 1) % 4]]);
            let (edge, reversed) = match edge_map.get(&(c, a)) {
                Some(&e) => (e, true),
                None => {
                    let curve = b.add_curve(Box::new(Line3d::from_points(
                        b.vertices[a].point,
                        b.vertices[c].point,
                    )));
                    let e = b.add_edge(curve, a, c);
                    edge_map.insert((a, c), e);
                    (e, false)
                }
            };
            let (p_start, p_end) = if reversed {
                (uv[(j + 1) % 4], uv[j])
            } else {
                (uv[j], uv[(j + 1) % 4])
            };
            let domain = b.edges[edge].domain;
            let pcurve = b.add_pcurve(Box::new(Line2d::spanning(p_start, p_end, domain)));
            b.add_edge_trim(lp, edge, pcurve, reversed, TrimKind::Mated);
        }
    }

    Ok(b)
}

/// Add the four trims of a cylindrical lateral face over `[0, 2π] × [v0, v1]`:
/// bottom circle forward, seam up at `u = 2π`, top circle backward, seam down
/// at `u = 0`.
fn add_lateral_loop(
    b: &mut Brep,
    surface: usize,
    reversed: bool,
    (bottom, top, seam): (EdgeId, EdgeId, EdgeId),
    (v0, v1): (f64, f64),
) {
    let face = b.add_face(surface, reversed);
    let lp = b.add_loop(face, LoopKind::Outer);
    let turn = (0.0, 2.0 * PI);
    let seam_domain = b.edges[seam].domain;

    let p = b.add_pcurve(Box::new(Line2d::spanning(
        Point2::new(0.0, v0),
        Point2::new(2.0 * PI, v0),
        turn,
    )));
    b.add_edge_trim(lp, bottom, p, false, TrimKind::Mated);

    let p = b.add_pcurve(Box::new(Line2d::spanning(
        Point2::new(2.0 * PI, v0),
        Point2::new(2.0 * PI, v1),
        seam_domain,
    )));
    b.add_edge_trim(lp, seam, p, false, TrimKind::Seam);

    let p = b.add_pcurve(Box::new(Line2d::spanning(
        Point2::new(0.0, v1),
        Point2::new(2.0 * PI, v1),
        turn,
    )));
    b.add_edge_trim(lp, top, p, true, TrimKind::Mated);

    let p = b.add_pcurve(Box::new(Line2d::spanning(
        Point2::new(0.0, v0),
        Point2::new(0.0, v1),
        seam_domain,
    )));
    b.add_edge_trim(lp, seam, p, true, TrimKind::Seam);
}

/// Circle edge of radius `r` at height `z` plus its seam vertex at `(r, 0, z)`.
fn add_ring(b: &mut Brep, r: f64, z: f64) -> (EdgeId, VertexId) {
    let vertex = b.add_vertex(Point3::new(r, 0.0, z));
    let curve = b.add_curve(Box::new(Circle3d::new(Point3::new(0.0, 0.0, z), r)));
    (b.add_edge(curve, vertex, vertex), vertex)
}

fn add_seam(b: &mut Brep, from: VertexId, to: VertexId) -> EdgeId {
    let curve = b.add_curve(Box::new(Line3d::from_points(
        b.vertices[from].point,
        b.vertices[to].point,
    )));
    b.add_edge(curve, from, to)
}

/// Add a planar cap at height `z` bounded by `rings` (outer first). Holes run
/// clockwise in the plane's parameter space.
fn add_cap(b: &mut Brep, z: f64, reversed: bool, rings: &[(EdgeId, f64)]) {
    let plane = Plane::xy_at(Point3::new(0.0, 0.0, z));
    let surface = b.add_surface(Box::new(plane));
    let face = b.add_face(surface, reversed);
    for (i, &(edge, r)) in rings.iter().enumerate() {
        let kind = if i == 0 { LoopKind::Outer } else { LoopKind::Inner };
        let lp = b.add_loop(face, kind);
        let p = b.add_pcurve(Box::new(Circle2d::new(Point2::origin(), r)));
        b.add_edge_trim(lp, edge, p, i > 0, TrimKind::Mated);
    }
}

/// Build a cylinder of the given radius and height, axis along +Z from the origin.
///
/// One lateral face with a seam line at `u = 0`, and two planar caps. The
/// bottom cap lies on the XY plane and is flagged reversed so its outward
/// normal is -Z.
pub fn make_cylinder(radius: f64, height: f64) -> Result<Brep> {
    positive("radius", radius)?;
    positive("height", height)?;
    let mut b = Brep::new();

    let (bottom, v_bot) = add_ring(&mut b, radius, 0.0);
    let (top, v_top) = add_ring(&mut b, radius, height);
    let seam = add_seam(&mut b, v_bot, v_top);

    let lateral = b.add_surface(Box::new(CylinderSurface::new(radius)));
    add_lateral_loop(&mut b, lateral, false, (bottom, top, seam), (0.0, height));
    add_cap(&mut b, 0.0, true, &[(bottom, radius)]);
    add_cap(&mut b, height, false, &[(top, radius)]);

    Ok(b)
}

/// Build a thick-walled tube: a cylinder of radius `outer` with a coaxial
/// through-hole of radius `inner`.
///
/// Four faces: outer and inner lateral walls (the inner one reversed) and two
/// annular caps whose hole loops exercise inner trimming.
pub fn make_tube(outer: f64, inner: f64, height: f64) -> Result<Brep> {
    positive("outer", outer)?;
    positive("inner", inner)?;
    positive("height", height)?;
    if inner >= outer {
        return Err(BrepError::InvalidDimension {
            name: "inner",
            value: inner,
        });
    }
    let mut b = Brep::new();

    let (outer_bottom, vob) = add_ring(&mut b, outer, 0.0);
    let (outer_top, vot) = add_ring(&mut b, outer, height);
    let outer_seam = add_seam(&mut b, vob, vot);
    let (inner_bottom, vib) = add_ring(&mut b, inner, 0.0);
    let (inner_top, vit) = add_ring(&mut b, inner, height);
    let inner_seam = add_seam(&mut b, vib, vit);

    let s = b.add_surface(Box::new(CylinderSurface::new(outer)));
    add_lateral_loop(&mut b, s, false, (outer_bottom, outer_top, outer_seam), (0.0, height));
    let s = b.add_surface(Box::new(CylinderSurface::new(inner)));
    add_lateral_loop(&mut b, s, true, (inner_bottom, inner_top, inner_seam), (0.0, height));

    add_cap(&mut b, 0.0, true, &[(outer_bottom, outer), (inner_bottom, inner)]);
    add_cap(&mut b, height, false, &[(outer_top, outer), (inner_top, inner)]);

    Ok(b)
}

/// Build a sphere as a single face bounded by a seam meridian at `u = 0` and
/// two singular trims at the poles.
pub fn make_sphere(center: Point3, radius: f64) -> Result<Brep> {
    positive("radius", radius)?;
    let mut b = Brep::new();

    let south = b.add_vertex(center - Vec3::z() * radius);
    let north = b.add_vertex(center + Vec3::z() * radius);

    let surface = SphereSurface::new(center, radius);
    let ((_, u1), (v0, v1)) = surface.domain();
    let meridian = b.add_curve(Box::new(Circle3d::arc(
        center,
        radius,
        Vec3::x(),
        Vec3::z(),
        (v0, v1),
    )));
    let seam = b.add_edge(meridian, south, north);

    let surface = b.add_surface(Box::new(surface));
    let face = b.add_face(surface, false);
    let lp = b.add_loop(face, LoopKind::Outer);

    let p = b.add_pcurve(Box::new(Line2d::from_points(
        Point2::new(0.0, v0),
        Point2::new(u1, v0),
    )));
    b.add_singular_trim(lp, south, p);

    let p = b.add_pcurve(Box::new(Line2d::spanning(
        Point2::new(u1, v0),
        Point2::new(u1, v1),
        (v0, v1),
    )));
    b.add_edge_trim(lp, seam, p, false, TrimKind::Seam);

    let p = b.add_pcurve(Box::new(Line2d::from_points(
        Point2::new(u1, v1),
        Point2::new(0.0, v1),
    )));
    b.add_singular_trim(lp, north, p);

    let p = b.add_pcurve(Box::new(Line2d::spanning(
        Point2::new(0.0, v0),
        Point2::new(0.0, v1),
        (v0, v1),
    )));
    b.add_edge_trim(lp, seam, p, true, TrimKind::Seam);

    Ok(b)
}
