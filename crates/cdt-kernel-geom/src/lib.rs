#![warn(missing_docs)]

//! Parametric surface and curve types for the CDT tessellation kernel.
//!
//! Provides trait-based abstractions for the surfaces that carry B-rep
//! faces and the curves that carry edges and trims. The tessellator only
//! talks to geometry through these traits: point and normal evaluation,
//! periodicity, and closest-point projection.

use std::f64::consts::PI;
use cdt_kernel_math::{Dir3, Point2, Point3, Transform, Vec2, Vec3};

// =============================================================================
// Surface types
// =============================================================================

/// The kind of a surface (for match-based dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Infinite plane.
    Plane,
    /// Cylindrical surface.
    Cylinder,
    /// Spherical surface.
    Sphere,
}

/// A parametric surface in 3D space.
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Evaluate the surface at parameter `(u, v)` to get a 3D point.
    fn evaluate(&self, uv: Point2) -> Point3;

    /// Partial derivative with respect to u at `(u, v)`.
    fn d_du(&self, uv: Point2) -> Vec3;

    /// Partial derivative with respect to v at `(u, v)`.
    fn d_dv(&self, uv: Point2) -> Vec3;

    /// Surface normal at `(u, v)`, or `None` where the partials degenerate
    /// (poles, collapsed boundaries).
    fn normal(&self, uv: Point2) -> Option<Dir3> {
        let du = self.d_du(uv);
        let dv = self.d_dv(uv);
        let n = du.cross(&dv);
        let reference = du.norm().max(dv.norm());
        if reference < 1e-300 || n.norm() <= 1e-12 * reference * reference {
            None
        } else {
            Some(Dir3::new_normalize(n))
        }
    }

    /// Parameter domain as `((u_min, u_max), (v_min, v_max))`.
    fn domain(&self) -> ((f64, f64), (f64, f64));

    /// The kind of this surface.
    fn surface_type(&self) -> SurfaceKind;

    /// Whether the surface wraps around in u (`S(u_min, v) == S(u_max, v)`).
    fn is_closed_u(&self) -> bool {
        false
    }

    /// Whether the surface wraps around in v.
    fn is_closed_v(&self) -> bool {
        false
    }

    /// Parameter of the surface point closest to `p`, starting the search at
    /// `hint`. Returns `None` if the search cannot make progress.
    ///
    /// The default is a damped Gauss-Newton iteration on the squared
    /// distance, clamped to the domain.
    fn closest_point(&self, p: &Point3, hint: Point2) -> Option<Point2> {
        let ((u0, u1), (v0, v1)) = self.domain();
        let mut uv = hint;
        for _ in 0..32 {
            let r = self.evaluate(uv) - p;
            let su = self.d_du(uv);
            let sv = self.d_dv(uv);
            let a11 = su.dot(&su);
            let a12 = su.dot(&sv);
            let a22 = sv.dot(&sv);
            let b1 = -su.dot(&r);
            let b2 = -sv.dot(&r);
            let det = a11 * a22 - a12 * a12;
            if det.abs() < 1e-300 {
                return None;
            }
            let du = (b1 * a22 - b2 * a12) / det;
            let dv = (a11 * b2 - a12 * b1) / det;
            uv = Point2::new((uv.x + du).clamp(u0, u1), (uv.y + dv).clamp(v0, v1));
            if du.abs() + dv.abs() < 1e-13 {
                break;
            }
        }
        Some(uv)
    }

    /// Clone this surface into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Surface>;

    /// Apply an affine transform to this surface, returning a new surface.
    fn transform(&self, t: &Transform) -> Box<dyn Surface>;
}

impl Clone for Box<dyn Surface> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Wrap an angle into `[0, 2π)`.
fn wrap_angle(a: f64) -> f64 {
    let w = a.rem_euclid(2.0 * PI);
    if w >= 2.0 * PI {
        0.0
    } else {
        w
    }
}

// =============================================================================
// Plane
// =============================================================================

/// An infinite plane defined by an origin point and a coordinate frame.
///
/// Parameterization: `P(u, v) = origin + u * x_dir + v * y_dir`
#[derive(Debug, Clone)]
pub struct Plane {
    /// Origin point on the plane.
    pub origin: Point3,
    /// Unit vector along the u direction.
    pub x_dir: Dir3,
    /// Unit vector along the v direction.
    pub y_dir: Dir3,
    /// Unit normal (x_dir × y_dir).
    pub normal_dir: Dir3,
}

impl Plane {
    /// Create a plane from origin and two orthogonal direction vectors.
    /// The vectors do not need to be normalized.
    pub fn new(origin: Point3, x_dir: Vec3, y_dir: Vec3) -> Self {
        Self {
            origin,
            x_dir: Dir3::new_normalize(x_dir),
            y_dir: Dir3::new_normalize(y_dir),
            normal_dir: Dir3::new_normalize(x_dir.cross(&y_dir)),
        }
    }

    /// XY plane through `origin`.
    pub fn xy_at(origin: Point3) -> Self {
        Self::new(origin, Vec3::x(), Vec3::y())
    }

    /// Project a 3D point onto this plane's (u, v) parameter space.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(self.x_dir.as_ref()), d.dot(self.y_dir.as_ref()))
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: Point2) -> Point3 {
        self.origin + uv.x * self.x_dir.as_ref() + uv.y * self.y_dir.as_ref()
    }

    fn d_du(&self, _uv: Point2) -> Vec3 {
        *self.x_dir.as_ref()
    }

    fn d_dv(&self, _uv: Point2) -> Vec3 {
        *self.y_dir.as_ref()
    }

    fn normal(&self, _uv: Point2) -> Option<Dir3> {
        Some(self.normal_dir)
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((-1e10, 1e10), (-1e10, 1e10))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Plane
    }

    fn closest_point(&self, p: &Point3, _hint: Point2) -> Option<Point2> {
        Some(self.project(p))
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn transform(&self, t: &Transform) -> Box<dyn Surface> {
        let new_origin = t.apply_point(&self.origin);
        let new_x = t.apply_vec(self.x_dir.as_ref());
        let new_y = t.apply_vec(self.y_dir.as_ref());
        Box::new(Plane::new(new_origin, new_x, new_y))
    }
}

// =============================================================================
// Cylinder
// =============================================================================

/// A cylindrical surface defined by an axis line and radius.
///
/// Parameterization: `P(u, v) = center + radius * (cos(u) * x_dir + sin(u) * y_dir) + v * axis`
///
/// Where `u ∈ [0, 2π)` is the angular parameter and `v` is the height along
/// the axis. The surface is periodic in u.
#[derive(Debug, Clone)]
pub struct CylinderSurface {
    /// Center point at the base of the cylinder axis.
    pub center: Point3,
    /// Unit direction along the cylinder axis.
    pub axis: Dir3,
    /// Reference direction for u=0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Radius of the cylinder.
    pub radius: f64,
}

impl CylinderSurface {
    /// Create a cylinder with axis along Z, centered at origin.
    pub fn new(radius: f64) -> Self {
        Self {
            center: Point3::origin(),
            axis: Dir3::new_normalize(Vec3::z()),
            ref_dir: Dir3::new_normalize(Vec3::x()),
            radius,
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for CylinderSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        self.center
            + self.radius * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
            + uv.y * self.axis.as_ref()
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        self.radius * (-sin_u * self.ref_dir.as_ref() + cos_u * self.y_dir())
    }

    fn d_dv(&self, _uv: Point2) -> Vec3 {
        *self.axis.as_ref()
    }

    fn normal(&self, uv: Point2) -> Option<Dir3> {
        let (sin_u, cos_u) = uv.x.sin_cos();
        Some(Dir3::new_normalize(
            cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir(),
        ))
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (-1e10, 1e10))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Cylinder
    }

    fn is_closed_u(&self) -> bool {
        true
    }

    fn closest_point(&self, p: &Point3, hint: Point2) -> Option<Point2> {
        let d = p - self.center;
        let v = d.dot(self.axis.as_ref());
        let radial = d - v * self.axis.as_ref();
        if radial.norm() < 1e-300 {
            return Some(Point2::new(hint.x, v));
        }
        let u = radial.dot(&self.y_dir()).atan2(radial.dot(self.ref_dir.as_ref()));
        let mut u = wrap_angle(u);
        // Stay on the side of the seam the caller is working on.
        if hint.x > PI && u < 1e-12 {
            u = 2.0 * PI;
        }
        Some(Point2::new(u, v))
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn transform(&self, t: &Transform) -> Box<dyn Surface> {
        let new_ref = t.apply_vec(self.ref_dir.as_ref());
        let scale = new_ref.norm();
        Box::new(CylinderSurface {
            center: t.apply_point(&self.center),
            axis: Dir3::new_normalize(t.apply_vec(self.axis.as_ref())),
            ref_dir: Dir3::new_normalize(new_ref),
            radius: self.radius * scale,
        })
    }
}

// =============================================================================
// Sphere
// =============================================================================

/// A spherical surface.
///
/// Parameterization: `P(u, v) = center + radius * (cos(v) * (cos(u) * x + sin(u) * y) + sin(v) * z)`
///
/// Where `u ∈ [0, 2π)` is longitude and `v ∈ [-π/2, π/2]` is latitude. The
/// surface is periodic in u and singular at both poles, where the normal is
/// not defined by the parameterization.
#[derive(Debug, Clone)]
pub struct SphereSurface {
    /// Center of the sphere.
    pub center: Point3,
    /// Radius of the sphere.
    pub radius: f64,
    /// Reference direction for u=0 (perpendicular to axis).
    pub ref_dir: Dir3,
    /// Axis direction (north pole).
    pub axis: Dir3,
}

impl SphereSurface {
    /// Create a sphere with the given center and radius, axis along Z.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self {
            center,
            radius,
            ref_dir: Dir3::new_normalize(Vec3::x()),
            axis: Dir3::new_normalize(Vec3::z()),
        }
    }

    fn y_dir(&self) -> Vec3 {
        self.axis.as_ref().cross(self.ref_dir.as_ref())
    }
}

impl Surface for SphereSurface {
    fn evaluate(&self, uv: Point2) -> Point3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.center
            + self.radius
                * (cos_v * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
                    + sin_v * self.axis.as_ref())
    }

    fn d_du(&self, uv: Point2) -> Vec3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        let cos_v = uv.y.cos();
        self.radius * cos_v * (-sin_u * self.ref_dir.as_ref() + cos_u * self.y_dir())
    }

    fn d_dv(&self, uv: Point2) -> Vec3 {
        let (sin_u, cos_u) = uv.x.sin_cos();
        let (sin_v, cos_v) = uv.y.sin_cos();
        self.radius
            * (-sin_v * (cos_u * self.ref_dir.as_ref() + sin_u * self.y_dir())
                + cos_v * self.axis.as_ref())
    }

    fn domain(&self) -> ((f64, f64), (f64, f64)) {
        ((0.0, 2.0 * PI), (-PI / 2.0, PI / 2.0))
    }

    fn surface_type(&self) -> SurfaceKind {
        SurfaceKind::Sphere
    }

    fn is_closed_u(&self) -> bool {
        true
    }

    fn closest_point(&self, p: &Point3, hint: Point2) -> Option<Point2> {
        let d = p - self.center;
        let r = d.norm();
        if r < 1e-300 {
            return None;
        }
        let v = (d.dot(self.axis.as_ref()) / r).clamp(-1.0, 1.0).asin();
        let x = d.dot(self.ref_dir.as_ref());
        let y = d.dot(&self.y_dir());
        let u = if x.abs() + y.abs() < 1e-300 {
            hint.x
        } else {
            let mut u = wrap_angle(y.atan2(x));
            if hint.x > PI && u < 1e-12 {
                u = 2.0 * PI;
            }
            u
        };
        Some(Point2::new(u, v))
    }

    fn clone_box(&self) -> Box<dyn Surface> {
        Box::new(self.clone())
    }

    fn transform(&self, t: &Transform) -> Box<dyn Surface> {
        let new_ref = t.apply_vec(self.ref_dir.as_ref());
        let scale = new_ref.norm();
        Box::new(SphereSurface {
            center: t.apply_point(&self.center),
            radius: self.radius * scale,
            ref_dir: Dir3::new_normalize(new_ref),
            axis: Dir3::new_normalize(t.apply_vec(self.axis.as_ref())),
        })
    }
}

// =============================================================================
// Curve types
// =============================================================================

/// The kind of a curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Straight line.
    Line,
    /// Circle or circular arc.
    Circle,
}

/// A parametric curve in 3D space.
pub trait Curve3d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 3D point.
    fn evaluate(&self, t: f64) -> Point3;

    /// Tangent vector at parameter `t`.
    fn tangent(&self, t: f64) -> Vec3;

    /// Parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// The kind of this curve.
    fn curve_type(&self) -> CurveKind;

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve3d>;

    /// Apply an affine transform to this curve.
    fn transform(&self, t: &Transform) -> Box<dyn Curve3d>;
}

impl Clone for Box<dyn Curve3d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A 2D parametric curve (for trim curves in surface parameter space).
pub trait Curve2d: Send + Sync + std::fmt::Debug {
    /// Evaluate the curve at parameter `t` to get a 2D point.
    fn evaluate(&self, t: f64) -> Point2;

    /// Tangent vector at parameter `t`.
    fn tangent(&self, t: f64) -> Vec2;

    /// Parameter domain `(t_min, t_max)`.
    fn domain(&self) -> (f64, f64);

    /// Clone into a boxed trait object.
    fn clone_box(&self) -> Box<dyn Curve2d>;
}

impl Clone for Box<dyn Curve2d> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

// =============================================================================
// Line3d
// =============================================================================

/// A 3D line segment defined by origin and direction.
///
/// Parameterization: `P(t) = origin + t * direction`, `t ∈ [0, 1]`
#[derive(Debug, Clone)]
pub struct Line3d {
    /// Starting point.
    pub origin: Point3,
    /// Direction (magnitude is the segment length).
    pub direction: Vec3,
}

impl Line3d {
    /// Create a line from two endpoints, parameterized so `t=0` gives `start` and `t=1` gives `end`.
    pub fn from_points(start: Point3, end: Point3) -> Self {
        Self {
            origin: start,
            direction: end - start,
        }
    }
}

impl Curve3d for Line3d {
    fn evaluate(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    fn tangent(&self, _t: f64) -> Vec3 {
        self.direction
    }

    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Line
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn transform(&self, t: &Transform) -> Box<dyn Curve3d> {
        Box::new(Line3d {
            origin: t.apply_point(&self.origin),
            direction: t.apply_vec(&self.direction),
        })
    }
}

// =============================================================================
// Circle3d
// =============================================================================

/// A circle or circular arc in 3D space.
///
/// Parameterization: `P(t) = center + radius * (cos(t) * x_dir + sin(t) * y_dir)`
/// over `range`.
#[derive(Debug, Clone)]
pub struct Circle3d {
    /// Center of the circle.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
    /// Reference direction for t=0.
    pub x_dir: Dir3,
    /// Second in-plane direction.
    pub y_dir: Dir3,
    /// Angular parameter range.
    pub range: (f64, f64),
}

impl Circle3d {
    /// Create a full circle in the XY plane centered at the given point.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self {
            center,
            radius,
            x_dir: Dir3::new_normalize(Vec3::x()),
            y_dir: Dir3::new_normalize(Vec3::y()),
            range: (0.0, 2.0 * PI),
        }
    }

    /// Create an arc spanned by `x_dir` and `y_dir` over the angle range `range`.
    pub fn arc(center: Point3, radius: f64, x_dir: Vec3, y_dir: Vec3, range: (f64, f64)) -> Self {
        Self {
            center,
            radius,
            x_dir: Dir3::new_normalize(x_dir),
            y_dir: Dir3::new_normalize(y_dir),
            range,
        }
    }
}

impl Curve3d for Circle3d {
    fn evaluate(&self, t: f64) -> Point3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center + self.radius * (cos_t * self.x_dir.as_ref() + sin_t * self.y_dir.as_ref())
    }

    fn tangent(&self, t: f64) -> Vec3 {
        let (sin_t, cos_t) = t.sin_cos();
        self.radius * (-sin_t * self.x_dir.as_ref() + cos_t * self.y_dir.as_ref())
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn curve_type(&self) -> CurveKind {
        CurveKind::Circle
    }

    fn clone_box(&self) -> Box<dyn Curve3d> {
        Box::new(self.clone())
    }

    fn transform(&self, t: &Transform) -> Box<dyn Curve3d> {
        let new_x = t.apply_vec(self.x_dir.as_ref());
        let scale = new_x.norm();
        Box::new(Circle3d {
            center: t.apply_point(&self.center),
            radius: self.radius * scale,
            x_dir: Dir3::new_normalize(new_x),
            y_dir: Dir3::new_normalize(t.apply_vec(self.y_dir.as_ref())),
            range: self.range,
        })
    }
}

// =============================================================================
// 2D curves (for trim curves in parameter space)
// =============================================================================

/// A 2D line segment in parameter space, linearly parameterized over `domain`.
#[derive(Debug, Clone)]
pub struct Line2d {
    /// Point at the start of the domain.
    pub start: Point2,
    /// Point at the end of the domain.
    pub end: Point2,
    /// Parameter domain.
    pub domain: (f64, f64),
}

impl Line2d {
    /// Segment from `start` to `end` over `[0, 1]`.
    pub fn from_points(start: Point2, end: Point2) -> Self {
        Self::spanning(start, end, (0.0, 1.0))
    }

    /// Segment from `start` to `end` over an arbitrary parameter domain,
    /// so it can share the parameterization of the edge it trims.
    pub fn spanning(start: Point2, end: Point2, domain: (f64, f64)) -> Self {
        Self { start, end, domain }
    }

    fn fraction(&self, t: f64) -> f64 {
        let span = self.domain.1 - self.domain.0;
        if span.abs() < 1e-300 {
            0.0
        } else {
            (t - self.domain.0) / span
        }
    }
}

impl Curve2d for Line2d {
    fn evaluate(&self, t: f64) -> Point2 {
        self.start + self.fraction(t) * (self.end - self.start)
    }

    fn tangent(&self, _t: f64) -> Vec2 {
        let span = self.domain.1 - self.domain.0;
        (self.end - self.start) / span
    }

    fn domain(&self) -> (f64, f64) {
        self.domain
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }
}

/// A 2D circle/arc in parameter space.
#[derive(Debug, Clone)]
pub struct Circle2d {
    /// Center of the circle.
    pub center: Point2,
    /// Radius.
    pub radius: f64,
    /// Angular parameter range.
    pub range: (f64, f64),
}

impl Circle2d {
    /// Full circle at the given center with the given radius.
    pub fn new(center: Point2, radius: f64) -> Self {
        Self {
            center,
            radius,
            range: (0.0, 2.0 * PI),
        }
    }
}

impl Curve2d for Circle2d {
    fn evaluate(&self, t: f64) -> Point2 {
        let (sin_t, cos_t) = t.sin_cos();
        self.center + self.radius * Vec2::new(cos_t, sin_t)
    }

    fn tangent(&self, t: f64) -> Vec2 {
        let (sin_t, cos_t) = t.sin_cos();
        self.radius * Vec2::new(-sin_t, cos_t)
    }

    fn domain(&self) -> (f64, f64) {
        self.range
    }

    fn clone_box(&self) -> Box<dyn Curve2d> {
        Box::new(self.clone())
    }
}
