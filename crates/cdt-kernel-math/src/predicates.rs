//! Exact geometric predicates.
//!
//! Wraps Shewchuk's adaptive-precision predicates from the `robust` crate
//! so the triangulators and the triangle-triangle classifier never take a
//! wrong branch on nearly-degenerate input.

use robust::{Coord, Coord3D};

use crate::{Point2, Point3};

/// Sign of a predicate result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    /// Strictly negative.
    Negative,
    /// Exactly zero.
    Zero,
    /// Strictly positive.
    Positive,
}

impl Sign {
    fn of(value: f64) -> Self {
        if value > 0.0 {
            Sign::Positive
        } else if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Zero
        }
    }
}

macro_rules! coord {
    ($p:expr) => {
        Coord { x: $p.x, y: $p.y }
    };
}

macro_rules! coord3 {
    ($p:expr) => {
        Coord3D {
            x: $p.x,
            y: $p.y,
            z: $p.z,
        }
    };
}

/// Twice the signed area of `(a, b, c)`: positive when counterclockwise.
pub fn orient2d_value(a: &Point2, b: &Point2, c: &Point2) -> f64 {
    robust::orient2d(coord!(a), coord!(b), coord!(c))
}

/// Orientation of `(a, b, c)`.
pub fn orient2d(a: &Point2, b: &Point2, c: &Point2) -> Sign {
    Sign::of(orient2d_value(a, b, c))
}

/// Positive when `d` lies inside the circumcircle of the counterclockwise
/// triangle `(a, b, c)`.
pub fn incircle(a: &Point2, b: &Point2, c: &Point2, d: &Point2) -> f64 {
    robust::incircle(coord!(a), coord!(b), coord!(c), coord!(d))
}

/// Side of `d` relative to the plane through `(a, b, c)`.
pub fn orient3d(a: &Point3, b: &Point3, c: &Point3, d: &Point3) -> Sign {
    Sign::of(robust::orient3d(coord3!(a), coord3!(b), coord3!(c), coord3!(d)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orient2d_signs() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        assert_eq!(orient2d(&a, &b, &Point2::new(0.0, 1.0)), Sign::Positive);
        assert_eq!(orient2d(&a, &b, &Point2::new(0.0, -1.0)), Sign::Negative);
        assert_eq!(orient2d(&a, &b, &Point2::new(7.0, 0.0)), Sign::Zero);
    }

    #[test]
    fn test_incircle() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(1.0, 0.0);
        let c = Point2::new(0.0, 1.0);
        assert!(incircle(&a, &b, &c, &Point2::new(0.5, 0.5)) > 0.0);
        assert!(incircle(&a, &b, &c, &Point2::new(3.0, 3.0)) < 0.0);
        assert_eq!(incircle(&a, &b, &c, &Point2::new(1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_orient3d_opposite_sides() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        let above = orient3d(&a, &b, &c, &Point3::new(0.2, 0.2, 1.0));
        let below = orient3d(&a, &b, &c, &Point3::new(0.2, 0.2, -1.0));
        assert_ne!(above, Sign::Zero);
        assert_ne!(above, below);
        assert_eq!(orient3d(&a, &b, &c, &Point3::new(5.0, 5.0, 0.0)), Sign::Zero);
    }
}
