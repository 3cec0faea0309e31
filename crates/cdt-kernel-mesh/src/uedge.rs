//! Unordered mesh edges.

use std::fmt;

/// An unordered pair of vertex indices, stored smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uedge {
    /// Smaller vertex index.
    pub lo: usize,
    /// Larger vertex index.
    pub hi: usize,
}

impl Uedge {
    /// Edge between `a` and `b` in either order.
    pub fn new(a: usize, b: usize) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    /// Whether `v` is an endpoint.
    pub fn contains(&self, v: usize) -> bool {
        self.lo == v || self.hi == v
    }

    /// The endpoint that is not `v`.
    pub fn other(&self, v: usize) -> Option<usize> {
        if v == self.lo {
            Some(self.hi)
        } else if v == self.hi {
            Some(self.lo)
        } else {
            None
        }
    }

    /// Both endpoints.
    pub fn ends(&self) -> [usize; 2] {
        [self.lo, self.hi]
    }

    /// Whether both endpoints are the same vertex.
    pub fn is_collapsed(&self) -> bool {
        self.lo == self.hi
    }
}

impl fmt::Display for Uedge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.lo, self.hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_free() {
        assert_eq!(Uedge::new(7, 3), Uedge::new(3, 7));
        let e = Uedge::new(7, 3);
        assert_eq!(e.other(3), Some(7));
        assert_eq!(e.other(5), None);
        assert_eq!(e.to_string(), "3-7");
        assert!(Uedge::new(2, 2).is_collapsed());
    }
}
