//! Ear clipping and hole bridging.

use cdt_kernel_math::predicates::{orient2d, Sign};
use cdt_kernel_math::{polygon_area_2d, Point2};

use crate::{Result, TriangulateError};

/// Triangulate a simple polygon given as indices into `points`.
///
/// Either winding is accepted; the returned triangles are counterclockwise.
pub fn ear_clip(points: &[Point2], polygon: &[usize]) -> Result<Vec<[usize; 3]>> {
    let ring = oriented_ring(points, polygon, true)?;
    clip_ring(points, ring)
}

/// Copy `polygon` with the requested winding, rejecting degenerate input.
pub(crate) fn oriented_ring(points: &[Point2], polygon: &[usize], ccw: bool) -> Result<Vec<usize>> {
    if polygon.len() < 3 {
        return Err(TriangulateError::TooFewPoints(polygon.len()));
    }
    let coords: Vec<Point2> = polygon.iter().map(|&i| points[i]).collect();
    let area = polygon_area_2d(&coords);
    if area == 0.0 || !area.is_finite() {
        return Err(TriangulateError::ZeroArea);
    }
    let mut ring = polygon.to_vec();
    if (area > 0.0) != ccw {
        ring.reverse();
    }
    Ok(ring)
}

/// Clip ears off a counterclockwise, weakly simple ring.
///
/// Bridged rings repeat vertex indices; repeated corners never block an ear.
pub(crate) fn clip_ring(points: &[Point2], mut ring: Vec<usize>) -> Result<Vec<[usize; 3]>> {
    let mut out = Vec::with_capacity(ring.len().saturating_sub(2));
    let mut start = 0;

    while ring.len() > 3 {
        let n = ring.len();
        let mut clipped = false;
        for k in 0..n {
            let i = (start + k) % n;
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            if is_ear(points, &ring, prev, i, next) {
                out.push([ring[prev], ring[i], ring[next]]);
                ring.remove(i);
                start = if prev < i { prev } else { prev - 1 };
                clipped = true;
                break;
            }
        }
        if !clipped {
            return Err(TriangulateError::NoEar { remaining: n });
        }
    }

    let [a, b, c] = [ring[0], ring[1], ring[2]];
    if orient2d(&points[a], &points[b], &points[c]) != Sign::Positive {
        return Err(TriangulateError::NoEar { remaining: 3 });
    }
    out.push([a, b, c]);
    Ok(out)
}

fn is_ear(points: &[Point2], ring: &[usize], prev: usize, i: usize, next: usize) -> bool {
    let (ia, ib, ic) = (ring[prev], ring[i], ring[next]);
    let (a, b, c) = (&points[ia], &points[ib], &points[ic]);
    if orient2d(a, b, c) != Sign::Positive {
        return false;
    }
    ring.iter().enumerate().all(|(j, &ip)| {
        if j == prev || j == i || j == next || ip == ia || ip == ib || ip == ic {
            return true;
        }
        let p = &points[ip];
        if p == a || p == b || p == c {
            return true;
        }
        !in_triangle_closed(p, a, b, c)
    })
}

/// Inside or on the boundary of the counterclockwise triangle `(a, b, c)`.
fn in_triangle_closed(p: &Point2, a: &Point2, b: &Point2, c: &Point2) -> bool {
    orient2d(a, b, p) != Sign::Negative
        && orient2d(b, c, p) != Sign::Negative
        && orient2d(c, a, p) != Sign::Negative
}

fn on_segment(p: &Point2, a: &Point2, b: &Point2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Whether segments `p1-p2` and `q1-q2` share any point.
pub(crate) fn segments_touch(p1: &Point2, p2: &Point2, q1: &Point2, q2: &Point2) -> bool {
    let d1 = orient2d(q1, q2, p1);
    let d2 = orient2d(q1, q2, p2);
    let d3 = orient2d(p1, p2, q1);
    let d4 = orient2d(p1, p2, q2);
    if d1 != d2 && d3 != d4 && d1 != Sign::Zero && d2 != Sign::Zero && d3 != Sign::Zero && d4 != Sign::Zero {
        return true;
    }
    (d1 == Sign::Zero && on_segment(p1, q1, q2))
        || (d2 == Sign::Zero && on_segment(p2, q1, q2))
        || (d3 == Sign::Zero && on_segment(q1, p1, p2))
        || (d4 == Sign::Zero && on_segment(q2, p1, p2))
}

/// Whether direction `v -> target` leaves `v` into the region on the left of
/// the ring corner `prev -> v -> next`.
fn in_corner_wedge(prev: &Point2, v: &Point2, next: &Point2, target: &Point2) -> bool {
    if orient2d(prev, v, next) == Sign::Positive {
        orient2d(prev, v, target) == Sign::Positive && orient2d(v, next, target) == Sign::Positive
    } else {
        orient2d(prev, v, target) == Sign::Positive || orient2d(v, next, target) == Sign::Positive
    }
}

/// Merge clockwise `holes` into the counterclockwise `outer` ring with
/// zero-width bridges, producing one weakly simple ring.
///
/// Holes are merged rightmost first. Each bridge is the shortest
/// vertex-to-vertex segment that leaves both corners into the face and
/// touches no loop segment other than at its own endpoints.
pub(crate) fn bridge_holes(points: &[Point2], outer: Vec<usize>, holes: &[Vec<usize>]) -> Result<Vec<usize>> {
    let mut order: Vec<usize> = (0..holes.len()).collect();
    let rightmost = |h: &Vec<usize>| h.iter().map(|&i| points[i].x).fold(f64::NEG_INFINITY, f64::max);
    order.sort_by(|&a, &b| rightmost(&holes[b]).total_cmp(&rightmost(&holes[a])));

    let mut ring = outer;
    for &hi in &order {
        let hole = &holes[hi];
        let m = hole.len();
        let mut candidates: Vec<(f64, usize, usize)> = Vec::with_capacity(m * ring.len());
        for (hp, &h) in hole.iter().enumerate() {
            for (rp, &r) in ring.iter().enumerate() {
                candidates.push(((points[h] - points[r]).norm_squared(), hp, rp));
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = ring.len();
        let chosen = candidates.into_iter().find(|&(_, hp, rp)| {
            let (h, r) = (hole[hp], ring[rp]);
            let (ph, pr) = (&points[h], &points[r]);
            if ph == pr {
                return false;
            }
            let ring_ok = in_corner_wedge(&points[ring[(rp + n - 1) % n]], pr, &points[ring[(rp + 1) % n]], ph);
            let hole_ok = in_corner_wedge(&points[hole[(hp + m - 1) % m]], ph, &points[hole[(hp + 1) % m]], pr);
            ring_ok && hole_ok && bridge_is_clear(points, h, r, &ring, holes)
        });
        let Some((_, hp, rp)) = chosen else {
            return Err(TriangulateError::HoleBridge(hi));
        };

        let bridge_outer = ring[rp];
        let mut merged = Vec::with_capacity(n + m + 2);
        merged.extend_from_slice(&ring[..=rp]);
        merged.extend((0..m).map(|k| hole[(hp + k) % m]));
        merged.push(hole[hp]);
        merged.push(bridge_outer);
        merged.extend_from_slice(&ring[rp + 1..]);
        ring = merged;
    }
    Ok(ring)
}

fn bridge_is_clear(points: &[Point2], h: usize, r: usize, ring: &[usize], holes: &[Vec<usize>]) -> bool {
    let (ph, pr) = (points[h], points[r]);
    let loops = std::iter::once(ring).chain(holes.iter().map(|v| v.as_slice()));
    for lp in loops {
        let n = lp.len();
        for k in 0..n {
            let (s0, s1) = (lp[k], lp[(k + 1) % n]);
            if s0 == h || s0 == r || s1 == h || s1 == r {
                continue;
            }
            let (q0, q1) = (points[s0], points[s1]);
            if q0 == ph || q0 == pr || q1 == ph || q1 == pr {
                continue;
            }
            if segments_touch(&ph, &pr, &q0, &q1) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn area(points: &[Point2], tris: &[[usize; 3]]) -> f64 {
        tris.iter()
            .map(|t| polygon_area_2d(&[points[t[0]], points[t[1]], points[t[2]]]))
            .sum()
    }

    #[test]
    fn test_square() {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ];
        let tris = ear_clip(&pts, &[0, 1, 2, 3]).unwrap();
        assert_eq!(tris.len(), 2);
        assert_relative_eq!(area(&pts, &tris), 1.0);
    }

    #[test]
    fn test_clockwise_input_gives_ccw_output() {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 0.0),
        ];
        let tris = ear_clip(&pts, &[0, 1, 2, 3]).unwrap();
        for t in &tris {
            assert_eq!(orient2d(&pts[t[0]], &pts[t[1]], &pts[t[2]]), Sign::Positive);
        }
    }

    #[test]
    fn test_concave_with_collinear_runs() {
        // L-shape with extra points along the long sides.
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(2.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 2.0),
            Point2::new(0.0, 2.0),
            Point2::new(0.0, 1.0),
        ];
        let poly: Vec<usize> = (0..pts.len()).collect();
        let tris = ear_clip(&pts, &poly).unwrap();
        assert_eq!(tris.len(), pts.len() - 2);
        assert_relative_eq!(area(&pts, &tris), 3.0, epsilon = 1e-12);
        for t in &tris {
            assert_eq!(orient2d(&pts[t[0]], &pts[t[1]], &pts[t[2]]), Sign::Positive);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        let pts = [Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), Point2::new(2.0, 2.0)];
        assert_eq!(ear_clip(&pts, &[0, 1, 2]), Err(TriangulateError::ZeroArea));
        assert_eq!(ear_clip(&pts, &[0, 1]), Err(TriangulateError::TooFewPoints(2)));
    }

    #[test]
    fn test_bridged_ring_clips() {
        let pts = [
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 4.0),
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 3.0),
            Point2::new(3.0, 3.0),
            Point2::new(3.0, 1.0),
        ];
        let ring = bridge_holes(&pts, vec![0, 1, 2, 3], &[vec![4, 5, 6, 7]]).unwrap();
        assert_eq!(ring.len(), 4 + 4 + 2);
        let tris = clip_ring(&pts, ring).unwrap();
        assert_eq!(tris.len(), 8);
        assert_relative_eq!(area(&pts, &tris), 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_segments_touch() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(2.0, 0.0);
        assert!(segments_touch(&a, &b, &Point2::new(1.0, -1.0), &Point2::new(1.0, 1.0)));
        assert!(segments_touch(&a, &b, &Point2::new(1.0, 0.0), &Point2::new(1.0, 1.0)));
        assert!(!segments_touch(&a, &b, &Point2::new(3.0, 0.0), &Point2::new(4.0, 0.0)));
        assert!(!segments_touch(&a, &b, &Point2::new(0.0, 1.0), &Point2::new(2.0, 1.0)));
    }
}
