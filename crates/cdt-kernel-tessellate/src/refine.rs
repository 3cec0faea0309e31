//! Edge splits on an assembled tessellation.
//!
//! A boundary segment is split on its B-rep edge curve and the new sample is
//! shared by both adjacent faces; an interior edge is split at its midpoint
//! snapped back onto the face surface. Either way every triangle on the edge
//! is split, so a closed mesh stays closed.

use cdt_kernel_brep::FaceId;
use cdt_kernel_math::{Point2, Point3, Vec3};
use cdt_kernel_mesh::Uedge;
use tracing::trace;

use crate::audit::AuditRecord;
use crate::sampler::{outward_normal, EdgeSample};
use crate::state::{BoundarySegment, Stage, TessState};
use crate::{Result, TessError};

/// Which kind of mesh edge a split hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// A segment of a sampled B-rep edge.
    Boundary,
    /// An edge inside a face.
    Interior,
}

impl TessState {
    /// Split mesh edge `e` at its midpoint, returning the new pool point.
    ///
    /// Interior midpoints are snapped onto the surface when the snapped
    /// point lies within `snap_radius * |e|` of the midpoint. Returns `None`
    /// when no face uses `e`. Leaves the state at [`Stage::Assembled`];
    /// call [`TessState::validate`] afterwards.
    pub fn split_edge(&mut self, e: Uedge, snap_radius: f64) -> Result<Option<(usize, SplitKind)>> {
        if self.stage < Stage::Assembled {
            return Err(TessError::InvalidArguments(
                "state has not been assembled".into(),
            ));
        }
        let faces = self.faces_with_edge(&e);
        if faces.is_empty() {
            return Ok(None);
        }
        let out = match self.segments.get(&e).copied() {
            Some(seg) => (self.split_boundary(e, seg)?, SplitKind::Boundary),
            None => (self.split_interior(e, &faces, snap_radius), SplitKind::Interior),
        };
        self.stage = Stage::Assembled;
        trace!(lo = e.lo, hi = e.hi, point = out.0, kind = ?out.1, "split edge");
        Ok(Some(out))
    }

    fn split_boundary(&mut self, e: Uedge, seg: BoundarySegment) -> Result<usize> {
        let edge = seg.edge;
        let trims = {
            let t = &self.brep.edges[edge].trims;
            [t[0], t[1]]
        };
        let tm = 0.5 * (seg.t0 + seg.t1);
        let point = self.pool.add_point(self.brep.edge_point(edge, tm));
        let trim_uv = trims.map(|t| self.brep.trim_uv(t, tm));
        let mut normals = [None, None];
        for k in 0..2 {
            let face = self.brep.trims[trims[k]].face;
            normals[k] = outward_normal(&self.brep, face, trim_uv[k]).map(|n| self.pool.add_normal(n));
        }

        let samples = self.samples.get_mut(edge).ok_or_else(|| {
            TessError::InvalidArguments(format!("edge {edge:?} was not sampled"))
        })?;
        let i = samples
            .iter()
            .position(|s| s.t == seg.t0)
            .filter(|&i| i + 1 < samples.len())
            .ok_or_else(|| TessError::InvalidArguments("boundary segment out of date".into()))?;
        samples.insert(
            i + 1,
            EdgeSample {
                edge,
                t: tm,
                point,
                trim_uv,
                normals,
            },
        );
        let (a, b) = (samples[i].point, samples[i + 2].point);
        self.segments.remove(&e);
        self.segments.insert(
            Uedge::new(a, point),
            BoundarySegment {
                edge,
                t0: seg.t0,
                t1: tm,
            },
        );
        self.segments.insert(
            Uedge::new(point, b),
            BoundarySegment {
                edge,
                t0: tm,
                t1: seg.t1,
            },
        );

        for k in 0..2 {
            let face = self.brep.trims[trims[k]].face;
            let Some(tess) = self.faces.get_mut(face) else {
                continue;
            };
            if !tess.mesh.edge_tris(&e).is_empty() {
                tess.mesh.split_edge(&e, point);
            }
            if let (Some(n), None) = (normals[k], tess.mesh.normal_of(point)) {
                tess.mesh.set_normal(point, n);
            }
            tess.trim_points.insert(point);
            tess.uv_of.entry(point).or_insert(trim_uv[k]);
            tess.uv.push(trim_uv[k]);
            tess.points.push(point);
            self.audit.push(AuditRecord {
                face,
                point,
                trim: Some(trims[k]),
                edge: Some(edge),
                uv: trim_uv[k],
            });
        }
        Ok(point)
    }

    fn split_interior(&mut self, e: Uedge, faces: &[FaceId], snap_radius: f64) -> usize {
        let (pa, pb) = (self.pool.point(e.lo), self.pool.point(e.hi));
        let mid = pa + (pb - pa) * 0.5;
        let radius = snap_radius * (pb - pa).norm();

        let snap = |face: FaceId, target: &Point3| -> (Point3, Point2) {
            let hint = self.uv_hint(face, &e);
            let surface = self.brep.face_surface(face);
            match surface.closest_point(target, hint) {
                Some(uv) => {
                    let p = surface.evaluate(uv);
                    if (p - target).norm() <= radius {
                        (p, uv)
                    } else {
                        (*target, uv)
                    }
                }
                None => (*target, hint),
            }
        };
        let (position, first_uv) = snap(faces[0], &mid);
        let uvs: Vec<Point2> = faces
            .iter()
            .enumerate()
            .map(|(i, &f)| if i == 0 { first_uv } else { snap(f, &position).1 })
            .collect();
        let point = self.pool.add_point(position);

        for (&face, &uv) in faces.iter().zip(&uvs) {
            let fallback = self.faces.get(face).and_then(|tess| {
                let n: Vec3 = e
                    .ends()
                    .iter()
                    .filter_map(|&p| tess.mesh.normal_of(p))
                    .map(|n| self.pool.normal(n))
                    .sum();
                n.try_normalize(0.0)
            });
            let normal = outward_normal(&self.brep, face, uv)
                .or(fallback)
                .map(|n| self.pool.add_normal(n));
            let Some(tess) = self.faces.get_mut(face) else {
                continue;
            };
            tess.mesh.split_edge(&e, point);
            if let Some(n) = normal {
                tess.mesh.set_normal(point, n);
            }
            tess.uv_of.entry(point).or_insert(uv);
            tess.uv.push(uv);
            tess.points.push(point);
            self.audit.push(AuditRecord {
                face,
                point,
                trim: None,
                edge: None,
                uv,
            });
        }
        point
    }

    /// Parameter-space guess for the midpoint of `e` in `face`.
    fn uv_hint(&self, face: FaceId, e: &Uedge) -> Point2 {
        let Some(tess) = self.faces.get(face) else {
            return Point2::origin();
        };
        match (tess.uv_of(e.lo), tess.uv_of(e.hi)) {
            (Some(a), Some(b)) => a + (b - a) * 0.5,
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => Point2::origin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cdt_kernel_brep::{make_cube, make_cylinder};
    use cdt_kernel_mesh::cmesh::edge_length;

    use crate::TessellationParams;

    fn assembled(brep: cdt_kernel_brep::Brep) -> TessState {
        let mut state = TessState::new(brep, TessellationParams::default()).unwrap();
        state.tessellate(None).unwrap();
        state
    }

    #[test]
    fn test_boundary_split_keeps_cube_closed() {
        let mut state = assembled(make_cube(1.0, 1.0, 1.0).unwrap());
        let e = Uedge::new(0, 1);
        let seg = *state.boundary_segment(&e).unwrap();
        let (p, kind) = state.split_edge(e, 0.1).unwrap().unwrap();
        assert_eq!(kind, SplitKind::Boundary);
        assert_relative_eq!(state.pool().point(p), Point3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert_eq!(state.edge_samples(seg.edge).unwrap().len(), 3);
        assert!(state.boundary_segment(&e).is_none());
        assert!(state.boundary_segment(&Uedge::new(0, p)).is_some());
        assert_eq!(state.faces_with_edge(&Uedge::new(p, 1)).len(), 2);
        assert!(state.validate().unwrap().is_valid());
        assert_eq!(state.mesh(false).unwrap().num_triangles(), 14);
    }

    #[test]
    fn test_interior_split_snaps_to_surface() {
        let mut state = assembled(make_cylinder(1.0, 1.0).unwrap());
        let lateral = state
            .brep()
            .faces
            .iter()
            .find(|(_, f)| state.brep().surfaces[f.surface].is_closed_u())
            .map(|(id, _)| id)
            .unwrap();
        let e = {
            let tess = state.face_tess(lateral).unwrap();
            let pool = state.pool();
            tess.mesh
                .uedges()
                .filter(|e| state.boundary_segment(e).is_none())
                .max_by(|a, b| edge_length(a, pool).total_cmp(&edge_length(b, pool)))
                .copied()
                .unwrap()
        };
        let (p, kind) = state.split_edge(e, 0.5).unwrap().unwrap();
        assert_eq!(kind, SplitKind::Interior);
        let q = state.pool().point(p);
        assert_relative_eq!(q.x.hypot(q.y), 1.0, epsilon = 1e-9);
        assert!(state.validate().unwrap().is_valid());
        assert!(state.face_tess(lateral).unwrap().mesh.normal_of(p).is_some());
        assert_eq!(state.audit().for_point(p).count(), 1);
    }

    #[test]
    fn test_split_leaves_initial_triangulation() {
        let mut state = assembled(make_cube(1.0, 1.0, 1.0).unwrap());
        let e = Uedge::new(0, 1);
        let before: Vec<(FaceId, usize, Vec<[usize; 3]>)> = state
            .faces_with_edge(&e)
            .into_iter()
            .map(|f| {
                let tess = state.face_tess(f).unwrap();
                (f, tess.uv.len(), tess.triangles_2d.clone())
            })
            .collect();
        let (p, _) = state.split_edge(e, 0.1).unwrap().unwrap();
        for (f, n, tris) in before {
            let tess = state.face_tess(f).unwrap();
            assert_eq!(tess.triangles_2d, tris);
            assert_eq!(tess.uv.len(), n + 1);
            assert_eq!(tess.points.last(), Some(&p));
            assert!(tess.triangles_2d.iter().flatten().all(|&i| i < n));
            assert_eq!(tess.mesh.len(), 3);
        }
    }

    #[test]
    fn test_split_unknown_edge_is_noop() {
        let mut state = assembled(make_cube(1.0, 1.0, 1.0).unwrap());
        assert_eq!(state.split_edge(Uedge::new(0, 6), 0.1).unwrap(), None);
        let mut fresh = TessState::new(make_cube(1.0, 1.0, 1.0).unwrap(), TessellationParams::default()).unwrap();
        assert!(fresh.split_edge(Uedge::new(0, 1), 0.1).is_err());
    }
}
