//! The tessellation pipeline and flat mesh output.

use std::collections::{BTreeSet, HashMap, HashSet};

use cdt_kernel_brep::{EdgeId, FaceId};
use cdt_kernel_math::{triangle_cross, Vec3};
use cdt_kernel_mesh::validate::is_degenerate;
use cdt_kernel_mesh::{BotMesh, Uedge};
use rayon::prelude::*;
use slotmap::SecondaryMap;
use tracing::{debug, info, warn};

use crate::audit::AuditRecord;
use crate::face::{tessellate_face, FaceInput, FaceOutput};
use crate::repair::{repair_region, RepairOutcome};
use crate::sampler::{check_manifold, face_area, sample_edge, segment_lengths};
use crate::state::{BoundarySegment, FaceStatus, FaceTess, Stage, TessState, TessStatus};
use crate::{Result, TessError};

impl TessState {
    /// Tessellate the whole solid, or only `face_subset`.
    ///
    /// Aborts on topology the tessellator cannot mesh (non-manifold edges,
    /// degenerate surfaces) or when local repair fails in both
    /// triangulators. Faces whose loops cannot be triangulated are recorded
    /// in [`TessState::face_status`] and the run reports
    /// [`TessStatus::Partial`]. Validation runs only on whole-solid runs.
    pub fn tessellate(&mut self, face_subset: Option<&[FaceId]>) -> Result<TessStatus> {
        let faces = self.select_faces(face_subset)?;
        self.reset();
        self.subset = faces.len() < self.brep.faces.len();

        for edge in self.brep.edges.keys() {
            check_manifold(&self.brep, edge)?;
        }
        let mut areas = SecondaryMap::new();
        for (face, f) in &self.brep.faces {
            // Faces without loops fail later, per face.
            if f.outer_loop.is_none() {
                continue;
            }
            let area = face_area(&self.brep, face);
            if !(area > 1e-18 && area.is_finite()) {
                return Err(TessError::DegenerateSurface { face, area });
            }
            areas.insert(face, area);
        }
        for (id, v) in &self.brep.vertices {
            let p = self.pool.add_point(v.point);
            self.vertex_points.insert(id, p);
        }

        let selected: HashSet<FaceId> = faces.iter().copied().collect();
        let edges: Vec<EdgeId> = self
            .brep
            .edges
            .iter()
            .filter(|(_, e)| e.trims.iter().any(|&t| selected.contains(&self.brep.trims[t].face)))
            .map(|(id, _)| id)
            .collect();
        for edge in edges {
            let lengths = segment_lengths(&self.brep, edge, &areas, &self.params);
            let samples = sample_edge(
                &self.brep,
                edge,
                lengths,
                &self.params,
                &self.vertex_points,
                &mut self.pool,
            )?;
            for w in samples.windows(2) {
                self.segments.insert(
                    Uedge::new(w[0].point, w[1].point),
                    BoundarySegment {
                        edge,
                        t0: w[0].t,
                        t1: w[1].t,
                    },
                );
            }
            self.samples.insert(edge, samples);
        }

        let outputs: Vec<(FaceId, Result<FaceOutput>)> = {
            let input = FaceInput {
                brep: &self.brep,
                samples: &self.samples,
                vertex_points: &self.vertex_points,
                areas: &areas,
                params: &self.params,
            };
            if self.params.parallel {
                faces
                    .par_iter()
                    .map(|&f| (f, tessellate_face(&input, f)))
                    .collect()
            } else {
                faces
                    .iter()
                    .map(|&f| (f, tessellate_face(&input, f)))
                    .collect()
            }
        };
        for (face, out) in outputs {
            match out {
                Ok(out) => {
                    self.merge_face(out);
                    self.status.insert(face, FaceStatus::Tessellated);
                }
                Err(err) => {
                    warn!(?face, %err, "face tessellation failed");
                    self.status.insert(face, FaceStatus::Failed(err.to_string()));
                }
            }
        }
        self.stage = Stage::Tessellated;

        for &face in &faces {
            self.fill_missing_normals(face);
        }
        let flagged = self.scrub(&faces);
        self.stage = Stage::Scrubbed;
        self.repair(&faces)?;
        self.reconcile_normals(&faces)?;
        self.stage = Stage::Assembled;

        if self.subset {
            debug!(faces = faces.len(), "face subset: validation skipped");
        } else {
            self.validate()?;
        }

        let done = faces
            .iter()
            .filter(|&&f| self.status.get(f) == Some(&FaceStatus::Tessellated))
            .count();
        let status = if done == 0 {
            TessStatus::Failed
        } else if done < faces.len() || self.stage == Stage::Invalid {
            TessStatus::Partial
        } else {
            TessStatus::Complete
        };
        info!(
            faces = faces.len(),
            failed = faces.len() - done,
            points = self.pool.num_points(),
            triangles = self.faces.values().map(|f| f.mesh.len()).sum::<usize>(),
            flagged,
            ?status,
            "tessellated solid"
        );
        Ok(status)
    }

    /// Move a face's staged points into the pool and build its mesh.
    fn merge_face(&mut self, out: FaceOutput) {
        let (point_offset, normal_offset) = self.pool.append(out.staged);
        let reversed = self.brep.faces[out.face].reversed;
        let points: Vec<usize> = out.points.iter().map(|r| r.resolve(point_offset)).collect();

        let mut tess = FaceTess {
            uv: out.uv,
            triangles_2d: out.triangles,
            points,
            ..Default::default()
        };
        for t in &tess.triangles_2d {
            let mut v = t.map(|i| tess.points[i]);
            if reversed {
                v.swap(1, 2);
            }
            // Collapsed on a pole or a seam; the neighbors close the gap.
            if v[0] == v[1] || v[1] == v[2] || v[2] == v[0] {
                continue;
            }
            tess.mesh.add(v);
        }
        for (i, n) in out.normals.iter().enumerate() {
            if let Some(n) = n {
                tess.mesh.set_normal(tess.points[i], n.resolve(normal_offset));
            }
        }
        for (i, source) in out.sources.iter().enumerate() {
            let point = tess.points[i];
            let uv = tess.uv[i];
            tess.uv_of.entry(point).or_insert(uv);
            let (trim, edge) = match *source {
                Some((trim, edge)) => {
                    tess.trim_points.insert(point);
                    (Some(trim), edge)
                }
                None => (None, None),
            };
            self.audit.push(AuditRecord {
                face: out.face,
                point,
                trim,
                edge,
                uv,
            });
        }
        self.faces.insert(out.face, tess);
    }

    /// Give points without a surface normal (poles) the area-weighted mean
    /// of their triangles' normals.
    fn fill_missing_normals(&mut self, face: FaceId) {
        let Some(tess) = self.faces.get_mut(face) else {
            return;
        };
        let mut sums: HashMap<usize, Vec3> = HashMap::new();
        for (_, t) in tess.mesh.iter() {
            if t.v.iter().all(|&p| tess.mesh.normal_of(p).is_some()) {
                continue;
            }
            let [a, b, c] = t.corners(&self.pool);
            let n = triangle_cross(&a, &b, &c);
            for &p in &t.v {
                if tess.mesh.normal_of(p).is_none() {
                    *sums.entry(p).or_insert_with(Vec3::zeros) += n;
                }
            }
        }
        let mut sums: Vec<(usize, Vec3)> = sums.into_iter().collect();
        sums.sort_unstable_by_key(|&(p, _)| p);
        for (p, n) in sums {
            if n.norm() > 0.0 {
                let id = self.pool.add_normal(n.normalize());
                tess.mesh.set_normal(p, id);
            }
        }
    }

    /// Flag collinear triangles and thin slivers hugging the trims.
    fn scrub(&mut self, faces: &[FaceId]) -> usize {
        let params = &self.params;
        let mut total = 0;
        for &face in faces {
            let Some(tess) = self.faces.get_mut(face) else {
                continue;
            };
            let flagged: Vec<_> = tess
                .mesh
                .iter()
                .filter(|(_, t)| {
                    let [a, b, c] = t.corners(&self.pool);
                    if is_degenerate(&a, &b, &c, params.collinear_tolerance) {
                        return true;
                    }
                    let on_trim = t.v.iter().filter(|p| tess.trim_points.contains(p)).count();
                    let longest = (b - a)
                        .norm_squared()
                        .max((c - b).norm_squared())
                        .max((a - c).norm_squared());
                    on_trim >= 2 && triangle_cross(&a, &b, &c).norm() < params.sliver_ratio * longest
                })
                .map(|(id, _)| id)
                .collect();
            total += flagged.len();
            for id in flagged {
                tess.mesh.mark_degenerate(id);
            }
        }
        if total > 0 {
            debug!(flagged = total, "scrub flagged triangles for repair");
        }
        total
    }

    /// Re-triangulate flagged triangles with their neighbors.
    fn repair(&mut self, faces: &[FaceId]) -> Result<()> {
        for &face in faces {
            let Some(tess) = self.faces.get_mut(face) else {
                continue;
            };
            for _ in 0..self.params.repair_passes {
                let flagged = tess.mesh.degenerate();
                if flagged.is_empty() {
                    break;
                }
                let mut progress = false;
                for id in flagged {
                    match repair_region(&mut tess.mesh, &self.pool, id, &self.params) {
                        Ok(RepairOutcome::Repaired) => progress = true,
                        Ok(RepairOutcome::Skipped) => {
                            let collinear = tess.mesh.get(id).is_some_and(|t| {
                                let [a, b, c] = t.corners(&self.pool);
                                is_degenerate(&a, &b, &c, self.params.collinear_tolerance)
                            });
                            if !collinear {
                                tess.mesh.clear_degenerate(id);
                            }
                        }
                        Err(source) => return Err(TessError::RepairExhausted { face, source }),
                    }
                }
                if !progress {
                    break;
                }
            }
            let left = tess.mesh.degenerate().len();
            if left > 0 {
                warn!(?face, left, "degenerate triangles survived repair");
            }
        }
        Ok(())
    }

    /// Repair triangles whose winding disagrees with all three vertex normals.
    fn reconcile_normals(&mut self, faces: &[FaceId]) -> Result<()> {
        for &face in faces {
            let Some(tess) = self.faces.get_mut(face) else {
                continue;
            };
            let flipped: Vec<_> = tess
                .mesh
                .iter()
                .filter(|(_, t)| {
                    let [a, b, c] = t.corners(&self.pool);
                    let n = triangle_cross(&a, &b, &c);
                    n.norm() > 0.0
                        && t.v.iter().all(|&p| {
                            tess.mesh
                                .normal_of(p)
                                .is_some_and(|id| self.pool.normal(id).dot(&n) < 0.0)
                        })
                })
                .map(|(id, _)| id)
                .collect();
            if !flipped.is_empty() {
                debug!(?face, count = flipped.len(), "reconciling flipped triangles");
            }
            for id in flipped {
                repair_region(&mut tess.mesh, &self.pool, id, &self.params)
                    .map_err(|source| TessError::RepairExhausted { face, source })?;
            }
        }
        Ok(())
    }

    /// Flatten the assembled triangles into a [`BotMesh`].
    ///
    /// Vertices are the pool points in use, in pool order, so points shared
    /// across faces become one vertex. With `want_normals`, each triangle
    /// corner gets the normal its face assigned to that point.
    pub fn mesh(&self, want_normals: bool) -> Result<BotMesh> {
        if self.stage < Stage::Assembled {
            return Err(TessError::InvalidArguments(
                "state has not been tessellated".into(),
            ));
        }
        let to_u32 = |i: usize| {
            u32::try_from(i).map_err(|_| TessError::InvalidArguments("mesh exceeds u32 indices".into()))
        };

        let used: BTreeSet<usize> = self.faces.values().flat_map(|f| f.mesh.points()).collect();
        let mut index = HashMap::with_capacity(used.len());
        let mut bot = BotMesh::new();
        for (i, &p) in used.iter().enumerate() {
            index.insert(p, to_u32(i)?);
            let q = self.pool.point(p);
            bot.vertices.extend_from_slice(&[q.x, q.y, q.z]);
        }

        let mut normals: Vec<f64> = Vec::new();
        let mut normal_index: HashMap<usize, u32> = HashMap::new();
        let mut face_normals: Vec<u32> = Vec::new();
        for tess in self.faces.values() {
            for (_, t) in tess.mesh.iter() {
                for &p in &t.v {
                    bot.faces.push(index[&p]);
                }
                if !want_normals {
                    continue;
                }
                for &p in &t.v {
                    let slot = match tess.mesh.normal_of(p) {
                        Some(n) => match normal_index.get(&n) {
                            Some(&slot) => slot,
                            None => {
                                let slot = to_u32(normals.len() / 3)?;
                                let v = self.pool.normal(n);
                                normals.extend_from_slice(&[v.x, v.y, v.z]);
                                normal_index.insert(n, slot);
                                slot
                            }
                        },
                        None => {
                            let [a, b, c] = t.corners(&self.pool);
                            let v = triangle_cross(&a, &b, &c).try_normalize(0.0).unwrap_or_else(Vec3::z);
                            let slot = to_u32(normals.len() / 3)?;
                            normals.extend_from_slice(&[v.x, v.y, v.z]);
                            slot
                        }
                    };
                    face_normals.push(slot);
                }
            }
        }
        if want_normals {
            bot.normals = Some(normals);
            bot.face_normals = Some(face_normals);
        }
        Ok(bot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cdt_kernel_brep::{make_cube, make_cylinder, make_sphere, make_tube, Brep, TrimKind};
    use cdt_kernel_math::Point3;
    use std::f64::consts::PI;

    use crate::TessellationParams;

    fn run(brep: Brep) -> (TessState, TessStatus) {
        let mut state = TessState::new(brep, TessellationParams::default()).unwrap();
        let status = state.tessellate(None).unwrap();
        (state, status)
    }

    fn assert_outward(bot: &BotMesh) {
        let c = bot.points().iter().fold(Vec3::zeros(), |s, p| s + p.coords) / bot.num_vertices() as f64;
        for i in 0..bot.num_triangles() {
            let [a, b, cc] = bot.face(i).map(|k| bot.vertex(k));
            let n = triangle_cross(&a, &b, &cc);
            let centroid = (a.coords + b.coords + cc.coords) / 3.0;
            // Convex primitives: every triangle faces away from the center.
            assert!(n.dot(&(centroid - c)) > 0.0, "triangle {i} faces inward");
        }
    }

    #[test]
    fn test_cube_minimal_mesh() {
        let (state, status) = run(make_cube(1.0, 1.0, 1.0).unwrap());
        assert_eq!(status, TessStatus::Complete);
        assert_eq!(state.stage(), Stage::Valid);
        let bot = state.mesh(false).unwrap();
        assert_eq!(bot.num_triangles(), 12);
        assert_eq!(bot.num_vertices(), 8);
        assert!(bot.validate().is_valid());
        assert_relative_eq!(bot.signed_volume(), 1.0, epsilon = 1e-12);
        assert!(bot.normals.is_none());
        assert_outward(&bot);
    }

    #[test]
    fn test_cube_normals_are_per_face() {
        let (state, _) = run(make_cube(2.0, 2.0, 2.0).unwrap());
        let bot = state.mesh(true).unwrap();
        let fnorm = bot.face_normals.as_ref().unwrap();
        assert_eq!(fnorm.len(), 36);
        for i in 0..bot.num_triangles() {
            let [a, b, c] = bot.face(i).map(|k| bot.vertex(k));
            let n = triangle_cross(&a, &b, &c).normalize();
            for k in 0..3 {
                let vn = bot.normal(fnorm[3 * i + k] as usize).unwrap();
                assert_relative_eq!(vn, n, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_sphere_is_closed_with_pole_normals() {
        let (state, status) = run(make_sphere(Point3::new(1.0, 2.0, 3.0), 2.0).unwrap());
        assert_eq!(status, TessStatus::Complete);
        let bot = state.mesh(true).unwrap();
        assert!(bot.validate().is_valid());
        let volume = 4.0 / 3.0 * PI * 8.0;
        assert_relative_eq!(bot.signed_volume(), volume, max_relative = 0.08);
        for p in bot.points() {
            assert_relative_eq!((p - Point3::new(1.0, 2.0, 3.0)).norm(), 2.0, epsilon = 1e-9);
        }
        // Every corner has a unit outward normal, poles included.
        let fnorm = bot.face_normals.as_ref().unwrap();
        for i in 0..bot.num_triangles() {
            for k in 0..3 {
                let p = bot.vertex(bot.face(i)[k]);
                let n = bot.normal(fnorm[3 * i + k] as usize).unwrap();
                assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-9);
                assert!(n.dot(&(p - Point3::new(1.0, 2.0, 3.0))) > 0.0);
            }
        }
        assert_outward(&bot);
    }

    #[test]
    fn test_cylinder_and_tube_are_valid() {
        let (state, status) = run(make_cylinder(1.0, 2.0).unwrap());
        assert_eq!(status, TessStatus::Complete);
        let bot = state.mesh(false).unwrap();
        assert!(bot.validate().is_valid());
        assert_relative_eq!(bot.signed_volume(), 2.0 * PI, max_relative = 0.05);
        assert_outward(&bot);

        let (state, status) = run(make_tube(2.0, 1.0, 1.0).unwrap());
        assert_eq!(status, TessStatus::Complete);
        let bot = state.mesh(false).unwrap();
        assert!(bot.validate().is_valid());
        assert_relative_eq!(bot.signed_volume(), 3.0 * PI, max_relative = 0.05);
    }

    #[test]
    fn test_coarse_periodic_faces_stay_closed() {
        let cases = [
            (make_cylinder(0.05, 10.0).unwrap(), 10.0),
            (make_cylinder(0.1, 10.0).unwrap(), 5.0),
            (make_sphere(Point3::origin(), 1.0).unwrap(), 3.0),
        ];
        for (brep, length_divisor) in cases {
            let params = TessellationParams {
                length_divisor,
                ..Default::default()
            };
            let mut state = TessState::new(brep, params).unwrap();
            assert_eq!(state.tessellate(None).unwrap(), TessStatus::Complete);
            assert_eq!(state.stage(), Stage::Valid);
            let bot = state.mesh(false).unwrap();
            assert!(bot.validate().is_valid());
            assert!(bot.signed_volume() > 0.0);
        }
    }

    #[test]
    fn test_vanishing_face_area_is_rejected() {
        let mut state = TessState::new(make_cube(1e-10, 1e-10, 1e-10).unwrap(), TessellationParams::default()).unwrap();
        assert!(matches!(
            state.tessellate(None),
            Err(TessError::DegenerateSurface { area, .. }) if area < 1e-18
        ));
        assert_eq!(state.stage(), Stage::Unprocessed);
    }

    #[test]
    fn test_repair_exhausted_when_region_collapses() {
        let (mut state, _) = run(make_cube(1.0, 1.0, 1.0).unwrap());
        let face = state.brep().faces.keys().next().unwrap();
        // Every ring point coincides, so neither triangulator has an area to fill.
        for p in state.pool.points.iter_mut() {
            *p = Point3::origin();
        }
        let tess = state.faces.get_mut(face).unwrap();
        let (seed, _) = tess.mesh.iter().next().unwrap();
        tess.mesh.mark_degenerate(seed);
        assert!(matches!(
            state.repair(&[face]),
            Err(TessError::RepairExhausted { face: f, .. }) if f == face
        ));
    }

    #[test]
    fn test_seam_edges_share_points() {
        let (state, _) = run(make_cylinder(1.0, 1.0).unwrap());
        let brep = state.brep();
        for (edge, e) in &brep.edges {
            let samples = state.edge_samples(edge).unwrap();
            let faces: Vec<FaceId> = e.trims.iter().map(|&t| brep.trims[t].face).collect();
            for w in samples.windows(2) {
                let seg = Uedge::new(w[0].point, w[1].point);
                assert_eq!(state.boundary_segment(&seg).unwrap().edge, edge);
                for f in &faces {
                    let n = state.face_tess(*f).unwrap().mesh.edge_tris(&seg).len();
                    let expected = if brep.trims[e.trims[0]].kind == TrimKind::Seam { 2 } else { 1 };
                    assert_eq!(n, expected);
                }
            }
        }
    }

    #[test]
    fn test_tessellation_is_deterministic() {
        let (a, _) = run(make_sphere(Point3::origin(), 1.0).unwrap());
        let mut state = TessState::new(
            make_sphere(Point3::origin(), 1.0).unwrap(),
            TessellationParams {
                parallel: false,
                ..Default::default()
            },
        )
        .unwrap();
        state.tessellate(None).unwrap();
        assert_eq!(a.mesh(true).unwrap(), state.mesh(true).unwrap());
    }

    #[test]
    fn test_face_subset_skips_validation() {
        let brep = make_cube(1.0, 1.0, 1.0).unwrap();
        let all: Vec<FaceId> = brep.faces.keys().collect();
        // Bottom and front share one edge.
        let faces = vec![all[0], all[2]];
        let mut state = TessState::new(brep, TessellationParams::default()).unwrap();
        let status = state.tessellate(Some(&faces)).unwrap();
        assert_eq!(status, TessStatus::Complete);
        assert!(state.is_subset());
        assert_eq!(state.stage(), Stage::Assembled);
        assert!(state.report().is_none());
        let bot = state.mesh(false).unwrap();
        assert_eq!(bot.num_triangles(), 4);
        assert_eq!(bot.num_vertices(), 6);
    }

    #[test]
    fn test_open_shell_is_rejected() {
        let mut brep = make_cube(1.0, 1.0, 1.0).unwrap();
        let face = brep.faces.keys().next().unwrap();
        let lp = brep.faces[face].outer_loop.unwrap();
        let trim = brep.loops[lp].trims[0];
        let edge = brep.trims[trim].edge.unwrap();
        brep.edges[edge].trims.retain(|&t| t != trim);
        let mut state = TessState::new(brep, TessellationParams::default()).unwrap();
        assert!(matches!(
            state.tessellate(None),
            Err(TessError::NonManifoldEdge { trims: 1, .. })
        ));
    }

    #[test]
    fn test_mesh_before_tessellate_is_rejected() {
        let state = TessState::new(make_cube(1.0, 1.0, 1.0).unwrap(), TessellationParams::default()).unwrap();
        assert!(matches!(state.mesh(true), Err(TessError::InvalidArguments(_))));
    }

    #[test]
    fn test_failed_face_is_recorded() {
        let mut brep = make_cube(1.0, 1.0, 1.0).unwrap();
        let face = brep.faces.keys().next().unwrap();
        brep.faces[face].outer_loop = None;
        let mut state = TessState::new(brep, TessellationParams::default()).unwrap();
        let status = state.tessellate(None).unwrap();
        assert_eq!(status, TessStatus::Partial);
        assert!(matches!(state.face_status(face), Some(FaceStatus::Failed(_))));
        assert_eq!(state.stage(), Stage::Invalid);
        assert!(!state.diagnostics().is_empty());
        assert!(state.diagnostics().iter().all(|d| !d.sources.is_empty()));
    }
}
