//! The detect-and-split loop.

use std::collections::{BTreeMap, HashMap, HashSet};

use cdt_kernel_brep::FaceId;
use cdt_kernel_math::{Aabb3, Point3};
use cdt_kernel_mesh::cmesh::edge_length;
use cdt_kernel_mesh::{Bvh, TriId, Uedge};
use cdt_kernel_tessellate::{SplitKind, Stage, TessState};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::contact::{classify, Contact, ContactCounts};
use crate::overt::VertexIndex;
use crate::{OverlapError, OverlapParams, Result};

/// A face of one object in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FaceKey {
    object: usize,
    face: FaceId,
}

/// A triangle pair from different objects that interpenetrates.
#[derive(Debug, Clone, Copy)]
struct Hit {
    a: (FaceKey, TriId),
    b: (FaceKey, TriId),
}

/// Summary of one [`resolve_overlaps`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlapReport {
    /// Detection passes run.
    pub iterations: usize,
    /// Interior edges split.
    pub interior_splits: usize,
    /// Boundary edges split.
    pub boundary_splits: usize,
    /// Actionable pairs found by the first pass.
    pub initial_overlaps: usize,
    /// Actionable pairs left when the loop stopped.
    pub remaining_overlaps: usize,
    /// Contacts seen by the last pass.
    pub contacts: ContactCounts,
    /// False when the iteration cap stopped the loop.
    pub converged: bool,
}

impl OverlapReport {
    /// Total edges split.
    pub fn splits(&self) -> usize {
        self.interior_splits + self.boundary_splits
    }
}

/// Refine the meshes of `states` until no two triangles from different
/// objects interpenetrate, or no remaining edge may be split.
///
/// Every state must have been validated as a closed manifold; otherwise
/// nothing is touched and [`OverlapError::UntrustedInput`] is returned.
/// After each batch of splits every changed state is revalidated and any
/// defect aborts the run with [`OverlapError::Inconsistent`]. Reaching
/// `max_iterations` is not an error: the report says `converged == false`.
pub fn resolve_overlaps(states: &mut [TessState], params: &OverlapParams) -> Result<OverlapReport> {
    params.validate()?;
    for (object, state) in states.iter().enumerate() {
        if state.stage() != Stage::Valid {
            return Err(OverlapError::UntrustedInput {
                object,
                stage: state.stage(),
            });
        }
    }

    let min_length = params.min_edge_length(scene_bounds(states).diagonal());
    let mut report = OverlapReport::default();

    loop {
        let (hits, contacts) = detect(states, params);
        if report.iterations == 0 {
            report.initial_overlaps = hits.len();
        }
        report.iterations += 1;
        report.contacts = contacts;
        report.remaining_overlaps = hits.len();
        debug!(
            iteration = report.iterations,
            overlaps = hits.len(),
            edge_touches = contacts.edge,
            "overlap pass"
        );
        if hits.is_empty() {
            report.converged = true;
            break;
        }

        let candidates = split_candidates(states, &hits, min_length);
        if candidates.is_empty() {
            // Every overlapping triangle is already at the length floor.
            report.converged = true;
            break;
        }
        if report.iterations > params.max_iterations {
            break;
        }

        let mut touched = HashSet::new();
        // Vertices as they stood at the start of this batch.
        let mut indices: HashMap<usize, VertexIndex> = HashMap::new();
        for (object, e) in candidates {
            let state = &mut states[object];
            let len = edge_length(&e, state.pool());
            if len <= min_length {
                continue;
            }
            let index = indices
                .entry(object)
                .or_insert_with(|| VertexIndex::build(state, params.contact_tolerance * min_length));
            let (a, b) = (state.pool().point(e.lo), state.pool().point(e.hi));
            let mid = a + (b - a) * 0.5;
            let occupied = index
                .near(&mid, params.contact_tolerance * len)
                .iter()
                .any(|v| v.point != e.lo && v.point != e.hi);
            if occupied {
                debug!(object, lo = e.lo, hi = e.hi, "midpoint already holds a vertex");
                continue;
            }
            match state.split_edge(e, params.snap_radius)? {
                Some((_, SplitKind::Interior)) => report.interior_splits += 1,
                Some((_, SplitKind::Boundary)) => report.boundary_splits += 1,
                None => continue,
            }
            touched.insert(object);
        }

        if touched.is_empty() {
            report.converged = true;
            break;
        }
        let mut touched: Vec<usize> = touched.into_iter().collect();
        touched.sort_unstable();
        revalidate(states, &touched)?;
    }

    info!(
        iterations = report.iterations,
        splits = report.splits(),
        remaining = report.remaining_overlaps,
        converged = report.converged,
        "overlap resolution finished"
    );
    Ok(report)
}

/// Validate every object in `objects`; the first defective one aborts.
fn revalidate(states: &mut [TessState], objects: &[usize]) -> Result<()> {
    for &object in objects {
        let check = states[object].validate()?;
        if !check.is_valid() {
            return Err(OverlapError::Inconsistent {
                object,
                issues: check.issue_count(),
            });
        }
    }
    Ok(())
}

fn scene_bounds(states: &[TessState]) -> Aabb3 {
    let mut bounds = Aabb3::empty();
    for state in states {
        for (_, f) in state.faces() {
            bounds.include_box(&f.mesh.bbox(state.pool()));
        }
    }
    bounds
}

fn corners(states: &[TessState], key: FaceKey, tri: TriId) -> Option<[Point3; 3]> {
    let state = &states[key.object];
    let mesh = &state.face_tess(key.face)?.mesh;
    Some(mesh.get(tri)?.corners(state.pool()))
}

/// Broad phase over face boxes, then triangle trees per candidate face pair.
fn detect(states: &[TessState], params: &OverlapParams) -> (Vec<Hit>, ContactCounts) {
    let mut face_boxes = Vec::new();
    let mut trees: HashMap<FaceKey, Bvh<TriId>> = HashMap::new();
    for (object, state) in states.iter().enumerate() {
        for (face, f) in state.faces() {
            let key = FaceKey { object, face };
            face_boxes.push((key, f.mesh.bbox(state.pool())));
            trees.insert(key, f.mesh.build_tree(state.pool()));
        }
    }
    let faces = Bvh::build(face_boxes);
    let mut pairs: Vec<(FaceKey, FaceKey)> = faces
        .overlapping_pairs(&faces)
        .into_iter()
        .filter(|(a, b)| a.object < b.object)
        .collect();
    // Tree order depends on box geometry only; sort for a stable split order.
    pairs.sort_by_key(|(a, b)| (a.object, a.face, b.object, b.face));

    let narrow = |&(ka, kb): &(FaceKey, FaceKey)| -> Vec<(Contact, Hit)> {
        let (Some(ta), Some(tb)) = (trees.get(&ka), trees.get(&kb)) else {
            return Vec::new();
        };
        ta.overlapping_pairs(tb)
            .into_iter()
            .filter_map(|(x, y)| {
                let a = corners(states, ka, x)?;
                let b = corners(states, kb, y)?;
                let contact = classify(&a, &b, params.contact_tolerance);
                Some((contact, Hit { a: (ka, x), b: (kb, y) }))
            })
            .collect()
    };
    let classified: Vec<Vec<(Contact, Hit)>> = if params.parallel {
        pairs.par_iter().map(narrow).collect()
    } else {
        pairs.iter().map(narrow).collect()
    };

    let mut counts = ContactCounts::default();
    let mut hits = Vec::new();
    for (contact, hit) in classified.into_iter().flatten() {
        counts.record(contact);
        if contact.is_actionable() {
            hits.push(hit);
        }
    }
    (hits, counts)
}

/// Edges to split this pass, longest first. The shortest edge of every
/// overlapping triangle is exempt, as is anything at or below `min_length`.
fn split_candidates(states: &[TessState], hits: &[Hit], min_length: f64) -> Vec<(usize, Uedge)> {
    let mut picked: BTreeMap<(usize, Uedge), f64> = BTreeMap::new();
    for hit in hits {
        for (key, tri) in [hit.a, hit.b] {
            let state = &states[key.object];
            let Some(t) = state.face_tess(key.face).and_then(|f| f.mesh.get(tri)) else {
                continue;
            };
            let mut edges: Vec<(f64, Uedge)> = t
                .uedges()
                .into_iter()
                .map(|e| (edge_length(&e, state.pool()), e))
                .collect();
            edges.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
            for &(len, e) in &edges[1..] {
                if len > min_length {
                    picked.insert((key.object, e), len);
                }
            }
        }
    }
    let mut out: Vec<((usize, Uedge), f64)> = picked.into_iter().collect();
    out.sort_by(|x, y| y.1.total_cmp(&x.1).then(x.0.cmp(&y.0)));
    out.into_iter().map(|(k, _)| k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdt_kernel_brep::{make_cube, Brep};
    use cdt_kernel_math::Transform;
    use cdt_kernel_tessellate::{TessStatus, TessellationParams};

    fn solid(brep: Brep) -> TessState {
        let mut state = TessState::new(brep, TessellationParams::default()).unwrap();
        assert_eq!(state.tessellate(None).unwrap(), TessStatus::Complete);
        assert_eq!(state.stage(), Stage::Valid);
        state
    }

    fn cube_at(dx: f64, dy: f64, dz: f64) -> TessState {
        let mut b = make_cube(1.0, 1.0, 1.0).unwrap();
        b.translate(dx, dy, dz).unwrap();
        solid(b)
    }

    #[test]
    fn test_touching_cubes_need_no_work() {
        // Faces at x = 1 and x = 0.5 planes only meet along edges or
        // coplanar patches.
        let mut states = vec![cube_at(0.0, 0.0, 0.0), cube_at(0.5, 0.0, 0.0)];
        let report = resolve_overlaps(&mut states, &OverlapParams::default()).unwrap();
        assert!(report.converged);
        assert_eq!(report.initial_overlaps, 0);
        assert_eq!(report.splits(), 0);
        assert!(report.contacts.coplanar > 0);
        assert_eq!(states[0].triangles().len(), 12);

        let again = resolve_overlaps(&mut states, &OverlapParams::default()).unwrap();
        assert_eq!(again, report);
    }

    #[test]
    fn test_penetrating_cubes_refine_and_stay_closed() {
        let mut states = vec![cube_at(0.0, 0.0, 0.0), cube_at(0.5, 0.25, 0.25)];
        let params = OverlapParams {
            length_threshold: Some(0.2),
            ..OverlapParams::default()
        };
        let report = resolve_overlaps(&mut states, &params).unwrap();
        assert!(report.initial_overlaps > 0);
        assert!(report.splits() > 0);
        assert!(report.boundary_splits > 0);
        assert!(report.converged);
        assert_eq!(report.remaining_overlaps, 0);
        assert!(report.iterations <= params.max_iterations);
        for state in &states {
            assert_eq!(state.stage(), Stage::Valid);
            assert!(state.triangles().len() > 12);
        }

        // Nothing is left for a second run to do.
        let before: Vec<_> = states.iter().map(TessState::triangles).collect();
        let again = resolve_overlaps(&mut states, &params).unwrap();
        assert_eq!(again.initial_overlaps, 0);
        assert_eq!(again.splits(), 0);
        assert!(again.converged);
        assert_eq!(states.iter().map(TessState::triangles).collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_defective_mesh_after_splits_is_inconsistent() {
        // An open shell stands in for a mesh broken by a split.
        let mut open = TessState::new(make_cube(1.0, 1.0, 1.0).unwrap(), TessellationParams::default()).unwrap();
        let all: Vec<FaceId> = open.brep().faces.keys().collect();
        open.tessellate(Some(&all[..3])).unwrap();
        let mut states = vec![cube_at(0.0, 0.0, 0.0), open];

        assert!(revalidate(&mut states, &[0]).is_ok());
        let err = revalidate(&mut states, &[0, 1]).unwrap_err();
        assert!(matches!(err, OverlapError::Inconsistent { object: 1, issues } if issues > 0));
        assert_eq!(states[1].stage(), Stage::Invalid);
    }

    #[test]
    fn test_iteration_cap_reports_not_converged() {
        let mut states = vec![cube_at(0.0, 0.0, 0.0), cube_at(0.5, 0.25, 0.25)];
        let params = OverlapParams {
            split_fraction: 0.01,
            max_iterations: 1,
            ..OverlapParams::default()
        };
        let report = resolve_overlaps(&mut states, &params).unwrap();
        assert!(!report.converged);
        assert_eq!(report.iterations, 2);
        assert!(report.remaining_overlaps > 0);
    }

    #[test]
    fn test_far_apart_objects() {
        let mut states = vec![cube_at(0.0, 0.0, 0.0), cube_at(5.0, 0.0, 0.0)];
        let report = resolve_overlaps(&mut states, &OverlapParams::default()).unwrap();
        assert!(report.converged);
        assert_eq!(report.contacts, ContactCounts::default());
        assert_eq!(report.iterations, 1);
    }

    #[test]
    fn test_rotated_cube_overlap_is_found() {
        let mut b = make_cube(1.0, 1.0, 1.0).unwrap();
        b.transform(&Transform::rotation_z(0.3).then(&Transform::translation(0.6, 0.2, 0.3)))
            .unwrap();
        let mut states = vec![cube_at(0.0, 0.0, 0.0), solid(b)];
        let params = OverlapParams {
            split_fraction: 0.1,
            ..OverlapParams::default()
        };
        let report = resolve_overlaps(&mut states, &params).unwrap();
        assert!(report.initial_overlaps > 0);
        assert!(states.iter().all(|s| s.stage() == Stage::Valid));
    }

    #[test]
    fn test_untrusted_input_is_refused() {
        let mut fresh = TessState::new(make_cube(1.0, 1.0, 1.0).unwrap(), TessellationParams::default()).unwrap();
        let all: Vec<FaceId> = fresh.brep().faces.keys().collect();
        fresh.tessellate(Some(&all[..2])).unwrap();
        assert_eq!(fresh.stage(), Stage::Assembled);
        let before = fresh.triangles();

        let mut states = vec![cube_at(0.0, 0.0, 0.0), fresh];
        let err = resolve_overlaps(&mut states, &OverlapParams::default()).unwrap_err();
        assert!(matches!(
            err,
            OverlapError::UntrustedInput {
                object: 1,
                stage: Stage::Assembled
            }
        ));
        assert_eq!(states[1].triangles(), before);
    }

    #[test]
    fn test_bad_params_rejected() {
        let mut states = vec![cube_at(0.0, 0.0, 0.0)];
        let params = OverlapParams {
            max_iterations: 0,
            ..OverlapParams::default()
        };
        assert!(matches!(
            resolve_overlaps(&mut states, &params),
            Err(OverlapError::InvalidArguments(_))
        ));
    }
}
