//! Tessellation state: everything one solid's tessellation owns.

use std::collections::{HashMap, HashSet};

use cdt_kernel_brep::{Brep, EdgeId, FaceId, VertexId};
use cdt_kernel_math::Point2;
use cdt_kernel_mesh::{validate_solid, CMesh, Pool, SolidReport, Uedge, ValidationOptions};
use slotmap::SecondaryMap;
use tracing::warn;

use crate::audit::{diagnose, AuditTrail, Diagnostic};
use crate::sampler::EdgeSample;
use crate::{Result, TessError, TessellationParams};

/// Pipeline stage reached by a [`TessState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Nothing computed yet.
    Unprocessed,
    /// Faces triangulated and merged into the pool.
    Tessellated,
    /// Degenerate and sliver triangles flagged.
    Scrubbed,
    /// Repairs applied; triangles ready for output.
    Assembled,
    /// Assembled and validated as a closed manifold.
    Valid,
    /// Assembled but validation found defects.
    Invalid,
}

/// Overall result of a tessellation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TessStatus {
    /// Every face tessellated and the mesh validated.
    Complete,
    /// Some faces failed, or the mesh did not validate.
    Partial,
    /// No face could be tessellated.
    Failed,
}

impl TessStatus {
    /// Numeric status: `0` complete, `1` partial, `-1` failed.
    pub fn code(self) -> i32 {
        match self {
            TessStatus::Complete => 0,
            TessStatus::Partial => 1,
            TessStatus::Failed => -1,
        }
    }
}

/// Per-face outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceStatus {
    /// Triangulated and merged.
    Tessellated,
    /// Could not be triangulated; carries the reason.
    Failed(String),
}

/// The edge-parameter span of one boundary mesh segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySegment {
    /// B-rep edge the segment lies on.
    pub edge: EdgeId,
    /// Curve parameter at the segment's first sample.
    pub t0: f64,
    /// Curve parameter at the segment's second sample.
    pub t1: f64,
}

/// Tessellation of one face.
#[derive(Debug, Clone, Default)]
pub struct FaceTess {
    /// Triangles in model space, outward wound.
    pub mesh: CMesh,
    /// Parameter-space points fed to the triangulator (and added by splits).
    pub uv: Vec<Point2>,
    /// Pool point of each entry of `uv`.
    pub points: Vec<usize>,
    /// Triangulator output over `uv` indices, counterclockwise.
    ///
    /// This is the triangulation as first built. Edge splits append to `uv`
    /// and `points` but never touch it; `mesh` is the current topology.
    pub triangles_2d: Vec<[usize; 3]>,
    /// Pool points that were sampled on a trim.
    pub trim_points: HashSet<usize>,
    pub(crate) uv_of: HashMap<usize, Point2>,
}

impl FaceTess {
    /// First parameter-space position recorded for a pool point.
    pub fn uv_of(&self, point: usize) -> Option<Point2> {
        self.uv_of.get(&point).copied()
    }
}

/// State of one solid's tessellation.
///
/// Owns the B-rep and every derived table. All mutation goes through
/// [`TessState::tessellate`], [`TessState::validate`], and
/// [`TessState::split_edge`].
#[derive(Debug)]
pub struct TessState {
    pub(crate) brep: Brep,
    pub(crate) params: TessellationParams,
    pub(crate) pool: Pool,
    pub(crate) vertex_points: SecondaryMap<VertexId, usize>,
    pub(crate) samples: SecondaryMap<EdgeId, Vec<EdgeSample>>,
    pub(crate) faces: SecondaryMap<FaceId, FaceTess>,
    pub(crate) status: SecondaryMap<FaceId, FaceStatus>,
    pub(crate) segments: HashMap<Uedge, BoundarySegment>,
    pub(crate) audit: AuditTrail,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) report: Option<SolidReport>,
    pub(crate) stage: Stage,
    pub(crate) subset: bool,
}

impl TessState {
    /// Wrap a B-rep for tessellation with the given parameters.
    pub fn new(brep: Brep, params: TessellationParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            brep,
            params,
            pool: Pool::new(),
            vertex_points: SecondaryMap::new(),
            samples: SecondaryMap::new(),
            faces: SecondaryMap::new(),
            status: SecondaryMap::new(),
            segments: HashMap::new(),
            audit: AuditTrail::default(),
            diagnostics: Vec::new(),
            report: None,
            stage: Stage::Unprocessed,
            subset: false,
        })
    }

    /// The solid being tessellated.
    pub fn brep(&self) -> &Brep {
        &self.brep
    }

    /// Parameters in use.
    pub fn params(&self) -> &TessellationParams {
        &self.params
    }

    /// Stage reached.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Shared point and normal arenas.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Whether the last run covered only some faces.
    pub fn is_subset(&self) -> bool {
        self.subset
    }

    /// Outcome of a face in the last run; `None` if it was not selected.
    pub fn face_status(&self, face: FaceId) -> Option<&FaceStatus> {
        self.status.get(face)
    }

    /// Tessellation of a face, if it succeeded.
    pub fn face_tess(&self, face: FaceId) -> Option<&FaceTess> {
        self.faces.get(face)
    }

    /// Every tessellated face.
    pub fn faces(&self) -> impl Iterator<Item = (FaceId, &FaceTess)> {
        self.faces.iter()
    }

    /// Samples of an edge, ordered by curve parameter.
    pub fn edge_samples(&self, edge: EdgeId) -> Option<&[EdgeSample]> {
        self.samples.get(edge).map(Vec::as_slice)
    }

    /// Edge span of a boundary mesh segment; `None` for interior edges.
    pub fn boundary_segment(&self, e: &Uedge) -> Option<&BoundarySegment> {
        self.segments.get(e)
    }

    /// Provenance of every pool point.
    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Defects found by the last failed validation.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Report of the last validation, if one ran.
    pub fn report(&self) -> Option<&SolidReport> {
        self.report.as_ref()
    }

    /// All triangles of all faces, as pool point triples.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        self.faces
            .values()
            .flat_map(|f| f.mesh.iter().map(|(_, t)| t.v))
            .collect()
    }

    /// Tessellated faces whose mesh uses `e`.
    pub fn faces_with_edge(&self, e: &Uedge) -> Vec<FaceId> {
        self.faces
            .iter()
            .filter(|(_, f)| !f.mesh.edge_tris(e).is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    /// Check the assembled triangles for closed-manifold defects, moving
    /// the state to [`Stage::Valid`] or [`Stage::Invalid`]. Defects are
    /// traced through the audit trail and logged.
    pub fn validate(&mut self) -> Result<SolidReport> {
        if self.stage < Stage::Assembled {
            return Err(TessError::InvalidArguments(
                "state has not been assembled".into(),
            ));
        }
        let triangles = self.triangles();
        let report = validate_solid(&self.pool.points, &triangles, &ValidationOptions::default());
        if report.is_valid() {
            self.stage = Stage::Valid;
            self.diagnostics.clear();
        } else {
            warn!(
                issues = report.issue_count(),
                degenerate = report.degenerate.len(),
                unmatched = report.unmatched.len(),
                "tessellated mesh is not a closed manifold"
            );
            self.diagnostics = diagnose(&report, &triangles, &self.pool, &self.audit);
            self.stage = Stage::Invalid;
        }
        self.report = Some(report.clone());
        Ok(report)
    }

    pub(crate) fn select_faces(&self, subset: Option<&[FaceId]>) -> Result<Vec<FaceId>> {
        let Some(ids) = subset else {
            return Ok(self.brep.faces.keys().collect());
        };
        if ids.is_empty() {
            return Err(TessError::InvalidArguments("empty face subset".into()));
        }
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            self.brep.face(id)?;
            if seen.insert(id) {
                out.push(id);
            }
        }
        Ok(out)
    }

    pub(crate) fn reset(&mut self) {
        self.pool = Pool::new();
        self.vertex_points.clear();
        self.samples.clear();
        self.faces.clear();
        self.status.clear();
        self.segments.clear();
        self.audit.clear();
        self.diagnostics.clear();
        self.report = None;
        self.stage = Stage::Unprocessed;
        self.subset = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdt_kernel_brep::make_cube;

    #[test]
    fn test_status_codes_and_stage_order() {
        assert_eq!(TessStatus::Complete.code(), 0);
        assert_eq!(TessStatus::Partial.code(), 1);
        assert_eq!(TessStatus::Failed.code(), -1);
        assert!(Stage::Unprocessed < Stage::Tessellated);
        assert!(Stage::Assembled < Stage::Valid);
        assert!(Stage::Assembled < Stage::Invalid);
    }

    #[test]
    fn test_new_state_is_unprocessed() {
        let mut state = TessState::new(make_cube(1.0, 1.0, 1.0).unwrap(), Default::default()).unwrap();
        assert_eq!(state.stage(), Stage::Unprocessed);
        assert!(state.triangles().is_empty());
        assert!(matches!(state.validate(), Err(TessError::InvalidArguments(_))));
    }

    #[test]
    fn test_select_faces_rejects_bad_subsets() {
        let state = TessState::new(make_cube(1.0, 1.0, 1.0).unwrap(), Default::default()).unwrap();
        assert!(matches!(state.select_faces(Some(&[])), Err(TessError::InvalidArguments(_))));
        let first = state.brep().faces.keys().next().unwrap();
        assert_eq!(state.select_faces(Some(&[first, first])).unwrap(), vec![first]);
        assert_eq!(state.select_faces(None).unwrap().len(), 6);

        let mut keys: slotmap::SlotMap<FaceId, ()> = slotmap::SlotMap::with_key();
        let unknown = (0..7).map(|_| keys.insert(())).last().unwrap();
        assert!(matches!(state.select_faces(Some(&[unknown])), Err(TessError::Brep(_))));
    }
}
