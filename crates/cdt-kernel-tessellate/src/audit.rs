//! Per-point provenance and mesh-defect diagnostics.

use std::collections::HashMap;

use cdt_kernel_brep::{EdgeId, FaceId, TrimId};
use cdt_kernel_math::{Point2, Point3};
use cdt_kernel_mesh::{Pool, SolidReport};
use tracing::warn;

/// Where a pool point came from inside one face.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Face whose tessellation uses the point.
    pub face: FaceId,
    /// Pool point index.
    pub point: usize,
    /// Trim the point was sampled on, `None` for interior points.
    pub trim: Option<TrimId>,
    /// Edge behind that trim, `None` for interior points and poles.
    pub edge: Option<EdgeId>,
    /// Parameter-space position inside the face.
    pub uv: Point2,
}

/// Append-only log of [`AuditRecord`]s, indexed by pool point.
#[derive(Debug, Clone, Default)]
pub struct AuditTrail {
    records: Vec<AuditRecord>,
    by_point: HashMap<usize, Vec<usize>>,
}

impl AuditTrail {
    /// Record a point use.
    pub fn push(&mut self, record: AuditRecord) {
        self.by_point
            .entry(record.point)
            .or_default()
            .push(self.records.len());
        self.records.push(record);
    }

    /// Every record for `point`, in insertion order.
    pub fn for_point(&self, point: usize) -> impl Iterator<Item = &AuditRecord> {
        self.by_point
            .get(&point)
            .into_iter()
            .flatten()
            .map(|&i| &self.records[i])
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_point.clear();
    }
}

/// Which validator check a diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectKind {
    /// Zero-area or collapsed triangle.
    Degenerate,
    /// Edge with more than two triangles.
    Excess,
    /// Edge with one triangle.
    Unmatched,
    /// Edge walked the same way by both triangles.
    Misoriented,
}

/// One defective point traced back to its sources.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Defect class.
    pub kind: DefectKind,
    /// Pool point involved.
    pub point: usize,
    /// Its model-space position.
    pub position: Point3,
    /// Every face, trim, and uv the point was produced from.
    pub sources: Vec<AuditRecord>,
}

/// Trace every defect in `report` to the audit trail and log it.
///
/// `triangles` must be the list the report was computed from.
pub fn diagnose(
    report: &SolidReport,
    triangles: &[[usize; 3]],
    pool: &Pool,
    trail: &AuditTrail,
) -> Vec<Diagnostic> {
    let mut points: Vec<(DefectKind, usize)> = Vec::new();
    for &t in &report.degenerate {
        points.extend(triangles[t].iter().map(|&p| (DefectKind::Degenerate, p)));
    }
    let edge_sets = [
        (DefectKind::Excess, &report.excess),
        (DefectKind::Unmatched, &report.unmatched),
        (DefectKind::Misoriented, &report.misoriented),
    ];
    for (kind, edges) in edge_sets {
        points.extend(edges.iter().flat_map(|e| e.ends().map(|p| (kind, p))));
    }
    points.sort_unstable_by_key(|&(k, p)| (k as u8, p));
    points.dedup();

    points
        .into_iter()
        .map(|(kind, point)| {
            let sources: Vec<AuditRecord> = trail.for_point(point).cloned().collect();
            let position = pool.point(point);
            for s in &sources {
                warn!(
                    ?kind,
                    point,
                    x = position.x,
                    y = position.y,
                    z = position.z,
                    face = ?s.face,
                    trim = ?s.trim,
                    edge = ?s.edge,
                    u = s.uv.x,
                    v = s.uv.y,
                    "mesh defect"
                );
            }
            if sources.is_empty() {
                warn!(?kind, point, "mesh defect at untracked point");
            }
            Diagnostic {
                kind,
                point,
                position,
                sources,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdt_kernel_mesh::Uedge;
    use slotmap::SlotMap;

    #[test]
    fn test_trail_lookup_and_diagnose() {
        let mut faces: SlotMap<FaceId, ()> = SlotMap::with_key();
        let f = faces.insert(());
        let mut pool = Pool::new();
        for i in 0..3 {
            pool.add_point(Point3::new(i as f64, 0.0, 0.0));
        }
        let mut trail = AuditTrail::default();
        for p in 0..3 {
            trail.push(AuditRecord {
                face: f,
                point: p,
                trim: None,
                edge: None,
                uv: Point2::new(p as f64, 0.0),
            });
        }
        assert_eq!(trail.len(), 3);
        assert_eq!(trail.for_point(1).count(), 1);
        assert_eq!(trail.for_point(7).count(), 0);

        let report = SolidReport {
            degenerate: vec![0],
            unmatched: vec![Uedge::new(0, 1)],
            ..Default::default()
        };
        let diags = diagnose(&report, &[[0, 1, 2]], &pool, &trail);
        // Three degenerate corners plus two unmatched endpoints.
        assert_eq!(diags.len(), 5);
        assert!(diags.iter().all(|d| d.sources.len() == 1));
        assert_eq!(diags[0].kind, DefectKind::Degenerate);
    }
}
