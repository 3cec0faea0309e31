#![warn(missing_docs)]

//! Trimmed boundary-representation data model for the CDT tessellation kernel.
//!
//! Topology lives in `slotmap` arenas keyed by typed ids; geometry lives in
//! plain vectors indexed by `usize`. Every trim is co-parameterized with the
//! edge it uses: evaluating the trim's pcurve at an edge parameter `t` gives
//! the surface `(u, v)` of the edge point `curve(t)`. Trims without an edge
//! are singular: their whole pcurve maps to one vertex (a surface pole).

mod primitives;

pub use primitives::{make_cube, make_cylinder, make_sphere, make_tube};

use cdt_kernel_geom::{Curve2d, Curve3d, Surface};
use cdt_kernel_math::{Point2, Point3, Transform};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

new_key_type! {
    /// Handle to a B-rep vertex.
    pub struct VertexId;
    /// Handle to a B-rep edge.
    pub struct EdgeId;
    /// Handle to a trim (a pcurve use of an edge inside one loop).
    pub struct TrimId;
    /// Handle to a trimming loop.
    pub struct LoopId;
    /// Handle to a face.
    pub struct FaceId;
}

/// Errors raised while building or editing a B-rep.
#[derive(Debug, Error)]
pub enum BrepError {
    /// A primitive was asked for a non-positive dimension.
    #[error("invalid dimension {name} = {value}")]
    InvalidDimension {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A face id does not belong to this B-rep.
    #[error("unknown face {0:?}")]
    UnknownFace(FaceId),
    /// Transforms that stretch space would break the pcurve parameterization.
    #[error("transform is not rigid")]
    NonRigidTransform,
}

/// Result type for B-rep operations.
pub type Result<T> = std::result::Result<T, BrepError>;

/// A topological vertex.
#[derive(Debug, Clone)]
pub struct Vertex {
    /// Position in model space.
    pub point: Point3,
}

/// A topological edge: a bounded piece of a 3D curve.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Index into [`Brep::curves`].
    pub curve: usize,
    /// Parameter interval of the curve used by this edge.
    pub domain: (f64, f64),
    /// Vertex at `domain.0`.
    pub start: VertexId,
    /// Vertex at `domain.1`.
    pub end: VertexId,
    /// Trims that use this edge.
    pub trims: Vec<TrimId>,
}

impl Edge {
    /// Whether the edge starts and ends at the same vertex.
    pub fn is_closed(&self) -> bool {
        self.start == self.end
    }
}

/// Role of a trim inside its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimKind {
    /// The edge is used by this trim only.
    Boundary,
    /// The edge is shared with a trim of another face.
    Mated,
    /// The edge is used twice by the same face (periodic surface seam).
    Seam,
    /// The trim collapses to a single vertex in 3D.
    Singular,
}

/// A trim: the image of an edge (or pole) in a face's parameter space.
#[derive(Debug, Clone)]
pub struct Trim {
    /// Index into [`Brep::pcurves`].
    pub pcurve: usize,
    /// The edge, or `None` for singular trims.
    pub edge: Option<EdgeId>,
    /// Traversal runs from the edge end to the edge start.
    pub reversed: bool,
    /// Role in the loop.
    pub kind: TrimKind,
    /// Owning loop.
    pub loop_id: LoopId,
    /// Owning face.
    pub face: FaceId,
    /// Pole vertex for singular trims.
    pub vertex: Option<VertexId>,
}

/// Whether a loop bounds the face from outside or cuts a hole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// Outer boundary.
    Outer,
    /// Hole boundary.
    Inner,
}

/// An ordered, closed sequence of trims.
#[derive(Debug, Clone)]
pub struct Loop {
    /// Outer or inner.
    pub kind: LoopKind,
    /// Owning face.
    pub face: FaceId,
    /// Trims in traversal order.
    pub trims: Vec<TrimId>,
}

/// A trimmed face.
#[derive(Debug, Clone)]
pub struct Face {
    /// Index into [`Brep::surfaces`].
    pub surface: usize,
    /// Outer loop, once added.
    pub outer_loop: Option<LoopId>,
    /// Hole loops.
    pub inner_loops: Vec<LoopId>,
    /// The outward normal opposes the surface normal.
    pub reversed: bool,
}

/// A trimmed B-rep solid: topology arenas plus geometry storage.
#[derive(Debug, Clone, Default)]
pub struct Brep {
    /// Vertex arena.
    pub vertices: SlotMap<VertexId, Vertex>,
    /// Edge arena.
    pub edges: SlotMap<EdgeId, Edge>,
    /// Trim arena.
    pub trims: SlotMap<TrimId, Trim>,
    /// Loop arena.
    pub loops: SlotMap<LoopId, Loop>,
    /// Face arena.
    pub faces: SlotMap<FaceId, Face>,
    /// Face surfaces.
    pub surfaces: Vec<Box<dyn Surface>>,
    /// Edge curves.
    pub curves: Vec<Box<dyn Curve3d>>,
    /// Trim curves in surface parameter space.
    pub pcurves: Vec<Box<dyn Curve2d>>,
}

impl Brep {
    /// Create an empty B-rep.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex.
    pub fn add_vertex(&mut self, point: Point3) -> VertexId {
        self.vertices.insert(Vertex { point })
    }

    /// Add a surface, returning its index.
    pub fn add_surface(&mut self, surface: Box<dyn Surface>) -> usize {
        self.surfaces.push(surface);
        self.surfaces.len() - 1
    }

    /// Add a 3D curve, returning its index.
    pub fn add_curve(&mut self, curve: Box<dyn Curve3d>) -> usize {
        self.curves.push(curve);
        self.curves.len() - 1
    }

    /// Add a 2D trim curve, returning its index.
    pub fn add_pcurve(&mut self, pcurve: Box<dyn Curve2d>) -> usize {
        self.pcurves.push(pcurve);
        self.pcurves.len() - 1
    }

    /// Add an edge over the whole domain of `curve`.
    pub fn add_edge(&mut self, curve: usize, start: VertexId, end: VertexId) -> EdgeId {
        let domain = self.curves[curve].domain();
        self.edges.insert(Edge {
            curve,
            domain,
            start,
            end,
            trims: Vec::new(),
        })
    }

    /// Add a face on `surface` with no loops yet.
    pub fn add_face(&mut self, surface: usize, reversed: bool) -> FaceId {
        self.faces.insert(Face {
            surface,
            outer_loop: None,
            inner_loops: Vec::new(),
            reversed,
        })
    }

    /// Add an empty loop to `face`.
    pub fn add_loop(&mut self, face: FaceId, kind: LoopKind) -> LoopId {
        let id = self.loops.insert(Loop {
            kind,
            face,
            trims: Vec::new(),
        });
        let f = &mut self.faces[face];
        match kind {
            LoopKind::Outer => f.outer_loop = Some(id),
            LoopKind::Inner => f.inner_loops.push(id),
        }
        id
    }

    /// Append a trim of `edge` to `loop_id`. `pcurve` must share the edge's
    /// parameterization.
    pub fn add_edge_trim(
        &mut self,
        loop_id: LoopId,
        edge: EdgeId,
        pcurve: usize,
        reversed: bool,
        kind: TrimKind,
    ) -> TrimId {
        let face = self.loops[loop_id].face;
        let id = self.trims.insert(Trim {
            pcurve,
            edge: Some(edge),
            reversed,
            kind,
            loop_id,
            face,
            vertex: None,
        });
        self.loops[loop_id].trims.push(id);
        self.edges[edge].trims.push(id);
        id
    }

    /// Append a singular trim collapsing to `vertex`.
    pub fn add_singular_trim(&mut self, loop_id: LoopId, vertex: VertexId, pcurve: usize) -> TrimId {
        let face = self.loops[loop_id].face;
        let id = self.trims.insert(Trim {
            pcurve,
            edge: None,
            reversed: false,
            kind: TrimKind::Singular,
            loop_id,
            face,
            vertex: Some(vertex),
        });
        self.loops[loop_id].trims.push(id);
        id
    }

    /// Look up a face, failing on foreign ids.
    pub fn face(&self, id: FaceId) -> Result<&Face> {
        self.faces.get(id).ok_or(BrepError::UnknownFace(id))
    }

    /// Surface carrying `face`.
    pub fn face_surface(&self, face: FaceId) -> &dyn Surface {
        self.surfaces[self.faces[face].surface].as_ref()
    }

    /// Outer loop first, then holes.
    pub fn face_loops(&self, face: FaceId) -> Vec<LoopId> {
        let f = &self.faces[face];
        f.outer_loop.iter().chain(f.inner_loops.iter()).copied().collect()
    }

    /// Faces adjacent to `edge`, one entry per trim.
    pub fn edge_faces(&self, edge: EdgeId) -> Vec<FaceId> {
        self.edges[edge]
            .trims
            .iter()
            .map(|&t| self.trims[t].face)
            .collect()
    }

    /// Evaluate the curve of `edge` at `t`.
    pub fn edge_point(&self, edge: EdgeId, t: f64) -> Point3 {
        self.curves[self.edges[edge].curve].evaluate(t)
    }

    /// Evaluate a trim's pcurve at `t`.
    pub fn trim_uv(&self, trim: TrimId, t: f64) -> Point2 {
        self.pcurves[self.trims[trim].pcurve].evaluate(t)
    }

    /// Parameter domain of a trim's pcurve.
    pub fn trim_domain(&self, trim: TrimId) -> (f64, f64) {
        self.pcurves[self.trims[trim].pcurve].domain()
    }

    /// Apply a rigid motion to every vertex, curve, and surface.
    ///
    /// Pcurves stay untouched, so only transforms whose linear part is
    /// orthonormal are accepted.
    pub fn transform(&mut self, t: &Transform) -> Result<()> {
        if !t.is_rigid() {
            return Err(BrepError::NonRigidTransform);
        }
        for v in self.vertices.values_mut() {
            v.point = t.apply_point(&v.point);
        }
        for c in &mut self.curves {
            *c = c.transform(t);
        }
        for s in &mut self.surfaces {
            *s = s.transform(t);
        }
        Ok(())
    }

    /// Translate the whole solid.
    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) -> Result<()> {
        self.transform(&Transform::translation(dx, dy, dz))
    }
}
