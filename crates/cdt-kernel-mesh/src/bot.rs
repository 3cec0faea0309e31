//! Flat "bag of triangles" output mesh.

use cdt_kernel_math::{Point3, Vec3};

use crate::{validate_solid, SolidReport, ValidationOptions};

/// Output triangle mesh: flat coordinate and index arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]`.
    pub vertices: Vec<f64>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]`.
    pub faces: Vec<u32>,
    /// Flat array of vertex normals, one per vertex, when requested.
    pub normals: Option<Vec<f64>>,
    /// Flat array of corner normal indices, three per triangle, when requested.
    pub face_normals: Option<Vec<u32>>,
}

impl BotMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.faces.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Position of vertex `i`.
    pub fn vertex(&self, i: usize) -> Point3 {
        Point3::new(
            self.vertices[3 * i],
            self.vertices[3 * i + 1],
            self.vertices[3 * i + 2],
        )
    }

    /// Corner indices of triangle `i`.
    pub fn face(&self, i: usize) -> [usize; 3] {
        [
            self.faces[3 * i] as usize,
            self.faces[3 * i + 1] as usize,
            self.faces[3 * i + 2] as usize,
        ]
    }

    /// Normal `i` of the normal array, if normals were requested.
    pub fn normal(&self, i: usize) -> Option<Vec3> {
        let n = self.normals.as_ref()?;
        Some(Vec3::new(n[3 * i], n[3 * i + 1], n[3 * i + 2]))
    }

    /// All vertex positions.
    pub fn points(&self) -> Vec<Point3> {
        (0..self.num_vertices()).map(|i| self.vertex(i)).collect()
    }

    /// All triangles.
    pub fn triangles(&self) -> Vec<[usize; 3]> {
        (0..self.num_triangles()).map(|i| self.face(i)).collect()
    }

    /// Run the solid validator with default options.
    pub fn validate(&self) -> SolidReport {
        validate_solid(&self.points(), &self.triangles(), &ValidationOptions::default())
    }

    /// Enclosed volume (positive for outward winding).
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .iter()
            .map(|t| {
                let (a, b, c) = (self.vertex(t[0]), self.vertex(t[1]), self.vertex(t[2]));
                a.coords.dot(&b.coords.cross(&c.coords)) / 6.0
            })
            .sum()
    }
}
