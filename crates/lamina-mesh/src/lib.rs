#![warn(missing_docs)]

//! Triangle mesh storage and STL ingestion for lamina.
//!
//! The mesh layout matches what the 3D viewport consumes directly: a flat
//! f32 vertex buffer plus an optional u32 index buffer. Unindexed meshes
//! (the STL case) are legal — triangles are then the flat vertex triples.

use lamina_math::{Point3, Transform};
use thiserror::Error;

pub mod stl;

pub use stl::{parse_stl, write_binary_stl};

/// Errors produced while building or decoding meshes.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Uploaded mesh data could not be decoded.
    #[error("mesh parse error: {0}")]
    Parse(String),
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;

/// A triangle mesh with flat vertex/index/normal buffers.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Flat array of vertex positions: `[x0, y0, z0, x1, y1, z1, ...]` (f32).
    pub vertices: Vec<f32>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]` (u32).
    /// Empty for unindexed meshes, which group vertices in flat triples.
    pub indices: Vec<u32>,
    /// Flat array of vertex normals, same length as `vertices` (may be empty).
    pub normals: Vec<f32>,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangles (indexed or flat-triple layout).
    pub fn num_triangles(&self) -> usize {
        if self.indices.is_empty() {
            self.num_vertices() / 3
        } else {
            self.indices.len() / 3
        }
    }

    /// Vertex `i` as an f64 point.
    pub fn vertex(&self, i: usize) -> Point3 {
        Point3::new(
            self.vertices[i * 3] as f64,
            self.vertices[i * 3 + 1] as f64,
            self.vertices[i * 3 + 2] as f64,
        )
    }

    /// Append a vertex, returning its index.
    pub fn push_vertex(&mut self, p: &Point3) -> u32 {
        let idx = self.num_vertices() as u32;
        self.vertices.push(p.x as f32);
        self.vertices.push(p.y as f32);
        self.vertices.push(p.z as f32);
        idx
    }

    /// Triangle `t` as three f64 points, resolving either layout.
    pub fn triangle(&self, t: usize) -> [Point3; 3] {
        if self.indices.is_empty() {
            [
                self.vertex(t * 3),
                self.vertex(t * 3 + 1),
                self.vertex(t * 3 + 2),
            ]
        } else {
            [
                self.vertex(self.indices[t * 3] as usize),
                self.vertex(self.indices[t * 3 + 1] as usize),
                self.vertex(self.indices[t * 3 + 2] as usize),
            ]
        }
    }

    /// Iterate all triangles as f64 point triples.
    pub fn triangles(&self) -> impl Iterator<Item = [Point3; 3]> + '_ {
        (0..self.num_triangles()).map(move |t| self.triangle(t))
    }

    /// All triangles with `transform` applied, ready for plane clipping.
    pub fn world_triangles(&self, transform: &Transform) -> Vec<[Point3; 3]> {
        self.triangles()
            .map(|[a, b, c]| {
                [
                    transform.apply_point(&a),
                    transform.apply_point(&b),
                    transform.apply_point(&c),
                ]
            })
            .collect()
    }

    /// Axis-aligned bounding box `(min, max)` of the untransformed vertices.
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        self.bounds_with(|p| p)
    }

    /// Bounding box of the vertices under `transform`.
    pub fn bounds_transformed(&self, transform: &Transform) -> Option<(Point3, Point3)> {
        self.bounds_with(|p| transform.apply_point(&p))
    }

    fn bounds_with(&self, f: impl Fn(Point3) -> Point3) -> Option<(Point3, Point3)> {
        if self.vertices.is_empty() {
            return None;
        }
        let mut min = Point3::new(f64::MAX, f64::MAX, f64::MAX);
        let mut max = Point3::new(f64::MIN, f64::MIN, f64::MIN);
        for i in 0..self.num_vertices() {
            let p = f(self.vertex(i));
            min = Point3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
            max = Point3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
        }
        Some((min, max))
    }

    /// Merge another mesh into this one, rebasing its indices.
    pub fn merge(&mut self, other: &TriangleMesh) {
        let base = self.num_vertices() as u32;
        // Merging an unindexed mesh into an indexed one (or vice versa)
        // first materializes flat triples as explicit indices.
        if self.indices.is_empty() && !self.vertices.is_empty() {
            self.indices = (0..self.num_vertices() as u32).collect();
        }
        self.vertices.extend_from_slice(&other.vertices);
        self.normals.extend_from_slice(&other.normals);
        if other.indices.is_empty() {
            self.indices
                .extend((0..other.num_vertices() as u32).map(|i| i + base));
        } else {
            self.indices.extend(other.indices.iter().map(|i| i + base));
        }
    }
}

/// Build an axis-aligned cube mesh with one corner at the origin.
pub fn cube_mesh(size: f64) -> TriangleMesh {
    let s = size as f32;
    let vertices = vec![
        // Bottom face (y = 0)
        0.0, 0.0, 0.0, s, 0.0, 0.0, s, 0.0, s, 0.0, 0.0, s,
        // Top face (y = size)
        0.0, s, 0.0, s, s, 0.0, s, s, s, 0.0, s, s,
    ];
    let indices = vec![
        0, 1, 2, 0, 2, 3, // bottom
        4, 6, 5, 4, 7, 6, // top
        0, 4, 5, 0, 5, 1, // z = 0 side
        3, 2, 6, 3, 6, 7, // z = size side
        0, 3, 7, 0, 7, 4, // x = 0 side
        1, 5, 6, 1, 6, 2, // x = size side
    ];
    TriangleMesh {
        vertices,
        indices,
        normals: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_bounds() {
        let mesh = cube_mesh(10.0);
        let (min, max) = mesh.bounds().unwrap();
        assert!(min.x.abs() < 1e-6 && min.y.abs() < 1e-6 && min.z.abs() < 1e-6);
        assert_relative_eq!(max.x, 10.0, epsilon = 1e-6);
        assert_relative_eq!(max.y, 10.0, epsilon = 1e-6);
        assert_relative_eq!(max.z, 10.0, epsilon = 1e-6);
        assert_eq!(mesh.num_triangles(), 12);
    }

    #[test]
    fn test_bounds_transformed() {
        let mesh = cube_mesh(10.0);
        let t = Transform::translation(0.0, 5.0, 0.0);
        let (min, max) = mesh.bounds_transformed(&t).unwrap();
        assert!((min.y - 5.0).abs() < 1e-6);
        assert!((max.y - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_unindexed_triangles() {
        let mesh = TriangleMesh {
            vertices: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: Vec::new(),
            normals: Vec::new(),
        };
        assert_eq!(mesh.num_triangles(), 1);
        let [a, b, c] = mesh.triangle(0);
        assert!((a - Point3::origin()).norm() < 1e-9);
        assert!((b.x - 1.0).abs() < 1e-9);
        assert!((c.y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_rebases_indices() {
        let mut a = cube_mesh(1.0);
        let b = cube_mesh(1.0);
        let before = a.num_triangles();
        a.merge(&b);
        assert_eq!(a.num_triangles(), before * 2);
        let max_idx = *a.indices.iter().max().unwrap() as usize;
        assert!(max_idx < a.num_vertices());
    }
}
