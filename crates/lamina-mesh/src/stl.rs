//! STL decoding and encoding.
//!
//! Handles both binary and ASCII STL. STL carries no index buffer, so
//! parsed meshes come back unindexed (flat vertex triples).

use crate::{MeshError, Result, TriangleMesh};

const BINARY_HEADER_LEN: usize = 80;
const BINARY_TRIANGLE_LEN: usize = 50;

/// Decode STL bytes, auto-detecting binary vs ASCII.
///
/// The binary layout is authoritative: a file whose declared triangle
/// count matches its length is binary even if the header starts with
/// `solid` (some exporters do that).
pub fn parse_stl(data: &[u8]) -> Result<TriangleMesh> {
    if looks_binary(data) {
        return parse_binary(data);
    }
    let text = std::str::from_utf8(data)
        .map_err(|_| MeshError::Parse("not valid binary STL and not UTF-8 text".into()))?;
    if text.trim_start().starts_with("solid") {
        return parse_ascii(text);
    }
    Err(MeshError::Parse("unrecognized STL data".into()))
}

fn looks_binary(data: &[u8]) -> bool {
    if data.len() < BINARY_HEADER_LEN + 4 {
        return false;
    }
    let count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
    data.len() == BINARY_HEADER_LEN + 4 + count * BINARY_TRIANGLE_LEN
}

fn parse_binary(data: &[u8]) -> Result<TriangleMesh> {
    let count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
    if count == 0 {
        return Err(MeshError::EmptyMesh);
    }

    let mut mesh = TriangleMesh::new();
    mesh.vertices.reserve(count * 9);
    mesh.normals.reserve(count * 9);

    let mut offset = BINARY_HEADER_LEN + 4;
    for _ in 0..count {
        let rec = &data[offset..offset + BINARY_TRIANGLE_LEN];
        let n = [read_f32(rec, 0), read_f32(rec, 4), read_f32(rec, 8)];
        for v in 0..3 {
            let base = 12 + v * 12;
            mesh.vertices.push(read_f32(rec, base));
            mesh.vertices.push(read_f32(rec, base + 4));
            mesh.vertices.push(read_f32(rec, base + 8));
            mesh.normals.extend_from_slice(&n);
        }
        offset += BINARY_TRIANGLE_LEN;
    }
    Ok(mesh)
}

fn read_f32(data: &[u8], at: usize) -> f32 {
    f32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn parse_ascii(text: &str) -> Result<TriangleMesh> {
    let mut mesh = TriangleMesh::new();
    let mut facet_verts = 0usize;

    for (line_no, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                for _ in 0..3 {
                    let tok = tokens.next().ok_or_else(|| {
                        MeshError::Parse(format!("line {}: short vertex", line_no + 1))
                    })?;
                    let value: f32 = tok.parse().map_err(|_| {
                        MeshError::Parse(format!("line {}: bad coordinate '{}'", line_no + 1, tok))
                    })?;
                    mesh.vertices.push(value);
                }
                facet_verts += 1;
            }
            Some("endfacet") => {
                if facet_verts != 3 {
                    return Err(MeshError::Parse(format!(
                        "line {}: facet with {} vertices",
                        line_no + 1,
                        facet_verts
                    )));
                }
                facet_verts = 0;
            }
            _ => {}
        }
    }

    if mesh.vertices.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    if mesh.num_vertices() % 3 != 0 {
        return Err(MeshError::Parse("vertex count is not a multiple of 3".into()));
    }
    Ok(mesh)
}

/// Encode a mesh as binary STL bytes.
pub fn write_binary_stl(mesh: &TriangleMesh) -> Result<Vec<u8>> {
    let count = mesh.num_triangles();
    if count == 0 {
        return Err(MeshError::EmptyMesh);
    }

    let mut out = Vec::with_capacity(BINARY_HEADER_LEN + 4 + count * BINARY_TRIANGLE_LEN);
    let mut header = [0u8; BINARY_HEADER_LEN];
    let tag = b"lamina binary STL";
    header[..tag.len()].copy_from_slice(tag);
    out.extend_from_slice(&header);
    out.extend_from_slice(&(count as u32).to_le_bytes());

    for t in 0..count {
        let [a, b, c] = mesh.triangle(t);
        let normal = (b - a).cross(&(c - a));
        let normal = if normal.norm() > 1e-12 {
            normal.normalize()
        } else {
            normal
        };
        for v in [normal.x, normal.y, normal.z] {
            out.extend_from_slice(&(v as f32).to_le_bytes());
        }
        for p in [a, b, c] {
            for v in [p.x, p.y, p.z] {
                out.extend_from_slice(&(v as f32).to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cube_mesh;

    #[test]
    fn test_binary_roundtrip() {
        let mesh = cube_mesh(10.0);
        let bytes = write_binary_stl(&mesh).unwrap();
        let parsed = parse_stl(&bytes).unwrap();
        assert_eq!(parsed.num_triangles(), mesh.num_triangles());
        assert!(parsed.indices.is_empty());
        let (min, max) = parsed.bounds().unwrap();
        assert!(min.x.abs() < 1e-5);
        assert!((max.y - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_ascii_parse() {
        let text = "solid tri\n\
                    facet normal 0 0 1\n\
                    outer loop\n\
                    vertex 0 0 0\n\
                    vertex 1 0 0\n\
                    vertex 0 1 0\n\
                    endloop\n\
                    endfacet\n\
                    endsolid tri\n";
        let mesh = parse_stl(text.as_bytes()).unwrap();
        assert_eq!(mesh.num_triangles(), 1);
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(parse_stl(b"not an stl at all").is_err());
        let text = "solid broken\nvertex 0 0\nendfacet\n";
        assert!(parse_stl(text.as_bytes()).is_err());
    }

    #[test]
    fn test_empty_rejected() {
        let text = "solid empty\nendsolid empty\n";
        assert!(matches!(parse_stl(text.as_bytes()), Err(MeshError::EmptyMesh)));
    }
}
