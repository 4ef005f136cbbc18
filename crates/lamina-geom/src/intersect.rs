//! Plane/mesh intersection primitives.
//!
//! Each triangle edge whose endpoints the plane strictly separates
//! contributes exactly one crossing point; by the even-crossing property
//! a triangle yields 0 or 2 points. Odd counts come from coplanar or
//! degenerate edges and are skipped silently.
//!
//! Triangulation diagonals of flat faces cross the plane midway along a
//! section edge; those crossings sit between two boundary-edge crossings
//! and are collapsed away so the result holds only the section's corners.

use lamina_math::{Plane, Point3, Transform, POINT_MERGE_EPS};
use lamina_mesh::TriangleMesh;

/// Intersect a mesh (under its world transform) with a cutting plane.
///
/// Returns the deduplicated crossing points in triangle order.
pub fn mesh_plane_intersection(
    mesh: &TriangleMesh,
    transform: &Transform,
    plane: &Plane,
) -> Vec<Point3> {
    triangles_plane_intersection(&mesh.world_triangles(transform), plane)
}

/// Intersect pre-transformed world-space triangles with a cutting plane.
///
/// Use this form when slicing the same mesh with many planes — the
/// engines extract the triangle list once and reuse it per plane.
pub fn triangles_plane_intersection(triangles: &[[Point3; 3]], plane: &Plane) -> Vec<Point3> {
    let mut points: Vec<Point3> = Vec::new();

    for tri in triangles {
        let d = [
            plane.signed_distance(&tri[0]),
            plane.signed_distance(&tri[1]),
            plane.signed_distance(&tri[2]),
        ];

        // Quick reject: all vertices strictly on one side.
        if d.iter().all(|&v| v > POINT_MERGE_EPS) || d.iter().all(|&v| v < -POINT_MERGE_EPS) {
            continue;
        }

        let mut crossings: Vec<Point3> = Vec::with_capacity(2);
        for (i, j) in [(0, 1), (1, 2), (2, 0)] {
            let (da, db) = (d[i], d[j]);
            // Strict separation only: edges touching the plane at a
            // vertex are the odd-count cases the kernel ignores.
            if (da > POINT_MERGE_EPS && db < -POINT_MERGE_EPS)
                || (da < -POINT_MERGE_EPS && db > POINT_MERGE_EPS)
            {
                let t = da / (da - db);
                crossings.push(tri[i] + (tri[j] - tri[i]) * t);
            }
        }
        if crossings.len() != 2 {
            continue;
        }

        for p in crossings {
            if !points.iter().any(|q| (q - p).norm() < POINT_MERGE_EPS) {
                points.push(p);
            }
        }
    }

    drop_segment_interior(points)
}

/// Drop every point that lies strictly between two other collected
/// points. Crossings contributed by face diagonals land on the segment
/// joining the face's boundary-edge crossings, so only the section's
/// corner points survive.
fn drop_segment_interior(points: Vec<Point3>) -> Vec<Point3> {
    if points.len() < 3 {
        return points;
    }
    let mut keep = vec![true; points.len()];
    for i in 0..points.len() {
        'pairs: for a in 0..points.len() {
            if a == i {
                continue;
            }
            for b in a + 1..points.len() {
                if b == i {
                    continue;
                }
                if between(&points[i], &points[a], &points[b]) {
                    keep[i] = false;
                    break 'pairs;
                }
            }
        }
    }
    points
        .into_iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(p))
        .collect()
}

/// Is `p` in the interior of segment `a`-`b`, within the merge epsilon?
fn between(p: &Point3, a: &Point3, b: &Point3) -> bool {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < POINT_MERGE_EPS * POINT_MERGE_EPS {
        return false;
    }
    let t = (p - a).dot(&ab) / len2;
    if t <= 0.0 || t >= 1.0 {
        return false;
    }
    ((p - a) - ab * t).norm() < POINT_MERGE_EPS
}
