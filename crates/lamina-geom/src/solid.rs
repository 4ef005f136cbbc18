//! Solid builders derived from closed contours: extruded slabs and
//! swept tubes.

use lamina_math::{Point2, Point3, Vec3};
use lamina_mesh::TriangleMesh;

use crate::contour::PlaneBasis;
use crate::{GeomError, Result};

/// Signed area of an open ring (positive = counter-clockwise).
fn signed_area(ring: &[Point2]) -> f64 {
    let n = ring.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y - ring[j].x * ring[i].y;
    }
    area / 2.0
}

/// Strip the closing duplicate, if present.
fn open_ring(ring: &[Point2]) -> &[Point2] {
    if ring.len() >= 2 && (ring[0] - ring[ring.len() - 1]).norm() < 1e-12 {
        &ring[..ring.len() - 1]
    } else {
        ring
    }
}

/// Extrude a closed 2D outline into a prism centered on its cutting plane.
///
/// The slab spans `±thickness/2` along the plane normal, so a stack of
/// slabs cut at the layer spacing reproduces the model's silhouette.
/// Caps are ear-clip triangulated; side walls are quads.
pub fn extrude_ring(ring: &[Point2], basis: &PlaneBasis, thickness: f64) -> Result<TriangleMesh> {
    let pts = open_ring(ring);
    let n = pts.len();
    if n < 3 {
        return Err(GeomError::DegenerateRing(n));
    }

    let ccw = signed_area(pts) > 0.0;
    let half = thickness / 2.0;

    let mut mesh = TriangleMesh::new();
    for p in pts {
        mesh.push_vertex(&(basis.unproject(p) - basis.normal * half));
    }
    for p in pts {
        mesh.push_vertex(&(basis.unproject(p) + basis.normal * half));
    }

    // Side walls.
    let n32 = n as u32;
    for i in 0..n32 {
        let j = (i + 1) % n32;
        let (bi, bj, ti, tj) = (i, j, i + n32, j + n32);
        mesh.indices.extend_from_slice(&[bi, bj, tj]);
        mesh.indices.extend_from_slice(&[bi, tj, ti]);
    }

    // Caps: top keeps the ring's winding, bottom is reversed.
    let cap = ear_clip(pts, !ccw);
    for tri in &cap {
        mesh.indices
            .extend_from_slice(&[tri[0] + n32, tri[1] + n32, tri[2] + n32]);
    }
    for tri in &cap {
        mesh.indices.extend_from_slice(&[tri[0], tri[2], tri[1]]);
    }

    Ok(mesh)
}

/// Ear-clipping triangulation of a simple polygon.
///
/// `reversed` flips the convexity test for clockwise rings. Returns
/// index triples into `pts`. Falls back to stopping early on degenerate
/// input that yields no ear.
fn ear_clip(pts: &[Point2], reversed: bool) -> Vec<[u32; 3]> {
    let mut out = Vec::new();
    if pts.len() < 3 {
        return out;
    }
    let mut remaining: Vec<usize> = (0..pts.len()).collect();

    while remaining.len() > 3 {
        let n = remaining.len();
        let mut found_ear = false;

        for i in 0..n {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            let a = pts[remaining[prev]];
            let b = pts[remaining[i]];
            let c = pts[remaining[next]];

            let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
            let is_convex = if reversed { cross < 0.0 } else { cross > 0.0 };
            if !is_convex {
                continue;
            }

            let mut is_ear = true;
            for (j, &rj) in remaining.iter().enumerate() {
                if j == prev || j == i || j == next {
                    continue;
                }
                if point_in_triangle(&pts[rj], &a, &b, &c) {
                    is_ear = false;
                    break;
                }
            }

            if is_ear {
                out.push([
                    remaining[prev] as u32,
                    remaining[i] as u32,
                    remaining[next] as u32,
                ]);
                remaining.remove(i);
                found_ear = true;
                break;
            }
        }

        if !found_ear {
            break;
        }
    }

    if remaining.len() == 3 {
        out.push([
            remaining[0] as u32,
            remaining[1] as u32,
            remaining[2] as u32,
        ]);
    }
    out
}

/// Barycentric point-in-triangle test with a small interior epsilon.
fn point_in_triangle(p: &Point2, a: &Point2, b: &Point2, c: &Point2) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(&v0);
    let dot01 = v0.dot(&v1);
    let dot02 = v0.dot(&v2);
    let dot11 = v1.dot(&v1);
    let dot12 = v1.dot(&v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < 1e-18 {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;

    let eps = 1e-10;
    u > eps && v > eps && (u + v) < 1.0 - eps
}

/// Sample a closed Catmull–Rom curve through the ring points.
///
/// Returns `ring.len() * samples_per_span` points as an open loop
/// (closure is implicit). Rings shorter than 3 points come back
/// unchanged.
pub fn sample_closed_curve(ring: &[Point3], samples_per_span: usize) -> Vec<Point3> {
    let n = ring.len();
    if n < 3 || samples_per_span == 0 {
        return ring.to_vec();
    }

    let mut out = Vec::with_capacity(n * samples_per_span);
    for i in 0..n {
        let p0 = ring[(i + n - 1) % n];
        let p1 = ring[i];
        let p2 = ring[(i + 1) % n];
        let p3 = ring[(i + 2) % n];
        for s in 0..samples_per_span {
            let t = s as f64 / samples_per_span as f64;
            out.push(catmull_rom(&p0, &p1, &p2, &p3, t));
        }
    }
    out
}

fn catmull_rom(p0: &Point3, p1: &Point3, p2: &Point3, p3: &Point3, t: f64) -> Point3 {
    let t2 = t * t;
    let t3 = t2 * t;
    let c0 = p1.coords * 2.0;
    let c1 = (p2 - p0) * t;
    let c2 = (p0.coords * 2.0 - p1.coords * 5.0 + p2.coords * 4.0 - p3.coords) * t2;
    let c3 = (p1.coords * 3.0 - p0.coords - p2.coords * 3.0 + p3.coords) * t3;
    Point3::from((c0 + c1 + c2 + c3) * 0.5)
}

/// Sweep a circular profile along a closed path to build a tube solid.
///
/// Frames are parallel-transported along the path; the wrap seam may
/// carry a small residual twist, which is acceptable for display
/// geometry. `radius` is half the wire thickness.
pub fn tube_mesh(path: &[Point3], radius: f64, radial_segments: usize) -> Result<TriangleMesh> {
    let n = path.len();
    if n < 3 {
        return Err(GeomError::DegeneratePath);
    }
    let radial = radial_segments.max(3);

    // Central-difference tangents around the closed loop.
    let mut tangents: Vec<Vec3> = Vec::with_capacity(n);
    for i in 0..n {
        let prev = path[(i + n - 1) % n];
        let next = path[(i + 1) % n];
        let d = next - prev;
        let t = if d.norm() > 1e-12 {
            d.normalize()
        } else {
            Vec3::x()
        };
        tangents.push(t);
    }

    // Parallel-transported normals.
    let reference = if tangents[0].y.abs() < 0.9 {
        Vec3::y()
    } else {
        Vec3::x()
    };
    let mut normal = (reference - tangents[0] * reference.dot(&tangents[0])).normalize();
    let mut frames: Vec<(Vec3, Vec3)> = Vec::with_capacity(n);
    for t in &tangents {
        let projected = normal - t * normal.dot(t);
        if projected.norm() > 1e-9 {
            normal = projected.normalize();
        }
        frames.push((normal, t.cross(&normal)));
    }

    let mut mesh = TriangleMesh::new();
    for (i, p) in path.iter().enumerate() {
        let (frame_n, frame_b) = &frames[i];
        for k in 0..radial {
            let theta = 2.0 * std::f64::consts::PI * k as f64 / radial as f64;
            let offset = frame_n * theta.cos() + frame_b * theta.sin();
            mesh.push_vertex(&(p + offset * radius));
        }
    }

    let radial32 = radial as u32;
    for i in 0..n as u32 {
        let next = (i + 1) % n as u32;
        for k in 0..radial32 {
            let k2 = (k + 1) % radial32;
            let a = i * radial32 + k;
            let b = next * radial32 + k;
            let c = next * radial32 + k2;
            let d = i * radial32 + k2;
            mesh.indices.extend_from_slice(&[a, b, c]);
            mesh.indices.extend_from_slice(&[a, c, d]);
        }
    }

    Ok(mesh)
}
