//! Contour post-processing: simplification, smoothing, and the 2D
//! parameter frame of a cutting plane.

use lamina_math::{Plane, Point2, Point3, Vec3};

/// Orthonormal 2D frame spanning a cutting plane.
///
/// Built from cross products against a reference axis not parallel to
/// the plane normal. Projecting and then unprojecting a planar point
/// reproduces it exactly (up to float noise), which is what lets layer
/// outlines round-trip between flat export and 3D placement.
#[derive(Debug, Clone)]
pub struct PlaneBasis {
    /// A point on the plane (foot of the origin's perpendicular).
    pub origin: Point3,
    /// First in-plane axis.
    pub u: Vec3,
    /// Second in-plane axis.
    pub v: Vec3,
    /// Plane normal.
    pub normal: Vec3,
}

impl PlaneBasis {
    /// Build the frame for `plane`.
    pub fn new(plane: &Plane) -> Self {
        let n = plane.normal;
        let reference = if n.y.abs() < 0.9 { Vec3::y() } else { Vec3::x() };
        let u = reference.cross(&n).normalize();
        let v = n.cross(&u);
        Self {
            origin: plane.origin_point(),
            u,
            v,
            normal: n,
        }
    }

    /// Project a 3D point into plane coordinates.
    pub fn project(&self, p: &Point3) -> Point2 {
        let d = p - self.origin;
        Point2::new(d.dot(&self.u), d.dot(&self.v))
    }

    /// Lift plane coordinates back to 3D.
    pub fn unproject(&self, q: &Point2) -> Point3 {
        self.origin + self.u * q.x + self.v * q.y
    }

    /// Project a whole point set.
    pub fn project_all(&self, points: &[Point3]) -> Vec<Point2> {
        points.iter().map(|p| self.project(p)).collect()
    }

    /// Lift a whole 2D ring back to 3D.
    pub fn unproject_all(&self, points: &[Point2]) -> Vec<Point3> {
        points.iter().map(|q| self.unproject(q)).collect()
    }
}

/// Douglas–Peucker polyline simplification.
///
/// Keeps the endpoints and, recursively, any point deviating from the
/// current chord by more than `tolerance`.
pub fn simplify(points: &[Point2], tolerance: f64) -> Vec<Point2> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    dp_mark(points, 0, points.len() - 1, tolerance, &mut keep);
    points
        .iter()
        .zip(&keep)
        .filter_map(|(p, &k)| k.then_some(*p))
        .collect()
}

fn dp_mark(points: &[Point2], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }
    let mut max_dist = 0.0;
    let mut max_idx = first;
    for i in first + 1..last {
        let d = chord_distance(&points[i], &points[first], &points[last]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }
    if max_dist > tolerance {
        keep[max_idx] = true;
        dp_mark(points, first, max_idx, tolerance, keep);
        dp_mark(points, max_idx, last, tolerance, keep);
    }
}

fn chord_distance(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len = ab.norm();
    if len < 1e-12 {
        return (p - a).norm();
    }
    ((p.x - a.x) * ab.y - (p.y - a.y) * ab.x).abs() / len
}

/// One Laplacian smoothing pass over a closed ring.
///
/// Each point moves toward the midpoint of its two ring neighbors by
/// `factor` in `[0, 1]`. The input may carry the closing duplicate; the
/// output closes the ring iff the input did.
pub fn smooth_ring(ring: &[Point2], factor: f64) -> Vec<Point2> {
    let closed = ring.len() >= 2
        && (ring[0] - ring[ring.len() - 1]).norm() < 1e-12;
    let pts = if closed { &ring[..ring.len() - 1] } else { ring };
    let n = pts.len();
    if n < 3 {
        return ring.to_vec();
    }

    let f = factor.clamp(0.0, 1.0);
    let mut out: Vec<Point2> = Vec::with_capacity(ring.len());
    for i in 0..n {
        let prev = pts[(i + n - 1) % n];
        let next = pts[(i + 1) % n];
        let mid = Point2::new((prev.x + next.x) / 2.0, (prev.y + next.y) / 2.0);
        out.push(pts[i] + (mid - pts[i]) * f);
    }
    if closed {
        let first = out[0];
        out.push(first);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lamina_math::Plane;

    #[test]
    fn project_unproject_roundtrip() {
        let plane = Plane::horizontal(7.0);
        let basis = PlaneBasis::new(&plane);
        let planar = vec![
            Point3::new(1.0, 7.0, -3.0),
            Point3::new(-2.5, 7.0, 4.0),
            Point3::new(0.0, 7.0, 0.0),
        ];
        let flat = basis.project_all(&planar);
        let back = basis.unproject_all(&flat);
        for (orig, re) in planar.iter().zip(&back) {
            assert!((orig - re).norm() < 1e-9);
        }
    }

    #[test]
    fn roundtrip_on_a_skew_plane() {
        let plane = Plane::from_normal_point(Vec3::new(1.0, 2.0, 0.5), &Point3::new(3.0, 1.0, 2.0));
        let basis = PlaneBasis::new(&plane);
        // Any point built from the basis is planar by construction.
        let p = basis.unproject(&Point2::new(4.2, -1.7));
        assert!(plane.signed_distance(&p).abs() < 1e-9);
        let q = basis.project(&p);
        assert_relative_eq!(q.x, 4.2, epsilon = 1e-9);
        assert_relative_eq!(q.y, -1.7, epsilon = 1e-9);
    }

    #[test]
    fn basis_is_orthonormal() {
        for plane in [
            Plane::horizontal(0.0),
            Plane::vertical_x(2.0),
            Plane::vertical_z(-1.0),
        ] {
            let b = PlaneBasis::new(&plane);
            assert!((b.u.norm() - 1.0).abs() < 1e-12);
            assert!((b.v.norm() - 1.0).abs() < 1e-12);
            assert!(b.u.dot(&b.v).abs() < 1e-12);
            assert!(b.u.dot(&b.normal).abs() < 1e-12);
        }
    }

    #[test]
    fn simplify_collapses_collinear_runs() {
        let points: Vec<Point2> = (0..=10).map(|i| Point2::new(i as f64, 0.0)).collect();
        let simplified = simplify(&points, 0.1);
        assert_eq!(simplified.len(), 2);
        assert_eq!(simplified[0], points[0]);
        assert_eq!(simplified[1], points[10]);
    }

    #[test]
    fn simplify_keeps_a_spike() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 3.0),
            Point2::new(10.0, 0.0),
        ];
        let simplified = simplify(&points, 1.0);
        assert_eq!(simplified.len(), 3);
        let flattened = simplify(&points, 5.0);
        assert_eq!(flattened.len(), 2);
    }

    #[test]
    fn smoothing_pulls_toward_neighbors() {
        // Unit square ring with one corner pushed far out.
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 30.0), // outlier
            Point2::new(0.0, 0.0),
        ];
        let smoothed = smooth_ring(&ring, 0.5);
        assert_eq!(smoothed.len(), ring.len());
        assert_eq!(smoothed.first(), smoothed.last());
        // Outlier moved halfway toward the midpoint of its neighbors (5, 5).
        assert!((smoothed[3].y - 17.5).abs() < 1e-9);
        assert!((smoothed[3].x - 2.5).abs() < 1e-9);
    }

    #[test]
    fn smoothing_factor_zero_is_identity() {
        let ring = vec![
            Point2::new(0.0, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(4.0, 4.0),
            Point2::new(0.0, 0.0),
        ];
        assert_eq!(smooth_ring(&ring, 0.0), ring);
    }
}
