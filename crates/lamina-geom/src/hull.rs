//! Convex and concave hull extraction over 2D point sets.

use lamina_math::{Point2, POINT_MERGE_EPS};

fn cross(o: &Point2, a: &Point2, b: &Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by the monotone-chain algorithm.
///
/// Returns a closed counter-clockwise ring (first point repeated at the
/// end). Two or fewer input points are returned unchanged.
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut pts = points.to_vec();
    pts.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lower: Vec<Point2> = Vec::new();
    for p in &pts {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2> = Vec::new();
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    // Each chain's last point is the other chain's first.
    lower.pop();
    upper.pop();
    lower.extend(upper);
    if let Some(&first) = lower.first() {
        lower.push(first);
    }
    lower
}

/// Concave hull: convex hull iteratively refined toward the point set.
///
/// For every hull edge, the non-hull input point farthest from the edge
/// (restricted to the edge's axis-aligned bounding rectangle) is spliced
/// in when its distance exceeds `concavity`; the scan then restarts.
/// Smaller concavity hugs the input more tightly; above some threshold
/// the result is exactly the convex hull.
pub fn concave_hull(points: &[Point2], concavity: f64) -> Vec<Point2> {
    let mut hull = convex_hull(points);
    if hull.len() < 4 {
        return hull;
    }

    // Every splice consumes one input point, so this terminates.
    loop {
        let mut spliced = false;
        for i in 0..hull.len() - 1 {
            let a = hull[i];
            let b = hull[i + 1];

            let mut best: Option<(f64, Point2)> = None;
            for p in points {
                if hull.iter().any(|h| (h - p).norm() < POINT_MERGE_EPS) {
                    continue;
                }
                if !in_edge_rect(&a, &b, p) {
                    continue;
                }
                let dist = point_segment_distance(p, &a, &b);
                if best.map_or(true, |(d, _)| dist > d) {
                    best = Some((dist, *p));
                }
            }

            if let Some((dist, p)) = best {
                if dist > concavity {
                    hull.insert(i + 1, p);
                    spliced = true;
                    break;
                }
            }
        }
        if !spliced {
            break;
        }
    }
    hull
}

/// Is `p` inside the axis-aligned rectangle spanned by the edge `a..b`?
fn in_edge_rect(a: &Point2, b: &Point2, p: &Point2) -> bool {
    let (min_x, max_x) = (a.x.min(b.x), a.x.max(b.x));
    let (min_y, max_y) = (a.y.min(b.y), a.y.max(b.y));
    p.x >= min_x - POINT_MERGE_EPS
        && p.x <= max_x + POINT_MERGE_EPS
        && p.y >= min_y - POINT_MERGE_EPS
        && p.y <= max_y + POINT_MERGE_EPS
}

/// Distance from `p` to the segment `a..b`.
fn point_segment_distance(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < 1e-18 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_interior() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(0.0, 10.0),
            Point2::new(5.0, 5.0),
            Point2::new(2.0, 7.0),
        ]
    }

    #[test]
    fn convex_hull_closes_the_ring() {
        let hull = convex_hull(&square_with_interior());
        assert_eq!(hull.len(), 5);
        assert_eq!(hull.first(), hull.last());
        // Interior points never appear.
        assert!(!hull[..4].iter().any(|p| (p.x - 5.0).abs() < 1e-9));
    }

    #[test]
    fn convex_hull_vertices_come_from_the_input() {
        let input = square_with_interior();
        let hull = convex_hull(&input);
        for h in &hull {
            assert!(input.iter().any(|p| (p - h).norm() < 1e-12));
        }
    }

    #[test]
    fn convex_hull_degenerate_inputs() {
        let two = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)];
        assert_eq!(convex_hull(&two), two);
        assert!(convex_hull(&[]).is_empty());
    }

    #[test]
    fn convex_hull_is_ccw() {
        let hull = convex_hull(&square_with_interior());
        let mut area = 0.0;
        for w in hull.windows(2) {
            area += w[0].x * w[1].y - w[1].x * w[0].y;
        }
        assert!(area > 0.0);
    }

    #[test]
    fn concave_hull_matches_convex_above_threshold() {
        let input = square_with_interior();
        assert_eq!(concave_hull(&input, 1e6), convex_hull(&input));
    }

    #[test]
    fn concave_hull_admits_a_deep_notch_point() {
        // A diamond with a point pulled inward from the lower edges; its
        // perpendicular distance to the nearest hull edge is ~7.16.
        let input = vec![
            Point2::new(0.0, 0.0),
            Point2::new(20.0, -10.0),
            Point2::new(40.0, 0.0),
            Point2::new(20.0, 10.0),
            Point2::new(20.0, -2.0),
        ];
        let tight = concave_hull(&input, 5.0);
        assert!(tight
            .iter()
            .any(|p| (p.x - 20.0).abs() < 1e-9 && (p.y + 2.0).abs() < 1e-9));
        assert_eq!(tight.len(), convex_hull(&input).len() + 1);

        // The same set with a loose threshold stays convex.
        let loose = concave_hull(&input, 10.0);
        assert_eq!(loose, convex_hull(&input));
    }
}
