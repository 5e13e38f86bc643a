//! Polyline point reduction: Douglas–Peucker, Visvalingam–Whyatt, and
//! Reumann–Witkam.
//!
//! Douglas–Peucker is the pipeline default. Distances are measured to
//! the *segment* between the candidate's anchor points: when the
//! projection falls outside the segment, the distance to the nearer
//! endpoint is used instead of the infinite-line distance.

use crate::types::{Contour, Point};

/// Distance from `p` to the segment `a`–`b`.
///
/// Uses the projected distance when the projection parameter lies in
/// `[0, 1]`, otherwise the Euclidean distance to the nearer endpoint.
#[must_use]
pub fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);
    if length_sq == 0.0 {
        return p.distance(a);
    }

    let t = (p.x - a.x).mul_add(dx, (p.y - a.y) * dy) / length_sq;
    if (0.0..=1.0).contains(&t) {
        let proj = Point::new(dx.mul_add(t, a.x), dy.mul_add(t, a.y));
        p.distance(proj)
    } else if t < 0.0 {
        p.distance(a)
    } else {
        p.distance(b)
    }
}

/// Simplify a point sequence with the Douglas–Peucker algorithm.
///
/// Endpoints are always kept. Sequences with fewer than 3 points are
/// returned unchanged.
#[must_use = "returns the simplified points"]
pub fn douglas_peucker(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;
    dp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect()
}

/// Recursive step: keep the farthest point from the current chord when
/// it exceeds the tolerance, then process both halves.
fn dp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;
    for i in (start + 1)..end {
        let d = segment_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        dp_recurse(points, start, max_idx, tolerance, kept);
        dp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Douglas–Peucker over a contour, preserving the closed/hole flags.
#[must_use = "returns the simplified contour"]
pub fn douglas_peucker_contour(contour: &Contour, tolerance: f64) -> Contour {
    Contour {
        points: douglas_peucker(&contour.points, tolerance),
        closed: contour.closed,
        hole: contour.hole,
    }
}

/// Relative-tolerance Douglas–Peucker: the tolerance is `percent` of
/// the contour's bounding-box diagonal.
#[must_use = "returns the simplified contour"]
pub fn douglas_peucker_relative(contour: &Contour, percent: f64) -> Contour {
    let (min_x, min_y, max_x, max_y) = contour.bounding_box();
    let diagonal = if contour.is_empty() {
        0.0
    } else {
        (max_x - min_x).hypot(max_y - min_y)
    };
    douglas_peucker_contour(contour, diagonal * percent / 100.0)
}

/// Triangle area spanned by three points (half the cross product).
fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    ((b.x - a.x).mul_add(c.y - a.y, -((c.x - a.x) * (b.y - a.y)))).abs() / 2.0
}

/// Visvalingam–Whyatt: repeatedly remove the interior point spanning
/// the smallest triangle with its neighbors until `target_count`
/// points remain.
///
/// Endpoints are never removed; `target_count` below 2 is treated
/// as 2.
#[must_use = "returns the simplified points"]
pub fn visvalingam(points: &[Point], target_count: usize) -> Vec<Point> {
    let target = target_count.max(2);
    if points.len() <= target {
        return points.to_vec();
    }

    let mut pts = points.to_vec();
    while pts.len() > target {
        let mut min_area = f64::INFINITY;
        let mut min_idx = 1;
        for i in 1..pts.len() - 1 {
            let area = triangle_area(pts[i - 1], pts[i], pts[i + 1]);
            if area < min_area {
                min_area = area;
                min_idx = i;
            }
        }
        // Removing the point re-wings its two surviving neighbors; the
        // next sweep recomputes their areas.
        pts.remove(min_idx);
    }
    pts
}

/// Perpendicular distance from `p` to the infinite line through `a`
/// and `b`. Falls back to point distance when the line is degenerate.
fn line_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);
    if length_sq == 0.0 {
        return p.distance(a);
    }
    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

/// Reumann–Witkam: stream points, keeping any whose perpendicular
/// distance to the running key line exceeds the tolerance; each kept
/// point starts a new key line with its successor.
#[must_use = "returns the simplified points"]
pub fn reumann_witkam(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut out = vec![points[0]];
    let mut key = points[0];
    let mut reference = points[1];
    let mut need_reference = false;

    for &p in &points[2..] {
        if need_reference {
            reference = p;
            need_reference = false;
            continue;
        }
        if line_distance(p, key, reference) > tolerance {
            out.push(p);
            key = p;
            need_reference = true;
        }
    }

    if out.last() != points.last() {
        if let Some(&last) = points.last() {
            out.push(last);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_sequences_unchanged() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)];
        assert_eq!(douglas_peucker(&pts, 1.0), pts);
        assert_eq!(visvalingam(&pts, 2), pts);
        assert_eq!(reumann_witkam(&pts, 1.0), pts);
    }

    #[test]
    fn collinear_points_collapse_to_endpoints() {
        let pts: Vec<Point> = (0..10).map(|i| Point::new(f64::from(i), f64::from(i))).collect();
        let out = douglas_peucker(&pts, 0.1);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[1], pts[9]);
    }

    #[test]
    fn zigzag_peaks_survive_small_tolerance() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 5.0),
            Point::new(4.0, 0.0),
            Point::new(6.0, 5.0),
            Point::new(8.0, 0.0),
        ];
        assert_eq!(douglas_peucker(&pts, 1.0).len(), 5);
        assert_eq!(douglas_peucker(&pts, 10.0).len(), 2);
    }

    #[test]
    fn removed_points_stay_within_tolerance() {
        // Every dropped point must lie within tolerance of the chord
        // between its surviving neighbors.
        let pts: Vec<Point> = (0..30)
            .map(|i| {
                let x = f64::from(i);
                Point::new(x, (x * 0.7).sin() * 3.0)
            })
            .collect();
        let tolerance = 0.5;
        let kept = douglas_peucker(&pts, tolerance);

        for p in &pts {
            let within = kept.windows(2).any(|w| {
                segment_distance(*p, w[0], w[1]) <= tolerance + 1e-9
            });
            assert!(within, "point ({}, {}) drifted out of tolerance", p.x, p.y);
        }
    }

    #[test]
    fn kept_points_preserve_input_order() {
        let pts: Vec<Point> = (0..20)
            .map(|i| Point::new(f64::from(i), if i % 3 == 0 { 2.0 } else { 0.0 }))
            .collect();
        let kept = douglas_peucker(&pts, 0.5);
        let mut cursor = 0;
        for k in &kept {
            let pos = pts[cursor..].iter().position(|p| p == k);
            assert!(pos.is_some(), "kept point appears out of input order");
            cursor += pos.unwrap_or(0);
        }
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        // Projection inside the segment: perpendicular distance.
        assert!((segment_distance(Point::new(5.0, 3.0), a, b) - 3.0).abs() < 1e-12);
        // Projection past `b`: distance to `b`, not to the infinite line.
        assert!((segment_distance(Point::new(14.0, 3.0), a, b) - 5.0).abs() < 1e-12);
        // Projection before `a`: distance to `a`.
        assert!((segment_distance(Point::new(-4.0, 3.0), a, b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn segment_distance_degenerate_segment() {
        let a = Point::new(2.0, 2.0);
        assert!((segment_distance(Point::new(5.0, 6.0), a, a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn relative_tolerance_scales_with_extent() {
        // The same wiggle amplitude is noise on a large contour but
        // signal on a small one.
        let small = Contour::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.4),
                Point::new(2.0, 0.0),
            ],
            false,
        );
        let large = Contour::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(100.0, 0.4),
                Point::new(200.0, 0.0),
            ],
            false,
        );
        let percent = 5.0;
        assert_eq!(douglas_peucker_relative(&small, percent).len(), 3);
        assert_eq!(douglas_peucker_relative(&large, percent).len(), 2);
    }

    #[test]
    fn visvalingam_reaches_target_count() {
        let pts: Vec<Point> = (0..50)
            .map(|i| Point::new(f64::from(i), f64::from(i % 7)))
            .collect();
        let out = visvalingam(&pts, 10);
        assert_eq!(out.len(), 10);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[9], pts[49]);
    }

    #[test]
    fn visvalingam_drops_smallest_triangle_first() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.01), // nearly collinear: smallest triangle
            Point::new(2.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(4.0, 0.0),
        ];
        let out = visvalingam(&pts, 4);
        assert!(!out.contains(&Point::new(1.0, 0.01)));
        assert!(out.contains(&Point::new(3.0, 4.0)));
    }

    #[test]
    fn reumann_witkam_respects_tolerance() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.1),
            Point::new(2.0, 0.2),
            Point::new(3.0, 5.0),
            Point::new(4.0, 0.0),
        ];
        let out = reumann_witkam(&pts, 1.0);
        assert!(out.contains(&Point::new(3.0, 5.0)), "far point must be kept");
        assert!(!out.contains(&Point::new(1.0, 0.1)));
        assert_eq!(out.first(), pts.first());
        assert_eq!(out.last(), pts.last());
    }

    #[test]
    fn contour_simplification_preserves_flags() {
        let contour = Contour {
            points: (0..10).map(|i| Point::new(f64::from(i), 0.0)).collect(),
            closed: true,
            hole: true,
        };
        let out = douglas_peucker_contour(&contour, 0.5);
        assert!(out.closed);
        assert!(out.hole);
    }
}
