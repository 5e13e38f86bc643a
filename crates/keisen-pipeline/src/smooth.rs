//! Polyline smoothing and cubic Bézier fitting.
//!
//! Chaikin corner cutting is what the pipeline applies when curve
//! smoothing is enabled; moving-average and Gaussian smoothing plus
//! Schneider-style Bézier fitting are available for callers that want
//! curves instead of polylines.

use crate::preprocess;
use crate::types::Point;

/// Chaikin corner cutting.
///
/// Each edge A→B is replaced by the two points `0.75A + 0.25B` and
/// `0.25A + 0.75B`, repeated `iterations` times. Closed paths wrap
/// around; open paths keep their endpoints.
#[must_use = "returns the smoothed points"]
pub fn chaikin(points: &[Point], iterations: usize, closed: bool) -> Vec<Point> {
    let mut pts = points.to_vec();
    for _ in 0..iterations {
        if pts.len() < 3 {
            break;
        }
        let mut next = Vec::with_capacity(pts.len() * 2);
        if !closed {
            next.push(pts[0]);
        }
        let edge_count = if closed { pts.len() } else { pts.len() - 1 };
        for i in 0..edge_count {
            let a = pts[i];
            let b = pts[(i + 1) % pts.len()];
            next.push(lerp(a, b, 0.25));
            next.push(lerp(a, b, 0.75));
        }
        if !closed {
            if let Some(&last) = pts.last() {
                next.push(last);
            }
        }
        pts = next;
    }
    pts
}

/// Moving average over a window of `2 * half_window + 1` points with
/// edge clamping.
#[must_use = "returns the smoothed points"]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn moving_average(points: &[Point], half_window: usize) -> Vec<Point> {
    if half_window == 0 || points.len() < 3 {
        return points.to_vec();
    }
    let n = points.len() as isize;
    let k = half_window as isize;
    (0..n)
        .map(|i| {
            let mut sx = 0.0;
            let mut sy = 0.0;
            let mut count = 0.0;
            for j in i - k..=i + k {
                let idx = j.clamp(0, n - 1) as usize;
                sx += points[idx].x;
                sy += points[idx].y;
                count += 1.0;
            }
            Point::new(sx / count, sy / count)
        })
        .collect()
}

/// Gaussian smoothing with a σ-sized, mirror-padded kernel.
#[must_use = "returns the smoothed points"]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn gaussian(points: &[Point], sigma: f32) -> Vec<Point> {
    if sigma <= 0.0 || points.len() < 3 {
        return points.to_vec();
    }
    let kernel = preprocess::gaussian_kernel(sigma);
    let half = (kernel.len() / 2) as isize;
    let n = points.len() as isize;

    (0..n)
        .map(|i| {
            let mut sx = 0.0f64;
            let mut sy = 0.0f64;
            for (k, &weight) in kernel.iter().enumerate() {
                let j = i + k as isize - half;
                let idx = mirror_index(j, n) as usize;
                sx = f64::from(weight).mul_add(points[idx].x, sx);
                sy = f64::from(weight).mul_add(points[idx].y, sy);
            }
            Point::new(sx, sy)
        })
        .collect()
}

/// Reflect an out-of-range index back into `[0, n)`.
fn mirror_index(i: isize, n: isize) -> isize {
    if n == 1 {
        return 0;
    }
    let mut j = i;
    while j < 0 || j >= n {
        if j < 0 {
            j = -j;
        }
        if j >= n {
            j = 2 * (n - 1) - j;
        }
    }
    j
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new((b.x - a.x).mul_add(t, a.x), (b.y - a.y).mul_add(t, a.y))
}

// ───────────────────────── Cubic Bézier fitting ───────────────────────

/// One cubic Bézier segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    /// Start point.
    pub p0: Point,
    /// First control point.
    pub p1: Point,
    /// Second control point.
    pub p2: Point,
    /// End point.
    pub p3: Point,
}

impl CubicBezier {
    /// Evaluate the curve at parameter `t ∈ [0, 1]`.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> Point {
        let mt = 1.0 - t;
        let b0 = mt * mt * mt;
        let b1 = 3.0 * mt * mt * t;
        let b2 = 3.0 * mt * t * t;
        let b3 = t * t * t;
        Point::new(
            b3.mul_add(
                self.p3.x,
                b2.mul_add(self.p2.x, b0.mul_add(self.p0.x, b1 * self.p1.x)),
            ),
            b3.mul_add(
                self.p3.y,
                b2.mul_add(self.p2.y, b0.mul_add(self.p0.y, b1 * self.p1.y)),
            ),
        )
    }
}

/// Fit cubic Bézier segments to a point sequence (Schneider's method).
///
/// Points are parameterized by chord length; the tangent-aligned
/// control distances α₁/α₂ come from the 2×2 least-squares normal
/// system. When the worst-fit point exceeds `max_error`, the sequence
/// is subdivided there and both halves are fitted recursively.
#[must_use = "returns the fitted segments"]
pub fn fit_cubic_beziers(points: &[Point], max_error: f64) -> Vec<CubicBezier> {
    if points.len() < 2 {
        return Vec::new();
    }
    // Tangents point from each endpoint into the curve.
    let left_tangent = unit(points[0], points[1]);
    let right_tangent = unit(points[points.len() - 1], points[points.len() - 2]);
    let mut out = Vec::new();
    fit_recursive(points, left_tangent, right_tangent, max_error, &mut out);
    out
}

/// Unit vector from `from` toward `to`, as a point-valued direction.
fn unit(from: Point, to: Point) -> Point {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = dx.hypot(dy);
    if len == 0.0 {
        Point::new(0.0, 0.0)
    } else {
        Point::new(dx / len, dy / len)
    }
}

fn fit_recursive(
    points: &[Point],
    left_tangent: Point,
    right_tangent: Point,
    max_error: f64,
    out: &mut Vec<CubicBezier>,
) {
    if points.len() == 2 {
        // Two points: control points one third of the chord apart.
        let dist = points[0].distance(points[1]) / 3.0;
        out.push(CubicBezier {
            p0: points[0],
            p1: offset(points[0], left_tangent, dist),
            p2: offset(points[1], right_tangent, dist),
            p3: points[1],
        });
        return;
    }

    let params = chord_length_parameterize(points);
    let bezier = generate_bezier(points, &params, left_tangent, right_tangent);
    let (error, split) = max_fit_error(points, &params, &bezier);
    if error <= max_error || points.len() == 3 {
        out.push(bezier);
        return;
    }

    // Subdivide at the worst point; the halves share the (negated)
    // center tangent so they join smoothly.
    let center_tangent = unit(points[split + 1], points[split - 1]);
    let neg_center = Point::new(-center_tangent.x, -center_tangent.y);
    fit_recursive(&points[..=split], left_tangent, center_tangent, max_error, out);
    fit_recursive(&points[split..], neg_center, right_tangent, max_error, out);
}

fn offset(p: Point, direction: Point, distance: f64) -> Point {
    Point::new(
        direction.x.mul_add(distance, p.x),
        direction.y.mul_add(distance, p.y),
    )
}

/// Normalized chord-length parameters over the sequence.
fn chord_length_parameterize(points: &[Point]) -> Vec<f64> {
    let mut params = Vec::with_capacity(points.len());
    params.push(0.0);
    for w in points.windows(2) {
        let prev = *params.last().unwrap_or(&0.0);
        params.push(prev + w[0].distance(w[1]));
    }
    let total = *params.last().unwrap_or(&1.0);
    if total > 0.0 {
        for t in &mut params {
            *t /= total;
        }
    }
    params
}

/// Solve the 2×2 normal system for the control distances α₁, α₂.
///
/// Degenerate or non-positive solutions fall back to one third of the
/// endpoint distance.
fn generate_bezier(
    points: &[Point],
    params: &[f64],
    left_tangent: Point,
    right_tangent: Point,
) -> CubicBezier {
    let first = points[0];
    let last = points[points.len() - 1];

    let mut c00 = 0.0;
    let mut c01 = 0.0;
    let mut c11 = 0.0;
    let mut x0 = 0.0;
    let mut x1 = 0.0;

    for (&p, &u) in points.iter().zip(params) {
        let mu = 1.0 - u;
        let b0 = mu * mu * mu;
        let b1 = 3.0 * mu * mu * u;
        let b2 = 3.0 * mu * u * u;
        let b3 = u * u * u;

        let a1 = Point::new(left_tangent.x * b1, left_tangent.y * b1);
        let a2 = Point::new(right_tangent.x * b2, right_tangent.y * b2);

        c00 += a1.x.mul_add(a1.x, a1.y * a1.y);
        c01 += a1.x.mul_add(a2.x, a1.y * a2.y);
        c11 += a2.x.mul_add(a2.x, a2.y * a2.y);

        let tmp = Point::new(
            p.x - (b0 + b1) * first.x - (b2 + b3) * last.x,
            p.y - (b0 + b1) * first.y - (b2 + b3) * last.y,
        );
        x0 += a1.x.mul_add(tmp.x, a1.y * tmp.y);
        x1 += a2.x.mul_add(tmp.x, a2.y * tmp.y);
    }

    let det = c00.mul_add(c11, -(c01 * c01));
    let (alpha1, alpha2) = if det.abs() > f64::EPSILON {
        (
            x0.mul_add(c11, -(c01 * x1)) / det,
            c00.mul_add(x1, -(c01 * x0)) / det,
        )
    } else {
        (0.0, 0.0)
    };

    let fallback = first.distance(last) / 3.0;
    let a1 = if alpha1 > 0.0 { alpha1 } else { fallback };
    let a2 = if alpha2 > 0.0 { alpha2 } else { fallback };

    CubicBezier {
        p0: first,
        p1: offset(first, left_tangent, a1),
        p2: offset(last, right_tangent, a2),
        p3: last,
    }
}

/// Worst squared-distance point and its index.
fn max_fit_error(points: &[Point], params: &[f64], bezier: &CubicBezier) -> (f64, usize) {
    let mut max_error = 0.0;
    let mut split = points.len() / 2;
    for (i, (&p, &u)) in points.iter().zip(params).enumerate().skip(1) {
        if i == points.len() - 1 {
            break;
        }
        let d = bezier.evaluate(u).distance(p);
        if d > max_error {
            max_error = d;
            split = i;
        }
    }
    (max_error, split)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_corner() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ]
    }

    // --- Chaikin ---

    #[test]
    fn chaikin_zero_iterations_is_identity() {
        let pts = square_corner();
        assert_eq!(chaikin(&pts, 0, false), pts);
    }

    #[test]
    fn chaikin_open_path_keeps_endpoints() {
        let pts = square_corner();
        let out = chaikin(&pts, 2, false);
        assert_eq!(out.first(), pts.first());
        assert_eq!(out.last(), pts.last());
        assert!(out.len() > pts.len());
    }

    #[test]
    fn chaikin_cuts_the_corner() {
        let out = chaikin(&square_corner(), 1, false);
        // The sharp corner at (10, 0) is replaced by points 25% along
        // each adjoining edge.
        assert!(!out.contains(&Point::new(10.0, 0.0)) || out.len() == 3);
        assert!(out.contains(&Point::new(7.5, 0.0)));
        assert!(out.contains(&Point::new(10.0, 2.5)));
    }

    #[test]
    fn chaikin_closed_path_wraps() {
        let square = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let out = chaikin(&square, 1, true);
        assert_eq!(out.len(), 8, "closed path: two points per edge");
        // The wrap edge (0,10) -> (0,0) contributes its cut points too.
        assert!(out.contains(&Point::new(0.0, 7.5)));
        assert!(out.contains(&Point::new(0.0, 2.5)));
    }

    // --- moving average ---

    #[test]
    fn moving_average_flattens_spike() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 9.0),
            Point::new(3.0, 0.0),
            Point::new(4.0, 0.0),
        ];
        let out = moving_average(&pts, 1);
        assert!(out[2].y < 9.0, "spike should be averaged down");
        assert!((out[2].y - 3.0).abs() < 1e-9);
    }

    #[test]
    fn moving_average_zero_window_is_identity() {
        let pts = square_corner();
        assert_eq!(moving_average(&pts, 0), pts);
    }

    // --- gaussian smoothing ---

    #[test]
    fn gaussian_preserves_straight_lines() {
        let pts: Vec<Point> = (0..20).map(|i| Point::new(f64::from(i), 3.0)).collect();
        let out = gaussian(&pts, 1.0);
        assert_eq!(out.len(), pts.len());
        for p in &out {
            assert!((p.y - 3.0).abs() < 1e-6, "straight line should stay put");
        }
    }

    #[test]
    fn gaussian_reduces_zigzag_amplitude() {
        let pts: Vec<Point> = (0..20)
            .map(|i| Point::new(f64::from(i), if i % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        let out = gaussian(&pts, 1.5);
        let max_amp = out.iter().map(|p| p.y.abs()).fold(0.0, f64::max);
        assert!(max_amp < 0.5, "zigzag should be damped, max {max_amp}");
    }

    #[test]
    fn mirror_index_reflects_both_ends() {
        assert_eq!(mirror_index(-1, 5), 1);
        assert_eq!(mirror_index(-2, 5), 2);
        assert_eq!(mirror_index(5, 5), 3);
        assert_eq!(mirror_index(6, 5), 2);
        assert_eq!(mirror_index(2, 5), 2);
    }

    // --- Bézier fitting ---

    #[test]
    fn bezier_endpoints_are_interpolated() {
        let pts: Vec<Point> = (0..10)
            .map(|i| {
                let t = f64::from(i) / 9.0;
                Point::new(t * 10.0, (t * std::f64::consts::PI).sin() * 4.0)
            })
            .collect();
        let segments = fit_cubic_beziers(&pts, 0.5);
        assert!(!segments.is_empty());
        assert_eq!(segments[0].p0, pts[0]);
        assert_eq!(segments[segments.len() - 1].p3, pts[9]);
    }

    #[test]
    fn bezier_fit_respects_error_bound() {
        let pts: Vec<Point> = (0..24)
            .map(|i| {
                let t = f64::from(i) / 23.0;
                Point::new(t * 20.0, (t * 2.2).sin() * 5.0)
            })
            .collect();
        let max_error = 0.25;
        let segments = fit_cubic_beziers(&pts, max_error);

        // Every input point must be close to the fitted curve chain.
        for p in &pts {
            let mut best = f64::INFINITY;
            for segment in &segments {
                for step in 0..=64 {
                    let q = segment.evaluate(f64::from(step) / 64.0);
                    best = best.min(p.distance(q));
                }
            }
            assert!(
                best <= max_error * 2.0,
                "point ({}, {}) is {best} from the fitted curve",
                p.x,
                p.y,
            );
        }
    }

    #[test]
    fn two_points_fit_one_third_chord_controls() {
        let pts = vec![Point::new(0.0, 0.0), Point::new(9.0, 0.0)];
        let segments = fit_cubic_beziers(&pts, 1.0);
        assert_eq!(segments.len(), 1);
        let b = segments[0];
        assert!((b.p1.x - 3.0).abs() < 1e-9);
        assert!((b.p2.x - 6.0).abs() < 1e-9);
    }

    #[test]
    fn bezier_evaluate_hits_endpoints() {
        let b = CubicBezier {
            p0: Point::new(0.0, 0.0),
            p1: Point::new(1.0, 2.0),
            p2: Point::new(3.0, 2.0),
            p3: Point::new(4.0, 0.0),
        };
        assert_eq!(b.evaluate(0.0), b.p0);
        assert_eq!(b.evaluate(1.0), b.p3);
    }
}
