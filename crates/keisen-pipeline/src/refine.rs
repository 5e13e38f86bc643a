//! Accuracy-driven refinement: rasterize the reconstructed polylines,
//! score them against the reference mask with chamfer distance
//! transforms, and iterate snap / prune / re-simplify / gap-fill
//! passes until the F1 target or the iteration cap is reached.
//!
//! The strategy order {remove-spurious → snap → adaptive re-simplify →
//! gap-fill} is fixed; reordering changes outputs.

use image::GrayImage;
use imageproc::drawing::BresenhamLineIter;
use serde::{Deserialize, Serialize};

use crate::contour;
use crate::simplify;
use crate::types::{Color, ContourMethod, ContourOptions, Path, Point, RefineOptions};

/// Accuracy snapshot of one rendered path set against the reference
/// mask.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyScore {
    /// Fraction of rendered pixels within τ of a reference pixel.
    pub precision: f64,
    /// Fraction of reference pixels within τ of a rendered pixel.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Mean distance from rendered pixels to the reference mask.
    pub mean_distance_error: f64,
    /// Rendered pixels that matched the reference.
    pub svg_matched: u64,
    /// Reference pixels that matched the rendering.
    pub ref_matched: u64,
    /// Total rendered pixels.
    pub svg_total: u64,
    /// Total reference pixels.
    pub ref_total: u64,
}

/// Before/after refinement scores and the iterations spent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefinementReport {
    /// Score of the incoming path set.
    pub before: AccuracyScore,
    /// Score of the returned path set (never below `before`).
    pub after: AccuracyScore,
    /// Full iterations performed; zero when the incoming score already
    /// met the target.
    pub iterations_used: u32,
}

/// An ℓ₂-approximate distance field over a binary mask.
///
/// Values are 0 at set pixels and grow with distance elsewhere;
/// out-of-range reads return infinity.
#[derive(Debug, Clone)]
pub struct DistanceField {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DistanceField {
    /// Distance at `(x, y)`; infinity out of range.
    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return f32::INFINITY;
        }
        self.data[(y * self.width + x) as usize]
    }

    /// Distance at a sub-pixel point, sampled at the rounded pixel.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn at_point(&self, p: Point) -> f32 {
        let x = p.x.round();
        let y = p.y.round();
        if x < 0.0 || y < 0.0 {
            return f32::INFINITY;
        }
        self.at(x as u32, y as u32)
    }
}

/// Two-pass chamfer (1, √2) distance transform of a binary mask.
#[must_use = "returns the distance field"]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn distance_transform(mask: &GrayImage) -> DistanceField {
    let (w, h) = (mask.width() as usize, mask.height() as usize);
    let diag = std::f32::consts::SQRT_2;
    let mut dist = vec![f32::INFINITY; w * h];
    for (i, p) in mask.as_raw().iter().enumerate() {
        if *p > 0 {
            dist[i] = 0.0;
        }
    }

    let get = |dist: &[f32], x: isize, y: isize| -> f32 {
        if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
            f32::INFINITY
        } else {
            dist[y as usize * w + x as usize]
        }
    };

    // Forward pass: y ascending, x ascending.
    for y in 0..h as isize {
        for x in 0..w as isize {
            let idx = y as usize * w + x as usize;
            let mut d = dist[idx];
            d = d.min(get(&dist, x, y - 1) + 1.0);
            d = d.min(get(&dist, x - 1, y) + 1.0);
            d = d.min(get(&dist, x - 1, y - 1) + diag);
            d = d.min(get(&dist, x + 1, y - 1) + diag);
            dist[idx] = d;
        }
    }

    // Backward pass: y descending, x descending.
    for y in (0..h as isize).rev() {
        for x in (0..w as isize).rev() {
            let idx = y as usize * w + x as usize;
            let mut d = dist[idx];
            d = d.min(get(&dist, x, y + 1) + 1.0);
            d = d.min(get(&dist, x + 1, y) + 1.0);
            d = d.min(get(&dist, x + 1, y + 1) + diag);
            d = d.min(get(&dist, x - 1, y + 1) + diag);
            dist[idx] = d;
        }
    }

    DistanceField {
        width: mask.width(),
        height: mask.height(),
        data: dist,
    }
}

/// Rasterize a path set into a binary mask by marking Bresenham lines
/// between consecutive (rounded) points; closed paths also draw the
/// closing segment.
#[must_use = "returns the rendered mask"]
#[allow(clippy::cast_possible_truncation)]
pub fn rasterize(paths: &[Path], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let mut mark = |x: i32, y: i32| {
        if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
            #[allow(clippy::cast_sign_loss)]
            mask.put_pixel(x as u32, y as u32, image::Luma([255]));
        }
    };

    for path in paths {
        if path.points.len() == 1 {
            let p = path.points[0];
            mark(p.x.round() as i32, p.y.round() as i32);
            continue;
        }
        let segment_ends = path.points.windows(2).map(|w| (w[0], w[1]));
        let closing = if path.closed && path.points.len() > 2 {
            path.points
                .last()
                .zip(path.points.first())
                .map(|(&a, &b)| (a, b))
        } else {
            None
        };
        for (a, b) in segment_ends.chain(closing) {
            let start = (a.x.round() as f32, a.y.round() as f32);
            let end = (b.x.round() as f32, b.y.round() as f32);
            for (x, y) in BresenhamLineIter::new(start, end) {
                mark(x, y);
            }
            // The iterator yields the start but not always the end.
            mark(end.0 as i32, end.1 as i32);
        }
    }
    mask
}

/// Score a rendering against the reference with match tolerance `tau`.
///
/// Zero denominators (empty masks) yield zero for the affected ratio.
#[must_use = "returns the accuracy score"]
#[allow(clippy::cast_precision_loss)]
pub fn score(reference: &GrayImage, rendered: &GrayImage, tau: f64) -> AccuracyScore {
    let ref_dt = distance_transform(reference);
    let svg_dt = distance_transform(rendered);
    score_with_fields(reference, rendered, &ref_dt, &svg_dt, tau)
}

/// Score with precomputed distance fields (avoids recomputing the
/// reference transform inside the refinement loop).
#[allow(clippy::cast_precision_loss)]
fn score_with_fields(
    reference: &GrayImage,
    rendered: &GrayImage,
    ref_dt: &DistanceField,
    svg_dt: &DistanceField,
    tau: f64,
) -> AccuracyScore {
    #[allow(clippy::cast_possible_truncation)]
    let tau32 = tau as f32;

    let mut svg_total = 0u64;
    let mut svg_matched = 0u64;
    let mut distance_sum = 0.0f64;
    for (x, y, p) in rendered.enumerate_pixels() {
        if p.0[0] == 0 {
            continue;
        }
        svg_total += 1;
        let d = ref_dt.at(x, y);
        if d <= tau32 {
            svg_matched += 1;
        }
        distance_sum += f64::from(d);
    }

    let mut ref_total = 0u64;
    let mut ref_matched = 0u64;
    for (x, y, p) in reference.enumerate_pixels() {
        if p.0[0] == 0 {
            continue;
        }
        ref_total += 1;
        if svg_dt.at(x, y) <= tau32 {
            ref_matched += 1;
        }
    }

    let precision = ratio(svg_matched, svg_total);
    let recall = ratio(ref_matched, ref_total);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    let mean_distance_error = if svg_total > 0 {
        distance_sum / svg_total as f64
    } else {
        0.0
    };

    AccuracyScore {
        precision,
        recall,
        f1,
        mean_distance_error,
        svg_matched,
        ref_matched,
        svg_total,
        ref_total,
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Refine a path set against the reference mask.
///
/// Runs up to `max_iterations` passes of the fixed strategy order,
/// stopping early once the F1 target is met. If the final score would
/// fall below the incoming score, the input paths are returned
/// unchanged and the report shows `after == before`.
#[must_use = "returns the refined paths and the report"]
pub fn refine(
    paths: Vec<Path>,
    reference: &GrayImage,
    options: &RefineOptions,
) -> (Vec<Path>, RefinementReport) {
    let (w, h) = (reference.width(), reference.height());
    let tau = options.distance_tolerance;
    let ref_dt = distance_transform(reference);

    let before = score(reference, &rasterize(&paths, w, h), tau);
    if before.f1 >= options.target_f1 || options.max_iterations == 0 {
        return (
            paths,
            RefinementReport {
                before,
                after: before,
                iterations_used: 0,
            },
        );
    }

    let original = paths.clone();
    let mut current = paths;
    let mut last = before;
    let mut iterations_used = 0u32;

    for _ in 0..options.max_iterations {
        iterations_used += 1;

        if last.precision < options.target_f1 {
            remove_spurious(&mut current, &ref_dt, options.spurious_threshold);
        }
        snap_to_edges(&mut current, reference, options.snap_radius);
        resimplify_drifted(&mut current, &ref_dt, tau);

        let rendered = rasterize(&current, w, h);
        let interim = score(reference, &rendered, tau);
        if interim.recall < options.target_f1 {
            fill_gaps(&mut current, reference, &rendered, options, tau);
        }

        last = score(reference, &rasterize(&current, w, h), tau);
        if last.f1 >= options.target_f1 {
            break;
        }
    }

    if last.f1 < before.f1 {
        // No strategy helped; report the attempt but hand back the
        // input unchanged rather than regress.
        return (
            original,
            RefinementReport {
                before,
                after: before,
                iterations_used,
            },
        );
    }

    (
        current,
        RefinementReport {
            before,
            after: last,
            iterations_used,
        },
    )
}

/// Drop paths whose unmatched-point fraction exceeds the threshold,
/// and any path left with fewer than 3 points.
#[allow(clippy::cast_precision_loss)]
fn remove_spurious(paths: &mut Vec<Path>, ref_dt: &DistanceField, threshold: f64) {
    paths.retain(|path| {
        if path.points.len() < 3 {
            return false;
        }
        let unmatched = path
            .points
            .iter()
            .filter(|&&p| ref_dt.at_point(p) > 2.0)
            .count();
        (unmatched as f64 / path.points.len() as f64) <= threshold
    });
}

/// Snap each point not already on a reference pixel to the nearest
/// reference pixel within the search window.
///
/// Ties resolve to the smaller squared distance, then scan order
/// (row-major over the window).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn snap_to_edges(paths: &mut [Path], reference: &GrayImage, snap_radius: i32) {
    let (w, h) = (i64::from(reference.width()), i64::from(reference.height()));
    let on_reference = |x: i64, y: i64| -> bool {
        x >= 0 && y >= 0 && x < w && y < h && reference.get_pixel(x as u32, y as u32).0[0] > 0
    };

    for path in paths.iter_mut() {
        for point in &mut path.points {
            let px = point.x.round() as i64;
            let py = point.y.round() as i64;
            if on_reference(px, py) {
                continue;
            }

            let mut best: Option<(i64, (i64, i64))> = None;
            for dy in -i64::from(snap_radius)..=i64::from(snap_radius) {
                for dx in -i64::from(snap_radius)..=i64::from(snap_radius) {
                    let (nx, ny) = (px + dx, py + dy);
                    if !on_reference(nx, ny) {
                        continue;
                    }
                    let d2 = dx * dx + dy * dy;
                    if best.is_none_or(|(bd, _)| d2 < bd) {
                        best = Some((d2, (nx, ny)));
                    }
                }
            }
            if let Some((_, (nx, ny))) = best {
                *point = Point::new(nx as f64, ny as f64);
            }
        }
    }
}

/// Re-run Douglas–Peucker at half the default tolerance on paths whose
/// mean reference distance exceeds τ, recovering detail lost to
/// over-simplification.
#[allow(clippy::cast_precision_loss)]
fn resimplify_drifted(paths: &mut [Path], ref_dt: &DistanceField, tau: f64) {
    for path in paths.iter_mut() {
        if path.points.is_empty() {
            continue;
        }
        let mean: f64 = path
            .points
            .iter()
            .map(|&p| f64::from(ref_dt.at_point(p)))
            .sum::<f64>()
            / path.points.len() as f64;
        if mean > tau {
            path.points = simplify::douglas_peucker(&path.points, 0.5);
        }
    }
}

/// Trace new paths over reference regions the rendering missed.
///
/// Builds the unmatched-reference mask, labels its 8-connected
/// components, and Moore-traces every component at least
/// `gap_fill_min_cluster` pixels large. Clusters that trace to nothing
/// are skipped.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fill_gaps(
    paths: &mut Vec<Path>,
    reference: &GrayImage,
    rendered: &GrayImage,
    options: &RefineOptions,
    tau: f64,
) {
    let svg_dt = distance_transform(rendered);
    let tau32 = tau as f32;
    let unmatched = GrayImage::from_fn(reference.width(), reference.height(), |x, y| {
        let missed = reference.get_pixel(x, y).0[0] > 0 && svg_dt.at(x, y) > tau32;
        image::Luma([if missed { 255 } else { 0 }])
    });

    let stroke_width = paths.first().map_or(1.0, |p| p.stroke_width);
    for cluster in connected_components(&unmatched) {
        if cluster.len() < options.gap_fill_min_cluster {
            continue;
        }
        let indicator = component_mask(&cluster, reference.width(), reference.height());
        // A trace failure on one cluster must not abort the whole
        // refinement pass; the cluster is simply skipped.
        let Ok(traced) = contour::trace_contours(
            &indicator,
            &ContourOptions {
                method: ContourMethod::Moore,
                min_area: 5.0,
                simplify: true,
                tolerance: 1.0,
                ..ContourOptions::default()
            },
        ) else {
            continue;
        };
        for contour in traced {
            paths.push(Path::from_contour(contour, Color::BLACK, stroke_width));
        }
    }
}

/// 8-connected components of a binary mask, as pixel lists.
fn connected_components(mask: &GrayImage) -> Vec<Vec<(u32, u32)>> {
    let (w, h) = (mask.width(), mask.height());
    let mut visited = vec![false; (w as usize) * (h as usize)];
    let mut components = Vec::new();

    for sy in 0..h {
        for sx in 0..w {
            let start = (sy * w + sx) as usize;
            if visited[start] || mask.get_pixel(sx, sy).0[0] == 0 {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![(sx, sy)];
            visited[start] = true;
            while let Some((x, y)) = stack.pop() {
                component.push((x, y));
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let nx = i64::from(x) + dx;
                        let ny = i64::from(y) + dy;
                        if nx < 0 || ny < 0 || nx >= i64::from(w) || ny >= i64::from(h) {
                            continue;
                        }
                        #[allow(clippy::cast_sign_loss)]
                        let (nx, ny) = (nx as u32, ny as u32);
                        let idx = (ny * w + nx) as usize;
                        if !visited[idx] && mask.get_pixel(nx, ny).0[0] > 0 {
                            visited[idx] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
            components.push(component);
        }
    }
    components
}

fn component_mask(pixels: &[(u32, u32)], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for &(x, y) in pixels {
        mask.put_pixel(x, y, image::Luma([255]));
    }
    mask
}
