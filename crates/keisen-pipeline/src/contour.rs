//! Contour tracing: walk a binary mask into ordered point sequences.
//!
//! Four pluggable strategies behind the [`ContourTracer`] trait:
//!
//! - **Edge-chain** (default): follows thinned lines pixel-to-pixel and
//!   emits open polylines — the natural partner of skeletonization.
//! - **Moore**: closed boundary loops around each blob.
//! - **Suzuki–Abe**: boundary loops plus an outer/hole hierarchy.
//! - **Marching squares**: closed loops with sub-pixel coordinates.

use std::collections::HashMap;

use image::GrayImage;

use crate::simplify;
use crate::types::{Contour, ContourMethod, ContourOptions, PipelineError, Point};

/// 8-connected neighbor offsets, clockwise from east.
///
/// Both the edge-chain walker and the Moore tracer index into this
/// table, so "first neighbor in a fixed direction order" means the
/// same thing everywhere.
const DIRECTIONS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (set pixels = line material). Output: ordered
/// point sequences, open or closed depending on the strategy.
pub trait ContourTracer {
    /// Trace all contours in the given binary mask.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Processing`] when a boundary walk
    /// exhausts its safety cap without closing, which indicates a
    /// violated tracer invariant rather than a property of the input.
    fn trace(&self, mask: &GrayImage) -> Result<Vec<Contour>, PipelineError>;
}

impl ContourTracer for ContourMethod {
    fn trace(&self, mask: &GrayImage) -> Result<Vec<Contour>, PipelineError> {
        match *self {
            Self::EdgeChain => Ok(trace_edge_chains(mask)),
            Self::Moore => trace_moore(mask),
            Self::Suzuki => Ok(trace_suzuki(mask)?.contours),
            Self::MarchingSquares => Ok(trace_marching_squares(mask, 127.5)),
        }
    }
}

/// Trace with the configured method, filter by enclosed area, and
/// optionally simplify.
///
/// # Errors
///
/// Propagates tracer failures; see [`ContourTracer::trace`].
pub fn trace_contours(
    mask: &GrayImage,
    options: &ContourOptions,
) -> Result<Vec<Contour>, PipelineError> {
    let mut contours = options.method.trace(mask)?;
    contours.retain(|c| {
        let area = c.area();
        area >= options.min_area && area <= options.max_area
    });
    if options.simplify {
        contours = contours
            .iter()
            .map(|c| {
                if options.relative_tolerance {
                    simplify::douglas_peucker_relative(c, options.tolerance)
                } else {
                    simplify::douglas_peucker_contour(c, options.tolerance)
                }
            })
            .collect();
    }
    Ok(contours)
}

/// Whether the mask pixel at `(x, y)` is set; out of range counts as
/// background.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn is_set(mask: &GrayImage, x: i64, y: i64) -> bool {
    x >= 0
        && y >= 0
        && x < i64::from(mask.width())
        && y < i64::from(mask.height())
        && mask.get_pixel(x as u32, y as u32).0[0] > 0
}

/// Number of set 8-neighbors around `(x, y)`.
fn neighbor_count(mask: &GrayImage, x: i64, y: i64) -> u32 {
    DIRECTIONS
        .iter()
        .map(|&(dx, dy)| u32::from(is_set(mask, x + dx, y + dy)))
        .sum()
}

// ───────────────────────── Edge-chain tracer ──────────────────────────

/// Follow thinned lines into polylines.
///
/// Pass 1 starts at endpoints (pixels with exactly one set neighbor)
/// so open strokes are walked end to end; pass 2 picks up closed loops
/// that have no endpoints. Chains shorter than 3 pixels are dropped.
#[allow(clippy::cast_precision_loss)]
fn trace_edge_chains(mask: &GrayImage) -> Vec<Contour> {
    let w = mask.width() as usize;
    let h = mask.height() as usize;
    let mut visited = vec![false; w * h];
    let cap = w * h;
    let mut contours = Vec::new();

    // Pass 1: open strokes, walked from their endpoints.
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            #[allow(clippy::cast_sign_loss)]
            let idx = y as usize * w + x as usize;
            if visited[idx] || !is_set(mask, x, y) || neighbor_count(mask, x, y) != 1 {
                continue;
            }
            let chain = walk_chain(mask, &mut visited, x, y, cap);
            if chain.len() >= 3 {
                contours.push(Contour::new(chain, false));
            }
        }
    }

    // Pass 2: closed loops (no endpoint to start from).
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            #[allow(clippy::cast_sign_loss)]
            let idx = y as usize * w + x as usize;
            if visited[idx] || !is_set(mask, x, y) {
                continue;
            }
            let chain = walk_chain(mask, &mut visited, x, y, cap);
            if chain.len() >= 3 {
                // Closed only when the walk came back around to a pixel
                // adjacent to its start.
                let closed = chain
                    .first()
                    .zip(chain.last())
                    .is_some_and(|(a, b)| {
                        (a.x - b.x).abs() <= 1.0 && (a.y - b.y).abs() <= 1.0
                    });
                contours.push(Contour::new(chain, closed));
            }
        }
    }

    contours
}

/// Walk from `(sx, sy)` by repeatedly taking the first unvisited set
/// neighbor in the fixed direction order.
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn walk_chain(
    mask: &GrayImage,
    visited: &mut [bool],
    sx: i64,
    sy: i64,
    cap: usize,
) -> Vec<Point> {
    let w = mask.width() as usize;
    let mut points = Vec::new();
    let (mut cx, mut cy) = (sx, sy);

    loop {
        visited[cy as usize * w + cx as usize] = true;
        points.push(Point::new(cx as f64, cy as f64));
        if points.len() >= cap {
            break;
        }

        let mut next = None;
        for &(dx, dy) in &DIRECTIONS {
            let (nx, ny) = (cx + dx, cy + dy);
            if is_set(mask, nx, ny) && !visited[ny as usize * w + nx as usize] {
                next = Some((nx, ny));
                break;
            }
        }
        match next {
            Some((nx, ny)) => {
                cx = nx;
                cy = ny;
            }
            None => break,
        }
    }

    points
}

// ───────────────────────── Moore boundary tracer ──────────────────────

/// Trace the 8-connected boundary of every blob.
///
/// Scans for the leftmost set pixel of each untraced blob, then walks
/// the Moore neighborhood clockwise. Terminates on return to the start
/// pixel once at least 3 points were collected.
fn trace_moore(mask: &GrayImage) -> Result<Vec<Contour>, PipelineError> {
    let w = mask.width() as usize;
    let h = mask.height() as usize;
    let mut visited = vec![false; w * h];
    let mut contours = Vec::new();

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            #[allow(clippy::cast_sign_loss)]
            let idx = y as usize * w + x as usize;
            if visited[idx] || !is_set(mask, x, y) || is_set(mask, x - 1, y) {
                continue;
            }
            let pixels = moore_walk(mask, (x, y), initial_backtrack(mask, x, y))?;
            for &(px, py) in &pixels {
                #[allow(clippy::cast_sign_loss)]
                {
                    visited[py as usize * w + px as usize] = true;
                }
            }
            if pixels.len() >= 3 {
                contours.push(Contour::new(to_points(&pixels), true));
            }
        }
    }

    Ok(contours)
}

/// First background direction around a start pixel, used as the walk's
/// initial backtrack.
fn initial_backtrack(mask: &GrayImage, x: i64, y: i64) -> usize {
    DIRECTIONS
        .iter()
        .position(|&(dx, dy)| !is_set(mask, x + dx, y + dy))
        .unwrap_or(0)
}

/// One Moore boundary walk starting at `start`.
///
/// `backtrack` is a direction index pointing at background next to the
/// start pixel (the side the scan entered from). Each step scans the
/// Moore neighborhood clockwise starting one past the backtrack; the
/// backtrack then becomes the last background pixel examined before
/// the accepted neighbor, which keeps the walk hugging the boundary
/// through concave corners.
///
/// A walk that burns through the safety cap without rejoining its
/// start has violated the boundary invariant; that is surfaced as a
/// [`PipelineError::Processing`] rather than returning partial output.
fn moore_walk(
    mask: &GrayImage,
    start: (i64, i64),
    backtrack: usize,
) -> Result<Vec<(i64, i64)>, PipelineError> {
    let cap = (mask.width() as usize) * (mask.height() as usize) * 2;
    let mut pixels = vec![start];
    let (mut cx, mut cy) = start;
    let (bdx, bdy) = DIRECTIONS[backtrack];
    let mut back = (cx + bdx, cy + bdy);

    for _ in 0..cap {
        let rel = (back.0 - cx, back.1 - cy);
        let bdir = DIRECTIONS.iter().position(|&d| d == rel).unwrap_or(0);
        let mut advanced = false;
        let mut last_background = back;
        for i in 1..=8 {
            let check = (bdir + i) % 8;
            let (dx, dy) = DIRECTIONS[check];
            let (nx, ny) = (cx + dx, cy + dy);
            if !is_set(mask, nx, ny) {
                last_background = (nx, ny);
                continue;
            }
            if (nx, ny) == start && pixels.len() >= 3 {
                return Ok(pixels);
            }
            back = last_background;
            cx = nx;
            cy = ny;
            pixels.push((nx, ny));
            advanced = true;
            break;
        }
        if !advanced {
            // Isolated pixel.
            return Ok(pixels);
        }
    }

    Err(PipelineError::Processing {
        stage: "contour tracing",
        message: format!(
            "boundary walk from ({}, {}) did not close within {cap} steps",
            start.0, start.1,
        ),
    })
}

#[allow(clippy::cast_precision_loss)]
fn to_points(pixels: &[(i64, i64)]) -> Vec<Point> {
    pixels
        .iter()
        .map(|&(x, y)| Point::new(x as f64, y as f64))
        .collect()
}

// ───────────────────────── Suzuki–Abe tracer ──────────────────────────

/// Suzuki–Abe trace result: contours plus the hole hierarchy.
#[derive(Debug, Clone)]
pub struct SuzukiTrace {
    /// Traced contours; `hole` is set on inner boundaries.
    pub contours: Vec<Contour>,
    /// For each contour, the index of its parent contour (outer
    /// boundary enclosing a hole); `None` for outer contours.
    pub parents: Vec<Option<usize>>,
}

/// Border following with region labels and an outer/hole hierarchy.
///
/// An outer contour starts at a set pixel whose left neighbor is
/// background; a hole contour starts at a set pixel whose *below*
/// neighbor is background while an outer label is active on the
/// scanline. Both are traced like Moore boundaries, seeded from the
/// side the scan entered from.
///
/// # Errors
///
/// Propagates boundary-walk failures; see [`ContourTracer::trace`].
#[allow(clippy::cast_sign_loss)]
pub fn trace_suzuki(mask: &GrayImage) -> Result<SuzukiTrace, PipelineError> {
    let w = mask.width() as usize;
    let h = mask.height() as usize;
    // 0 = unlabeled, >0 = outer contour label, <0 = hole contour label.
    let mut labels = vec![0i32; w * h];
    let mut next_label = 1i32;
    let mut contours = Vec::new();
    let mut parents = Vec::new();
    // label -> contour index
    let mut by_label: HashMap<i32, usize> = HashMap::new();

    for y in 0..h as i64 {
        // Most recent outer label seen on this scanline; the parent of
        // any hole discovered to its right.
        let mut last_outer = 0i32;
        for x in 0..w as i64 {
            let idx = y as usize * w + x as usize;
            if !is_set(mask, x, y) {
                continue;
            }
            let label = labels[idx];
            if label > 0 {
                last_outer = label;
            }

            if label == 0 && !is_set(mask, x - 1, y) {
                // Outer contour: entered from the left.
                let l = next_label;
                next_label += 1;
                let pixels = moore_walk(mask, (x, y), 4)?;
                for &(px, py) in &pixels {
                    // Boundary pixels that face enclosed-or-exterior
                    // background below are marked negative so they can
                    // never seed a hole trace of their own.
                    let mark = if is_set(mask, px, py + 1) { l } else { -l };
                    labels[py as usize * w + px as usize] = mark;
                }
                if pixels.len() >= 3 {
                    by_label.insert(l, contours.len());
                    contours.push(Contour::new(to_points(&pixels), true));
                    parents.push(None);
                }
                last_outer = l;
            } else if label == 0 && last_outer > 0 && !is_set(mask, x, y + 1) {
                // Hole contour: the pixel sits on top of enclosed
                // background. Negative labels stop the rest of the
                // hole's rim from re-triggering.
                let l = next_label;
                next_label += 1;
                let parent = last_outer;
                let pixels = moore_walk(mask, (x, y), 2)?;
                for &(px, py) in &pixels {
                    labels[py as usize * w + px as usize] = -l;
                }
                if pixels.len() >= 3 {
                    let mut contour = Contour::new(to_points(&pixels), true);
                    contour.hole = true;
                    contours.push(contour);
                    parents.push(by_label.get(&parent).copied());
                }
            }
        }
    }

    Ok(SuzukiTrace { contours, parents })
}

// ───────────────────────── Marching squares ───────────────────────────

/// Cell edge identifiers: top, right, bottom, left.
const EDGE_TOP: u8 = 0;
const EDGE_RIGHT: u8 = 1;
const EDGE_BOTTOM: u8 = 2;
const EDGE_LEFT: u8 = 3;

/// Segment connections for each of the 16 corner cases.
///
/// Corner bits: TL=1, TR=2, BR=4, BL=8. The two saddle cases (5, 10)
/// emit both diagonal connections so no contour segment is lost.
const CASE_SEGMENTS: [&[(u8, u8)]; 16] = [
    &[],                                           // 0
    &[(EDGE_LEFT, EDGE_TOP)],                      // 1: TL
    &[(EDGE_TOP, EDGE_RIGHT)],                     // 2: TR
    &[(EDGE_LEFT, EDGE_RIGHT)],                    // 3
    &[(EDGE_RIGHT, EDGE_BOTTOM)],                  // 4: BR
    &[(EDGE_LEFT, EDGE_TOP), (EDGE_RIGHT, EDGE_BOTTOM)], // 5: saddle
    &[(EDGE_TOP, EDGE_BOTTOM)],                    // 6
    &[(EDGE_LEFT, EDGE_BOTTOM)],                   // 7
    &[(EDGE_BOTTOM, EDGE_LEFT)],                   // 8: BL
    &[(EDGE_TOP, EDGE_BOTTOM)],                    // 9
    &[(EDGE_TOP, EDGE_RIGHT), (EDGE_BOTTOM, EDGE_LEFT)], // 10: saddle
    &[(EDGE_RIGHT, EDGE_BOTTOM)],                  // 11
    &[(EDGE_LEFT, EDGE_RIGHT)],                    // 12
    &[(EDGE_TOP, EDGE_RIGHT)],                     // 13
    &[(EDGE_LEFT, EDGE_TOP)],                      // 14
    &[],                                           // 15
];

/// Extract sub-pixel contours by classifying 2×2 cells against a
/// grayscale threshold and linking the resulting edge crossings into
/// polylines.
#[must_use = "returns the traced contours"]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn trace_marching_squares(image: &GrayImage, threshold: f32) -> Vec<Contour> {
    let (w, h) = (image.width(), image.height());
    if w < 2 || h < 2 {
        return Vec::new();
    }

    let value = |x: u32, y: u32| f32::from(image.get_pixel(x, y).0[0]);
    let mut segments: Vec<(Point, Point)> = Vec::new();
    let mut seen: std::collections::HashSet<(u32, u32, u8, u8)> = std::collections::HashSet::new();

    for y in 0..h - 1 {
        for x in 0..w - 1 {
            let tl = value(x, y);
            let tr = value(x + 1, y);
            let br = value(x + 1, y + 1);
            let bl = value(x, y + 1);

            let case = usize::from(tl > threshold)
                | usize::from(tr > threshold) << 1
                | usize::from(br > threshold) << 2
                | usize::from(bl > threshold) << 3;
            if case == 0 || case == 15 {
                continue;
            }

            let crossing = |edge: u8| -> Point {
                let (v1, v2, x1, y1, x2, y2) = match edge {
                    EDGE_TOP => (tl, tr, x, y, x + 1, y),
                    EDGE_RIGHT => (tr, br, x + 1, y, x + 1, y + 1),
                    EDGE_BOTTOM => (bl, br, x, y + 1, x + 1, y + 1),
                    _ => (tl, bl, x, y, x, y + 1),
                };
                interpolate(v1, v2, threshold, f64::from(x1), f64::from(y1), f64::from(x2), f64::from(y2))
            };

            for &(e1, e2) in CASE_SEGMENTS[case] {
                // Deduplicate by cell and edge pair.
                if seen.insert((x, y, e1.min(e2), e1.max(e2))) {
                    segments.push((crossing(e1), crossing(e2)));
                }
            }
        }
    }

    link_segments(&segments)
}

/// Linear interpolation of the threshold crossing along one cell edge.
fn interpolate(v1: f32, v2: f32, threshold: f32, x1: f64, y1: f64, x2: f64, y2: f64) -> Point {
    if (v1 - v2).abs() < f32::EPSILON {
        return Point::new((x1 + x2) / 2.0, (y1 + y2) / 2.0);
    }
    let t = f64::from(((threshold - v1) / (v2 - v1)).clamp(0.0, 1.0));
    Point::new((x2 - x1).mul_add(t, x1), (y2 - y1).mul_add(t, y1))
}

/// Quantized endpoint key for segment linking.
#[allow(clippy::cast_possible_truncation)]
fn endpoint_key(p: Point) -> (i64, i64) {
    ((p.x * 1024.0).round() as i64, (p.y * 1024.0).round() as i64)
}

/// Link shared-endpoint segments into polylines.
///
/// Chains that return to their starting point become closed contours;
/// chains that hit a dead end (image border) stay open.
fn link_segments(segments: &[(Point, Point)]) -> Vec<Contour> {
    let mut by_endpoint: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (i, &(a, b)) in segments.iter().enumerate() {
        by_endpoint.entry(endpoint_key(a)).or_default().push(i);
        by_endpoint.entry(endpoint_key(b)).or_default().push(i);
    }

    let mut used = vec![false; segments.len()];
    let mut contours = Vec::new();

    for i in 0..segments.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let (a, b) = segments[i];
        let mut chain = vec![a, b];

        // Extend forward from the tail, then backward from the head.
        for _ in 0..2 {
            loop {
                let tail = *chain.last().unwrap_or(&a);
                let Some(candidates) = by_endpoint.get(&endpoint_key(tail)) else {
                    break;
                };
                let Some(&next) = candidates.iter().find(|&&s| !used[s]) else {
                    break;
                };
                used[next] = true;
                let (na, nb) = segments[next];
                let other = if endpoint_key(na) == endpoint_key(tail) {
                    nb
                } else {
                    na
                };
                chain.push(other);
            }
            chain.reverse();
        }

        let closed = chain.len() >= 3
            && endpoint_key(chain[0]) == endpoint_key(chain[chain.len() - 1]);
        if closed {
            chain.pop();
        }
        if chain.len() >= 3 || (!closed && chain.len() >= 2) {
            contours.push(Contour::new(chain, closed));
        }
    }

    contours
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Binary mask with set pixels at the given coordinates.
    fn mask_from(coords: &[(u32, u32)], w: u32, h: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for &(x, y) in coords {
            mask.put_pixel(x, y, image::Luma([255]));
        }
        mask
    }

    /// Filled square from (x0, y0) with the given side length.
    fn filled_square(x0: u32, y0: u32, side: u32, w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            image::Luma([if inside { 255 } else { 0 }])
        })
    }

    /// Hollow square outline (1 px thick).
    fn square_outline(x0: u32, y0: u32, side: u32, w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let on_edge = (x == x0 || x == x0 + side - 1 || y == y0 || y == y0 + side - 1)
                && x >= x0
                && x < x0 + side
                && y >= y0
                && y < y0 + side;
            image::Luma([if on_edge { 255 } else { 0 }])
        })
    }

    // --- edge-chain ---

    #[test]
    fn empty_mask_yields_no_contours() {
        let mask = GrayImage::new(10, 10);
        for method in [
            ContourMethod::EdgeChain,
            ContourMethod::Moore,
            ContourMethod::Suzuki,
            ContourMethod::MarchingSquares,
        ] {
            assert!(method.trace(&mask).unwrap().is_empty(), "{method}");
        }
    }

    #[test]
    fn horizontal_line_traces_as_single_open_chain() {
        let coords: Vec<(u32, u32)> = (2..18).map(|x| (x, 5)).collect();
        let mask = mask_from(&coords, 20, 10);
        let contours = trace_edge_chains(&mask);
        assert_eq!(contours.len(), 1);
        let chain = &contours[0];
        assert!(!chain.closed, "edge chains along a stroke are open");
        assert_eq!(chain.len(), 16);
        // Walked end to end in order.
        assert_eq!(chain.points[0], Point::new(2.0, 5.0));
        assert_eq!(chain.points[15], Point::new(17.0, 5.0));
    }

    #[test]
    fn two_disjoint_lines_trace_separately() {
        let mut coords: Vec<(u32, u32)> = (2..12).map(|x| (x, 2)).collect();
        coords.extend((2..12).map(|x| (x, 8)));
        let mask = mask_from(&coords, 14, 12);
        let contours = trace_edge_chains(&mask);
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn pixel_ring_traces_as_closed_chain() {
        let mask = square_outline(3, 3, 6, 12, 12);
        let contours = trace_edge_chains(&mask);
        assert_eq!(contours.len(), 1);
        assert!(contours[0].closed, "ring should close back on itself");
        assert_eq!(contours[0].len(), 20, "6x6 outline has 20 pixels");
    }

    #[test]
    fn short_chains_are_dropped() {
        let mask = mask_from(&[(2, 2), (3, 2)], 8, 8);
        assert!(trace_edge_chains(&mask).is_empty());
    }

    // --- Moore ---

    #[test]
    fn moore_traces_filled_square_boundary() {
        let mask = filled_square(5, 5, 8, 20, 20);
        let contours = trace_moore(&mask).unwrap();
        assert_eq!(contours.len(), 1);
        let boundary = &contours[0];
        assert!(boundary.closed);
        // The boundary of an 8x8 square has 28 pixels.
        assert_eq!(boundary.len(), 28);
        // Every traced point lies on the square's rim.
        for p in &boundary.points {
            let on_rim = p.x == 5.0 || p.x == 12.0 || p.y == 5.0 || p.y == 12.0;
            assert!(on_rim, "interior point ({}, {}) in boundary", p.x, p.y);
        }
    }

    #[test]
    fn moore_separates_disjoint_blobs() {
        let mut mask = filled_square(2, 2, 4, 20, 10);
        for y in 2..6 {
            for x in 12..16 {
                mask.put_pixel(x, y, image::Luma([255]));
            }
        }
        assert_eq!(trace_moore(&mask).unwrap().len(), 2);
    }

    #[test]
    fn moore_ignores_isolated_pixels() {
        let mask = mask_from(&[(5, 5)], 10, 10);
        assert!(trace_moore(&mask).unwrap().is_empty(), "need >= 3 boundary points");
    }

    // --- Suzuki ---

    #[test]
    fn suzuki_finds_outer_boundary_of_filled_square() {
        let mask = filled_square(5, 5, 8, 20, 20);
        let trace = trace_suzuki(&mask).unwrap();
        assert_eq!(trace.contours.len(), 1);
        assert!(!trace.contours[0].hole);
        assert_eq!(trace.parents[0], None);
    }

    #[test]
    fn suzuki_links_hole_to_its_outer_contour() {
        // A thick ring: 12x12 square with a 4x4 hole in the middle.
        let mask = GrayImage::from_fn(20, 20, |x, y| {
            let in_outer = (4..16).contains(&x) && (4..16).contains(&y);
            let in_hole = (8..12).contains(&x) && (8..12).contains(&y);
            image::Luma([if in_outer && !in_hole { 255 } else { 0 }])
        });
        let trace = trace_suzuki(&mask).unwrap();
        assert_eq!(trace.contours.len(), 2, "outer boundary + hole boundary");
        let hole_idx = trace
            .contours
            .iter()
            .position(|c| c.hole)
            .expect("one contour should be a hole");
        let outer_idx = 1 - hole_idx;
        assert!(!trace.contours[outer_idx].hole);
        assert_eq!(
            trace.parents[hole_idx],
            Some(outer_idx),
            "hole must point at its enclosing contour",
        );
    }

    #[test]
    fn suzuki_outline_area_matches_square() {
        // 50x50 outline inscribed in a 64x64 canvas.
        let mask = square_outline(7, 7, 50, 64, 64);
        let trace = trace_suzuki(&mask).unwrap();
        assert!(!trace.contours.is_empty());
        let outer = trace
            .contours
            .iter()
            .find(|c| !c.hole)
            .expect("outer contour");
        let area = outer.area();
        assert!(
            (area - 2500.0).abs() <= 150.0,
            "expected ~2500 px^2, got {area}",
        );
    }

    // --- marching squares ---

    #[test]
    fn marching_squares_rings_a_filled_square() {
        let mask = filled_square(4, 4, 8, 16, 16);
        let contours = trace_marching_squares(&mask, 127.5);
        assert_eq!(contours.len(), 1);
        let ring = &contours[0];
        assert!(ring.closed);
        // Sub-pixel bounding box hugs the square within one pixel.
        let (min_x, min_y, max_x, max_y) = ring.bounding_box();
        assert!((min_x - 3.5).abs() <= 1.0, "min_x = {min_x}");
        assert!((min_y - 3.5).abs() <= 1.0, "min_y = {min_y}");
        assert!((max_x - 11.5).abs() <= 1.0, "max_x = {max_x}");
        assert!((max_y - 11.5).abs() <= 1.0, "max_y = {max_y}");
    }

    #[test]
    fn marching_squares_crossings_are_subpixel() {
        // A soft ramp puts crossings strictly between pixel centers.
        let image = GrayImage::from_fn(8, 8, |x, _| image::Luma([(x * 36) as u8]));
        let contours = trace_marching_squares(&image, 100.0);
        let has_fractional = contours
            .iter()
            .flat_map(|c| &c.points)
            .any(|p| (p.x - p.x.round()).abs() > 1e-6);
        assert!(has_fractional, "expected interpolated crossing positions");
    }

    #[test]
    fn marching_squares_saddle_emits_both_diagonals() {
        // Checkerboard 2x2: TL and BR set -> case 5 in the center cell.
        let mask = mask_from(&[(0, 0), (1, 1)], 2, 2);
        let contours = trace_marching_squares(&mask, 127.5);
        let total_points: usize = contours.iter().map(Contour::len).sum();
        assert!(
            total_points >= 4,
            "both saddle diagonals must produce geometry, got {total_points} points",
        );
    }

    #[test]
    fn degenerate_image_yields_nothing() {
        let mask = GrayImage::new(1, 5);
        assert!(trace_marching_squares(&mask, 127.5).is_empty());
    }

    // --- area filtering ---

    #[test]
    fn area_filter_drops_small_blobs() {
        let mut mask = filled_square(2, 2, 10, 30, 20);
        mask.put_pixel(25, 5, image::Luma([255]));
        mask.put_pixel(25, 6, image::Luma([255]));
        mask.put_pixel(26, 5, image::Luma([255]));
        mask.put_pixel(26, 6, image::Luma([255]));
        let options = ContourOptions {
            method: ContourMethod::Moore,
            min_area: 20.0,
            simplify: false,
            ..ContourOptions::default()
        };
        let contours = trace_contours(&mask, &options).unwrap();
        assert_eq!(contours.len(), 1, "the 2x2 blob should be filtered out");
    }

    #[test]
    fn simplification_reduces_straight_boundaries() {
        let mask = filled_square(4, 4, 10, 20, 20);
        let unsimplified = trace_contours(
            &mask,
            &ContourOptions {
                method: ContourMethod::Moore,
                simplify: false,
                ..ContourOptions::default()
            },
        )
        .unwrap();
        let simplified = trace_contours(
            &mask,
            &ContourOptions {
                method: ContourMethod::Moore,
                simplify: true,
                tolerance: 1.0,
                ..ContourOptions::default()
            },
        )
        .unwrap();
        assert!(simplified[0].len() < unsimplified[0].len());
    }
}
