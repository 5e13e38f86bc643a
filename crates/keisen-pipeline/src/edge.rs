//! Binary/edge extraction: Canny detection, gradient thresholding, and
//! morphological gap closing.
//!
//! [`extract_mask`] dispatches on [`EdgeMethod`] and always returns a
//! strict binary mask (0 or 255) whose set pixels are line material.

use image::GrayImage;
use imageproc::distance_transform::Norm;

use crate::gradient::{self, GradientField};
use crate::types::{EdgeMethod, EdgeOptions};
use crate::{preprocess, skeleton};

/// Minimum allowed Canny threshold.
///
/// A low threshold of zero treats every pixel with any gradient as a
/// potential edge, producing a degenerate mask that overwhelms contour
/// tracing and refinement.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Marker value for pixels between the two Canny thresholds.
const WEAK: u8 = 50;
/// Marker value for definite edge pixels.
const STRONG: u8 = 255;

/// Detect edges with the Canny algorithm.
///
/// Steps: Gaussian blur at `sigma`, Sobel gradients, four-sector
/// non-maximum suppression, dual threshold (STRONG/WEAK), and
/// hysteresis that promotes weak pixels 8-adjacent to strong ones
/// until stable.
///
/// Both thresholds are clamped to at least [`MIN_THRESHOLD`], and the
/// low threshold to at most the high one.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, sigma: f32, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);

    let blurred = preprocess::gaussian_blur(image, sigma);
    let field = gradient::sobel(&blurred);
    let thinned = non_maximum_suppression(&field);
    let marked = dual_threshold(&field, &thinned, low, high);
    hysteresis(marked)
}

/// Keep only local maxima along the quantized gradient direction.
///
/// The direction is quantized into four sectors (horizontal,
/// /-diagonal, vertical, \-diagonal); a magnitude survives when it is
/// at least as large as both neighbors along its sector. Border pixels
/// are suppressed.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn non_maximum_suppression(field: &GradientField) -> Vec<f32> {
    let (w, h) = (field.width(), field.height());
    let mut out = vec![0.0f32; (w as usize) * (h as usize)];
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut angle = field.direction(x, y).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            // Neighbor pair along the gradient direction.
            let (a, b) = if !(22.5..157.5).contains(&angle) {
                (field.magnitude(x - 1, y), field.magnitude(x + 1, y))
            } else if angle < 67.5 {
                (field.magnitude(x + 1, y + 1), field.magnitude(x - 1, y - 1))
            } else if angle < 112.5 {
                (field.magnitude(x, y - 1), field.magnitude(x, y + 1))
            } else {
                (field.magnitude(x - 1, y + 1), field.magnitude(x + 1, y - 1))
            };

            let m = field.magnitude(x, y);
            if m >= a && m >= b {
                out[(y * w + x) as usize] = m;
            }
        }
    }
    out
}

/// Map suppressed magnitudes onto the STRONG/WEAK/0 marker grid.
fn dual_threshold(field: &GradientField, thinned: &[f32], low: f32, high: f32) -> GrayImage {
    let (w, h) = (field.width(), field.height());
    let marked: Vec<u8> = thinned
        .iter()
        .map(|&m| {
            if m >= high {
                STRONG
            } else if m >= low {
                WEAK
            } else {
                0
            }
        })
        .collect();
    GrayImage::from_raw(w, h, marked).unwrap_or_else(|| GrayImage::new(w, h))
}

/// Promote WEAK pixels 8-adjacent to a STRONG pixel until stable, then
/// demote the remaining WEAK pixels to background.
fn hysteresis(mut marked: GrayImage) -> GrayImage {
    let (w, h) = (marked.width(), marked.height());
    let mut changed = true;
    while changed {
        changed = false;
        for y in 0..h {
            for x in 0..w {
                if marked.get_pixel(x, y).0[0] != WEAK {
                    continue;
                }
                if has_strong_neighbor(&marked, x, y) {
                    marked.put_pixel(x, y, image::Luma([STRONG]));
                    changed = true;
                }
            }
        }
    }
    for p in marked.pixels_mut() {
        if p.0[0] == WEAK {
            p.0[0] = 0;
        }
    }
    marked
}

/// Whether any 8-neighbor of `(x, y)` is STRONG.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn has_strong_neighbor(marked: &GrayImage, x: u32, y: u32) -> bool {
    let (w, h) = (i64::from(marked.width()), i64::from(marked.height()));
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let nx = i64::from(x) + dx;
            let ny = i64::from(y) + dy;
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                continue;
            }
            if marked.get_pixel(nx as u32, ny as u32).0[0] == STRONG {
                return true;
            }
        }
    }
    false
}

/// Morphological close: dilate then erode with 8-connectivity.
///
/// Bridges gaps up to `2 * iterations` pixels wide. Zero iterations
/// returns the mask unchanged.
#[must_use = "returns the closed mask"]
#[allow(clippy::cast_possible_truncation)]
pub fn close_gaps(mask: &GrayImage, iterations: u32) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    let k = iterations.min(u32::from(u8::MAX)) as u8;
    let dilated = imageproc::morphology::dilate(mask, Norm::LInf, k);
    imageproc::morphology::erode(&dilated, Norm::LInf, k)
}

/// Extract the binary line mask from a preprocessed grayscale image
/// using the configured method, then optionally close small gaps.
#[must_use = "returns the binary mask"]
pub fn extract_mask(gray: &GrayImage, options: &EdgeOptions) -> GrayImage {
    let mask = match options.method {
        // No pre-blur here: smoothing a one-pixel stroke lifts it above
        // the foreground threshold and the line vanishes. Noise is
        // handled by the median filter upstream.
        EdgeMethod::Skeleton => skeleton::skeletonize(gray),
        EdgeMethod::Canny => canny(
            gray,
            options.gaussian_sigma,
            options.low_threshold,
            options.high_threshold,
        ),
        EdgeMethod::Sobel | EdgeMethod::Prewitt | EdgeMethod::Roberts | EdgeMethod::Laplacian => {
            let blurred = preprocess::gaussian_blur(gray, options.gaussian_sigma);
            let field = match options.method {
                EdgeMethod::Sobel => gradient::sobel(&blurred),
                EdgeMethod::Prewitt => gradient::prewitt(&blurred),
                EdgeMethod::Roberts => gradient::roberts(&blurred),
                _ => gradient::laplacian(&blurred),
            };
            gradient::threshold_magnitude(&field, options.high_threshold)
        }
    };
    close_gaps(&mask, options.close_iterations)
}
