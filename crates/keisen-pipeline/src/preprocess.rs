//! Preprocessing: inversion, grayscale reduction, Gaussian blur, and
//! median filtering.
//!
//! The Gaussian blur is implemented as a **separable** 1-D convolution
//! through an `f32` scratch buffer. The same kernel builder feeds the
//! Canny detector and polyline Gaussian smoothing, so all three share
//! one set of numerics.

use image::GrayImage;

use crate::types::RgbaImage;

/// Invert every color channel (`x → 255 − x`), preserving alpha.
///
/// Applied before any other stage for light-on-dark drawings so the
/// rest of the pipeline can assume dark line material.
#[must_use = "returns the inverted image"]
pub fn invert(image: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y).0;
        image::Rgba([255 - p[0], 255 - p[1], 255 - p[2], p[3]])
    })
}

/// Luminance of an RGB triple using the Rec. 601 weights
/// `0.299 R + 0.587 G + 0.114 B`, rounded to the nearest integer.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.114f32.mul_add(
        f32::from(b),
        0.299f32.mul_add(f32::from(r), 0.587 * f32::from(g)),
    );
    y.round().min(255.0) as u8
}

/// Reduce an RGBA image to single-channel luminance.
#[must_use = "returns the grayscale image"]
pub fn grayscale(image: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get_pixel(x, y).0;
        image::Luma([luminance(p[0], p[1], p[2])])
    })
}

/// Build a normalized 1-D Gaussian kernel with half-width `⌈3σ⌉`.
///
/// The returned vector has `2·⌈3σ⌉ + 1` entries summing to 1.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let half = (3.0 * sigma).ceil().max(1.0) as usize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * half)
        .map(|i| {
            let d = i as f32 - half as f32;
            (-d * d / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Apply separable Gaussian blur to a grayscale image.
///
/// Runs a horizontal pass into an `f32` scratch buffer, then a
/// vertical pass back to 8-bit, with clamped boundary handling.
/// Non-positive sigma returns the image unchanged.
#[must_use = "returns the blurred image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }

    let (w, h) = (image.width() as usize, image.height() as usize);
    if w == 0 || h == 0 {
        return image.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let half = kernel.len() / 2;
    let src = image.as_raw();

    // Horizontal pass.
    let mut scratch = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let sx = clamp_index(x as isize + k as isize - half as isize, w);
                acc += weight * f32::from(src[y * w + sx]);
            }
            scratch[y * w + x] = acc;
        }
    }

    // Vertical pass.
    let mut dst = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let sy = clamp_index(y as isize + k as isize - half as isize, h);
                acc += weight * scratch[sy * w + x];
            }
            dst[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    GrayImage::from_raw(image.width(), image.height(), dst)
        .unwrap_or_else(|| image.clone())
}

/// Clamp a possibly out-of-range index into `[0, len)`.
#[allow(clippy::cast_sign_loss)]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Apply a 3×3 median filter to each channel of an RGBA image.
///
/// Each output channel is the sorted middle of the 9-sample window;
/// border samples clamp to the image edge. Removes salt-and-pepper
/// noise without blurring line edges the way a Gaussian would.
#[must_use = "returns the filtered image"]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn median_filter(image: &RgbaImage) -> RgbaImage {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return image.clone();
    }
    RgbaImage::from_fn(w, h, |x, y| {
        let mut windows = [[0u8; 9]; 4];
        let mut n = 0;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let sx = (i64::from(x) + dx).clamp(0, i64::from(w) - 1) as u32;
                let sy = (i64::from(y) + dy).clamp(0, i64::from(h) - 1) as u32;
                let p = image.get_pixel(sx, sy).0;
                for c in 0..4 {
                    windows[c][n] = p[c];
                }
                n += 1;
            }
        }
        let mut out = [0u8; 4];
        for c in 0..4 {
            windows[c].sort_unstable();
            out[c] = windows[c][4];
        }
        image::Rgba(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(r: u8, g: u8, b: u8) -> RgbaImage {
        RgbaImage::from_fn(8, 8, |_, _| image::Rgba([r, g, b, 255]))
    }

    // --- invert ---

    #[test]
    fn invert_flips_channels_and_keeps_alpha() {
        let img = RgbaImage::from_fn(2, 2, |_, _| image::Rgba([10, 20, 30, 128]));
        let inv = invert(&img);
        assert_eq!(inv.get_pixel(0, 0).0, [245, 235, 225, 128]);
    }

    #[test]
    fn double_invert_is_identity() {
        let img = RgbaImage::from_fn(4, 4, |x, y| {
            image::Rgba([x as u8 * 17, y as u8 * 31, 200, 255])
        });
        assert_eq!(invert(&invert(&img)), img);
    }

    // --- grayscale ---

    #[test]
    fn pure_gray_round_trips() {
        // luminance(v, v, v) == v for any gray value.
        for v in [0u8, 1, 64, 127, 128, 200, 254, 255] {
            assert_eq!(luminance(v, v, v), v, "gray level {v}");
        }
    }

    #[test]
    fn luminance_weights_order_channels() {
        let r = luminance(255, 0, 0);
        let g = luminance(0, 255, 0);
        let b = luminance(0, 0, 255);
        assert!(g > r && r > b, "expected G > R > B, got {r}/{g}/{b}");
    }

    #[test]
    fn grayscale_dimensions_match() {
        let gray = grayscale(&solid(100, 150, 200));
        assert_eq!((gray.width(), gray.height()), (8, 8));
    }

    // --- gaussian kernel / blur ---

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let kernel = gaussian_kernel(1.4);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(kernel.len(), 2 * 5 + 1, "half-width should be ceil(3*1.4)");
        for i in 0..kernel.len() / 2 {
            assert!((kernel[i] - kernel[kernel.len() - 1 - i]).abs() < 1e-7);
        }
    }

    #[test]
    fn zero_sigma_returns_identical_image() {
        let img = GrayImage::from_fn(10, 10, |x, _| image::Luma([if x < 5 { 0 } else { 255 }]));
        assert_eq!(gaussian_blur(&img, 0.0), img);
    }

    #[test]
    fn blur_preserves_total_mass() {
        // Sum of output values equals sum of input values to within
        // per-pixel rounding error. Content stays clear of the clamped
        // border so no mass leaks off the image.
        let img = GrayImage::from_fn(24, 24, |x, y| {
            let interior = (7..17).contains(&x) && (7..17).contains(&y);
            image::Luma([if interior { ((x * 13 + y * 7) % 256) as u8 } else { 0 }])
        });
        let blurred = gaussian_blur(&img, 1.4);
        let before: i64 = img.as_raw().iter().map(|&v| i64::from(v)).sum();
        let after: i64 = blurred.as_raw().iter().map(|&v| i64::from(v)).sum();
        let budget = (24 * 24) / 2;
        assert!(
            (before - after).abs() <= budget,
            "mass drifted by {} (budget {budget})",
            (before - after).abs(),
        );
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let img = GrayImage::from_fn(10, 10, |x, _| image::Luma([if x < 5 { 0 } else { 255 }]));
        let blurred = gaussian_blur(&img, 2.0);
        assert!(blurred.get_pixel(4, 5).0[0] > 0);
        assert!(blurred.get_pixel(5, 5).0[0] < 255);
    }

    #[test]
    fn uniform_image_unchanged_by_blur() {
        let img = GrayImage::from_fn(10, 10, |_, _| image::Luma([128]));
        let blurred = gaussian_blur(&img, 1.4);
        for p in blurred.pixels() {
            let diff = i16::from(p.0[0]) - 128;
            assert!(diff.abs() <= 1, "expected ~128, got {}", p.0[0]);
        }
    }

    // --- median filter ---

    #[test]
    fn median_removes_isolated_salt_pixel() {
        let mut img = solid(0, 0, 0);
        img.put_pixel(4, 4, image::Rgba([255, 255, 255, 255]));
        let filtered = median_filter(&img);
        assert_eq!(filtered.get_pixel(4, 4).0, [0, 0, 0, 255]);
    }

    #[test]
    fn median_preserves_solid_regions() {
        let img = solid(40, 80, 120);
        assert_eq!(median_filter(&img), img);
    }

    #[test]
    fn median_keeps_straight_line_intact() {
        // A 1-px horizontal line is 3 of the 9 samples above/below it
        // but 3 of 9 on the line itself — the median keeps background
        // there, which is why noise reduction pairs with thicker
        // drawing strokes.
        let mut img = solid(255, 255, 255);
        for x in 0..8 {
            img.put_pixel(x, 3, image::Rgba([0, 0, 0, 255]));
            img.put_pixel(x, 4, image::Rgba([0, 0, 0, 255]));
        }
        let filtered = median_filter(&img);
        // The two-row stroke survives: its pixels see >= 5 dark samples.
        assert_eq!(filtered.get_pixel(3, 3).0[0], 0);
        assert_eq!(filtered.get_pixel(3, 4).0[0], 0);
    }
}
