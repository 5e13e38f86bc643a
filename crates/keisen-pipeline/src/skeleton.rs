//! Centerline extraction: foreground thresholding and Zhang–Suen
//! thinning.
//!
//! Dark pixels (luminance < 128) are the line material. Thinning peels
//! boundary pixels in two alternating sub-iterations until nothing
//! changes, leaving a one-pixel-wide skeleton. The algorithm is
//! idempotent: running it on an already-thinned mask returns the mask
//! unchanged.

use image::GrayImage;

/// Luminance cutoff separating line material from background.
pub const FOREGROUND_THRESHOLD: u8 = 128;

/// Threshold a grayscale image and thin the foreground to its
/// skeleton.
///
/// Returns a binary mask valued 0 or 255.
#[must_use = "returns the skeleton mask"]
pub fn skeletonize(image: &GrayImage) -> GrayImage {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut grid: Vec<u8> = image
        .as_raw()
        .iter()
        .map(|&v| u8::from(v < FOREGROUND_THRESHOLD))
        .collect();

    thin(&mut grid, w, h);

    let raw: Vec<u8> = grid.into_iter().map(|v| v * 255).collect();
    GrayImage::from_raw(image.width(), image.height(), raw)
        .unwrap_or_else(|| GrayImage::new(image.width(), image.height()))
}

/// Thin an already-binary mask (set = 255) without re-thresholding.
///
/// Used by tests and by callers that built the mask elsewhere.
#[must_use = "returns the thinned mask"]
pub fn thin_mask(mask: &GrayImage) -> GrayImage {
    let (w, h) = (mask.width() as usize, mask.height() as usize);
    let mut grid: Vec<u8> = mask.as_raw().iter().map(|&v| u8::from(v > 0)).collect();
    thin(&mut grid, w, h);
    let raw: Vec<u8> = grid.into_iter().map(|v| v * 255).collect();
    GrayImage::from_raw(mask.width(), mask.height(), raw)
        .unwrap_or_else(|| GrayImage::new(mask.width(), mask.height()))
}

/// Zhang–Suen thinning over a 0/1 grid, in place.
fn thin(grid: &mut [u8], w: usize, h: usize) {
    if w < 3 || h < 3 {
        return;
    }
    let mut marks: Vec<usize> = Vec::new();
    loop {
        let mut changed = false;
        for pass in 0..2 {
            for y in 1..h - 1 {
                for x in 1..w - 1 {
                    let idx = y * w + x;
                    if grid[idx] == 0 {
                        continue;
                    }
                    if removable(grid, w, idx, pass == 1) {
                        marks.push(idx);
                    }
                }
            }
            if !marks.is_empty() {
                changed = true;
            }
            // Delete all marks simultaneously after the sub-iteration.
            for idx in marks.drain(..) {
                grid[idx] = 0;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Zhang–Suen deletion condition for one pixel.
///
/// Neighbors P2..P9 run clockwise from north. A is the number of 0→1
/// transitions around the cycle, B the neighbor sum. The two
/// sub-iterations differ only in which neighbor products must vanish.
fn removable(grid: &[u8], w: usize, idx: usize, second_pass: bool) -> bool {
    let p2 = grid[idx - w];
    let p3 = grid[idx - w + 1];
    let p4 = grid[idx + 1];
    let p5 = grid[idx + w + 1];
    let p6 = grid[idx + w];
    let p7 = grid[idx + w - 1];
    let p8 = grid[idx - 1];
    let p9 = grid[idx - w - 1];

    let neighbors = [p2, p3, p4, p5, p6, p7, p8, p9];
    let b: u8 = neighbors.iter().sum();
    if !(2..=6).contains(&b) {
        return false;
    }

    let mut a = 0;
    for i in 0..8 {
        if neighbors[i] == 0 && neighbors[(i + 1) % 8] == 1 {
            a += 1;
        }
    }
    if a != 1 {
        return false;
    }

    if second_pass {
        p2 * p4 * p8 == 0 && p2 * p6 * p8 == 0
    } else {
        p2 * p4 * p6 == 0 && p4 * p6 * p8 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_count(mask: &GrayImage) -> u32 {
        mask.pixels().map(|p| u32::from(p.0[0] > 0)).sum()
    }

    #[test]
    fn blank_image_stays_blank() {
        let white = GrayImage::from_fn(10, 10, |_, _| image::Luma([255]));
        assert_eq!(set_count(&skeletonize(&white)), 0);
    }

    #[test]
    fn output_is_strict_binary() {
        let img = GrayImage::from_fn(20, 20, |_, y| {
            image::Luma([if (8..=12).contains(&y) { 0 } else { 255 }])
        });
        for p in skeletonize(&img).pixels() {
            assert!(p.0[0] == 0 || p.0[0] == 255);
        }
    }

    #[test]
    fn thick_horizontal_bar_thins_to_single_row() {
        // A 5-px-thick dark bar reduces to one pixel per interior
        // column; a few columns near the stroke ends may carry spur
        // artifacts, so only the middle is checked exactly.
        let img = GrayImage::from_fn(30, 20, |x, y| {
            let dark = (8..=12).contains(&y) && (2..28).contains(&x);
            image::Luma([if dark { 0 } else { 255 }])
        });
        let mask = skeletonize(&img);
        for x in 8..22 {
            let column: u32 = (0..20).map(|y| u32::from(mask.get_pixel(x, y).0[0] > 0)).sum();
            assert_eq!(column, 1, "column x={x}");
        }
    }

    #[test]
    fn skeleton_stays_within_original_stroke() {
        let img = GrayImage::from_fn(30, 20, |x, y| {
            let dark = (8..=12).contains(&y) && (2..28).contains(&x);
            image::Luma([if dark { 0 } else { 255 }])
        });
        let mask = skeletonize(&img);
        for (x, y, p) in mask.enumerate_pixels() {
            if p.0[0] > 0 {
                assert!(
                    (8..=12).contains(&y) && (2..28).contains(&x),
                    "skeleton pixel ({x},{y}) escaped the stroke",
                );
            }
        }
    }

    #[test]
    fn thinning_is_idempotent() {
        let img = GrayImage::from_fn(30, 30, |x, y| {
            let on_square = (x == 5 || x == 24 || y == 5 || y == 24)
                && (5..=24).contains(&x)
                && (5..=24).contains(&y);
            image::Luma([if on_square { 0 } else { 255 }])
        });
        let once = skeletonize(&img);
        let twice = thin_mask(&once);
        assert_eq!(once, twice, "thinning a thinned mask must not change it");
    }

    #[test]
    fn single_pixel_line_is_preserved() {
        let img = GrayImage::from_fn(20, 9, |x, y| {
            image::Luma([if y == 4 && (2..18).contains(&x) { 0 } else { 255 }])
        });
        let mask = skeletonize(&img);
        // The line is already thin; every pixel must survive.
        assert_eq!(set_count(&mask), 16);
    }
}
