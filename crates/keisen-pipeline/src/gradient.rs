//! First-derivative operators: Sobel, Prewitt, Roberts, and Laplacian.
//!
//! Each operator produces a [`GradientField`] holding per-pixel
//! magnitude and direction planes. The Canny detector consumes the
//! Sobel field; the plain operator methods threshold the magnitude
//! plane directly.

use image::GrayImage;

/// Per-pixel gradient magnitude and direction.
///
/// Both planes index as `y * width + x`. Direction is in radians from
/// `atan2(gy, gx)`; operators without a meaningful direction
/// (Laplacian) store zeros there.
#[derive(Debug, Clone)]
pub struct GradientField {
    width: u32,
    height: u32,
    magnitude: Vec<f32>,
    direction: Vec<f32>,
}

impl GradientField {
    /// Grid width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Gradient magnitude at `(x, y)`; zero out of range.
    #[must_use]
    pub fn magnitude(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.magnitude[(y * self.width + x) as usize]
    }

    /// Gradient direction in radians at `(x, y)`; zero out of range.
    #[must_use]
    pub fn direction(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.direction[(y * self.width + x) as usize]
    }

    /// Largest magnitude in the field.
    #[must_use]
    pub fn max_magnitude(&self) -> f32 {
        self.magnitude.iter().copied().fold(0.0, f32::max)
    }
}

/// Sample a grayscale pixel with clamped coordinates.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample(image: &GrayImage, x: i64, y: i64) -> f32 {
    let sx = x.clamp(0, i64::from(image.width()) - 1);
    let sy = y.clamp(0, i64::from(image.height()) - 1);
    f32::from(image.get_pixel(sx as u32, sy as u32).0[0])
}

/// Convolve a pair of 3×3 kernels and derive magnitude + direction.
fn convolve_pair(image: &GrayImage, kx: [[f32; 3]; 3], ky: [[f32; 3]; 3]) -> GradientField {
    let (w, h) = (image.width(), image.height());
    let len = (w as usize) * (h as usize);
    let mut magnitude = vec![0.0f32; len];
    let mut direction = vec![0.0f32; len];

    for y in 0..h {
        for x in 0..w {
            let mut gx = 0.0f32;
            let mut gy = 0.0f32;
            for (j, (rx, ry)) in kx.iter().zip(&ky).enumerate() {
                for (i, (&cx, &cy)) in rx.iter().zip(ry).enumerate() {
                    let v = sample(image, i64::from(x) + i as i64 - 1, i64::from(y) + j as i64 - 1);
                    gx = cx.mul_add(v, gx);
                    gy = cy.mul_add(v, gy);
                }
            }
            let idx = (y * w + x) as usize;
            magnitude[idx] = gx.hypot(gy);
            direction[idx] = gy.atan2(gx);
        }
    }

    GradientField {
        width: w,
        height: h,
        magnitude,
        direction,
    }
}

/// Sobel operator: `Gx = [[-1,0,1],[-2,0,2],[-1,0,1]]`, `Gy = Gxᵀ`.
#[must_use = "returns the gradient field"]
pub fn sobel(image: &GrayImage) -> GradientField {
    convolve_pair(
        image,
        [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]],
        [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]],
    )
}

/// Prewitt operator: like Sobel without the center-row weighting.
#[must_use = "returns the gradient field"]
pub fn prewitt(image: &GrayImage) -> GradientField {
    convolve_pair(
        image,
        [[-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0], [-1.0, 0.0, 1.0]],
        [[-1.0, -1.0, -1.0], [0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
    )
}

/// Roberts cross operator over 2×2 diagonal differences.
#[must_use = "returns the gradient field"]
pub fn roberts(image: &GrayImage) -> GradientField {
    let (w, h) = (image.width(), image.height());
    let len = (w as usize) * (h as usize);
    let mut magnitude = vec![0.0f32; len];
    let mut direction = vec![0.0f32; len];

    for y in 0..h {
        for x in 0..w {
            let p = sample(image, i64::from(x), i64::from(y));
            let right = sample(image, i64::from(x) + 1, i64::from(y));
            let below = sample(image, i64::from(x), i64::from(y) + 1);
            let diag = sample(image, i64::from(x) + 1, i64::from(y) + 1);
            let gx = p - diag;
            let gy = right - below;
            let idx = (y * w + x) as usize;
            magnitude[idx] = gx.hypot(gy);
            direction[idx] = gy.atan2(gx);
        }
    }

    GradientField {
        width: w,
        height: h,
        magnitude,
        direction,
    }
}

/// Laplacian operator (4-connected second derivative).
///
/// The direction plane is all zeros; only the response magnitude is
/// meaningful.
#[must_use = "returns the gradient field"]
pub fn laplacian(image: &GrayImage) -> GradientField {
    let (w, h) = (image.width(), image.height());
    let len = (w as usize) * (h as usize);
    let mut magnitude = vec![0.0f32; len];

    for y in 0..h {
        for x in 0..w {
            let center = sample(image, i64::from(x), i64::from(y));
            let response = sample(image, i64::from(x) - 1, i64::from(y))
                + sample(image, i64::from(x) + 1, i64::from(y))
                + sample(image, i64::from(x), i64::from(y) - 1)
                + sample(image, i64::from(x), i64::from(y) + 1)
                - 4.0 * center;
            magnitude[(y * w + x) as usize] = response.abs();
        }
    }

    GradientField {
        width: w,
        height: h,
        magnitude,
        direction: vec![0.0f32; len],
    }
}

/// Threshold a gradient field into a binary mask (`magnitude ≥
/// threshold` → 255).
#[must_use = "returns the binary mask"]
pub fn threshold_magnitude(field: &GradientField, threshold: f32) -> GrayImage {
    GrayImage::from_fn(field.width(), field.height(), |x, y| {
        image::Luma([if field.magnitude(x, y) >= threshold {
            255
        } else {
            0
        }])
    })
}
