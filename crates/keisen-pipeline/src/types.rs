//! Shared types for the keisen vectorization pipeline.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// source image without depending on `image` directly.
pub use image::RgbaImage;

use crate::refine::RefinementReport;

/// A 2D point in image coordinates.
///
/// Coordinates are floating point: contour tracers emit integer pixel
/// positions, but smoothing and marching squares produce sub-pixel
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// An RGBA color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (255 = opaque).
    pub a: u8,
}

impl Color {
    /// Opaque black — the fallback line color.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create an opaque color from RGB channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color from all four channels.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Squared Euclidean distance in RGB space (alpha ignored).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        #[allow(clippy::cast_sign_loss)]
        {
            (dr * dr + dg * dg + db * db) as u32
        }
    }

    /// Euclidean distance in RGB space (alpha ignored).
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        f64::from(self.distance_squared(other)).sqrt()
    }

    /// Format as a `#rrggbb` hex string (alpha dropped).
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Luminance using the Rec. 601 weights shared with grayscale
    /// conversion.
    #[must_use]
    pub fn luminance(self) -> u8 {
        crate::preprocess::luminance(self.r, self.g, self.b)
    }
}

/// An ordered point sequence produced by a contour tracer.
///
/// `closed` marks the first and last points as adjacent; `hole` marks
/// inner (child) boundaries found by hierarchy-aware tracing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    /// The traced points, in walk order.
    pub points: Vec<Point>,
    /// Whether the first and last points are considered joined.
    pub closed: bool,
    /// Whether this contour bounds a hole inside another contour.
    pub hole: bool,
}

impl Contour {
    /// Create an open or closed contour.
    #[must_use]
    pub const fn new(points: Vec<Point>, closed: bool) -> Self {
        Self {
            points,
            closed,
            hole: false,
        }
    }

    /// Number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Absolute enclosed area via the shoelace formula.
    ///
    /// Open polylines are treated as if closed by the chord between
    /// their endpoints, so thin chains report near-zero area.
    #[must_use]
    pub fn area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..self.points.len() {
            let a = self.points[i];
            let b = self.points[(i + 1) % self.points.len()];
            sum += a.x.mul_add(b.y, -(b.x * a.y));
        }
        sum.abs() / 2.0
    }

    /// Total length of all segments, including the closing segment for
    /// closed contours.
    #[must_use]
    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let mut sum: f64 = self
            .points
            .windows(2)
            .map(|w| w[0].distance(w[1]))
            .sum();
        if self.closed {
            // windows() stops at the last pair; close the loop.
            if let (Some(&first), Some(&last)) = (self.points.first(), self.points.last()) {
                sum += last.distance(first);
            }
        }
        sum
    }

    /// Axis-aligned bounding box as `(min_x, min_y, max_x, max_y)`.
    ///
    /// Empty contours return inverted infinities (min > max).
    #[must_use]
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        (min_x, min_y, max_x, max_y)
    }
}

/// A polyline carrying style information through coloring, refinement,
/// and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// The polyline points.
    pub points: Vec<Point>,
    /// Whether the path closes back to its first point.
    pub closed: bool,
    /// Assigned palette color.
    pub color: Color,
    /// Stroke width in pixels.
    pub stroke_width: f64,
}

impl Path {
    /// Build a path from a traced contour, attaching style.
    #[must_use]
    pub fn from_contour(contour: Contour, color: Color, stroke_width: f64) -> Self {
        Self {
            points: contour.points,
            closed: contour.closed,
            color,
            stroke_width,
        }
    }

    /// Number of points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the path has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A group of paths sharing a color bucket, emitted as one document
/// group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Stable element id (`layer-0`, `layer-1`, …).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Representative color of the bucket.
    pub color: Color,
    /// Whether the layer is rendered.
    pub visible: bool,
    /// Whether the layer is locked against editing in a host UI.
    pub locked: bool,
    /// Paths assigned to this layer, in insertion order.
    pub paths: Vec<Path>,
}

/// One entry of the color-group histogram in a conversion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorGroup {
    /// Palette color.
    pub color: Color,
    /// Number of paths assigned this color.
    pub path_count: usize,
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Selects which binary/edge extraction algorithm produces the line
/// mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EdgeMethod {
    /// Threshold the dark foreground, then Zhang–Suen thinning.
    /// Produces one-pixel-wide centerlines; the default for line art.
    #[default]
    Skeleton,
    /// Canny edge detection (blur, Sobel, non-maximum suppression,
    /// hysteresis).
    Canny,
    /// Sobel gradient magnitude thresholded at `high_threshold`.
    Sobel,
    /// Prewitt gradient magnitude thresholded at `high_threshold`.
    Prewitt,
    /// Roberts cross gradient magnitude thresholded at
    /// `high_threshold`.
    Roberts,
    /// Laplacian response magnitude thresholded at `high_threshold`.
    Laplacian,
}

impl FromStr for EdgeMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skeleton" => Ok(Self::Skeleton),
            "canny" => Ok(Self::Canny),
            "sobel" => Ok(Self::Sobel),
            "prewitt" => Ok(Self::Prewitt),
            "roberts" => Ok(Self::Roberts),
            "laplacian" => Ok(Self::Laplacian),
            other => Err(PipelineError::UnknownMethod(other.to_owned())),
        }
    }
}

impl fmt::Display for EdgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Skeleton => "skeleton",
            Self::Canny => "canny",
            Self::Sobel => "sobel",
            Self::Prewitt => "prewitt",
            Self::Roberts => "roberts",
            Self::Laplacian => "laplacian",
        })
    }
}

/// Selects which contour tracing algorithm walks the binary mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourMethod {
    /// Walk along thinned lines, emitting open polylines. Pairs with
    /// [`EdgeMethod::Skeleton`]; the default.
    #[default]
    EdgeChain,
    /// Moore boundary tracing: closed loops around each blob.
    Moore,
    /// Suzuki–Abe border following with outer/hole hierarchy.
    Suzuki,
    /// Marching squares: closed loops with sub-pixel coordinates.
    MarchingSquares,
}

impl FromStr for ContourMethod {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "edge-chain" => Ok(Self::EdgeChain),
            "moore" => Ok(Self::Moore),
            "suzuki" => Ok(Self::Suzuki),
            "marching-squares" => Ok(Self::MarchingSquares),
            other => Err(PipelineError::UnknownMethod(other.to_owned())),
        }
    }
}

impl fmt::Display for ContourMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::EdgeChain => "edge-chain",
            Self::Moore => "moore",
            Self::Suzuki => "suzuki",
            Self::MarchingSquares => "marching-squares",
        })
    }
}

/// Binary/edge extraction options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeOptions {
    /// Extraction algorithm.
    pub method: EdgeMethod,
    /// Canny low threshold, in gradient-magnitude units ([0, 255]).
    pub low_threshold: f32,
    /// Canny high threshold; also the cutoff for the plain gradient
    /// operators ([0, 255]).
    pub high_threshold: f32,
    /// Gaussian blur sigma applied before gradient computation.
    /// Zero disables the blur.
    pub gaussian_sigma: f32,
    /// Apply a 3×3 median filter before grayscale conversion to
    /// suppress salt-and-pepper noise.
    pub noise_reduction: bool,
    /// Morphological close iterations applied to the extracted mask
    /// (dilate then erode, 8-connectivity). Zero disables; one
    /// iteration bridges single-pixel gaps.
    #[serde(default)]
    pub close_iterations: u32,
}

impl Default for EdgeOptions {
    fn default() -> Self {
        Self {
            method: EdgeMethod::default(),
            low_threshold: ConvertOptions::DEFAULT_LOW_THRESHOLD,
            high_threshold: ConvertOptions::DEFAULT_HIGH_THRESHOLD,
            gaussian_sigma: ConvertOptions::DEFAULT_GAUSSIAN_SIGMA,
            noise_reduction: false,
            close_iterations: 0,
        }
    }
}

/// Contour tracing options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContourOptions {
    /// Tracing algorithm.
    pub method: ContourMethod,
    /// Minimum enclosed area for a contour to survive filtering.
    pub min_area: f64,
    /// Maximum enclosed area for a contour to survive filtering.
    pub max_area: f64,
    /// Whether to run Douglas–Peucker simplification after tracing.
    pub simplify: bool,
    /// Simplification tolerance in pixels (or percent of the bounding
    /// box diagonal when `relative_tolerance` is set).
    pub tolerance: f64,
    /// Interpret `tolerance` as a percentage of each contour's
    /// bounding-box diagonal.
    #[serde(default)]
    pub relative_tolerance: bool,
}

impl Default for ContourOptions {
    fn default() -> Self {
        Self {
            method: ContourMethod::default(),
            min_area: 0.0,
            // f64::MAX rather than INFINITY so the options record stays
            // JSON-serializable.
            max_area: f64::MAX,
            simplify: true,
            tolerance: ConvertOptions::DEFAULT_SIMPLIFY_TOLERANCE,
            relative_tolerance: false,
        }
    }
}

/// Vector document emission options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvgOptions {
    /// Stroke width for emitted paths, in pixels.
    pub stroke_width: f64,
    /// Decimal places for coordinates ([0, 6]); trailing zeros are
    /// stripped.
    pub precision: u8,
    /// Collapse whitespace and use H/V shorthands where a coordinate
    /// matches the previous point within 0.1 px.
    pub optimize: bool,
    /// Emit a `<metadata>` block with title/description/creator
    /// strings.
    pub metadata: bool,
    /// Emit one `<g>` per layer instead of a flat path list.
    pub layer_groups: bool,
    /// Explicit `viewBox` override as `[min-x, min-y, width, height]`.
    /// Defaults to `[0, 0, width, height]`.
    #[serde(default)]
    pub view_box: Option<[f64; 4]>,
}

impl Default for SvgOptions {
    fn default() -> Self {
        Self {
            stroke_width: ConvertOptions::DEFAULT_STROKE_WIDTH,
            precision: ConvertOptions::DEFAULT_PRECISION,
            optimize: false,
            metadata: false,
            layer_groups: true,
            view_box: None,
        }
    }
}

/// Color analysis options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorOptions {
    /// Maximum palette size.
    pub max_colors: usize,
    /// Minimum share of sampled pixels (in percent) a color bin needs
    /// to enter the palette.
    pub min_percentage: f64,
    /// Use median-cut quantization instead of histogram binning.
    pub quantize: bool,
    /// Exclude pixels near the background color from palette
    /// extraction.
    pub ignore_background: bool,
    /// Explicit background color; detected from border pixels when
    /// absent.
    #[serde(default)]
    pub background: Option<Color>,
    /// Maximum RGB distance between a path color and a layer's
    /// representative color for the path to join that layer.
    #[serde(default = "ColorOptions::default_layer_distance")]
    pub layer_distance: f64,
}

impl ColorOptions {
    const fn default_layer_distance() -> f64 {
        ConvertOptions::DEFAULT_LAYER_DISTANCE
    }
}

impl Default for ColorOptions {
    fn default() -> Self {
        Self {
            max_colors: ConvertOptions::DEFAULT_MAX_COLORS,
            min_percentage: ConvertOptions::DEFAULT_MIN_PERCENTAGE,
            quantize: false,
            ignore_background: true,
            background: None,
            layer_distance: ConvertOptions::DEFAULT_LAYER_DISTANCE,
        }
    }
}

/// Accuracy-driven refinement options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefineOptions {
    /// Whether refinement runs at all.
    pub enabled: bool,
    /// Target F1 score; the loop stops once reached.
    pub target_f1: f64,
    /// Maximum number of full refinement iterations.
    pub max_iterations: u32,
    /// Half-width of the square window searched when snapping points
    /// onto reference pixels.
    pub snap_radius: i32,
    /// Minimum 8-connected cluster size (in pixels) for gap filling to
    /// trace a new path.
    pub gap_fill_min_cluster: usize,
    /// Fraction of unmatched points above which a path is dropped as
    /// spurious.
    pub spurious_threshold: f64,
    /// Pixel radius within which rendered and reference pixels count
    /// as matching (τ).
    pub distance_tolerance: f64,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            target_f1: ConvertOptions::DEFAULT_TARGET_F1,
            max_iterations: ConvertOptions::DEFAULT_MAX_ITERATIONS,
            snap_radius: ConvertOptions::DEFAULT_SNAP_RADIUS,
            gap_fill_min_cluster: ConvertOptions::DEFAULT_GAP_FILL_MIN_CLUSTER,
            spurious_threshold: ConvertOptions::DEFAULT_SPURIOUS_THRESHOLD,
            distance_tolerance: ConvertOptions::DEFAULT_DISTANCE_TOLERANCE,
        }
    }
}

/// Configuration for one conversion.
///
/// All parameters have defaults tuned for dark line art on a light,
/// roughly uniform background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Invert every color channel (alpha preserved) before any other
    /// processing. Use for light-on-dark drawings.
    pub invert_colors: bool,
    /// Binary/edge extraction options.
    pub edges: EdgeOptions,
    /// Contour tracing options.
    pub contours: ContourOptions,
    /// Document emission options.
    pub svg: SvgOptions,
    /// Color analysis options.
    pub colors: ColorOptions,
    /// Apply Chaikin corner cutting to traced paths.
    pub smooth_curves: bool,
    /// Smoothing strength in [0, 1]; maps to Chaikin iteration count.
    pub curve_tension: f64,
    /// Group paths into color layers instead of a single flat layer.
    #[serde(default = "ConvertOptions::default_detect_layers")]
    pub detect_layers: bool,
    /// Concatenate same-color open paths whose endpoints nearly touch.
    pub merge_similar_paths: bool,
    /// Maximum endpoint gap (pixels) bridged by path merging.
    #[serde(default = "ConvertOptions::default_path_merge_threshold")]
    pub path_merge_threshold: f64,
    /// Refinement options.
    pub refine: RefineOptions,
}

impl ConvertOptions {
    /// Default Canny low threshold.
    pub const DEFAULT_LOW_THRESHOLD: f32 = 50.0;
    /// Default Canny high threshold (and gradient-operator cutoff).
    pub const DEFAULT_HIGH_THRESHOLD: f32 = 100.0;
    /// Default pre-gradient Gaussian sigma.
    pub const DEFAULT_GAUSSIAN_SIGMA: f32 = 1.4;
    /// Default Douglas–Peucker tolerance in pixels.
    pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 1.0;
    /// Default stroke width in pixels.
    pub const DEFAULT_STROKE_WIDTH: f64 = 1.0;
    /// Default coordinate precision (decimal places).
    pub const DEFAULT_PRECISION: u8 = 3;
    /// Default palette size limit.
    pub const DEFAULT_MAX_COLORS: usize = 10;
    /// Default minimum palette-bin share, in percent.
    pub const DEFAULT_MIN_PERCENTAGE: f64 = 0.1;
    /// Default layer grouping distance in RGB units.
    pub const DEFAULT_LAYER_DISTANCE: f64 = 30.0;
    /// Default refinement F1 target.
    pub const DEFAULT_TARGET_F1: f64 = 0.85;
    /// Default refinement iteration cap.
    pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
    /// Default snap search radius in pixels.
    pub const DEFAULT_SNAP_RADIUS: i32 = 3;
    /// Default minimum gap-fill cluster size in pixels.
    pub const DEFAULT_GAP_FILL_MIN_CLUSTER: usize = 20;
    /// Default spurious-path unmatched fraction.
    pub const DEFAULT_SPURIOUS_THRESHOLD: f64 = 0.7;
    /// Default match tolerance τ in pixels.
    pub const DEFAULT_DISTANCE_TOLERANCE: f64 = 2.0;
    /// Default endpoint gap for path merging.
    pub const DEFAULT_PATH_MERGE_THRESHOLD: f64 = 2.0;

    // Serde default helpers — serde's per-field `#[serde(default)]`
    // uses the type's `Default`, which is wrong for `bool` (false) and
    // `f64` (0.0) here.
    const fn default_detect_layers() -> bool {
        true
    }
    const fn default_path_merge_threshold() -> f64 {
        Self::DEFAULT_PATH_MERGE_THRESHOLD
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            invert_colors: false,
            edges: EdgeOptions::default(),
            contours: ContourOptions::default(),
            svg: SvgOptions::default(),
            colors: ColorOptions::default(),
            smooth_curves: false,
            curve_tension: 0.5,
            detect_layers: true,
            merge_similar_paths: false,
            path_merge_threshold: Self::DEFAULT_PATH_MERGE_THRESHOLD,
            refine: RefineOptions::default(),
        }
    }
}

impl ConvertOptions {
    /// Validate that all fields satisfy the documented invariants.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=255.0).contains(&self.edges.low_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "low_threshold must be in [0, 255], got {}",
                self.edges.low_threshold,
            )));
        }
        if !(0.0..=255.0).contains(&self.edges.high_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "high_threshold must be in [0, 255], got {}",
                self.edges.high_threshold,
            )));
        }
        if self.edges.low_threshold > self.edges.high_threshold {
            return Err(PipelineError::InvalidConfig(format!(
                "low_threshold ({}) must not exceed high_threshold ({})",
                self.edges.low_threshold, self.edges.high_threshold,
            )));
        }
        if self.edges.gaussian_sigma < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "gaussian_sigma must be non-negative, got {}",
                self.edges.gaussian_sigma,
            )));
        }
        if self.contours.min_area > self.contours.max_area {
            return Err(PipelineError::InvalidConfig(format!(
                "min_area ({}) must not exceed max_area ({})",
                self.contours.min_area, self.contours.max_area,
            )));
        }
        if self.contours.tolerance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "tolerance must be non-negative, got {}",
                self.contours.tolerance,
            )));
        }
        if self.svg.precision > 6 {
            return Err(PipelineError::InvalidConfig(format!(
                "precision must be in [0, 6], got {}",
                self.svg.precision,
            )));
        }
        if self.svg.stroke_width <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "stroke_width must be positive, got {}",
                self.svg.stroke_width,
            )));
        }
        if self.colors.max_colors == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_colors must be at least 1".to_owned(),
            ));
        }
        if !(0.0..=1.0).contains(&self.curve_tension) {
            return Err(PipelineError::InvalidConfig(format!(
                "curve_tension must be in [0, 1], got {}",
                self.curve_tension,
            )));
        }
        if self.path_merge_threshold < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "path_merge_threshold must be non-negative, got {}",
                self.path_merge_threshold,
            )));
        }
        if !(0.0..=1.0).contains(&self.refine.target_f1) {
            return Err(PipelineError::InvalidConfig(format!(
                "target_f1 must be in [0, 1], got {}",
                self.refine.target_f1,
            )));
        }
        if !(0.0..=1.0).contains(&self.refine.spurious_threshold) {
            return Err(PipelineError::InvalidConfig(format!(
                "spurious_threshold must be in [0, 1], got {}",
                self.refine.spurious_threshold,
            )));
        }
        if self.refine.snap_radius < 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "snap_radius must be non-negative, got {}",
                self.refine.snap_radius,
            )));
        }
        if self.refine.distance_tolerance < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "distance_tolerance must be non-negative, got {}",
                self.refine.distance_tolerance,
            )));
        }
        Ok(())
    }
}

/// Metadata describing one completed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionMetadata {
    /// Source format tag (`"png"`, `"jpeg"`, …) when the input came
    /// through the decode helper; `None` for raw pixel buffers.
    pub source_format: Option<String>,
    /// Total wall-clock conversion time.
    #[serde(with = "crate::diagnostics::duration_serde")]
    pub duration: Duration,
    /// Number of emitted paths.
    pub path_count: usize,
    /// Number of emitted layers.
    pub layer_count: usize,
}

/// Result of converting one raster image into vector paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    /// Source image dimensions; the document coordinate space.
    pub dimensions: Dimensions,
    /// All emitted paths, in trace order.
    pub paths: Vec<Path>,
    /// Paths grouped into color layers (insertion order of first
    /// occurrence). Empty when there are no paths.
    pub layers: Vec<Layer>,
    /// Histogram of paths per palette color.
    pub color_groups: Vec<ColorGroup>,
    /// Timing and count metadata.
    pub metadata: ConversionMetadata,
    /// Refinement before/after scores, when refinement ran.
    pub refinement: Option<RefinementReport>,
}

/// Errors that can occur during conversion.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The pixel buffer does not describe a usable image: zero
    /// dimensions or a byte length other than `4·width·height`.
    #[error("invalid input image: {0}")]
    InvalidImage(String),

    /// Raw file bytes could not be decoded into a pixel buffer.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// A method selector was outside the enumerated set.
    #[error("unknown method selector: {0:?}")]
    UnknownMethod(String),

    /// Conversion options violate a documented invariant.
    #[error("invalid conversion options: {0}")]
    InvalidConfig(String),

    /// A stage failed unexpectedly. Carries the stage name so the
    /// failure can be located from the external boundary.
    #[error("{stage} stage failed: {message}")]
    Processing {
        /// Name of the pipeline stage that failed.
        stage: &'static str,
        /// Human-readable failure description.
        message: String,
    },
}
