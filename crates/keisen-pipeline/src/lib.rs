//! keisen-pipeline: Pure raster-to-vector pipeline (sans-IO).
//!
//! Converts 2D CAD line art into colored polyline paths through:
//! preprocess -> binary/edge extraction -> contour tracing ->
//! simplification -> color analysis -> accuracy-driven refinement.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! pixel buffers and returns structured data. Decoding files and
//! serializing the vector document live in the surrounding crates
//! (`keisen-cli`, `keisen-export`).
//!
//! # Entry points
//!
//! - [`convert`] — one image in, a [`Conversion`] out.
//! - [`convert_with_diagnostics`] — the same, plus per-stage timings.
//! - [`convert_rgba_bytes`] — raw `(width, height, RGBA bytes)` entry
//!   with buffer validation.
//! - [`decode_rgba`] — boundary helper turning encoded file bytes into
//!   a pixel buffer plus a format tag.
//!
//! Each stage is a pure function of its inputs; nothing is retained
//! between invocations, and an all-background image converts to an
//! empty result rather than an error.

pub mod color;
pub mod contour;
pub mod diagnostics;
pub mod edge;
pub mod gradient;
pub mod pipeline;
pub mod preprocess;
pub mod refine;
pub mod simplify;
pub mod skeleton;
pub mod smooth;
pub mod types;

pub use contour::{ContourTracer, SuzukiTrace};
pub use diagnostics::{Diagnostics, StageDiagnostics, StageMetrics};
pub use gradient::GradientField;
pub use pipeline::{convert, convert_rgba_bytes, convert_with_diagnostics, decode_rgba};
pub use refine::{AccuracyScore, DistanceField, RefinementReport};
pub use smooth::CubicBezier;
pub use types::{
    Color, ColorGroup, ColorOptions, Contour, ContourMethod, ContourOptions, ConvertOptions,
    Conversion, ConversionMetadata, Dimensions, EdgeMethod, EdgeOptions, GrayImage, Layer, Path,
    PipelineError, Point, RefineOptions, RgbaImage, SvgOptions,
};
