//! keisen: CLI for converting raster CAD drawings into SVG.
//!
//! Runs the vectorization pipeline on an image file with configurable
//! parameters, printing per-stage diagnostics. Useful for:
//!
//! - Comparing extraction methods (`skeleton` vs `canny`) and contour
//!   tracers (`edge-chain`, `moore`, `suzuki`, `marching-squares`)
//! - Tuning thresholds, blur sigma, and simplification tolerance
//! - Measuring per-stage durations and refinement scores
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin keisen -- [OPTIONS] <IMAGE_PATH> --svg out.svg
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use keisen_export::DocumentMetadata;
use keisen_pipeline::{
    ContourMethod, ContourOptions, ConvertOptions, EdgeMethod, EdgeOptions, RefineOptions,
    SvgOptions,
};

/// Convert a raster CAD drawing into a colored-polyline SVG.
#[derive(Parser)]
#[command(name = "keisen", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Edge extraction method: skeleton, canny, sobel, prewitt,
    /// roberts, laplacian.
    #[arg(long, default_value = "skeleton")]
    edge_method: String,

    /// Contour tracing method: edge-chain, moore, suzuki,
    /// marching-squares.
    #[arg(long, default_value = "edge-chain")]
    contour_method: String,

    /// Canny low threshold.
    #[arg(long, default_value_t = ConvertOptions::DEFAULT_LOW_THRESHOLD)]
    low_threshold: f32,

    /// Canny high threshold (also the gradient-operator cutoff).
    #[arg(long, default_value_t = ConvertOptions::DEFAULT_HIGH_THRESHOLD)]
    high_threshold: f32,

    /// Gaussian blur sigma for gradient-based methods.
    #[arg(long, default_value_t = ConvertOptions::DEFAULT_GAUSSIAN_SIGMA)]
    sigma: f32,

    /// Apply a 3x3 median filter before processing.
    #[arg(long)]
    noise_reduction: bool,

    /// Invert colors first (light-on-dark drawings).
    #[arg(long)]
    invert: bool,

    /// Simplification tolerance in pixels.
    #[arg(long, default_value_t = ConvertOptions::DEFAULT_SIMPLIFY_TOLERANCE)]
    tolerance: f64,

    /// Disable Douglas-Peucker simplification.
    #[arg(long)]
    no_simplify: bool,

    /// Apply Chaikin smoothing to traced paths.
    #[arg(long)]
    smooth: bool,

    /// Smoothing strength in [0, 1].
    #[arg(long, default_value_t = 0.5)]
    tension: f64,

    /// Maximum palette size.
    #[arg(long, default_value_t = ConvertOptions::DEFAULT_MAX_COLORS)]
    max_colors: usize,

    /// Emit a single flat layer instead of color layers.
    #[arg(long)]
    no_layers: bool,

    /// Disable accuracy-driven refinement.
    #[arg(long)]
    no_refine: bool,

    /// Refinement F1 target.
    #[arg(long, default_value_t = ConvertOptions::DEFAULT_TARGET_F1)]
    target_f1: f64,

    /// Coordinate precision (decimal places, 0-6).
    #[arg(long, default_value_t = ConvertOptions::DEFAULT_PRECISION)]
    precision: u8,

    /// Collapse whitespace and use H/V shorthands in path data.
    #[arg(long)]
    optimize: bool,

    /// Embed title/creator/source metadata in the document.
    #[arg(long)]
    metadata: bool,

    /// Write the SVG document to this path.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn to_options(&self) -> Result<ConvertOptions, keisen_pipeline::PipelineError> {
        Ok(ConvertOptions {
            invert_colors: self.invert,
            edges: EdgeOptions {
                method: self.edge_method.parse::<EdgeMethod>()?,
                low_threshold: self.low_threshold,
                high_threshold: self.high_threshold,
                gaussian_sigma: self.sigma,
                noise_reduction: self.noise_reduction,
                ..EdgeOptions::default()
            },
            contours: ContourOptions {
                method: self.contour_method.parse::<ContourMethod>()?,
                simplify: !self.no_simplify,
                tolerance: self.tolerance,
                ..ContourOptions::default()
            },
            svg: SvgOptions {
                precision: self.precision,
                optimize: self.optimize,
                metadata: self.metadata,
                ..SvgOptions::default()
            },
            smooth_curves: self.smooth,
            curve_tension: self.tension,
            detect_layers: !self.no_layers,
            refine: RefineOptions {
                enabled: !self.no_refine,
                target_f1: self.target_f1,
                ..RefineOptions::default()
            },
            colors: keisen_pipeline::ColorOptions {
                max_colors: self.max_colors,
                ..keisen_pipeline::ColorOptions::default()
            },
            ..ConvertOptions::default()
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = match cli.to_options() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let (image, format) = match keisen_pipeline::decode_rgba(&bytes) {
        Ok(decoded) => decoded,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({}x{}, {} bytes{})",
        cli.image_path.display(),
        image.width(),
        image.height(),
        bytes.len(),
        format
            .as_deref()
            .map(|f| format!(", {f}"))
            .unwrap_or_default(),
    );

    let (mut conversion, diagnostics) =
        match keisen_pipeline::convert_with_diagnostics(&image, &options) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        };
    conversion.metadata.source_format = format;

    if cli.json {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", diagnostics.report());
        println!(
            "paths={} layers={} colors={}",
            conversion.metadata.path_count,
            conversion.metadata.layer_count,
            conversion.color_groups.len(),
        );
        if let Some(report) = conversion.refinement {
            println!(
                "refinement: f1 {:.3} -> {:.3} ({} iterations)",
                report.before.f1, report.after.f1, report.iterations_used,
            );
        }
    }

    if let Some(ref svg_path) = cli.svg {
        let stem = cli
            .image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned());
        let source = cli
            .image_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned());
        let metadata = DocumentMetadata {
            title: stem.as_deref(),
            creator: Some("keisen"),
            source: source.as_deref(),
            ..DocumentMetadata::default()
        };
        let svg = keisen_export::to_svg(&conversion, &options.svg, &metadata);
        match std::fs::write(svg_path, &svg) {
            Ok(()) => {
                eprintln!("SVG written to {} ({} bytes)", svg_path.display(), svg.len());
            }
            Err(e) => {
                eprintln!("Error writing SVG to {}: {e}", svg_path.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
