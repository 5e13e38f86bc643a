//! Conversion orchestration: one synchronous pass through preprocess,
//! mask extraction, contour tracing, color analysis, and refinement.
//!
//! The core API is a plain function over in-memory buffers — no I/O,
//! no suspension points, no state between invocations. Hosts that want
//! to accept uploads or run on a worker thread wrap [`convert`] from
//! the outside.

use std::time::{Duration, Instant};

use crate::diagnostics::{self, Diagnostics, StageDiagnostics, StageMetrics};
use crate::types::{
    Color, Contour, ConvertOptions, Conversion, ConversionMetadata, Layer, Path, PipelineError,
    Dimensions, RgbaImage,
};
use crate::{color, contour, edge, preprocess, refine, simplify, smooth};

/// Convert a raster image into colored vector paths.
///
/// This is a convenience wrapper around [`convert_with_diagnostics`]
/// that discards the per-stage diagnostics.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for invalid options,
/// [`PipelineError::InvalidImage`] for zero-sized images, and
/// [`PipelineError::Processing`] when a stage violates one of its own
/// invariants.
pub fn convert(image: &RgbaImage, options: &ConvertOptions) -> Result<Conversion, PipelineError> {
    convert_with_diagnostics(image, options).map(|(conversion, _)| conversion)
}

/// Convert a raw RGBA pixel buffer.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidImage`] when `width` or `height` is
/// zero or `bytes.len() != 4 * width * height`, plus everything
/// [`convert`] can return.
pub fn convert_rgba_bytes(
    width: u32,
    height: u32,
    bytes: &[u8],
    options: &ConvertOptions,
) -> Result<Conversion, PipelineError> {
    if width == 0 || height == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "dimensions must be positive, got {width}x{height}",
        )));
    }
    let expected = 4 * width as usize * height as usize;
    if bytes.len() != expected {
        return Err(PipelineError::InvalidImage(format!(
            "buffer holds {} bytes but {width}x{height} RGBA needs {expected}",
            bytes.len(),
        )));
    }
    let image = RgbaImage::from_raw(width, height, bytes.to_vec()).ok_or_else(|| {
        PipelineError::InvalidImage("buffer does not form an RGBA grid".to_owned())
    })?;
    convert(&image, options)
}

/// Decode raw file bytes into an RGBA buffer plus a format tag.
///
/// This is the boundary helper for invokers holding encoded files
/// rather than pixel buffers; the core pipeline never does I/O.
///
/// # Errors
///
/// Returns [`PipelineError::ImageDecode`] when the bytes are not a
/// decodable image.
pub fn decode_rgba(bytes: &[u8]) -> Result<(RgbaImage, Option<String>), PipelineError> {
    let format = image::guess_format(bytes)
        .ok()
        .map(|f| format!("{f:?}").to_lowercase());
    let decoded = image::load_from_memory(bytes)?;
    Ok((decoded.to_rgba8(), format))
}

/// Convert a raster image, collecting per-stage diagnostics.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for invalid options,
/// [`PipelineError::InvalidImage`] for zero-sized images, and
/// [`PipelineError::Processing`] when a stage violates one of its own
/// invariants.
#[allow(clippy::too_many_lines)]
pub fn convert_with_diagnostics(
    image: &RgbaImage,
    options: &ConvertOptions,
) -> Result<(Conversion, Diagnostics), PipelineError> {
    options.validate()?;
    let dimensions = Dimensions {
        width: image.width(),
        height: image.height(),
    };
    if dimensions.width == 0 || dimensions.height == 0 {
        return Err(PipelineError::InvalidImage(format!(
            "dimensions must be positive, got {}x{}",
            dimensions.width, dimensions.height,
        )));
    }

    let start = Instant::now();

    // Stage 1 — preprocess: inversion, optional median filter, grayscale.
    let ((processed, gray), preprocess_time) = timed(|| {
        let mut processed = if options.invert_colors {
            preprocess::invert(image)
        } else {
            image.clone()
        };
        if options.edges.noise_reduction {
            processed = preprocess::median_filter(&processed);
        }
        let gray = preprocess::grayscale(&processed);
        (processed, gray)
    });

    // Stage 2 — binary/edge mask extraction.
    let (mask, extraction_time) = timed(|| edge::extract_mask(&gray, &options.edges));
    let mask_pixels = diagnostics::count_mask_pixels(&mask);

    // Stage 3 — contour tracing, simplification, optional smoothing.
    let (traced, tracing_time) = timed(|| {
        let raw = contour::trace_contours(
            &mask,
            &crate::types::ContourOptions {
                simplify: false,
                ..options.contours.clone()
            },
        )?;
        let raw_points: usize = raw.iter().map(Contour::len).sum();

        let mut traced = if options.contours.simplify {
            raw.iter()
                .map(|c| {
                    if options.contours.relative_tolerance {
                        simplify::douglas_peucker_relative(c, options.contours.tolerance)
                    } else {
                        simplify::douglas_peucker_contour(c, options.contours.tolerance)
                    }
                })
                .collect()
        } else {
            raw
        };

        if options.smooth_curves {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let iterations = 1 + (options.curve_tension * 2.0).round() as usize;
            for c in &mut traced {
                c.points = smooth::chaikin(&c.points, iterations, c.closed);
            }
        }

        let simplified_points: usize = traced.iter().map(Contour::len).sum();
        Ok::<_, PipelineError>((traced, raw_points, simplified_points))
    });
    let (contours, raw_points, simplified_points) = traced?;
    let contour_count = contours.len();

    // Stage 4 — color analysis and path construction.
    let ((mut paths, background, palette), coloring_time) = timed(|| {
        let background = options
            .colors
            .background
            .unwrap_or_else(|| color::detect_background(&processed));
        let palette = if options.colors.quantize {
            let samples =
                color::line_samples(&processed, background, options.colors.ignore_background);
            if samples.is_empty() {
                vec![Color::BLACK]
            } else {
                color::median_cut(&samples, options.colors.max_colors)
            }
        } else {
            color::extract_palette(&processed, background, &options.colors)
        };

        let paths: Vec<Path> = contours
            .into_iter()
            .map(|c| {
                let assigned = color::assign_color(&processed, &c.points, &palette);
                Path::from_contour(c, assigned, options.svg.stroke_width)
            })
            .collect();
        (paths, background, palette)
    });

    if options.merge_similar_paths {
        paths = merge_similar(paths, options.path_merge_threshold);
    }

    // Stage 5 — refinement against the extracted mask.
    let mut refinement = None;
    let mut refinement_stage = None;
    if options.refine.enabled && !paths.is_empty() {
        let ((refined, report), refine_time) =
            timed(|| refine::refine(paths.clone(), &mask, &options.refine));
        paths = refined;
        refinement_stage = Some(StageDiagnostics {
            duration: refine_time,
            metrics: StageMetrics::Refinement {
                before_f1: report.before.f1,
                after_f1: report.after.f1,
                iterations: report.iterations_used,
            },
        });
        refinement = Some(report);
    }

    // Layer grouping and the color histogram.
    let layers = if paths.is_empty() {
        Vec::new()
    } else if options.detect_layers {
        color::group_layers(&paths, options.colors.layer_distance)
    } else {
        vec![Layer {
            id: "layer-0".to_owned(),
            name: "Layer 1".to_owned(),
            color: paths.first().map_or(Color::BLACK, |p| p.color),
            visible: true,
            locked: false,
            paths: paths.clone(),
        }]
    };
    let color_groups = color::color_groups(&paths);

    let total_duration = start.elapsed();
    let conversion = Conversion {
        dimensions,
        metadata: ConversionMetadata {
            source_format: None,
            duration: total_duration,
            path_count: paths.len(),
            layer_count: layers.len(),
        },
        paths,
        layers,
        color_groups,
        refinement,
    };

    let diagnostics = Diagnostics {
        preprocess: StageDiagnostics {
            duration: preprocess_time,
            metrics: StageMetrics::Preprocess {
                inverted: options.invert_colors,
                noise_reduction: options.edges.noise_reduction,
                width: dimensions.width,
                height: dimensions.height,
            },
        },
        extraction: StageDiagnostics {
            duration: extraction_time,
            metrics: StageMetrics::Extraction {
                method: options.edges.method.to_string(),
                mask_pixels,
            },
        },
        tracing: StageDiagnostics {
            duration: tracing_time,
            metrics: StageMetrics::Tracing {
                contour_count,
                raw_points,
                simplified_points,
            },
        },
        coloring: StageDiagnostics {
            duration: coloring_time,
            metrics: StageMetrics::Coloring {
                background: background.to_hex(),
                palette_size: palette.len(),
                layer_count: conversion.metadata.layer_count,
            },
        },
        refinement: refinement_stage,
        total_duration,
    };

    Ok((conversion, diagnostics))
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}

/// Greedily concatenate same-color open paths whose endpoints lie
/// within `threshold` of each other, preserving insertion order.
fn merge_similar(paths: Vec<Path>, threshold: f64) -> Vec<Path> {
    let mut out: Vec<Path> = Vec::new();
    for path in paths {
        if path.closed || path.points.is_empty() {
            out.push(path);
            continue;
        }
        let merged = out
            .iter_mut()
            .filter(|existing| !existing.closed && existing.color == path.color)
            .any(|existing| try_join(existing, &path, threshold));
        if !merged {
            out.push(path);
        }
    }
    out
}

/// Join `b` onto `a` when an endpoint pair is within `threshold`,
/// reversing whichever side is needed.
fn try_join(a: &mut Path, b: &Path, threshold: f64) -> bool {
    let (Some(&a_first), Some(&a_last)) = (a.points.first(), a.points.last()) else {
        return false;
    };
    let (Some(&b_first), Some(&b_last)) = (b.points.first(), b.points.last()) else {
        return false;
    };

    if a_last.distance(b_first) <= threshold {
        a.points.extend_from_slice(&b.points);
    } else if a_last.distance(b_last) <= threshold {
        a.points.extend(b.points.iter().rev().copied());
    } else if a_first.distance(b_last) <= threshold {
        let mut joined = b.points.clone();
        joined.extend_from_slice(&a.points);
        a.points = joined;
    } else if a_first.distance(b_first) <= threshold {
        let mut joined: Vec<_> = b.points.iter().rev().copied().collect();
        joined.extend_from_slice(&a.points);
        a.points = joined;
    } else {
        return false;
    }
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Point;

    /// White canvas with one black horizontal line across row `y`.
    fn line_drawing(w: u32, h: u32, y: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |_, py| {
            if py == y {
                image::Rgba([0, 0, 0, 255])
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn single_black_line_becomes_one_black_path() {
        let img = line_drawing(100, 100, 50);
        let conversion = convert(&img, &ConvertOptions::default()).unwrap();

        assert_eq!(conversion.paths.len(), 1, "expected exactly one path");
        let path = &conversion.paths[0];
        assert_eq!(path.color, Color::BLACK);
        assert!(!path.closed);

        // Path spans the full line at y = 50.
        let xs: Vec<f64> = path.points.iter().map(|p| p.x).collect();
        let min_x = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let max_x = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(min_x <= 1.0, "line should start near x=0, got {min_x}");
        assert!(max_x >= 98.0, "line should end near x=99, got {max_x}");
        for p in &path.points {
            assert!((p.y - 50.0).abs() < f64::EPSILON);
        }

        assert_eq!(conversion.layers.len(), 1);
        assert_eq!(conversion.color_groups.len(), 1);
        assert_eq!(conversion.metadata.path_count, 1);
        assert_eq!(conversion.metadata.layer_count, 1);

        let report = conversion.refinement.unwrap();
        assert!(
            report.after.f1 >= 0.95,
            "reconstruction should align with the skeleton, f1 = {}",
            report.after.f1,
        );
    }

    #[test]
    fn blank_image_converts_to_nothing_without_error() {
        let img = RgbaImage::from_fn(32, 32, |_, _| image::Rgba([255, 255, 255, 255]));
        let conversion = convert(&img, &ConvertOptions::default()).unwrap();
        assert!(conversion.paths.is_empty());
        assert!(conversion.layers.is_empty());
        assert!(conversion.color_groups.is_empty());
        assert!(conversion.refinement.is_none());
    }

    #[test]
    fn two_blue_lines_share_a_palette_entry_and_layer() {
        let blue = [0u8, 0, 255, 255];
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            if (y == 20 || y == 44) && (8..56).contains(&x) {
                image::Rgba(blue)
            } else {
                image::Rgba([255, 255, 255, 255])
            }
        });
        let conversion = convert(&img, &ConvertOptions::default()).unwrap();

        assert_eq!(conversion.paths.len(), 2);
        for path in &conversion.paths {
            assert_eq!(path.color, Color::new(0, 0, 255));
        }
        assert_eq!(conversion.layers.len(), 1, "same color → one layer");
        assert_eq!(conversion.color_groups.len(), 1);
        assert_eq!(conversion.color_groups[0].path_count, 2);
    }

    #[test]
    fn inverted_drawing_matches_dark_on_light_behavior() {
        // White line on black, converted with invert_colors.
        let img = RgbaImage::from_fn(100, 100, |_, y| {
            if y == 50 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        });
        let options = ConvertOptions {
            invert_colors: true,
            ..ConvertOptions::default()
        };
        let conversion = convert(&img, &options).unwrap();
        assert_eq!(conversion.paths.len(), 1);
        assert_eq!(conversion.paths[0].color, Color::BLACK);
        assert_eq!(conversion.layers.len(), 1);
    }

    #[test]
    fn noisy_square_survives_noise_reduction() {
        // 2-px-thick square outline plus deterministic salt-and-pepper
        // specks; the median filter should leave one dominant boundary.
        let mut img = RgbaImage::from_fn(64, 64, |_, _| image::Rgba([255, 255, 255, 255]));
        for i in 7..57u32 {
            for t in 0..2u32 {
                img.put_pixel(i, 7 + t, image::Rgba([0, 0, 0, 255]));
                img.put_pixel(i, 55 + t, image::Rgba([0, 0, 0, 255]));
                img.put_pixel(7 + t, i, image::Rgba([0, 0, 0, 255]));
                img.put_pixel(55 + t, i, image::Rgba([0, 0, 0, 255]));
            }
        }
        // ~1% speckle, away from the outline.
        for k in 0..40u32 {
            let x = (k * 17 + 3) % 64;
            let y = (k * 29 + 11) % 64;
            if (20..44).contains(&x) && (20..44).contains(&y) {
                img.put_pixel(x, y, image::Rgba([0, 0, 0, 255]));
            }
        }
        let options = ConvertOptions {
            edges: crate::types::EdgeOptions {
                noise_reduction: true,
                ..crate::types::EdgeOptions::default()
            },
            ..ConvertOptions::default()
        };
        let conversion = convert(&img, &options).unwrap();
        assert!(!conversion.paths.is_empty());
        // The dominant path covers the square's extent.
        let longest = conversion
            .paths
            .iter()
            .max_by(|a, b| {
                let la = Contour::new(a.points.clone(), a.closed).perimeter();
                let lb = Contour::new(b.points.clone(), b.closed).perimeter();
                la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap();
        let contour = Contour::new(longest.points.clone(), longest.closed);
        let (min_x, min_y, max_x, max_y) = contour.bounding_box();
        assert!(max_x - min_x >= 40.0, "boundary too small: {:?}", (min_x, max_x));
        assert!(max_y - min_y >= 40.0, "boundary too small: {:?}", (min_y, max_y));
    }

    #[test]
    fn raw_buffer_entry_validates_length() {
        let err = convert_rgba_bytes(10, 10, &[0u8; 10], &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImage(_)));

        let err = convert_rgba_bytes(0, 10, &[], &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidImage(_)));
    }

    #[test]
    fn raw_buffer_entry_accepts_exact_length() {
        let bytes = vec![255u8; 4 * 16 * 16];
        let conversion =
            convert_rgba_bytes(16, 16, &bytes, &ConvertOptions::default()).unwrap();
        assert!(conversion.paths.is_empty());
    }

    #[test]
    fn invalid_options_are_rejected_before_processing() {
        let img = line_drawing(10, 10, 5);
        let options = ConvertOptions {
            curve_tension: 9.0,
            ..ConvertOptions::default()
        };
        assert!(matches!(
            convert(&img, &options),
            Err(PipelineError::InvalidConfig(_)),
        ));
    }

    #[test]
    fn decode_rgba_rejects_garbage() {
        let err = decode_rgba(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, PipelineError::ImageDecode(_)));
    }

    #[test]
    fn decode_rgba_reports_png_format() {
        let img = RgbaImage::from_fn(4, 4, |_, _| image::Rgba([255, 0, 0, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        let (decoded, format) = decode_rgba(&buf).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
        assert_eq!(format.as_deref(), Some("png"));
    }

    #[test]
    fn diagnostics_cover_all_stages() {
        let img = line_drawing(40, 40, 20);
        let (_, diagnostics) =
            convert_with_diagnostics(&img, &ConvertOptions::default()).unwrap();
        assert!(matches!(
            &diagnostics.extraction.metrics,
            StageMetrics::Extraction { method, mask_pixels } if method == "skeleton" && *mask_pixels > 0,
        ));
        assert!(diagnostics.refinement.is_some());
        assert!(diagnostics.total_duration >= diagnostics.preprocess.duration);
    }

    #[test]
    fn merge_joins_touching_same_color_paths() {
        let color = Color::new(10, 20, 30);
        let a = Path {
            points: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)],
            closed: false,
            color,
            stroke_width: 1.0,
        };
        let b = Path {
            points: vec![Point::new(6.0, 0.0), Point::new(12.0, 0.0)],
            closed: false,
            color,
            stroke_width: 1.0,
        };
        let merged = merge_similar(vec![a, b], 2.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].points.len(), 4);
        assert_eq!(merged[0].points.last(), Some(&Point::new(12.0, 0.0)));
    }

    #[test]
    fn merge_leaves_distant_or_differently_colored_paths() {
        let a = Path {
            points: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)],
            closed: false,
            color: Color::BLACK,
            stroke_width: 1.0,
        };
        let b = Path {
            points: vec![Point::new(6.0, 0.0), Point::new(12.0, 0.0)],
            closed: false,
            color: Color::new(255, 0, 0),
            stroke_width: 1.0,
        };
        let c = Path {
            points: vec![Point::new(30.0, 30.0), Point::new(40.0, 30.0)],
            closed: false,
            color: Color::BLACK,
            stroke_width: 1.0,
        };
        let merged = merge_similar(vec![a, b, c], 2.0);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn reversed_continuation_is_joined_head_to_tail() {
        let color = Color::BLACK;
        let a = Path {
            points: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)],
            closed: false,
            color,
            stroke_width: 1.0,
        };
        // Same stroke continued, but traced from the far end.
        let b = Path {
            points: vec![Point::new(12.0, 0.0), Point::new(6.0, 0.0)],
            closed: false,
            color,
            stroke_width: 1.0,
        };
        let merged = merge_similar(vec![a, b], 2.0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].points.last(), Some(&Point::new(12.0, 0.0)));
    }
}
