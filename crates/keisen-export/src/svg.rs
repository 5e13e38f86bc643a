//! SVG document emitter.
//!
//! Serializes conversion output into an SVG string: one `<g>` per
//! layer (when layer grouping is on), one `<path>` per polyline with
//! `M`/`L` commands, stroke color from the path's palette entry, and
//! `fill="none"`. Numeric precision is configurable and trailing
//! zeros are stripped.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use std::fmt::Write as _;

use keisen_pipeline::{
    Conversion, ConvertOptions, Layer, Path, PipelineError, RgbaImage, SvgOptions,
};

/// Optional strings embedded in the document when
/// [`SvgOptions::metadata`] is set.
///
/// `title` and `description` become the standard `<title>` / `<desc>`
/// accessibility elements; the remaining fields go into a namespaced
/// `<metadata>` block. All values are XML-escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentMetadata<'a> {
    /// Document title.
    pub title: Option<&'a str>,
    /// Document description.
    pub description: Option<&'a str>,
    /// Creator string (tool or author).
    pub creator: Option<&'a str>,
    /// Creation date, any format the caller prefers.
    pub date: Option<&'a str>,
    /// Source string (original filename or URL).
    pub source: Option<&'a str>,
}

impl DocumentMetadata<'_> {
    fn any_block_field(&self) -> bool {
        self.creator.is_some() || self.date.is_some() || self.source.is_some()
    }
}

/// A conversion result paired with its serialized document.
#[derive(Debug, Clone)]
pub struct SvgConversion {
    /// The SVG document.
    pub svg: String,
    /// The structured conversion output (paths, layers, histogram,
    /// metadata, refinement report).
    pub conversion: Conversion,
}

/// Run the pipeline and serialize the result in one call.
///
/// # Errors
///
/// Propagates every [`PipelineError`] the pipeline can produce.
pub fn convert_to_svg(
    image: &RgbaImage,
    options: &ConvertOptions,
    metadata: &DocumentMetadata<'_>,
) -> Result<SvgConversion, PipelineError> {
    let conversion = keisen_pipeline::convert(image, options)?;
    let svg = to_svg(&conversion, &options.svg, metadata);
    Ok(SvgConversion { svg, conversion })
}

/// Serialize a conversion into an SVG document string.
#[must_use]
pub fn to_svg(
    conversion: &Conversion,
    options: &SvgOptions,
    metadata: &DocumentMetadata<'_>,
) -> String {
    let mut out = String::new();
    let precision = options.precision.min(6);

    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let view_box = options.view_box.unwrap_or([
        0.0,
        0.0,
        f64::from(conversion.dimensions.width),
        f64::from(conversion.dimensions.height),
    ]);
    let _ = writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="{} {} {} {}" preserveAspectRatio="xMidYMid meet">"#,
        conversion.dimensions.width,
        conversion.dimensions.height,
        format_number(view_box[0], precision),
        format_number(view_box[1], precision),
        format_number(view_box[2], precision),
        format_number(view_box[3], precision),
    );

    if options.metadata {
        write_metadata(&mut out, metadata);
    }
    write_defs(&mut out, conversion);

    if options.layer_groups && !conversion.layers.is_empty() {
        for layer in &conversion.layers {
            write_layer(&mut out, layer, options, precision);
        }
    } else {
        for path in &conversion.paths {
            write_path(&mut out, path, "  ", options, precision);
        }
    }

    let _ = writeln!(out, "</svg>");
    out
}

/// Emit `<title>`, `<desc>`, and the namespaced `<metadata>` block.
fn write_metadata(out: &mut String, metadata: &DocumentMetadata<'_>) {
    if let Some(title) = metadata.title {
        let _ = writeln!(out, "  <title>{}</title>", xml_escape(title));
    }
    if let Some(description) = metadata.description {
        let _ = writeln!(out, "  <desc>{}</desc>", xml_escape(description));
    }
    if metadata.any_block_field() {
        let _ = writeln!(out, "  <metadata>");
        let _ = writeln!(
            out,
            r#"    <keisen:document xmlns:keisen="https://keisen.dev/ns/1">"#,
        );
        for (tag, value) in [
            ("creator", metadata.creator),
            ("date", metadata.date),
            ("source", metadata.source),
        ] {
            if let Some(value) = value {
                let _ = writeln!(
                    out,
                    "      <keisen:{tag}>{}</keisen:{tag}>",
                    xml_escape(value),
                );
            }
        }
        let _ = writeln!(out, "    </keisen:document>");
        let _ = writeln!(out, "  </metadata>");
    }
}

/// Emit the `<defs>` block: empty normally, solid-color references
/// when the drawing uses more than two colors.
fn write_defs(out: &mut String, conversion: &Conversion) {
    if conversion.color_groups.len() <= 2 {
        let _ = writeln!(out, "  <defs/>");
        return;
    }
    let _ = writeln!(out, "  <defs>");
    for (i, group) in conversion.color_groups.iter().enumerate() {
        let _ = writeln!(
            out,
            r#"    <linearGradient id="color-{i}"><stop offset="0" stop-color="{}"/></linearGradient>"#,
            group.color.to_hex(),
        );
    }
    let _ = writeln!(out, "  </defs>");
}

fn write_layer(out: &mut String, layer: &Layer, options: &SvgOptions, precision: u8) {
    let display = if layer.visible { "inline" } else { "none" };
    let _ = writeln!(
        out,
        r#"  <g id="{}" data-name="{}" display="{display}">"#,
        xml_escape(&layer.id),
        xml_escape(&layer.name),
    );
    for path in &layer.paths {
        write_path(out, path, "    ", options, precision);
    }
    let _ = writeln!(out, "  </g>");
}

fn write_path(out: &mut String, path: &Path, indent: &str, options: &SvgOptions, precision: u8) {
    let Some(d) = path_d(path, precision, options.optimize) else {
        return;
    };
    let _ = writeln!(
        out,
        r#"{indent}<path d="{d}" fill="none" stroke="{}" stroke-width="{}"/>"#,
        path.color.to_hex(),
        format_number(path.stroke_width, precision),
    );
}

/// Build the `d` attribute for a path: absolute move-to, line-to
/// commands in point order, and a closing marker for closed paths.
///
/// Returns `None` for paths with fewer than 2 points (no visible
/// segment). With `optimize`, whitespace around commands collapses and
/// `H`/`V` shorthands replace line-to when the other coordinate
/// matches the previous point within 0.1.
fn path_d(path: &Path, precision: u8, optimize: bool) -> Option<String> {
    let points = &path.points;
    if points.len() < 2 {
        return None;
    }

    let mut d = String::new();
    if optimize {
        let _ = write!(
            d,
            "M{} {}",
            format_number(points[0].x, precision),
            format_number(points[0].y, precision),
        );
        let mut prev = points[0];
        for &p in &points[1..] {
            if (p.y - prev.y).abs() <= 0.1 {
                let _ = write!(d, "H{}", format_number(p.x, precision));
            } else if (p.x - prev.x).abs() <= 0.1 {
                let _ = write!(d, "V{}", format_number(p.y, precision));
            } else {
                let _ = write!(
                    d,
                    "L{} {}",
                    format_number(p.x, precision),
                    format_number(p.y, precision),
                );
            }
            prev = p;
        }
        if path.closed {
            d.push('Z');
        }
    } else {
        let _ = write!(
            d,
            "M {} {}",
            format_number(points[0].x, precision),
            format_number(points[0].y, precision),
        );
        for &p in &points[1..] {
            let _ = write!(
                d,
                " L {} {}",
                format_number(p.x, precision),
                format_number(p.y, precision),
            );
        }
        if path.closed {
            d.push_str(" Z");
        }
    }
    Some(d)
}

/// Format a number to the configured decimal count with trailing
/// zeros (and a trailing dot) stripped.
fn format_number(value: f64, precision: u8) -> String {
    let formatted = format!("{value:.*}", usize::from(precision));
    if formatted.contains('.') {
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        // Avoid "-0" after trimming.
        if trimmed == "-0" {
            "0".to_owned()
        } else {
            trimmed.to_owned()
        }
    } else {
        formatted
    }
}

/// Escape the five XML special characters for element text and
/// attribute values.
fn xml_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
