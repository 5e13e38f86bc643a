//! Conversion diagnostics: timing and counts for each stage.
//!
//! These are permanent instrumentation for parameter tuning. Every
//! call to [`convert_with_diagnostics`](crate::convert_with_diagnostics)
//! collects them alongside the conversion result; the CLI prints them
//! as a report or as JSON.
//!
//! Durations are serialized as fractional seconds (`f64`), since
//! `std::time::Duration` does not implement serde traits.

use std::fmt::Write as _;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
pub(crate) mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable",
            )
        })
    }
}

/// Diagnostics collected from a single conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Inversion, noise reduction, and grayscale conversion.
    pub preprocess: StageDiagnostics,
    /// Binary/edge mask extraction.
    pub extraction: StageDiagnostics,
    /// Contour tracing (including area filtering and simplification).
    pub tracing: StageDiagnostics,
    /// Background/palette detection and per-path color assignment.
    pub coloring: StageDiagnostics,
    /// Accuracy-driven refinement; `None` when disabled or skipped.
    pub refinement: Option<StageDiagnostics>,
    /// Total wall-clock duration of the conversion.
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl Diagnostics {
    /// Render a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<16} {:>10}  metrics", "stage", "ms");
        let _ = writeln!(out, "{}", "-".repeat(60));
        for (name, stage) in [
            ("preprocess", Some(&self.preprocess)),
            ("extraction", Some(&self.extraction)),
            ("tracing", Some(&self.tracing)),
            ("coloring", Some(&self.coloring)),
            ("refinement", self.refinement.as_ref()),
        ] {
            let Some(stage) = stage else {
                let _ = writeln!(out, "{name:<16} {:>10}  (skipped)", "-");
                continue;
            };
            let _ = writeln!(
                out,
                "{name:<16} {:>10.3}  {}",
                stage.duration.as_secs_f64() * 1000.0,
                stage.metrics.describe(),
            );
        }
        let _ = writeln!(out, "{}", "-".repeat(60));
        let _ = writeln!(
            out,
            "{:<16} {:>10.3}",
            "total",
            self.total_duration.as_secs_f64() * 1000.0,
        );
        out
    }
}

/// Duration plus stage-specific metrics for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific counts.
    pub metrics: StageMetrics,
}

/// Counts meaningful for a particular stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Preprocessing metrics.
    Preprocess {
        /// Whether channel inversion ran.
        inverted: bool,
        /// Whether the median filter ran.
        noise_reduction: bool,
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Mask extraction metrics.
    Extraction {
        /// Method selector that ran.
        method: String,
        /// Set pixels in the produced mask.
        mask_pixels: u64,
    },
    /// Contour tracing metrics.
    Tracing {
        /// Contours surviving the area filter.
        contour_count: usize,
        /// Total points before simplification.
        raw_points: usize,
        /// Total points after simplification.
        simplified_points: usize,
    },
    /// Color analysis metrics.
    Coloring {
        /// Detected or supplied background color, as `#rrggbb`.
        background: String,
        /// Palette size.
        palette_size: usize,
        /// Number of layers produced.
        layer_count: usize,
    },
    /// Refinement metrics.
    Refinement {
        /// F1 before refinement.
        before_f1: f64,
        /// F1 after refinement.
        after_f1: f64,
        /// Iterations performed.
        iterations: u32,
    },
}

impl StageMetrics {
    fn describe(&self) -> String {
        match self {
            Self::Preprocess {
                inverted,
                noise_reduction,
                width,
                height,
            } => {
                format!("{width}x{height} inverted={inverted} median={noise_reduction}")
            }
            Self::Extraction {
                method,
                mask_pixels,
            } => format!("method={method} mask_pixels={mask_pixels}"),
            Self::Tracing {
                contour_count,
                raw_points,
                simplified_points,
            } => format!(
                "contours={contour_count} points={raw_points}->{simplified_points}",
            ),
            Self::Coloring {
                background,
                palette_size,
                layer_count,
            } => format!(
                "background={background} palette={palette_size} layers={layer_count}",
            ),
            Self::Refinement {
                before_f1,
                after_f1,
                iterations,
            } => format!("f1={before_f1:.3}->{after_f1:.3} iterations={iterations}"),
        }
    }
}

/// Count set pixels in a binary mask.
#[must_use]
pub fn count_mask_pixels(mask: &image::GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Diagnostics {
        Diagnostics {
            preprocess: StageDiagnostics {
                duration: Duration::from_millis(2),
                metrics: StageMetrics::Preprocess {
                    inverted: false,
                    noise_reduction: true,
                    width: 100,
                    height: 80,
                },
            },
            extraction: StageDiagnostics {
                duration: Duration::from_millis(10),
                metrics: StageMetrics::Extraction {
                    method: "skeleton".to_owned(),
                    mask_pixels: 420,
                },
            },
            tracing: StageDiagnostics {
                duration: Duration::from_millis(3),
                metrics: StageMetrics::Tracing {
                    contour_count: 7,
                    raw_points: 900,
                    simplified_points: 120,
                },
            },
            coloring: StageDiagnostics {
                duration: Duration::from_millis(1),
                metrics: StageMetrics::Coloring {
                    background: "#f8f8f8".to_owned(),
                    palette_size: 2,
                    layer_count: 2,
                },
            },
            refinement: None,
            total_duration: Duration::from_millis(16),
        }
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        for name in ["preprocess", "extraction", "tracing", "coloring", "refinement", "total"] {
            assert!(report.contains(name), "missing {name} in report:\n{report}");
        }
        assert!(report.contains("(skipped)"), "disabled stage should show as skipped");
    }

    #[test]
    fn serde_round_trips_durations_as_seconds() {
        let diagnostics = sample();
        let json = serde_json::to_string(&diagnostics).unwrap();
        assert!(json.contains("\"total_duration\":0.016"));
        let back: Diagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_duration, Duration::from_millis(16));
    }

    #[test]
    fn count_mask_pixels_counts_only_set() {
        let mut mask = image::GrayImage::new(4, 4);
        mask.put_pixel(1, 1, image::Luma([255]));
        mask.put_pixel(2, 3, image::Luma([255]));
        assert_eq!(count_mask_pixels(&mask), 2);
    }
}
