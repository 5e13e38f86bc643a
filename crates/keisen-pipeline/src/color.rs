//! Color analysis: background detection, line palette extraction,
//! dominant-color clustering, per-path color assignment, and layer
//! grouping.
//!
//! All sampling runs on the preprocessed RGBA image so an inverted
//! drawing is analyzed the same way a dark-on-light one is.

use std::collections::HashMap;

use crate::types::{Color, ColorGroup, ColorOptions, Layer, Path, Point, RgbaImage};

/// Minimum alpha for a pixel to participate in color analysis.
const OPAQUE_ALPHA: u8 = 128;

/// Minimum RGB distance from the background for a pixel to count as
/// line material.
const LINE_DISTANCE: f64 = 30.0;

/// Detect the background color from the image border.
///
/// Collects the colors of the top and bottom rows plus the left and
/// right columns, quantizes each channel into 16 bins, and returns the
/// center of the most common sufficiently-opaque bin. Empty images
/// fall back to white.
#[must_use]
pub fn detect_background(image: &RgbaImage) -> Color {
    let (w, h) = (image.width(), image.height());
    if w == 0 || h == 0 {
        return Color::WHITE;
    }

    let mut bins: HashMap<(u8, u8, u8), u32> = HashMap::new();
    let mut tally = |x: u32, y: u32| {
        let p = image.get_pixel(x, y).0;
        if p[3] >= OPAQUE_ALPHA {
            *bins.entry((p[0] / 16, p[1] / 16, p[2] / 16)).or_insert(0) += 1;
        }
    };

    for x in 0..w {
        tally(x, 0);
        tally(x, h - 1);
    }
    for y in 0..h {
        tally(0, y);
        tally(w - 1, y);
    }

    bins.into_iter()
        // Deterministic winner: highest count, ties by bin key.
        .max_by_key(|&((r, g, b), count)| (count, r, g, b))
        .map_or(Color::WHITE, |((r, g, b), _)| bin_center(r, g, b, 16))
}

/// Center-of-bin representative color for a quantized triple.
fn bin_center(r: u8, g: u8, b: u8, width: u16) -> Color {
    let center = |v: u8| -> u8 {
        let lo = u16::from(v) * width;
        u8::try_from((lo + width / 2).min(255)).unwrap_or(255)
    };
    Color::new(center(r), center(g), center(b))
}

/// Extract the line-color palette by histogram binning.
///
/// Scans sufficiently-opaque pixels far enough from the background
/// (skipping near-white pixels when the background is light), bins
/// colors 8 levels per channel, keeps bins above `min_percentage` of
/// the scanned pixels, and returns up to `max_colors` colors ordered
/// by frequency. Falls back to pure black when nothing qualifies.
#[must_use]
pub fn extract_palette(image: &RgbaImage, background: Color, options: &ColorOptions) -> Vec<Color> {
    let samples = line_samples(image, background, options.ignore_background);
    let total = samples.len();
    if total == 0 {
        return vec![Color::BLACK];
    }

    // Per-bin pixel count and channel sums; each surviving bin is
    // represented by the mean of its members, so a drawing in pure
    // colors gets them back exactly.
    let mut bins: HashMap<(u8, u8, u8), (u32, [u64; 3])> = HashMap::new();
    for &color in &samples {
        let key = (color.r / 8, color.g / 8, color.b / 8);
        let entry = bins.entry(key).or_insert((0, [0; 3]));
        entry.0 += 1;
        entry.1[0] += u64::from(color.r);
        entry.1[1] += u64::from(color.g);
        entry.1[2] += u64::from(color.b);
    }

    #[allow(clippy::cast_precision_loss)]
    let min_count = (total as f64 * options.min_percentage / 100.0).ceil().max(1.0);
    let mut qualifying: Vec<((u8, u8, u8), (u32, [u64; 3]))> = bins
        .into_iter()
        .filter(|&(_, (count, _))| f64::from(count) >= min_count)
        .collect();
    // Sort by count descending; ties broken by bin key so the palette
    // order is stable.
    qualifying.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.0.cmp(&b.0)));
    qualifying.truncate(options.max_colors.min(10));

    if qualifying.is_empty() {
        return vec![Color::BLACK];
    }
    qualifying
        .into_iter()
        .map(|(_, (count, sums))| {
            let mean = |sum: u64| u8::try_from(sum / u64::from(count)).unwrap_or(255);
            Color::new(mean(sums[0]), mean(sums[1]), mean(sums[2]))
        })
        .collect()
}

/// Collect line-material pixel colors: opaque, far from the
/// background, and not near-white on a light background.
///
/// The same sample set feeds histogram extraction, [`median_cut`], and
/// [`kmeans`].
#[must_use]
pub fn line_samples(image: &RgbaImage, background: Color, ignore_background: bool) -> Vec<Color> {
    let light_background = background.luminance() >= 128;
    let mut samples = Vec::new();
    for p in image.pixels() {
        let [r, g, b, a] = p.0;
        if a < OPAQUE_ALPHA {
            continue;
        }
        let color = Color::new(r, g, b);
        if ignore_background && color.distance(background) <= LINE_DISTANCE {
            continue;
        }
        if light_background && r > 240 && g > 240 && b > 240 {
            continue;
        }
        samples.push(color);
    }
    samples
}

/// Quantize sample colors with median-cut.
///
/// Starts with one box over all samples and repeatedly splits the box
/// with the widest channel range at its median until `count` boxes
/// exist (or no box is splittable). Each box yields its mean color.
#[must_use]
pub fn median_cut(samples: &[Color], count: usize) -> Vec<Color> {
    if samples.is_empty() || count == 0 {
        return Vec::new();
    }

    let mut boxes: Vec<Vec<Color>> = vec![samples.to_vec()];
    while boxes.len() < count {
        // Split the box with the largest channel range.
        let Some((idx, channel)) = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.len() > 1)
            .map(|(i, b)| {
                let (channel, range) = widest_channel(b);
                (i, channel, range)
            })
            .max_by_key(|&(_, _, range)| range)
            .map(|(i, c, _)| (i, c))
        else {
            break;
        };

        let mut b = boxes.swap_remove(idx);
        b.sort_by_key(|c| channel_value(*c, channel));
        let mid = b.len() / 2;
        let tail = b.split_off(mid);
        boxes.push(b);
        boxes.push(tail);
    }

    let mut palette: Vec<Color> = boxes.iter().map(|b| mean_color(b)).collect();
    // Insertion order of splits is not meaningful; order by frequency
    // weight (box size) descending for a stable palette.
    let mut weighted: Vec<(usize, Color)> = boxes
        .iter()
        .map(Vec::len)
        .zip(palette.drain(..))
        .collect();
    weighted.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.to_hex().cmp(&b.1.to_hex())));
    weighted.into_iter().map(|(_, c)| c).collect()
}

#[allow(clippy::cast_possible_truncation)]
fn widest_channel(colors: &[Color]) -> (u8, u8) {
    let mut min = [255u8; 3];
    let mut max = [0u8; 3];
    for c in colors {
        for (i, v) in [c.r, c.g, c.b].into_iter().enumerate() {
            min[i] = min[i].min(v);
            max[i] = max[i].max(v);
        }
    }
    let ranges = [max[0] - min[0], max[1] - min[1], max[2] - min[2]];
    let channel = (0..3).max_by_key(|&i| ranges[i]).unwrap_or(0);
    (channel as u8, ranges[channel])
}

fn channel_value(c: Color, channel: u8) -> u8 {
    match channel {
        0 => c.r,
        1 => c.g,
        _ => c.b,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn mean_color(colors: &[Color]) -> Color {
    if colors.is_empty() {
        return Color::BLACK;
    }
    let n = colors.len() as f64;
    let (mut r, mut g, mut b) = (0.0, 0.0, 0.0);
    for c in colors {
        r += f64::from(c.r);
        g += f64::from(c.g);
        b += f64::from(c.b);
    }
    Color::new(
        (r / n).round() as u8,
        (g / n).round() as u8,
        (b / n).round() as u8,
    )
}

// ───────────────────────── k-means clustering ─────────────────────────

/// Deterministic xorshift64* generator used for k-means++ seeding.
///
/// Conversions must be reproducible (layer order and palette are part
/// of the output contract), so no entropy source is involved.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform index in `[0, bound)`.
    #[allow(clippy::cast_possible_truncation)]
    fn next_index(&mut self, bound: usize) -> usize {
        (self.next() % bound.max(1) as u64) as usize
    }

    /// Uniform float in `[0, 1)` from the top 53 bits.
    #[allow(clippy::cast_precision_loss)]
    fn next_f64(&mut self) -> f64 {
        (self.next() >> 11) as f64 / 9_007_199_254_740_992.0
    }
}

/// Cluster sample colors into `k` dominant colors with k-means.
///
/// Centroids are seeded with k-means++ (first uniform, the rest
/// weighted by squared distance to the nearest chosen centroid), then
/// assignment/update iterations run until no non-empty centroid moves
/// more than one unit or 20 iterations elapse. Empty clusters keep
/// their previous centroid and do not count toward convergence.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn kmeans(samples: &[Color], k: usize, seed: u64) -> Vec<Color> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }
    let k = k.min(samples.len());
    let mut rng = XorShift64::new(seed);

    // k-means++ seeding.
    let mut centroids: Vec<[f64; 3]> = vec![as_f64(samples[rng.next_index(samples.len())])];
    while centroids.len() < k {
        let weights: Vec<f64> = samples
            .iter()
            .map(|&s| nearest_centroid(&centroids, as_f64(s)).1)
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            break;
        }
        let mut target = rng.next_f64() * total;
        let mut chosen = samples.len() - 1;
        for (i, &w) in weights.iter().enumerate() {
            target -= w;
            if target <= 0.0 {
                chosen = i;
                break;
            }
        }
        centroids.push(as_f64(samples[chosen]));
    }

    // Lloyd iterations.
    for _ in 0..20 {
        let mut sums = vec![[0.0f64; 3]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for &s in samples {
            let v = as_f64(s);
            let (idx, _) = nearest_centroid(&centroids, v);
            for c in 0..3 {
                sums[idx][c] += v[c];
            }
            counts[idx] += 1;
        }

        let mut max_move = 0.0f64;
        for (i, (&count, sum)) in counts.iter().zip(&sums).enumerate() {
            if count == 0 {
                // Empty cluster: leave the centroid in place and skip
                // it in the convergence test.
                continue;
            }
            let updated = [
                sum[0] / count as f64,
                sum[1] / count as f64,
                sum[2] / count as f64,
            ];
            let moved = (updated[0] - centroids[i][0]).hypot(updated[1] - centroids[i][1])
                .hypot(updated[2] - centroids[i][2]);
            max_move = max_move.max(moved);
            centroids[i] = updated;
        }
        if max_move <= 1.0 {
            break;
        }
    }

    centroids
        .into_iter()
        .map(|c| {
            Color::new(
                c[0].round().clamp(0.0, 255.0) as u8,
                c[1].round().clamp(0.0, 255.0) as u8,
                c[2].round().clamp(0.0, 255.0) as u8,
            )
        })
        .collect()
}

fn as_f64(c: Color) -> [f64; 3] {
    [f64::from(c.r), f64::from(c.g), f64::from(c.b)]
}

/// Index of the nearest centroid and the squared distance to it.
fn nearest_centroid(centroids: &[[f64; 3]], v: [f64; 3]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = (v[0] - c[0]).powi(2) + (v[1] - c[1]).powi(2) + (v[2] - c[2]).powi(2);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

// ───────────────────────── Path color assignment ──────────────────────

/// Assign a palette color to a polyline by sampling the image along
/// its points.
///
/// Samples at most 10 evenly spaced indices, averages them, and snaps
/// the mean to the nearest palette entry by RGB distance.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn assign_color(image: &RgbaImage, points: &[Point], palette: &[Color]) -> Color {
    if palette.is_empty() {
        return Color::BLACK;
    }
    if points.is_empty() {
        return palette[0];
    }

    let sample_count = points.len().min(10);
    let mut sampled = Vec::with_capacity(sample_count);
    for i in 0..sample_count {
        let idx = i * points.len() / sample_count;
        let p = points[idx];
        let x = p.x.round();
        let y = p.y.round();
        if x < 0.0 || y < 0.0 || x >= f64::from(image.width()) || y >= f64::from(image.height()) {
            continue;
        }
        let px = image.get_pixel(x as u32, y as u32).0;
        sampled.push(Color::new(px[0], px[1], px[2]));
    }
    if sampled.is_empty() {
        return palette[0];
    }

    let mean = mean_color(&sampled);
    *palette
        .iter()
        .min_by_key(|c| c.distance_squared(mean))
        .unwrap_or(&palette[0])
}

/// Histogram of paths per color, in first-occurrence order.
#[must_use]
pub fn color_groups(paths: &[Path]) -> Vec<ColorGroup> {
    let mut groups: Vec<ColorGroup> = Vec::new();
    for path in paths {
        if let Some(group) = groups.iter_mut().find(|g| g.color == path.color) {
            group.path_count += 1;
        } else {
            groups.push(ColorGroup {
                color: path.color,
                path_count: 1,
            });
        }
    }
    groups
}

/// Group paths into layers by greedy nearest-color bucketing.
///
/// A path joins the first existing layer whose representative color is
/// within `max_distance`; otherwise it opens a new layer. Layers keep
/// the insertion order of their first path.
#[must_use]
pub fn group_layers(paths: &[Path], max_distance: f64) -> Vec<Layer> {
    let mut layers: Vec<Layer> = Vec::new();
    for path in paths {
        let slot = layers
            .iter_mut()
            .find(|l| l.color.distance(path.color) <= max_distance);
        match slot {
            Some(layer) => layer.paths.push(path.clone()),
            None => {
                let index = layers.len();
                layers.push(Layer {
                    id: format!("layer-{index}"),
                    name: format!("Layer {}", index + 1),
                    color: path.color,
                    visible: true,
                    locked: false,
                    paths: vec![path.clone()],
                });
            }
        }
    }
    layers
}
