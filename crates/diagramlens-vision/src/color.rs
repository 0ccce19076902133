// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour distribution analysis: channel statistics in RGB, HSV and Lab,
// dominant colours, and channel-pair contrast.

use diagramlens_core::error::{DiagramLensError, Result};
use diagramlens_core::types::{ColorAnalysis, ColorContrast, round2};
use image::RgbImage;
use tracing::{debug, instrument, warn};

use crate::guard::guarded;
use crate::image::DecodedImage;
use crate::stats::Moments;

/// Number of dominant colours reported.
const DOMINANT_COLORS: usize = 3;
/// Pixels sampled for clustering.
const MAX_CLUSTER_SAMPLES: usize = 10_000;
const KMEANS_MAX_ITERATIONS: usize = 200;
/// Stop once no centre moves further than this.
const KMEANS_EPSILON: f64 = 0.1;

/// Analyse the colour distribution. Never fails: any internal error yields
/// [`ColorAnalysis::fallback`].
pub fn analyze_colors(image: &DecodedImage) -> ColorAnalysis {
    try_analyze_colors(image).unwrap_or_else(|err| {
        warn!(error = %err, "Colour analysis failed; using fallback values");
        ColorAnalysis::fallback()
    })
}

/// Like [`analyze_colors`] but reports the failure instead of falling back.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn try_analyze_colors(image: &DecodedImage) -> Result<ColorAnalysis> {
    guarded("colour analysis", || {
        let rgb = image.to_rgb();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(DiagramLensError::Validation("image has no pixels".into()));
        }

        let mut channels = [Moments::default(); 3];
        let mut hsv = [Moments::default(); 3];
        let mut lab = [Moments::default(); 3];
        for pixel in rgb.pixels() {
            for (c, &value) in pixel.0.iter().enumerate() {
                channels[c].push(value as f64);
            }
            for (c, value) in rgb_to_hsv(pixel.0).into_iter().enumerate() {
                hsv[c].push(value);
            }
            for (c, value) in rgb_to_lab(pixel.0).into_iter().enumerate() {
                lab[c].push(value);
            }
        }

        let mean_rgb = channels.map(|m| round2(m.mean()));
        let [r, g, b] = channels.map(|m| m.mean());
        let dominant_colors = dominant_colors(&rgb, DOMINANT_COLORS);
        debug!(?dominant_colors, "Dominant colours clustered");

        Ok(ColorAnalysis {
            mean_rgb,
            std_rgb: channels.map(|m| round2(m.std_dev())),
            mean_hsv: hsv.map(|m| round2(m.mean())),
            mean_lab: lab.map(|m| round2(m.mean())),
            saturation: round2(hsv[1].mean()),
            value_variance: round2(hsv[2].variance()),
            dominant_colors,
            color_contrast: ColorContrast {
                rg_contrast: round2((r - g).abs()),
                rb_contrast: round2((r - b).abs()),
                gb_contrast: round2((g - b).abs()),
            },
        })
    })
}

/// 8-bit HSV: hue in [0, 180), saturation and value in [0, 255].
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [f64; 3] {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta / max * 255.0 } else { 0.0 };
    let hue_degrees = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    let hue_degrees = if hue_degrees < 0.0 { hue_degrees + 360.0 } else { hue_degrees };

    [(hue_degrees / 2.0).round() % 180.0, saturation.round(), max]
}

/// 8-bit CIE Lab (D65): L scaled to [0, 255], a and b offset by 128.
pub fn rgb_to_lab([r, g, b]: [u8; 3]) -> [f64; 3] {
    let linear = |v: u8| {
        let v = v as f64 / 255.0;
        if v <= 0.04045 {
            v / 12.92
        } else {
            ((v + 0.055) / 1.055).powf(2.4)
        }
    };
    let (r, g, b) = (linear(r), linear(g), linear(b));

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / 0.950456;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / 1.088754;

    let f = |t: f64| {
        if t > 0.008856 {
            t.cbrt()
        } else {
            7.787 * t + 16.0 / 116.0
        }
    };
    let lightness = if y > 0.008856 { 116.0 * y.cbrt() - 16.0 } else { 903.3 * y };
    let a = 500.0 * (f(x) - f(y));
    let b = 200.0 * (f(y) - f(z));

    [
        (lightness * 255.0 / 100.0).round().clamp(0.0, 255.0),
        (a + 128.0).round().clamp(0.0, 255.0),
        (b + 128.0).round().clamp(0.0, 255.0),
    ]
}

/// Deterministic k-means over a strided pixel sample.
///
/// Centres start at evenly spaced luminance quantiles of the sample; the result
/// is ordered by cluster size, largest first.
pub fn dominant_colors(rgb: &RgbImage, k: usize) -> Vec<[u8; 3]> {
    let total = rgb.width() as usize * rgb.height() as usize;
    if total == 0 || k == 0 {
        return Vec::new();
    }
    let stride = total.div_ceil(MAX_CLUSTER_SAMPLES).max(1);
    let samples: Vec<[f64; 3]> = rgb
        .pixels()
        .step_by(stride)
        .map(|p| p.0.map(|v| v as f64))
        .collect();

    let luminance = |c: &[f64; 3]| 0.299 * c[0] + 0.587 * c[1] + 0.114 * c[2];
    let mut by_luminance = samples.clone();
    by_luminance.sort_by(|a, b| luminance(a).total_cmp(&luminance(b)));
    let mut centres: Vec<[f64; 3]> = (0..k)
        .map(|i| by_luminance[((2 * i + 1) * by_luminance.len()) / (2 * k)])
        .collect();

    let mut assignment = vec![0usize; samples.len()];
    for _ in 0..KMEANS_MAX_ITERATIONS {
        for (slot, sample) in assignment.iter_mut().zip(&samples) {
            *slot = nearest(&centres, sample);
        }

        let mut sums = vec![[0.0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (&cluster, sample) in assignment.iter().zip(&samples) {
            counts[cluster] += 1;
            for c in 0..3 {
                sums[cluster][c] += sample[c];
            }
        }

        let mut max_shift = 0.0f64;
        for i in 0..k {
            if counts[i] == 0 {
                continue;
            }
            let updated = sums[i].map(|s| s / counts[i] as f64);
            max_shift = max_shift.max(distance_sq(&updated, &centres[i]).sqrt());
            centres[i] = updated;
        }
        if max_shift < KMEANS_EPSILON {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for sample in &samples {
        counts[nearest(&centres, sample)] += 1;
    }
    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| counts[b].cmp(&counts[a]).then(a.cmp(&b)));
    order
        .into_iter()
        .map(|i| centres[i].map(|v| v.round().clamp(0.0, 255.0) as u8))
        .collect()
}

fn nearest(centres: &[[f64; 3]], sample: &[f64; 3]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, centre) in centres.iter().enumerate() {
        let d = distance_sq(centre, sample);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}

fn distance_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (0..3).map(|c| (a[c] - b[c]).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb};

    #[test]
    fn hsv_conversion() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), [0.0, 255.0, 255.0]);
        assert_eq!(rgb_to_hsv([0, 255, 0]), [60.0, 255.0, 255.0]);
        assert_eq!(rgb_to_hsv([0, 0, 255]), [120.0, 255.0, 255.0]);
        assert_eq!(rgb_to_hsv([128, 128, 128]), [0.0, 0.0, 128.0]);
        assert_eq!(rgb_to_hsv([0, 0, 0]), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn lab_conversion_extremes() {
        assert_eq!(rgb_to_lab([255, 255, 255]), [255.0, 128.0, 128.0]);
        assert_eq!(rgb_to_lab([0, 0, 0]), [0.0, 128.0, 128.0]);
        let red = rgb_to_lab([255, 0, 0]);
        assert!(red[1] > 180.0, "red should have a strongly positive a: {red:?}");
    }

    #[test]
    fn dominant_colours_of_three_blocks() {
        let rgb = RgbImage::from_fn(90, 10, |x, _| match x / 30 {
            0 => Rgb([250, 10, 10]),
            1 => Rgb([10, 250, 10]),
            _ => Rgb([10, 10, 250]),
        });
        let colours = dominant_colors(&rgb, 3);
        assert_eq!(colours.len(), 3);
        for expected in [[250, 10, 10], [10, 250, 10], [10, 10, 250]] {
            assert!(colours.contains(&expected), "{colours:?}");
        }
    }

    #[test]
    fn dominant_colours_ordered_by_size() {
        let rgb = RgbImage::from_fn(100, 10, |x, _| {
            if x < 70 { Rgb([255, 255, 255]) } else { Rgb([0, 0, 0]) }
        });
        let colours = dominant_colors(&rgb, 3);
        assert_eq!(colours[0], [255, 255, 255]);
    }

    #[test]
    fn analysis_of_a_red_image() {
        let image = DecodedImage::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            16,
            16,
            Rgb([200, 40, 40]),
        )));
        let analysis = analyze_colors(&image);
        assert_eq!(analysis.mean_rgb, [200.0, 40.0, 40.0]);
        assert_eq!(analysis.std_rgb, [0.0, 0.0, 0.0]);
        assert_eq!(analysis.color_contrast.rg_contrast, 160.0);
        assert_eq!(analysis.color_contrast.gb_contrast, 0.0);
        assert_eq!(analysis.mean_hsv[2], 200.0);
        assert_eq!(analysis.value_variance, 0.0);
        assert!(analysis.saturation > 0.0);
    }
}
