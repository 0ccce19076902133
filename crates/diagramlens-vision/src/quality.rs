// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Visual quality scoring: seven sub-metrics folded into a 0–100 composite.

use diagramlens_core::error::Result;
use diagramlens_core::types::{BasicMetrics, ImageDimensions, QualityLabel, QualityMetrics, round2};
use image::GrayImage;
use imageproc::filter::laplacian_filter;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use tracing::{debug, instrument, warn};

use crate::guard::guarded;
use crate::image::{DecodedImage, filters, geometry};
use crate::stats::Moments;

/// Floor applied to spectrum magnitudes before taking the log.
const SPECTRUM_EPSILON: f64 = 1e-12;

/// Gaussian sigmas used for the noise estimate.
const NOISE_SIGMAS: [f64; 3] = [1.0, 2.0, 3.0];

/// Resize factors used for the detail estimate.
const DETAIL_SCALES: [f32; 3] = [0.5, 1.0, 2.0];

/// Unrounded sub-metrics of one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubMetrics {
    pub blur: f64,
    pub contrast: f64,
    pub brightness: f64,
    pub noise: f64,
    pub sharpness: f64,
    pub edge_density: f64,
    pub detail: f64,
}

impl SubMetrics {
    /// Weighted composite in [0, 100], rounded half-to-even.
    ///
    /// Weights: blur 0.25, contrast 0.20, brightness 0.15, noise 0.15,
    /// sharpness 0.15, edge density 0.10. Every term is clipped to [0, 100]
    /// first; noise is inverted so that less noise scores higher.
    pub fn composite(&self) -> u8 {
        let clip = |v: f64| v.clamp(0.0, 100.0);
        let score = clip(self.blur / 100.0) * 0.25
            + clip(self.contrast) * 0.20
            + clip(self.brightness) * 0.15
            + (100.0 - clip(self.noise * 10.0)) * 0.15
            + clip(self.sharpness) * 0.15
            + clip(self.edge_density * 100.0) * 0.10;
        score.round_ties_even().clamp(0.0, 100.0) as u8
    }
}

/// Score the visual quality of a decoded image. Never fails: any internal
/// error yields [`QualityMetrics::fallback`].
pub fn analyze_quality(image: &DecodedImage) -> QualityMetrics {
    try_analyze_quality(image).unwrap_or_else(|err| {
        warn!(error = %err, "Quality analysis failed; using fallback metrics");
        QualityMetrics::fallback()
    })
}

/// Like [`analyze_quality`] but reports the failure instead of falling back.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn try_analyze_quality(image: &DecodedImage) -> Result<QualityMetrics> {
    guarded("quality", || {
        let metrics = measure(image);
        let overall_quality = metrics.composite();
        debug!(?metrics, overall_quality, "Quality sub-metrics computed");

        Ok(QualityMetrics {
            basic: BasicMetrics::from_dimensions(ImageDimensions::new(image.width(), image.height())),
            overall_quality,
            quality_label: QualityLabel::from_score(overall_quality),
            blur: round2(metrics.blur),
            contrast: round2(metrics.contrast),
            brightness: round2(metrics.brightness),
            noise: round2(metrics.noise),
            sharpness: round2(metrics.sharpness),
            edge_density: round2(metrics.edge_density),
            detail: round2(metrics.detail),
        })
    })
}

/// Compute every sub-metric.
pub fn measure(image: &DecodedImage) -> SubMetrics {
    let gray = image.gray();
    SubMetrics {
        blur: blur(gray),
        contrast: contrast(gray),
        brightness: brightness(image),
        noise: noise(gray),
        sharpness: sharpness(gray),
        edge_density: geometry::edge_density(gray, 100.0, 200.0),
        detail: detail(gray),
    }
}

/// Mean of the Laplacian variance and the mean log-magnitude spectrum.
pub fn blur(gray: &GrayImage) -> f64 {
    let laplacian: Moments = laplacian_filter(gray)
        .pixels()
        .map(|p| p.0[0] as f64)
        .collect();
    (laplacian.variance() + mean_log_spectrum(gray)) / 2.0
}

/// Mean of `20·ln|F|` over the 2-D discrete Fourier transform.
fn mean_log_spectrum(gray: &GrayImage) -> f64 {
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    if width == 0 || height == 0 {
        return 0.0;
    }

    let mut data: Vec<Complex<f64>> = gray
        .pixels()
        .map(|p| Complex::new(p.0[0] as f64, 0.0))
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft_forward(width);
    for row in data.chunks_exact_mut(width) {
        row_fft.process(row);
    }

    let column_fft = planner.plan_fft_forward(height);
    let mut column = vec![Complex::new(0.0, 0.0); height];
    for x in 0..width {
        for y in 0..height {
            column[y] = data[y * width + x];
        }
        column_fft.process(&mut column);
        for y in 0..height {
            data[y * width + x] = column[y];
        }
    }

    let total: f64 = data
        .iter()
        .map(|c| 20.0 * c.norm().max(SPECTRUM_EPSILON).ln())
        .sum();
    total / data.len() as f64
}

/// Mean of the standard deviation and RMS contrast of the grayscale view.
pub fn contrast(gray: &GrayImage) -> f64 {
    let moments: Moments = gray.pixels().map(|p| p.0[0] as f64).collect();
    let std_contrast = moments.std_dev();
    let rms_contrast = moments.variance().sqrt();
    (std_contrast + rms_contrast) / 2.0
}

/// Mean HSV value, i.e. the mean of `max(R, G, B)`.
pub fn brightness(image: &DecodedImage) -> f64 {
    if !image.is_color() {
        let moments: Moments = image.gray().pixels().map(|p| p.0[0] as f64).collect();
        return moments.mean();
    }
    let moments: Moments = image
        .to_rgb()
        .pixels()
        .map(|p| p.0.into_iter().max().unwrap_or(0) as f64)
        .collect();
    moments.mean()
}

/// Mean over σ ∈ {1, 2, 3} of the standard deviation of the signed difference
/// between a 3x3 Gaussian blur and the original.
pub fn noise(gray: &GrayImage) -> f64 {
    let total: f64 = NOISE_SIGMAS
        .iter()
        .map(|&sigma| {
            let blurred = gaussian_3x3(gray, sigma);
            let diff: Moments = blurred
                .iter()
                .zip(gray.pixels())
                .map(|(&b, p)| b - p.0[0] as f64)
                .collect();
            diff.std_dev()
        })
        .sum();
    total / NOISE_SIGMAS.len() as f64
}

/// Separable 3x3 Gaussian blur with reflected borders, rounded to 8-bit
/// levels like a `u8` output buffer.
fn gaussian_3x3(gray: &GrayImage, sigma: f64) -> Vec<f64> {
    let (width, height) = (gray.width() as i64, gray.height() as i64);
    let side = (-1.0 / (2.0 * sigma * sigma)).exp();
    let norm = 1.0 + 2.0 * side;
    let weights = [side / norm, 1.0 / norm, side / norm];

    let reflect = |i: i64, n: i64| -> u32 {
        if n == 1 {
            0
        } else if i < 0 {
            (-i) as u32
        } else if i >= n {
            (2 * n - 2 - i) as u32
        } else {
            i as u32
        }
    };

    let mut horizontal = vec![0.0f64; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in weights.iter().enumerate() {
                let sx = reflect(x + k as i64 - 1, width);
                acc += w * gray.get_pixel(sx, y as u32).0[0] as f64;
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    let mut out = vec![0.0f64; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in weights.iter().enumerate() {
                let sy = reflect(y + k as i64 - 1, height) as i64;
                acc += w * horizontal[(sy * width + x) as usize];
            }
            out[(y * width + x) as usize] = acc.round().clamp(0.0, 255.0);
        }
    }
    out
}

/// Mean Sobel gradient magnitude.
pub fn sharpness(gray: &GrayImage) -> f64 {
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);
    let moments: Moments = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(dx, dy)| (dx.0[0] as f64).hypot(dy.0[0] as f64))
        .collect();
    moments.mean()
}

/// Mean pixel standard deviation at several resize factors.
pub fn detail(gray: &GrayImage) -> f64 {
    let total: f64 = DETAIL_SCALES
        .iter()
        .map(|&factor| {
            let scaled = if factor == 1.0 {
                gray.clone()
            } else {
                filters::rescale(gray, factor)
            };
            let moments: Moments = scaled.pixels().map(|p| p.0[0] as f64).collect();
            moments.std_dev()
        })
        .sum();
    total / DETAIL_SCALES.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Luma, Rgb, RgbImage};

    fn flat(value: u8) -> DecodedImage {
        DecodedImage::from_dynamic(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            64,
            48,
            Luma([value]),
        )))
    }

    fn checkerboard() -> DecodedImage {
        let gray = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if (x / 8 + y / 8) % 2 == 0 { 0 } else { 255 }])
        });
        DecodedImage::from_dynamic(DynamicImage::ImageLuma8(gray))
    }

    #[test]
    fn composite_weights() {
        let metrics = SubMetrics {
            blur: 10_000.0,
            contrast: 100.0,
            brightness: 100.0,
            noise: 0.0,
            sharpness: 100.0,
            edge_density: 1.0,
            detail: 0.0,
        };
        assert_eq!(metrics.composite(), 100);

        let zero = SubMetrics {
            blur: -50.0,
            contrast: 0.0,
            brightness: 0.0,
            noise: 50.0,
            sharpness: 0.0,
            edge_density: 0.0,
            detail: 0.0,
        };
        assert_eq!(zero.composite(), 0);
    }

    #[test]
    fn composite_rounds_half_to_even() {
        // 50 * 0.25 + 0 * ... + noise term 100 * 0.15 = 27.5 → 28 (even).
        let metrics = SubMetrics {
            blur: 5_000.0,
            contrast: 0.0,
            brightness: 0.0,
            noise: 0.0,
            sharpness: 0.0,
            edge_density: 0.0,
            detail: 0.0,
        };
        assert_eq!(metrics.composite(), 28);

        // 100 * 0.25 + 100 * 0.15 = 40 → contrast 12.5 * 0.2 adds 2.5 → 42.5 → 42.
        let metrics = SubMetrics {
            blur: 10_000.0,
            contrast: 12.5,
            ..metrics
        };
        assert_eq!(metrics.composite(), 42);
    }

    #[test]
    fn flat_image_has_no_contrast_or_noise() {
        let image = flat(200);
        let metrics = measure(&image);
        assert_eq!(metrics.contrast, 0.0);
        assert!(metrics.noise.abs() < 1e-9);
        assert_eq!(metrics.sharpness, 0.0);
        assert_eq!(metrics.edge_density, 0.0);
        assert!((metrics.brightness - 200.0).abs() < 1e-9);
        assert!(metrics.detail.abs() < 1e-9);
    }

    #[test]
    fn checkerboard_is_sharper_than_flat() {
        let sharp = measure(&checkerboard());
        let dull = measure(&flat(128));
        assert!(sharp.sharpness > dull.sharpness);
        assert!(sharp.contrast > 100.0);
        assert!(sharp.edge_density > 0.0);
        assert!(sharp.blur > dull.blur);
    }

    #[test]
    fn brightness_uses_max_channel() {
        let rgb = RgbImage::from_pixel(8, 8, Rgb([10, 200, 30]));
        let image = DecodedImage::from_dynamic(DynamicImage::ImageRgb8(rgb));
        assert!((brightness(&image) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn report_is_consistent() {
        let metrics = analyze_quality(&checkerboard());
        assert!(metrics.overall_quality <= 100);
        assert_eq!(
            metrics.quality_label,
            QualityLabel::from_score(metrics.overall_quality)
        );
        assert_eq!(metrics.basic.resolution, "64x64");
        assert_eq!(metrics.basic.dimensions.width, 64);
        assert!(!metrics.basic.is_vector);
        assert_eq!(metrics.blur, round2(metrics.blur));
    }

    #[test]
    fn deterministic() {
        let image = checkerboard();
        assert_eq!(analyze_quality(&image), analyze_quality(&image));
    }
}
