// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types: input formats, quality metrics, colour analysis, and the
// assembled analysis report.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diagram::DiagramAnalysis;

/// Unique identifier for one analysis request (log correlation only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisId(pub Uuid);

impl AnalysisId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    Webp,
    /// Scalable Vector Graphics; bypasses every pixel-based component.
    Svg,
}

impl InputFormat {
    /// Infer the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "bmp" => Some(Self::Bmp),
            "tif" | "tiff" => Some(Self::Tiff),
            "webp" => Some(Self::Webp),
            "svg" => Some(Self::Svg),
            _ => None,
        }
    }

    /// Infer the format from a file name or path.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
            Self::Webp => "image/webp",
            Self::Svg => "image/svg+xml",
        }
    }

    /// Whether the format is vector markup rather than a pixel grid.
    pub fn is_vector(&self) -> bool {
        matches!(self, Self::Svg)
    }
}

// -- Quality -----------------------------------------------------------------

/// Three-tier quality rating derived from `overall_quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLabel {
    Low,
    Medium,
    High,
}

impl QualityLabel {
    /// ≥80 → High, ≥50 → Medium, otherwise Low.
    pub fn from_score(score: u8) -> Self {
        if score >= 80 {
            Self::High
        } else if score >= 50 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        })
    }
}

/// Pixel dimensions of the analysed image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    pub megapixels: f64,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            megapixels: (width as f64 * height as f64) / 1_000_000.0,
        }
    }
}

/// Size information reported alongside the quality scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicMetrics {
    /// `"{width}x{height}"`.
    pub resolution: String,
    pub aspect_ratio: f64,
    pub dimensions: ImageDimensions,
    /// `true` when the dimensions are a nominal display size, not pixels.
    pub is_vector: bool,
}

impl BasicMetrics {
    pub fn from_dimensions(dimensions: ImageDimensions) -> Self {
        let aspect_ratio = if dimensions.height == 0 {
            0.0
        } else {
            round2(dimensions.width as f64 / dimensions.height as f64)
        };
        Self {
            resolution: format!("{}x{}", dimensions.width, dimensions.height),
            aspect_ratio,
            dimensions,
            is_vector: false,
        }
    }
}

/// The seven quality sub-metrics and their composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub basic: BasicMetrics,
    /// Weighted composite in [0, 100].
    pub overall_quality: u8,
    /// Always `QualityLabel::from_score(overall_quality)`.
    pub quality_label: QualityLabel,
    pub blur: f64,
    pub contrast: f64,
    pub brightness: f64,
    pub noise: f64,
    pub sharpness: f64,
    pub edge_density: f64,
    pub detail: f64,
}

impl QualityMetrics {
    /// Nominal display size reported for vector and fallback results.
    pub const NOMINAL_WIDTH: u32 = 800;
    pub const NOMINAL_HEIGHT: u32 = 600;

    /// Fixed "high quality" literal returned for vector input.
    pub fn vector() -> Self {
        let mut basic = BasicMetrics::from_dimensions(ImageDimensions {
            width: Self::NOMINAL_WIDTH,
            height: Self::NOMINAL_HEIGHT,
            megapixels: 0.0,
        });
        basic.is_vector = true;
        Self {
            basic,
            overall_quality: 90,
            quality_label: QualityLabel::from_score(90),
            blur: 100.0,
            contrast: 85.0,
            brightness: 85.0,
            noise: 0.0,
            sharpness: 100.0,
            edge_density: 0.7,
            detail: 90.0,
        }
    }

    /// Medium-quality literal returned when the image cannot be analysed.
    pub fn fallback() -> Self {
        Self {
            basic: BasicMetrics::from_dimensions(ImageDimensions::new(
                Self::NOMINAL_WIDTH,
                Self::NOMINAL_HEIGHT,
            )),
            overall_quality: 50,
            quality_label: QualityLabel::from_score(50),
            blur: 50.0,
            contrast: 50.0,
            brightness: 50.0,
            noise: 5.0,
            sharpness: 50.0,
            edge_density: 0.5,
            detail: 50.0,
        }
    }
}

// -- Colour ------------------------------------------------------------------

/// Absolute differences between channel means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorContrast {
    pub rg_contrast: f64,
    pub rb_contrast: f64,
    pub gb_contrast: f64,
}

/// Colour distribution statistics of a raster image.
///
/// HSV and Lab means use the 8-bit conventions of common CV libraries:
/// hue in [0, 180), saturation/value in [0, 255], L scaled to [0, 255] and
/// a/b offset by 128.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorAnalysis {
    pub mean_rgb: [f64; 3],
    pub std_rgb: [f64; 3],
    pub mean_hsv: [f64; 3],
    pub mean_lab: [f64; 3],
    pub saturation: f64,
    pub value_variance: f64,
    /// Up to three cluster centres, largest cluster first.
    pub dominant_colors: Vec<[u8; 3]>,
    pub color_contrast: ColorContrast,
}

impl ColorAnalysis {
    /// Neutral-grey literal returned when the image cannot be analysed.
    pub fn fallback() -> Self {
        Self {
            mean_rgb: [128.0, 128.0, 128.0],
            std_rgb: [50.0, 50.0, 50.0],
            mean_hsv: [0.0, 0.0, 128.0],
            mean_lab: [50.0, 0.0, 0.0],
            saturation: 0.0,
            value_variance: 0.0,
            dominant_colors: vec![[128, 128, 128], [0, 0, 0], [255, 255, 255]],
            color_contrast: ColorContrast {
                rg_contrast: 0.0,
                rb_contrast: 0.0,
                gb_contrast: 0.0,
            },
        }
    }
}

// -- Report ------------------------------------------------------------------

/// Metadata about the analysed file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub format: Option<InputFormat>,
    pub is_vector: bool,
    /// Hex-encoded SHA-256 of the raw bytes.
    pub sha256: String,
}

/// The assembled result of analysing one image.
///
/// Structurally complete even when analysis fails: failed components carry
/// their documented fallback values and `error` describes the first failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub id: AnalysisId,
    pub analyzed_at: DateTime<Utc>,
    pub file_info: FileInfo,
    pub quality: QualityMetrics,
    pub color_analysis: Option<ColorAnalysis>,
    pub text: String,
    pub symbols: BTreeSet<String>,
    pub diagram: DiagramAnalysis,
    pub error: Option<String>,
    /// `true` when at least one component fell back to defaults.
    pub partial: bool,
}

/// Round to two decimal places (reporting precision).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_thresholds() {
        assert_eq!(QualityLabel::from_score(100), QualityLabel::High);
        assert_eq!(QualityLabel::from_score(80), QualityLabel::High);
        assert_eq!(QualityLabel::from_score(79), QualityLabel::Medium);
        assert_eq!(QualityLabel::from_score(50), QualityLabel::Medium);
        assert_eq!(QualityLabel::from_score(49), QualityLabel::Low);
        assert_eq!(QualityLabel::from_score(0), QualityLabel::Low);
    }

    #[test]
    fn fallback_literal() {
        let q = QualityMetrics::fallback();
        assert_eq!(q.overall_quality, 50);
        assert_eq!(q.quality_label, QualityLabel::Medium);
        assert_eq!(q.noise, 5.0);
        assert_eq!(q.edge_density, 0.5);
        assert_eq!(q.basic.dimensions.width, 800);
        assert_eq!(q.basic.dimensions.height, 600);
        assert!((q.basic.dimensions.megapixels - 0.48).abs() < 1e-9);
        assert_eq!(q.basic.resolution, "800x600");
        assert!(!q.basic.is_vector);
    }

    #[test]
    fn vector_literal() {
        let q = QualityMetrics::vector();
        assert_eq!(q.overall_quality, 90);
        assert_eq!(q.quality_label, QualityLabel::High);
        assert_eq!(q.noise, 0.0);
        assert_eq!(q.edge_density, 0.7);
        assert_eq!(q.basic.dimensions.megapixels, 0.0);
        assert!(q.basic.is_vector);
    }

    #[test]
    fn formats_from_names() {
        assert_eq!(InputFormat::from_file_name("chart.PNG"), Some(InputFormat::Png));
        assert_eq!(InputFormat::from_file_name("a.b.jpeg"), Some(InputFormat::Jpeg));
        assert_eq!(InputFormat::from_file_name("figure.svg"), Some(InputFormat::Svg));
        assert_eq!(InputFormat::from_file_name("notes.pdf"), None);
        assert_eq!(InputFormat::from_file_name("README"), None);
        assert!(InputFormat::Svg.is_vector());
        assert!(!InputFormat::Tiff.is_vector());
    }

    #[test]
    fn basic_metrics_aspect_ratio() {
        let basic = BasicMetrics::from_dimensions(ImageDimensions::new(1920, 1080));
        assert_eq!(basic.resolution, "1920x1080");
        assert_eq!(basic.aspect_ratio, 1.78);
        assert!((basic.dimensions.megapixels - 2.0736).abs() < 1e-9);
    }
}
