// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis orchestrator.
//
// Runs every component over one decoded buffer and assembles the report.
// Components substitute their own fallbacks; the orchestrator only records
// which ones did, and surfaces input errors (empty file, unknown extension,
// undecodable bytes) next to a structurally complete report.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use diagramlens_core::config::AnalysisConfig;
use diagramlens_core::diagram::{
    DiagramAnalysis, DiagramClassification, DiagramFeatures,
};
use diagramlens_core::error::{DiagramLensError, Result};
use diagramlens_core::types::{
    AnalysisId, AnalysisReport, ColorAnalysis, FileInfo, InputFormat, QualityMetrics,
};
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

use crate::color::try_analyze_colors;
use crate::diagram;
use crate::guard::guarded;
use crate::health::{HealthReport, health_check};
use crate::image::DecodedImage;
use crate::ocr::{OcrBackend, OcrEngine, collect_symbols, fuse_text};
use crate::quality::try_analyze_quality;
use crate::svg::extract_svg_text;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// An input-level failure, carried with the fallback report built for it.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct AnalysisFailure {
    pub error: DiagramLensError,
    pub report: Box<AnalysisReport>,
}

/// Runs the full analysis pipeline with one configuration and one OCR handle.
///
/// Shareable across threads; the OCR backend is constructed on first use.
pub struct Analyzer {
    config: AnalysisConfig,
    ocr: OcrEngine,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        let ocr = OcrEngine::new(config.ocr.clone());
        Self { config, ocr }
    }

    /// Use `backend` for every OCR pass instead of the configured one.
    pub fn with_ocr_backend(config: AnalysisConfig, backend: Arc<dyn OcrBackend>) -> Self {
        Self {
            config,
            ocr: OcrEngine::with_backend(backend),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn ocr(&self) -> &OcrEngine {
        &self.ocr
    }

    pub fn health_check(&self) -> HealthReport {
        health_check(&self.ocr)
    }

    // -- Components --------------------------------------------------------

    pub fn analyze_quality(&self, image: &DecodedImage) -> QualityMetrics {
        crate::quality::analyze_quality(image)
    }

    /// Best fused OCR text; empty when OCR is off or unavailable.
    pub fn extract_text(&self, image: &DecodedImage) -> String {
        text_with(&self.ocr, image).unwrap_or_default()
    }

    pub fn extract_math_symbols(&self, image: &DecodedImage) -> BTreeSet<String> {
        symbols_with(&self.ocr, image).unwrap_or_default()
    }

    pub fn classify_diagram(&self, image: &DecodedImage) -> DiagramClassification {
        diagram::classify_diagram(image)
    }

    pub fn extract_features(
        &self,
        image: &DecodedImage,
        classification: &DiagramClassification,
    ) -> DiagramFeatures {
        diagram::extract_features(image, classification)
    }

    // -- Entry points --------------------------------------------------------

    /// Read and analyse the file at `path`.
    pub fn analyze_path(
        &self,
        path: impl AsRef<Path>,
    ) -> std::result::Result<AnalysisReport, AnalysisFailure> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match std::fs::read(path) {
            Ok(bytes) => self.analyze_bytes(&name, &bytes),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Could not read input");
                Err(failure(file_info(&name, &[]), DiagramLensError::Io(err)))
            }
        }
    }

    /// Analyse `bytes`, identified by the extension of `name`.
    ///
    /// Returns `Err` only for input errors; the failure still carries a
    /// complete fallback report. Component failures produce `Ok` with
    /// `partial` set and `error` naming the first failure.
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    pub fn analyze_bytes(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> std::result::Result<AnalysisReport, AnalysisFailure> {
        let info = file_info(name, bytes);

        if bytes.is_empty() {
            return Err(failure(info, DiagramLensError::Validation("empty file".into())));
        }
        let Some(format) = info.format else {
            let error = DiagramLensError::Validation(format!("unsupported file type: {}", name));
            return Err(failure(info, error));
        };

        let report = if format.is_vector() {
            self.analyze_vector(info, bytes)
        } else {
            match DecodedImage::from_bytes(bytes) {
                Ok(image) => self.analyze_raster(info, &image),
                Err(err) => {
                    warn!(error = %err, "Input could not be decoded");
                    return Err(failure(info, err));
                }
            }
        };

        info!(
            id = %report.id,
            quality = report.quality.overall_quality,
            diagram_type = %report.diagram.classification.diagram_type,
            partial = report.partial,
            "Analysis complete"
        );
        Ok(report)
    }

    /// Analyse an already decoded raster image.
    pub fn analyze_image(&self, info: FileInfo, image: &DecodedImage) -> AnalysisReport {
        self.analyze_raster(info, image)
    }

    fn analyze_raster(&self, info: FileInfo, image: &DecodedImage) -> AnalysisReport {
        let mut failures = Failures::default();

        let quality = try_analyze_quality(image)
            .unwrap_or_else(|err| failures.record("quality", err, QualityMetrics::fallback()));

        let color_analysis = self.config.analyze_colors.then(|| {
            try_analyze_colors(image)
                .unwrap_or_else(|err| failures.record("colors", err, ColorAnalysis::fallback()))
        });

        let text = if self.config.extract_text && self.ocr.is_enabled() {
            text_with(&self.ocr, image).unwrap_or_else(|err| failures.record("text", err, String::new()))
        } else {
            String::new()
        };

        let symbols = if self.config.extract_symbols && self.ocr.is_enabled() {
            symbols_with(&self.ocr, image)
                .unwrap_or_else(|err| failures.record("symbols", err, BTreeSet::new()))
        } else {
            BTreeSet::new()
        };

        let diagram = if self.config.classify_diagrams {
            let analysis = diagram::analyze_diagram(image);
            if let Some(message) = &analysis.features.error {
                failures.note("diagram", message.clone());
            }
            analysis
        } else {
            DiagramAnalysis::skipped()
        };

        failures.into_report(info, quality, color_analysis, text, symbols, diagram)
    }

    fn analyze_vector(&self, info: FileInfo, bytes: &[u8]) -> AnalysisReport {
        let mut failures = Failures::default();

        let text = if self.config.extract_text {
            std::str::from_utf8(bytes)
                .map_err(|err| DiagramLensError::Markup(format!("SVG is not UTF-8: {}", err)))
                .and_then(extract_svg_text)
                .unwrap_or_else(|err| failures.record("text", err, String::new()))
        } else {
            String::new()
        };

        failures.into_report(
            info,
            QualityMetrics::vector(),
            None,
            text,
            BTreeSet::new(),
            DiagramAnalysis::skipped(),
        )
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

/// Component failures seen while assembling one report.
#[derive(Default)]
struct Failures(Vec<String>);

impl Failures {
    fn record<T>(&mut self, component: &str, err: DiagramLensError, fallback: T) -> T {
        warn!(component, error = %err, "Component failed; using fallback");
        self.0.push(format!("{}: {}", component, err));
        fallback
    }

    fn note(&mut self, component: &str, message: String) {
        warn!(component, error = %message, "Component failed; using fallback");
        self.0.push(format!("{}: {}", component, message));
    }

    fn into_report(
        self,
        file_info: FileInfo,
        quality: QualityMetrics,
        color_analysis: Option<ColorAnalysis>,
        text: String,
        symbols: BTreeSet<String>,
        diagram: DiagramAnalysis,
    ) -> AnalysisReport {
        AnalysisReport {
            id: AnalysisId::new(),
            analyzed_at: Utc::now(),
            file_info,
            quality,
            color_analysis,
            text,
            symbols,
            diagram,
            partial: !self.0.is_empty(),
            error: self.0.into_iter().next(),
        }
    }
}

fn failure(info: FileInfo, error: DiagramLensError) -> AnalysisFailure {
    let report = AnalysisReport {
        id: AnalysisId::new(),
        analyzed_at: Utc::now(),
        quality: if info.is_vector {
            QualityMetrics::vector()
        } else {
            QualityMetrics::fallback()
        },
        file_info: info,
        color_analysis: None,
        text: String::new(),
        symbols: BTreeSet::new(),
        diagram: DiagramAnalysis::failed(error.to_string()),
        error: Some(error.to_string()),
        partial: true,
    };
    AnalysisFailure {
        error,
        report: Box::new(report),
    }
}

/// Name, size, detected format, and SHA-256 of `bytes`.
pub fn file_info(name: &str, bytes: &[u8]) -> FileInfo {
    let format = InputFormat::from_file_name(name);
    FileInfo {
        filename: name.to_string(),
        size_bytes: bytes.len() as u64,
        size_mb: bytes.len() as f64 / BYTES_PER_MB,
        format,
        is_vector: format.is_some_and(|f| f.is_vector()),
        sha256: hex::encode(Sha256::digest(bytes)),
    }
}

fn text_with(engine: &OcrEngine, image: &DecodedImage) -> Result<String> {
    if !engine.is_enabled() {
        return Ok(String::new());
    }
    let backend = engine.backend()?;
    guarded("text extraction", || Ok(fuse_text(backend, image.gray())))
}

fn symbols_with(engine: &OcrEngine, image: &DecodedImage) -> Result<BTreeSet<String>> {
    if !engine.is_enabled() {
        return Ok(BTreeSet::new());
    }
    let backend = engine.backend()?;
    guarded("symbol extraction", || Ok(collect_symbols(backend, image.gray())))
}

// -- Free functions over the default configuration ----------------------------

fn shared_engine() -> &'static OcrEngine {
    static ENGINE: OnceLock<OcrEngine> = OnceLock::new();
    ENGINE.get_or_init(OcrEngine::default)
}

/// Fused OCR text using the process-wide default backend.
pub fn extract_text(image: &DecodedImage) -> String {
    text_with(shared_engine(), image).unwrap_or_else(|err| {
        warn!(error = %err, "Text extraction failed");
        String::new()
    })
}

/// Math symbols using the process-wide default backend.
pub fn extract_math_symbols(image: &DecodedImage) -> BTreeSet<String> {
    symbols_with(shared_engine(), image).unwrap_or_else(|err| {
        warn!(error = %err, "Symbol extraction failed");
        BTreeSet::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrOutcome, OcrProfile, Recognition};
    use diagramlens_core::diagram::DiagramType;
    use diagramlens_core::types::QualityLabel;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use std::io::Cursor;

    /// Reads the same text from every pass.
    struct Fixed(&'static str);

    impl OcrBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &GrayImage, _profile: &OcrProfile) -> OcrOutcome {
            OcrOutcome::Success(Recognition {
                text: self.0.into(),
                token_confidences: vec![90.0],
            })
        }

        fn probe(&self) -> Result<String> {
            Ok("test".into())
        }
    }

    fn png(image: DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn bar_chart_png() -> Vec<u8> {
        let mut gray = GrayImage::from_pixel(400, 300, Luma([255]));
        for i in 0..4 {
            draw_filled_rect_mut(
                &mut gray,
                Rect::at(40 + i * 90, 50).of_size(40, 200),
                Luma([0]),
            );
        }
        png(DynamicImage::ImageLuma8(gray))
    }

    fn offline() -> Analyzer {
        Analyzer::new(AnalysisConfig::without_ocr())
    }

    #[test]
    fn file_info_hashes_and_sizes() {
        let info = file_info("chart.PNG", b"abc");
        assert_eq!(info.format, Some(InputFormat::Png));
        assert!(!info.is_vector);
        assert_eq!(info.size_bytes, 3);
        assert_eq!(
            info.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!((info.size_mb - 3.0 / BYTES_PER_MB).abs() < 1e-12);
    }

    #[test]
    fn empty_input_is_a_validation_error() {
        let failure = offline().analyze_bytes("chart.png", &[]).unwrap_err();
        assert!(matches!(failure.error, DiagramLensError::Validation(_)));
        assert!(failure.report.partial);
        assert_eq!(failure.report.quality, QualityMetrics::fallback());
        assert_eq!(
            failure.report.diagram.classification.diagram_type,
            DiagramType::Unknown
        );
    }

    #[test]
    fn unknown_extension_is_a_validation_error() {
        let failure = offline().analyze_bytes("notes.pdf", b"%PDF-1.7").unwrap_err();
        assert!(matches!(failure.error, DiagramLensError::Validation(_)));
        assert_eq!(failure.report.file_info.format, None);
    }

    #[test]
    fn undecodable_raster_is_a_decode_error() {
        let failure = offline().analyze_bytes("chart.png", b"not a png").unwrap_err();
        assert!(matches!(failure.error, DiagramLensError::Decode(_)));
        assert!(failure.report.error.is_some());
    }

    #[test]
    fn raster_report_is_complete() {
        let report = offline().analyze_bytes("bars.png", &bar_chart_png()).unwrap();
        assert!(!report.partial);
        assert!(report.error.is_none());
        assert!(report.text.is_empty());
        assert!(report.symbols.is_empty());
        assert_eq!(report.quality.basic.resolution, "400x300");
        assert_eq!(
            report.diagram.classification.diagram_type,
            DiagramType::BarChart
        );
        assert!(report.diagram.features.general.is_some());
        // Grayscale input still gets a colour analysis when enabled.
        assert!(report.color_analysis.is_some());
    }

    #[test]
    fn toggles_skip_components() {
        let config = AnalysisConfig {
            analyze_colors: false,
            classify_diagrams: false,
            ..AnalysisConfig::without_ocr()
        };
        let report = Analyzer::new(config)
            .analyze_bytes("bars.png", &bar_chart_png())
            .unwrap();
        assert!(report.color_analysis.is_none());
        assert_eq!(report.diagram, DiagramAnalysis::skipped());
        assert!(!report.partial);
    }

    #[test]
    fn ocr_runs_through_the_engine() {
        let analyzer = Analyzer::with_ocr_backend(AnalysisConfig::default(), Arc::new(Fixed("y = 2x + 1")));
        let image = DecodedImage::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            64,
            64,
            image::Rgb([255, 255, 255]),
        )));
        assert_eq!(analyzer.extract_text(&image), "y = 2x + 1");
        let symbols = analyzer.extract_math_symbols(&image);
        assert!(symbols.contains("="));
        assert!(symbols.contains("+"));
    }

    #[test]
    fn unavailable_ocr_marks_report_partial() {
        let mut config = AnalysisConfig::default();
        config.ocr = diagramlens_core::config::OcrBackendConfig::Tesseract {
            binary: "/nonexistent/tesseract-binary".into(),
            language: "eng".into(),
        };
        let report = Analyzer::new(config)
            .analyze_bytes("bars.png", &bar_chart_png())
            .unwrap();
        assert!(report.partial);
        assert!(report.text.is_empty());
        assert!(report.error.as_deref().is_some_and(|e| e.starts_with("text:")));
        // Everything else still ran.
        assert_eq!(
            report.diagram.classification.diagram_type,
            DiagramType::BarChart
        );
        assert_ne!(report.quality, QualityMetrics::fallback());
    }

    #[test]
    fn svg_uses_vector_path() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><text>A + B</text></svg>"#;
        let report = offline().analyze_bytes("figure.svg", svg).unwrap();
        assert!(report.file_info.is_vector);
        assert_eq!(report.quality, QualityMetrics::vector());
        assert_eq!(report.quality.quality_label, QualityLabel::High);
        assert_eq!(report.text, "A + B");
        assert!(report.symbols.is_empty());
        assert_eq!(report.diagram, DiagramAnalysis::skipped());
        assert!(report.color_analysis.is_none());
    }

    #[test]
    fn malformed_svg_is_partial() {
        let report = offline()
            .analyze_bytes("figure.svg", b"<svg><text>open</svg>")
            .unwrap();
        assert!(report.partial);
        assert!(report.text.is_empty());
        assert_eq!(report.quality, QualityMetrics::vector());
    }

    #[test]
    fn missing_path_is_an_io_error() {
        let failure = offline()
            .analyze_path("/nonexistent/diagram.png")
            .unwrap_err();
        assert!(matches!(failure.error, DiagramLensError::Io(_)));
        assert_eq!(failure.report.file_info.filename, "diagram.png");
    }
}
