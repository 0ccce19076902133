// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// diagramlens-vision: image analysis for DiagramLens.
//
// Provides visual quality scoring, colour analysis, fused OCR (text and math
// symbols), rule-based diagram classification, structural feature extraction,
// diagram preprocessing, and the `Analyzer` that assembles one report per
// image.

pub mod analyzer;
pub mod color;
pub mod diagram;
pub(crate) mod guard;
pub mod health;
pub mod image;
pub mod ocr;
pub mod preprocess;
pub mod quality;
pub(crate) mod stats;
pub mod svg;

// Re-export the primary entry points so callers can use
// `diagramlens_vision::Analyzer` etc.
pub use analyzer::{AnalysisFailure, Analyzer, extract_math_symbols, extract_text, file_info};
pub use color::analyze_colors;
pub use diagram::{analyze_diagram, classify_diagram, extract_features};
pub use health::{HealthReport, HealthStatus, health_check};
pub use image::DecodedImage;
pub use ocr::{OcrBackend, OcrEngine};
pub use preprocess::DiagramPreprocessor;
pub use quality::analyze_quality;
pub use svg::extract_svg_text;
