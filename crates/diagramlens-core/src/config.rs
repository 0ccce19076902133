// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analysis configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DiagramLensError, Result};

/// Which OCR engine backs the text and symbol passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum OcrBackendConfig {
    /// Shell out to the `tesseract` command-line tool (TSV output).
    Tesseract {
        /// Binary name or absolute path.
        binary: PathBuf,
        /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
        language: String,
    },
    /// In-process `ocrs` engine (requires the `ocr` feature).
    Ocrs {
        /// Directory holding `text-detection.rten` and `text-recognition.rten`.
        /// `None` means the default model cache directory.
        model_dir: Option<PathBuf>,
    },
    /// No OCR: text is always empty and the symbol set always empty.
    Disabled,
}

impl Default for OcrBackendConfig {
    fn default() -> Self {
        Self::Tesseract {
            binary: PathBuf::from("tesseract"),
            language: "eng".into(),
        }
    }
}

/// One step of the optional diagram preprocessing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessStep {
    Denoise,
    EnhanceContrast,
    Sharpen,
    AutoStraighten,
    CleanBackground,
}

impl PreprocessStep {
    /// Pipeline applied when the caller does not choose steps.
    pub const DEFAULT_PIPELINE: [PreprocessStep; 3] = [
        PreprocessStep::Denoise,
        PreprocessStep::EnhanceContrast,
        PreprocessStep::AutoStraighten,
    ];

    /// Parse a step from its snake_case name (as used on the command line).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "denoise" => Some(Self::Denoise),
            "enhance_contrast" | "contrast" => Some(Self::EnhanceContrast),
            "sharpen" => Some(Self::Sharpen),
            "auto_straighten" | "straighten" => Some(Self::AutoStraighten),
            "clean_background" => Some(Self::CleanBackground),
            _ => None,
        }
    }
}

/// Settings for one `Analyzer` instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// OCR engine selection.
    pub ocr: OcrBackendConfig,
    /// Run the fused text-extraction sweep.
    pub extract_text: bool,
    /// Run the math-symbol sweep.
    pub extract_symbols: bool,
    /// Run diagram classification and feature extraction.
    pub classify_diagrams: bool,
    /// Run the colour-distribution analysis.
    pub analyze_colors: bool,
    /// Steps used by `preprocess` when none are given explicitly.
    pub preprocess_steps: Vec<PreprocessStep>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ocr: OcrBackendConfig::default(),
            extract_text: true,
            extract_symbols: true,
            classify_diagrams: true,
            analyze_colors: true,
            preprocess_steps: PreprocessStep::DEFAULT_PIPELINE.to_vec(),
        }
    }
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file. Missing fields take their
    /// default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|err| {
            DiagramLensError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        let config = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// A configuration with every OCR stage switched off.
    pub fn without_ocr() -> Self {
        Self {
            ocr: OcrBackendConfig::Disabled,
            extract_text: false,
            extract_symbols: false,
            ..Self::default()
        }
    }
}
