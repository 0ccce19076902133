// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process OCR backend built on the `ocrs` crate (neural models run by
// `rten`). Only compiled with the `ocr` feature.
//
// The engine needs two model files, `text-detection.rten` and
// `text-recognition.rten`. Running `ocrs-cli` once downloads them to
// `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`), which is where they are
// looked up when no directory is configured.
//
// `ocrs` reports no per-token confidences, so every pass scores as zero in the
// fusion engine and the first non-empty candidate wins.

use std::path::{Path, PathBuf};

use diagramlens_core::error::{DiagramLensError, Result};
use image::GrayImage;
use ocrs::{ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use super::backend::{OcrBackend, OcrOutcome, OcrProfile, Recognition};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// `ocrs` engine with its models loaded.
pub struct OcrsBackend {
    engine: OcrsEngine,
    model_dir: PathBuf,
}

impl OcrsBackend {
    /// Load both models from `model_dir` (or the default cache directory).
    ///
    /// Model loading is the expensive step; the engine keeps one instance
    /// for the life of the process.
    #[instrument(skip_all)]
    pub fn load(model_dir: Option<&Path>) -> Result<Self> {
        let model_dir = model_dir.map(Path::to_path_buf).unwrap_or_else(default_model_dir);
        let detection_path = model_dir.join(DETECTION_MODEL_FILENAME);
        let recognition_path = model_dir.join(RECOGNITION_MODEL_FILENAME);

        for path in [&detection_path, &recognition_path] {
            if !path.exists() {
                return Err(DiagramLensError::OcrUnavailable(format!(
                    "model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }

        info!(dir = %model_dir.display(), "Loading OCR models");
        let detection_model = Model::load_file(&detection_path).map_err(|err| {
            DiagramLensError::OcrUnavailable(format!(
                "failed to load detection model from {}: {}",
                detection_path.display(),
                err
            ))
        })?;
        let recognition_model = Model::load_file(&recognition_path).map_err(|err| {
            DiagramLensError::OcrUnavailable(format!(
                "failed to load recognition model from {}: {}",
                recognition_path.display(),
                err
            ))
        })?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            ..Default::default()
        })
        .map_err(|err| {
            DiagramLensError::OcrUnavailable(format!("failed to initialise OCR engine: {}", err))
        })?;

        Ok(Self { engine, model_dir })
    }

    fn run(&self, image: &GrayImage) -> Result<String> {
        let rgb = image::DynamicImage::ImageLuma8(image.clone()).to_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            DiagramLensError::Ocr(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| DiagramLensError::Ocr(format!("OCR preprocessing failed: {}", err)))?;
        self.engine
            .get_text(&input)
            .map_err(|err| DiagramLensError::Ocr(format!("OCR text recognition failed: {}", err)))
    }
}

impl OcrBackend for OcrsBackend {
    fn name(&self) -> &str {
        "ocrs"
    }

    /// `ocrs` has no segmentation modes or whitelists; the profile only labels
    /// the pass.
    #[instrument(skip(self, image, profile), fields(profile = profile.name))]
    fn recognize(&self, image: &GrayImage, profile: &OcrProfile) -> OcrOutcome {
        match self.run(image) {
            Ok(text) if text.trim().is_empty() => OcrOutcome::Empty,
            Ok(text) => {
                debug!(line_count = text.lines().count(), "ocrs pass complete");
                OcrOutcome::Success(Recognition {
                    text,
                    token_confidences: Vec::new(),
                })
            }
            Err(err) => OcrOutcome::Failure(err.to_string()),
        }
    }

    fn probe(&self) -> Result<String> {
        Ok(format!("ocrs (models in {})", self.model_dir.display()))
    }
}
