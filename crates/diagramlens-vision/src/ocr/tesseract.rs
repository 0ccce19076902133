// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tesseract command-line backend.
//
// Each pass writes the variant to a temporary PNG, runs
// `tesseract <png> stdout -l <lang> --psm N [--oem M] [-c ...] tsv`, and reads
// words and confidences from the TSV report.

use std::path::{Path, PathBuf};
use std::process::Command;

use diagramlens_core::error::{DiagramLensError, Result};
use image::{GrayImage, ImageFormat};
use tracing::{debug, instrument};

use super::backend::{NO_CONFIDENCE, OcrBackend, OcrOutcome, OcrProfile, Recognition};

/// Tesseract CLI backend.
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    binary: PathBuf,
    language: String,
}

impl TesseractBackend {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, input: &Path, profile: &OcrProfile) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg(input)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(profile.page_segmentation.to_string());
        if let Some(mode) = profile.engine_mode {
            command.arg("--oem").arg(mode.to_string());
        }
        if let Some(whitelist) = profile.char_whitelist {
            command
                .arg("-c")
                .arg(format!("tessedit_char_whitelist={}", whitelist));
        }
        command.arg("tsv");
        command
    }

    fn run(&self, image: &GrayImage, profile: &OcrProfile) -> Result<Recognition> {
        let file = tempfile::Builder::new()
            .prefix("diagramlens-ocr-")
            .suffix(".png")
            .tempfile()?;
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .map_err(|err| DiagramLensError::Ocr(format!("failed to write OCR input: {}", err)))?;

        let output = self.command(file.path(), profile).output().map_err(|err| {
            DiagramLensError::Ocr(format!(
                "failed to run {} (is it installed?): {}",
                self.binary.display(),
                err
            ))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DiagramLensError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    #[instrument(skip(self, image, profile), fields(profile = profile.name))]
    fn recognize(&self, image: &GrayImage, profile: &OcrProfile) -> OcrOutcome {
        match self.run(image, profile) {
            Ok(recognition) if recognition.text.trim().is_empty() => OcrOutcome::Empty,
            Ok(recognition) => {
                debug!(
                    chars = recognition.text.len(),
                    tokens = recognition.token_confidences.len(),
                    "Tesseract pass complete"
                );
                OcrOutcome::Success(recognition)
            }
            Err(err) => OcrOutcome::Failure(err.to_string()),
        }
    }

    fn probe(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|err| {
                DiagramLensError::OcrUnavailable(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    err
                ))
            })?;
        if !output.status.success() {
            return Err(DiagramLensError::OcrUnavailable(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }
        // Older releases print the version on stderr.
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };
        Ok(text.lines().next().unwrap_or("tesseract").trim().to_string())
    }
}

/// Parse a Tesseract TSV report.
///
/// Every data row contributes its confidence (layout rows report `-1`). Word
/// rows are joined with spaces; a change of block, paragraph or line starts a
/// new output line.
pub fn parse_tsv(tsv: &str) -> Recognition {
    let mut recognition = Recognition::default();
    let mut current_line: Option<(&str, &str, &str)> = None;
    let mut line_words: Vec<&str> = Vec::new();
    let mut lines: Vec<String> = Vec::new();

    for row in tsv.lines().skip(1) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 11 {
            continue;
        }
        let confidence = fields[10].trim().parse::<f32>().unwrap_or(NO_CONFIDENCE);
        recognition.token_confidences.push(confidence);

        if fields[0].trim() != "5" {
            continue;
        }
        let word = fields.get(11).map(|w| w.trim()).unwrap_or("");
        if word.is_empty() {
            continue;
        }
        let key = (fields[2], fields[3], fields[4]);
        if current_line.is_some_and(|k| k != key) && !line_words.is_empty() {
            lines.push(line_words.join(" "));
            line_words.clear();
        }
        current_line = Some(key);
        line_words.push(word);
    }
    if !line_words.is_empty() {
        lines.push(line_words.join(" "));
    }

    recognition.text = lines.join("\n");
    recognition
}
