// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The seam between the fusion engine and whatever recognises characters.

use diagramlens_core::error::Result;
use image::GrayImage;

/// Confidence value a backend reports for layout rows that carry no text.
pub const NO_CONFIDENCE: f32 = -1.0;

/// Recognition settings for one OCR pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrProfile {
    /// Stable name used in logs.
    pub name: &'static str,
    /// Page segmentation mode (Tesseract numbering: 3 auto, 6 single block,
    /// 11 sparse text).
    pub page_segmentation: u8,
    /// Engine mode, when the profile pins one.
    pub engine_mode: Option<u8>,
    /// Restrict recognition to these characters.
    pub char_whitelist: Option<&'static str>,
}

/// Text recognised in one pass, with per-token confidences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// One entry per layout row; [`NO_CONFIDENCE`] marks rows without a
    /// confidence.
    pub token_confidences: Vec<f32>,
}

impl Recognition {
    /// Mean over non-sentinel confidences; 0 when there are none.
    pub fn mean_confidence(&self) -> f64 {
        let (sum, count) = self
            .token_confidences
            .iter()
            .filter(|&&c| c != NO_CONFIDENCE)
            .fold((0.0f64, 0usize), |(sum, count), &c| (sum + c as f64, count + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }
}

/// Result of one recognition pass, consumed uniformly by the fusion engine.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrOutcome {
    Success(Recognition),
    /// The pass ran but found no text.
    Empty,
    /// The pass could not run; the reason is logged and the pass skipped.
    Failure(String),
}

/// A text recogniser.
///
/// Implementations must be shareable across threads; one instance serves
/// every analysis for the life of the process.
pub trait OcrBackend: Send + Sync {
    /// Short backend name for logs and health reports.
    fn name(&self) -> &str;

    /// Recognise text in `image` using `profile`.
    fn recognize(&self, image: &GrayImage, profile: &OcrProfile) -> OcrOutcome;

    /// Check that the backend can run, returning a version or description.
    fn probe(&self) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_confidence_skips_sentinels() {
        let recognition = Recognition {
            text: "a b".into(),
            token_confidences: vec![-1.0, 90.0, -1.0, 70.0],
        };
        assert_eq!(recognition.mean_confidence(), 80.0);
    }

    #[test]
    fn mean_confidence_without_tokens_is_zero() {
        let recognition = Recognition {
            text: "x".into(),
            token_confidences: vec![-1.0, -1.0],
        };
        assert_eq!(recognition.mean_confidence(), 0.0);
        assert_eq!(Recognition::default().mean_confidence(), 0.0);
    }
}
