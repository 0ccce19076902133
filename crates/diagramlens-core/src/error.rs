// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for DiagramLens.

use thiserror::Error;

/// Top-level error type for all DiagramLens operations.
///
/// Analysis components never hand these to their callers directly; they log
/// the error and substitute a documented fallback. Only the orchestrator
/// surfaces one, next to a complete (degraded) report.
#[derive(Debug, Error)]
pub enum DiagramLensError {
    // -- Input errors --
    #[error("image could not be decoded: {0}")]
    Decode(String),

    #[error("invalid input: {0}")]
    Validation(String),

    // -- Analysis errors --
    #[error("image primitive failed: {0}")]
    Primitive(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("vector markup could not be parsed: {0}")]
    Markup(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DiagramLensError {
    /// Whether the error is caused by the caller's input rather than the
    /// analysis machinery.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Validation(_))
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DiagramLensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_classified() {
        assert!(DiagramLensError::Validation("empty file".into()).is_input_error());
        assert!(DiagramLensError::Decode("truncated".into()).is_input_error());
        assert!(!DiagramLensError::Primitive("canny".into()).is_input_error());
        assert!(!DiagramLensError::Ocr("tesseract".into()).is_input_error());
    }

    #[test]
    fn display_includes_detail() {
        let err = DiagramLensError::Decode("truncated PNG".into());
        assert_eq!(err.to_string(), "image could not be decoded: truncated PNG");
    }
}
