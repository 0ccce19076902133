// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR fusion: preprocessing variants × recognition profiles, scored and
// deterministically selected, plus the math-symbol sweep.

pub mod backend;
pub mod engine;
pub mod fusion;
#[cfg(feature = "ocr")]
pub mod ocrs_backend;
pub mod symbols;
pub mod tesseract;
pub mod variants;

pub use backend::{OcrBackend, OcrOutcome, OcrProfile, Recognition};
pub use engine::OcrEngine;
pub use fusion::{OcrCandidate, fuse_text};
pub use symbols::{collect_symbols, symbols_in_text};
pub use tesseract::TesseractBackend;
