// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-candidate text extraction: every variant is read with every profile,
// each reading is scored, and the best one wins.

use image::GrayImage;
use tracing::{debug, info, instrument, warn};

use super::backend::{OcrBackend, OcrOutcome, OcrProfile};
use super::variants::{Variant, text_variants};

/// Profiles of the text path, in evaluation order.
pub const TEXT_PROFILES: [OcrProfile; 3] = [
    OcrProfile {
        name: "single_block",
        page_segmentation: 6,
        engine_mode: None,
        char_whitelist: None,
    },
    OcrProfile {
        name: "auto",
        page_segmentation: 3,
        engine_mode: None,
        char_whitelist: None,
    },
    OcrProfile {
        name: "sparse",
        page_segmentation: 11,
        engine_mode: Some(3),
        char_whitelist: None,
    },
];

/// Length (non-whitespace characters) at which the length bonus saturates
/// relative to the base factor.
const LENGTH_SCALE: f64 = 300.0;
const MAX_LENGTH_BONUS: f64 = 1.5;
const SHORT_TOKEN_RATIO: f64 = 0.3;
const SHORT_TOKEN_BOOST: f64 = 1.2;

/// One scored reading.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrCandidate {
    pub variant: &'static str,
    pub profile: &'static str,
    pub text: String,
    pub mean_confidence: f64,
    pub score: f64,
}

/// `mean × (0.5 + min(len / 300, 1.5))`, boosted ×1.2 when more than 30 % of
/// the whitespace-delimited tokens are 2–4 characters long. `len` counts
/// non-whitespace characters.
pub fn score_text(text: &str, mean_confidence: f64) -> f64 {
    let length = text.chars().filter(|c| !c.is_whitespace()).count() as f64;
    let mut score = mean_confidence * (0.5 + (length / LENGTH_SCALE).min(MAX_LENGTH_BONUS));

    let tokens: Vec<&str> = text.split_whitespace().collect();
    let short = tokens
        .iter()
        .filter(|t| (2..=4).contains(&t.chars().count()))
        .count();
    if short > 0 && short as f64 / tokens.len().max(1) as f64 > SHORT_TOKEN_RATIO {
        score *= SHORT_TOKEN_BOOST;
    }
    score
}

/// Highest-scoring candidate; on an exact tie the earliest one is kept.
pub fn select_best(candidates: impl IntoIterator<Item = OcrCandidate>) -> Option<OcrCandidate> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(current) if candidate.score <= current.score => Some(current),
        _ => Some(candidate),
    })
}

/// Read every variant with every profile and return the scored candidates in
/// evaluation order. Failed and empty passes are skipped.
pub fn collect_candidates(
    backend: &dyn OcrBackend,
    variants: &[Variant],
    profiles: &[OcrProfile],
) -> Vec<OcrCandidate> {
    let mut candidates = Vec::new();
    for variant in variants {
        for profile in profiles {
            match backend.recognize(&variant.image, profile) {
                OcrOutcome::Success(recognition) => {
                    let text = recognition.text.trim();
                    if text.is_empty() {
                        continue;
                    }
                    let mean_confidence = recognition.mean_confidence();
                    let score = score_text(text, mean_confidence);
                    debug!(
                        variant = variant.name,
                        profile = profile.name,
                        mean_confidence,
                        score,
                        "OCR candidate scored"
                    );
                    candidates.push(OcrCandidate {
                        variant: variant.name,
                        profile: profile.name,
                        text: text.to_string(),
                        mean_confidence,
                        score,
                    });
                }
                OcrOutcome::Empty => {
                    debug!(variant = variant.name, profile = profile.name, "No text in pass");
                }
                OcrOutcome::Failure(reason) => {
                    warn!(
                        variant = variant.name,
                        profile = profile.name,
                        %reason,
                        "OCR pass failed; skipping"
                    );
                }
            }
        }
    }
    candidates
}

/// Best text over the full variant × profile sweep; empty when nothing was
/// read.
#[instrument(skip_all, fields(backend = backend.name()))]
pub fn fuse_text(backend: &dyn OcrBackend, gray: &GrayImage) -> String {
    let variants = text_variants(gray);
    let candidates = collect_candidates(backend, &variants, &TEXT_PROFILES);
    let total = candidates.len();
    match select_best(candidates) {
        Some(best) => {
            info!(
                variant = best.variant,
                profile = best.profile,
                score = best.score,
                candidates = total,
                "OCR text selected"
            );
            best.text
        }
        None => {
            debug!("No OCR candidate produced text");
            String::new()
        }
    }
}
