// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mathematical symbol extraction.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use image::GrayImage;
use regex::Regex;
use tracing::{debug, instrument, warn};

use super::backend::{OcrBackend, OcrOutcome, OcrProfile};
use super::variants::symbol_variants;

/// Characters the whitelisted pass may emit.
pub const MATH_WHITELIST: &str = "0123456789+-*/()=<>≤≥∞∫∑√π{}[]^";

/// Profiles of the symbol path, in evaluation order.
pub const SYMBOL_PROFILES: [OcrProfile; 2] = [
    OcrProfile {
        name: "math_whitelist",
        page_segmentation: 6,
        engine_mode: Some(3),
        char_whitelist: Some(MATH_WHITELIST),
    },
    OcrProfile {
        name: "sparse",
        page_segmentation: 11,
        engine_mode: Some(3),
        char_whitelist: None,
    },
];

fn symbol_class() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[+\-*/=≠<>≤≥≈±∓×÷∞∂∫∬∭∮∇∆√∛∜∑∏π]").expect("static regex")
    })
}

fn fraction() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]+/[0-9]+").expect("static regex"))
}

fn exponent() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zA-Z]\^[0-9]").expect("static regex"))
}

/// Symbols found in one recognised text.
///
/// Every character of the symbol class is collected. On top of that, `=` is
/// recorded when some `=`-separated part mixes letters and digits, `/` when a
/// `digits/digits` fraction appears, and `^` when a `letter^digit` exponent
/// appears.
pub fn symbols_in_text(text: &str) -> BTreeSet<String> {
    let mut symbols: BTreeSet<String> = symbol_class()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect();

    if text.contains('=')
        && text.split('=').any(|part| {
            part.chars().any(|c| c.is_ascii_alphabetic()) && part.chars().any(|c| c.is_ascii_digit())
        })
    {
        symbols.insert("=".into());
    }
    if fraction().is_match(text) {
        symbols.insert("/".into());
    }
    if exponent().is_match(text) {
        symbols.insert("^".into());
    }
    symbols
}

/// Union of the symbols found over the variant × profile sweep.
#[instrument(skip_all, fields(backend = backend.name()))]
pub fn collect_symbols(backend: &dyn OcrBackend, gray: &GrayImage) -> BTreeSet<String> {
    let mut symbols = BTreeSet::new();
    for variant in symbol_variants(gray) {
        for profile in &SYMBOL_PROFILES {
            match backend.recognize(&variant.image, profile) {
                OcrOutcome::Success(recognition) => {
                    let found = symbols_in_text(&recognition.text);
                    debug!(
                        variant = variant.name,
                        profile = profile.name,
                        found = found.len(),
                        "Symbol pass complete"
                    );
                    symbols.extend(found);
                }
                OcrOutcome::Empty => {}
                OcrOutcome::Failure(reason) => {
                    warn!(
                        variant = variant.name,
                        profile = profile.name,
                        %reason,
                        "Symbol pass failed; skipping"
                    );
                }
            }
        }
    }
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::backend::Recognition;
    use diagramlens_core::error::Result;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn fraction_yields_slash() {
        assert_eq!(symbols_in_text("3/4"), set(&["/"]));
    }

    #[test]
    fn exponent_yields_caret() {
        assert_eq!(symbols_in_text("x^2"), set(&["^"]));
    }

    #[test]
    fn equation_yields_equals() {
        assert_eq!(symbols_in_text("y = 5"), set(&["="]));
        assert_eq!(symbols_in_text("x1 = y"), set(&["="]));
    }

    #[test]
    fn unicode_operators() {
        assert_eq!(
            symbols_in_text("∑ a ≤ ∞ and √2 × π"),
            set(&["√", "∑", "∞", "≤", "×", "π"])
        );
    }

    #[test]
    fn static_patterns_compile() {
        assert!(symbol_class().is_match("√"));
        assert!(fraction().is_match("12/7"));
        assert!(exponent().is_match("x^2"));
    }

    #[test]
    fn plain_text_has_no_symbols() {
        assert!(symbols_in_text("Quarterly revenue").is_empty());
        assert!(symbols_in_text("").is_empty());
    }

    /// Returns the same text for every pass.
    struct Constant(&'static str);

    impl OcrBackend for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn recognize(&self, _image: &GrayImage, profile: &OcrProfile) -> OcrOutcome {
            if profile.char_whitelist.is_some() {
                OcrOutcome::Failure("whitelist unsupported".into())
            } else {
                OcrOutcome::Success(Recognition {
                    text: self.0.into(),
                    token_confidences: Vec::new(),
                })
            }
        }

        fn probe(&self) -> Result<String> {
            Ok("constant".into())
        }
    }

    #[test]
    fn sweep_unions_and_skips_failures() {
        let symbols = collect_symbols(&Constant("a+b = c2"), &GrayImage::new(12, 12));
        assert_eq!(symbols, set(&["+", "="]));
    }
}
