// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Diagram understanding: geometric signals, type classification, and
// structural features.

pub mod classifier;
pub mod features;
pub mod signals;

pub use classifier::{classify_diagram, classify_signals, try_classify_diagram};
pub use features::{analyze_diagram, extract_features, try_extract_features};
pub use signals::extract_signals;
