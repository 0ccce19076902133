// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// DiagramLens core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod diagram;
pub mod error;
pub mod types;

pub use config::{AnalysisConfig, OcrBackendConfig, PreprocessStep};
pub use diagram::*;
pub use error::DiagramLensError;
pub use types::*;
