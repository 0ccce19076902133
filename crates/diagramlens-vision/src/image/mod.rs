// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Imaging primitives consumed by the analysis components.

pub mod decoded;
pub mod filters;
pub mod geometry;

pub use decoded::DecodedImage;
