// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Panic containment for components built on imaging primitives.

use std::panic::{AssertUnwindSafe, catch_unwind};

use diagramlens_core::error::{DiagramLensError, Result};

/// Run `f`, turning a panic inside it into `DiagramLensError::Primitive`.
///
/// Primitives may assert on degenerate input (e.g. zero-sized kernels); the
/// analysis components treat such panics like any other component failure.
pub(crate) fn guarded<T>(component: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            Err(DiagramLensError::Primitive(format!(
                "{} panicked: {}",
                component, message
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_results_through() {
        assert_eq!(guarded("ok", || Ok(3)).unwrap(), 3);
        let err = guarded::<()>("err", || Err(DiagramLensError::Ocr("x".into()))).unwrap_err();
        assert!(matches!(err, DiagramLensError::Ocr(_)));
    }

    #[test]
    fn converts_panics() {
        let err = guarded::<()>("quality", || panic!("kernel too small")).unwrap_err();
        match err {
            DiagramLensError::Primitive(message) => {
                assert!(message.contains("quality"));
                assert!(message.contains("kernel too small"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
