// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service health: can we recognise text, and do the imaging primitives run?

use image::{GrayImage, Luma};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::guard::guarded;
use crate::ocr::OcrEngine;

/// Overall service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every component passed its probe.
    Healthy,
    /// At least one component failed; analysis still runs on fallbacks.
    Degraded,
}

/// Probe result for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub ok: bool,
    /// Version string, or the failure reason.
    pub detail: String,
}

impl ComponentHealth {
    fn ok(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: true,
            detail: detail.into(),
        }
    }

    fn failed(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: false,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Probe the OCR backend and run a trivial imaging pipeline.
///
/// OCR switched off by configuration counts as healthy; a configured backend
/// that cannot start does not.
#[instrument(skip_all)]
pub fn health_check(ocr: &OcrEngine) -> HealthReport {
    let components = vec![ocr_health(ocr), imaging_health()];
    let status = if components.iter().all(|c| c.ok) {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };

    match status {
        HealthStatus::Healthy => info!("Health check passed"),
        HealthStatus::Degraded => warn!(
            failing = ?components.iter().filter(|c| !c.ok).map(|c| c.name).collect::<Vec<_>>(),
            "Health check degraded"
        ),
    }

    HealthReport { status, components }
}

fn ocr_health(ocr: &OcrEngine) -> ComponentHealth {
    if !ocr.is_enabled() {
        return ComponentHealth::ok("ocr", "disabled");
    }
    match ocr.backend().and_then(|backend| {
        backend
            .probe()
            .map(|version| format!("{} {}", backend.name(), version))
    }) {
        Ok(detail) => ComponentHealth::ok("ocr", detail),
        Err(err) => ComponentHealth::failed("ocr", err.to_string()),
    }
}

fn imaging_health() -> ComponentHealth {
    let probe = guarded("imaging probe", || {
        let rgb = image::RgbImage::from_pixel(10, 10, image::Rgb([0, 0, 0]));
        let gray: GrayImage = image::DynamicImage::ImageRgb8(rgb).to_luma8();
        let edges = imageproc::edges::canny(&gray, 50.0, 150.0);
        Ok(edges.dimensions() == gray.dimensions() && gray.get_pixel(0, 0) == &Luma([0]))
    });
    match probe {
        Ok(true) => ComponentHealth::ok("imaging", "grayscale conversion and edge detection"),
        Ok(false) => ComponentHealth::failed("imaging", "unexpected probe output"),
        Err(err) => ComponentHealth::failed("imaging", err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrBackend, OcrOutcome, OcrProfile};
    use diagramlens_core::config::OcrBackendConfig;
    use diagramlens_core::error::{DiagramLensError, Result};
    use std::path::PathBuf;
    use std::sync::Arc;

    struct Probe(bool);

    impl OcrBackend for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        fn recognize(&self, _image: &GrayImage, _profile: &OcrProfile) -> OcrOutcome {
            OcrOutcome::Empty
        }

        fn probe(&self) -> Result<String> {
            if self.0 {
                Ok("1.0".into())
            } else {
                Err(DiagramLensError::Ocr("gone away".into()))
            }
        }
    }

    #[test]
    fn disabled_ocr_is_healthy() {
        let report = health_check(&OcrEngine::disabled());
        assert!(report.is_healthy());
        assert_eq!(report.components[0].detail, "disabled");
        assert!(report.components[1].ok);
    }

    #[test]
    fn working_backend_reports_version() {
        let report = health_check(&OcrEngine::with_backend(Arc::new(Probe(true))));
        assert!(report.is_healthy());
        assert_eq!(report.components[0].detail, "probe 1.0");
    }

    #[test]
    fn failing_backend_degrades() {
        let report = health_check(&OcrEngine::with_backend(Arc::new(Probe(false))));
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(!report.components[0].ok);
        assert!(report.components[0].detail.contains("gone away"));
    }

    #[test]
    fn missing_tesseract_degrades() {
        let engine = OcrEngine::new(OcrBackendConfig::Tesseract {
            binary: PathBuf::from("/nonexistent/tesseract-binary"),
            language: "eng".into(),
        });
        assert_eq!(health_check(&engine).status, HealthStatus::Degraded);
    }

    #[test]
    fn serializes_lowercase_status() {
        let json = serde_json::to_value(health_check(&OcrEngine::disabled())).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["components"][1]["name"], "imaging");
    }
}
