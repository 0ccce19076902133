// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Process-wide OCR handle, initialised on first use.

use std::sync::{Arc, OnceLock};

use diagramlens_core::config::OcrBackendConfig;
use diagramlens_core::error::{DiagramLensError, Result};
use tracing::{info, warn};

use super::backend::OcrBackend;
use super::tesseract::TesseractBackend;

type Slot = std::result::Result<Arc<dyn OcrBackend>, String>;

/// Lazily constructed OCR backend.
///
/// The backend is built (and probed) the first time it is asked for; the
/// outcome, success or failure, is kept for every later call. Shareable across
/// threads.
pub struct OcrEngine {
    config: Option<OcrBackendConfig>,
    slot: OnceLock<Slot>,
}

impl OcrEngine {
    /// An engine that will build the configured backend on first use.
    pub fn new(config: OcrBackendConfig) -> Self {
        Self {
            config: Some(config),
            slot: OnceLock::new(),
        }
    }

    /// An engine around an already constructed backend.
    pub fn with_backend(backend: Arc<dyn OcrBackend>) -> Self {
        Self {
            config: None,
            slot: OnceLock::from(Ok(backend)),
        }
    }

    /// An engine that never recognises anything.
    pub fn disabled() -> Self {
        Self::new(OcrBackendConfig::Disabled)
    }

    /// `false` when OCR is switched off by configuration.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.config, Some(OcrBackendConfig::Disabled))
    }

    /// The backend, constructing it on the first call.
    pub fn backend(&self) -> Result<&dyn OcrBackend> {
        let slot = self.slot.get_or_init(|| match &self.config {
            Some(config) => build(config),
            None => Err("no OCR backend configured".into()),
        });
        match slot {
            Ok(backend) => Ok(backend.as_ref()),
            Err(reason) => Err(DiagramLensError::OcrUnavailable(reason.clone())),
        }
    }
}

impl Default for OcrEngine {
    fn default() -> Self {
        Self::new(OcrBackendConfig::default())
    }
}

fn build(config: &OcrBackendConfig) -> Slot {
    let backend: Arc<dyn OcrBackend> = match config {
        OcrBackendConfig::Disabled => return Err("OCR is disabled by configuration".into()),
        OcrBackendConfig::Tesseract { binary, language } => {
            Arc::new(TesseractBackend::new(binary.clone(), language.clone()))
        }
        OcrBackendConfig::Ocrs { model_dir } => build_ocrs(model_dir.as_deref())?,
    };

    match backend.probe() {
        Ok(version) => {
            info!(backend = backend.name(), %version, "OCR backend ready");
            Ok(backend)
        }
        Err(err) => {
            warn!(backend = backend.name(), error = %err, "OCR backend unavailable");
            Err(err.to_string())
        }
    }
}

#[cfg(feature = "ocr")]
fn build_ocrs(model_dir: Option<&std::path::Path>) -> std::result::Result<Arc<dyn OcrBackend>, String> {
    super::ocrs_backend::OcrsBackend::load(model_dir)
        .map(|backend| Arc::new(backend) as Arc<dyn OcrBackend>)
        .map_err(|err| {
            warn!(error = %err, "ocrs backend could not be loaded");
            err.to_string()
        })
}

#[cfg(not(feature = "ocr"))]
fn build_ocrs(_model_dir: Option<&std::path::Path>) -> std::result::Result<Arc<dyn OcrBackend>, String> {
    Err("ocrs support is not compiled in; rebuild with the `ocr` feature".into())
}
