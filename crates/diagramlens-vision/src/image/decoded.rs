// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoded image buffer: the immutable pixel grid shared by every analysis
// component for the duration of one request.

use diagramlens_core::error::{DiagramLensError, Result};
use image::{ColorType, DynamicImage, GrayImage, RgbImage};
use tracing::{debug, info, instrument};

/// A decoded raster image plus its derived grayscale view.
///
/// Constructed once per analysis and only ever borrowed afterwards; the
/// grayscale view is computed eagerly because every component needs it.
pub struct DecodedImage {
    /// The image as decoded.
    image: DynamicImage,
    /// Luma view of `image`.
    gray: GrayImage,
}

impl DecodedImage {
    // -- Construction ---------------------------------------------------------

    /// Load and decode an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let image = image::open(path.as_ref()).map_err(|err| {
            DiagramLensError::Decode(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = image.width(), height = image.height(), "Image loaded");
        Self::checked(image)
    }

    /// Decode an image from raw encoded bytes (PNG, JPEG, GIF, BMP, TIFF, ...).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(DiagramLensError::Validation("image data is empty".into()));
        }
        let image = image::load_from_memory(data).map_err(|err| {
            DiagramLensError::Decode(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = image.width(),
            height = image.height(),
            "Image decoded from bytes"
        );
        Self::checked(image)
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        let gray = image.to_luma8();
        Self { image, gray }
    }

    fn checked(image: DynamicImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DiagramLensError::Validation(format!(
                "image has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }
        Ok(Self::from_dynamic(image))
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Number of colour channels in the decoded data (alpha included).
    pub fn channel_count(&self) -> u8 {
        self.image.color().channel_count()
    }

    /// Whether the decoded data carries colour (as opposed to luma only).
    pub fn is_color(&self) -> bool {
        !matches!(
            self.image.color(),
            ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16
        )
    }

    /// `true` when the image has at least one pixel.
    pub fn has_pixels(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    /// Borrow the decoded image.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Borrow the grayscale view.
    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// An 8-bit RGB copy of the image.
    pub fn to_rgb(&self) -> RgbImage {
        self.image.to_rgb8()
    }

    /// Consume the buffer and return the decoded image.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }
}
