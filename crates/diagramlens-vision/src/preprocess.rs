// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Diagram preprocessing: denoise, contrast enhancement, sharpening,
// straightening and background cleaning, chained on one in-memory image.

use std::io::Cursor;
use std::path::Path;

use diagramlens_core::config::PreprocessStep;
use diagramlens_core::error::{DiagramLensError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use imageproc::hough::{LineDetectionOptions, detect_lines};
use imageproc::morphology::close;
use tracing::{debug, info, instrument, warn};

use crate::guard::guarded;
use crate::image::filters;

/// Skew below which an image is considered straight, in degrees.
const MIN_SKEW_DEGREES: f32 = 2.0;

/// Preprocessing pipeline over a single image.
///
/// Every step consumes `self` and returns the transformed processor, so steps
/// chain. A step that fails is logged and skipped; the image it was given is
/// passed on unchanged.
///
/// ```ignore
/// let png = DiagramPreprocessor::open("chart.png")?
///     .denoise()
///     .enhance_contrast()
///     .auto_straighten()
///     .to_png_bytes()?;
/// ```
pub struct DiagramPreprocessor {
    image: DynamicImage,
}

impl DiagramPreprocessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let image = image::open(path.as_ref()).map_err(|err| {
            DiagramLensError::Decode(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = image.width(), height = image.height(), "Image loaded");
        Ok(Self { image })
    }

    /// Create a processor from encoded bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data)
            .map_err(|err| DiagramLensError::Decode(format!("failed to decode image: {}", err)))?;
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Pipeline -------------------------------------------------------------

    /// Apply `steps` in order.
    #[instrument(skip(self))]
    pub fn run(self, steps: &[PreprocessStep]) -> Self {
        steps.iter().fold(self, |processor, &step| processor.apply(step))
    }

    /// Apply one step.
    pub fn apply(self, step: PreprocessStep) -> Self {
        match step {
            PreprocessStep::Denoise => self.denoise(),
            PreprocessStep::EnhanceContrast => self.enhance_contrast(),
            PreprocessStep::Sharpen => self.sharpen(),
            PreprocessStep::AutoStraighten => self.auto_straighten(),
            PreprocessStep::CleanBackground => self.clean_background(),
        }
    }

    /// Median denoise, per channel for colour images.
    pub fn denoise(self) -> Self {
        self.transform("denoise", |image| {
            Ok(match working_form(image) {
                Working::Gray(gray) => DynamicImage::ImageLuma8(filters::denoise(&gray)),
                Working::Color(rgb) => DynamicImage::ImageRgb8(filters::denoise_rgb(&rgb)),
            })
        })
    }

    /// CLAHE (clip 2.0, 8×8 tiles) on the luminance. Colour images get the
    /// luminance change added to every channel, which keeps their hue.
    pub fn enhance_contrast(self) -> Self {
        self.transform("enhance_contrast", |image| {
            Ok(match working_form(image) {
                Working::Gray(gray) => DynamicImage::ImageLuma8(filters::clahe(&gray, 2.0, 8, 8)),
                Working::Color(rgb) => {
                    let luma = DynamicImage::ImageRgb8(rgb.clone()).to_luma8();
                    let equalised = filters::clahe(&luma, 2.0, 8, 8);
                    let shifted = RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                        let delta = equalised.get_pixel(x, y).0[0] as i16
                            - luma.get_pixel(x, y).0[0] as i16;
                        let Rgb(channels) = *rgb.get_pixel(x, y);
                        Rgb(channels.map(|c| (c as i16 + delta).clamp(0, 255) as u8))
                    });
                    DynamicImage::ImageRgb8(shifted)
                }
            })
        })
    }

    /// 3×3 sharpening kernel `[-1 -1 -1; -1 9 -1; -1 -1 -1]`.
    pub fn sharpen(self) -> Self {
        self.transform("sharpen", |image| {
            Ok(match working_form(image) {
                Working::Gray(gray) => {
                    let rgb = DynamicImage::ImageLuma8(gray).to_rgb8();
                    DynamicImage::ImageRgb8(filters::sharpen_rgb(&rgb)).grayscale()
                }
                Working::Color(rgb) => DynamicImage::ImageRgb8(filters::sharpen_rgb(&rgb)),
            })
        })
    }

    /// Rotate the image level when its near-horizontal lines are skewed by
    /// 2° or more. Dimensions are kept; uncovered corners are filled white.
    pub fn auto_straighten(self) -> Self {
        self.transform("auto_straighten", |image| {
            let Some(skew) = estimate_skew(&image.to_luma8()) else {
                debug!("No near-horizontal lines; leaving image as is");
                return Ok(image.clone());
            };
            if skew.abs() < MIN_SKEW_DEGREES {
                debug!(skew, "Image already straight");
                return Ok(image.clone());
            }
            info!(skew, "Straightening image");
            let theta = (-skew).to_radians();
            Ok(match working_form(image) {
                Working::Gray(gray) => DynamicImage::ImageLuma8(rotate_about_center(
                    &gray,
                    theta,
                    Interpolation::Bilinear,
                    Luma([255]),
                )),
                Working::Color(rgb) => DynamicImage::ImageRgb8(rotate_about_center(
                    &rgb,
                    theta,
                    Interpolation::Bilinear,
                    Rgb([255, 255, 255]),
                )),
            })
        })
    }

    /// Adaptive threshold (Gaussian, block 11, C 2) followed by a small
    /// closing. Grayscale images become the cleaned binary; colour images
    /// keep their ink pixels and get a pure white background.
    pub fn clean_background(self) -> Self {
        self.transform("clean_background", |image| {
            let gray = image.to_luma8();
            let mask = close(
                &filters::adaptive_gaussian_threshold(&gray, 11, 2.0),
                Norm::LInf,
                1,
            );
            Ok(match working_form(image) {
                Working::Gray(_) => DynamicImage::ImageLuma8(mask),
                Working::Color(rgb) => {
                    let cleaned = RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                        if mask.get_pixel(x, y).0[0] == 255 {
                            Rgb([255, 255, 255])
                        } else {
                            *rgb.get_pixel(x, y)
                        }
                    });
                    DynamicImage::ImageRgb8(cleaned)
                }
            })
        })
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as PNG.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|err| DiagramLensError::Primitive(format!("failed to encode PNG: {}", err)))?;
        Ok(buffer.into_inner())
    }

    /// Write the current image; the format follows the file extension.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.image.save(path.as_ref()).map_err(|err| {
            DiagramLensError::Primitive(format!(
                "failed to write {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!("Preprocessed image written");
        Ok(())
    }

    fn transform(self, step: &str, f: impl FnOnce(&DynamicImage) -> Result<DynamicImage>) -> Self {
        match guarded(step, || f(&self.image)) {
            Ok(image) => {
                debug!(step, "Preprocessing step applied");
                Self { image }
            }
            Err(err) => {
                warn!(step, error = %err, "Preprocessing step failed; keeping previous image");
                self
            }
        }
    }
}

enum Working {
    Gray(GrayImage),
    Color(RgbImage),
}

/// 8-bit luma for luma inputs, 8-bit RGB (alpha dropped) for everything else.
fn working_form(image: &DynamicImage) -> Working {
    if image.color().has_color() {
        Working::Color(image.to_rgb8())
    } else {
        Working::Gray(image.to_luma8())
    }
}

/// Mean signed skew, in degrees, of the near-horizontal Hough lines of the
/// Canny(50, 150) edge map. Positive means the lines fall to the right.
pub fn estimate_skew(gray: &GrayImage) -> Option<f32> {
    if gray.width() == 0 || gray.height() == 0 {
        return None;
    }
    let edges = canny(gray, 50.0, 150.0);
    let skews: Vec<f32> = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold: 100,
            suppression_radius: 8,
        },
    )
    .iter()
    .filter(|line| line.angle_in_degrees > 45 && line.angle_in_degrees < 135)
    .map(|line| line.angle_in_degrees as f32 - 90.0)
    .collect();
    if skews.is_empty() {
        return None;
    }
    Some(skews.iter().sum::<f32>() / skews.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::DecodedImage;
    use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut};
    use imageproc::rect::Rect;

    fn gray_chart() -> GrayImage {
        let mut gray = GrayImage::from_pixel(120, 80, Luma([255]));
        draw_filled_rect_mut(&mut gray, Rect::at(20, 20).of_size(30, 40), Luma([20]));
        gray
    }

    fn color_chart() -> RgbImage {
        let mut rgb = RgbImage::from_pixel(120, 80, Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut rgb, Rect::at(60, 10).of_size(20, 50), Rgb([200, 40, 40]));
        rgb
    }

    const ALL_STEPS: [PreprocessStep; 5] = [
        PreprocessStep::Denoise,
        PreprocessStep::EnhanceContrast,
        PreprocessStep::Sharpen,
        PreprocessStep::AutoStraighten,
        PreprocessStep::CleanBackground,
    ];

    #[test]
    fn every_step_keeps_dimensions() {
        for step in ALL_STEPS {
            let gray = DiagramPreprocessor::from_dynamic(DynamicImage::ImageLuma8(gray_chart()))
                .apply(step);
            assert_eq!((gray.width(), gray.height()), (120, 80), "{step:?}");

            let color = DiagramPreprocessor::from_dynamic(DynamicImage::ImageRgb8(color_chart()))
                .apply(step);
            assert_eq!((color.width(), color.height()), (120, 80), "{step:?}");
        }
    }

    #[test]
    fn grayscale_stays_grayscale() {
        let processed = DiagramPreprocessor::from_dynamic(DynamicImage::ImageLuma8(gray_chart()))
            .run(&ALL_STEPS)
            .into_dynamic();
        assert!(!processed.color().has_color());
    }

    #[test]
    fn sharpening_leaves_flat_regions_alone() {
        let flat = RgbImage::from_pixel(16, 16, Rgb([90, 120, 150]));
        let sharpened = DiagramPreprocessor::from_dynamic(DynamicImage::ImageRgb8(flat.clone()))
            .sharpen()
            .into_dynamic()
            .to_rgb8();
        assert_eq!(sharpened, flat);
    }

    #[test]
    fn clean_background_whitens_paper_and_keeps_ink() {
        let mut rgb = RgbImage::from_pixel(50, 50, Rgb([235, 235, 225]));
        draw_filled_rect_mut(&mut rgb, Rect::at(20, 20).of_size(4, 4), Rgb([255, 0, 0]));
        let cleaned = DiagramPreprocessor::from_dynamic(DynamicImage::ImageRgb8(rgb))
            .clean_background()
            .into_dynamic()
            .to_rgb8();
        assert_eq!(*cleaned.get_pixel(2, 2), Rgb([255, 255, 255]));
        assert_eq!(*cleaned.get_pixel(21, 21), Rgb([255, 0, 0]));

        let binary = DiagramPreprocessor::from_dynamic(DynamicImage::ImageLuma8(gray_chart()))
            .clean_background()
            .into_dynamic()
            .to_luma8();
        assert!(binary.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn skew_of_a_tilted_rule() {
        let mut gray = GrayImage::from_pixel(400, 240, Luma([255]));
        let drop = 360.0 * 5f32.to_radians().tan();
        draw_line_segment_mut(&mut gray, (20.0, 100.0), (380.0, 100.0 + drop), Luma([0]));
        let skew = estimate_skew(&gray).unwrap();
        assert!((skew - 5.0).abs() <= 1.0, "skew {skew}");
    }

    #[test]
    fn straight_images_are_not_rotated() {
        let mut gray = GrayImage::from_pixel(400, 240, Luma([255]));
        draw_line_segment_mut(&mut gray, (20.0, 100.0), (380.0, 100.0), Luma([0]));
        let skew = estimate_skew(&gray).unwrap();
        assert!(skew.abs() < MIN_SKEW_DEGREES);

        let out = DiagramPreprocessor::from_dynamic(DynamicImage::ImageLuma8(gray.clone()))
            .auto_straighten()
            .into_dynamic()
            .to_luma8();
        assert_eq!(out, gray);
    }

    #[test]
    fn blank_images_have_no_skew() {
        assert!(estimate_skew(&GrayImage::from_pixel(60, 60, Luma([255]))).is_none());
    }

    #[test]
    fn png_output_decodes() {
        let bytes = DiagramPreprocessor::from_dynamic(DynamicImage::ImageRgb8(color_chart()))
            .run(&PreprocessStep::DEFAULT_PIPELINE)
            .to_png_bytes()
            .unwrap();
        let decoded = DecodedImage::from_bytes(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (120, 80));
    }

    #[test]
    fn bad_bytes_are_a_decode_error() {
        assert!(matches!(
            DiagramPreprocessor::from_bytes(b"not an image"),
            Err(DiagramLensError::Decode(_))
        ));
    }
}
