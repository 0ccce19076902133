// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preprocessed renditions of the grayscale image fed to the OCR passes.

use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;

use crate::image::filters;

/// One named preprocessing variant.
pub struct Variant {
    pub name: &'static str,
    pub image: GrayImage,
}

/// Text-path variants, in evaluation order: `basic_gray`, `blurred`, then the
/// shared enhanced set.
pub fn text_variants(gray: &GrayImage) -> Vec<Variant> {
    let mut variants = vec![
        Variant {
            name: "basic_gray",
            image: gray.clone(),
        },
        Variant {
            name: "blurred",
            image: gaussian_blur_f32(gray, filters::kernel_sigma(5)),
        },
    ];
    variants.extend(enhanced_variants(gray));
    variants
}

/// Symbol-path variants, in evaluation order: `binary_otsu`, `adaptive`,
/// `clahe`, `denoised`, `scaled`.
pub fn symbol_variants(gray: &GrayImage) -> Vec<Variant> {
    enhanced_variants(gray)
}

fn enhanced_variants(gray: &GrayImage) -> Vec<Variant> {
    vec![
        Variant {
            name: "binary_otsu",
            image: filters::otsu_binary(gray),
        },
        Variant {
            name: "adaptive",
            image: filters::adaptive_gaussian_threshold(gray, 11, 2.0),
        },
        Variant {
            name: "clahe",
            image: filters::clahe(gray, 2.0, 8, 8),
        },
        Variant {
            name: "denoised",
            image: filters::otsu_binary(&filters::denoise(gray)),
        },
        Variant {
            name: "scaled",
            image: filters::otsu_binary(&filters::upscale_2x(gray)),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn sample() -> GrayImage {
        GrayImage::from_fn(40, 30, |x, y| Luma([((x * 5 + y * 3) % 256) as u8]))
    }

    #[test]
    fn text_variants_in_order() {
        let names: Vec<_> = text_variants(&sample()).iter().map(|v| v.name).collect();
        assert_eq!(
            names,
            ["basic_gray", "blurred", "binary_otsu", "adaptive", "clahe", "denoised", "scaled"]
        );
    }

    #[test]
    fn symbol_variants_in_order() {
        let variants = symbol_variants(&sample());
        let names: Vec<_> = variants.iter().map(|v| v.name).collect();
        assert_eq!(names, ["binary_otsu", "adaptive", "clahe", "denoised", "scaled"]);

        let scaled = &variants[4].image;
        assert_eq!(scaled.dimensions(), (80, 60));
        assert!(variants[0].image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }
}
