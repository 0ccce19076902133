// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel-level filters: thresholding, contrast-limited equalisation, denoising,
// sharpening, and rescaling. Thin wrappers over `imageproc` where it has the
// operation, small local implementations where it does not.

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::{gaussian_blur_f32, median_filter};

// -- Thresholding --------------------------------------------------------------

/// Pixels brighter than `threshold` become 255, the rest 0.
pub fn threshold_binary(gray: &GrayImage, threshold: u8) -> GrayImage {
    map_gray(gray, |v| if v > threshold { 255 } else { 0 })
}

/// Pixels at or below `threshold` become 255, the rest 0.
pub fn threshold_binary_inv(gray: &GrayImage, threshold: u8) -> GrayImage {
    map_gray(gray, |v| if v > threshold { 0 } else { 255 })
}

/// Global Otsu binarisation (light foreground).
pub fn otsu_binary(gray: &GrayImage) -> GrayImage {
    threshold_binary(gray, otsu_level(gray))
}

/// Inverse Otsu binarisation: dark ink becomes the 255 foreground.
pub fn otsu_binary_inv(gray: &GrayImage) -> GrayImage {
    threshold_binary_inv(gray, otsu_level(gray))
}

/// Adaptive thresholding against a Gaussian-weighted local mean.
///
/// A pixel becomes 255 when it is brighter than the weighted mean of its
/// `block_size` x `block_size` neighbourhood minus `c`.
pub fn adaptive_gaussian_threshold(gray: &GrayImage, block_size: u32, c: f32) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, kernel_sigma(block_size));
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0] as f32;
        let threshold = local_mean.get_pixel(x, y).0[0] as f32 - c;
        Luma([if value > threshold { 255 } else { 0 }])
    })
}

/// Gaussian sigma matching an odd kernel size when no sigma is given.
pub fn kernel_sigma(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

// -- Contrast ------------------------------------------------------------------

/// Contrast-limited adaptive histogram equalisation.
///
/// The image is split into a `tiles_x` x `tiles_y` grid; each tile gets its own
/// clipped equalisation table and output pixels blend the four nearest tables
/// bilinearly.
pub fn clahe(gray: &GrayImage, clip_limit: f32, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(tiles_x.clamp(1, width));
    let tile_h = height.div_ceil(tiles_y.clamp(1, height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(clipped_equalisation(gray, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    ImageBuffer::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y).0[0] as usize;

        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let (ty0, ty1, wy) = neighbour_tiles(fy, tiles_y);
        let (tx0, tx1, wx) = neighbour_tiles(fx, tiles_x);

        let top = lut_at(tx0, ty0)[value] as f32 * (1.0 - wx) + lut_at(tx1, ty0)[value] as f32 * wx;
        let bottom =
            lut_at(tx0, ty1)[value] as f32 * (1.0 - wx) + lut_at(tx1, ty1)[value] as f32 * wx;
        let blended = top * (1.0 - wy) + bottom * wy;
        Luma([blended.round().clamp(0.0, 255.0) as u8])
    })
}

/// Indices of the two tiles surrounding a fractional tile coordinate, plus the
/// weight of the second one.
fn neighbour_tiles(position: f32, tile_count: u32) -> (u32, u32, f32) {
    let last = tile_count as i64 - 1;
    let base = position.floor();
    let weight = position - base;
    let first = (base as i64).clamp(0, last) as u32;
    let second = (base as i64 + 1).clamp(0, last) as u32;
    (first, second, weight)
}

/// Equalisation table for one tile with the histogram clipped at
/// `clip_limit` times the mean bin height.
fn clipped_equalisation(
    gray: &GrayImage,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
    clip_limit: f32,
) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let spread = excess / 256;
    let residual = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += spread;
        if i < residual {
            *bin += 1;
        }
    }

    let mut lut = [0u8; 256];
    let scale = 255.0 / area.max(1) as f32;
    let mut cumulative = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[i] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

// -- Denoising / sharpening ----------------------------------------------------

/// Edge-preserving denoise (3x3 median).
pub fn denoise(gray: &GrayImage) -> GrayImage {
    median_filter(gray, 1, 1)
}

/// Edge-preserving denoise applied per channel.
pub fn denoise_rgb(rgb: &RgbImage) -> RgbImage {
    median_filter(rgb, 1, 1)
}

/// Sharpen with the 3x3 kernel `[-1 -1 -1; -1 9 -1; -1 -1 -1]`, clamping at
/// image borders.
pub fn sharpen_rgb(rgb: &RgbImage) -> RgbImage {
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return rgb.clone();
    }
    ImageBuffer::from_fn(width, height, |x, y| {
        let mut acc = [0i32; 3];
        for dy in -1i32..=1 {
            for dx in -1i32..=1 {
                let sx = (x as i32 + dx).clamp(0, width as i32 - 1) as u32;
                let sy = (y as i32 + dy).clamp(0, height as i32 - 1) as u32;
                let weight = if dx == 0 && dy == 0 { 9 } else { -1 };
                let Rgb(channels) = *rgb.get_pixel(sx, sy);
                for (c, value) in channels.iter().enumerate() {
                    acc[c] += weight * *value as i32;
                }
            }
        }
        Rgb(acc.map(|v| v.clamp(0, 255) as u8))
    })
}

// -- Scaling -------------------------------------------------------------------

/// Resize by a uniform factor with bilinear filtering (at least 1x1).
pub fn rescale(gray: &GrayImage, factor: f32) -> GrayImage {
    let width = ((gray.width() as f32 * factor).round() as u32).max(1);
    let height = ((gray.height() as f32 * factor).round() as u32).max(1);
    imageops::resize(gray, width, height, FilterType::Triangle)
}

/// Double both dimensions with bicubic filtering.
pub fn upscale_2x(gray: &GrayImage) -> GrayImage {
    imageops::resize(
        gray,
        gray.width() * 2,
        gray.height() * 2,
        FilterType::CatmullRom,
    )
}

fn map_gray(gray: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([f(gray.get_pixel(x, y).0[0])])
    })
}

/// Fraction of non-zero pixels.
pub fn foreground_fraction(binary: &GrayImage) -> f64 {
    let total = binary.width() as u64 * binary.height() as u64;
    if total == 0 {
        return 0.0;
    }
    let set = binary.pixels().filter(|p| p.0[0] > 0).count() as u64;
    set as f64 / total as f64
}
