//! Pixel filters behind the preprocessing stages
//!
//! All filters work on packed buffers with `bpp` bytes per pixel and touch
//! only the first `channels` bytes of each pixel, so an alpha channel passes
//! through unchanged.

use rayon::prelude::*;

use crate::utils::grayscale::{PARALLEL_MIN_PIXELS, luminance};

/// Contrast lookup table for `v' = clamp(factor * (v - 128) + 128, 0, 255)`
pub fn contrast_lut(factor: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        let adjusted = factor * (v as f32 - 128.0) + 128.0;
        *out = adjusted.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Apply a contrast gain in place
pub fn adjust_contrast(pixels: &mut [u8], bpp: usize, channels: usize, factor: f32) {
    let lut = contrast_lut(factor);
    let apply = |px: &mut [u8]| {
        for c in px.iter_mut().take(channels) {
            *c = lut[*c as usize];
        }
    };
    if pixels.len() / bpp >= PARALLEL_MIN_PIXELS {
        pixels.par_chunks_exact_mut(bpp).for_each(apply);
    } else {
        pixels.chunks_exact_mut(bpp).for_each(apply);
    }
}

/// 3x3 sharpening with kernel `[0,-1,0; -1,5,-1; 0,-1,0]`
///
/// Only interior pixels are convolved; the one-pixel border is copied as is.
pub fn sharpen(src: &[u8], width: usize, height: usize, bpp: usize, channels: usize) -> Vec<u8> {
    let mut out = src.to_vec();
    if width < 3 || height < 3 {
        return out;
    }
    let row_bytes = width * bpp;
    let convolve_row = |(y, row): (usize, &mut [u8])| {
        if y == 0 || y == height - 1 {
            return;
        }
        for x in 1..width - 1 {
            for c in 0..channels {
                let at = |xx: usize, yy: usize| src[yy * row_bytes + xx * bpp + c] as i32;
                let v = 5 * at(x, y) - at(x, y - 1) - at(x, y + 1) - at(x - 1, y) - at(x + 1, y);
                row[x * bpp + c] = v.clamp(0, 255) as u8;
            }
        }
    };
    if width * height >= PARALLEL_MIN_PIXELS {
        out.par_chunks_mut(row_bytes).enumerate().for_each(convolve_row);
    } else {
        out.chunks_mut(row_bytes).enumerate().for_each(convolve_row);
    }
    out
}

/// Sobel gradient magnitude (|gx| + |gy|) of a luminance plane
///
/// Border pixels get magnitude 0.
pub fn gradient_magnitude(gray: &[u8], width: usize, height: usize) -> Vec<u16> {
    let mut mag = vec![0u16; width * height];
    if width < 3 || height < 3 {
        return mag;
    }
    let sobel_row = |(y, row): (usize, &mut [u16])| {
        if y == 0 || y == height - 1 {
            return;
        }
        let at = |x: usize, y: usize| gray[y * width + x] as i32;
        for x in 1..width - 1 {
            let gx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            row[x] = (gx.abs() + gy.abs()).min(u16::MAX as i32) as u16;
        }
    };
    if width * height >= PARALLEL_MIN_PIXELS {
        mag.par_chunks_mut(width).enumerate().for_each(sobel_row);
    } else {
        mag.chunks_mut(width).enumerate().for_each(sobel_row);
    }
    mag
}

/// Mark strong edges dark, in place
///
/// Pixels whose gradient magnitude exceeds `threshold` have their colour
/// channels set to 0, which thickens module boundaries for the decoders.
pub fn enhance_edges(
    pixels: &mut [u8],
    width: usize,
    height: usize,
    bpp: usize,
    channels: usize,
    threshold: u16,
) -> usize {
    let gray = luma_of(pixels, width, height, bpp);
    let mag = gradient_magnitude(&gray, width, height);
    let mut marked = 0;
    for (px, &m) in pixels.chunks_exact_mut(bpp).zip(mag.iter()) {
        if m > threshold {
            px.iter_mut().take(channels).for_each(|c| *c = 0);
            marked += 1;
        }
    }
    marked
}

/// Luminance plane of a packed buffer
pub fn luma_of(pixels: &[u8], width: usize, height: usize, bpp: usize) -> Vec<u8> {
    if bpp == 1 {
        return pixels[..width * height].to_vec();
    }
    pixels
        .chunks_exact(bpp)
        .take(width * height)
        .map(|px| luminance(px[0], px[1], px[2]))
        .collect()
}
