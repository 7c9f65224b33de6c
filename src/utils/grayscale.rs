//! Luminance conversion
//!
//! Y = 0.299*R + 0.587*G + 0.114*B, computed in fixed point as
//! Y = (77*R + 150*G + 29*B + 128) >> 8. The weights sum to 256 so pure white
//! maps to 255.
//!
//! Rows are converted in parallel with rayon once the frame is large enough to
//! amortize the thread hand-off.

use rayon::prelude::*;

const COEF_R: u32 = 77;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

/// Frames with fewer pixels than this are converted on the calling thread
pub(crate) const PARALLEL_MIN_PIXELS: usize = 64 * 1024;

/// Luminance of one RGB triple
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = (COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32 + 128) >> 8;
    y.min(255) as u8
}

/// Convert RGB image to grayscale
pub fn rgb_to_grayscale(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut gray = vec![0u8; width * height];
    grayscale_into(rgb, width, height, 3, &mut gray);
    gray
}

/// Convert RGBA image to grayscale (ignores alpha channel)
pub fn rgba_to_grayscale(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut gray = vec![0u8; width * height];
    grayscale_into(rgba, width, height, 4, &mut gray);
    gray
}

/// Convert packed pixels with `bytes_per_pixel` >= 3 into a caller-owned buffer
pub fn grayscale_into(
    src: &[u8],
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    gray: &mut [u8],
) {
    debug_assert!(bytes_per_pixel >= 3);
    if width == 0 || height == 0 {
        return;
    }
    let gray = &mut gray[..width * height];
    let row_bytes = width * bytes_per_pixel;

    let convert_row = |(y, row): (usize, &mut [u8])| {
        let src_row = &src[y * row_bytes..(y + 1) * row_bytes];
        for (out, px) in row.iter_mut().zip(src_row.chunks_exact(bytes_per_pixel)) {
            *out = luminance(px[0], px[1], px[2]);
        }
    };

    if width * height >= PARALLEL_MIN_PIXELS {
        gray.par_chunks_mut(width).enumerate().for_each(convert_row);
    } else {
        gray.chunks_mut(width).enumerate().for_each(convert_row);
    }
}
