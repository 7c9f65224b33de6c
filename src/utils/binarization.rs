//! Adaptive (local mean) thresholding
//!
//! The local mean comes from a summed-area table so each window costs four
//! lookups regardless of its size. With `sample_step > 1` one threshold is
//! computed per `sample_step x sample_step` block and shared by every pixel in
//! that block.

use rayon::prelude::*;

use super::grayscale::PARALLEL_MIN_PIXELS;

/// Output value for pixels below the local threshold
pub const BLACK: u8 = 0;
/// Output value for pixels at or above the local threshold
pub const WHITE: u8 = 255;

/// Parameters for [`adaptive_threshold`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveParams {
    /// Side of the square neighbourhood used for the local mean
    pub region_size: usize,
    /// Subtracted from the local mean to form the threshold
    pub constant: i32,
    /// Block side sharing one threshold (1 = per-pixel)
    pub sample_step: usize,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            region_size: 15,
            constant: 10,
            sample_step: 2,
        }
    }
}

/// Fill `integral` with the summed-area table of `gray`
///
/// The table has `(width + 1) * (height + 1)` entries with a zero first row
/// and column.
pub fn integral_image_into(gray: &[u8], width: usize, height: usize, integral: &mut Vec<u64>) {
    let stride = width + 1;
    integral.clear();
    integral.resize(stride * (height + 1), 0);
    for y in 0..height {
        let mut row_sum = 0u64;
        for x in 0..width {
            row_sum += gray[y * width + x] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }
}

/// Mean of the window of radius `radius` around (cx, cy), clipped to the image
#[inline]
fn window_mean(integral: &[u64], width: usize, height: usize, cx: usize, cy: usize, radius: usize) -> u64 {
    let stride = width + 1;
    let x0 = cx.saturating_sub(radius);
    let y0 = cy.saturating_sub(radius);
    let x1 = (cx + radius + 1).min(width);
    let y1 = (cy + radius + 1).min(height);
    let area = ((x1 - x0) * (y1 - y0)) as u64;
    let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
        - integral[y0 * stride + x1]
        - integral[y1 * stride + x0];
    sum / area.max(1)
}

/// Binarize `gray` against local means; returns a 0/255 plane
pub fn adaptive_threshold(gray: &[u8], width: usize, height: usize, params: AdaptiveParams) -> Vec<u8> {
    let mut integral = Vec::new();
    let mut out = vec![WHITE; width * height];
    adaptive_threshold_into(gray, width, height, params, &mut integral, &mut out);
    out
}

/// Binarize into caller-owned buffers (integral table and output plane)
pub fn adaptive_threshold_into(
    gray: &[u8],
    width: usize,
    height: usize,
    params: AdaptiveParams,
    integral: &mut Vec<u64>,
    out: &mut [u8],
) {
    if width == 0 || height == 0 {
        return;
    }
    integral_image_into(gray, width, height, integral);
    let integral: &[u64] = integral;

    let radius = (params.region_size.max(1) / 2).max(1);
    let step = params.sample_step.max(1);
    let out = &mut out[..width * height];

    let threshold_band = |(band, rows): (usize, &mut [u8])| {
        let y_start = band * step;
        let band_height = rows.len() / width;
        let cy = (y_start + step / 2).min(height - 1);
        for bx in (0..width).step_by(step) {
            let cx = (bx + step / 2).min(width - 1);
            let mean = window_mean(integral, width, height, cx, cy, radius) as i32;
            let threshold = mean - params.constant;
            for dy in 0..band_height {
                let y = y_start + dy;
                for x in bx..(bx + step).min(width) {
                    let v = gray[y * width + x] as i32;
                    rows[dy * width + x] = if v < threshold { BLACK } else { WHITE };
                }
            }
        }
    };

    if width * height >= PARALLEL_MIN_PIXELS {
        out.par_chunks_mut(width * step).enumerate().for_each(threshold_band);
    } else {
        out.chunks_mut(width * step).enumerate().for_each(threshold_band);
    }
}
