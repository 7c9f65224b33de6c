//! Image processing helpers shared by the preprocessing stages
//!
//! - Grayscale conversion (RGB/RGBA to luminance)
//! - Adaptive thresholding over an integral image
//! - Reusable scratch buffers

pub mod binarization;
pub mod grayscale;
pub mod memory_pool;
