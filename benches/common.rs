#![allow(dead_code)]

use qrcode::{Color, QrCode};
use rust_qr_live::Frame;
use rust_qr_live::tools::{bench_limit_from_env, dataset_iter, dataset_root_from_env, smoke_from_env};
use std::path::PathBuf;

pub fn collect_dataset_images() -> (PathBuf, Vec<PathBuf>) {
    let root = dataset_root_from_env();
    let limit = bench_limit_from_env();
    let smoke = smoke_from_env();

    let images: Vec<PathBuf> = dataset_iter(&root, limit, smoke).collect();
    (root, images)
}

/// Grayscale frame with `payload` rendered as a QR code at (`x`, `y`)
pub fn qr_frame(payload: &str, width: usize, height: usize, x: usize, y: usize, module: usize) -> Frame {
    let mut data = vec![255u8; width * height];
    if let Ok(code) = QrCode::new(payload.as_bytes()) {
        let side = code.width();
        for (i, color) in code.to_colors().into_iter().enumerate() {
            if color != Color::Dark {
                continue;
            }
            let (mx, my) = (i % side, i / side);
            for py in 0..module {
                for px in 0..module {
                    let (fx, fy) = (x + mx * module + px, y + my * module + py);
                    if fx < width && fy < height {
                        data[fy * width + fx] = 0;
                    }
                }
            }
        }
    }
    Frame::from_luma(width, height, data).expect("valid frame size")
}

/// RGB copy of a grayscale frame
pub fn to_rgb(frame: &Frame) -> Frame {
    let rgb: Vec<u8> = frame.pixels().iter().flat_map(|&v| [v, v, v]).collect();
    Frame::from_rgb(frame.width(), frame.height(), rgb).expect("valid frame size")
}
