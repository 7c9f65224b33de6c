//! Helpers shared by the CLI, benches, and integration tests

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use image::{ColorType, GenericImageView};

use crate::error::Result;
use crate::models::{Frame, PixelFormat};

fn max_dim_from_env() -> Option<u32> {
    match env::var("QR_SCAN_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        },
        Err(_) => None,
    }
}

/// Load an image file as an RGB frame
///
/// `QR_SCAN_MAX_DIM` downsizes large images before conversion.
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let img = image::open(path)?;
    let rgb = match max_dim_from_env() {
        Some(max_dim) if img.dimensions().0.max(img.dimensions().1) > max_dim => img
            .resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
            .to_rgb8(),
        _ => img.to_rgb8(),
    };
    let (width, height) = rgb.dimensions();
    Ok(Frame::from_rgb(
        width as usize,
        height as usize,
        rgb.into_raw(),
    )?)
}

/// Write a frame to disk; the format follows the file extension
pub fn save_frame<P: AsRef<Path>>(frame: &Frame, path: P) -> Result<()> {
    let color = match frame.format() {
        PixelFormat::Luma8 => ColorType::L8,
        PixelFormat::Rgb8 => ColorType::Rgb8,
        PixelFormat::Rgba8 => ColorType::Rgba8,
    };
    image::save_buffer(
        path,
        frame.pixels(),
        frame.width() as u32,
        frame.height() as u32,
        color,
    )?;
    Ok(())
}

/// Summary statistics for grayscale data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrayStats {
    pub min: u8,
    pub max: u8,
    pub avg: u8,
}

/// Compute min/max/avg for grayscale values
pub fn grayscale_stats(gray: &[u8]) -> GrayStats {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut sum: u64 = 0;
    for &v in gray {
        min = min.min(v);
        max = max.max(v);
        sum += v as u64;
    }
    let avg = if gray.is_empty() {
        0
    } else {
        (sum / gray.len() as u64) as u8
    };
    GrayStats { min, max, avg }
}

/// Dataset root from `QR_SCAN_DATASET_ROOT`
pub fn dataset_root_from_env() -> PathBuf {
    env::var("QR_SCAN_DATASET_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("benches/images"))
}

/// Image limit from `QR_SCAN_BENCH_LIMIT`; unset or `0` means the full dataset
pub fn bench_limit_from_env() -> Option<usize> {
    match env::var("QR_SCAN_BENCH_LIMIT") {
        Ok(value) => value.trim().parse::<usize>().ok().filter(|&v| v != 0),
        Err(_) => None,
    }
}

/// Smoke run flag from `QR_SCAN_SMOKE`
pub fn smoke_from_env() -> bool {
    matches!(
        env::var("QR_SCAN_SMOKE").as_deref(),
        Ok("1") | Ok("true") | Ok("TRUE") | Ok("yes") | Ok("YES")
    )
}

/// Count the codes labelled in a BoofCV-style label file
///
/// Handles the `SETS` layout (one line of 8 floats per code) and the legacy
/// layout (one corner per line, 4 lines per code). Returns `0` when the file
/// cannot be read.
pub fn parse_expected_qr_count<P: AsRef<Path>>(txt_path: P) -> usize {
    let Ok(content) = fs::read_to_string(txt_path) else {
        return 0;
    };

    fn numeric_tokens(line: &str) -> Option<usize> {
        let mut count = 0usize;
        for token in line.split_whitespace() {
            token.parse::<f64>().ok()?;
            count += 1;
        }
        (count > 0).then_some(count)
    }

    let mut saw_sets = false;
    let mut full_lines = 0usize;
    let mut corner_lines = 0usize;
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.eq_ignore_ascii_case("SETS") {
            saw_sets = true;
            full_lines = 0;
            continue;
        }
        match numeric_tokens(line) {
            Some(n) if n >= 8 => full_lines += 1,
            Some(2) if !saw_sets => corner_lines += 1,
            _ => {}
        }
    }

    if saw_sets || full_lines > 0 {
        full_lines
    } else {
        corner_lines / 4
    }
}

/// Iterate dataset image paths, optionally restricted to `_smoke.txt` and a limit
pub fn dataset_iter<P: AsRef<Path>>(
    root: P,
    limit: Option<usize>,
    smoke: bool,
) -> impl Iterator<Item = PathBuf> {
    let root = root.as_ref();
    let mut images = if smoke {
        load_smoke_list(root).unwrap_or_else(|| collect_images(root))
    } else {
        collect_images(root)
    };
    images.sort();
    if let Some(limit) = limit {
        images.truncate(limit);
    }
    images.into_iter()
}

fn load_smoke_list(root: &Path) -> Option<Vec<PathBuf>> {
    let contents = fs::read_to_string(root.join("_smoke.txt")).ok()?;
    let paths: Vec<PathBuf> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            let candidate = Path::new(line);
            if candidate.is_absolute() {
                candidate.to_path_buf()
            } else {
                root.join(candidate)
            }
        })
        .filter(|path| path.exists())
        .collect();
    if paths.is_empty() { None } else { Some(paths) }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp"))
}

fn collect_images(root: &Path) -> Vec<PathBuf> {
    let mut stack = vec![root.to_path_buf()];
    let mut images = Vec::new();
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_image(&path) {
                images.push(path);
            }
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn expected_count_supports_sets_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "a.txt",
            "# points\nSETS\n1 2 3 4 5 6 7 8\n9 10 11 12 13 14 15 16\n",
        );
        assert_eq!(parse_expected_qr_count(&path), 2);
    }

    #[test]
    fn expected_count_supports_corner_layout() {
        let dir = tempfile::tempdir().unwrap();
        let corners = "1 2\n3 4\n5 6\n7 8\n".repeat(2);
        let path = write(dir.path(), "b.txt", &corners);
        assert_eq!(parse_expected_qr_count(&path), 2);
        assert_eq!(parse_expected_qr_count(dir.path().join("missing.txt")), 0);
    }

    #[test]
    fn dataset_iter_sorts_filters_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.jpg", "notes.txt", "c.bmp"] {
            write(dir.path(), name, "");
        }
        let names: Vec<String> = dataset_iter(dir.path(), Some(2), false)
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[test]
    fn smoke_list_restricts_dataset() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.png", "");
        write(dir.path(), "b.png", "");
        write(dir.path(), "_smoke.txt", "# subset\nb.png\nmissing.png\n");
        let all: Vec<PathBuf> = dataset_iter(dir.path(), None, true).collect();
        assert_eq!(all, vec![dir.path().join("b.png")]);
    }

    #[test]
    fn frames_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let frame = Frame::from_luma(3, 2, vec![0, 50, 100, 150, 200, 250]).unwrap();
        save_frame(&frame, &path).unwrap();
        let loaded = load_frame(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (3, 2));
        assert_eq!(loaded.format(), PixelFormat::Rgb8);
        assert_eq!(&loaded.pixels()[..6], &[0, 0, 0, 50, 50, 50]);
    }

    #[test]
    fn gray_stats() {
        let stats = grayscale_stats(&[10, 20, 30]);
        assert_eq!(stats, GrayStats { min: 10, max: 30, avg: 20 });
    }
}
