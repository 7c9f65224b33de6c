//! Region partitioning
//!
//! Order: centered sub-rectangle, full frame, then grid cells sorted by the
//! distance of their center from the frame center (row-major on ties). The
//! order only depends on frame size and configuration, so it is identical
//! from tick to tick.

use crate::config::PartitionConfig;
use crate::models::{Frame, Rect, ScanRegion};

/// Splits frames into prioritized scan regions
#[derive(Debug, Clone)]
pub struct RegionPartitioner {
    config: PartitionConfig,
}

impl RegionPartitioner {
    pub fn new(config: PartitionConfig) -> Self {
        Self { config }
    }

    /// Partitioner yielding only the full frame
    pub fn full_frame_only() -> Self {
        Self::new(PartitionConfig {
            center_fraction: 1.0,
            grid_size: 1,
            include_full_frame: true,
            min_region_side: 1,
        })
    }

    /// Regions for a frame
    pub fn partition(&self, frame: &Frame) -> Vec<ScanRegion> {
        self.partition_dims(frame.width(), frame.height())
    }

    /// Regions for a frame of the given size
    pub fn partition_dims(&self, width: usize, height: usize) -> Vec<ScanRegion> {
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let full = Rect::new(0, 0, width, height);
        let min_side = self.config.min_region_side.max(1);
        let mut rects: Vec<Rect> = Vec::new();
        let push = |rect: Rect, rects: &mut Vec<Rect>| {
            let big_enough = rect.width >= min_side.min(width) && rect.height >= min_side.min(height);
            if big_enough && !rects.contains(&rect) {
                rects.push(rect);
            }
        };

        let fraction = self.config.center_fraction.clamp(f32::EPSILON, 1.0);
        let cw = ((width as f32 * fraction).round() as usize).clamp(1, width);
        let ch = ((height as f32 * fraction).round() as usize).clamp(1, height);
        push(Rect::new((width - cw) / 2, (height - ch) / 2, cw, ch), &mut rects);

        if self.config.include_full_frame {
            push(full, &mut rects);
        }

        let n = self.config.grid_size.max(1);
        if n > 1 {
            let center = full.center();
            let mut cells: Vec<(f32, usize, Rect)> = Vec::with_capacity(n * n);
            for row in 0..n {
                for col in 0..n {
                    let x0 = col * width / n;
                    let x1 = (col + 1) * width / n;
                    let y0 = row * height / n;
                    let y1 = (row + 1) * height / n;
                    let cell = Rect::new(x0, y0, x1 - x0, y1 - y0);
                    if cell.area() == 0 {
                        continue;
                    }
                    let d = cell.center().distance_squared(&center);
                    cells.push((d, row * n + col, cell));
                }
            }
            cells.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            for (_, _, cell) in cells {
                push(cell, &mut rects);
            }
        }

        rects
            .into_iter()
            .enumerate()
            .map(|(priority, rect)| ScanRegion::new(rect, priority))
            .collect()
    }
}

impl Default for RegionPartitioner {
    fn default() -> Self {
        Self::new(PartitionConfig::default())
    }
}
