/// Axis-aligned rectangle in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: usize,
    /// Top edge
    pub y: usize,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl Rect {
    /// Create a rectangle
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Area in pixels
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Center in frame coordinates
    pub fn center(&self) -> super::Point {
        super::Point::new(
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// True when `other` lies entirely inside this rectangle
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// A rectangle to scan plus its priority rank (0 = tried first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ScanRegion {
    /// Area of the frame covered by this region
    pub rect: Rect,
    /// Position in the scan order; lower ranks are decoded first
    pub priority: usize,
}

impl ScanRegion {
    /// Create a region
    pub fn new(rect: Rect, priority: usize) -> Self {
        Self { rect, priority }
    }
}
