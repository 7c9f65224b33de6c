/// 2D point with floating point coordinates, in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point
    pub fn distance(&self, other: &Point) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Calculate squared distance (faster, no sqrt)
    pub fn distance_squared(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Translate point by (dx, dy)
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Corner points reported by a decoder for one symbol
///
/// Decoders report three (finder centers) or four (corners) points; anything
/// with at least one point is accepted.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Quad {
    /// Points in decoder order
    pub points: Vec<Point>,
}

impl Quad {
    /// Wrap decoder points. Returns `None` when there are none.
    pub fn from_points(points: Vec<Point>) -> Option<Self> {
        if points.is_empty() {
            None
        } else {
            Some(Self { points })
        }
    }

    /// Mean of all points
    pub fn center(&self) -> Point {
        let n = self.points.len().max(1) as f32;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }

    /// Axis-aligned bounding box as (width, height)
    pub fn extent(&self) -> (f32, f32) {
        let mut min = Point::new(f32::INFINITY, f32::INFINITY);
        let mut max = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        if self.points.is_empty() {
            return (0.0, 0.0);
        }
        (max.x - min.x, max.y - min.y)
    }

    /// Shorter side of the bounding box
    pub fn min_side(&self) -> f32 {
        let (w, h) = self.extent();
        w.min(h)
    }

    /// Shift every point by (dx, dy)
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self.points.iter().map(|p| p.translate(dx, dy)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_center_and_extent() {
        let quad = Quad::from_points(vec![
            Point::new(10.0, 10.0),
            Point::new(50.0, 10.0),
            Point::new(50.0, 30.0),
            Point::new(10.0, 30.0),
        ])
        .unwrap();
        assert_eq!(quad.center(), Point::new(30.0, 20.0));
        assert_eq!(quad.extent(), (40.0, 20.0));
        assert_eq!(quad.min_side(), 20.0);
    }

    #[test]
    fn empty_points_yield_no_quad() {
        assert!(Quad::from_points(Vec::new()).is_none());
    }

    #[test]
    fn translate_moves_all_points() {
        let quad = Quad::from_points(vec![Point::new(1.0, 2.0)]).unwrap();
        assert_eq!(quad.translate(5.0, -1.0).points[0], Point::new(6.0, 1.0));
    }
}
