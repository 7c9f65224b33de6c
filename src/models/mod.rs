pub mod detection;
pub mod frame;
pub mod point;
pub mod region;

pub use detection::{BackendKind, DetectedCode, DetectionCandidate};
pub use frame::{Frame, LumaPlane, PixelFormat};
pub use point::{Point, Quad};
pub use region::{Rect, ScanRegion};
