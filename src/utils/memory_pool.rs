//! Reusable scratch buffers for the per-frame preprocessing stages
//!
//! Camera frames arrive at a fixed resolution, so after the first tick every
//! stage can reuse the allocations of the previous one.

/// Scratch buffers kept across ticks
#[derive(Debug)]
pub struct BufferPool {
    integral: Vec<u64>,
    scratch: Vec<u8>,
    reuses: usize,
    growths: usize,
}

impl BufferPool {
    /// Create a pool sized for 1280x720 frames (the default camera request)
    pub fn new() -> Self {
        Self::with_capacity(1280 * 720)
    }

    /// Create a pool with room for `pixels` pixels
    pub fn with_capacity(pixels: usize) -> Self {
        Self {
            integral: Vec::with_capacity(pixels),
            scratch: Vec::with_capacity(pixels),
            reuses: 0,
            growths: 0,
        }
    }

    /// Zeroed scratch plane of `size` bytes
    pub fn scratch(&mut self, size: usize) -> &mut [u8] {
        if size > self.scratch.capacity() {
            self.growths += 1;
        } else {
            self.reuses += 1;
        }
        self.scratch.clear();
        self.scratch.resize(size, 0);
        &mut self.scratch[..size]
    }

    /// Integral-image buffer together with a scratch plane of `size` bytes
    pub fn integral_and_scratch(&mut self, size: usize) -> (&mut Vec<u64>, &mut [u8]) {
        if size > self.scratch.capacity() {
            self.growths += 1;
        } else {
            self.reuses += 1;
        }
        self.scratch.clear();
        self.scratch.resize(size, 0);
        (&mut self.integral, &mut self.scratch[..size])
    }

    /// Scratch capacity in bytes
    pub fn capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// (reuses, growths) since creation
    pub fn stats(&self) -> (usize, usize) {
        (self.reuses, self.growths)
    }

    /// Clear all buffers (resets lengths but keeps capacity)
    pub fn clear(&mut self) {
        self.integral.clear();
        self.scratch.clear();
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
