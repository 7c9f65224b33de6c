//! Decode backends
//!
//! A backend turns a luminance image into zero or more decoded symbols. Two
//! concrete backends are provided and chosen through configuration:
//!
//! - [`fast::RqrrBackend`] decodes the single symbol closest to the image
//!   center.
//! - [`robust::RxingBackend`] runs a multi-symbol reader that copes better
//!   with noise at a higher cost.
//!
//! [`chain::BackendChain`] applies the per-region fallback policy.

pub mod chain;
pub mod fast;
pub mod robust;

pub use chain::{BackendChain, ChainOutcome};
pub use fast::RqrrBackend;
pub use robust::RxingBackend;

use crate::error::DecodeError;
use crate::models::{BackendKind, LumaPlane, Quad};

/// One symbol decoded by a backend, in the coordinates of the image it was given
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub payload: String,
    /// Backend confidence in [0, 1]
    pub confidence: f32,
    pub location: Option<Quad>,
}

/// A stateless decoder
///
/// Implementations must not keep state between calls: feeding the same image
/// twice gives the same answer.
pub trait DecodeBackend: Send + Sync {
    /// Short identifier used in logs and candidates
    fn name(&self) -> &'static str;

    /// Speed/robustness class, which decides the invocation order
    fn kind(&self) -> BackendKind;

    /// Decode every symbol the backend can find in `image`
    fn decode(&self, image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError>;
}
