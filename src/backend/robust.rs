use rxing::BarcodeFormat;
use tracing::trace;

use super::{DecodeBackend, Decoded};
use crate::error::DecodeError;
use crate::models::{BackendKind, LumaPlane, Point, Quad};

/// Confidence reported for symbols returned by the multi reader
const RXING_CONFIDENCE: f32 = 0.8;

/// Multi-symbol backend built on `rxing`
///
/// Results in linear (1D) formats are dropped; only 2D symbologies count as
/// codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RxingBackend;

impl RxingBackend {
    pub fn new() -> Self {
        Self
    }
}

fn is_matrix_code(format: &BarcodeFormat) -> bool {
    matches!(
        format,
        BarcodeFormat::QR_CODE
            | BarcodeFormat::DATA_MATRIX
            | BarcodeFormat::AZTEC
            | BarcodeFormat::PDF_417
            | BarcodeFormat::MAXICODE
    )
}

impl DecodeBackend for RxingBackend {
    fn name(&self) -> &'static str {
        "rxing"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::RobustMulti
    }

    fn decode(&self, image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
        if image.width == 0 || image.height == 0 {
            return Ok(Vec::new());
        }
        let results = rxing::helpers::detect_multiple_in_luma(
            image.data.clone(),
            image.width as u32,
            image.height as u32,
        )
        .map_err(|err| DecodeError::Backend {
            backend: "rxing",
            message: format!("{err:?}"),
        })?;

        let decoded = results
            .iter()
            .filter(|r| {
                let keep = is_matrix_code(r.getBarcodeFormat());
                if !keep {
                    trace!(format = ?r.getBarcodeFormat(), "rxing result is not a 2D code");
                }
                keep
            })
            .map(|r| Decoded {
                payload: r.getText().to_string(),
                confidence: RXING_CONFIDENCE,
                location: Quad::from_points(
                    r.getPoints().iter().map(|p| Point::new(p.x, p.y)).collect(),
                ),
            })
            .collect();
        Ok(decoded)
    }
}
