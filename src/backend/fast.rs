use rqrr::PreparedImage;
use tracing::trace;

use super::{DecodeBackend, Decoded};
use crate::error::DecodeError;
use crate::models::{BackendKind, LumaPlane, Point, Quad};

/// Confidence reported for a symbol that passed rqrr's error correction
const RQRR_CONFIDENCE: f32 = 0.9;

/// Single-symbol backend built on `rqrr`
///
/// Grids are tried nearest-to-center first and the first one that decodes is
/// returned, so a well-centered code costs a single decode.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrBackend;

impl RqrrBackend {
    pub fn new() -> Self {
        Self
    }
}

fn grid_quad(bounds: &[rqrr::Point; 4]) -> Option<Quad> {
    Quad::from_points(
        bounds
            .iter()
            .map(|p| Point::new(p.x as f32, p.y as f32))
            .collect(),
    )
}

impl DecodeBackend for RqrrBackend {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::FastSingle
    }

    fn decode(&self, image: &LumaPlane) -> Result<Vec<Decoded>, DecodeError> {
        if image.width == 0 || image.height == 0 {
            return Ok(Vec::new());
        }
        let mut prepared =
            PreparedImage::prepare_from_greyscale(image.width, image.height, |x, y| {
                image.data[y * image.width + x]
            });
        let grids = prepared.detect_grids();
        if grids.is_empty() {
            return Ok(Vec::new());
        }

        let center = Point::new(image.width as f32 / 2.0, image.height as f32 / 2.0);
        let mut ordered: Vec<(f32, usize)> = grids
            .iter()
            .enumerate()
            .map(|(i, g)| {
                let d = grid_quad(&g.bounds)
                    .map(|q| q.center().distance_squared(&center))
                    .unwrap_or(f32::MAX);
                (d, i)
            })
            .collect();
        ordered.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut last_error = None;
        for (_, i) in ordered {
            let grid = &grids[i];
            match grid.decode() {
                Ok((_meta, content)) => {
                    return Ok(vec![Decoded {
                        payload: content,
                        confidence: RQRR_CONFIDENCE,
                        location: grid_quad(&grid.bounds),
                    }]);
                }
                Err(err) => {
                    trace!(grid = i, error = ?err, "rqrr grid failed to decode");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(DecodeError::Backend {
                backend: "rqrr",
                message: format!("{err:?}"),
            }),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_image_decodes_to_nothing() {
        let image = LumaPlane::new(&vec![255u8; 64 * 64], 64, 64);
        assert!(RqrrBackend::new().decode(&image).unwrap().is_empty());
    }

    #[test]
    fn zero_sized_image_decodes_to_nothing() {
        let image = LumaPlane {
            width: 0,
            height: 0,
            data: Vec::new(),
        };
        assert!(RqrrBackend::new().decode(&image).unwrap().is_empty());
    }
}
