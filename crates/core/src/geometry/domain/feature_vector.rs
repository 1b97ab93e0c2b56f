//! Translation- and scale-invariant encoding of a landmark set.
//!
//! The classifier was fitted against exactly this layout: anchor-relative
//! offsets, interleaved `x0, y0, x1, y1, ...` in landmark index order, divided
//! by the largest absolute offset.

use crate::shared::error::PipelineError;

use super::landmark_set::LandmarkSet;

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedFeatureVector {
    values: Vec<f32>,
}

impl NormalizedFeatureVector {
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Anchor-then-scale normalization.
///
/// Fails with `DegenerateGeometry` when every landmark coincides with the
/// anchor, since there is no scale to divide by.
pub fn normalize(landmarks: &LandmarkSet) -> Result<NormalizedFeatureVector, PipelineError> {
    let (bx, by) = landmarks.anchor();

    let offsets: Vec<i64> = landmarks
        .points()
        .iter()
        .flat_map(|&(x, y)| [x as i64 - bx as i64, y as i64 - by as i64])
        .collect();

    let max_abs = offsets.iter().map(|v| v.abs()).max().unwrap_or(0);
    if max_abs == 0 {
        return Err(PipelineError::DegenerateGeometry {
            landmarks: landmarks.len(),
        });
    }

    let scale = max_abs as f64;
    let values = offsets
        .into_iter()
        .map(|v| (v as f64 / scale) as f32)
        .collect();

    Ok(NormalizedFeatureVector { values })
}
