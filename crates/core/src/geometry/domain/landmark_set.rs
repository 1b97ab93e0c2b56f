use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;

/// A detector landmark in unit coordinates (nominally `[0, 1]` on each axis).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawLandmark {
    pub x: f32,
    pub y: f32,
}

impl RawLandmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Ordered pixel-space landmarks for one face. Index 0 is the anchor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LandmarkSet {
    points: Vec<(i32, i32)>,
}

impl LandmarkSet {
    pub fn new(points: Vec<(i32, i32)>) -> Result<Self, PipelineError> {
        if points.is_empty() {
            return Err(PipelineError::InvalidInput("landmark set is empty".into()));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }

    pub fn anchor(&self) -> (i32, i32) {
        self.points[0]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Maps unit-interval detector output into the frame's pixel grid.
    ///
    /// Each coordinate becomes `clamp(round(c * dim), 0, dim - 1)`.
    pub fn from_raw(frame: &Frame, raw: &[RawLandmark]) -> Result<Self, PipelineError> {
        let width = frame.width();
        let height = frame.height();
        if width == 0 || height == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "frame has zero dimension {width}x{height}"
            )));
        }
        if raw.is_empty() {
            return Err(PipelineError::InvalidInput(
                "detector returned an empty landmark list".into(),
            ));
        }

        let points = raw
            .iter()
            .enumerate()
            .map(|(i, lm)| {
                if !lm.x.is_finite() || !lm.y.is_finite() {
                    return Err(PipelineError::InvalidInput(format!(
                        "landmark {i} has non-finite coordinates ({}, {})",
                        lm.x, lm.y
                    )));
                }
                Ok((to_pixel(lm.x, width), to_pixel(lm.y, height)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { points })
    }
}

fn to_pixel(coord: f32, dimension: u32) -> i32 {
    let max = (dimension - 1) as f64;
    (coord as f64 * dimension as f64).round().clamp(0.0, max) as i32
}
