use crate::geometry::domain::landmark_set::RawLandmark;
use crate::shared::frame::Frame;

/// Domain interface for facial landmark detection.
///
/// Returns one landmark list per detected face, in unit coordinates, possibly
/// empty. Implementations may hold inference state, hence `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Vec<RawLandmark>>, Box<dyn std::error::Error>>;
}
