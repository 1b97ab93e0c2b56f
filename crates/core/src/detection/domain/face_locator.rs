use crate::shared::frame::Frame;

/// Pixel-space face box with its detection score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: f32,
}

impl FaceBox {
    /// Square box around the same center, `scale` times the longer side.
    ///
    /// The result may extend past the frame edges; callers pad with black.
    pub fn expanded_square(&self, scale: f32) -> FaceBox {
        let cx = self.x as f32 + self.width as f32 / 2.0;
        let cy = self.y as f32 + self.height as f32 / 2.0;
        let side = (self.width.max(self.height) as f32 * scale).round().max(1.0);
        FaceBox {
            x: (cx - side / 2.0).round() as i32,
            y: (cy - side / 2.0).round() as i32,
            width: side as i32,
            height: side as i32,
            score: self.score,
        }
    }
}

/// Finds face boxes so the landmark model can run on a tight crop.
///
/// Boxes come back strongest first.
pub trait FaceLocator: Send {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceBox>, Box<dyn std::error::Error>>;
}
