use crate::shared::frame::Frame;

/// A live frame source (camera, stream URL or file).
///
/// Only the streaming worker reads from or releases a capture source.
/// `release` must be safe to call more than once; callers still invoke it
/// exactly once per opened source.
pub trait CaptureSource: Send {
    /// Blocks until the next frame is available. Any error is terminal for
    /// the session (device gone, end of stream).
    fn read(&mut self) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Releases the underlying device handle.
    fn release(&mut self);
}

/// Opens a fresh capture source each time a session starts.
pub type CaptureOpener =
    Box<dyn Fn() -> Result<Box<dyn CaptureSource>, Box<dyn std::error::Error>> + Send>;
