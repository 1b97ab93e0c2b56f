use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CAPTURE_DEVICE, DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH,
    DEFAULT_FACE_DETECTION_CONFIDENCE, DEFAULT_FACE_PRESENCE_THRESHOLD, DEFAULT_JPEG_QUALITY,
};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("capture device must not be empty")]
    EmptyDevice,
    #[error("capture resolution must be non-zero, got {width}x{height}")]
    ZeroResolution { width: u32, height: u32 },
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    JpegQuality(u8),
    #[error("face presence threshold must be between 0.0 and 1.0, got {0}")]
    PresenceThreshold(f32),
    #[error("face detection confidence must be between 0.0 and 1.0, got {0}")]
    DetectionConfidence(f32),
}

/// Settings consumed by the streaming core.
///
/// Built once at startup and never mutated afterwards; the session and its
/// worker only ever see a shared reference or a clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_device")]
    pub capture_device: String,
    #[serde(default = "default_width")]
    pub capture_width: u32,
    #[serde(default = "default_height")]
    pub capture_height: u32,
    #[serde(default = "default_true")]
    pub draw_bounding_box: bool,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub broadcast_no_face: bool,
    #[serde(default = "default_presence_threshold")]
    pub face_presence_threshold: f32,
    #[serde(default = "default_detection_confidence")]
    pub face_detection_confidence: f32,
}

fn default_device() -> String {
    DEFAULT_CAPTURE_DEVICE.to_string()
}

fn default_width() -> u32 {
    DEFAULT_CAPTURE_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_CAPTURE_HEIGHT
}

fn default_true() -> bool {
    true
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_presence_threshold() -> f32 {
    DEFAULT_FACE_PRESENCE_THRESHOLD
}

fn default_detection_confidence() -> f32 {
    DEFAULT_FACE_DETECTION_CONFIDENCE
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capture_device: default_device(),
            capture_width: default_width(),
            capture_height: default_height(),
            draw_bounding_box: true,
            jpeg_quality: default_jpeg_quality(),
            broadcast_no_face: false,
            face_presence_threshold: default_presence_threshold(),
            face_detection_confidence: default_detection_confidence(),
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_device.trim().is_empty() {
            return Err(ConfigError::EmptyDevice);
        }
        if self.capture_width == 0 || self.capture_height == 0 {
            return Err(ConfigError::ZeroResolution {
                width: self.capture_width,
                height: self.capture_height,
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::JpegQuality(self.jpeg_quality));
        }
        if !(0.0..=1.0).contains(&self.face_presence_threshold) {
            return Err(ConfigError::PresenceThreshold(self.face_presence_threshold));
        }
        if !(0.0..=1.0).contains(&self.face_detection_confidence) {
            return Err(ConfigError::DetectionConfidence(
                self.face_detection_confidence,
            ));
        }
        Ok(())
    }
}
