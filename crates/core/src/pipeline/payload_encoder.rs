use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use serde::Serialize;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;

/// One broadcast event: `{"emotion_id": <int|null>, "image": "<base64 jpeg>"}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StreamPayload {
    pub emotion_id: Option<usize>,
    pub image: String,
}

impl StreamPayload {
    pub fn to_json(&self) -> Result<String, PipelineError> {
        serde_json::to_string(self).map_err(|e| PipelineError::EncodingFailure(e.to_string()))
    }
}

/// JPEG-compresses annotated frames and wraps them for viewers.
#[derive(Clone, Debug)]
pub struct PayloadEncoder {
    quality: u8,
}

impl PayloadEncoder {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn encode(
        &self,
        frame: &Frame,
        emotion_id: Option<usize>,
    ) -> Result<StreamPayload, PipelineError> {
        let jpeg = self.encode_jpeg(frame)?;
        Ok(StreamPayload {
            emotion_id,
            image: base64::engine::general_purpose::STANDARD.encode(jpeg),
        })
    }

    fn encode_jpeg(&self, frame: &Frame) -> Result<Vec<u8>, PipelineError> {
        if frame.channels() != 3 {
            return Err(PipelineError::EncodingFailure(format!(
                "expected an RGB frame, got {} channels",
                frame.channels()
            )));
        }
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.quality)
            .encode(
                frame.data(),
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PipelineError::EncodingFailure(format!("JPEG encode failed: {e}")))?;
        Ok(buffer)
    }
}
