use thiserror::Error;

/// Failure taxonomy for one pass of the frame pipeline.
///
/// Only `CaptureFailure` ends a streaming session; every other variant
/// skips the current frame and the loop carries on with the next capture.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("capture failed: {0}")]
    CaptureFailure(String),
    #[error("landmark detection failed: {0}")]
    DetectionFailure(String),
    #[error("classification failed: {0}")]
    ClassificationFailure(String),
    #[error("degenerate geometry: all {landmarks} landmarks coincide with the anchor")]
    DegenerateGeometry { landmarks: usize },
    #[error("invalid landmark input: {0}")]
    InvalidInput(String),
    #[error("frame encoding failed: {0}")]
    EncodingFailure(String),
}

impl PipelineError {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineError::CaptureFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::capture(PipelineError::CaptureFailure("eof".into()), true)]
    #[case::detection(PipelineError::DetectionFailure("x".into()), false)]
    #[case::classification(PipelineError::ClassificationFailure("x".into()), false)]
    #[case::degenerate(PipelineError::DegenerateGeometry { landmarks: 4 }, false)]
    #[case::invalid(PipelineError::InvalidInput("x".into()), false)]
    #[case::encoding(PipelineError::EncodingFailure("x".into()), false)]
    fn test_only_capture_failure_is_terminal(#[case] err: PipelineError, #[case] terminal: bool) {
        assert_eq!(err.is_terminal(), terminal);
    }

    #[test]
    fn test_messages_name_the_cause() {
        let err = PipelineError::DegenerateGeometry { landmarks: 468 };
        assert_eq!(
            err.to_string(),
            "degenerate geometry: all 468 landmarks coincide with the anchor"
        );
        let err = PipelineError::CaptureFailure("device unplugged".into());
        assert_eq!(err.to_string(), "capture failed: device unplugged");
    }
}
