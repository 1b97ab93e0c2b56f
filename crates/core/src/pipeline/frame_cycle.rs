use std::time::Instant;

use crate::annotation::domain::annotation_renderer::AnnotationRenderer;
use crate::classification::domain::keypoint_classifier::KeypointClassifier;
use crate::classification::domain::label_table::LabelTable;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::geometry::domain::bounding_rect::BoundingRect;
use crate::geometry::domain::feature_vector::normalize;
use crate::geometry::domain::landmark_set::LandmarkSet;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;

/// Result of one pass over a captured frame.
#[derive(Debug)]
pub enum CycleOutcome {
    /// No usable face; carries the mirrored capture without annotations.
    NoFace(Frame),
    FaceFound {
        class_id: usize,
        label: String,
        frame: Frame,
    },
}

impl CycleOutcome {
    pub fn class_id(&self) -> Option<usize> {
        match self {
            CycleOutcome::NoFace(_) => None,
            CycleOutcome::FaceFound { class_id, .. } => Some(*class_id),
        }
    }

    pub fn frame(&self) -> &Frame {
        match self {
            CycleOutcome::NoFace(frame) | CycleOutcome::FaceFound { frame, .. } => frame,
        }
    }

    pub fn into_parts(self) -> (Option<usize>, Frame) {
        match self {
            CycleOutcome::NoFace(frame) => (None, frame),
            CycleOutcome::FaceFound {
                class_id, frame, ..
            } => (Some(class_id), frame),
        }
    }
}

/// Mirror → detect → normalize → classify → annotate for a single frame.
///
/// Owns the inference components; the streaming worker holds one of these
/// for the lifetime of a session and hands it back when the loop exits.
pub struct FrameCycle {
    detector: Box<dyn LandmarkDetector>,
    classifier: Box<dyn KeypointClassifier>,
    labels: LabelTable,
    renderer: AnnotationRenderer,
}

impl FrameCycle {
    pub fn new(
        detector: Box<dyn LandmarkDetector>,
        classifier: Box<dyn KeypointClassifier>,
        labels: LabelTable,
        renderer: AnnotationRenderer,
    ) -> Self {
        Self {
            detector,
            classifier,
            labels,
            renderer,
        }
    }

    pub fn run(
        &mut self,
        mut capture: Frame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<CycleOutcome, PipelineError> {
        capture.flip_horizontal();

        let t0 = Instant::now();
        let faces = self
            .detector
            .detect(&capture)
            .map_err(|e| PipelineError::DetectionFailure(e.to_string()))?;
        logger.timing("detect", elapsed_ms(t0));

        let Some(first) = faces.first() else {
            return Ok(CycleOutcome::NoFace(capture));
        };
        if faces.len() > 1 {
            log::debug!(
                "Frame {}: {} faces detected, ignoring all but the first",
                capture.index(),
                faces.len()
            );
        }

        let landmarks = LandmarkSet::from_raw(&capture, first)?;
        let rect = BoundingRect::enclosing(&landmarks);
        let features = match normalize(&landmarks) {
            Ok(features) => features,
            Err(e @ PipelineError::DegenerateGeometry { .. }) => {
                log::warn!("Frame {}: {e}", capture.index());
                return Ok(CycleOutcome::NoFace(capture));
            }
            Err(e) => return Err(e),
        };

        let t0 = Instant::now();
        let class_id = self
            .classifier
            .classify(&features)
            .map_err(|e| PipelineError::ClassificationFailure(e.to_string()))?;
        logger.timing("classify", elapsed_ms(t0));

        let label = self
            .labels
            .get(class_id)
            .ok_or_else(|| {
                PipelineError::ClassificationFailure(format!(
                    "class id {class_id} has no label ({} labels loaded)",
                    self.labels.len()
                ))
            })?
            .to_string();

        let t0 = Instant::now();
        let frame = self.renderer.annotate(&capture, &rect, &label);
        logger.timing("annotate", elapsed_ms(t0));

        Ok(CycleOutcome::FaceFound {
            class_id,
            label,
            frame,
        })
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
