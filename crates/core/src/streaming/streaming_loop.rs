use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::capture::domain::capture_source::CaptureSource;
use crate::pipeline::frame_cycle::FrameCycle;
use crate::pipeline::payload_encoder::PayloadEncoder;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::streaming::viewer_registry::ViewerRegistry;

/// Why the worker stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    CaptureFailed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopReport {
    pub frames_captured: usize,
    pub broadcast: usize,
    pub skipped: usize,
    pub exit: LoopExit,
}

/// The capture → process → broadcast worker body.
///
/// Owns every pipeline component so the whole loop can move onto the
/// worker thread and come back intact when it ends.
pub struct StreamingLoop {
    cycle: FrameCycle,
    encoder: PayloadEncoder,
    registry: Arc<ViewerRegistry>,
    logger: Box<dyn PipelineLogger>,
    broadcast_no_face: bool,
}

impl StreamingLoop {
    pub fn new(
        cycle: FrameCycle,
        encoder: PayloadEncoder,
        registry: Arc<ViewerRegistry>,
        logger: Box<dyn PipelineLogger>,
        broadcast_no_face: bool,
    ) -> Self {
        Self {
            cycle,
            encoder,
            registry,
            logger,
            broadcast_no_face,
        }
    }

    /// Runs until `stop` is raised or the capture fails.
    ///
    /// Per-frame failures skip the frame. The capture is released exactly
    /// once on every exit path, including unwinding.
    pub fn run(&mut self, capture: Box<dyn CaptureSource>, stop: &AtomicBool) -> LoopReport {
        let mut capture = CaptureGuard(capture);
        let mut report = LoopReport {
            frames_captured: 0,
            broadcast: 0,
            skipped: 0,
            exit: LoopExit::Stopped,
        };
        self.logger.reset();

        loop {
            if stop.load(Ordering::Relaxed) {
                log::info!("Stop requested, ending stream");
                break;
            }

            match self.step(capture.0.as_mut(), &mut report) {
                Ok(true) => report.broadcast += 1,
                Ok(false) => {}
                Err(e) if e.is_terminal() => {
                    log::error!("{e}; ending stream");
                    report.exit = LoopExit::CaptureFailed(e.to_string());
                    break;
                }
                Err(e) => {
                    log::warn!("Frame {} skipped: {e}", report.frames_captured);
                    report.skipped += 1;
                }
            }
        }

        drop(capture);
        self.logger.info(&format!(
            "Stream ended: {} captured, {} broadcast, {} skipped",
            report.frames_captured, report.broadcast, report.skipped
        ));
        self.logger.summary();
        report
    }

    fn step(
        &mut self,
        capture: &mut dyn CaptureSource,
        report: &mut LoopReport,
    ) -> Result<bool, PipelineError> {
        let frame = capture
            .read()
            .map_err(|e| PipelineError::CaptureFailure(e.to_string()))?;
        report.frames_captured += 1;
        self.logger.progress(report.frames_captured);
        self.process(frame)
    }

    /// Returns whether a payload went out.
    fn process(&mut self, frame: Frame) -> Result<bool, PipelineError> {
        let outcome = self.cycle.run(frame, self.logger.as_mut())?;
        if outcome.class_id().is_none() && !self.broadcast_no_face {
            log::debug!("No face in frame {}", outcome.frame().index());
            return Ok(false);
        }

        let (emotion_id, frame) = outcome.into_parts();
        let t0 = Instant::now();
        let payload = self.encoder.encode(&frame, emotion_id)?;
        self.logger
            .timing("encode", t0.elapsed().as_secs_f64() * 1000.0);

        let delivered = self.registry.broadcast(Arc::new(payload));
        self.logger.metric("viewers", delivered as f64);
        Ok(true)
    }
}

/// Releases the wrapped capture when dropped.
struct CaptureGuard(Box<dyn CaptureSource>);

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}
