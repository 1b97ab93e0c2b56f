use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use serde::Serialize;
use thiserror::Error;

use crate::capture::domain::capture_source::CaptureOpener;
use crate::streaming::streaming_loop::{LoopReport, StreamingLoop};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("streaming session is already running")]
    AlreadyRunning,
    #[error("failed to open capture: {0}")]
    CaptureOpen(String),
    #[error("streaming worker panicked; the pipeline is no longer available")]
    WorkerPanicked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

struct Worker {
    handle: JoinHandle<(StreamingLoop, LoopReport)>,
    stop: Arc<AtomicBool>,
}

/// Owns the pipeline and at most one streaming worker.
///
/// Idle → Running on `start`, Running → Stopped on `stop` or when the
/// worker ends by itself. A start while Running is rejected, so a capture
/// device never has two readers.
pub struct StreamSession {
    opener: CaptureOpener,
    pipeline: Option<StreamingLoop>,
    worker: Option<Worker>,
    started: bool,
    last_report: Option<LoopReport>,
}

impl StreamSession {
    pub fn new(opener: CaptureOpener, pipeline: StreamingLoop) -> Self {
        Self {
            opener,
            pipeline: Some(pipeline),
            worker: None,
            started: false,
            last_report: None,
        }
    }

    pub fn state(&self) -> SessionState {
        match &self.worker {
            Some(worker) if !worker.handle.is_finished() => SessionState::Running,
            _ if self.started => SessionState::Stopped,
            _ => SessionState::Idle,
        }
    }

    /// Report from the most recently joined worker.
    pub fn last_report(&self) -> Option<&LoopReport> {
        self.last_report.as_ref()
    }

    /// Opens the capture and spawns the worker.
    ///
    /// If a previous worker ended on its own it is joined first and its
    /// pipeline reused.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state() == SessionState::Running {
            return Err(SessionError::AlreadyRunning);
        }
        self.reap()?;

        let mut pipeline = self.pipeline.take().ok_or(SessionError::WorkerPanicked)?;
        let capture = match (self.opener)() {
            Ok(capture) => capture,
            Err(e) => {
                self.pipeline = Some(pipeline);
                return Err(SessionError::CaptureOpen(e.to_string()));
            }
        };

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            let report = pipeline.run(capture, &worker_stop);
            (pipeline, report)
        });

        self.worker = Some(Worker { handle, stop });
        self.started = true;
        log::info!("Streaming session started");
        Ok(())
    }

    /// Signals the worker and waits for it. Safe to call in any state.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if let Some(worker) = &self.worker {
            worker.stop.store(true, Ordering::Relaxed);
        }
        self.reap()
    }

    fn reap(&mut self) -> Result<(), SessionError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        match worker.handle.join() {
            Ok((pipeline, report)) => {
                log::info!("Streaming worker exited: {:?}", report.exit);
                self.pipeline = Some(pipeline);
                self.last_report = Some(report);
                Ok(())
            }
            Err(_) => {
                log::error!("Streaming worker panicked");
                Err(SessionError::WorkerPanicked)
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Session shutdown: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::capture_source::CaptureSource;
    use crate::streaming::streaming_loop::tests::{face_loop, ScriptedCapture};
    use crate::streaming::streaming_loop::LoopExit;
    use crate::streaming::viewer_registry::{ChannelViewer, ViewerRegistry};
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct Counters {
        opens: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
    }

    /// Opener producing captures that yield `frames` frames (endless if `None`).
    fn opener(frames: Option<usize>, fail_first: bool) -> (CaptureOpener, Counters) {
        let opens = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let counters = Counters {
            opens: Arc::clone(&opens),
            releases: Arc::clone(&releases),
        };
        let opener: CaptureOpener = Box::new(
            move || -> Result<Box<dyn CaptureSource>, Box<dyn std::error::Error>> {
                let attempt = opens.fetch_add(1, Ordering::SeqCst);
                if fail_first && attempt == 0 {
                    return Err("camera busy".into());
                }
                let mut capture = match frames {
                    Some(n) => ScriptedCapture::new(vec![Ok(()); n]),
                    None => ScriptedCapture::endless(),
                };
                capture.releases = Arc::clone(&releases);
                Ok(Box::new(capture))
            },
        );
        (opener, counters)
    }

    fn wait_until_not_running(session: &StreamSession) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while session.state() == SessionState::Running {
            assert!(Instant::now() < deadline, "worker did not finish");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_new_session_is_idle() {
        let (opener, counters) = opener(None, false);
        let mut session = StreamSession::new(opener, face_loop(Arc::new(ViewerRegistry::new()), false));
        assert_eq!(session.state(), SessionState::Idle);
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(counters.opens.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_start_is_rejected() {
        let (opener, counters) = opener(None, false);
        let mut session = StreamSession::new(opener, face_loop(Arc::new(ViewerRegistry::new()), false));

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        assert_eq!(session.start(), Err(SessionError::AlreadyRunning));
        assert_eq!(counters.opens.load(Ordering::SeqCst), 1);

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
        assert_eq!(session.last_report().map(|r| &r.exit), Some(&LoopExit::Stopped));
    }

    #[test]
    fn test_restart_after_capture_ends_reuses_pipeline() {
        let registry = Arc::new(ViewerRegistry::new());
        let (viewer, rx) = ChannelViewer::new();
        registry.register(Box::new(viewer));
        let (opener, counters) = opener(Some(2), false);
        let mut session = StreamSession::new(opener, face_loop(Arc::clone(&registry), false));

        session.start().unwrap();
        wait_until_not_running(&session);
        assert_eq!(session.state(), SessionState::Stopped);

        session.start().unwrap();
        wait_until_not_running(&session);
        session.stop().unwrap();

        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 2);
        assert_eq!(rx.try_iter().count(), 4);
        let report = session.last_report().unwrap();
        assert_eq!(report.broadcast, 2);
        assert!(matches!(report.exit, LoopExit::CaptureFailed(_)));
    }

    #[test]
    fn test_failed_open_keeps_pipeline_for_retry() {
        let (opener, counters) = opener(None, true);
        let mut session = StreamSession::new(opener, face_loop(Arc::new(ViewerRegistry::new()), false));

        let err = session.start().unwrap_err();
        assert_eq!(err, SessionError::CaptureOpen("camera busy".into()));
        assert_eq!(session.state(), SessionState::Idle);

        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Running);
        session.stop().unwrap();
        assert_eq!(counters.opens.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (opener, counters) = opener(None, false);
        let mut session = StreamSession::new(opener, face_loop(Arc::new(ViewerRegistry::new()), false));
        session.start().unwrap();
        session.stop().unwrap();
        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_stops_worker_and_releases_capture() {
        let (opener, counters) = opener(None, false);
        let mut session = StreamSession::new(opener, face_loop(Arc::new(ViewerRegistry::new()), false));
        session.start().unwrap();
        drop(session);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&SessionState::Running).unwrap(), "\"running\"");
    }
}
