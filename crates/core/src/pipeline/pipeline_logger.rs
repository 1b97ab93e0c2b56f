use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting sink for streaming-loop observability.
///
/// The frame cycle reports per-stage timings and the loop reports frame
/// counts, so the orchestration code never decides where they end up.
pub trait PipelineLogger: Send {
    /// Called when a stream starts. Drops anything left from a previous run.
    fn reset(&mut self) {}

    /// Called once per captured frame with the running total.
    fn progress(&mut self, frames_captured: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. connected viewers).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-loop summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by tests and embedders with their own reporting.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _frames_captured: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Fixed-size running aggregate of one stage or metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunningStats {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl RunningStats {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Server-side logger: aggregates per-stage timings and metrics and prints
/// a throttled progress line plus a summary when the loop exits.
///
/// Memory stays constant however long the stream runs; `reset` starts a
/// fresh aggregation for the next session.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    timings: HashMap<String, RunningStats>,
    metrics: HashMap<String, RunningStats>,
    start_time: Instant,
    frames_captured: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames_captured: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames_captured;
        let mut lines = vec![format!(
            "Stream summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, stats) in stages {
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  min {:6.1}ms  max {:6.1}ms  total {:7.0}ms  ({} samples)",
                stats.mean(),
                stats.min,
                stats.max,
                stats.sum,
                stats.count
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, stats) in names {
            lines.push(format!("  {name}: avg {:.1}", stats.mean()));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&RunningStats> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&RunningStats> {
        self.metrics.get(name)
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

fn record(map: &mut HashMap<String, RunningStats>, key: &str, value: f64) {
    match map.get_mut(key) {
        Some(stats) => stats.record(value),
        None => {
            map.insert(key.to_string(), RunningStats::new(value));
        }
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn reset(&mut self) {
        self.timings.clear();
        self.metrics.clear();
        self.frames_captured = 0;
        self.start_time = Instant::now();
    }

    fn progress(&mut self, frames_captured: usize) {
        self.frames_captured = frames_captured;
        if frames_captured % self.throttle_frames == 0 {
            log::info!("Streaming: {frames_captured} frames captured");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
