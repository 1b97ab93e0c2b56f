mod server;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::{Arc, Mutex};

use clap::Parser;

use facemood_core::annotation::domain::annotation_renderer::AnnotationRenderer;
use facemood_core::capture::domain::capture_source::{CaptureOpener, CaptureSource};
use facemood_core::capture::infrastructure::ffmpeg_capture::{CaptureDevice, FfmpegCapture};
use facemood_core::classification::domain::label_table::LabelTable;
use facemood_core::classification::infrastructure::onnx_keypoint_classifier::OnnxKeypointClassifier;
use facemood_core::detection::infrastructure::onnx_blazeface_locator::OnnxBlazefaceLocator;
use facemood_core::detection::infrastructure::onnx_face_mesh_detector::OnnxFaceMeshDetector;
use facemood_core::pipeline::frame_cycle::FrameCycle;
use facemood_core::pipeline::payload_encoder::PayloadEncoder;
use facemood_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facemood_core::shared::constants::{
    DEFAULT_BIND_ADDR, FACE_DETECTOR_MODEL_NAME, FACE_MESH_MODEL_NAME,
    KEYPOINT_CLASSIFIER_MODEL_NAME, LABELS_FILE_NAME,
};
use facemood_core::shared::model_resolver::{self, ModelResolveError};
use facemood_core::shared::stream_config::StreamConfig;
use facemood_core::streaming::session::StreamSession;
use facemood_core::streaming::streaming_loop::StreamingLoop;
use facemood_core::streaming::viewer_registry::ViewerRegistry;

use server::AppState;

/// Live facial emotion recognition streamed to browser viewers.
#[derive(Parser, Debug)]
#[command(name = "facemood")]
struct Cli {
    /// JSON file with stream settings; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Capture device: camera index, device path or stream URL.
    #[arg(long)]
    device: Option<String>,

    /// Requested capture width in pixels.
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height in pixels.
    #[arg(long)]
    height: Option<u32>,

    /// Do not draw the face bounding box.
    #[arg(long)]
    no_bounding_box: bool,

    /// JPEG quality for streamed frames (1-100).
    #[arg(long)]
    jpeg_quality: Option<u8>,

    /// Also stream frames in which no face was found.
    #[arg(long)]
    broadcast_no_face: bool,

    /// Minimum face presence score (0.0-1.0) for the landmark model.
    #[arg(long)]
    presence_threshold: Option<f32>,

    /// Minimum face detector score (0.0-1.0) for cropping the landmark input.
    #[arg(long)]
    detection_confidence: Option<f32>,

    /// Face detector ONNX model. Without one the landmark model sees the
    /// whole frame.
    #[arg(long)]
    face_detector_model: Option<PathBuf>,

    /// Face mesh ONNX model (searched in the model cache and ./models if omitted).
    #[arg(long)]
    face_mesh_model: Option<PathBuf>,

    /// Keypoint classifier ONNX model.
    #[arg(long)]
    classifier_model: Option<PathBuf>,

    /// Label file, one class label per line.
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Address to serve the viewer page and WebSocket on.
    #[arg(long, default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Start streaming immediately instead of waiting for a viewer command.
    #[arg(long)]
    autostart: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    log::info!("Stream settings: {config:?}");

    let registry = Arc::new(ViewerRegistry::new());
    let mut session = build_session(&cli, &config, Arc::clone(&registry))?;
    if cli.autostart {
        session.start()?;
    }

    let state = AppState::new(Arc::new(Mutex::new(session)), registry);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(&cli.bind, state))
}

/// Defaults, then the `--config` file, then explicit flags.
fn load_config(cli: &Cli) -> Result<StreamConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => read_config_file(path)?,
        None => StreamConfig::default(),
    };

    if let Some(device) = &cli.device {
        config.capture_device = device.clone();
    }
    if let Some(width) = cli.width {
        config.capture_width = width;
    }
    if let Some(height) = cli.height {
        config.capture_height = height;
    }
    if cli.no_bounding_box {
        config.draw_bounding_box = false;
    }
    if let Some(quality) = cli.jpeg_quality {
        config.jpeg_quality = quality;
    }
    if cli.broadcast_no_face {
        config.broadcast_no_face = true;
    }
    if let Some(threshold) = cli.presence_threshold {
        config.face_presence_threshold = threshold;
    }
    if let Some(confidence) = cli.detection_confidence {
        config.face_detection_confidence = confidence;
    }

    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<StreamConfig, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
    let config = serde_json::from_str(&json)
        .map_err(|e| format!("Invalid config {}: {e}", path.display()))?;
    Ok(config)
}

fn build_session(
    cli: &Cli,
    config: &StreamConfig,
    registry: Arc<ViewerRegistry>,
) -> Result<StreamSession, Box<dyn std::error::Error>> {
    let mesh_path = model_resolver::resolve(FACE_MESH_MODEL_NAME, cli.face_mesh_model.as_deref())?;
    let classifier_path = model_resolver::resolve(
        KEYPOINT_CLASSIFIER_MODEL_NAME,
        cli.classifier_model.as_deref(),
    )?;
    let labels_path = model_resolver::resolve(LABELS_FILE_NAME, cli.labels.as_deref())?;

    let mut detector = OnnxFaceMeshDetector::new(&mesh_path, config.face_presence_threshold)?;
    match locator_model(cli.face_detector_model.as_deref())? {
        Some(path) => {
            let locator = OnnxBlazefaceLocator::new(&path, config.face_detection_confidence)?;
            detector = detector.with_locator(Box::new(locator));
        }
        None => log::warn!(
            "No {FACE_DETECTOR_MODEL_NAME} found; landmarks will run on the whole frame"
        ),
    }
    let classifier = OnnxKeypointClassifier::new(&classifier_path)?;
    let labels = LabelTable::load(&labels_path)?;

    let cycle = FrameCycle::new(
        Box::new(detector),
        Box::new(classifier),
        labels,
        AnnotationRenderer::new(config.draw_bounding_box),
    );
    let pipeline = StreamingLoop::new(
        cycle,
        PayloadEncoder::new(config.jpeg_quality),
        registry,
        Box::new(StdoutPipelineLogger::default()),
        config.broadcast_no_face,
    );

    Ok(StreamSession::new(capture_opener(config), pipeline))
}

/// The face detector is optional unless a path was given explicitly.
fn locator_model(explicit: Option<&Path>) -> Result<Option<PathBuf>, ModelResolveError> {
    match model_resolver::resolve(FACE_DETECTOR_MODEL_NAME, explicit) {
        Ok(path) => Ok(Some(path)),
        Err(ModelResolveError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn capture_opener(config: &StreamConfig) -> CaptureOpener {
    let device = CaptureDevice::parse(&config.capture_device);
    let (width, height) = (config.capture_width, config.capture_height);
    Box::new(move || -> Result<Box<dyn CaptureSource>, Box<dyn std::error::Error>> {
        let capture = FfmpegCapture::open(&device, width, height)?;
        Ok(Box::new(capture) as Box<dyn CaptureSource>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["facemood"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = parse(&[]);
        assert_eq!(cli.bind, DEFAULT_BIND_ADDR);
        assert!(!cli.autostart);
        assert_eq!(load_config(&cli).unwrap(), StreamConfig::default());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        fs::write(
            &path,
            r#"{"capture_device": "/dev/video2", "capture_width": 640, "jpeg_quality": 50}"#,
        )
        .unwrap();

        let cli = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--jpeg-quality",
            "90",
            "--no-bounding-box",
        ]);
        let config = load_config(&cli).unwrap();

        assert_eq!(config.capture_device, "/dev/video2");
        assert_eq!(config.capture_width, 640);
        assert_eq!(config.capture_height, 1080);
        assert_eq!(config.jpeg_quality, 90);
        assert!(!config.draw_bounding_box);
        assert!(!config.broadcast_no_face);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = parse(&["--jpeg-quality", "0"]);
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("JPEG quality"));
    }

    #[test]
    fn test_detection_confidence_flag_is_validated() {
        let cli = parse(&["--detection-confidence", "0.7"]);
        assert_eq!(load_config(&cli).unwrap().face_detection_confidence, 0.7);

        let cli = parse(&["--detection-confidence", "2"]);
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("detection confidence"));
    }

    #[test]
    fn test_explicit_missing_detector_model_is_an_error() {
        let err = locator_model(Some(Path::new("/nonexistent/face_detector.onnx"))).unwrap_err();
        assert!(matches!(err, ModelResolveError::MissingExplicit(_)));
    }

    #[test]
    fn test_explicit_detector_model_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.onnx");
        fs::write(&path, b"").unwrap();
        assert_eq!(locator_model(Some(&path)).unwrap(), Some(path));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let cli = parse(&["--config", "/nonexistent/stream.json"]);
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("Cannot read config"));
    }

    #[test]
    fn test_malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.json");
        fs::write(&path, "{ not json").unwrap();
        let cli = parse(&["--config", path.to_str().unwrap()]);
        assert!(load_config(&cli)
            .unwrap_err()
            .to_string()
            .starts_with("Invalid config"));
    }
}
