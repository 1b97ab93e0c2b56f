pub const FACE_DETECTOR_MODEL_NAME: &str = "face_detector.onnx";
pub const FACE_MESH_MODEL_NAME: &str = "face_mesh.onnx";
pub const KEYPOINT_CLASSIFIER_MODEL_NAME: &str = "keypoint_classifier.onnx";
pub const LABELS_FILE_NAME: &str = "keypoint_classifier_label.csv";

pub const DEFAULT_CAPTURE_DEVICE: &str = "0";
pub const DEFAULT_CAPTURE_WIDTH: u32 = 1920;
pub const DEFAULT_CAPTURE_HEIGHT: u32 = 1080;

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Face presence probability below which the mesh output is discarded.
pub const DEFAULT_FACE_PRESENCE_THRESHOLD: f32 = 0.5;

/// Minimum face detector score for a box to become a mesh crop.
pub const DEFAULT_FACE_DETECTION_CONFIDENCE: f32 = 0.5;

/// Height of the filled label band drawn above the bounding box.
pub const LABEL_BAND_HEIGHT: i32 = 22;

pub const LABEL_PREFIX: &str = "Emotion :";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
