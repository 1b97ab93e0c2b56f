pub mod onnx_keypoint_classifier;
