pub mod onnx_blazeface_locator;
pub mod onnx_face_mesh_detector;
