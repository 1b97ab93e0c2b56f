pub mod face_locator;
pub mod landmark_detector;
