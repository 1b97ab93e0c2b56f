pub mod bounding_rect;
pub mod feature_vector;
pub mod landmark_set;
