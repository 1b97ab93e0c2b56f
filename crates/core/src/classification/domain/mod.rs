pub mod keypoint_classifier;
pub mod label_table;
