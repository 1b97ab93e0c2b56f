//! Live facial-emotion streaming: capture, landmark geometry, keypoint
//! classification, annotation and fan-out to connected viewers.

pub mod annotation;
pub mod capture;
pub mod classification;
pub mod detection;
pub mod geometry;
pub mod pipeline;
pub mod shared;
pub mod streaming;
