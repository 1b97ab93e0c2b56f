pub mod frame_cycle;
pub mod payload_encoder;
pub mod pipeline_logger;
