pub mod session;
pub mod streaming_loop;
pub mod viewer_registry;
