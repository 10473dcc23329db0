pub mod config;
pub mod device;
pub mod error;
pub mod host;
pub mod log_sink;
pub mod queue;
pub mod sun;
pub mod trace;
