//! Logging plumbing and request timing helpers

mod logging;
mod request_time;

pub use logging::{setup_logging, LogConfig, Logger, MemoryLogger, TracingLogger, LOG_TAG};
pub use request_time::request_queue_time;
