//! Latency Agent - in-process queue latency telemetry
//!
//! Worker adapters sample job backends and push per-queue latency into a
//! shared [`Store`]; a background [`Reporter`] drains the store on a fixed
//! interval and ships each batch to a remote collector over HTTP.
//!
//! ```no_run
//! # async fn run() -> latency_agent::Result<()> {
//! use latency_agent::{setup_logging, Agent, AgentConfig};
//!
//! let config = AgentConfig::from_env()?;
//! setup_logging(config.log_config())?;
//!
//! let agent = Agent::builder()
//!     .with_config(config)
//!     .start()
//!     .await?;
//!
//! agent.record_request_queue_time("t=1700000000123");
//!
//! agent.shutdown().await?;
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod adapters;
pub mod agent;
pub mod config;
pub mod error;
pub mod metrics;
pub mod reporting;
pub mod utils;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const MIN_RUST_VERSION: &str = "1.73.0";

// Re-exports for public API
pub use adapters::{QueueLatencyAdapter, QueueSource, WorkerAdapter};
pub use agent::{Agent, AgentBuilder};
pub use config::{AdapterConfig, AgentConfig, LogLevel};
pub use error::{AgentError, Result};
pub use metrics::{Measurement, ReporterStats, Store};
pub use reporting::{HttpTransport, Reporter, ReporterHandle, Transport};
pub use utils::{setup_logging, LogConfig, Logger, TracingLogger};
