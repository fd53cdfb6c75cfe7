use std::fmt;
use std::path::PathBuf;
use std::sync::Once;

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::error::{AgentError, Result};

static INIT: Once = Once::new();

/// Prefix attached to every line the agent emits through `tracing`.
pub const LOG_TAG: &str = "[latency-agent]";
const DEBUG_TAG: &str = "[DEBUG]";

/// Logging capability held by every agent component.
pub trait Logger: Send + Sync {
    fn error(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn info(&self, msg: &str);
    fn debug(&self, msg: &str);
}

/// Forwards agent logs to `tracing`.
///
/// `info` is silenced in quiet mode. `debug` is only emitted when the debug
/// flag is on; if the subscriber filters DEBUG out, the line is logged at
/// INFO with a `[DEBUG]` prefix instead so it is still visible.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger {
    quiet: bool,
    debug: bool,
}

impl TracingLogger {
    pub fn new(quiet: bool, debug: bool) -> Self {
        Self { quiet, debug }
    }
}

impl Logger for TracingLogger {
    fn error(&self, msg: &str) {
        tracing::error!("{} {}", LOG_TAG, msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{} {}", LOG_TAG, msg);
    }

    fn info(&self, msg: &str) {
        if !self.quiet {
            tracing::info!("{} {}", LOG_TAG, msg);
        }
    }

    fn debug(&self, msg: &str) {
        if !self.debug {
            return;
        }
        if tracing::enabled!(Level::DEBUG) {
            tracing::debug!("{} {}", LOG_TAG, msg);
        } else {
            tracing::info!("{} {} {}", LOG_TAG, DEBUG_TAG, msg);
        }
    }
}

/// Keeps every line in memory, formatted as `LEVEL -- : message`.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// All lines joined with newlines
    pub fn contents(&self) -> String {
        self.lines.lock().join("\n")
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    fn record(&self, level: Level, msg: &str) {
        self.lines.lock().push(format!("{} -- : {}", level, msg));
    }
}

impl Logger for MemoryLogger {
    fn error(&self, msg: &str) {
        self.record(Level::ERROR, msg);
    }

    fn warn(&self, msg: &str) {
        self.record(Level::WARN, msg);
    }

    fn info(&self, msg: &str) {
        self.record(Level::INFO, msg);
    }

    fn debug(&self, msg: &str) {
        self.record(Level::DEBUG, msg);
    }
}

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level when `RUST_LOG` is not set
    pub level: Level,
    /// Whether to include source code locations
    pub source_location: bool,
    /// Output file path (None for stdout)
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            source_location: false,
            file_path: None,
        }
    }
}

impl fmt::Display for LogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_path {
            Some(path) => write!(f, "{} -> {}", self.level, path.display()),
            None => write!(f, "{} -> stdout", self.level),
        }
    }
}

/// Install the global `tracing` subscriber. Only the first call has any effect.
pub fn setup_logging(config: LogConfig) -> Result<()> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = setup_logging_internal(config);
    });

    result
}

fn setup_logging_internal(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let installed = if let Some(path) = &config.file_path {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AgentError::InitializationError {
                message: format!("Failed to open log file {}", path.display()),
                source: Some(Box::new(e)),
            })?;

        subscriber
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .try_init()
    } else {
        subscriber.try_init()
    };

    installed.map_err(|e| AgentError::InitializationError {
        message: "Failed to set global subscriber".to_string(),
        source: Some(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use std::fs;

    #[test]
    fn test_memory_logger_format() {
        let logger = MemoryLogger::new();
        logger.error("Reporter failed: 503 - oops");
        logger.debug("que.default=0ms");

        assert_eq!(
            logger.lines(),
            vec![
                "ERROR -- : Reporter failed: 503 - oops".to_string(),
                "DEBUG -- : que.default=0ms".to_string(),
            ]
        );

        logger.clear();
        assert!(logger.contents().is_empty());
    }

    #[test]
    fn test_file_logging() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("agent.log");

        let config = LogConfig {
            file_path: Some(log_path.clone()),
            ..Default::default()
        };
        setup_logging(config).unwrap();

        let logger = TracingLogger::new(false, false);
        logger.error("Test error");
        logger.warn("Test warning");

        let contents = fs::read_to_string(log_path).unwrap();
        assert!(contents.contains("[latency-agent] Test error"));
        assert!(contents.contains("[latency-agent] Test warning"));
    }

    #[test]
    fn test_log_config_display() {
        assert_eq!(LogConfig::default().to_string(), "INFO -> stdout");
    }
}
