// Location: src/config.rs

use std::collections::HashMap;
use std::time::Duration;
use reqwest::Url;
use serde::{Serialize, Deserialize};

use crate::error::{AgentError, Result};
use crate::utils::LogConfig;

/// Queue count above which an adapter skips a collection pass.
pub const DEFAULT_MAX_QUEUES: usize = 20;

/// Longest accepted time between report cycles.
pub const MAX_REPORT_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Collector base URL, e.g. `https://collector.example.com/api`.
    /// The reporter is not started when this is unset.
    pub api_base_url: Option<String>,

    /// Token appended to the base URL as a path segment
    pub auth_token: Option<String>,

    /// Identifier of this process within the deployment (e.g. "web.1")
    pub dyno: String,

    /// OS process id reported with every request
    pub pid: u32,

    /// Time between report cycles
    pub report_interval: Duration,

    /// Timeout applied to each outbound request
    pub request_timeout: Duration,

    /// Stop accepting measurements when the store has not been drained for this long
    pub store_staleness: Option<Duration>,

    /// Suppress info level logging
    pub quiet: bool,

    /// Emit debug logging
    pub debug: bool,

    /// Log level used by `setup_logging`
    pub log_level: LogLevel,

    /// Host runtime version announced at registration
    pub runtime_version: String,

    /// Host framework version announced at registration
    pub framework_version: String,

    /// Per-adapter options keyed by adapter identifier (e.g. "que")
    pub adapters: HashMap<String, AdapterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Explicitly enable or disable the adapter. `None` means probe the backend.
    pub enabled: Option<bool>,

    /// Maximum number of distinct queues reported per pass
    pub max_queues: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            max_queues: DEFAULT_MAX_QUEUES,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            auth_token: None,
            dyno: "dev.1".to_string(),
            pid: std::process::id(),
            report_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            store_staleness: Some(Duration::from_secs(120)),
            quiet: false,
            debug: false,
            log_level: LogLevel::Info,
            runtime_version: "unknown".to_string(),
            framework_version: "unknown".to_string(),
            adapters: HashMap::new(),
        }
    }
}

impl AgentConfig {
    /// Build a configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api_base_url = lookup("LATENCY_AGENT_URL").filter(|v| !v.is_empty());
        config.auth_token = lookup("LATENCY_AGENT_TOKEN").filter(|v| !v.is_empty());

        if let Some(dyno) = lookup("DYNO").filter(|v| !v.is_empty()) {
            config.dyno = dyno;
        }

        if let Some(interval) = lookup("LATENCY_AGENT_INTERVAL") {
            let secs = interval.trim().parse::<u64>().map_err(|_| {
                AgentError::ConfigurationError {
                    message: format!("expected a number of seconds, got {:?}", interval),
                    parameter: "report_interval".to_string(),
                }
            })?;
            config.report_interval = Duration::from_secs(secs);
        }

        config.debug = lookup("LATENCY_AGENT_DEBUG").map(|v| is_truthy(&v)).unwrap_or(false);
        config.quiet = lookup("LATENCY_AGENT_QUIET").map(|v| is_truthy(&v)).unwrap_or(false);
        if config.debug {
            config.log_level = LogLevel::Debug;
        }

        Ok(config)
    }

    /// Logging setup matching `log_level`, for `setup_logging`
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.into(),
            ..Default::default()
        }
    }

    /// Options for the named adapter, defaulted when not configured.
    pub fn adapter(&self, name: &str) -> AdapterConfig {
        self.adapters.get(name).cloned().unwrap_or_default()
    }

    /// Resolve `path` against the base URL, inserting the auth token segment.
    pub fn api_url(&self, path: &str) -> Result<Url> {
        let base = self.api_base_url.as_deref().ok_or_else(|| {
            AgentError::ConfigurationError {
                message: "API base URL is not set".to_string(),
                parameter: "api_base_url".to_string(),
            }
        })?;

        let mut url = parse_base_url(base)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                AgentError::ConfigurationError {
                    message: format!("{} cannot be used as a base URL", base),
                    parameter: "api_base_url".to_string(),
                }
            })?;
            segments.pop_if_empty();
            if let Some(token) = &self.auth_token {
                segments.push(token);
            }
            segments.extend(path.split('/').filter(|s| !s.is_empty()));
        }

        Ok(url)
    }

    pub fn validate(&self) -> Result<()> {
        if self.report_interval.is_zero() {
            return Err(AgentError::ConfigurationError {
                message: "Report interval must be greater than zero".to_string(),
                parameter: "report_interval".to_string(),
            });
        }

        if self.report_interval > MAX_REPORT_INTERVAL {
            return Err(AgentError::ConfigurationError {
                message: format!(
                    "Report interval must not exceed {} seconds",
                    MAX_REPORT_INTERVAL.as_secs()
                ),
                parameter: "report_interval".to_string(),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(AgentError::ConfigurationError {
                message: "Request timeout must be greater than zero".to_string(),
                parameter: "request_timeout".to_string(),
            });
        }

        if let Some(staleness) = self.store_staleness {
            let cycle = self.report_interval.saturating_add(self.request_timeout);
            if staleness <= cycle {
                return Err(AgentError::ConfigurationError {
                    message: format!(
                        "Store staleness of {}s must exceed the report interval plus request timeout ({}s)",
                        staleness.as_secs_f64(),
                        cycle.as_secs_f64()
                    ),
                    parameter: "store_staleness".to_string(),
                });
            }
        }

        if let Some(base) = &self.api_base_url {
            parse_base_url(base)?;
        }

        for (name, adapter) in &self.adapters {
            if adapter.max_queues == 0 {
                return Err(AgentError::ConfigurationError {
                    message: format!("max_queues for {} must be at least 1", name),
                    parameter: "max_queues".to_string(),
                });
            }
        }

        Ok(())
    }
}

fn parse_base_url(base: &str) -> Result<Url> {
    let url = Url::parse(base).map_err(|e| AgentError::ConfigurationError {
        message: format!("invalid URL {:?}: {}", base, e),
        parameter: "api_base_url".to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AgentError::ConfigurationError {
            message: format!("unsupported scheme {:?}", other),
            parameter: "api_base_url".to_string(),
        }),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
