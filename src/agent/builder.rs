use std::sync::Arc;

use crate::{
    adapters::{QueueLatencyAdapter, QueueSource, WorkerAdapter},
    config::AgentConfig,
    error::{AgentError, Result},
    metrics::Store,
    reporting::{HttpTransport, Reporter, Transport},
    utils::{Logger, TracingLogger},
};

use super::agent::Agent;

type AdapterFactory = Box<dyn FnOnce(&AgentConfig, Arc<dyn Logger>) -> Arc<dyn WorkerAdapter> + Send>;

/// Builder for constructing and starting an `Agent`
pub struct AgentBuilder {
    config: Option<AgentConfig>,
    transport: Option<Arc<dyn Transport>>,
    logger: Option<Arc<dyn Logger>>,
    adapters: Vec<AdapterFactory>,
}

impl AgentBuilder {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            config: None,
            transport: None,
            logger: None,
            adapters: Vec::new(),
        }
    }

    /// Set the agent configuration
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the HTTP transport (defaults to `HttpTransport`)
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the logger (defaults to `TracingLogger`)
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Add a ready-made adapter
    pub fn with_adapter(mut self, adapter: Arc<dyn WorkerAdapter>) -> Self {
        self.adapters.push(Box::new(move |_: &AgentConfig, _: Arc<dyn Logger>| adapter));
        self
    }

    /// Add a queue latency adapter over `source`, configured from the
    /// `adapters.<identifier>` section of the agent config.
    pub fn with_queue_source<S>(mut self, source: S) -> Self
    where
        S: QueueSource + 'static,
    {
        self.adapters.push(Box::new(
            move |config: &AgentConfig, logger: Arc<dyn Logger>| -> Arc<dyn WorkerAdapter> {
                let adapter_config = config.adapter(source.identifier());
                Arc::new(QueueLatencyAdapter::new(source, &adapter_config, logger))
            },
        ));
        self
    }

    /// Validate the configuration, create the store and start reporting.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(self) -> Result<Agent> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let config = Arc::new(config);
        let logger: Arc<dyn Logger> = match self.logger {
            Some(logger) => logger,
            None => Arc::new(TracingLogger::new(config.quiet, config.debug)),
        };

        let store = Arc::new(match config.store_staleness {
            Some(staleness) => Store::with_staleness(staleness),
            None => Store::new(),
        });

        let adapters: Vec<Arc<dyn WorkerAdapter>> = self
            .adapters
            .into_iter()
            .map(|factory| factory(&config, logger.clone()))
            .collect();

        if config.api_base_url.is_none() {
            logger.info("Reporter not started: no API base URL configured");
            return Ok(Agent::new(config, store, logger, None));
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.request_timeout).map_err(|e| {
                AgentError::InitializationError {
                    message: "Failed to build HTTP client".to_string(),
                    source: Some(Box::new(e)),
                }
            })?),
        };

        let reporter = Reporter::new(
            config.clone(),
            store.clone(),
            transport,
            adapters,
            logger.clone(),
        )
        .spawn();

        Ok(Agent::new(config, store, logger, Some(reporter)))
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryQueueSource;
    use crate::config::AdapterConfig;
    use crate::reporting::mock::MockTransport;
    use crate::utils::MemoryLogger;
    use std::time::Duration;

    fn reporting_config() -> AgentConfig {
        AgentConfig {
            api_base_url: Some("http://example.com/api".to_string()),
            auth_token: Some("test-token".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_builder_default_does_not_report() {
        let logger = Arc::new(MemoryLogger::new());
        let agent = AgentBuilder::default()
            .with_logger(logger.clone())
            .start()
            .await
            .unwrap();

        assert!(!agent.is_reporting());
        assert!(logger
            .contents()
            .contains("Reporter not started: no API base URL configured"));
        assert!(agent.shutdown().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_builder_validation() {
        let config = AgentConfig {
            report_interval: Duration::ZERO,
            ..reporting_config()
        };
        let result = AgentBuilder::new().with_config(config).start().await;
        assert!(matches!(
            result,
            Err(AgentError::ConfigurationError { ref parameter, .. }) if parameter == "report_interval"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queue_source_uses_adapter_config() {
        let mut config = reporting_config();
        config.adapters.insert(
            "dj".to_string(),
            AdapterConfig { enabled: Some(false), ..Default::default() },
        );
        let transport = Arc::new(MockTransport::new());

        let agent = AgentBuilder::new()
            .with_config(config)
            .with_transport(transport.clone())
            .with_logger(Arc::new(MemoryLogger::new()))
            .with_queue_source(MemoryQueueSource::new("Que", "que"))
            .with_queue_source(MemoryQueueSource::new("DelayedJob", "dj"))
            .start()
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        agent.shutdown().await.unwrap();

        let registrations = transport.requests_to("/registrations");
        assert_eq!(registrations.len(), 1);
        let body: serde_json::Value = serde_json::from_str(&registrations[0].body).unwrap();
        assert_eq!(body["registration"]["worker_adapters"], "Que");
    }
}
