use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::AgentConfig,
    error::Result,
    metrics::{ReporterStats, Store},
    reporting::ReporterHandle,
    utils::{request_queue_time, Logger},
};

use super::builder::AgentBuilder;

/// A running agent: the process-wide store plus, when an endpoint is
/// configured, the reporter task draining it.
///
/// Created by [`AgentBuilder::start`] and torn down by [`Agent::shutdown`].
pub struct Agent {
    config: Arc<AgentConfig>,
    store: Arc<Store>,
    logger: Arc<dyn Logger>,
    reporter: Option<ReporterHandle>,
}

impl Agent {
    pub(crate) fn new(
        config: Arc<AgentConfig>,
        store: Arc<Store>,
        logger: Arc<dyn Logger>,
        reporter: Option<ReporterHandle>,
    ) -> Self {
        Self {
            config,
            store,
            logger,
            reporter,
        }
    }

    /// Create a new agent builder
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// The store collaborators push measurements into
    pub fn store(&self) -> Arc<Store> {
        self.store.clone()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        self.logger.clone()
    }

    pub fn is_reporting(&self) -> bool {
        self.reporter.is_some()
    }

    /// Reporter stats as of the last cycle; `None` when not reporting
    pub fn stats(&self) -> Option<ReporterStats> {
        self.reporter.as_ref().map(ReporterHandle::stats)
    }

    /// Record the web queue time carried by an `X-Request-Start` header.
    /// Returns the recorded value, or `None` if the header was unusable or
    /// the store is stale.
    pub fn record_request_queue_time(&self, header: &str) -> Option<u64> {
        let now = Utc::now();
        let queue_time = request_queue_time(header, now)?;

        if !self.store.push(queue_time, now, None) {
            return None;
        }
        self.logger.debug(&format!("Request queue_time={}ms", queue_time));
        Some(queue_time)
    }

    /// Stop the reporter and discard anything still buffered.
    /// Returns the reporter's final stats when one was running.
    pub async fn shutdown(self) -> Result<Option<ReporterStats>> {
        let stats = match self.reporter {
            Some(handle) => Some(handle.shutdown().await?.stats().clone()),
            None => None,
        };

        self.store.clear();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::mock::MockTransport;
    use crate::utils::MemoryLogger;
    use std::time::Duration;

    #[tokio::test]
    async fn test_record_request_queue_time() {
        let logger = Arc::new(MemoryLogger::new());
        let agent = Agent::builder().with_logger(logger.clone()).start().await.unwrap();

        let started = Utc::now().timestamp_millis() - 250;
        let recorded = agent
            .record_request_queue_time(&format!("t={}", started))
            .unwrap();
        assert!(recorded >= 250);

        let measurements = agent.store().snapshot();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].label(), None);
        assert_eq!(measurements[0].value(), recorded);

        assert!(agent.record_request_queue_time("garbage").is_none());
        assert_eq!(agent.store().len(), 1);
        assert!(logger.contents().contains("Request queue_time="));
    }

    #[tokio::test]
    async fn test_stale_store_rejects_request_queue_time() {
        let config = AgentConfig {
            report_interval: Duration::from_millis(10),
            request_timeout: Duration::from_millis(10),
            store_staleness: Some(Duration::from_millis(30)),
            ..Default::default()
        };
        let agent = Agent::builder()
            .with_config(config)
            .with_logger(Arc::new(MemoryLogger::new()))
            .start()
            .await
            .unwrap();

        let header = format!("t={}", Utc::now().timestamp_millis());
        assert!(agent.record_request_queue_time(&header).is_some());

        agent.store().drain();
        std::thread::sleep(Duration::from_millis(50));

        assert!(agent.record_request_queue_time(&header).is_none());
        assert!(agent.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_reports_until_shutdown() {
        let transport = Arc::new(MockTransport::new());
        let config = AgentConfig {
            api_base_url: Some("http://example.com/api/test-token".to_string()),
            dyno: "worker.2".to_string(),
            report_interval: Duration::from_secs(5),
            ..Default::default()
        };
        let agent = Agent::builder()
            .with_config(config)
            .with_transport(transport.clone())
            .with_logger(Arc::new(MemoryLogger::new()))
            .start()
            .await
            .unwrap();
        assert!(agent.is_reporting());

        let store = agent.store();
        store.push(42, Utc::now(), Some("default"));
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        assert_eq!(agent.stats().unwrap().reports_sent, 1);

        store.push(7, Utc::now(), None);
        let stats = agent.shutdown().await.unwrap().unwrap();
        assert_eq!(stats.reports_sent, 1);
        assert_eq!(stats.measurements_reported, 1);
        assert!(store.is_empty());

        let reports = transport.requests_to("/reports");
        assert_eq!(reports.len(), 1);
        assert!(reports[0].url.as_str().contains("dyno=worker.2"));
        assert!(reports[0].body.ends_with(",42,default,\n"));
    }
}
