// Location: src/reporting/reporter.rs

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{oneshot, watch};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::payload::{self, Registration, RegistrationResponse};
use super::transport::{OutboundRequest, Transport};
use crate::{
    adapters::WorkerAdapter,
    config::{AgentConfig, MAX_REPORT_INTERVAL},
    error::{AgentError, Result},
    metrics::{Measurement, ReporterStats, Store},
    utils::Logger,
};

/// Drains the store on a fixed interval and ships each batch to the collector.
///
/// A reporter is driven by a single task (see [`Reporter::spawn`]), so at most
/// one cycle is ever in flight and its counters need no locking.
pub struct Reporter {
    config: Arc<AgentConfig>,
    store: Arc<Store>,
    transport: Arc<dyn Transport>,
    adapters: Vec<Arc<dyn WorkerAdapter>>,
    logger: Arc<dyn Logger>,
    report_interval: Duration,
    stats: ReporterStats,
    stats_tx: watch::Sender<ReporterStats>,
}

impl Reporter {
    /// Create a reporter. Adapters that are not enabled are left out.
    pub fn new(
        config: Arc<AgentConfig>,
        store: Arc<Store>,
        transport: Arc<dyn Transport>,
        adapters: Vec<Arc<dyn WorkerAdapter>>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let adapters: Vec<_> = adapters
            .into_iter()
            .filter(|adapter| {
                if !adapter.enabled() {
                    logger.debug(&format!("{} adapter is not enabled", adapter.name()));
                }
                adapter.enabled()
            })
            .collect();

        let (stats_tx, _) = watch::channel(ReporterStats::default());

        Self {
            // interval_at panics on a zero period or an unrepresentable deadline
            report_interval: config
                .report_interval
                .clamp(Duration::from_millis(1), MAX_REPORT_INTERVAL),
            config,
            store,
            transport,
            adapters,
            logger,
            stats: ReporterStats::default(),
            stats_tx,
        }
    }

    pub fn stats(&self) -> &ReporterStats {
        &self.stats
    }

    /// Receive a copy of the stats after every cycle
    pub fn subscribe(&self) -> watch::Receiver<ReporterStats> {
        self.stats_tx.subscribe()
    }

    /// Interval in effect, possibly overridden by the collector at registration
    pub fn report_interval(&self) -> Duration {
        self.report_interval
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    /// Announce this process to the collector. Failures are logged and
    /// otherwise ignored.
    pub async fn register(&mut self) {
        let registration = Registration {
            pid: self.config.pid,
            runtime_version: self.config.runtime_version.clone(),
            framework_version: self.config.framework_version.clone(),
            agent_version: crate::VERSION.to_string(),
            worker_adapters: self.adapter_names().join(","),
        };

        match self.send_registration(&registration).await {
            Ok(response) => {
                self.stats.registered = true;
                if let Some(secs) = response.report_interval.filter(|secs| *secs > 0) {
                    self.apply_interval_override(Duration::from_secs(secs));
                }
                self.logger.info(&format!(
                    "Reporter starting, will report every {} seconds (adapters: {})",
                    self.report_interval.as_secs(),
                    if registration.worker_adapters.is_empty() {
                        "none"
                    } else {
                        registration.worker_adapters.as_str()
                    }
                ));
            }
            Err(err) => {
                self.logger.warn(&format!("Registration failed: {}", err));
            }
        }

        self.publish();
    }

    /// Adopt the collector's interval unless it is out of range or would let
    /// the store go stale between drains.
    fn apply_interval_override(&mut self, interval: Duration) {
        let too_long = interval > MAX_REPORT_INTERVAL
            || self.store.staleness().map_or(false, |window| {
                interval.saturating_add(self.config.request_timeout) >= window
            });

        if too_long {
            self.logger.warn(&format!(
                "Ignoring report_interval of {} seconds from the collector, keeping {} seconds",
                interval.as_secs(),
                self.report_interval.as_secs()
            ));
        } else {
            self.report_interval = interval;
        }
    }

    async fn send_registration(&self, registration: &Registration) -> Result<RegistrationResponse> {
        let url = self.config.api_url("registrations")?;
        let body = registration.to_json()?;

        let response = self.transport.post(OutboundRequest::json(url, body)).await?;
        if !response.is_success() {
            return Err(AgentError::ApiError {
                status: response.status,
                body: response.body,
            });
        }

        Ok(RegistrationResponse::parse(&response.body))
    }

    /// One report cycle: collect from adapters, drain, send.
    pub async fn report_cycle(&mut self) {
        self.collect().await;

        let batch = self.store.drain();
        self.stats.cycles += 1;

        if !batch.is_empty() {
            self.report(batch).await;
        }

        self.publish();
    }

    async fn collect(&self) {
        if self.adapters.is_empty() {
            return;
        }

        let adapters = self.adapters.clone();
        let store = self.store.clone();

        // Adapters may run blocking queries
        let result = task::spawn_blocking(move || {
            for adapter in &adapters {
                adapter.collect(&store);
            }
        })
        .await;

        if let Err(err) = result {
            self.logger.error(&format!("Worker adapter collection aborted: {}", err));
        }
    }

    async fn report(&mut self, batch: Vec<Measurement>) {
        let size = batch.len();

        match self.send_report(&batch).await {
            Ok(()) => {
                if self.stats.consecutive_failures > 0 {
                    self.logger.info(&format!(
                        "Reporter recovered after {} failed reports",
                        self.stats.consecutive_failures
                    ));
                }
                self.stats.record_success(size, Utc::now());
                self.logger.debug(&format!("Reported {} measurements", size));
            }
            Err(err) => {
                // The batch is dropped rather than requeued
                self.stats.record_failure(size);
                self.logger.error(&format!("Reporter failed: {}", err));
                self.logger.debug(&format!("Dropped {} measurements", size));
            }
        }
    }

    async fn send_report(&self, batch: &[Measurement]) -> Result<()> {
        let mut url = self.config.api_url("reports")?;
        url.query_pairs_mut()
            .append_pair("dyno", &self.config.dyno)
            .append_pair("pid", &self.config.pid.to_string());

        let request = OutboundRequest::text(url, payload::report_body(batch));
        let response = self.transport.post(request).await?;

        if response.is_success() {
            Ok(())
        } else {
            Err(AgentError::ApiError {
                status: response.status,
                body: response.body,
            })
        }
    }

    fn publish(&self) {
        self.stats_tx.send_replace(self.stats.clone());
    }

    /// Run the reporter on its own task: register once, then report every
    /// interval until the returned handle is shut down (or dropped).
    pub fn spawn(self) -> ReporterHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let stats = self.subscribe();
        let task = tokio::spawn(self.run(shutdown_rx));

        ReporterHandle {
            shutdown: Some(shutdown_tx),
            task,
            stats,
        }
    }

    async fn run(mut self, mut shutdown_rx: oneshot::Receiver<()>) -> Self {
        let stopped = tokio::select! {
            _ = &mut shutdown_rx => true,
            _ = self.register() => false,
        };
        if stopped {
            self.logger.debug("Reporter stopped before registration completed");
            return self;
        }

        let interval = self.report_interval;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        // A tick that fires while a report is in flight is skipped, not queued
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {}
            }

            let aborted = tokio::select! {
                _ = &mut shutdown_rx => true,
                _ = self.report_cycle() => false,
            };
            if aborted {
                self.logger.warn("Reporter stopped during a report cycle; its batch was dropped");
                break;
            }
        }

        self.logger.debug("Reporter stopped");
        self
    }
}

/// Handle to a running reporter task.
pub struct ReporterHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Reporter>,
    stats: watch::Receiver<ReporterStats>,
}

impl ReporterHandle {
    /// Stats as of the last completed cycle
    pub fn stats(&self) -> ReporterStats {
        self.stats.borrow().clone()
    }

    /// Stop the timer and wait for the task, returning the reporter.
    pub async fn shutdown(mut self) -> Result<Reporter> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        self.task.await.map_err(|e| AgentError::ShutdownError {
            message: format!("reporter task failed: {}", e),
        })
    }
}
