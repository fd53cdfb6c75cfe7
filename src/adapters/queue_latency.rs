use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{QueueSource, WorkerAdapter, DEFAULT_QUEUE};
use crate::config::AdapterConfig;
use crate::error::AgentError;
use crate::metrics::Store;
use crate::utils::Logger;

/// Worker adapter reporting, per queue, how long the oldest runnable job has
/// been waiting.
///
/// Queues seen once keep being reported (as 0 ms when idle) until `reset()`.
pub struct QueueLatencyAdapter<S> {
    source: S,
    enabled: bool,
    max_queues: usize,
    queues: Mutex<BTreeSet<String>>,
    logger: Arc<dyn Logger>,
}

impl<S: QueueSource> QueueLatencyAdapter<S> {
    /// Build an adapter over `source`. Unless the config forces it, the
    /// adapter is enabled iff `source.probe()` succeeds.
    pub fn new(source: S, config: &AdapterConfig, logger: Arc<dyn Logger>) -> Self {
        let enabled = config.enabled.unwrap_or_else(|| source.probe());

        Self {
            source,
            enabled,
            max_queues: config.max_queues,
            queues: Mutex::new(BTreeSet::new()),
            logger,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Remember `queue` so it is reported even before a job is due on it.
    /// Meant to be called from the backend's enqueue callback.
    pub fn track_queue(&self, queue: Option<&str>) {
        self.queues.lock().insert(normalize(queue));
    }

    pub fn known_queues(&self) -> Vec<String> {
        self.queues.lock().iter().cloned().collect()
    }

    fn collect_at(&self, store: &Store, now: DateTime<Utc>) {
        let jobs = match self.source.pending_jobs(now) {
            Ok(jobs) => jobs,
            Err(source) => {
                let err = AgentError::CollectionError {
                    adapter: self.source.name().to_string(),
                    source,
                };
                self.logger.error(&err.to_string());
                return;
            }
        };

        // Failed, locked and future jobs would report a misleading wait time
        let mut oldest: BTreeMap<String, DateTime<Utc>> = BTreeMap::new();
        for job in jobs.iter().filter(|job| job.is_runnable(now)) {
            oldest
                .entry(normalize(job.queue.as_deref()))
                .and_modify(|run_at| *run_at = (*run_at).min(job.run_at))
                .or_insert(job.run_at);
        }

        let mut known = self.queues.lock();
        let queues: BTreeSet<String> = known.iter().chain(oldest.keys()).cloned().collect();

        if queues.len() > self.max_queues {
            self.logger.warn(&format!(
                "Skipping {} metrics - {} queues exceeds the {} queue limit",
                self.source.name(),
                queues.len(),
                self.max_queues
            ));
            return;
        }

        let mut log_msg = String::new();
        for queue in &queues {
            let latency_ms = oldest
                .get(queue)
                .map(|run_at| latency_ms(now, *run_at))
                .unwrap_or(0);

            store.push(latency_ms, now, Some(queue));
            let _ = write!(log_msg, "{}-qt.{}={}ms ", self.source.identifier(), queue, latency_ms);
        }
        *known = queues;
        drop(known);

        if !log_msg.is_empty() {
            self.logger.debug(log_msg.trim_end());
        }
    }
}

impl<S: QueueSource> WorkerAdapter for QueueLatencyAdapter<S> {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn collect(&self, store: &Store) {
        self.collect_at(store, Utc::now());
    }

    fn reset(&self) {
        self.queues.lock().clear();
    }
}

fn normalize(queue: Option<&str>) -> String {
    match queue.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => DEFAULT_QUEUE.to_string(),
    }
}

/// Whole milliseconds between `run_at` and `now`, rounded up
fn latency_ms(now: DateTime<Utc>, run_at: DateTime<Utc>) -> u64 {
    let micros = (now - run_at).num_microseconds().unwrap_or(i64::MAX).max(0) as u64;
    micros.div_ceil(1000)
}
