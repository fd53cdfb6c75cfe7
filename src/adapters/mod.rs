//! Worker adapters: collectors that sample a job backend and push queue
//! latency into the store

mod memory;
mod queue_latency;

use chrono::{DateTime, Utc};

use crate::metrics::Store;

pub use memory::{JobId, MemoryQueueSource};
pub use queue_latency::QueueLatencyAdapter;

/// Queue name used for jobs enqueued without one
pub const DEFAULT_QUEUE: &str = "default";

/// Contract every worker adapter fulfils.
///
/// `collect` must never panic or return errors to the caller: failures are
/// logged at the adapter boundary.
pub trait WorkerAdapter: Send + Sync {
    /// Name announced at registration (e.g. "DelayedJob")
    fn name(&self) -> &str;

    /// Whether the backend is present. Decided once, at construction.
    fn enabled(&self) -> bool;

    /// Push one measurement per known queue into `store`.
    fn collect(&self, store: &Store);

    /// Forget every remembered queue.
    fn reset(&self);
}

/// Lifecycle state of a job as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting to be picked up
    Pending,
    /// Claimed by a worker
    Locked,
    /// Gave up after errors
    Failed,
}

/// One job (or one pre-aggregated group of jobs) returned by a `QueueSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub queue: Option<String>,
    pub run_at: DateTime<Utc>,
    pub state: JobState,
}

impl JobRecord {
    pub fn pending(queue: impl Into<String>, run_at: DateTime<Utc>) -> Self {
        Self {
            queue: Some(queue.into()),
            run_at,
            state: JobState::Pending,
        }
    }

    /// Runnable at `now`: pending and already due.
    pub fn is_runnable(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Pending && self.run_at <= now
    }
}

/// Narrow query interface over a job backend.
///
/// SQL backends may return one record per `(queue, state)` carrying the
/// minimum `run_at` instead of every job row.
pub trait QueueSource: Send + Sync {
    /// Display name, e.g. "Que"
    fn name(&self) -> &str;

    /// Short identifier used as config key and log prefix, e.g. "que"
    fn identifier(&self) -> &str;

    /// Lightweight check that the backend is reachable/installed.
    fn probe(&self) -> bool;

    /// Jobs that have not finished as of `now`.
    fn pending_jobs(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<JobRecord>>;
}
