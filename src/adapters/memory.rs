use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{JobRecord, JobState, QueueSource};

/// Handle returned by `MemoryQueueSource::enqueue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

/// `QueueSource` backed by an in-process job list.
///
/// Suitable for hosts that run their own in-memory job queue, and for tests.
#[derive(Debug)]
pub struct MemoryQueueSource {
    name: String,
    identifier: String,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    jobs: Vec<(JobId, JobRecord)>,
}

impl MemoryQueueSource {
    pub fn new(name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn enqueue(&self, queue: Option<&str>, run_at: DateTime<Utc>) -> JobId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = JobId(state.next_id);
        state.jobs.push((
            id,
            JobRecord {
                queue: queue.map(str::to_owned),
                run_at,
                state: JobState::Pending,
            },
        ));
        id
    }

    /// Mark a job as claimed by a worker
    pub fn lock(&self, id: JobId) -> bool {
        self.set_state(id, JobState::Locked)
    }

    pub fn fail(&self, id: JobId) -> bool {
        self.set_state(id, JobState::Failed)
    }

    /// Remove a completed job
    pub fn finish(&self, id: JobId) -> bool {
        let mut state = self.state.lock();
        let before = state.jobs.len();
        state.jobs.retain(|(job_id, _)| *job_id != id);
        state.jobs.len() != before
    }

    pub fn clear(&self) {
        self.state.lock().jobs.clear();
    }

    fn set_state(&self, id: JobId, new_state: JobState) -> bool {
        let mut state = self.state.lock();
        match state.jobs.iter_mut().find(|(job_id, _)| *job_id == id) {
            Some((_, job)) => {
                job.state = new_state;
                true
            }
            None => false,
        }
    }
}

impl QueueSource for MemoryQueueSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn probe(&self) -> bool {
        true
    }

    fn pending_jobs(&self, _now: DateTime<Utc>) -> anyhow::Result<Vec<JobRecord>> {
        Ok(self
            .state
            .lock()
            .jobs
            .iter()
            .map(|(_, job)| job.clone())
            .collect())
    }
}
