use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

/// Counters maintained by the reporter task.
///
/// The reporter is the only writer; everyone else observes copies published
/// after each cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterStats {
    /// Whether the registration handshake succeeded
    pub registered: bool,

    /// Cycles that ran, including ones with nothing to send
    pub cycles: u64,

    /// Reports accepted by the collector
    pub reports_sent: u64,

    /// Reports that failed (non-2xx or transport error)
    pub reports_failed: u64,

    /// Failures since the last successful report
    pub consecutive_failures: u32,

    /// Measurements delivered in successful reports
    pub measurements_reported: u64,

    /// Measurements discarded because their report failed
    pub measurements_dropped: u64,

    /// When the last report was accepted
    pub last_success: Option<DateTime<Utc>>,
}

impl ReporterStats {
    pub(crate) fn record_success(&mut self, batch_size: usize, at: DateTime<Utc>) {
        self.reports_sent += 1;
        self.consecutive_failures = 0;
        self.measurements_reported += batch_size as u64;
        self.last_success = Some(at);
    }

    pub(crate) fn record_failure(&mut self, batch_size: usize) {
        self.reports_failed += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.measurements_dropped += batch_size as u64;
    }

    /// Share of attempted reports that failed
    pub fn failure_rate(&self) -> f32 {
        let attempts = self.reports_sent + self.reports_failed;
        if attempts > 0 {
            self.reports_failed as f32 / attempts as f32
        } else {
            0.0
        }
    }
}
