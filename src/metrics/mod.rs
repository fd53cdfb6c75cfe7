//! Latency measurements and the buffer they wait in until reported

mod store;
mod types;

use chrono::{DateTime, Utc};

pub use store::Store;
pub use types::ReporterStats;

/// A single latency sample.
///
/// Measurements are created by adapters (or the request hook) at observation
/// time and are never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    occurred_at: DateTime<Utc>,
    value: u64,
    label: Option<String>,
}

impl Measurement {
    pub fn new(value: u64, occurred_at: DateTime<Utc>, label: Option<String>) -> Self {
        Self {
            occurred_at,
            value,
            label,
        }
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Latency in milliseconds
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Queue name, `None` for web (request) measurements
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Append the report line for this measurement:
    /// `epoch_seconds,value_ms,label,` followed by a newline.
    pub fn write_csv(&self, out: &mut String) {
        use std::fmt::Write;

        // Writing into a String cannot fail
        let _ = writeln!(
            out,
            "{},{},{},",
            self.occurred_at.timestamp(),
            self.value,
            self.label.as_deref().unwrap_or("")
        );
    }
}
