use serde::{Serialize, Deserialize};

use crate::error::Result;
use crate::metrics::Measurement;

/// Process metadata announced once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub pid: u32,
    pub runtime_version: String,
    pub framework_version: String,
    pub agent_version: String,
    /// Comma-joined names of the enabled adapters
    pub worker_adapters: String,
}

#[derive(Serialize)]
struct RegistrationEnvelope<'a> {
    registration: &'a Registration,
}

/// Settings the collector may hand back when registering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RegistrationResponse {
    /// Seconds between reports requested by the collector
    #[serde(default)]
    pub report_interval: Option<u64>,
}

impl Registration {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&RegistrationEnvelope { registration: self })?)
    }
}

impl RegistrationResponse {
    /// Lenient parse: an empty or unexpected body means "no settings".
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

/// Report body: one `epoch_seconds,value_ms,label,` line per measurement,
/// in drain order.
pub fn report_body(measurements: &[Measurement]) -> String {
    let mut body = String::with_capacity(measurements.len() * 24);
    for measurement in measurements {
        measurement.write_csv(&mut body);
    }
    body
}
