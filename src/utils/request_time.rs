use chrono::{DateTime, Utc};

/// Milliseconds a request spent queued before reaching the application,
/// derived from an `X-Request-Start` header added by the router/load balancer.
///
/// The header may carry a `t=` prefix and a timestamp in seconds,
/// milliseconds or microseconds since the epoch; the unit is inferred from
/// magnitude. Clock skew that would yield a negative value is clamped to 0.
pub fn request_queue_time(header: &str, now: DateTime<Utc>) -> Option<u64> {
    let raw = header.trim();
    let raw = raw.strip_prefix("t=").unwrap_or(raw);
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let started_at_ms = if value > 1e15 {
        value / 1000.0
    } else if value > 1e12 {
        value
    } else {
        value * 1000.0
    };

    let now_ms = now.timestamp_millis() as f64;
    Some((now_ms - started_at_ms).max(0.0).round() as u64)
}
