use std::mem;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::Measurement;

/// Thread-safe, insertion ordered buffer of measurements.
///
/// Adapters call `push()` from any thread; the reporter calls `drain()` on
/// every cycle. The lock is only held while the buffer itself is touched.
#[derive(Debug, Default)]
pub struct Store {
    inner: Mutex<Inner>,
    staleness: Option<Duration>,
}

#[derive(Debug, Default)]
struct Inner {
    measurements: Vec<Measurement>,
    last_drain: Option<Instant>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects pushes once it has gone `staleness` without
    /// being drained. The guard only arms after the first drain, so a store
    /// that has never been reported from keeps accepting measurements.
    pub fn with_staleness(staleness: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            staleness: Some(staleness),
        }
    }

    /// Window after which an undrained store stops accepting pushes
    pub fn staleness(&self) -> Option<Duration> {
        self.staleness
    }

    /// Append a measurement. Returns `false` when it was rejected because the
    /// store is stale.
    pub fn push(&self, value: u64, occurred_at: DateTime<Utc>, label: Option<&str>) -> bool {
        let measurement = Measurement::new(value, occurred_at, label.map(str::to_owned));

        let mut inner = self.inner.lock();
        if let (Some(staleness), Some(last_drain)) = (self.staleness, inner.last_drain) {
            if last_drain.elapsed() > staleness {
                return false;
            }
        }
        inner.measurements.push(measurement);
        true
    }

    /// Take every buffered measurement, leaving the store empty.
    pub fn drain(&self) -> Vec<Measurement> {
        let mut inner = self.inner.lock();
        inner.last_drain = Some(Instant::now());
        mem::take(&mut inner.measurements)
    }

    /// Discard all buffered measurements.
    pub fn clear(&self) {
        self.inner.lock().measurements.clear();
    }

    /// Copy of the current contents; does not drain.
    pub fn snapshot(&self) -> Vec<Measurement> {
        self.inner.lock().measurements.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().measurements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_drain_preserves_insertion_order() {
        let store = Store::new();
        store.push(30, at(3), None);
        store.push(10, at(1), Some("high"));
        store.push(20, at(2), Some("low"));

        let values: Vec<u64> = store.drain().iter().map(|m| m.value()).collect();
        assert_eq!(values, vec![30, 10, 20]);
    }

    #[test]
    fn test_drain_empties_store() {
        let store = Store::new();
        store.push(1, at(1), None);
        store.push(2, at(2), None);

        assert_eq!(store.drain().len(), 2);
        assert!(store.drain().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let store = Store::new();
        store.push(7, at(1), Some("default"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].label(), Some("default"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_clear() {
        let store = Store::new();
        store.push(1, at(1), None);
        store.clear();
        assert!(store.drain().is_empty());
    }

    #[test]
    fn test_stale_store_rejects_pushes() {
        let store = Store::with_staleness(Duration::from_millis(20));

        // Not armed until the first drain
        assert!(store.push(1, at(1), None));
        store.drain();
        assert!(store.push(2, at(2), None));

        thread::sleep(Duration::from_millis(60));
        assert!(!store.push(3, at(3), None));

        let drained = store.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].value(), 2);

        // A fresh drain re-opens the store
        assert!(store.push(4, at(4), None));
    }

    #[test]
    fn test_concurrent_push_and_drain_loses_nothing() {
        const WRITERS: u64 = 8;
        const PER_WRITER: u64 = 2_000;

        let store = Arc::new(Store::new());
        let done = Arc::new(AtomicBool::new(false));

        let drainer = {
            let store = store.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut batches = Vec::new();
                while !done.load(Ordering::Acquire) {
                    batches.push(store.drain());
                    thread::yield_now();
                }
                batches
            })
        };

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..PER_WRITER {
                        store.push(w * PER_WRITER + i, at(1), Some("default"));
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Release);

        let mut batches = drainer.join().unwrap();
        batches.push(store.drain());

        let mut seen: Vec<u64> = batches
            .into_iter()
            .flatten()
            .map(|m| m.value())
            .collect();
        seen.sort_unstable();

        let expected: Vec<u64> = (0..WRITERS * PER_WRITER).collect();
        assert_eq!(seen, expected);
    }
}
