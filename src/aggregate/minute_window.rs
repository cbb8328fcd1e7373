use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use crate::models::{CountPair, IOType};

pub const DEFAULT_WINDOW_CAPACITY: usize = 240;

/// Per-volume counters of one retained minute bucket.
pub type VolumeCounts = HashMap<String, CountPair>;

/// Called synchronously on the ingesting thread whenever the window drops
/// its oldest minute bucket. The window lock is already released at that
/// point, so the notifier may block (e.g. flush to disk) without stalling
/// other ingestion threads.
pub type EvictionNotifier = Box<dyn Fn(&str, &VolumeCounts) + Send + Sync>;

struct WindowInner {
    buckets: HashMap<String, VolumeCounts>,
    order: VecDeque<String>,
}

/// Bounded, insertion-ordered collection of per-minute volume counters.
/// Eviction is strict FIFO by first insertion of the minute key; a minute
/// that keeps getting incremented does not move in the eviction order.
pub struct MinuteVolumeWindow {
    inner: RwLock<WindowInner>,
    capacity: usize,
    notifier: Option<EvictionNotifier>,
}

impl MinuteVolumeWindow {
    /// `capacity` is the maximum number of retained minute keys; 0 disables
    /// eviction entirely (the window then grows with the trace).
    pub fn new(capacity: usize) -> Self {
        MinuteVolumeWindow {
            inner: RwLock::new(WindowInner {
                buckets: HashMap::new(),
                order: VecDeque::with_capacity(capacity.min(1024) + 1),
            }),
            capacity,
            notifier: None,
        }
    }

    pub fn set_notifier(&mut self, notifier: EvictionNotifier) {
        self.notifier = Some(notifier);
    }

    pub fn record(&self, minute_key: &str, volume: &str, io_type: IOType) {
        let evicted = {
            let mut guard = self.inner.write().unwrap();
            let inner = &mut *guard;

            if !inner.buckets.contains_key(minute_key) {
                inner.buckets.insert(minute_key.to_string(), HashMap::new());
                inner.order.push_back(minute_key.to_string());
            }
            if let Some(bucket) = inner.buckets.get_mut(minute_key) {
                bucket.entry(volume.to_string()).or_default().bump(io_type);
            }

            if self.capacity > 0 && inner.order.len() > self.capacity {
                inner.order.pop_front().and_then(|oldest| {
                    inner.buckets.remove(&oldest).map(|counts| (oldest, counts))
                })
            } else {
                None
            }
        };

        // Synchronous with the triggering insert, but outside the lock.
        if let Some((minute, counts)) = evicted {
            if let Some(notifier) = &self.notifier {
                notifier(&minute, &counts);
            }
        }
    }

    /// Number of retained minute keys.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deep copy of the retained buckets together with their insertion order.
    pub fn snapshot(&self) -> (Vec<String>, HashMap<String, VolumeCounts>) {
        let inner = self.inner.read().unwrap();
        let order: Vec<String> = inner.order.iter().cloned().collect();
        (order, inner.buckets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_counts_accumulate_per_minute_and_volume() {
        let window = MinuteVolumeWindow::new(DEFAULT_WINDOW_CAPACITY);
        window.record("03-05 14:07", "vol-a", IOType::Read);
        window.record("03-05 14:07", "vol-a", IOType::Write);
        window.record("03-05 14:07", "vol-b", IOType::Read);

        let (order, buckets) = window.snapshot();
        assert_eq!(order, vec!["03-05 14:07".to_string()]);
        let bucket = &buckets["03-05 14:07"];
        assert_eq!(bucket["vol-a"], CountPair { reads: 1, writes: 1 });
        assert_eq!(bucket["vol-b"], CountPair { reads: 1, writes: 0 });
    }

    #[test]
    fn test_window_bound_holds_after_every_insert() {
        let window = MinuteVolumeWindow::new(3);
        for minute in 0..20 {
            let key = format!("03-05 14:{minute:02}");
            window.record(&key, "vol-a", IOType::Read);
            assert!(window.len() <= 3);
        }
    }

    #[test]
    fn test_fifo_eviction_order() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&evicted);

        let mut window = MinuteVolumeWindow::new(2);
        window.set_notifier(Box::new(move |minute, _| {
            log.lock().unwrap().push(minute.to_string());
        }));

        window.record("10-01 00:00", "vol-a", IOType::Read);
        window.record("10-01 00:01", "vol-a", IOType::Read);
        // Re-incrementing the oldest key must not move it in eviction order
        window.record("10-01 00:00", "vol-a", IOType::Write);
        window.record("10-01 00:02", "vol-a", IOType::Read);
        window.record("10-01 00:03", "vol-a", IOType::Read);

        assert_eq!(
            *evicted.lock().unwrap(),
            vec!["10-01 00:00".to_string(), "10-01 00:01".to_string()]
        );
        let (order, _) = window.snapshot();
        assert_eq!(order, vec!["10-01 00:02".to_string(), "10-01 00:03".to_string()]);
    }

    #[test]
    fn test_notifier_sees_evicted_counts() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = Arc::clone(&seen);

        let mut window = MinuteVolumeWindow::new(1);
        window.set_notifier(Box::new(move |minute, counts| {
            assert_eq!(minute, "10-01 00:00");
            assert_eq!(counts["vol-a"], CountPair { reads: 2, writes: 1 });
            seen_in_cb.fetch_add(1, Ordering::SeqCst);
        }));

        window.record("10-01 00:00", "vol-a", IOType::Read);
        window.record("10-01 00:00", "vol-a", IOType::Read);
        window.record("10-01 00:00", "vol-a", IOType::Write);
        window.record("10-01 00:01", "vol-a", IOType::Read);

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_capacity_never_evicts() {
        let window = MinuteVolumeWindow::new(0);
        for minute in 0..500 {
            let key = format!("10-01 {:02}:{:02}", minute / 60, minute % 60);
            window.record(&key, "vol-a", IOType::Read);
        }
        assert_eq!(window.len(), 500);
    }
}
