use chrono::{DateTime, Local};
use std::collections::{BTreeMap, HashMap};

use crate::aggregate::minute_window::{
    EvictionNotifier, MinuteVolumeWindow, VolumeCounts, DEFAULT_WINDOW_CAPACITY,
};
use crate::aggregate::stripe::{StripeAnalyzer, StripeGeometry, StripeOperation};
use crate::aggregate::time_stats::{minute_key, TimeStats};
use crate::aggregate::volume_stats::VolumeStats;
use crate::models::{CountPair, IOType};

/// Inclusive time-range filter; either bound may be absent, leaving that
/// side unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeRange {
    pub start: Option<DateTime<Local>>,
    pub end: Option<DateTime<Local>>,
}

impl TimeRange {
    pub fn contains(&self, time: &DateTime<Local>) -> bool {
        if let Some(start) = self.start {
            if *time < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if *time > end {
                return false;
            }
        }
        true
    }

    /// A reversed range would silently discard every event, so it is
    /// rejected up front instead.
    pub fn validate(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(format!(
                    "invalid time range: start {start} is after end {end}"
                ));
            }
        }
        Ok(())
    }
}

pub struct AggregatorConfig {
    /// Max retained minute keys in the minute-volume window; 0 disables
    /// eviction.
    pub minute_window_capacity: usize,
    /// Turns the per-minute-per-volume granularity off entirely when its
    /// memory cost is not wanted.
    pub enable_minute_volume: bool,
    pub eviction_notifier: Option<EvictionNotifier>,
    /// Volume ID that activates stripe analysis for matching events.
    pub target_volume: Option<String>,
    pub geometry: StripeGeometry,
    pub time_range: TimeRange,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            minute_window_capacity: DEFAULT_WINDOW_CAPACITY,
            enable_minute_volume: true,
            eviction_notifier: None,
            target_volume: None,
            geometry: StripeGeometry::default(),
            time_range: TimeRange::default(),
        }
    }
}

/// The shared aggregation engine. One instance is built at startup and
/// handed to every parser worker behind an `Arc`; all mutation goes through
/// `record`/`record_io`. Each sub-structure carries its own lock and the
/// ingest path takes them strictly one at a time, so there is no lock
/// ordering to get wrong -- at the cost that a concurrent reader may see an
/// event in one table before it lands in the next.
pub struct Aggregator {
    time_stats: TimeStats,
    volume_stats: VolumeStats,
    minute_window: Option<MinuteVolumeWindow>,
    stripe: Option<(String, StripeAnalyzer)>,
    time_range: TimeRange,
}

impl Aggregator {
    pub fn new() -> Self {
        // The default config carries no time range, so this cannot fail.
        Self::with_config(AggregatorConfig::default()).expect("default config is valid")
    }

    pub fn with_config(config: AggregatorConfig) -> Result<Self, String> {
        config.time_range.validate()?;

        let minute_window = if config.enable_minute_volume {
            let mut window = MinuteVolumeWindow::new(config.minute_window_capacity);
            if let Some(notifier) = config.eviction_notifier {
                window.set_notifier(notifier);
            }
            Some(window)
        } else {
            None
        };

        let stripe = config
            .target_volume
            .map(|volume| (volume, StripeAnalyzer::new(config.geometry)));

        Ok(Aggregator {
            time_stats: TimeStats::new(),
            volume_stats: VolumeStats::new(),
            minute_window,
            stripe,
            time_range: config.time_range,
        })
    }

    /// Ingestion entry point for records without address information.
    pub fn record(&self, time: &DateTime<Local>, io_token: &str, volume: &str) {
        self.ingest(time, io_token, volume, None);
    }

    /// Ingestion entry point carrying the byte range, required for stripe
    /// analysis of the target volume.
    pub fn record_io(&self, time: &DateTime<Local>, io_token: &str, volume: &str, offset: u64, size: u64) {
        self.ingest(time, io_token, volume, Some((offset, size)));
    }

    fn ingest(
        &self,
        time: &DateTime<Local>,
        io_token: &str,
        volume: &str,
        range: Option<(u64, u64)>,
    ) {
        let io_type = IOType::normalize(io_token);

        // Out-of-range events are dropped before any structure is touched,
        // stripe analysis included.
        if !self.time_range.contains(time) {
            return;
        }

        if let Some((target, analyzer)) = &self.stripe {
            if volume == target {
                if let Some((offset, size)) = range {
                    analyzer.record(offset, size, io_type, time);
                }
            }
        }

        self.time_stats.record(time, io_type);
        self.volume_stats.record(volume, io_type);
        if let Some(window) = &self.minute_window {
            window.record(&minute_key(time), volume, io_type);
        }
    }

    pub fn day_snapshot(&self) -> HashMap<String, CountPair> {
        self.time_stats.day_snapshot()
    }

    pub fn hour_snapshot(&self) -> HashMap<String, CountPair> {
        self.time_stats.hour_snapshot()
    }

    pub fn minute_snapshot(&self) -> HashMap<String, CountPair> {
        self.time_stats.minute_snapshot()
    }

    pub fn volume_snapshot(&self) -> HashMap<String, CountPair> {
        self.volume_stats.snapshot()
    }

    /// Ordered minute keys plus their per-volume counters; `None` when the
    /// minute-volume granularity is disabled.
    pub fn minute_window_snapshot(&self) -> Option<(Vec<String>, HashMap<String, VolumeCounts>)> {
        self.minute_window.as_ref().map(|w| w.snapshot())
    }

    pub fn target_volume(&self) -> Option<&str> {
        self.stripe.as_ref().map(|(volume, _)| volume.as_str())
    }

    pub fn stripe_geometry(&self) -> Option<StripeGeometry> {
        self.stripe.as_ref().map(|(_, analyzer)| analyzer.geometry())
    }

    pub fn stripe_histogram_snapshot(&self) -> Option<BTreeMap<u32, u64>> {
        self.stripe.as_ref().map(|(_, a)| a.histogram_snapshot())
    }

    pub fn stripe_heatmap_snapshot(&self) -> Option<HashMap<u64, Vec<CountPair>>> {
        self.stripe.as_ref().map(|(_, a)| a.heatmap_snapshot())
    }

    pub fn stripe_operations_snapshot(&self) -> Option<Vec<StripeOperation>> {
        self.stripe.as_ref().map(|(_, a)| a.operations_snapshot())
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::thread;

    fn at(min: u32, sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 5, 14, min, sec).unwrap()
    }

    fn target_config(volume: &str) -> AggregatorConfig {
        AggregatorConfig {
            target_volume: Some(volume.to_string()),
            ..AggregatorConfig::default()
        }
    }

    #[test]
    fn test_conservation_over_all_time_tables() {
        let agg = Aggregator::new();
        for i in 0..100u32 {
            let token = if i % 3 == 0 { "Read(0)" } else { "Write(1)" };
            agg.record(&at(i % 60, i % 60), token, "vol-a");
        }

        for snap in [agg.day_snapshot(), agg.hour_snapshot(), agg.minute_snapshot()] {
            let total: u64 = snap.values().map(|cp| cp.total()).sum();
            assert_eq!(total, 100);
        }
        let vol_total: u64 = agg.volume_snapshot().values().map(|cp| cp.total()).sum();
        assert_eq!(vol_total, 100);
    }

    #[test]
    fn test_target_volume_routes_to_stripe_analyzer() {
        let agg = Aggregator::with_config(target_config("vol-t")).unwrap();
        agg.record_io(&at(0, 0), "Write(1)", "vol-t", 0, 70000);
        agg.record_io(&at(0, 1), "Write(1)", "vol-other", 0, 70000);

        let histogram = agg.stripe_histogram_snapshot().unwrap();
        assert_eq!(histogram.get(&2), Some(&1));
        // The non-target volume still reaches the ordinary aggregates
        assert_eq!(agg.volume_snapshot()["vol-other"].writes, 1);
    }

    #[test]
    fn test_time_filter_drops_everything_including_stripe() {
        let config = AggregatorConfig {
            time_range: TimeRange {
                start: Some(at(10, 0)),
                end: Some(at(20, 0)),
            },
            ..target_config("vol-t")
        };
        let agg = Aggregator::with_config(config).unwrap();

        agg.record_io(&at(9, 59), "Write(1)", "vol-t", 0, 4096);
        agg.record_io(&at(20, 1), "Read(0)", "vol-t", 0, 4096);

        assert!(agg.day_snapshot().is_empty());
        assert!(agg.minute_snapshot().is_empty());
        assert!(agg.volume_snapshot().is_empty());
        assert!(agg.stripe_operations_snapshot().unwrap().is_empty());

        // Bounds are inclusive
        agg.record_io(&at(10, 0), "Write(1)", "vol-t", 0, 4096);
        agg.record_io(&at(20, 0), "Read(0)", "vol-t", 0, 4096);
        assert_eq!(agg.volume_snapshot()["vol-t"].total(), 2);
        assert_eq!(agg.stripe_operations_snapshot().unwrap().len(), 2);
    }

    #[test]
    fn test_reversed_time_range_is_rejected() {
        let config = AggregatorConfig {
            time_range: TimeRange {
                start: Some(at(20, 0)),
                end: Some(at(10, 0)),
            },
            ..AggregatorConfig::default()
        };
        assert!(Aggregator::with_config(config).is_err());
    }

    #[test]
    fn test_disabled_minute_volume_tracking() {
        let config = AggregatorConfig {
            enable_minute_volume: false,
            ..AggregatorConfig::default()
        };
        let agg = Aggregator::with_config(config).unwrap();
        agg.record(&at(0, 0), "Read(0)", "vol-a");

        assert!(agg.minute_window_snapshot().is_none());
        // The other granularities are unaffected
        assert_eq!(agg.minute_snapshot().len(), 1);
    }

    #[test]
    fn test_concurrent_ingest_conserves_counts() {
        let agg = Arc::new(Aggregator::new());
        let threads = 8;
        let per_thread = 500u64;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let agg = Arc::clone(&agg);
                thread::spawn(move || {
                    for i in 0..per_thread {
                        let token = if i % 2 == 0 { "0" } else { "1" };
                        let vol = format!("vol-{}", t % 3);
                        agg.record(&at((i % 60) as u32, 0), token, &vol);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected = threads as u64 * per_thread;
        let day_total: u64 = agg.day_snapshot().values().map(|cp| cp.total()).sum();
        let vol_total: u64 = agg.volume_snapshot().values().map(|cp| cp.total()).sum();
        assert_eq!(day_total, expected);
        assert_eq!(vol_total, expected);
    }
}
