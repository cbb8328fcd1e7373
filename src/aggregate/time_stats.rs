use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{CountPair, IOType};

pub const DAY_KEY_FORMAT: &str = "%m-%d";
pub const HOUR_KEY_FORMAT: &str = "%m-%d %H";
pub const MINUTE_KEY_FORMAT: &str = "%m-%d %H:%M";

/// Minute-granularity key of a timestamp, derived from its local calendar
/// fields. The year is deliberately not part of any key: downstream report
/// consumers expect the "MM-DD HH:MM" shape, so multi-year traces alias
/// same-date buckets (documented in DESIGN.md).
pub fn minute_key(time: &DateTime<Local>) -> String {
    time.format(MINUTE_KEY_FORMAT).to_string()
}

/// Day/hour/minute read-write counters. Each granularity sits behind its own
/// lock, so an increment to one table never blocks the others and readers of
/// one table never wait on writers of another.
pub struct TimeStats {
    day: RwLock<HashMap<String, CountPair>>,
    hour: RwLock<HashMap<String, CountPair>>,
    minute: RwLock<HashMap<String, CountPair>>,
}

impl TimeStats {
    pub fn new() -> Self {
        TimeStats {
            day: RwLock::new(HashMap::new()),
            hour: RwLock::new(HashMap::new()),
            minute: RwLock::new(HashMap::new()),
        }
    }

    /// Increment the day, hour and minute buckets for `time` by exactly one.
    /// Buckets are created lazily on first hit.
    pub fn record(&self, time: &DateTime<Local>, io_type: IOType) {
        Self::bump(&self.day, time.format(DAY_KEY_FORMAT).to_string(), io_type);
        Self::bump(&self.hour, time.format(HOUR_KEY_FORMAT).to_string(), io_type);
        Self::bump(&self.minute, minute_key(time), io_type);
    }

    fn bump(table: &RwLock<HashMap<String, CountPair>>, key: String, io_type: IOType) {
        let mut map = table.write().unwrap();
        map.entry(key).or_default().bump(io_type);
    }

    fn snapshot(table: &RwLock<HashMap<String, CountPair>>) -> HashMap<String, CountPair> {
        table.read().unwrap().clone()
    }

    pub fn day_snapshot(&self) -> HashMap<String, CountPair> {
        Self::snapshot(&self.day)
    }

    pub fn hour_snapshot(&self) -> HashMap<String, CountPair> {
        Self::snapshot(&self.hour)
    }

    pub fn minute_snapshot(&self) -> HashMap<String, CountPair> {
        Self::snapshot(&self.minute)
    }
}

impl Default for TimeStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, min: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, day, hour, min, 30).unwrap()
    }

    #[test]
    fn test_keys_cover_three_granularities() {
        let stats = TimeStats::new();
        stats.record(&at(5, 14, 7), IOType::Read);

        assert_eq!(stats.day_snapshot()["03-05"].reads, 1);
        assert_eq!(stats.hour_snapshot()["03-05 14"].reads, 1);
        assert_eq!(stats.minute_snapshot()["03-05 14:07"].reads, 1);
    }

    #[test]
    fn test_conservation_across_tables() {
        let stats = TimeStats::new();
        let times = [at(1, 0, 0), at(1, 0, 1), at(1, 1, 0), at(2, 0, 0)];
        for (i, t) in times.iter().enumerate() {
            let io = if i % 2 == 0 { IOType::Read } else { IOType::Write };
            stats.record(t, io);
        }

        let sum = |snap: HashMap<String, CountPair>| -> u64 {
            snap.values().map(|cp| cp.total()).sum()
        };
        assert_eq!(sum(stats.day_snapshot()), times.len() as u64);
        assert_eq!(sum(stats.hour_snapshot()), times.len() as u64);
        assert_eq!(sum(stats.minute_snapshot()), times.len() as u64);
    }

    #[test]
    fn test_same_minute_accumulates() {
        let stats = TimeStats::new();
        stats.record(&at(5, 14, 7), IOType::Read);
        stats.record(&at(5, 14, 7), IOType::Write);
        let snap = stats.minute_snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["03-05 14:07"], CountPair { reads: 1, writes: 1 });
    }
}
