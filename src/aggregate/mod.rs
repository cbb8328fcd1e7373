pub mod aggregator;
pub mod minute_window;
pub mod stripe;
pub mod time_stats;
pub mod volume_stats;

pub use aggregator::{Aggregator, AggregatorConfig, TimeRange};
pub use minute_window::{EvictionNotifier, MinuteVolumeWindow, VolumeCounts};
pub use stripe::{BlockType, StripeAnalyzer, StripeGeometry, StripeOperation};
pub use time_stats::TimeStats;
pub use volume_stats::VolumeStats;
