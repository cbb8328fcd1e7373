use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One normalized block-storage I/O record, as handed over by the provider
/// parsers. `io_type` is the raw direction token from the trace line; it is
/// normalized inside the aggregation engine.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TraceEvent {
    pub time: DateTime<Local>,
    pub io_type: Box<str>,
    pub volume: Box<str>,
    pub offset: u64,
    pub size: u64,
}
