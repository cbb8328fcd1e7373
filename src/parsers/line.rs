use chrono::{DateTime, Local, TimeZone};
use csv::{ReaderBuilder, StringRecord};

use crate::models::TraceEvent;

/// Trace provider, selecting the per-line field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Tencent CBS: `Timestamp,Offset,Size,IOType,VolumeID`, unix seconds.
    Tencent,
    /// Alicloud EBS: `DeviceID,Offset,Length,IOType,Timestamp`, unix
    /// microseconds.
    Alicloud,
}

impl Provider {
    pub fn from_name(name: &str) -> Option<Provider> {
        match name.to_lowercase().as_str() {
            "tencent" => Some(Provider::Tencent),
            "alicloud" => Some(Provider::Alicloud),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Tencent => "tencent",
            Provider::Alicloud => "alicloud",
        }
    }
}

// Quote-aware CSV split of a single trace line
fn split_fields(line: &str) -> Option<StringRecord> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes());
    let mut record = StringRecord::new();
    match reader.read_record(&mut record) {
        Ok(true) => Some(record),
        _ => None,
    }
}

/// Parse one raw trace line into a normalized event. Returns `None` for
/// malformed lines (including CSV headers); callers count rejections, the
/// core never sees them.
pub fn parse_line(provider: Provider, line: &str) -> Option<TraceEvent> {
    let record = split_fields(line)?;
    if record.len() < 5 {
        return None;
    }

    match provider {
        Provider::Tencent => {
            let secs: i64 = record.get(0)?.trim().parse().ok()?;
            let time: DateTime<Local> = Local.timestamp_opt(secs, 0).single()?;
            Some(TraceEvent {
                time,
                offset: record.get(1)?.trim().parse().ok()?,
                size: record.get(2)?.trim().parse().ok()?,
                io_type: record.get(3)?.trim().into(),
                volume: record.get(4)?.trim().into(),
            })
        }
        Provider::Alicloud => {
            let micros: i64 = record.get(4)?.trim().parse().ok()?;
            let time: DateTime<Local> = Local.timestamp_micros(micros).single()?;
            Some(TraceEvent {
                time,
                volume: record.get(0)?.trim().into(),
                offset: record.get(1)?.trim().parse().ok()?,
                size: record.get(2)?.trim().parse().ok()?,
                io_type: record.get(3)?.trim().into(),
            })
        }
    }
}
