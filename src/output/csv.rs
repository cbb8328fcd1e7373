use csv::{Reader, Writer, WriterBuilder};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fs::{self, File};
use std::path::Path;

use crate::aggregate::Aggregator;
use crate::log_error;
use crate::models::CountPair;

const OP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Read/write ratio in the `1:w/r` shape the report consumers expect:
/// `"0"` for write-only counters, `"N/A"` for untouched ones.
pub fn ratio_string(reads: u64, writes: u64) -> String {
    if reads > 0 {
        format!("1:{:.2}", writes as f64 / reads as f64)
    } else if writes > 0 {
        "0".to_string()
    } else {
        "N/A".to_string()
    }
}

pub fn read_ratio_percent(reads: u64, total: u64) -> String {
    if total > 0 {
        format!("{:.2}", 100.0 * reads as f64 / total as f64)
    } else {
        "0".to_string()
    }
}

fn write_time_stats(
    path: &Path,
    stats: &HashMap<String, CountPair>,
    key_header: &str,
) -> Result<(), Box<dyn Error>> {
    let mut keys: Vec<&String> = stats.keys().collect();
    keys.sort();

    let mut writer = Writer::from_writer(File::create(path)?);
    writer.write_record([
        key_header,
        "Reads",
        "Writes",
        "TotalOps",
        "Read/Write Ratio (read:write)",
    ])?;
    for key in keys {
        let cp = stats[key];
        writer.write_record(&[
            key.clone(),
            cp.reads.to_string(),
            cp.writes.to_string(),
            cp.total().to_string(),
            ratio_string(cp.reads, cp.writes),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_day_csv(path: &Path, aggregator: &Aggregator) -> Result<(), Box<dyn Error>> {
    write_time_stats(path, &aggregator.day_snapshot(), "Date")
}

pub fn write_hour_csv(path: &Path, aggregator: &Aggregator) -> Result<(), Box<dyn Error>> {
    write_time_stats(path, &aggregator.hour_snapshot(), "Hour")
}

pub fn write_minute_csv(path: &Path, aggregator: &Aggregator) -> Result<(), Box<dyn Error>> {
    write_time_stats(path, &aggregator.minute_snapshot(), "Minute")
}

#[derive(Serialize, Deserialize)]
struct VolumeRow {
    #[serde(rename = "VolumeID")]
    volume: String,
    #[serde(rename = "Reads")]
    reads: u64,
    #[serde(rename = "Writes")]
    writes: u64,
    #[serde(rename = "TotalOps")]
    total: u64,
    #[serde(rename = "ReadRatio(%)")]
    read_ratio: String,
}

// Rows sorted by total ops descending, the order every volume report uses
fn volume_rows(stats: &HashMap<String, CountPair>) -> Vec<VolumeRow> {
    let mut rows: Vec<VolumeRow> = stats
        .iter()
        .map(|(volume, cp)| VolumeRow {
            volume: volume.clone(),
            reads: cp.reads,
            writes: cp.writes,
            total: cp.total(),
            read_ratio: read_ratio_percent(cp.reads, cp.total()),
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.volume.cmp(&b.volume)));
    rows
}

// Headers are written up front so empty reports still carry them
fn headed_writer(path: &Path, header: &[&str]) -> Result<Writer<File>, Box<dyn Error>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(File::create(path)?);
    writer.write_record(header)?;
    Ok(writer)
}

fn write_volume_rows(path: &Path, rows: &[VolumeRow]) -> Result<(), Box<dyn Error>> {
    let mut writer = headed_writer(
        path,
        &["VolumeID", "Reads", "Writes", "TotalOps", "ReadRatio(%)"],
    )?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_volume_csv(path: &Path, aggregator: &Aggregator) -> Result<(), Box<dyn Error>> {
    write_volume_rows(path, &volume_rows(&aggregator.volume_snapshot()))
}

fn minute_file_name(minute_key: &str) -> String {
    format!(
        "volume_{}.csv",
        minute_key.replace(':', "-").replace(' ', "_")
    )
}

fn read_volume_counts(path: &Path) -> Result<HashMap<String, CountPair>, Box<dyn Error>> {
    let mut reader = Reader::from_reader(File::open(path)?);
    let mut counts = HashMap::new();
    for row in reader.deserialize::<VolumeRow>() {
        let row = row?;
        counts.insert(
            row.volume,
            CountPair {
                reads: row.reads,
                writes: row.writes,
            },
        );
    }
    Ok(counts)
}

/// Write one minute bucket's per-volume counters under `dir`. With `merge`
/// set, counts already on disk for that minute are added in first -- the
/// eviction notifier and the end-of-run flush both target the same files.
pub fn write_minute_volume_csv(
    dir: &Path,
    minute_key: &str,
    counts: &HashMap<String, CountPair>,
    merge: bool,
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(dir)?;
    let path = dir.join(minute_file_name(minute_key));

    let mut merged: HashMap<String, CountPair> = if merge && path.exists() {
        match read_volume_counts(&path) {
            Ok(existing) => existing,
            Err(e) => {
                log_error!("failed to read existing {}: {}", path.display(), e);
                HashMap::new()
            }
        }
    } else {
        HashMap::new()
    };

    for (volume, cp) in counts {
        let slot = merged.entry(volume.clone()).or_default();
        slot.reads += cp.reads;
        slot.writes += cp.writes;
    }

    write_volume_rows(&path, &volume_rows(&merged))
}

/// Flush every minute bucket still retained in the window.
pub fn write_volume_by_minute_dir(
    dir: &Path,
    aggregator: &Aggregator,
    merge: bool,
) -> Result<(), Box<dyn Error>> {
    let Some((mut keys, buckets)) = aggregator.minute_window_snapshot() else {
        return Ok(());
    };
    keys.sort();
    for key in keys {
        if let Some(counts) = buckets.get(&key) {
            write_minute_volume_csv(dir, &key, counts, merge)?;
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct StripeHistogramRow {
    #[serde(rename = "UpdatedBlocksInStripe")]
    blocks_touched: u32,
    #[serde(rename = "Count")]
    count: u64,
}

pub fn write_stripe_update_csv(path: &Path, aggregator: &Aggregator) -> Result<(), Box<dyn Error>> {
    let Some(histogram) = aggregator.stripe_histogram_snapshot() else {
        return Ok(());
    };
    let mut writer = headed_writer(path, &["UpdatedBlocksInStripe", "Count"])?;
    // BTreeMap iteration gives blocks-touched ascending
    for (blocks_touched, count) in histogram {
        writer.serialize(StripeHistogramRow {
            blocks_touched,
            count,
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct StripeHeatmapRow {
    #[serde(rename = "StripeID")]
    stripe_id: u64,
    #[serde(rename = "BlockIndex")]
    block_index: u32,
    #[serde(rename = "BlockType")]
    block_type: &'static str,
    #[serde(rename = "Reads")]
    reads: u64,
    #[serde(rename = "Writes")]
    writes: u64,
    #[serde(rename = "TotalOps")]
    total: u64,
}

pub fn write_stripe_heatmap_csv(
    path: &Path,
    aggregator: &Aggregator,
) -> Result<(), Box<dyn Error>> {
    let (Some(geometry), Some(heatmap)) = (
        aggregator.stripe_geometry(),
        aggregator.stripe_heatmap_snapshot(),
    ) else {
        return Ok(());
    };

    let mut stripe_ids: Vec<u64> = heatmap.keys().copied().collect();
    stripe_ids.sort_unstable();

    let mut writer = headed_writer(
        path,
        &["StripeID", "BlockIndex", "BlockType", "Reads", "Writes", "TotalOps"],
    )?;
    for stripe_id in stripe_ids {
        for (block_index, cp) in heatmap[&stripe_id].iter().enumerate() {
            if cp.total() == 0 {
                continue;
            }
            writer.serialize(StripeHeatmapRow {
                stripe_id,
                block_index: block_index as u32,
                block_type: geometry.block_type(block_index as u32).as_str(),
                reads: cp.reads,
                writes: cp.writes,
                total: cp.total(),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct StripeOpRow {
    #[serde(rename = "StripeID")]
    stripe_id: u64,
    #[serde(rename = "BlockIndex")]
    block_index: u32,
    #[serde(rename = "BlockType")]
    block_type: &'static str,
    #[serde(rename = "Read/Write")]
    io_type: &'static str,
    #[serde(rename = "OptionTime")]
    time: String,
}

pub fn write_stripe_ops_csv(path: &Path, aggregator: &Aggregator) -> Result<(), Box<dyn Error>> {
    let Some(mut ops) = aggregator.stripe_operations_snapshot() else {
        return Ok(());
    };
    // The op log grows with the trace; sort it in parallel
    ops.par_sort_by_key(|op| op.time);

    let mut writer = headed_writer(
        path,
        &["StripeID", "BlockIndex", "BlockType", "Read/Write", "OptionTime"],
    )?;
    for op in &ops {
        writer.serialize(StripeOpRow {
            stripe_id: op.stripe_id,
            block_index: op.block_index,
            block_type: op.block_type.as_str(),
            io_type: op.io_type.as_str(),
            time: op.time.format(OP_TIME_FORMAT).to_string(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregatorConfig;
    use chrono::{Local, TimeZone};
    use std::path::PathBuf;

    #[test]
    fn test_ratio_string_shapes() {
        assert_eq!(ratio_string(10, 25), "1:2.50");
        assert_eq!(ratio_string(0, 5), "0");
        assert_eq!(ratio_string(0, 0), "N/A");
    }

    #[test]
    fn test_read_ratio_percent_shapes() {
        assert_eq!(read_ratio_percent(1, 3), "33.33");
        assert_eq!(read_ratio_percent(0, 0), "0");
        assert_eq!(read_ratio_percent(4, 4), "100.00");
    }

    #[test]
    fn test_volume_rows_sorted_by_total_desc() {
        let mut stats = HashMap::new();
        stats.insert("small".to_string(), CountPair { reads: 1, writes: 0 });
        stats.insert("big".to_string(), CountPair { reads: 5, writes: 5 });
        stats.insert("mid".to_string(), CountPair { reads: 2, writes: 2 });

        let rows = volume_rows(&stats);
        let order: Vec<&str> = rows.iter().map(|r| r.volume.as_str()).collect();
        assert_eq!(order, vec!["big", "mid", "small"]);
        assert_eq!(rows[0].read_ratio, "50.00");
    }

    #[test]
    fn test_minute_file_name_is_filesystem_safe() {
        assert_eq!(minute_file_name("03-05 14:07"), "volume_03-05_14-07.csv");
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tracestat_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_minute_volume_merge_roundtrip() {
        let dir = temp_dir("merge");
        let mut counts = HashMap::new();
        counts.insert("vol-a".to_string(), CountPair { reads: 2, writes: 1 });

        write_minute_volume_csv(&dir, "03-05 14:07", &counts, true).unwrap();
        // Second flush for the same minute merges with the file on disk
        write_minute_volume_csv(&dir, "03-05 14:07", &counts, true).unwrap();

        let merged = read_volume_counts(&dir.join("volume_03-05_14-07.csv")).unwrap();
        assert_eq!(merged["vol-a"], CountPair { reads: 4, writes: 2 });
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_stripe_reports_roundtrip() {
        let dir = temp_dir("stripe");
        let config = AggregatorConfig {
            target_volume: Some("vol-t".to_string()),
            ..AggregatorConfig::default()
        };
        let agg = Aggregator::with_config(config).unwrap();
        let ts = Local.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        agg.record_io(&ts, "Write(1)", "vol-t", 0, 70000);

        let hist_path = dir.join("stripe_update_stats.csv");
        let heat_path = dir.join("stripe_heatmap.csv");
        let ops_path = dir.join("stripe_ops.csv");
        write_stripe_update_csv(&hist_path, &agg).unwrap();
        write_stripe_heatmap_csv(&heat_path, &agg).unwrap();
        write_stripe_ops_csv(&ops_path, &agg).unwrap();

        let hist = std::fs::read_to_string(&hist_path).unwrap();
        assert!(hist.contains("UpdatedBlocksInStripe,Count"));
        assert!(hist.contains("2,1"));

        let heat = std::fs::read_to_string(&heat_path).unwrap();
        assert!(heat.contains("0,0,Data,0,1,1"));
        assert!(heat.contains("0,1,Data,0,1,1"));

        let ops = std::fs::read_to_string(&ops_path).unwrap();
        assert_eq!(ops.lines().count(), 3); // header + two touched blocks
        std::fs::remove_dir_all(&dir).ok();
    }
}
