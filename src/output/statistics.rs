use crate::aggregate::Aggregator;
use crate::log;
use crate::output::csv::read_ratio_percent;

/// Console summary of the busiest volumes by total operations.
pub fn print_top_volumes(aggregator: &Aggregator, top: usize) {
    let snapshot = aggregator.volume_snapshot();

    let mut rows: Vec<(String, u64, u64)> = snapshot
        .into_iter()
        .map(|(volume, cp)| (volume, cp.reads, cp.writes))
        .collect();
    rows.sort_by(|a, b| {
        let (ta, tb) = (a.1 + a.2, b.1 + b.2);
        tb.cmp(&ta).then_with(|| a.0.cmp(&b.0))
    });

    let n = top.min(rows.len());
    log!("Top {} volumes (by total ops):", n);
    for (i, (volume, reads, writes)) in rows.iter().take(n).enumerate() {
        let total = reads + writes;
        log!(
            "{:2}) Volume {}: Reads={} Writes={} Total={} ReadRatio={}%",
            i + 1,
            volume,
            reads,
            writes,
            total,
            read_ratio_percent(*reads, total)
        );
    }
}
