use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::aggregate::Aggregator;
use crate::parsers::line::{parse_line, Provider};

/// Drains raw trace lines from the channel and feeds the shared aggregator.
/// One instance runs per worker thread. Rejected lines are only counted;
/// they never abort the run.
pub fn parser_worker(
    rx: Receiver<String>,
    provider: Provider,
    aggregator: Arc<Aggregator>,
    parsed: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
) {
    for line in rx.iter() {
        match parse_line(provider, &line) {
            Some(event) => {
                aggregator.record_io(
                    &event.time,
                    &event.io_type,
                    &event.volume,
                    event.offset,
                    event.size,
                );
                parsed.fetch_add(1, Ordering::Relaxed);
            }
            None => {
                rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
