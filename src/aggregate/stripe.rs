use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use crate::models::{CountPair, IOType};

pub const DEFAULT_BLOCK_SIZE: u64 = 65536;
pub const DEFAULT_DATA_BLOCKS: u32 = 10;
pub const DEFAULT_PARITY_BLOCKS: u32 = 4;

/// Role of a block within its stripe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Data,
    Parity,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Data => "Data",
            BlockType::Parity => "Parity",
        }
    }
}

/// RAID/erasure-coding layout: `data_blocks + parity_blocks` consecutive
/// fixed-size blocks form one stripe, and the address space is carved into
/// stripes back to back.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripeGeometry {
    pub block_size: u64,
    pub data_blocks: u32,
    pub parity_blocks: u32,
}

impl Default for StripeGeometry {
    fn default() -> Self {
        StripeGeometry {
            block_size: DEFAULT_BLOCK_SIZE,
            data_blocks: DEFAULT_DATA_BLOCKS,
            parity_blocks: DEFAULT_PARITY_BLOCKS,
        }
    }
}

impl StripeGeometry {
    pub fn total_blocks(&self) -> u32 {
        self.data_blocks + self.parity_blocks
    }

    pub fn block_type(&self, block_index: u32) -> BlockType {
        if block_index < self.data_blocks {
            BlockType::Data
        } else {
            BlockType::Parity
        }
    }

    /// Inclusive range of absolute block indices touched by a byte range.
    /// A zero-length request still lands on the block containing `offset`.
    pub fn block_span(&self, offset: u64, size: u64) -> (u64, u64) {
        let start = offset / self.block_size;
        let end = offset.saturating_add(size.saturating_sub(1)) / self.block_size;
        (start, end.max(start))
    }

    /// Map an absolute block index to its (stripe ID, block index in stripe).
    pub fn locate(&self, absolute_block: u64) -> (u64, u32) {
        let total = self.total_blocks() as u64;
        (absolute_block / total, (absolute_block % total) as u32)
    }
}

/// One append-only log entry per (event, touched block) pair on the target
/// volume.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StripeOperation {
    pub stripe_id: u64,
    pub block_index: u32,
    pub block_type: BlockType,
    pub io_type: IOType,
    pub time: DateTime<Local>,
}

struct StripeInner {
    heatmap: HashMap<u64, Vec<CountPair>>,
    update_histogram: BTreeMap<u32, u64>,
    operations: Vec<StripeOperation>,
}

/// Stripe-level access analysis for the single configured target volume.
/// Each recorded event is O(blocks touched) extra work and one op-log entry
/// per touched block, which is why the aggregator only routes the target
/// volume here; target scoping is also the only bound on the op log.
pub struct StripeAnalyzer {
    geometry: StripeGeometry,
    inner: Mutex<StripeInner>,
}

impl StripeAnalyzer {
    pub fn new(geometry: StripeGeometry) -> Self {
        StripeAnalyzer {
            geometry,
            inner: Mutex::new(StripeInner {
                heatmap: HashMap::new(),
                update_histogram: BTreeMap::new(),
                operations: Vec::new(),
            }),
        }
    }

    pub fn geometry(&self) -> StripeGeometry {
        self.geometry
    }

    pub fn record(&self, offset: u64, size: u64, io_type: IOType, time: &DateTime<Local>) {
        let (start, end) = self.geometry.block_span(offset, size);

        // Touched block indices grouped per stripe, deduplicated. Computed
        // outside the lock; only the counter updates run under it.
        let mut touched: BTreeMap<u64, BTreeSet<u32>> = BTreeMap::new();
        for block in start..=end {
            let (stripe_id, block_index) = self.geometry.locate(block);
            touched.entry(stripe_id).or_default().insert(block_index);
        }

        let total = self.geometry.total_blocks() as usize;
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        for (stripe_id, blocks) in &touched {
            // Write width per stripe: how many distinct blocks one write
            // event dirties inside this stripe
            if io_type == IOType::Write {
                *inner.update_histogram.entry(blocks.len() as u32).or_insert(0) += 1;
            }

            let counters = inner
                .heatmap
                .entry(*stripe_id)
                .or_insert_with(|| vec![CountPair::default(); total]);
            for &block_index in blocks {
                counters[block_index as usize].bump(io_type);
                inner.operations.push(StripeOperation {
                    stripe_id: *stripe_id,
                    block_index,
                    block_type: self.geometry.block_type(block_index),
                    io_type,
                    time: *time,
                });
            }
        }
    }

    /// Write-width histogram: distinct blocks touched per write per stripe
    /// mapped to occurrence count.
    pub fn histogram_snapshot(&self) -> BTreeMap<u32, u64> {
        self.inner.lock().unwrap().update_histogram.clone()
    }

    pub fn heatmap_snapshot(&self) -> HashMap<u64, Vec<CountPair>> {
        self.inner.lock().unwrap().heatmap.clone()
    }

    pub fn operations_snapshot(&self) -> Vec<StripeOperation> {
        self.inner.lock().unwrap().operations.clone()
    }
}
