use serde::{Deserialize, Serialize};

use crate::models::IOType;

/// Paired read/write occurrence counters. Only ever incremented by one per
/// matching event; u64 overflow is not a design target for realistic traces.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountPair {
    pub reads: u64,
    pub writes: u64,
}

impl CountPair {
    pub fn bump(&mut self, io_type: IOType) {
        match io_type {
            IOType::Read => self.reads += 1,
            IOType::Write => self.writes += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.reads + self.writes
    }
}
