use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{CountPair, IOType};

/// Lifetime read/write totals per volume identifier.
pub struct VolumeStats {
    table: RwLock<HashMap<String, CountPair>>,
}

impl VolumeStats {
    pub fn new() -> Self {
        VolumeStats {
            table: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, volume: &str, io_type: IOType) {
        let mut map = self.table.write().unwrap();
        map.entry(volume.to_string()).or_default().bump(io_type);
    }

    pub fn snapshot(&self) -> HashMap<String, CountPair> {
        self.table.read().unwrap().clone()
    }
}

impl Default for VolumeStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_volume_totals() {
        let stats = VolumeStats::new();
        stats.record("vol-a", IOType::Read);
        stats.record("vol-a", IOType::Write);
        stats.record("vol-b", IOType::Write);

        let snap = stats.snapshot();
        assert_eq!(snap["vol-a"], CountPair { reads: 1, writes: 1 });
        assert_eq!(snap["vol-b"], CountPair { reads: 0, writes: 1 });
    }
}
