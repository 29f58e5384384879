//! The live statistics snapshot shown to observers.

use serde::{Deserialize, Serialize};

/// Mining statistics.
///
/// One record lives for the process lifetime; the stats aggregator is its
/// only writer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningStats {
    /// Combined hash rate of the current epoch's workers (hashes per second).
    pub hash_rate: f64,
    /// Total hashes computed.
    pub total_hashes: u64,
    /// Total nonces tried.
    pub attempts: u64,
    /// Most leading zero bits seen in any hash.
    pub best_match_bits: u32,
    pub is_running: bool,
    /// Unix time in milliseconds of the last start.
    pub start_time: Option<u64>,
    pub target_difficulty: f64,
    /// Height of the block being mined.
    pub current_block: Option<i32>,
    /// Transactions in the current template, coinbase included.
    pub transactions_in_block: usize,
    pub total_fees: i64,
    pub blocks_found: u32,
    pub last_block_hash: Option<String>,
}

impl MiningStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Format hash rate for display.
    pub fn format_hash_rate(&self) -> String {
        if self.hash_rate >= 1_000_000_000.0 {
            format!("{:.2} GH/s", self.hash_rate / 1_000_000_000.0)
        } else if self.hash_rate >= 1_000_000.0 {
            format!("{:.2} MH/s", self.hash_rate / 1_000_000.0)
        } else if self.hash_rate >= 1_000.0 {
            format!("{:.2} KH/s", self.hash_rate / 1_000.0)
        } else {
            format!("{:.2} H/s", self.hash_rate)
        }
    }
}
