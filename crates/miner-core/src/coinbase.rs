//! Coinbase transaction construction.
//!
//! The coinbase pays the block subsidy plus collected fees to the miner. Its
//! locking script is a fixed P2PKH-shaped pattern around a hash of the
//! address string; the address itself is never decoded.

use crate::hash::{double_sha256, reverse_bytes, sha256};
use crate::transaction::{Transaction, TxOutput};

/// Subsidy of the first halving era: 50 coins in base units.
pub const INITIAL_REWARD: i64 = 5_000_000_000;

/// Blocks between subsidy halvings.
pub const HALVING_INTERVAL: i32 = 210_000;

/// Builder for the reward-paying transaction of one block.
#[derive(Debug, Clone)]
pub struct CoinbaseBuilder {
    /// The block height the coinbase belongs to.
    block_height: i32,
    /// Address receiving the reward.
    reward_address: String,
}

impl CoinbaseBuilder {
    /// Create a new coinbase builder.
    pub fn new(block_height: i32, reward_address: impl Into<String>) -> Self {
        CoinbaseBuilder {
            block_height,
            reward_address: reward_address.into(),
        }
    }

    /// Build the coinbase paying `subsidy(height) + total_fees`.
    pub fn build(&self, total_fees: i64) -> Transaction {
        let value = block_subsidy(self.block_height).saturating_add(total_fees);
        let script = locking_script(&self.reward_address);
        let raw_tx = self.serialize_transaction(value, &script);

        Transaction {
            id: hex::encode(reverse_bytes(&double_sha256(&raw_tx))),
            fee: Some(0),
            size: Some(raw_tx.len() as i32),
            inputs: Vec::new(),
            outputs: vec![TxOutput {
                value,
                script: hex::encode(&script),
            }],
        }
    }

    /// Serialize the single-output, input-less transaction.
    ///
    /// The height takes the locktime slot so coinbases of different blocks
    /// never share an id.
    fn serialize_transaction(&self, value: i64, script: &[u8]) -> Vec<u8> {
        let mut raw_tx = Vec::with_capacity(64);

        // Version
        raw_tx.extend_from_slice(&1u32.to_le_bytes());

        // No inputs
        encode_varint(0, &mut raw_tx);

        // One output
        encode_varint(1, &mut raw_tx);
        raw_tx.extend_from_slice(&value.to_le_bytes());
        encode_varint(script.len() as u64, &mut raw_tx);
        raw_tx.extend_from_slice(script);

        // Locktime
        raw_tx.extend_from_slice(&self.block_height.to_le_bytes());

        raw_tx
    }
}

/// Block subsidy at `height`, halved once per elapsed interval.
///
/// Negative heights are treated as the first era.
pub fn block_subsidy(height: i32) -> i64 {
    let halvings = height.max(0) / HALVING_INTERVAL;
    let mut subsidy = INITIAL_REWARD;
    for _ in 0..halvings {
        if subsidy == 0 {
            break;
        }
        subsidy /= 2;
    }
    subsidy
}

/// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG` around
/// the first 20 bytes of `sha256(address)`.
pub fn locking_script(address: &str) -> Vec<u8> {
    let digest = sha256(address.as_bytes());

    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[0x76, 0xa9, 0x14]);
    script.extend_from_slice(&digest[..20]);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

/// Encode a variable-length integer (Bitcoin varint).
fn encode_varint(value: u64, output: &mut Vec<u8>) {
    if value < 0xfd {
        output.push(value as u8);
    } else if value <= 0xffff {
        output.push(0xfd);
        output.extend_from_slice(&(value as u16).to_le_bytes());
    } else if value <= 0xffffffff {
        output.push(0xfe);
        output.extend_from_slice(&(value as u32).to_le_bytes());
    } else {
        output.push(0xff);
        output.extend_from_slice(&value.to_le_bytes());
    }
}
