//! Core proof-of-work logic for the block miner.
//!
//! This crate provides pure Rust implementations of:
//! - Block header construction and serialization
//! - SHA256 double-hashing
//! - Merkle root reduction over transaction ids
//! - Fee-density transaction selection
//! - Coinbase construction with the halving schedule
//! - Target derivation from template difficulty

pub mod block;
pub mod coinbase;
pub mod difficulty;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod selector;
pub mod template;
pub mod transaction;

pub use block::{parse_bits, BlockHeader, BlockTemplate, BLOCK_HEADER_SIZE};
pub use coinbase::{block_subsidy, CoinbaseBuilder};
pub use difficulty::Target;
pub use error::TemplateError;
pub use hash::{double_sha256, leading_zero_bits};
pub use merkle::compute_merkle_root;
pub use selector::{select_transactions, MAX_BLOCK_SIZE};
pub use template::FinalizedTemplate;
pub use transaction::{Transaction, TxInput, TxOutput};
