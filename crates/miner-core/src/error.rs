//! Errors raised while parsing or assembling a block template.

use thiserror::Error;

/// A template field or transaction id could not be turned into header bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A field that must be hex contained non-hex characters or odd length.
    #[error("invalid hex in {field}: {value:?}")]
    InvalidHex { field: &'static str, value: String },

    /// A 32-byte hash field decoded to the wrong number of bytes.
    #[error("{field} must be 32 bytes, got {len}")]
    InvalidHashLength { field: &'static str, len: usize },

    /// The `bits` field is neither hex nor a decimal 32-bit value.
    #[error("unparseable bits field: {0:?}")]
    InvalidBits(String),

    /// A transaction id could not be combined into the merkle tree.
    #[error("invalid transaction id in merkle tree: {0:?}")]
    InvalidTxid(String),
}
