//! Transaction model shared by the selector, coinbase and merkle builders.

use serde::{Deserialize, Serialize};

/// Reference to an output being spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: String,
    pub vout: u32,
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: i64,
    /// Locking script as hex.
    pub script: String,
}

/// A pending (or coinbase) transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id as hex.
    pub id: String,
    #[serde(default)]
    pub fee: Option<i64>,
    #[serde(default)]
    pub size: Option<i32>,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
    #[serde(default)]
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Fee divided by size; a missing fee counts as zero and size is at least 1.
    pub fn fee_density(&self) -> f64 {
        let fee = self.fee.unwrap_or(0) as f64;
        let size = self.size.unwrap_or(0).max(1) as f64;
        fee / size
    }

    /// Size counted against the block budget; missing or negative sizes count as zero.
    pub fn weight(&self) -> u64 {
        self.size.unwrap_or(0).max(0) as u64
    }

    /// A coinbase has no inputs and exactly one output.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty() && self.outputs.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(fee: Option<i64>, size: Option<i32>) -> Transaction {
        Transaction {
            id: "aa".to_string(),
            fee,
            size,
            inputs: vec![TxInput {
                txid: "bb".to_string(),
                vout: 0,
            }],
            outputs: Vec::new(),
        }
    }

    #[test]
    fn test_fee_density() {
        assert_eq!(tx(Some(1_000), Some(250)).fee_density(), 4.0);
        assert_eq!(tx(None, Some(250)).fee_density(), 0.0);
        assert_eq!(tx(Some(300), None).fee_density(), 300.0);
        assert_eq!(tx(Some(300), Some(0)).fee_density(), 300.0);
    }

    #[test]
    fn test_weight() {
        assert_eq!(tx(None, Some(400)).weight(), 400);
        assert_eq!(tx(None, None).weight(), 0);
        assert_eq!(tx(None, Some(-5)).weight(), 0);
    }

    #[test]
    fn test_deserialize_sparse_transaction() {
        let tx: Transaction = serde_json::from_str(r#"{"id": "ff00"}"#).unwrap();
        assert_eq!(tx.fee, None);
        assert_eq!(tx.size, None);
        assert!(tx.inputs.is_empty());
        assert!(!tx.is_coinbase());
    }
}
