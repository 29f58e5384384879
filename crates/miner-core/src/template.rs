//! Assembly of a finalized, mineable block template.

use crate::block::{BlockHeader, BlockTemplate, BLOCK_HEADER_SIZE};
use crate::coinbase::CoinbaseBuilder;
use crate::difficulty::Target;
use crate::error::TemplateError;
use crate::merkle::compute_merkle_root;
use crate::selector::{select_transactions, MAX_BLOCK_SIZE};
use crate::transaction::Transaction;

/// A template with its transaction set fixed and header fields validated.
///
/// Built once per epoch and shared read-only by that epoch's workers.
#[derive(Debug, Clone)]
pub struct FinalizedTemplate {
    /// Template with the computed merkle root filled in.
    pub template: BlockTemplate,
    /// Block transactions, coinbase first.
    pub transactions: Vec<Transaction>,
    /// Parsed header; the nonce field is zero.
    pub header: BlockHeader,
    /// Threshold derived from `template.difficulty`.
    pub target: Target,
    /// Sum of the fees of the selected mempool transactions.
    pub total_fees: i64,
}

impl FinalizedTemplate {
    /// Select transactions, build the coinbase and merkle root, then validate
    /// the header fields.
    ///
    /// Any malformed field fails the whole assembly.
    pub fn assemble(
        template: BlockTemplate,
        mempool: &[Transaction],
        reward_address: &str,
    ) -> Result<Self, TemplateError> {
        let selected = select_transactions(mempool, MAX_BLOCK_SIZE);
        let total_fees = selected
            .iter()
            .map(|tx| tx.fee.unwrap_or(0))
            .fold(0i64, i64::saturating_add);

        let coinbase = CoinbaseBuilder::new(template.height, reward_address).build(total_fees);

        let mut transactions = Vec::with_capacity(selected.len() + 1);
        transactions.push(coinbase);
        transactions.extend(selected);

        let txids: Vec<&str> = transactions.iter().map(|tx| tx.id.as_str()).collect();
        let merkle_root = compute_merkle_root(&txids)?;

        let template = BlockTemplate {
            merkle_root,
            nonce: None,
            ..template
        };
        let header = BlockHeader::from_template(&template)?;
        let target = Target::from_difficulty(template.difficulty);

        Ok(FinalizedTemplate {
            template,
            transactions,
            header,
            target,
            total_fees,
        })
    }

    /// The 80-byte header for `nonce`.
    pub fn header_bytes(&self, nonce: u32) -> [u8; BLOCK_HEADER_SIZE] {
        BlockHeader { nonce, ..self.header }.serialize()
    }

    /// Template with a winning nonce attached, as handed to the publisher.
    pub fn solved(&self, nonce: u32) -> BlockTemplate {
        self.template.with_nonce(nonce)
    }
}
