//! Merkle root computation over transaction id strings.
//!
//! Parent nodes hash the concatenation of the two child hex strings, decoded
//! as written. Ids are not byte-reversed first, so roots differ from the
//! Bitcoin merkle tree for the same transactions.

use crate::error::TemplateError;
use crate::hash::double_sha256;

/// Root of an empty transaction list.
pub const EMPTY_MERKLE_ROOT: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Compute the merkle root from ordered transaction ids (coinbase first).
///
/// A single id is returned unchanged. Odd levels duplicate their last node
/// before pairing.
pub fn compute_merkle_root<S: AsRef<str>>(txids: &[S]) -> Result<String, TemplateError> {
    if txids.is_empty() {
        return Ok(EMPTY_MERKLE_ROOT.to_string());
    }

    let mut current_level: Vec<String> = txids.iter().map(|id| id.as_ref().to_string()).collect();

    while current_level.len() > 1 {
        if current_level.len() % 2 == 1 {
            let last = current_level[current_level.len() - 1].clone();
            current_level.push(last);
        }

        current_level = current_level
            .chunks(2)
            .map(|pair| combine(&pair[0], &pair[1]))
            .collect::<Result<_, _>>()?;
    }

    Ok(current_level.remove(0))
}

/// Hash two child nodes into their parent.
fn combine(left: &str, right: &str) -> Result<String, TemplateError> {
    let joined = format!("{left}{right}");
    let bytes = hex::decode(&joined).map_err(|_| TemplateError::InvalidTxid(joined))?;
    Ok(hex::encode(double_sha256(&bytes)))
}
