//! Greedy fee-density transaction selection.

use crate::transaction::Transaction;

/// Size budget for the transactions of one block, in size units.
pub const MAX_BLOCK_SIZE: u64 = 1_000_000;

/// Pick transactions by descending fee density under `budget`.
///
/// Equal densities keep their input order. Selection stops at the first
/// transaction that would overflow the budget; nothing after it is tried.
pub fn select_transactions(mempool: &[Transaction], budget: u64) -> Vec<Transaction> {
    let mut ranked: Vec<(f64, &Transaction)> =
        mempool.iter().map(|tx| (tx.fee_density(), tx)).collect();

    // `sort_by` is stable, which is what keeps ties in arrival order.
    ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut selected = Vec::new();
    let mut used = 0u64;

    for (_, tx) in ranked {
        let next = used + tx.weight();
        if next > budget {
            break;
        }
        used = next;
        selected.push(tx.clone());
    }

    selected
}
