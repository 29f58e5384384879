//! Target derivation from the template difficulty and hash comparison.
//!
//! The template's `difficulty` is not run through the usual
//! `max_target / difficulty` conversion. Its integer part is the number of
//! leading bits the target gives up: `target = 2^(256 - floor(difficulty))`.
//! Network difficulties are far above 256, which makes the target zero and
//! the search unwinnable; small values make it trivially easy.

use core::fmt;

/// Threshold a header hash must fall strictly below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// A 256-bit big-endian value.
    Bounded([u8; 32]),
    /// `2^256` or larger: every hash qualifies.
    Unbounded,
}

impl Target {
    /// Derive the target for a template difficulty.
    ///
    /// `NaN` floors to zero and yields [`Target::Unbounded`]; exponents below
    /// zero truncate to a zero target that nothing meets.
    pub fn from_difficulty(difficulty: f64) -> Self {
        let exponent = 256i128 - difficulty.floor() as i64 as i128;

        if exponent >= 256 {
            return Target::Unbounded;
        }

        let mut target = [0u8; 32];
        if exponent >= 0 {
            let exponent = exponent as usize;
            target[31 - exponent / 8] = 1 << (exponent % 8);
        }
        Target::Bounded(target)
    }

    /// Check a hash, read as a big-endian integer, against the target.
    #[inline]
    pub fn is_met_by(&self, hash: &[u8; 32]) -> bool {
        match self {
            Target::Unbounded => true,
            Target::Bounded(target) => hash_below_target(hash, target),
        }
    }

    /// True when no hash can meet the target.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Target::Bounded(target) if target.iter().all(|b| *b == 0))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Unbounded => write!(f, "2^256"),
            Target::Bounded(target) => write!(f, "{}", hex::encode(target)),
        }
    }
}

/// Strict big-endian comparison `hash < target`.
#[inline]
pub fn hash_below_target(hash: &[u8; 32], target: &[u8; 32]) -> bool {
    for i in 0..32 {
        if hash[i] < target[i] {
            return true;
        }
        if hash[i] > target[i] {
            return false;
        }
    }
    false
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        format!("{:.2}K", difficulty / 1e3)
    } else {
        format!("{:.2}", difficulty)
    }
}
