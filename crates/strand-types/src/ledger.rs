use serde::{Deserialize, Serialize};

use crate::hash::Hash256;

/// Header of one closed ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub sequence: u32,
    pub hash: Hash256,
    pub previous_hash: Hash256,
    /// Unix seconds.
    pub close_time: u64,
    pub protocol_version: u32,
    pub total_coins: i64,
    pub fee_pool: i64,
    pub base_fee: u32,
    pub base_reserve: u32,
    pub max_tx_set_size: u32,
}

impl LedgerHeader {
    /// Whether `self` directly follows `parent` in the chain.
    pub fn follows(&self, parent: &LedgerHeader) -> bool {
        self.sequence == parent.sequence + 1 && self.previous_hash == parent.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(sequence: u32, hash: Hash256, previous_hash: Hash256) -> LedgerHeader {
        LedgerHeader {
            sequence,
            hash,
            previous_hash,
            close_time: 0,
            protocol_version: 12,
            total_coins: 0,
            fee_pool: 0,
            base_fee: 100,
            base_reserve: 5_000_000,
            max_tx_set_size: 100,
        }
    }

    #[test]
    fn follows_checks_hash_and_sequence() {
        let h1 = Hash256::digest(b"1");
        let h2 = Hash256::digest(b"2");
        let parent = header(1, h1, Hash256::zero());
        assert!(header(2, h2, h1).follows(&parent));
        assert!(!header(2, h2, h2).follows(&parent));
        assert!(!header(3, h2, h1).follows(&parent));
    }
}
