//! In-memory set of addresses already rewarded
//!
//! Grows monotonically for the lifetime of the process: seeded once from the
//! payout contract's history, extended after each successful payment batch.
//! Memory is O(distinct addresses); there is no deletion.

use std::collections::HashSet;

use alloy::primitives::Address;

#[derive(Debug, Default)]
pub struct RewardLedger {
    paid: HashSet<Address>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.paid.contains(addr)
    }

    pub fn extend<I: IntoIterator<Item = Address>>(&mut self, addrs: I) {
        self.paid.extend(addrs);
    }

    pub fn len(&self) -> usize {
        self.paid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paid.is_empty()
    }

    /// The subset of `candidates` not yet in the ledger, sorted so that
    /// downstream batch partitioning is deterministic.
    pub fn unseen(&self, candidates: &HashSet<Address>) -> Vec<Address> {
        let mut fresh: Vec<Address> = candidates
            .iter()
            .filter(|addr| !self.paid.contains(*addr))
            .copied()
            .collect();
        fresh.sort();
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    #[test]
    fn unseen_subtracts_known_addresses() {
        let mut ledger = RewardLedger::new();
        ledger.extend([addr(2)]);

        let candidates: HashSet<Address> = [addr(1), addr(2), addr(3)].into();
        assert_eq!(ledger.unseen(&candidates), vec![addr(1), addr(3)]);
    }

    #[test]
    fn unseen_is_idempotent_on_unchanged_ledger() {
        let mut ledger = RewardLedger::new();
        ledger.extend([addr(9)]);

        let candidates: HashSet<Address> = [addr(1), addr(9)].into();
        let first = ledger.unseen(&candidates);
        let second = ledger.unseen(&candidates);
        assert_eq!(first, second);
    }

    #[test]
    fn extend_never_removes_members() {
        let mut ledger = RewardLedger::new();
        ledger.extend([addr(1), addr(2)]);
        ledger.extend([addr(2), addr(3)]);

        assert_eq!(ledger.len(), 3);
        for b in 1..=3 {
            assert!(ledger.contains(&addr(b)));
        }
    }

    #[test]
    fn unseen_output_is_sorted() {
        let ledger = RewardLedger::new();
        let candidates: HashSet<Address> = [addr(7), addr(1), addr(4)].into();
        assert_eq!(ledger.unseen(&candidates), vec![addr(1), addr(4), addr(7)]);
    }
}
