//! Prefix-sum traversal and the structure checker
//!
//! Queries never mutate and never fail: an absent node reads as the zero
//! record, and a path that exits through a null pointer simply stops
//! accumulating.

use super::{CumulativeTree, TreeError};

impl CumulativeTree {
    /// Cumulative total of every delta applied at keys `<= x`.
    ///
    /// Accepts any `x`; keys at or beyond `2^nbits - 1` report the grand
    /// total of everything ever added.
    pub fn prefix_sum(&self, x: u64) -> u128 {
        let mut total: u128 = 0;
        let mut cur = self.root_key();
        while cur != 0 {
            let node = self.node(cur);
            if x >= cur {
                total = total.saturating_add(node.value);
                if x == cur {
                    break;
                }
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        total
    }

    /// Grand total of every delta ever added.
    pub fn total(&self) -> u128 {
        self.prefix_sum(self.max_key())
    }

    /// Verify the search-structure invariant over the materialized node
    /// set: left descendants below the key, right descendants above, and
    /// every stored record reachable from the canonical root.
    ///
    /// O(store) — a test and debugging aid, not part of the hot path.
    pub fn check_structure(&self) -> Result<(), TreeError> {
        let mut reachable = 0usize;
        self.check_subtree(self.root_key(), 0, u64::MAX, &mut reachable)?;
        let stored = self.store().len();
        if reachable != stored {
            return Err(TreeError::Internal(format!(
                "{stored} nodes stored but only {reachable} reachable from the root"
            )));
        }
        Ok(())
    }

    fn check_subtree(
        &self,
        key: u64,
        lo: u64,
        hi: u64,
        reachable: &mut usize,
    ) -> Result<(), TreeError> {
        if key == 0 {
            return Ok(());
        }
        if key <= lo || key >= hi {
            return Err(TreeError::Internal(format!(
                "node {key} escapes its search interval ({lo}, {hi})"
            )));
        }
        if self.store().contains_key(&key) {
            *reachable += 1;
        }
        let node = self.node(key);
        self.check_subtree(node.left, lo, key, reachable)?;
        self.check_subtree(node.right, key, hi, reachable)
    }
}
