//! Storage record for a materialized node
//!
//! The key a record is stored under doubles as the node's address; child
//! pointers are keys, with 0 meaning "no child". An absent store entry is
//! equivalent to the zero record, which is what makes the structure sparse.

use std::fmt;

/// A materialized tree node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// Key of the left child, or 0 when absent.
    pub left: u64,

    /// Key of the right child, or 0 when absent.
    pub right: u64,

    /// This node's slice of the Fenwick decomposition: the deltas applied
    /// inside its interval that no materialized ancestor already counts.
    /// Not the full prefix sum.
    pub value: u128,
}

impl Node {
    /// True when the record is indistinguishable from an absent entry.
    pub fn is_vacant(&self) -> bool {
        self.left == 0 && self.right == 0 && self.value == 0
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{left: {}, right: {}, value: {}}}",
            self.left, self.right, self.value
        )
    }
}
