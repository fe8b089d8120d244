//! Sparse cumulative-sum tree over a fixed `2^nbits` key universe
//!
//! A Fenwick-like structure supporting point updates and prefix-sum queries,
//! except that storage nodes materialize lazily: only keys that have received
//! an update (or were synthesized as ancestors while splicing one in) occupy
//! an entry in the store. Keys double as node addresses; key 0 is the null
//! sentinel, so the operable range is `[1, 2^nbits - 1]`.
//!
//! # Invariants
//!
//! 1. A node with `h` trailing zero bits owns the interval of width `2^h`
//!    ending at its key; its `value` is the slice of the Fenwick
//!    decomposition not already counted by a materialized ancestor.
//! 2. `prefix_sum(x)` equals the sum of every delta applied at keys `<= x`,
//!    for every `x`, after any sequence of operations.
//! 3. Left/right pointers starting from the canonical root `2^(nbits-1)`
//!    always form a valid search structure over keys, and every stored
//!    record is reachable from the root.

mod addressing;
mod node;
mod query;
mod update;

pub use addressing::{ancestor_at, common_ancestor, height};
pub use node::Node;

use std::collections::HashMap;

use thiserror::Error;

/// Error type returned by tree construction and updates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Key width outside what a `u64` key can carry.
    #[error("key width {nbits} is outside the supported range [1, 63]")]
    InvalidConfig {
        /// The rejected width.
        nbits: u32,
    },

    /// Key 0 is the null sentinel and never addresses a node.
    #[error("key 0 is the null sentinel and cannot be operated on")]
    NullKey,

    /// Key beyond the top of the key universe.
    #[error("key {key} is outside the operable range [1, {max}]")]
    KeyOutOfRange {
        /// The rejected key.
        key: u64,
        /// Largest operable key, `2^nbits - 1`.
        max: u64,
    },

    /// A removal would drive a touched node's value negative.
    #[error("removing {delta} at key {key} would underflow node {node}")]
    Underflow {
        /// Key being removed from.
        key: u64,
        /// Node on the removal path whose value is too small.
        node: u64,
        /// Amount being removed.
        delta: u128,
    },

    /// A removal targeted a key that never received an addition.
    #[error("key {key} has no recorded additions to remove")]
    KeyNeverAdded {
        /// The key whose removal path died on a null pointer.
        key: u64,
    },

    /// An accumulated value exceeded the range of the value type.
    #[error("value overflow while applying {delta} at node {node}")]
    Overflow {
        /// Node whose value would overflow.
        node: u64,
        /// Delta being applied.
        delta: u128,
    },

    /// A data-structure invariant was violated.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// Sparse cumulative-sum tree.
///
/// Construction fixes the key width; all operations stay within `O(nbits)`
/// node visits. Operations take `&mut self` and are not internally
/// synchronized; callers that share an instance across threads wrap it in a
/// mutex.
#[derive(Debug, Clone)]
pub struct CumulativeTree {
    nbits: u32,
    nodes: HashMap<u64, Node>,
}

impl CumulativeTree {
    /// Create an empty tree over keys `[1, 2^nbits - 1]`.
    pub fn new(nbits: u32) -> Result<Self, TreeError> {
        if nbits == 0 || nbits > 63 {
            return Err(TreeError::InvalidConfig { nbits });
        }
        Ok(Self {
            nbits,
            nodes: HashMap::new(),
        })
    }

    /// Key width fixed at construction.
    pub fn nbits(&self) -> u32 {
        self.nbits
    }

    /// Canonical root key, `2^(nbits - 1)`.
    pub fn root_key(&self) -> u64 {
        1 << (self.nbits - 1)
    }

    /// Largest operable key, `2^nbits - 1`.
    pub fn max_key(&self) -> u64 {
        (1 << self.nbits) - 1
    }

    /// Number of materialized nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Lowest canonical node covering both `x` and `y`.
    pub fn common_ancestor(&self, x: u64, y: u64) -> Result<u64, TreeError> {
        addressing::common_ancestor(x, y, self.nbits)
    }

    /// Record stored at `key`, or the zero record when absent.
    pub(crate) fn node(&self, key: u64) -> Node {
        self.nodes.get(&key).copied().unwrap_or_default()
    }

    pub(crate) fn store(&self) -> &HashMap<u64, Node> {
        &self.nodes
    }

    pub(crate) fn put(&mut self, key: u64, node: Node) {
        self.nodes.insert(key, node);
    }

    pub(crate) fn ensure_operable(&self, key: u64) -> Result<(), TreeError> {
        if key == 0 {
            return Err(TreeError::NullKey);
        }
        if key > self.max_key() {
            return Err(TreeError::KeyOutOfRange {
                key,
                max: self.max_key(),
            });
        }
        Ok(())
    }
}
