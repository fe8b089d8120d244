//! # rangestake
//!
//! A sparse cumulative-sum (Fenwick-like) tree over a fixed `2^n` key
//! universe, and the range-liquidity staking incentive bookkeeping built on
//! top of it.
//!
//! ## Core structure
//!
//! [`CumulativeTree`] maps keys in `[1, 2^n - 1]` to accumulated values and
//! answers prefix-sum queries in `O(n)` node visits. Unlike an array-backed
//! Fenwick tree it materializes storage nodes lazily: only keys that ever
//! received an update (plus the ancestors synthesized to splice them in)
//! occupy storage. Keys double as node addresses, so the key space itself is
//! the arena.
//!
//! ## Incentive layer
//!
//! [`IncentiveManager`] owns three trees over the same universe — liquidity
//! entering at lower bounds, liquidity leaving at upper bounds, and
//! accumulated reward share per liquidity unit — and layers staking,
//! incentive funding, and claim accounting over them. Positions and token
//! custody stay behind the [`PositionSource`] and [`TokenLedger`] traits.
//!
//! ## Usage
//!
//! ```
//! use rangestake::CumulativeTree;
//!
//! let mut tree = CumulativeTree::new(14)?;
//! tree.add(5342, 10)?;
//! assert_eq!(tree.prefix_sum(5341), 0);
//! assert_eq!(tree.prefix_sum(5342), 10);
//! tree.remove(5342, 10)?;
//! assert_eq!(tree.prefix_sum(16383), 0);
//! # Ok::<(), rangestake::TreeError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod incentive; // Staking, incentive funding, claim accounting
pub mod tree; // The sparse cumulative-sum tree

// Re-exports for convenience
pub use incentive::{
    IncentiveError, IncentiveManager, LedgerError, LinearSchedule, MemoryLedger, PositionRecord,
    PositionSource, RewardSchedule, StaticPositions, TokenLedger,
};
pub use tree::{CumulativeTree, Node, TreeError};
