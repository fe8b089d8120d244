//! Position lookup
//!
//! Positions live in an external position manager; the incentive layer only
//! ever reads them. The trait mirrors that read-only surface, and the
//! map-backed implementation stands in for it in tests and fixtures.

use std::collections::HashMap;
use std::fmt;

use super::{PoolId, PositionId};

/// A liquidity position as reported by the external position manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositionRecord {
    /// Pool the position belongs to.
    pub pool: PoolId,
    /// Inclusive lower boundary key.
    pub lower: u64,
    /// Exclusive upper boundary key.
    pub upper: u64,
    /// Liquidity the position carries across `[lower, upper)`.
    pub liquidity: u128,
}

/// Read-only lookup mapping a position id to its pool, bounds and size.
pub trait PositionSource: fmt::Debug {
    /// The position's current record, or `None` for an unknown id.
    fn position(&self, id: PositionId) -> Option<PositionRecord>;
}

/// In-memory `PositionSource` backed by a map.
#[derive(Debug, Clone, Default)]
pub struct StaticPositions {
    entries: HashMap<PositionId, PositionRecord>,
}

impl StaticPositions {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a position record.
    pub fn insert(&mut self, id: PositionId, record: PositionRecord) {
        self.entries.insert(id, record);
    }
}

impl PositionSource for StaticPositions {
    fn position(&self, id: PositionId) -> Option<PositionRecord> {
        self.entries.get(&id).copied()
    }
}
