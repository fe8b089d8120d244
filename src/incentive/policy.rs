//! Reward-accrual policies
//!
//! The manager never computes rewards itself; it asks an injected policy
//! how much a time interval releases. Policies are capability objects with
//! a single method, so anything from a flat emission rate to an external
//! oracle adapter can be plugged in.

use std::fmt;

use super::Timestamp;

/// Capability interface for reward accrual: the reward quantity a policy
/// releases over a half-open time interval.
pub trait RewardSchedule: fmt::Debug {
    /// Reward released over `[start, end)`. Implementations return 0 for
    /// empty or inverted intervals.
    fn reward_between(&self, start: Timestamp, end: Timestamp) -> u128;
}

/// Releases rewards at a constant per-second rate inside a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearSchedule {
    /// First second at which rewards flow.
    pub start: Timestamp,
    /// First second at which rewards no longer flow.
    pub end: Timestamp,
    /// Reward released per second inside the window.
    pub rate_per_second: u128,
}

impl LinearSchedule {
    /// Schedule releasing `rate_per_second` over `[start, end)`.
    pub fn new(start: Timestamp, end: Timestamp, rate_per_second: u128) -> Self {
        Self {
            start,
            end,
            rate_per_second,
        }
    }

    /// Total the schedule can ever release.
    pub fn total_emission(&self) -> u128 {
        self.reward_between(self.start, self.end)
    }
}

impl RewardSchedule for LinearSchedule {
    fn reward_between(&self, start: Timestamp, end: Timestamp) -> u128 {
        let lo = start.max(self.start);
        let hi = end.min(self.end);
        if hi <= lo {
            return 0;
        }
        u128::from(hi - lo).saturating_mul(self.rate_per_second)
    }
}
