//! Range-liquidity staking incentives
//!
//! Bookkeeping layered on three [`CumulativeTree`] instances over the same
//! key universe:
//!
//! - one accumulates liquidity at positions' **lower** bounds,
//! - one accumulates liquidity at positions' **upper** bounds,
//! - one accumulates **reward share per liquidity unit** at whatever key the
//!   pool is currently active on.
//!
//! Liquidity active around key `k` is `lower.prefix_sum(k) -
//! upper.prefix_sum(k)`; a stake's earnings over its range are its liquidity
//! times the growth of the reward-share window `share(upper) - share(lower)`
//! since its last snapshot. Everything else here is sequential record
//! keeping: incentive funding and refunds through the custody ledger, stake
//! records, claim accounting.

mod custody;
mod policy;
mod positions;

pub use custody::{LedgerError, MemoryLedger, TokenLedger};
pub use policy::{LinearSchedule, RewardSchedule};
pub use positions::{PositionRecord, PositionSource, StaticPositions};

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::tree::{CumulativeTree, TreeError};

/// Pool identifier.
pub type PoolId = u64;
/// Position identifier, assigned by the external position manager.
pub type PositionId = u64;
/// Incentive identifier, assigned by the manager at creation.
pub type IncentiveId = u64;
/// Account identifier on the custody ledger.
pub type AccountId = u64;
/// Token identifier on the custody ledger.
pub type TokenId = u64;
/// Seconds since an arbitrary epoch.
pub type Timestamp = u64;

/// Fixed-point scale for reward-share-per-liquidity values stored in the
/// share tree.
pub const SHARE_SCALE: u128 = 1 << 64;

/// Errors surfaced by the incentive layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IncentiveError {
    /// The underlying tree rejected an operation.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The custody ledger rejected a transfer.
    #[error(transparent)]
    Custody(#[from] LedgerError),

    /// Position id unknown to the position source.
    #[error("position {0} is unknown")]
    UnknownPosition(PositionId),

    /// The position belongs to a pool this manager does not serve.
    #[error("position {position} belongs to pool {actual}, manager serves pool {expected}")]
    PoolMismatch {
        /// Position that was offered.
        position: PositionId,
        /// Pool the position belongs to.
        actual: PoolId,
        /// Pool this manager serves.
        expected: PoolId,
    },

    /// Position bounds do not form a valid key range.
    #[error("position bounds [{lower}, {upper}) are not a valid key range")]
    InvalidRange {
        /// Offered lower bound.
        lower: u64,
        /// Offered upper bound.
        upper: u64,
    },

    /// A key outside the pool's key universe.
    #[error("key {0} is outside the pool's key universe")]
    InvalidKey(u64),

    /// The position carries no liquidity.
    #[error("position {0} carries no liquidity")]
    ZeroLiquidity(PositionId),

    /// The position is already staked.
    #[error("position {0} is already staked")]
    AlreadyStaked(PositionId),

    /// The position is not currently staked.
    #[error("position {0} is not staked")]
    NotStaked(PositionId),

    /// Incentive id unknown to the manager.
    #[error("incentive {0} is unknown")]
    UnknownIncentive(IncentiveId),

    /// The incentive was already ended.
    #[error("incentive {0} already ended")]
    IncentiveEnded(IncentiveId),

    /// A timestamp ran backwards relative to the last accrual.
    #[error("timestamp {now} precedes the last accrual at {last}")]
    ClockSkew {
        /// Offered timestamp.
        now: Timestamp,
        /// Timestamp of the last accrual.
        last: Timestamp,
    },

    /// Reward arithmetic left the value-type range.
    #[error("arithmetic overflow in reward accounting")]
    RewardOverflow,
}

/// Bookkeeping for one staked position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stake {
    /// Account that staked and receives payouts.
    pub owner: AccountId,
    /// Inclusive lower boundary key.
    pub lower: u64,
    /// Exclusive upper boundary key.
    pub upper: u64,
    /// Liquidity registered at both boundary keys.
    pub liquidity: u128,
    /// Reward-share window at stake time or last claim (`SHARE_SCALE`
    /// fixed-point).
    pub share_snapshot: u128,
    /// Rewards paid out to this stake so far.
    pub claimed: u128,
    /// When the stake was created.
    pub staked_at: Timestamp,
}

/// Bookkeeping for one reward incentive.
#[derive(Debug)]
pub struct Incentive {
    /// Account that funded the incentive and receives refunds.
    pub creator: AccountId,
    /// Accrual policy deciding how much each interval releases.
    pub schedule: Box<dyn RewardSchedule>,
    /// Funding escrowed at creation.
    pub funded: u128,
    /// Portion distributed into the reward-share tree so far.
    pub distributed: u128,
    /// Portion accrued while no liquidity was in range; refundable.
    pub undistributed: u128,
    /// Set once the incentive is ended and refunded.
    pub ended: bool,
}

impl Incentive {
    fn remaining(&self) -> Result<u128, IncentiveError> {
        self.funded
            .checked_sub(self.distributed)
            .and_then(|r| r.checked_sub(self.undistributed))
            .ok_or_else(|| {
                TreeError::Internal("incentive distributed more than its funding".into()).into()
            })
    }
}

/// Per-pool incentive manager owning the three cumulative trees.
///
/// Operations are strictly sequential (`&mut self`); the original execution
/// model serializes every call, and callers that need sharing wrap the
/// manager in a mutex.
#[derive(Debug)]
pub struct IncentiveManager<P: PositionSource, L: TokenLedger> {
    pool: PoolId,
    reward_token: TokenId,
    lower_liquidity: CumulativeTree,
    upper_liquidity: CumulativeTree,
    reward_share: CumulativeTree,
    stakes: HashMap<PositionId, Stake>,
    incentives: HashMap<IncentiveId, Incentive>,
    next_incentive: IncentiveId,
    active_key: u64,
    last_accrual: Timestamp,
    positions: P,
    ledger: L,
}

impl<P: PositionSource, L: TokenLedger> IncentiveManager<P, L> {
    /// Create a manager for `pool`, rewarding in `reward_token`, over a
    /// `2^nbits` key universe, with the pool currently active at
    /// `active_key`.
    pub fn new(
        nbits: u32,
        pool: PoolId,
        reward_token: TokenId,
        active_key: u64,
        now: Timestamp,
        positions: P,
        ledger: L,
    ) -> Result<Self, IncentiveError> {
        let lower_liquidity = CumulativeTree::new(nbits)?;
        let upper_liquidity = CumulativeTree::new(nbits)?;
        let reward_share = CumulativeTree::new(nbits)?;
        if active_key == 0 || active_key > lower_liquidity.max_key() {
            return Err(IncentiveError::InvalidKey(active_key));
        }
        Ok(Self {
            pool,
            reward_token,
            lower_liquidity,
            upper_liquidity,
            reward_share,
            stakes: HashMap::new(),
            incentives: HashMap::new(),
            next_incentive: 0,
            active_key,
            last_accrual: now,
            positions,
            ledger,
        })
    }

    /// Pool this manager serves.
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    /// Token rewards are denominated in.
    pub fn reward_token(&self) -> TokenId {
        self.reward_token
    }

    /// Key the pool is currently active on.
    pub fn active_key(&self) -> u64 {
        self.active_key
    }

    /// Timestamp of the last reward accrual.
    pub fn last_accrual(&self) -> Timestamp {
        self.last_accrual
    }

    /// Stake record for `position`, if staked.
    pub fn stake_of(&self, position: PositionId) -> Option<&Stake> {
        self.stakes.get(&position)
    }

    /// Incentive record for `id`, if known.
    pub fn incentive(&self, id: IncentiveId) -> Option<&Incentive> {
        self.incentives.get(&id)
    }

    /// Tree accumulating liquidity at lower bounds.
    pub fn lower_liquidity(&self) -> &CumulativeTree {
        &self.lower_liquidity
    }

    /// Tree accumulating liquidity at upper bounds.
    pub fn upper_liquidity(&self) -> &CumulativeTree {
        &self.upper_liquidity
    }

    /// Tree accumulating reward share per liquidity unit.
    pub fn reward_share(&self) -> &CumulativeTree {
        &self.reward_share
    }

    /// The injected position source.
    pub fn positions(&self) -> &P {
        &self.positions
    }

    /// The injected custody ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Liquidity active around `key`: everything entered at or below it
    /// minus everything that has already left at or below it.
    pub fn active_liquidity(&self, key: u64) -> Result<u128, IncentiveError> {
        let entered = self.lower_liquidity.prefix_sum(key);
        let exited = self.upper_liquidity.prefix_sum(key);
        entered.checked_sub(exited).ok_or_else(|| {
            TreeError::Internal(format!("more liquidity left than entered at key {key}")).into()
        })
    }

    /// Escrow `funded` of the reward token from `creator` and start a new
    /// incentive governed by `schedule`.
    pub fn create_incentive(
        &mut self,
        creator: AccountId,
        funded: u128,
        schedule: Box<dyn RewardSchedule>,
        now: Timestamp,
    ) -> Result<IncentiveId, IncentiveError> {
        self.accrue(now)?;
        self.ledger.collect(self.reward_token, creator, funded)?;
        let id = self.next_incentive;
        self.next_incentive += 1;
        self.incentives.insert(
            id,
            Incentive {
                creator,
                schedule,
                funded,
                distributed: 0,
                undistributed: 0,
                ended: false,
            },
        );
        debug!(incentive = id, funded, "incentive created");
        Ok(id)
    }

    /// Stop an incentive and refund its creator everything not yet
    /// distributed to stakers. Returns the refund amount.
    pub fn end_incentive(
        &mut self,
        id: IncentiveId,
        now: Timestamp,
    ) -> Result<u128, IncentiveError> {
        self.accrue(now)?;
        let incentive = self
            .incentives
            .get(&id)
            .ok_or(IncentiveError::UnknownIncentive(id))?;
        if incentive.ended {
            return Err(IncentiveError::IncentiveEnded(id));
        }
        let refund = incentive
            .funded
            .checked_sub(incentive.distributed)
            .ok_or_else(|| {
                IncentiveError::from(TreeError::Internal(
                    "incentive distributed more than its funding".into(),
                ))
            })?;
        let creator = incentive.creator;
        if refund > 0 {
            self.ledger.pay_out(self.reward_token, creator, refund)?;
        }
        if let Some(incentive) = self.incentives.get_mut(&id) {
            incentive.ended = true;
        }
        debug!(incentive = id, refund, "incentive ended");
        Ok(refund)
    }

    /// Stake `position` for `staker`: register its liquidity at both
    /// boundary keys and snapshot the reward-share window.
    pub fn stake(
        &mut self,
        position: PositionId,
        staker: AccountId,
        now: Timestamp,
    ) -> Result<(), IncentiveError> {
        if self.stakes.contains_key(&position) {
            return Err(IncentiveError::AlreadyStaked(position));
        }
        let record = self
            .positions
            .position(position)
            .ok_or(IncentiveError::UnknownPosition(position))?;
        if record.pool != self.pool {
            return Err(IncentiveError::PoolMismatch {
                position,
                actual: record.pool,
                expected: self.pool,
            });
        }
        let max = self.lower_liquidity.max_key();
        if record.lower == 0 || record.lower >= record.upper || record.upper > max {
            return Err(IncentiveError::InvalidRange {
                lower: record.lower,
                upper: record.upper,
            });
        }
        if record.liquidity == 0 {
            return Err(IncentiveError::ZeroLiquidity(position));
        }

        self.accrue(now)?;
        self.lower_liquidity.add(record.lower, record.liquidity)?;
        if let Err(err) = self.upper_liquidity.add(record.upper, record.liquidity) {
            self.lower_liquidity.remove(record.lower, record.liquidity)?;
            return Err(err.into());
        }
        let snapshot = self.share_window(record.lower, record.upper)?;
        self.stakes.insert(
            position,
            Stake {
                owner: staker,
                lower: record.lower,
                upper: record.upper,
                liquidity: record.liquidity,
                share_snapshot: snapshot,
                claimed: 0,
                staked_at: now,
            },
        );
        debug!(
            position,
            staker,
            lower = record.lower,
            upper = record.upper,
            liquidity = record.liquidity,
            "position staked"
        );
        Ok(())
    }

    /// Rewards `position` has earned but not yet claimed, at the current
    /// accrual state (no accrual is performed).
    pub fn pending_rewards(&self, position: PositionId) -> Result<u128, IncentiveError> {
        let stake = self
            .stakes
            .get(&position)
            .ok_or(IncentiveError::NotStaked(position))?;
        self.earned_since_snapshot(stake)
    }

    /// Accrue, pay `position`'s pending rewards to its owner, and roll the
    /// snapshot forward. Returns the amount paid.
    pub fn claim(&mut self, position: PositionId, now: Timestamp) -> Result<u128, IncentiveError> {
        self.accrue(now)?;
        let stake = *self
            .stakes
            .get(&position)
            .ok_or(IncentiveError::NotStaked(position))?;
        let amount = self.earned_since_snapshot(&stake)?;
        if amount > 0 {
            self.ledger.pay_out(self.reward_token, stake.owner, amount)?;
        }
        let current = self.share_window(stake.lower, stake.upper)?;
        if let Some(stake) = self.stakes.get_mut(&position) {
            stake.share_snapshot = current;
            stake.claimed = stake.claimed.saturating_add(amount);
        }
        debug!(position, amount, "rewards claimed");
        Ok(amount)
    }

    /// Claim outstanding rewards, withdraw the position's liquidity from
    /// both boundary keys, and drop the stake record. Returns the final
    /// payout.
    pub fn unstake(
        &mut self,
        position: PositionId,
        now: Timestamp,
    ) -> Result<u128, IncentiveError> {
        self.accrue(now)?;
        let stake = *self
            .stakes
            .get(&position)
            .ok_or(IncentiveError::NotStaked(position))?;
        let amount = self.earned_since_snapshot(&stake)?;

        self.lower_liquidity.remove(stake.lower, stake.liquidity)?;
        if let Err(err) = self.upper_liquidity.remove(stake.upper, stake.liquidity) {
            self.lower_liquidity.add(stake.lower, stake.liquidity)?;
            return Err(err.into());
        }
        if amount > 0 {
            if let Err(err) = self.ledger.pay_out(self.reward_token, stake.owner, amount) {
                self.lower_liquidity.add(stake.lower, stake.liquidity)?;
                self.upper_liquidity.add(stake.upper, stake.liquidity)?;
                return Err(err.into());
            }
        }
        self.stakes.remove(&position);
        debug!(position, amount, "position unstaked");
        Ok(amount)
    }

    /// Accrue up to `now`, then reposition the pool's active key.
    pub fn move_active_key(&mut self, key: u64, now: Timestamp) -> Result<(), IncentiveError> {
        if key == 0 || key > self.lower_liquidity.max_key() {
            return Err(IncentiveError::InvalidKey(key));
        }
        self.accrue(now)?;
        debug!(from = self.active_key, to = key, "active key moved");
        self.active_key = key;
        Ok(())
    }

    /// Distribute rewards scheduled over `[last_accrual, now)`.
    ///
    /// Each live incentive releases what its schedule allows, capped by its
    /// remaining funding. With liquidity in range the sum lands in the
    /// share tree at the active key, scaled per liquidity unit; with none,
    /// it is parked as undistributed and refunded when the incentive ends.
    pub fn accrue(&mut self, now: Timestamp) -> Result<(), IncentiveError> {
        if now < self.last_accrual {
            return Err(IncentiveError::ClockSkew {
                now,
                last: self.last_accrual,
            });
        }
        if now == self.last_accrual {
            return Ok(());
        }
        let liquidity = self.active_liquidity(self.active_key)?;
        let (start, end) = (self.last_accrual, now);

        let mut released: u128 = 0;
        for incentive in self.incentives.values_mut() {
            if incentive.ended {
                continue;
            }
            let due = incentive.schedule.reward_between(start, end);
            let due = due.min(incentive.remaining()?);
            if due == 0 {
                continue;
            }
            if liquidity > 0 {
                incentive.distributed += due;
                released = released
                    .checked_add(due)
                    .ok_or(IncentiveError::RewardOverflow)?;
            } else {
                incentive.undistributed += due;
            }
        }

        if released > 0 {
            let share = released
                .checked_mul(SHARE_SCALE)
                .ok_or(IncentiveError::RewardOverflow)?
                / liquidity;
            self.reward_share.add(self.active_key, share)?;
            debug!(released, liquidity, "rewards accrued into share tree");
        }
        self.last_accrual = now;
        Ok(())
    }

    /// Reward share accumulated strictly inside `(lower, upper]`.
    fn share_window(&self, lower: u64, upper: u64) -> Result<u128, IncentiveError> {
        let at_upper = self.reward_share.prefix_sum(upper);
        let at_lower = self.reward_share.prefix_sum(lower);
        at_upper.checked_sub(at_lower).ok_or_else(|| {
            TreeError::Internal(format!(
                "share window ({lower}, {upper}] has negative width"
            ))
            .into()
        })
    }

    fn earned_since_snapshot(&self, stake: &Stake) -> Result<u128, IncentiveError> {
        let current = self.share_window(stake.lower, stake.upper)?;
        let growth = current.checked_sub(stake.share_snapshot).ok_or_else(|| {
            IncentiveError::from(TreeError::Internal(
                "reward-share window shrank below a stake's snapshot".into(),
            ))
        })?;
        stake
            .liquidity
            .checked_mul(growth)
            .map(|earned| earned / SHARE_SCALE)
            .ok_or(IncentiveError::RewardOverflow)
    }
}
