//! Staking flow integration tests
//!
//! Drive the incentive manager end to end with the in-memory position
//! source and ledger: fund an incentive, stake ranges, accrue over time,
//! claim proportionally, unstake, and wind the incentive down.

use rangestake::{
    IncentiveError, IncentiveManager, LinearSchedule, MemoryLedger, PositionRecord,
    StaticPositions,
};

const POOL: u64 = 9;
const REWARD_TOKEN: u64 = 7;
const CREATOR: u64 = 1000;
const ALICE: u64 = 11;
const BOB: u64 = 12;
const CAROL: u64 = 13;

const POS_A: u64 = 1; // [100, 200) liq 32, owned by Alice
const POS_B: u64 = 2; // [150, 300) liq 32, owned by Bob
const POS_C: u64 = 3; // [500, 600) liq 100, owned by Carol

fn setup() -> IncentiveManager<StaticPositions, MemoryLedger> {
    let mut positions = StaticPositions::new();
    positions.insert(
        POS_A,
        PositionRecord {
            pool: POOL,
            lower: 100,
            upper: 200,
            liquidity: 32,
        },
    );
    positions.insert(
        POS_B,
        PositionRecord {
            pool: POOL,
            lower: 150,
            upper: 300,
            liquidity: 32,
        },
    );
    positions.insert(
        POS_C,
        PositionRecord {
            pool: POOL,
            lower: 500,
            upper: 600,
            liquidity: 100,
        },
    );
    positions.insert(
        4,
        PositionRecord {
            pool: POOL + 1,
            lower: 100,
            upper: 200,
            liquidity: 5,
        },
    );
    positions.insert(
        5,
        PositionRecord {
            pool: POOL,
            lower: 300,
            upper: 200,
            liquidity: 5,
        },
    );

    let mut ledger = MemoryLedger::new();
    ledger.mint(CREATOR, REWARD_TOKEN, 1_000_000);
    IncentiveManager::new(14, POOL, REWARD_TOKEN, 160, 0, positions, ledger).unwrap()
}

/// 40 reward tokens per second for 1000 seconds.
fn default_incentive(
    mgr: &mut IncentiveManager<StaticPositions, MemoryLedger>,
) -> rangestake::incentive::IncentiveId {
    mgr.create_incentive(
        CREATOR,
        40_000,
        Box::new(LinearSchedule::new(0, 1_000, 40)),
        0,
    )
    .unwrap()
}

#[test]
fn rewards_split_proportionally_to_liquidity() {
    let mut mgr = setup();
    default_incentive(&mut mgr);
    mgr.stake(POS_A, ALICE, 0).unwrap();
    mgr.stake(POS_B, BOB, 0).unwrap();
    assert_eq!(mgr.active_liquidity(160).unwrap(), 64);

    // 10 seconds at 40/s, split evenly across equal liquidity.
    assert_eq!(mgr.claim(POS_A, 10).unwrap(), 200);
    assert_eq!(mgr.claim(POS_B, 10).unwrap(), 200);
    assert_eq!(mgr.pending_rewards(POS_A).unwrap(), 0);
    assert_eq!(mgr.pending_rewards(POS_B).unwrap(), 0);
}

#[test]
fn out_of_range_liquidity_earns_nothing() {
    let mut mgr = setup();
    default_incentive(&mut mgr);
    mgr.stake(POS_A, ALICE, 0).unwrap();
    mgr.stake(POS_C, CAROL, 0).unwrap();

    // Carol's [500, 600) range does not cover the active key 160, so the
    // whole emission goes to Alice.
    assert_eq!(mgr.claim(POS_A, 10).unwrap(), 400);
    assert_eq!(mgr.claim(POS_C, 10).unwrap(), 0);
}

#[test]
fn moving_the_active_key_redirects_emission() {
    let mut mgr = setup();
    default_incentive(&mut mgr);
    mgr.stake(POS_A, ALICE, 0).unwrap();
    mgr.stake(POS_C, CAROL, 0).unwrap();

    // [0, 10): active at 160 -> Alice. [10, 30): active at 550 -> Carol.
    mgr.move_active_key(550, 10).unwrap();
    assert_eq!(mgr.active_key(), 550);
    assert_eq!(mgr.claim(POS_A, 30).unwrap(), 400);
    assert_eq!(mgr.claim(POS_C, 30).unwrap(), 800);
}

#[test]
fn unstake_pays_out_and_releases_liquidity() {
    let mut mgr = setup();
    default_incentive(&mut mgr);
    mgr.stake(POS_A, ALICE, 0).unwrap();
    mgr.stake(POS_B, BOB, 0).unwrap();

    let paid = mgr.unstake(POS_B, 10).unwrap();
    assert_eq!(paid, 200);
    assert_eq!(mgr.active_liquidity(160).unwrap(), 32);
    assert!(mgr.stake_of(POS_B).is_none());
    assert_eq!(
        mgr.unstake(POS_B, 10).unwrap_err(),
        IncentiveError::NotStaked(POS_B)
    );

    // Alice now takes the full emission.
    assert_eq!(mgr.claim(POS_A, 20).unwrap(), 200 + 400);

    // Bob's boundary nodes stay materialized at value zero.
    mgr.lower_liquidity().check_structure().unwrap();
    mgr.upper_liquidity().check_structure().unwrap();
}

#[test]
fn stake_rejects_foreign_and_inverted_positions() {
    let mut mgr = setup();
    assert_eq!(
        mgr.stake(4, ALICE, 0).unwrap_err(),
        IncentiveError::PoolMismatch {
            position: 4,
            actual: POOL + 1,
            expected: POOL,
        }
    );
    assert_eq!(
        mgr.stake(5, ALICE, 0).unwrap_err(),
        IncentiveError::InvalidRange {
            lower: 300,
            upper: 200,
        }
    );
    assert_eq!(
        mgr.stake(99, ALICE, 0).unwrap_err(),
        IncentiveError::UnknownPosition(99)
    );
}

#[test]
fn ending_an_incentive_refunds_what_was_not_distributed() {
    let mut mgr = setup();
    let id = default_incentive(&mut mgr);
    mgr.stake(POS_A, ALICE, 0).unwrap();

    // 30 seconds distributed at 40/s, the rest flows back to the creator.
    let refund = mgr.end_incentive(id, 30).unwrap();
    assert_eq!(refund, 40_000 - 1_200);
    assert_eq!(
        mgr.end_incentive(id, 30).unwrap_err(),
        IncentiveError::IncentiveEnded(id)
    );

    // The distributed part stays claimable.
    assert_eq!(mgr.claim(POS_A, 30).unwrap(), 1_200);
    // An ended incentive emits nothing further.
    assert_eq!(mgr.claim(POS_A, 100).unwrap(), 0);
}

#[test]
fn emission_while_nobody_is_in_range_is_refundable() {
    let mut mgr = setup();
    let id = default_incentive(&mut mgr);

    // Nobody staked for 50 seconds: 2000 parked as undistributed.
    mgr.accrue(50).unwrap();
    mgr.stake(POS_A, ALICE, 50).unwrap();
    assert_eq!(mgr.claim(POS_A, 60).unwrap(), 400);

    let refund = mgr.end_incentive(id, 60).unwrap();
    assert_eq!(refund, 40_000 - 400);
}

#[test]
fn ledger_balances_reconcile_after_a_full_cycle() {
    let mut mgr = setup();
    let id = default_incentive(&mut mgr);
    mgr.stake(POS_A, ALICE, 0).unwrap();
    mgr.stake(POS_B, BOB, 0).unwrap();

    mgr.claim(POS_A, 10).unwrap();
    mgr.unstake(POS_B, 20).unwrap();
    mgr.claim(POS_A, 30).unwrap();
    let refund = mgr.end_incentive(id, 30).unwrap();
    mgr.unstake(POS_A, 40).unwrap();

    // Alice: 200 (shared) + 200 (shared) + 400 (alone over [20, 30)).
    // Bob: 200 (shared) + 200 (shared up to his unstake at 20).
    // Creator: everything not emitted over the 30 live seconds.
    let ledger = mgr_ledger(&mgr);
    assert_eq!(ledger.balance_of(ALICE, REWARD_TOKEN), 800);
    assert_eq!(ledger.balance_of(BOB, REWARD_TOKEN), 400);
    assert_eq!(refund, 40_000 - 1_200);
    assert_eq!(
        ledger.balance_of(CREATOR, REWARD_TOKEN),
        1_000_000 - 40_000 + refund
    );
    assert_eq!(ledger.escrowed(REWARD_TOKEN), 0);
}

fn mgr_ledger(mgr: &IncentiveManager<StaticPositions, MemoryLedger>) -> &MemoryLedger {
    mgr.ledger()
}
