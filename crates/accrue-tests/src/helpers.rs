//! Shared test helpers for E2E and invariant tests.

use accrue_core::custody::MemoryCustody;
use accrue_core::traits::Custody;
use accrue_core::types::{ParticipantId, Timestamp};
use accrue_pool::{PoolConfig, StakingPool};

/// Participant identity from a seed byte.
pub fn pid(seed: u8) -> ParticipantId {
    ParticipantId([seed; 32])
}

/// Participant identity from a label.
pub fn named(label: &str) -> ParticipantId {
    ParticipantId::from_label(label)
}

/// Pool with in-memory custody and the given round length.
pub fn make_pool(duration: u64) -> StakingPool {
    StakingPool::new(&PoolConfig {
        duration_secs: duration,
        ..PoolConfig::default()
    })
}

/// Pool funded with `amount` at `at` by the administrator.
pub fn funded_pool(duration: u64, amount: u64, at: Timestamp) -> StakingPool {
    let pool = make_pool(duration);
    let admin = pool.admin();
    pool.fund(&admin, amount, at).unwrap();
    pool
}

/// Reward ever funded into the pool's custody.
pub fn total_funded(pool: &StakingPool) -> u128 {
    pool.inspect_custody(MemoryCustody::total_funded)
}

/// Reward ever paid out of the pool's custody.
pub fn total_paid(pool: &StakingPool) -> u128 {
    pool.inspect_custody(MemoryCustody::total_paid)
}

/// Settled-but-unclaimed reward plus reward still accruing at `now`, over `ids`.
pub fn total_owed(pool: &StakingPool, ids: &[ParticipantId], now: Timestamp) -> u128 {
    ids.iter()
        .map(|id| pool.earned(id, now).unwrap() as u128)
        .sum()
}

/// Stake held by custody for `id`.
pub fn custody_stake(pool: &StakingPool, id: &ParticipantId) -> u64 {
    pool.inspect_custody(|c| c.staked_balance(id))
}
