//! Trait interfaces for the Accrue ledger.
//!
//! These traits define the contracts between the accrual engine and its
//! collaborators:
//! - [`AccrualCalculator`]: pure accrual math, implemented by the reward accountant
//! - [`Custody`]: custody of stake and reward tokens, implemented by the host

use crate::error::{AccrualError, CustodyError};
use crate::schedule::{FundingPlan, RewardSchedule};
use crate::types::{Participant, ParticipantId, Timestamp};

/// Pure computation of the reward-per-unit accumulator, participant
/// earnings, and round funding.
///
/// All math is integer fixed-point with u128 intermediates. Implementations
/// hold no state.
pub trait AccrualCalculator: Send + Sync {
    /// Accumulator value at `now`, folding in emission since `schedule.updated_at`.
    ///
    /// Returns `stored` unchanged when `total_staked` is zero.
    fn accumulator_at(
        &self,
        schedule: &RewardSchedule,
        stored: u64,
        total_staked: u64,
        now: Timestamp,
    ) -> Result<u64, AccrualError>;

    /// Total reward owed to `participant` if the accumulator stood at `accumulator`.
    ///
    /// `stake * (accumulator - accumulator_paid) / SCALE + settled_reward`.
    fn earned(&self, participant: &Participant, accumulator: u64) -> Result<u64, AccrualError>;

    /// Plan a new round funded with `funded_amount` at `now`.
    ///
    /// `reward_balance` is the live custody balance of reward tokens including
    /// `funded_amount`. Undistributed reward of an unfinished round is rolled
    /// into the new rate. A `now` earlier than `schedule.updated_at` is
    /// treated as `updated_at`.
    fn recompute_rate(
        &self,
        schedule: &RewardSchedule,
        funded_amount: u64,
        now: Timestamp,
        reward_balance: u64,
    ) -> Result<FundingPlan, AccrualError>;
}

/// Custody of the stake and reward tokens.
///
/// The accrual engine never holds tokens, only accounting numbers. Custody
/// balances are the source of truth for solvency checks.
pub trait Custody: Send + Sync {
    /// Total stake-token quantity held on behalf of all participants.
    fn total_staked(&self) -> u64;

    /// Stake-token quantity held on behalf of `who`.
    fn staked_balance(&self, who: &ParticipantId) -> u64;

    /// Take `amount` of stake token into custody from `who`.
    fn deposit_stake(&mut self, who: &ParticipantId, amount: u64) -> Result<(), CustodyError>;

    /// Return up to `amount` of stake token to `who`. Returns the amount moved.
    fn withdraw_stake(&mut self, who: &ParticipantId, amount: u64) -> Result<u64, CustodyError>;

    /// Reward tokens currently held (funded and not yet paid out).
    fn reward_balance(&self) -> u64;

    /// Take `amount` of reward token into custody.
    fn deposit_reward(&mut self, amount: u64) -> Result<(), CustodyError>;

    /// Pay up to `amount` of reward token to `who`. Returns the amount paid.
    fn pay_reward(&mut self, who: &ParticipantId, amount: u64) -> Result<u64, CustodyError>;

    /// Reward tokens paid to `who` so far.
    ///
    /// Default implementation returns zero (override to track payouts).
    fn paid_to(&self, _who: &ParticipantId) -> u64 {
        0
    }
}
