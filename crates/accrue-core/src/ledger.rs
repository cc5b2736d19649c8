//! Accrual ledger: the global accumulator plus one record per participant.
//!
//! Participant records are allocated on first use and never removed. The
//! ledger only does bookkeeping; callers must settle the participant with
//! [`RewardAccountant`](crate::accountant::RewardAccountant) before changing
//! their stake.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AccrualError;
use crate::types::{Participant, ParticipantId};

/// Global accumulator and per-participant accrual state.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AccrualLedger {
    /// Reward per unit of stake since inception, scaled by [`SCALE`](crate::constants::SCALE).
    reward_per_unit_stored: u64,
    /// Sum of every participant's `stake_amount`.
    total_staked: u64,
    /// Participant records, keyed by identity.
    participants: HashMap<ParticipantId, Participant>,
}

impl AccrualLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reward_per_unit_stored(&self) -> u64 {
        self.reward_per_unit_stored
    }

    pub fn total_staked(&self) -> u64 {
        self.total_staked
    }

    /// Number of participant records ever created.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Look up a participant record.
    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    /// Whether a record exists for `id`.
    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    /// Current stake of `id`, zero if unknown.
    pub fn stake_of(&self, id: &ParticipantId) -> u64 {
        self.get(id).map_or(0, |p| p.stake_amount)
    }

    /// Sum of settled-but-unclaimed reward over all participants.
    pub fn total_settled(&self) -> u128 {
        self.participants
            .values()
            .map(|p| p.settled_reward as u128)
            .sum()
    }

    /// Iterate over all participant records.
    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &Participant)> {
        self.participants.iter()
    }

    /// Create a zeroed record for `id` if absent. Returns `true` if created.
    pub fn upsert_participant(&mut self, id: ParticipantId) -> bool {
        let mut created = false;
        self.participants.entry(id).or_insert_with(|| {
            created = true;
            Participant::default()
        });
        created
    }

    /// Compute the stake `id` would hold after applying `delta`, without mutating.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::NoStakeRecord`] if `id` has no record
    /// - [`AccrualError::InsufficientStake`] if the result would be negative
    /// - [`AccrualError::ArithmeticOverflow`] if the stake or total would overflow
    pub fn check_adjust(
        &self,
        id: &ParticipantId,
        delta: i128,
    ) -> Result<(u64, u64), AccrualError> {
        let current = self
            .get(id)
            .ok_or(AccrualError::NoStakeRecord(*id))?
            .stake_amount;
        let next = current as i128 + delta;
        if next < 0 {
            return Err(AccrualError::InsufficientStake {
                have: current,
                need: delta.unsigned_abs().min(u64::MAX as u128) as u64,
            });
        }
        let next = u64::try_from(next).map_err(|_| AccrualError::ArithmeticOverflow)?;
        let total = u64::try_from(self.total_staked as i128 + delta)
            .map_err(|_| AccrualError::ArithmeticOverflow)?;
        Ok((next, total))
    }

    /// Apply a signed change to `id`'s stake and to the total.
    ///
    /// Returns the new stake. Errors as [`check_adjust`](Self::check_adjust);
    /// on error nothing changes.
    pub fn adjust_stake(&mut self, id: &ParticipantId, delta: i128) -> Result<u64, AccrualError> {
        let (next, total) = self.check_adjust(id, delta)?;
        if let Some(p) = self.participants.get_mut(id) {
            p.stake_amount = next;
        }
        self.total_staked = total;
        Ok(next)
    }

    /// Overwrite `id`'s settled reward.
    pub fn record_earned(&mut self, id: &ParticipantId, value: u64) -> Result<(), AccrualError> {
        let p = self
            .participants
            .get_mut(id)
            .ok_or(AccrualError::NoStakeRecord(*id))?;
        p.settled_reward = value;
        Ok(())
    }

    /// Take `id`'s settled reward, leaving zero behind.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::NoStakeRecord`] if `id` has no record
    /// - [`AccrualError::NothingToClaim`] if the settled reward is zero
    pub fn claim(&mut self, id: &ParticipantId) -> Result<u64, AccrualError> {
        let p = self
            .participants
            .get_mut(id)
            .ok_or(AccrualError::NoStakeRecord(*id))?;
        if p.settled_reward == 0 {
            return Err(AccrualError::NothingToClaim);
        }
        Ok(std::mem::take(&mut p.settled_reward))
    }

    /// Advance the global accumulator. Never moves it backwards.
    pub(crate) fn advance_accumulator(&mut self, value: u64) {
        self.reward_per_unit_stored = self.reward_per_unit_stored.max(value);
    }

    /// Snapshot the accumulator into `id`'s record and store its earned reward.
    pub(crate) fn checkpoint(&mut self, id: &ParticipantId, accumulator: u64, earned: u64) {
        let p = self.participants.entry(*id).or_default();
        p.accumulator_paid = accumulator;
        p.settled_reward = earned;
    }
}
