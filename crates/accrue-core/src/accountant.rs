//! Reward accountant implementing the [`AccrualCalculator`] trait.
//!
//! Converts "who staked how much, for how long" into "who is owed how much".
//! Every rate × seconds × scale product is formed in u128 and narrowed to
//! u64 only after the division.
//!
//! Settlement is split in two: [`RewardAccountant::settle`] computes a
//! [`Settlement`] without touching state, and [`Settlement::commit`] writes
//! it. Callers validate their own preconditions in between so a rejected
//! operation leaves no trace.

use tracing::debug;

use crate::constants::SCALE_U128;
use crate::error::AccrualError;
use crate::ledger::AccrualLedger;
use crate::schedule::{FundingPlan, RewardSchedule};
use crate::traits::AccrualCalculator;
use crate::types::{Participant, ParticipantId, Timestamp};

/// The stateless accrual engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewardAccountant;

/// State changes produced by a settlement, not yet applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    /// New value of `reward_per_unit_stored`.
    pub accumulator: u64,
    /// New value of `updated_at`.
    pub updated_at: Timestamp,
    /// Participant credited by this settlement and their total earned reward.
    pub credit: Option<(ParticipantId, u64)>,
}

impl Settlement {
    /// Earned reward of the credited participant, zero for a global settlement.
    pub fn earned(&self) -> u64 {
        self.credit.map_or(0, |(_, earned)| earned)
    }

    /// Apply the settlement.
    ///
    /// A credited participant without a record gets one, so this doubles as
    /// the lazy allocation on first stake.
    pub fn commit(self, schedule: &mut RewardSchedule, ledger: &mut AccrualLedger) {
        ledger.advance_accumulator(self.accumulator);
        schedule.updated_at = schedule.updated_at.max(self.updated_at);
        if let Some((id, earned)) = self.credit {
            ledger.checkpoint(&id, self.accumulator, earned);
        }
    }
}

impl RewardAccountant {
    /// Create a new RewardAccountant.
    pub fn new() -> Self {
        Self
    }

    /// Settle the global accumulator and `id`'s balance at `now`.
    ///
    /// `total_staked` must be the custody collaborator's current figure.
    /// An unknown `id` settles as a zeroed record.
    pub fn settle(
        &self,
        schedule: &RewardSchedule,
        ledger: &AccrualLedger,
        id: &ParticipantId,
        total_staked: u64,
        now: Timestamp,
    ) -> Result<Settlement, AccrualError> {
        let mut settlement = self.settle_global_only(schedule, ledger, total_staked, now)?;
        let participant = ledger.get(id).copied().unwrap_or_default();
        let earned = self.earned(&participant, settlement.accumulator)?;
        debug!(
            participant = %id.short(),
            stake = participant.stake_amount,
            accumulator_delta = settlement
                .accumulator
                .saturating_sub(participant.accumulator_paid),
            earned,
            "settled participant"
        );
        settlement.credit = Some((*id, earned));
        Ok(settlement)
    }

    /// Settle the global accumulator only, crediting nobody.
    ///
    /// Used before a funding so that accrual under the old rate is captured
    /// before the rate changes.
    pub fn settle_global_only(
        &self,
        schedule: &RewardSchedule,
        ledger: &AccrualLedger,
        total_staked: u64,
        now: Timestamp,
    ) -> Result<Settlement, AccrualError> {
        let accumulator =
            self.accumulator_at(schedule, ledger.reward_per_unit_stored(), total_staked, now)?;
        let updated_at = schedule.updated_at.max(schedule.last_time_applicable(now));
        Ok(Settlement {
            accumulator,
            updated_at,
            credit: None,
        })
    }
}

/// Narrow a u128 result to u64.
fn narrow(value: u128) -> Result<u64, AccrualError> {
    u64::try_from(value).map_err(|_| AccrualError::ArithmeticOverflow)
}

impl AccrualCalculator for RewardAccountant {
    fn accumulator_at(
        &self,
        schedule: &RewardSchedule,
        stored: u64,
        total_staked: u64,
        now: Timestamp,
    ) -> Result<u64, AccrualError> {
        if total_staked == 0 {
            return Ok(stored);
        }

        let elapsed = schedule.pending_seconds(now);
        if elapsed == 0 || schedule.reward_rate == 0 {
            return Ok(stored);
        }

        // delta = rate * elapsed * SCALE / total_staked
        let delta = (schedule.reward_rate as u128)
            .checked_mul(elapsed as u128)
            .and_then(|v| v.checked_mul(SCALE_U128))
            .ok_or(AccrualError::ArithmeticOverflow)?
            / total_staked as u128;

        let next = (stored as u128)
            .checked_add(delta)
            .ok_or(AccrualError::ArithmeticOverflow)?;
        narrow(next)
    }

    fn earned(&self, participant: &Participant, accumulator: u64) -> Result<u64, AccrualError> {
        let delta = accumulator.saturating_sub(participant.accumulator_paid);

        // stake * delta fits u128 for any pair of u64s.
        let accrued = (participant.stake_amount as u128) * (delta as u128) / SCALE_U128;

        narrow(accrued + participant.settled_reward as u128)
    }

    fn recompute_rate(
        &self,
        schedule: &RewardSchedule,
        funded_amount: u64,
        now: Timestamp,
        reward_balance: u64,
    ) -> Result<FundingPlan, AccrualError> {
        if schedule.duration == 0 {
            return Err(AccrualError::ZeroDuration);
        }
        let duration = schedule.duration as u128;

        // Time already folded into the accumulator is not emitted again.
        let start = now.max(schedule.updated_at);
        let rollover = if start >= schedule.finish_at {
            0
        } else {
            (schedule.finish_at - start) as u128 * schedule.reward_rate as u128
        };

        let rate = (funded_amount as u128 + rollover) / duration;
        if rate == 0 {
            return Err(AccrualError::ZeroRewardRate);
        }
        let reward_rate = narrow(rate)?;

        let required = rate * duration;
        if required > reward_balance as u128 {
            return Err(AccrualError::UnderfundedTreasury {
                required,
                available: reward_balance,
            });
        }

        let finish_at = start
            .checked_add(schedule.duration)
            .ok_or(AccrualError::ArithmeticOverflow)?;

        Ok(FundingPlan {
            reward_rate,
            finish_at,
            updated_at: start,
            rollover,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SCALE;
    use proptest::prelude::*;

    fn acct() -> RewardAccountant {
        RewardAccountant::new()
    }

    fn round(rate: u64, start: Timestamp, duration: u64) -> RewardSchedule {
        RewardSchedule {
            duration,
            finish_at: start + duration,
            updated_at: start,
            reward_rate: rate,
        }
    }

    fn alice() -> ParticipantId {
        ParticipantId::from_label("alice")
    }

    // --- accumulator_at ---

    #[test]
    fn accumulator_unchanged_with_nothing_staked() {
        let s = round(100, 0, 10);
        assert_eq!(acct().accumulator_at(&s, 77, 0, 5).unwrap(), 77);
        assert_eq!(acct().accumulator_at(&s, 77, 0, u64::MAX).unwrap(), 77);
    }

    #[test]
    fn accumulator_grows_linearly() {
        let s = round(100, 0, 10);
        // 100/s * 4s * SCALE / 50
        assert_eq!(acct().accumulator_at(&s, 0, 50, 4).unwrap(), 8 * SCALE);
    }

    #[test]
    fn accumulator_stops_at_finish() {
        let s = round(100, 0, 10);
        let at_finish = acct().accumulator_at(&s, 0, 10, 10).unwrap();
        let later = acct().accumulator_at(&s, 0, 10, 1_000).unwrap();
        assert_eq!(at_finish, later);
        assert_eq!(at_finish, 100 * SCALE);
    }

    #[test]
    fn accumulator_ignores_time_before_updated() {
        let s = round(100, 20, 10);
        assert_eq!(acct().accumulator_at(&s, 5, 10, 3).unwrap(), 5);
    }

    #[test]
    fn accumulator_large_values_do_not_overflow() {
        // rate * duration == u64::MAX-ish, the largest a solvent round allows.
        let duration = 1u64 << 20;
        let rate = u64::MAX / duration;
        let s = round(rate, 0, duration);
        let acc = acct().accumulator_at(&s, 0, u64::MAX, duration).unwrap();
        assert!(acc <= SCALE);
    }

    #[test]
    fn accumulator_narrowing_overflow_reported() {
        let s = round(u64::MAX, 0, 10);
        assert_eq!(
            acct().accumulator_at(&s, 0, 1, 10),
            Err(AccrualError::ArithmeticOverflow)
        );
    }

    // --- earned ---

    #[test]
    fn earned_includes_settled() {
        let p = Participant {
            stake_amount: 10,
            accumulator_paid: 2 * SCALE,
            settled_reward: 5,
        };
        // 10 * 3 + 5
        assert_eq!(acct().earned(&p, 5 * SCALE).unwrap(), 35);
    }

    #[test]
    fn earned_zero_stake_returns_settled() {
        let p = Participant {
            stake_amount: 0,
            accumulator_paid: 0,
            settled_reward: 9,
        };
        assert_eq!(acct().earned(&p, 100 * SCALE).unwrap(), 9);
    }

    #[test]
    fn earned_truncates_down() {
        let p = Participant {
            stake_amount: 3,
            accumulator_paid: 0,
            settled_reward: 0,
        };
        // 3 * 0.5 = 1.5 -> 1
        assert_eq!(acct().earned(&p, SCALE / 2).unwrap(), 1);
    }

    // --- settle ---

    #[test]
    fn settle_credits_participant() {
        let mut s = round(100, 0, 10);
        let mut l = AccrualLedger::new();
        l.upsert_participant(alice());
        l.adjust_stake(&alice(), 10).unwrap();

        let st = acct().settle(&s, &l, &alice(), 10, 4).unwrap();
        assert_eq!(st.earned(), 400);
        st.commit(&mut s, &mut l);

        assert_eq!(s.updated_at, 4);
        assert_eq!(l.reward_per_unit_stored(), 40 * SCALE);
        let p = l.get(&alice()).unwrap();
        assert_eq!(p.accumulator_paid, 40 * SCALE);
        assert_eq!(p.settled_reward, 400);
    }

    #[test]
    fn settle_is_idempotent_at_same_instant() {
        let mut s = round(100, 0, 10);
        let mut l = AccrualLedger::new();
        l.upsert_participant(alice());
        l.adjust_stake(&alice(), 10).unwrap();

        acct().settle(&s, &l, &alice(), 10, 4).unwrap().commit(&mut s, &mut l);
        let before = (s, l.clone());
        acct().settle(&s, &l, &alice(), 10, 4).unwrap().commit(&mut s, &mut l);
        assert_eq!(before, (s, l));
    }

    #[test]
    fn settle_does_not_mutate_until_commit() {
        let s = round(100, 0, 10);
        let mut l = AccrualLedger::new();
        l.upsert_participant(alice());
        l.adjust_stake(&alice(), 10).unwrap();
        let snapshot = l.clone();
        let _ = acct().settle(&s, &l, &alice(), 10, 4).unwrap();
        assert_eq!(l, snapshot);
    }

    #[test]
    fn settle_global_only_credits_nobody() {
        let mut s = round(100, 0, 10);
        let mut l = AccrualLedger::new();
        l.upsert_participant(alice());
        l.adjust_stake(&alice(), 10).unwrap();

        let st = acct().settle_global_only(&s, &l, 10, 6).unwrap();
        assert!(st.credit.is_none());
        st.commit(&mut s, &mut l);
        assert_eq!(l.reward_per_unit_stored(), 60 * SCALE);
        assert_eq!(l.get(&alice()).unwrap().settled_reward, 0);
        assert_eq!(s.updated_at, 6);
    }

    #[test]
    fn zero_stake_interval_advances_updated_at() {
        let mut s = round(100, 0, 10);
        let mut l = AccrualLedger::new();
        acct().settle_global_only(&s, &l, 0, 5).unwrap().commit(&mut s, &mut l);
        assert_eq!(l.reward_per_unit_stored(), 0);
        assert_eq!(s.updated_at, 5);
    }

    #[test]
    fn settle_updated_at_clamped_to_finish() {
        let mut s = round(100, 0, 10);
        let mut l = AccrualLedger::new();
        acct().settle_global_only(&s, &l, 1, 99).unwrap().commit(&mut s, &mut l);
        assert_eq!(s.updated_at, 10);
    }

    // --- recompute_rate ---

    #[test]
    fn fresh_round_rate() {
        let s = RewardSchedule::with_duration(10);
        let plan = acct().recompute_rate(&s, 1000, 1, 1000).unwrap();
        assert_eq!(plan.reward_rate, 100);
        assert_eq!(plan.finish_at, 11);
        assert_eq!(plan.updated_at, 1);
        assert_eq!(plan.rollover, 0);
    }

    #[test]
    fn rollover_blends_remaining() {
        let s = round(100, 1, 10); // finish_at = 11
        let plan = acct().recompute_rate(&s, 1000, 6, 2000).unwrap();
        // remaining = 5 * 100 = 500; (1000 + 500) / 10 = 150
        assert_eq!(plan.rollover, 500);
        assert_eq!(plan.reward_rate, 150);
        assert_eq!(plan.finish_at, 16);
    }

    #[test]
    fn backdated_funding_starts_at_updated_at() {
        let mut s = round(100, 1, 10); // finish_at = 11
        s.updated_at = 8;
        let plan = acct().recompute_rate(&s, 0, 5, 1000).unwrap();
        // Only 8..11 is still undistributed.
        assert_eq!(plan.rollover, 300);
        assert_eq!(plan.reward_rate, 30);
        assert_eq!(plan.updated_at, 8);
        assert_eq!(plan.finish_at, 18);
    }

    #[test]
    fn zero_rate_rejected() {
        let s = RewardSchedule::with_duration(10);
        assert_eq!(
            acct().recompute_rate(&s, 9, 1, 9),
            Err(AccrualError::ZeroRewardRate)
        );
    }

    #[test]
    fn zero_duration_rejected() {
        let s = RewardSchedule::new();
        assert_eq!(
            acct().recompute_rate(&s, 1000, 1, 1000),
            Err(AccrualError::ZeroDuration)
        );
    }

    #[test]
    fn underfunded_rejected() {
        let s = RewardSchedule::with_duration(10);
        assert_eq!(
            acct().recompute_rate(&s, 1000, 1, 999),
            Err(AccrualError::UnderfundedTreasury {
                required: 1000,
                available: 999
            })
        );
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn accumulator_monotonic(
            rate in 0u64..=1_000_000_000_000,
            duration in 1u64..=10_000_000,
            total in 0u64..=u64::MAX,
            t1 in 0u64..=20_000_000,
            t2 in 0u64..=20_000_000,
        ) {
            let s = round(rate, 0, duration);
            let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
            let a = acct().accumulator_at(&s, 0, total, lo);
            let b = acct().accumulator_at(&s, 0, total, hi);
            if let (Ok(a), Ok(b)) = (a, b) {
                prop_assert!(a <= b, "accumulator decreased: {} > {}", a, b);
            }
        }

        #[test]
        fn emission_bounded_by_rate_times_time(
            rate in 1u64..=1_000_000,
            duration in 1u64..=1_000_000,
            stake in 1_000u64..=1_000_000_000_000,
            now in 0u64..=2_000_000,
        ) {
            let s = round(rate, 0, duration);
            let acc = acct().accumulator_at(&s, 0, stake, now).unwrap();
            let p = Participant { stake_amount: stake, ..Participant::default() };
            let earned = acct().earned(&p, acc).unwrap() as u128;
            let emitted = rate as u128 * s.last_time_applicable(now) as u128;
            prop_assert!(earned <= emitted, "earned {} > emitted {}", earned, emitted);
        }

        #[test]
        fn rollover_preserved_exactly(
            rate in 1u64..=1_000_000,
            duration in 1u64..=100_000,
            into_round in 0u64..=100_000,
            funded in 0u64..=1_000_000_000,
        ) {
            let s = round(rate, 0, duration);
            let now = into_round.min(duration);
            let remaining = (duration - now) as u128 * rate as u128;
            match acct().recompute_rate(&s, funded, now, u64::MAX) {
                Ok(plan) => {
                    prop_assert_eq!(plan.rollover, remaining);
                    let expected = (funded as u128 + remaining) / duration as u128;
                    prop_assert_eq!(plan.reward_rate as u128, expected);
                }
                Err(e) => prop_assert_eq!(e, AccrualError::ZeroRewardRate),
            }
        }
    }
}
