//! Staking pool composition.
//!
//! The [`StakingPool`] wires the reward schedule, accrual ledger, and custody
//! collaborator behind a single `Mutex`. Every entry point runs the same
//! sequence inside one critical section:
//!
//! 1. settle the global accumulator (and the caller, where there is one)
//! 2. check every precondition
//! 3. move tokens through custody
//! 4. commit the settlement and the operation's own effect
//! 5. notify subscribers
//!
//! Nothing is written before step 3, so a rejected operation leaves the
//! pool exactly as it was.

use accrue_core::accountant::{RewardAccountant, Settlement};
use accrue_core::custody::MemoryCustody;
use accrue_core::error::{AccrualError, CustodyError, PoolError};
use accrue_core::events::PoolEvent;
use accrue_core::ledger::AccrualLedger;
use accrue_core::schedule::{FundingPlan, RewardSchedule, RoundPhase};
use accrue_core::traits::{AccrualCalculator, Custody};
use accrue_core::types::{Participant, ParticipantId, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;

/// Mutable pool state guarded by the pool lock.
struct PoolState<C> {
    schedule: RewardSchedule,
    ledger: AccrualLedger,
    custody: C,
}

/// Result of [`StakingPool::exit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReceipt {
    /// Stake returned to the participant.
    pub withdrawn: u64,
    /// Reward paid to the participant.
    pub paid: u64,
}

/// Per-participant line of a [`PoolReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantReport {
    pub participant: ParticipantId,
    pub stake: u64,
    pub earned: u64,
    pub paid: u64,
}

/// Read-only summary of the pool at an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolReport {
    pub now: Timestamp,
    pub phase: RoundPhase,
    pub reward_rate: u64,
    pub duration: u64,
    pub finish_at: Timestamp,
    pub updated_at: Timestamp,
    pub reward_per_unit: u64,
    pub total_staked: u64,
    pub reward_balance: u64,
    pub participants: Vec<ParticipantReport>,
}

/// A single-writer staking pool.
///
/// Generic over the custody collaborator; [`MemoryCustody`] by default.
pub struct StakingPool<C: Custody = MemoryCustody> {
    state: Mutex<PoolState<C>>,
    accountant: RewardAccountant,
    admin: ParticipantId,
    events: broadcast::Sender<PoolEvent>,
}

impl StakingPool<MemoryCustody> {
    /// Create a pool with in-memory custody.
    pub fn new(config: &PoolConfig) -> Self {
        Self::with_custody(config, MemoryCustody::new())
    }
}

impl<C: Custody> StakingPool<C> {
    /// Create a pool over the given custody.
    ///
    /// `custody` must not already hold stake: the ledger starts empty and
    /// its total must track the custody total from here on.
    pub fn with_custody(config: &PoolConfig, custody: C) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        info!(
            admin = %config.admin_id().short(),
            duration_secs = config.duration_secs,
            "staking pool created"
        );
        Self {
            state: Mutex::new(PoolState {
                schedule: RewardSchedule::with_duration(config.duration_secs),
                ledger: AccrualLedger::new(),
                custody,
            }),
            accountant: RewardAccountant::new(),
            admin: config.admin_id(),
            events,
        }
    }

    /// Identity allowed to fund rounds and change the duration.
    pub fn admin(&self) -> ParticipantId {
        self.admin
    }

    /// Subscribe to notifications of successful operations.
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: PoolEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn authorize(&self, caller: &ParticipantId) -> Result<(), AccrualError> {
        if *caller != self.admin {
            return Err(AccrualError::Unauthorized(*caller));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Stake `amount` for `who`. Returns the participant's new stake.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::ZeroAmount`] if `amount` is zero
    pub fn stake(
        &self,
        who: &ParticipantId,
        amount: u64,
        now: Timestamp,
    ) -> Result<u64, PoolError> {
        self.stake_inner(who, amount, now)
            .inspect_err(|e| warn!(participant = %who.short(), amount, now, "stake rejected: {e}"))
    }

    fn stake_inner(
        &self,
        who: &ParticipantId,
        amount: u64,
        now: Timestamp,
    ) -> Result<u64, PoolError> {
        if amount == 0 {
            return Err(AccrualError::ZeroAmount.into());
        }
        let mut guard = self.state.lock();
        let st = &mut *guard;

        let settlement = self.settle_participant(st, who, now)?;
        st.ledger
            .total_staked()
            .checked_add(amount)
            .ok_or(AccrualError::ArithmeticOverflow)?;

        st.custody.deposit_stake(who, amount)?;
        settlement.commit(&mut st.schedule, &mut st.ledger);
        st.ledger.upsert_participant(*who);
        let stake = st.ledger.adjust_stake(who, amount as i128)?;

        info!(
            participant = %who.short(),
            amount,
            stake,
            total = st.ledger.total_staked(),
            "staked"
        );
        self.notify(PoolEvent::Staked { participant: *who, amount });
        Ok(stake)
    }

    /// Withdraw `amount` of `who`'s stake. Returns the remaining stake.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::ZeroAmount`] if `amount` is zero
    /// - [`AccrualError::NoStakeRecord`] if `who` never staked
    /// - [`AccrualError::InsufficientStake`] if `amount` exceeds the stake
    pub fn withdraw(
        &self,
        who: &ParticipantId,
        amount: u64,
        now: Timestamp,
    ) -> Result<u64, PoolError> {
        self.withdraw_inner(who, amount, now)
            .inspect_err(|e| {
                warn!(participant = %who.short(), amount, now, "withdraw rejected: {e}")
            })
    }

    fn withdraw_inner(
        &self,
        who: &ParticipantId,
        amount: u64,
        now: Timestamp,
    ) -> Result<u64, PoolError> {
        if amount == 0 {
            return Err(AccrualError::ZeroAmount.into());
        }
        let mut guard = self.state.lock();
        let st = &mut *guard;

        if !st.ledger.contains(who) {
            return Err(AccrualError::NoStakeRecord(*who).into());
        }
        st.ledger.check_adjust(who, -(amount as i128))?;
        let settlement = self.settle_participant(st, who, now)?;
        Self::check_stake_custody(&st.custody, who, amount)?;

        let moved = st.custody.withdraw_stake(who, amount)?;
        Self::check_moved(moved, amount)?;
        settlement.commit(&mut st.schedule, &mut st.ledger);
        let stake = st.ledger.adjust_stake(who, -(amount as i128))?;

        info!(
            participant = %who.short(),
            amount,
            stake,
            total = st.ledger.total_staked(),
            "withdrawn"
        );
        self.notify(PoolEvent::Withdrawn { participant: *who, amount });
        Ok(stake)
    }

    /// Pay out everything `who` has earned. Returns the amount paid.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::NoStakeRecord`] if `who` never staked
    /// - [`AccrualError::NothingToClaim`] if nothing has been earned
    pub fn claim(&self, who: &ParticipantId, now: Timestamp) -> Result<u64, PoolError> {
        self.claim_inner(who, now)
            .inspect_err(|e| warn!(participant = %who.short(), now, "claim rejected: {e}"))
    }

    fn claim_inner(&self, who: &ParticipantId, now: Timestamp) -> Result<u64, PoolError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        if !st.ledger.contains(who) {
            return Err(AccrualError::NoStakeRecord(*who).into());
        }
        let settlement = self.settle_participant(st, who, now)?;
        let earned = settlement.earned();
        if earned == 0 {
            return Err(AccrualError::NothingToClaim.into());
        }
        Self::check_reward_custody(&st.custody, earned)?;

        let moved = st.custody.pay_reward(who, earned)?;
        Self::check_moved(moved, earned)?;
        settlement.commit(&mut st.schedule, &mut st.ledger);
        let paid = st.ledger.claim(who)?;

        info!(participant = %who.short(), paid, "reward paid");
        self.notify(PoolEvent::RewardPaid { participant: *who, amount: paid });
        Ok(paid)
    }

    /// Withdraw all of `who`'s stake and pay out everything earned.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::NoStakeRecord`] if `who` never staked
    /// - [`AccrualError::ZeroAmount`] if there is neither stake nor reward
    pub fn exit(&self, who: &ParticipantId, now: Timestamp) -> Result<ExitReceipt, PoolError> {
        self.exit_inner(who, now)
            .inspect_err(|e| warn!(participant = %who.short(), now, "exit rejected: {e}"))
    }

    fn exit_inner(&self, who: &ParticipantId, now: Timestamp) -> Result<ExitReceipt, PoolError> {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        if !st.ledger.contains(who) {
            return Err(AccrualError::NoStakeRecord(*who).into());
        }
        let stake = st.ledger.stake_of(who);
        let settlement = self.settle_participant(st, who, now)?;
        let earned = settlement.earned();
        if stake == 0 && earned == 0 {
            return Err(AccrualError::ZeroAmount.into());
        }
        Self::check_stake_custody(&st.custody, who, stake)?;
        Self::check_reward_custody(&st.custody, earned)?;

        if stake > 0 {
            let moved = st.custody.withdraw_stake(who, stake)?;
            Self::check_moved(moved, stake)?;
        }
        if earned > 0 {
            let moved = st.custody.pay_reward(who, earned)?;
            Self::check_moved(moved, earned)?;
        }
        settlement.commit(&mut st.schedule, &mut st.ledger);
        st.ledger.adjust_stake(who, -(stake as i128))?;
        let paid = if earned > 0 { st.ledger.claim(who)? } else { 0 };

        info!(participant = %who.short(), withdrawn = stake, paid, "exited");
        if stake > 0 {
            self.notify(PoolEvent::Withdrawn { participant: *who, amount: stake });
        }
        if paid > 0 {
            self.notify(PoolEvent::RewardPaid { participant: *who, amount: paid });
        }
        Ok(ExitReceipt { withdrawn: stake, paid })
    }

    /// Change the length of future rounds. Administrator only.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::Unauthorized`] if `caller` is not the administrator
    /// - [`AccrualError::RoundStillActive`] if `now <= finish_at`
    /// - [`AccrualError::ZeroDuration`] if `duration` is zero
    pub fn set_duration(
        &self,
        caller: &ParticipantId,
        duration: u64,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        self.set_duration_inner(caller, duration, now)
            .inspect_err(|e| {
                warn!(caller = %caller.short(), duration, now, "set_duration rejected: {e}")
            })
    }

    fn set_duration_inner(
        &self,
        caller: &ParticipantId,
        duration: u64,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        self.authorize(caller)?;
        let mut guard = self.state.lock();
        let st = &mut *guard;

        let settlement = self.settle_global(st, now)?;
        st.schedule.check_duration_change(duration, now)?;

        settlement.commit(&mut st.schedule, &mut st.ledger);
        st.schedule.set_duration(duration, now)?;

        info!(duration, "reward duration updated");
        self.notify(PoolEvent::DurationUpdated { duration });
        Ok(())
    }

    /// Fund a new round with `amount` reward tokens. Administrator only.
    ///
    /// Reward left over from an unfinished round is rolled into the new rate.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::Unauthorized`] if `caller` is not the administrator
    /// - [`AccrualError::ZeroRewardRate`] if the new rate rounds to zero
    /// - [`AccrualError::UnderfundedTreasury`] if custody cannot cover a full round
    pub fn fund(
        &self,
        caller: &ParticipantId,
        amount: u64,
        now: Timestamp,
    ) -> Result<FundingPlan, PoolError> {
        self.fund_inner(caller, amount, now)
            .inspect_err(|e| warn!(caller = %caller.short(), amount, now, "fund rejected: {e}"))
    }

    fn fund_inner(
        &self,
        caller: &ParticipantId,
        amount: u64,
        now: Timestamp,
    ) -> Result<FundingPlan, PoolError> {
        self.authorize(caller)?;
        let mut guard = self.state.lock();
        let st = &mut *guard;

        let settlement = self.settle_global(st, now)?;
        let balance = st
            .custody
            .reward_balance()
            .checked_add(amount)
            .ok_or(CustodyError::ArithmeticOverflow)?;
        let plan = self.accountant.recompute_rate(&st.schedule, amount, now, balance)?;

        st.custody.deposit_reward(amount)?;
        settlement.commit(&mut st.schedule, &mut st.ledger);
        st.schedule.apply_funding(&plan);

        info!(
            amount,
            rate = plan.reward_rate,
            rollover = %plan.rollover,
            finish_at = plan.finish_at,
            "round funded"
        );
        self.notify(PoolEvent::RewardFunded {
            amount,
            rate: plan.reward_rate,
            finish_at: plan.finish_at,
        });
        Ok(plan)
    }

    // ------------------------------------------------------------------
    // Settlement helpers
    // ------------------------------------------------------------------

    fn settle_participant(
        &self,
        st: &PoolState<C>,
        who: &ParticipantId,
        now: Timestamp,
    ) -> Result<Settlement, AccrualError> {
        let total = st.custody.total_staked();
        self.accountant
            .settle(&st.schedule, &st.ledger, who, total, now)
    }

    fn settle_global(&self, st: &PoolState<C>, now: Timestamp) -> Result<Settlement, AccrualError> {
        let total = st.custody.total_staked();
        let settlement = self
            .accountant
            .settle_global_only(&st.schedule, &st.ledger, total, now)?;
        debug!(
            accumulator = settlement.accumulator,
            updated_at = settlement.updated_at,
            "settled global accumulator"
        );
        Ok(settlement)
    }

    fn check_stake_custody(
        custody: &C,
        who: &ParticipantId,
        amount: u64,
    ) -> Result<(), CustodyError> {
        let have = custody.staked_balance(who);
        if have < amount {
            return Err(CustodyError::InsufficientBalance { have, need: amount });
        }
        Ok(())
    }

    /// Custody may move less than asked; the ledger only records full transfers.
    fn check_moved(moved: u64, requested: u64) -> Result<(), CustodyError> {
        if moved != requested {
            return Err(CustodyError::InsufficientBalance { have: moved, need: requested });
        }
        Ok(())
    }

    fn check_reward_custody(custody: &C, amount: u64) -> Result<(), CustodyError> {
        let have = custody.reward_balance();
        if have < amount {
            return Err(CustodyError::InsufficientBalance { have, need: amount });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current reward rate in units per second.
    pub fn reward_rate(&self) -> u64 {
        self.state.lock().schedule.reward_rate
    }

    /// Snapshot of the reward schedule.
    pub fn schedule(&self) -> RewardSchedule {
        self.state.lock().schedule
    }

    /// Round phase at `now`.
    pub fn phase(&self, now: Timestamp) -> RoundPhase {
        self.state.lock().schedule.phase(now)
    }

    /// `min(now, finish_at)`.
    pub fn last_time_reward_applicable(&self, now: Timestamp) -> Timestamp {
        self.state.lock().schedule.last_time_applicable(now)
    }

    /// Reward a full round emits at the current rate.
    pub fn reward_for_duration(&self) -> u128 {
        self.state.lock().schedule.reward_for_duration()
    }

    /// Accumulator value as it would be settled at `now`.
    pub fn reward_per_unit(&self, now: Timestamp) -> Result<u64, AccrualError> {
        let st = self.state.lock();
        self.accountant.accumulator_at(
            &st.schedule,
            st.ledger.reward_per_unit_stored(),
            st.custody.total_staked(),
            now,
        )
    }

    /// Reward `who` could claim at `now`. Zero for unknown participants.
    pub fn earned(&self, who: &ParticipantId, now: Timestamp) -> Result<u64, AccrualError> {
        let st = self.state.lock();
        let Some(participant) = st.ledger.get(who) else {
            return Ok(0);
        };
        let acc = self.accountant.accumulator_at(
            &st.schedule,
            st.ledger.reward_per_unit_stored(),
            st.custody.total_staked(),
            now,
        )?;
        self.accountant.earned(participant, acc)
    }

    /// Current stake of `who`.
    pub fn stake_of(&self, who: &ParticipantId) -> u64 {
        self.state.lock().ledger.stake_of(who)
    }

    /// Ledger record of `who`, if one exists.
    pub fn participant(&self, who: &ParticipantId) -> Option<Participant> {
        self.state.lock().ledger.get(who).copied()
    }

    /// Total stake held by custody.
    pub fn total_staked(&self) -> u64 {
        self.state.lock().custody.total_staked()
    }

    /// Funded-but-unclaimed reward tokens held by custody.
    pub fn reward_balance(&self) -> u64 {
        self.state.lock().custody.reward_balance()
    }

    /// Clone of the ledger, for inspection.
    pub fn ledger(&self) -> AccrualLedger {
        self.state.lock().ledger.clone()
    }

    /// Run `f` against the custody collaborator under the pool lock.
    pub fn inspect_custody<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.state.lock().custody)
    }

    /// Whether the ledger total matches the custody total.
    pub fn is_consistent(&self) -> bool {
        let st = self.state.lock();
        st.ledger.total_staked() == st.custody.total_staked()
    }

    /// Summary of the pool at `now`, participants ordered by identity.
    pub fn report(&self, now: Timestamp) -> Result<PoolReport, AccrualError> {
        let st = self.state.lock();
        let reward_per_unit = self.accountant.accumulator_at(
            &st.schedule,
            st.ledger.reward_per_unit_stored(),
            st.custody.total_staked(),
            now,
        )?;

        let mut participants = st
            .ledger
            .iter()
            .map(|(id, p)| {
                Ok(ParticipantReport {
                    participant: *id,
                    stake: p.stake_amount,
                    earned: self.accountant.earned(p, reward_per_unit)?,
                    paid: st.custody.paid_to(id),
                })
            })
            .collect::<Result<Vec<_>, AccrualError>>()?;
        participants.sort_by(|a, b| a.participant.cmp(&b.participant));

        Ok(PoolReport {
            now,
            phase: st.schedule.phase(now),
            reward_rate: st.schedule.reward_rate,
            duration: st.schedule.duration,
            finish_at: st.schedule.finish_at,
            updated_at: st.schedule.updated_at,
            reward_per_unit,
            total_staked: st.custody.total_staked(),
            reward_balance: st.custody.reward_balance(),
            participants,
        })
    }
}
