//! Reward round schedule.
//!
//! A round pays `reward_rate` units per second from the moment it is funded
//! until `finish_at`. The schedule also tracks `updated_at`, the instant up
//! to which the global accumulator has been settled.
//!
//! Round lifecycle:
//! - [`RoundPhase::Idle`]: never funded
//! - [`RoundPhase::Funded`]: `now < finish_at`, emitting
//! - [`RoundPhase::Expired`]: `now >= finish_at`, emission stopped
//!
//! Funding is legal in any phase and always moves to `Funded`. Duration
//! changes are legal only once `now > finish_at`.

use serde::{Deserialize, Serialize};

use crate::error::AccrualError;
use crate::types::Timestamp;

/// Phase of the current reward round at a given instant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    Idle,
    Funded,
    Expired,
}

/// Timing and rate of the current reward round.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewardSchedule {
    /// Seconds each funding round pays out over.
    pub duration: u64,
    /// When the current round's emission stops.
    pub finish_at: Timestamp,
    /// Instant through which the global accumulator has been settled.
    pub updated_at: Timestamp,
    /// Reward units emitted per second.
    pub reward_rate: u64,
}

impl RewardSchedule {
    /// A zeroed schedule with no duration set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A zeroed schedule with the given round length.
    pub fn with_duration(duration: u64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// `min(now, finish_at)`: the latest instant at which reward still accrues.
    pub fn last_time_applicable(&self, now: Timestamp) -> Timestamp {
        now.min(self.finish_at)
    }

    /// Seconds of emission not yet folded into the accumulator.
    ///
    /// A `now` earlier than `updated_at` yields zero.
    pub fn pending_seconds(&self, now: Timestamp) -> u64 {
        self.last_time_applicable(now).saturating_sub(self.updated_at)
    }

    /// Whether the round is still emitting at `now`.
    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.finish_at
    }

    /// Phase of the round at `now`.
    pub fn phase(&self, now: Timestamp) -> RoundPhase {
        if self.reward_rate == 0 && self.finish_at == 0 {
            RoundPhase::Idle
        } else if self.is_active(now) {
            RoundPhase::Funded
        } else {
            RoundPhase::Expired
        }
    }

    /// Total reward a full round emits at the current rate.
    pub fn reward_for_duration(&self) -> u128 {
        self.reward_rate as u128 * self.duration as u128
    }

    /// Replace the round length.
    ///
    /// # Errors
    ///
    /// - [`AccrualError::RoundStillActive`] if `now <= finish_at`
    /// - [`AccrualError::ZeroDuration`] if `new_duration` is zero
    pub fn set_duration(&mut self, new_duration: u64, now: Timestamp) -> Result<(), AccrualError> {
        self.check_duration_change(new_duration, now)?;
        self.duration = new_duration;
        Ok(())
    }

    /// Validate a duration change without applying it.
    pub fn check_duration_change(
        &self,
        new_duration: u64,
        now: Timestamp,
    ) -> Result<(), AccrualError> {
        if now <= self.finish_at {
            return Err(AccrualError::RoundStillActive {
                now,
                finish_at: self.finish_at,
            });
        }
        if new_duration == 0 {
            return Err(AccrualError::ZeroDuration);
        }
        Ok(())
    }

    /// Start a freshly funded round as planned by
    /// [`RewardAccountant::recompute_rate`](crate::accountant::RewardAccountant::recompute_rate).
    pub fn apply_funding(&mut self, plan: &FundingPlan) {
        self.reward_rate = plan.reward_rate;
        self.finish_at = plan.finish_at;
        self.updated_at = self.updated_at.max(plan.updated_at);
    }
}

/// Outcome of a funding computation, applied only once every check passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingPlan {
    pub reward_rate: u64,
    pub finish_at: Timestamp,
    pub updated_at: Timestamp,
    /// Undistributed reward carried over from the unfinished round.
    pub rollover: u128,
}
