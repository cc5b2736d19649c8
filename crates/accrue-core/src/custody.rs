//! In-memory custody of stake and reward tokens.
//!
//! [`MemoryCustody`] implements [`Custody`] with plain maps and counters. It
//! is what the pool uses when no external custody is wired in, and what the
//! tests use to check the ledger against an independent set of balances.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::CustodyError;
use crate::traits::Custody;
use crate::types::ParticipantId;

/// Custody backed by in-memory balances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCustody {
    /// Stake-token balance held per participant.
    stakes: HashMap<ParticipantId, u64>,
    /// Sum of `stakes`.
    total_staked: u64,
    /// Reward tokens held.
    reward_vault: u64,
    /// Reward tokens paid out per participant.
    paid: HashMap<ParticipantId, u64>,
    /// Reward tokens ever deposited.
    total_funded: u128,
    /// Reward tokens ever paid out.
    total_paid: u128,
}

impl MemoryCustody {
    /// Create empty custody.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reward tokens ever deposited.
    pub fn total_funded(&self) -> u128 {
        self.total_funded
    }

    /// Reward tokens ever paid out.
    pub fn total_paid(&self) -> u128 {
        self.total_paid
    }
}

impl Custody for MemoryCustody {
    fn total_staked(&self) -> u64 {
        self.total_staked
    }

    fn staked_balance(&self, who: &ParticipantId) -> u64 {
        self.stakes.get(who).copied().unwrap_or(0)
    }

    fn deposit_stake(&mut self, who: &ParticipantId, amount: u64) -> Result<(), CustodyError> {
        let total = self
            .total_staked
            .checked_add(amount)
            .ok_or(CustodyError::ArithmeticOverflow)?;
        let balance = self.stakes.entry(*who).or_insert(0);
        // total >= balance, so this cannot overflow once the total did not.
        *balance += amount;
        self.total_staked = total;
        Ok(())
    }

    fn withdraw_stake(&mut self, who: &ParticipantId, amount: u64) -> Result<u64, CustodyError> {
        let Some(balance) = self.stakes.get_mut(who) else {
            return Ok(0);
        };
        let moved = amount.min(*balance);
        *balance -= moved;
        self.total_staked -= moved;
        Ok(moved)
    }

    fn reward_balance(&self) -> u64 {
        self.reward_vault
    }

    fn deposit_reward(&mut self, amount: u64) -> Result<(), CustodyError> {
        self.reward_vault = self
            .reward_vault
            .checked_add(amount)
            .ok_or(CustodyError::ArithmeticOverflow)?;
        self.total_funded += amount as u128;
        Ok(())
    }

    fn pay_reward(&mut self, who: &ParticipantId, amount: u64) -> Result<u64, CustodyError> {
        let paid = amount.min(self.reward_vault);
        self.reward_vault -= paid;
        let entry = self.paid.entry(*who).or_insert(0);
        *entry = entry.saturating_add(paid);
        self.total_paid += paid as u128;
        Ok(paid)
    }

    fn paid_to(&self, who: &ParticipantId) -> u64 {
        self.paid.get(who).copied().unwrap_or(0)
    }
}
