//! Notifications emitted by successful ledger operations.

use serde::{Deserialize, Serialize};

use crate::types::{ParticipantId, Timestamp};

/// One notification per successful operation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PoolEvent {
    Staked { participant: ParticipantId, amount: u64 },
    Withdrawn { participant: ParticipantId, amount: u64 },
    RewardPaid { participant: ParticipantId, amount: u64 },
    RewardFunded { amount: u64, rate: u64, finish_at: Timestamp },
    DurationUpdated { duration: u64 },
}

impl PoolEvent {
    /// Participant the event concerns, if any.
    pub fn participant(&self) -> Option<&ParticipantId> {
        match self {
            Self::Staked { participant, .. }
            | Self::Withdrawn { participant, .. }
            | Self::RewardPaid { participant, .. } => Some(participant),
            Self::RewardFunded { .. } | Self::DurationUpdated { .. } => None,
        }
    }

    /// The numeric amount carried by the event.
    pub fn amount(&self) -> u64 {
        match self {
            Self::Staked { amount, .. }
            | Self::Withdrawn { amount, .. }
            | Self::RewardPaid { amount, .. }
            | Self::RewardFunded { amount, .. } => *amount,
            Self::DurationUpdated { duration } => *duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let id = ParticipantId::from_label("alice");
        let e = PoolEvent::Staked { participant: id, amount: 5 };
        assert_eq!(e.participant(), Some(&id));
        assert_eq!(e.amount(), 5);

        let e = PoolEvent::DurationUpdated { duration: 60 };
        assert_eq!(e.participant(), None);
        assert_eq!(e.amount(), 60);
    }

    #[test]
    fn serializes_with_tag() {
        let e = PoolEvent::RewardFunded { amount: 1000, rate: 100, finish_at: 11 };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["event"], "reward_funded");
        assert_eq!(json["rate"], 100);
    }
}
