//! Error types for the Accrue ledger.
use thiserror::Error;

use crate::types::{ParticipantId, Timestamp};

/// Broad classification of an [`AccrualError`].
///
/// None of these are retried automatically; the kind only tells the caller
/// what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Operation attempted too early relative to the reward schedule.
    TemporalPolicy,
    /// Requested effect exceeds the available quantity.
    Insufficiency,
    /// A supplied or computed value that must be strictly positive is not.
    DegenerateInput,
    /// Operation references a participant with no ledger entry.
    Identity,
    /// Caller lacks the administrator role.
    Authorization,
    /// Fixed-point result does not fit its storage width.
    Arithmetic,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccrualError {
    #[error("amount must be greater than zero")] ZeroAmount,
    #[error("insufficient stake: have {have}, need {need}")] InsufficientStake { have: u64, need: u64 },
    #[error("no stake record for participant {0}")] NoStakeRecord(ParticipantId),
    #[error("nothing to claim")] NothingToClaim,
    #[error("reward round still active: now {now} <= finish_at {finish_at}")] RoundStillActive { now: Timestamp, finish_at: Timestamp },
    #[error("reward rate would be zero")] ZeroRewardRate,
    #[error("underfunded treasury: required {required}, available {available}")] UnderfundedTreasury { required: u128, available: u64 },
    #[error("reward round duration is zero")] ZeroDuration,
    #[error("participant {0} is not the administrator")] Unauthorized(ParticipantId),
    #[error("arithmetic overflow")] ArithmeticOverflow,
}

impl AccrualError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RoundStillActive { .. } => ErrorKind::TemporalPolicy,
            Self::InsufficientStake { .. } | Self::UnderfundedTreasury { .. } | Self::NothingToClaim => {
                ErrorKind::Insufficiency
            }
            Self::ZeroAmount | Self::ZeroRewardRate | Self::ZeroDuration => ErrorKind::DegenerateInput,
            Self::NoStakeRecord(_) => ErrorKind::Identity,
            Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::ArithmeticOverflow => ErrorKind::Arithmetic,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("insufficient custody balance: have {have}, need {need}")] InsufficientBalance { have: u64, need: u64 },
    #[error("custody balance overflow")] ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error(transparent)] Accrual(#[from] AccrualError),
    #[error(transparent)] Custody(#[from] CustodyError),
}

impl PoolError {
    /// The accrual error behind this failure, if any.
    pub fn as_accrual(&self) -> Option<&AccrualError> {
        match self {
            Self::Accrual(e) => Some(e),
            Self::Custody(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        let id = ParticipantId::from_label("alice");
        assert_eq!(
            AccrualError::RoundStillActive { now: 1, finish_at: 2 }.kind(),
            ErrorKind::TemporalPolicy
        );
        assert_eq!(
            AccrualError::InsufficientStake { have: 1, need: 2 }.kind(),
            ErrorKind::Insufficiency
        );
        assert_eq!(AccrualError::NothingToClaim.kind(), ErrorKind::Insufficiency);
        assert_eq!(
            AccrualError::UnderfundedTreasury { required: 2, available: 1 }.kind(),
            ErrorKind::Insufficiency
        );
        assert_eq!(AccrualError::ZeroAmount.kind(), ErrorKind::DegenerateInput);
        assert_eq!(AccrualError::ZeroRewardRate.kind(), ErrorKind::DegenerateInput);
        assert_eq!(AccrualError::NoStakeRecord(id).kind(), ErrorKind::Identity);
        assert_eq!(AccrualError::Unauthorized(id).kind(), ErrorKind::Authorization);
        assert_eq!(AccrualError::ArithmeticOverflow.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn pool_error_wraps_transparently() {
        let err: PoolError = AccrualError::NothingToClaim.into();
        assert_eq!(err.to_string(), "nothing to claim");
        assert_eq!(err.as_accrual(), Some(&AccrualError::NothingToClaim));

        let err: PoolError = CustodyError::InsufficientBalance { have: 1, need: 5 }.into();
        assert_eq!(err.to_string(), "insufficient custody balance: have 1, need 5");
        assert!(err.as_accrual().is_none());
    }
}
