//! # accrue-core: Time-weighted reward accrual.
//!
//! All calculations use integer arithmetic only for determinism.
//!
//! Participants stake one token and earn a stream of another in proportion
//! to stake size and duration:
//! - **Reward schedule**: a funded round emits a fixed per-second rate until
//!   `finish_at`; funding an unfinished round rolls its remainder forward.
//! - **Accumulator**: reward per unit of stake since inception, scaled by
//!   [`SCALE`](constants::SCALE), advanced against the total staked supply.
//! - **Settlement**: before any stake change or claim, the participant's
//!   share of the accumulator delta is folded into their settled reward.

pub mod accountant;
pub mod constants;
pub mod custody;
pub mod error;
pub mod events;
pub mod ledger;
pub mod schedule;
pub mod traits;
pub mod types;

pub use accountant::{RewardAccountant, Settlement};
pub use custody::MemoryCustody;
pub use ledger::AccrualLedger;
pub use schedule::{FundingPlan, RewardSchedule, RoundPhase};
