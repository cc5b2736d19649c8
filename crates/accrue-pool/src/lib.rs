//! # accrue-pool
//! Single-writer staking pool: settle-then-act entry points over the
//! accrual ledger, an administrator gate, custody, and notifications.

pub mod config;
pub mod pool;

pub use config::{ConfigError, PoolConfig};
pub use pool::{ExitReceipt, ParticipantReport, PoolReport, StakingPool};
