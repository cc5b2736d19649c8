//! Integration test suite for Accrue.
//!
//! Drives the staking pool through full operation sequences and checks the
//! ledger's conservation, monotonicity, and fairness invariants against an
//! independent custody record.

pub mod helpers;
