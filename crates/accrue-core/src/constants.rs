//! Accrual constants. All token quantities are in the smallest unit of their token.

/// Fixed-point scale of the reward-per-unit accumulator.
///
/// `reward_per_unit_stored` holds `reward * SCALE / stake`, so one whole
/// unit of accumulator growth is `SCALE`.
pub const SCALE: u64 = 1_000_000_000;

/// [`SCALE`] widened for u128 intermediates.
pub const SCALE_U128: u128 = SCALE as u128;

/// Default reward round length in seconds (7 days).
pub const DEFAULT_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Default capacity of the notification channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Label of the default administrator identity.
pub const DEFAULT_ADMIN_LABEL: &str = "admin";
