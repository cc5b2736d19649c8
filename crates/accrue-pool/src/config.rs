//! Pool configuration.
//!
//! Provides [`PoolConfig`] with defaults for the administrator, round length,
//! and notification channel. Values can be overridden from a config file and
//! then from `ACCRUE_*` environment variables.

use std::path::Path;

use accrue_core::constants::{DEFAULT_ADMIN_LABEL, DEFAULT_DURATION_SECS, DEFAULT_EVENT_CAPACITY};
use accrue_core::types::ParticipantId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating a [`PoolConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config source: {0}")]
    Source(#[from] config::ConfigError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for a staking pool instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Label of the administrator; hashed into a [`ParticipantId`].
    pub admin: String,
    /// Initial reward round length in seconds.
    pub duration_secs: u64,
    /// Buffered notifications per subscriber before the oldest are dropped.
    pub event_capacity: usize,
    /// Log level filter string (e.g. "info", "debug", "accrue_pool=trace").
    pub log_level: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            admin: DEFAULT_ADMIN_LABEL.to_string(),
            duration_secs: DEFAULT_DURATION_SECS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            log_level: "info".to_string(),
        }
    }
}

impl PoolConfig {
    /// Load defaults, then `path` (if given), then `ACCRUE_*` environment variables.
    ///
    /// The file format is inferred from its extension (TOML, JSON, YAML, ...).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("admin", DEFAULT_ADMIN_LABEL)?
            .set_default("duration_secs", DEFAULT_DURATION_SECS)?
            .set_default("event_capacity", DEFAULT_EVENT_CAPACITY as u64)?
            .set_default("log_level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let cfg: Self = builder
            .add_source(config::Environment::with_prefix("ACCRUE"))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the pool cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_secs == 0 {
            return Err(ConfigError::Invalid("duration_secs must be > 0".into()));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be > 0".into()));
        }
        if self.admin.is_empty() {
            return Err(ConfigError::Invalid("admin must not be empty".into()));
        }
        Ok(())
    }

    /// Identity of the administrator.
    pub fn admin_id(&self) -> ParticipantId {
        ParticipantId::from_label(&self.admin)
    }
}
