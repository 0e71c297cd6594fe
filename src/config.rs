//! Tunables for paging and reconciliation, sourced from the environment.

use std::env;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::store::DEFAULT_PAGE_LIMIT;

pub const DEFAULT_RECONCILE_ATTEMPTS: u32 = 6;
pub const DEFAULT_RECONCILE_BACKOFF: Duration = Duration::from_millis(1000);

const PAGE_LIMIT_VAR: &str = "CARRIER_PAGE_LIMIT";
const ATTEMPTS_VAR: &str = "CARRIER_RECONCILE_ATTEMPTS";
const BACKOFF_VAR: &str = "CARRIER_RECONCILE_BACKOFF_MS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CarrierConfig {
    /// Records per store query or delete round.
    pub page_limit: usize,
    /// Polls before a reconciliation gives up.
    pub reconcile_attempts: u32,
    #[serde(deserialize_with = "millis::deserialize")]
    pub reconcile_backoff: Duration,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        CarrierConfig {
            page_limit: DEFAULT_PAGE_LIMIT,
            reconcile_attempts: DEFAULT_RECONCILE_ATTEMPTS,
            reconcile_backoff: DEFAULT_RECONCILE_BACKOFF,
        }
    }
}

impl CarrierConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn with_reconcile_attempts(mut self, attempts: u32) -> Self {
        self.reconcile_attempts = attempts.max(1);
        self
    }

    pub fn with_reconcile_backoff(mut self, backoff: Duration) -> Self {
        self.reconcile_backoff = backoff;
        self
    }

    /// Defaults overridden by any `CARRIER_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CarrierConfig::default();
        if let Some(value) = lookup(PAGE_LIMIT_VAR) {
            config.page_limit = positive(PAGE_LIMIT_VAR, &value)? as usize;
        }
        if let Some(value) = lookup(ATTEMPTS_VAR) {
            let attempts = positive(ATTEMPTS_VAR, &value)?;
            config.reconcile_attempts = u32::try_from(attempts).map_err(|_| ConfigError::Invalid {
                name: ATTEMPTS_VAR,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(BACKOFF_VAR) {
            config.reconcile_backoff = Duration::from_millis(positive(BACKOFF_VAR, &value)?);
        }
        Ok(config)
    }
}

fn positive(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        }),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
