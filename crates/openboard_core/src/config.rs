//! Store configuration.
//!
//! # Responsibility
//! - Carry tunables for connection bootstrap and pagination.
//! - Validate caller-provided settings before they reach SQL.
//!
//! # Invariants
//! - `0 < default_limit <= max_limit`.
//! - Loading from files or env is the caller's job; this module only
//!   deserializes and validates.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PAGE_LIMIT: u32 = 10;
const MAX_PAGE_LIMIT: u32 = 50;

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroLimit(&'static str),
    DefaultAboveMax { default_limit: u32, max_limit: u32 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroLimit(field) => write!(f, "`{field}` must be greater than zero"),
            Self::DefaultAboveMax {
                default_limit,
                max_limit,
            } => write!(
                f,
                "default_limit {default_limit} exceeds max_limit {max_limit}"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Page size bounds applied by every finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageLimits {
    /// Used when the caller passes no limit or zero.
    pub default_limit: u32,
    /// Upper clamp for caller-supplied limits.
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

impl PageLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 {
            return Err(ConfigError::ZeroLimit("default_limit"));
        }
        if self.max_limit == 0 {
            return Err(ConfigError::ZeroLimit("max_limit"));
        }
        if self.default_limit > self.max_limit {
            return Err(ConfigError::DefaultAboveMax {
                default_limit: self.default_limit,
                max_limit: self.max_limit,
            });
        }
        Ok(())
    }

    /// Normalizes a caller limit: `None`/`0` -> default, above max -> max.
    pub fn apply(&self, limit: Option<u32>) -> u32 {
        match limit {
            Some(0) | None => self.default_limit,
            Some(value) if value > self.max_limit => self.max_limit,
            Some(value) => value,
        }
    }
}

/// Connection and query settings for the board store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long a statement waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    pub page_limits: PageLimits,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            page_limits: PageLimits::default(),
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.page_limits.validate()
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
