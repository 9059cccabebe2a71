//! Rundown core configuration.
//!
//! # Invariants
//! - `max_events` is at least 1.
//! - Unknown JSON keys are rejected.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default capacity of one rundown.
pub const DEFAULT_MAX_EVENTS: usize = 200;

/// Environment variable overriding `max_events`.
pub const MAX_EVENTS_ENV: &str = "RUNDOWN_MAX_EVENTS";

#[derive(Debug)]
pub enum ConfigError {
    Json(serde_json::Error),
    InvalidMaxEvents(String),
    ZeroCapacity,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "invalid rundown config: {err}"),
            Self::InvalidMaxEvents(value) => {
                write!(f, "{MAX_EVENTS_ENV} must be a positive integer, got `{value}`")
            }
            Self::ZeroCapacity => write!(f, "max_events must be at least 1"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

/// Settings consumed by the rundown core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct RundownConfig {
    /// Maximum number of entries a rundown may hold.
    pub max_events: usize,
}

impl Default for RundownConfig {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl RundownConfig {
    /// Parses and validates a JSON config object. Missing keys take defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, overridden by `RUNDOWN_MAX_EVENTS` when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_max_events_override(std::env::var(MAX_EVENTS_ENV).ok())
    }

    fn with_max_events_override(mut self, value: Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = value {
            self.max_events = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidMaxEvents(value.clone()))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_events == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
