//! Tunable rules constants.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_WALK_SPEED: u32 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Critical threshold must be between 1 and 20, got {0}")]
    InvalidCriticalThreshold(u32),
}

/// Configuration for a [`crate::combat::RulesEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Walking speed used when derived stats don't specify one.
    pub default_walk_speed: u32,

    /// Lowest natural d20 face that scores a critical hit on attacks.
    pub critical_threshold: u32,

    /// Whether a natural 1 misses regardless of the total.
    pub natural_one_always_misses: bool,

    /// Floor of the concentration save DC.
    pub concentration_min_dc: i32,

    /// Death saves at or above this total succeed.
    pub death_save_dc: i32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            default_walk_speed: DEFAULT_WALK_SPEED,
            critical_threshold: 20,
            natural_one_always_misses: false,
            concentration_min_dc: 10,
            death_save_dc: 10,
        }
    }
}

impl RulesConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_walk_speed(mut self, speed: u32) -> Self {
        self.default_walk_speed = speed;
        self
    }

    /// Widen the crit range (19 for Improved Critical). Clamped to `1..=20`.
    pub fn with_critical_threshold(mut self, threshold: u32) -> Self {
        self.critical_threshold = threshold.clamp(1, 20);
        self
    }

    pub fn with_natural_one_always_misses(mut self, enabled: bool) -> Self {
        self.natural_one_always_misses = enabled;
        self
    }

    pub fn with_concentration_min_dc(mut self, dc: i32) -> Self {
        self.concentration_min_dc = dc;
        self
    }

    pub fn with_death_save_dc(mut self, dc: i32) -> Self {
        self.death_save_dc = dc;
        self
    }

    /// Load a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: RulesConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=20).contains(&self.critical_threshold) {
            return Err(ConfigError::InvalidCriticalThreshold(self.critical_threshold));
        }
        Ok(())
    }
}
