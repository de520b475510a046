//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::CueError;

/// Configuration for engine timing and cache sizing.
/// Every field has a default so partial JSON documents are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Display refresh interval in seconds, used for animation ticks when the
    /// toolkit does not report its own.
    pub frame_interval: f64,

    /// Soft capacity of each element's issued-reference cache. Reaching it
    /// triggers a sweep of references nobody outside the cache holds.
    pub ref_cache_capacity: usize,

    /// Upper bound on tasks dispatched by a single `advance_to`.
    pub max_dispatch_per_advance: usize,

    /// Label of the top-level root container in records and logs.
    pub root_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frame_interval: 1.0 / 60.0,
            ref_cache_capacity: 64,
            max_dispatch_per_advance: 100_000,
            root_name: "root".to_string(),
        }
    }
}

impl Config {
    /// Parse a JSON configuration document; missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self, CueError> {
        let cfg: Config = serde_json::from_str(text).map_err(|e| CueError::InvalidConfig {
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), CueError> {
        if !(self.frame_interval.is_finite() && self.frame_interval > 0.0) {
            return Err(CueError::InvalidConfig {
                reason: format!("frame_interval must be positive, got {}", self.frame_interval),
            });
        }
        if self.max_dispatch_per_advance == 0 {
            return Err(CueError::InvalidConfig {
                reason: "max_dispatch_per_advance must be at least 1".into(),
            });
        }
        Ok(())
    }
}
