//! Configuration management for the memory-gravity engine
//!
//! All configurable parameters in one place with environment variable
//! overrides. Follows the principle: sensible defaults, configurable in
//! production. Invalid values fall back to their documented defaults with a
//! logged warning instead of failing startup; a mis-set decay rate must not
//! take retrieval down with it.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{
    DEFAULT_ATRIUM_MAX_AGE_HOURS, DEFAULT_AUTHORITY_BOOST, DEFAULT_CORRIDOR_MAX_AGE_DAYS,
    DEFAULT_DECAY_RATE, DEFAULT_MASS_CAP, DEFAULT_RETENTION_DAYS, SEARCH_TIMEOUT_SECS,
    SUMMARIZE_TIMEOUT_SECS,
};
use crate::scoring::ScoringParams;

/// Age boundaries between temporal tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChamberThresholds {
    /// Maximum age (hours, inclusive) for the atrium tier
    #[serde(default = "default_atrium_hours")]
    pub atrium_max_age_hours: f64,

    /// Maximum age (days, inclusive) for the corridor tier
    #[serde(default = "default_corridor_days")]
    pub corridor_max_age_days: f64,
}

fn default_atrium_hours() -> f64 {
    DEFAULT_ATRIUM_MAX_AGE_HOURS
}

fn default_corridor_days() -> f64 {
    DEFAULT_CORRIDOR_MAX_AGE_DAYS
}

impl Default for ChamberThresholds {
    fn default() -> Self {
        Self {
            atrium_max_age_hours: default_atrium_hours(),
            corridor_max_age_days: default_corridor_days(),
        }
    }
}

/// Engine configuration, consumed (not owned) by every component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Master switch; when false every subcommand is a no-op
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Path of the SQLite gravity database
    #[serde(default = "default_gravity_db")]
    pub gravity_db: PathBuf,

    /// Root directory of the personal memory store (note files)
    #[serde(default = "default_memory_dir")]
    pub memory_dir: PathBuf,

    /// Per-day decay rate for the recency factor
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    /// Additive boost for chunks written within the authority window
    #[serde(default = "default_authority_boost")]
    pub authority_boost: f64,

    /// Upper bound on effective mass
    #[serde(default = "default_mass_cap")]
    pub mass_cap: f64,

    /// Tier age boundaries
    #[serde(default)]
    pub chamber_thresholds: ChamberThresholds,

    /// Retention window (days) for pruned access-log and superseded rows
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,

    /// Base URL of the vector-search collaborator
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,

    /// Base URL of the summarization collaborator (Ollama-compatible)
    #[serde(default = "default_summarizer_endpoint")]
    pub summarizer_endpoint: String,

    /// Model name passed to the summarization collaborator
    #[serde(default = "default_summarizer_model")]
    pub summarizer_model: String,

    /// Vector-search request timeout (seconds)
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,

    /// Summarization request timeout (seconds)
    #[serde(default = "default_summarize_timeout")]
    pub summarize_timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_gravity_db() -> PathBuf {
    PathBuf::from("./gravity.db")
}

fn default_memory_dir() -> PathBuf {
    PathBuf::from("./memory")
}

fn default_decay_rate() -> f64 {
    DEFAULT_DECAY_RATE
}

fn default_authority_boost() -> f64 {
    DEFAULT_AUTHORITY_BOOST
}

fn default_mass_cap() -> f64 {
    DEFAULT_MASS_CAP
}

fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

fn default_search_endpoint() -> String {
    "http://localhost:8900".to_string()
}

fn default_summarizer_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_summarizer_model() -> String {
    "llama3.2".to_string()
}

fn default_search_timeout() -> u64 {
    SEARCH_TIMEOUT_SECS
}

fn default_summarize_timeout() -> u64 {
    SUMMARIZE_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            gravity_db: default_gravity_db(),
            memory_dir: default_memory_dir(),
            decay_rate: default_decay_rate(),
            authority_boost: default_authority_boost(),
            mass_cap: default_mass_cap(),
            chamber_thresholds: ChamberThresholds::default(),
            retention_days: default_retention_days(),
            search_endpoint: default_search_endpoint(),
            summarizer_endpoint: default_summarizer_endpoint(),
            summarizer_model: default_summarizer_model(),
            search_timeout_secs: default_search_timeout(),
            summarize_timeout_secs: default_summarize_timeout(),
        }
    }
}

impl Config {
    /// Load from environment variables, then validate.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("GRAVITY_ENABLED") {
            config.enabled = val.to_lowercase() != "false" && val != "0";
        }
        if let Ok(path) = env::var("GRAVITY_DB") {
            config.gravity_db = PathBuf::from(path);
        }
        if let Ok(path) = env::var("GRAVITY_MEMORY_DIR") {
            config.memory_dir = PathBuf::from(path);
        }
        if let Ok(val) = env::var("GRAVITY_DECAY_RATE") {
            if let Ok(n) = val.parse() {
                config.decay_rate = n;
            }
        }
        if let Ok(val) = env::var("GRAVITY_AUTHORITY_BOOST") {
            if let Ok(n) = val.parse() {
                config.authority_boost = n;
            }
        }
        if let Ok(val) = env::var("GRAVITY_MASS_CAP") {
            if let Ok(n) = val.parse() {
                config.mass_cap = n;
            }
        }
        if let Ok(val) = env::var("GRAVITY_ATRIUM_MAX_AGE_HOURS") {
            if let Ok(n) = val.parse() {
                config.chamber_thresholds.atrium_max_age_hours = n;
            }
        }
        if let Ok(val) = env::var("GRAVITY_CORRIDOR_MAX_AGE_DAYS") {
            if let Ok(n) = val.parse() {
                config.chamber_thresholds.corridor_max_age_days = n;
            }
        }
        if let Ok(val) = env::var("GRAVITY_RETENTION_DAYS") {
            if let Ok(n) = val.parse() {
                config.retention_days = n;
            }
        }
        if let Ok(url) = env::var("GRAVITY_SEARCH_ENDPOINT") {
            config.search_endpoint = url;
        }
        if let Ok(url) = env::var("GRAVITY_SUMMARIZER_ENDPOINT") {
            config.summarizer_endpoint = url;
        }
        if let Ok(model) = env::var("GRAVITY_SUMMARIZER_MODEL") {
            config.summarizer_model = model;
        }
        if let Ok(val) = env::var("GRAVITY_SEARCH_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.search_timeout_secs = n;
            }
        }
        if let Ok(val) = env::var("GRAVITY_SUMMARIZE_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                config.summarize_timeout_secs = n;
            }
        }

        config.validate()
    }

    /// Replace unusable values with their defaults.
    ///
    /// A non-positive decay rate would make the recency denominator collapse
    /// toward a divide-by-zero under tuning; non-positive caps and thresholds
    /// make every record fail every comparison. None of these should be able
    /// to brick the engine.
    pub fn validate(mut self) -> Self {
        if self.decay_rate <= 0.0 || !self.decay_rate.is_finite() {
            warn!(
                value = self.decay_rate,
                "invalid decay_rate, falling back to default"
            );
            self.decay_rate = default_decay_rate();
        }
        if self.authority_boost < 0.0 || !self.authority_boost.is_finite() {
            warn!(
                value = self.authority_boost,
                "invalid authority_boost, falling back to default"
            );
            self.authority_boost = default_authority_boost();
        }
        if self.mass_cap <= 0.0 || !self.mass_cap.is_finite() {
            warn!(
                value = self.mass_cap,
                "invalid mass_cap, falling back to default"
            );
            self.mass_cap = default_mass_cap();
        }
        if self.chamber_thresholds.atrium_max_age_hours <= 0.0 {
            warn!("invalid atrium threshold, falling back to default");
            self.chamber_thresholds.atrium_max_age_hours = default_atrium_hours();
        }
        if self.chamber_thresholds.corridor_max_age_days * 24.0
            <= self.chamber_thresholds.atrium_max_age_hours
        {
            warn!("corridor threshold below atrium threshold, falling back to defaults");
            self.chamber_thresholds = ChamberThresholds::default();
        }
        if self.retention_days <= 0 {
            warn!("invalid retention_days, falling back to default");
            self.retention_days = default_retention_days();
        }
        self
    }

    /// Scoring knobs derived from this configuration.
    pub fn scoring_params(&self) -> ScoringParams {
        ScoringParams {
            decay_rate: self.decay_rate,
            authority_boost: self.authority_boost,
            mass_cap: self.mass_cap,
            ..ScoringParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_values_fall_back_to_defaults() {
        let config = Config {
            decay_rate: 0.0,
            mass_cap: -1.0,
            retention_days: 0,
            ..Config::default()
        }
        .validate();

        assert_eq!(config.decay_rate, DEFAULT_DECAY_RATE);
        assert_eq!(config.mass_cap, DEFAULT_MASS_CAP);
        assert_eq!(config.retention_days, DEFAULT_RETENTION_DAYS);
    }

    #[test]
    fn test_inverted_thresholds_fall_back() {
        let config = Config {
            chamber_thresholds: ChamberThresholds {
                atrium_max_age_hours: 500.0,
                corridor_max_age_days: 7.0,
            },
            ..Config::default()
        }
        .validate();

        assert_eq!(
            config.chamber_thresholds.atrium_max_age_hours,
            DEFAULT_ATRIUM_MAX_AGE_HOURS
        );
    }
}
