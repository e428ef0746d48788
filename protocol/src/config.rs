//! # Protocol Configuration & Constants
//!
//! Every magic number in the chain-selection core lives here: difficulty
//! retargeting parameters, the antigravity curve shape, and the knobs that
//! switch artificial finality on and off. If you're hardcoding one of these
//! somewhere else, you're doing it wrong.
//!
//! Runtime configuration is plain `serde` data. `ChainConfig` can be built
//! from `Default`, from a JSON string, or from a JSON file, and is always
//! validated before a chain accepts it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::finality::antigravity::{AntigravityCurve, CurveKind};

// ---------------------------------------------------------------------------
// Difficulty Parameters
// ---------------------------------------------------------------------------

/// Divisor applied to the parent difficulty to get the per-block adjustment
/// step. A block can move difficulty by `parent / 2048` per unit of
/// adjustment.
pub const DIFFICULTY_BOUND_DIVISOR: u128 = 2048;

/// Seconds of block spacing that count as one unit of downward adjustment.
pub const DURATION_LIMIT: u64 = 10;

/// Difficulty never drops below this floor.
pub const MINIMUM_DIFFICULTY: u128 = 131_072;

/// Largest downward adjustment multiplier for a single block.
pub const MAX_DIFFICULTY_DECREASE: i128 = 99;

/// Difficulty of the default genesis header (2^34).
pub const GENESIS_DIFFICULTY: u128 = 17_179_869_184;

/// Target spacing between generated blocks, in seconds.
pub const TARGET_BLOCK_INTERVAL_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Antigravity Parameters
// ---------------------------------------------------------------------------

/// Maximum TD ratio a long-lived fork must reach. Reorgs that have been
/// diverging for hours need roughly 31x the honest chain's work.
pub const ANTIGRAVITY_CEILING: f64 = 31.0;

/// Period divisor of the sinusoidal curve, in seconds. The curve reaches
/// its ceiling after `π · period` seconds (about 78 minutes).
pub const SINUSOID_PERIOD_SECS: f64 = 1500.0;

/// Time scale of the exponential curve, in seconds.
pub const EXPONENTIAL_SCALE_SECS: f64 = 3000.0;

/// Capacity of the per-chain event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// DifficultyConfig
// ---------------------------------------------------------------------------

/// Parameters of the Homestead-style difficulty adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    pub bound_divisor: u128,
    pub duration_limit: u64,
    pub minimum: u128,
    pub max_decrease: i128,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            bound_divisor: DIFFICULTY_BOUND_DIVISOR,
            duration_limit: DURATION_LIMIT,
            minimum: MINIMUM_DIFFICULTY,
            max_decrease: MAX_DIFFICULTY_DECREASE,
        }
    }
}

impl DifficultyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bound_divisor == 0 {
            return Err(invalid("difficulty.bound_divisor", "must be positive"));
        }
        if self.duration_limit == 0 {
            return Err(invalid("difficulty.duration_limit", "must be positive"));
        }
        if self.minimum == 0 {
            return Err(invalid("difficulty.minimum", "must be positive"));
        }
        if self.max_decrease < 0 {
            return Err(invalid("difficulty.max_decrease", "must not be negative"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FinalityConfig
// ---------------------------------------------------------------------------

/// Artificial finality settings.
///
/// A chain keeps one of these behind a lock and takes a copy at the start
/// of every evaluation, so flipping `enabled` never changes the outcome of
/// an evaluation that is already running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalityConfig {
    /// Whether the antigravity gate applies to candidate segments.
    pub enabled: bool,
    /// Which curve computes the required ratio.
    pub curve: CurveKind,
    /// Ratio the curve saturates at.
    pub ceiling: f64,
    /// Period divisor for [`CurveKind::Sinusoidal`].
    pub sinusoid_period: f64,
    /// Time scale for [`CurveKind::Exponential`].
    pub exponential_scale: f64,
}

impl Default for FinalityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            curve: CurveKind::Sinusoidal,
            ceiling: ANTIGRAVITY_CEILING,
            sinusoid_period: SINUSOID_PERIOD_SECS,
            exponential_scale: EXPONENTIAL_SCALE_SECS,
        }
    }
}

impl FinalityConfig {
    /// Default settings with the gate switched on.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Same settings with a different curve.
    pub fn with_curve(mut self, curve: CurveKind) -> Self {
        self.curve = curve;
        self
    }

    /// Build the curve these settings describe.
    pub fn antigravity(&self) -> AntigravityCurve {
        AntigravityCurve::from_params(
            self.curve,
            self.ceiling,
            self.sinusoid_period,
            self.exponential_scale,
        )
    }

    /// The curve to gate with, or `None` when the gate is off.
    pub fn gate(&self) -> Option<AntigravityCurve> {
        self.enabled.then(|| self.antigravity())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ceiling.is_finite() || self.ceiling < 1.0 {
            return Err(invalid("finality.ceiling", "must be a finite value >= 1"));
        }
        if !self.sinusoid_period.is_finite() || self.sinusoid_period <= 0.0 {
            return Err(invalid("finality.sinusoid_period", "must be positive"));
        }
        if !self.exponential_scale.is_finite() || self.exponential_scale <= 0.0 {
            return Err(invalid("finality.exponential_scale", "must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ChainConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for a [`crate::chain::Blockchain`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub finality: FinalityConfig,
    pub difficulty: DifficultyConfig,
    /// Buffered events per subscriber before slow receivers start lagging.
    pub event_capacity: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            finality: FinalityConfig::default(),
            difficulty: DifficultyConfig::default(),
            event_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl ChainConfig {
    /// Parse and validate a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ChainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.finality.validate()?;
        self.difficulty.validate()?;
        if self.event_capacity == 0 {
            return Err(invalid("event_capacity", "must be positive"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ChainConfig::default();
        config.validate().expect("defaults should validate");
        assert!(!config.finality.enabled);
        assert_eq!(config.finality.curve, CurveKind::Sinusoidal);
        assert!(config.finality.gate().is_none());
    }

    #[test]
    fn enabled_finality_exposes_gate() {
        let finality = FinalityConfig::enabled().with_curve(CurveKind::Exponential);
        let gate = finality.gate().expect("gate should be present");
        assert_eq!(gate.kind(), CurveKind::Exponential);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = ChainConfig::from_json_str(
            r#"{ "finality": { "enabled": true, "curve": "exponential" } }"#,
        )
        .expect("should parse");
        assert!(config.finality.enabled);
        assert_eq!(config.finality.curve, CurveKind::Exponential);
        assert_eq!(config.finality.ceiling, ANTIGRAVITY_CEILING);
        assert_eq!(config.difficulty, DifficultyConfig::default());
    }

    #[test]
    fn rejects_ceiling_below_one() {
        let err = ChainConfig::from_json_str(r#"{ "finality": { "ceiling": 0.5 } }"#)
            .expect_err("ceiling below 1 must fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "finality.ceiling",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_divisor() {
        let mut config = ChainConfig::default();
        config.difficulty.bound_divisor = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ChainConfig::from_json_str("{ not json").expect_err("should fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, r#"{{ "event_capacity": 8, "finality": {{ "enabled": true }} }}"#)
            .expect("write config");

        let config = ChainConfig::from_json_file(file.path()).expect("should load");
        assert_eq!(config.event_capacity, 8);
        assert!(config.finality.enabled);
    }
}
