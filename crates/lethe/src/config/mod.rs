use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LetheError, Result};

/// Environment variable overriding `storage.data_dir`
pub const ENV_DATA_DIR: &str = "LETHE_DATA_DIR";
/// Environment variable overriding `forgetting.forgetting_threshold`
pub const ENV_FORGETTING_THRESHOLD: &str = "LETHE_FORGETTING_THRESHOLD";
/// Environment variable overriding `forgetting.half_life_days`
pub const ENV_HALF_LIFE_DAYS: &str = "LETHE_HALF_LIFE_DAYS";
/// Environment variable overriding `forgetting.compression_ready_ratio`
pub const ENV_COMPRESSION_READY_RATIO: &str = "LETHE_COMPRESSION_READY_RATIO";

/// Main configuration structure for Lethe
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where lifecycle tables live
    #[serde(default)]
    pub storage: StorageConfig,
    /// Stage transition thresholds
    #[serde(default)]
    pub forgetting: ForgettingConfig,
    /// Composite score weights
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for the LanceDB lifecycle tables
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".lethe"))
        .unwrap_or_else(|| PathBuf::from(".lethe"))
}

/// Thresholds driving the forgetting state machine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForgettingConfig {
    /// Composite score below which compressed/archived memories move on (default: 0.2)
    #[serde(default = "default_forgetting_threshold")]
    pub forgetting_threshold: f32,
    /// Recency decay constant in days (default: 30)
    #[serde(default = "default_half_life_days")]
    pub half_life_days: f32,
    /// Intact memories with a compression ratio above this are compressed (default: 0.7)
    #[serde(default = "default_compression_ready_ratio")]
    pub compression_ready_ratio: f32,
}

impl Default for ForgettingConfig {
    fn default() -> Self {
        Self {
            forgetting_threshold: default_forgetting_threshold(),
            half_life_days: default_half_life_days(),
            compression_ready_ratio: default_compression_ready_ratio(),
        }
    }
}

impl ForgettingConfig {
    pub fn new(forgetting_threshold: f32, half_life_days: f32, compression_ready_ratio: f32) -> Self {
        Self {
            forgetting_threshold,
            half_life_days,
            compression_ready_ratio,
        }
    }

    /// Replace the forgetting threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.forgetting_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_unit("forgetting.forgetting_threshold", self.forgetting_threshold)?;
        check_unit(
            "forgetting.compression_ready_ratio",
            self.compression_ready_ratio,
        )?;
        if !self.half_life_days.is_finite() || self.half_life_days <= 0.0 {
            return Err(LetheError::Config(format!(
                "forgetting.half_life_days must be a positive number, got {}",
                self.half_life_days
            )));
        }
        Ok(())
    }
}

fn default_forgetting_threshold() -> f32 {
    0.2
}

fn default_half_life_days() -> f32 {
    30.0
}

fn default_compression_ready_ratio() -> f32 {
    0.7
}

/// Weights of the composite importance score.
///
/// `final = base*base_weight + recency*recency_weight + emotional*emotional_weight
/// + frequency*frequency_weight`, with `frequency = min(access_count * frequency_step,
/// frequency_cap)`. The four weights must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_base_weight")]
    pub base_weight: f32,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f32,
    #[serde(default = "default_emotional_weight")]
    pub emotional_weight: f32,
    #[serde(default = "default_frequency_weight")]
    pub frequency_weight: f32,
    /// Frequency contribution per access (default: 0.1)
    #[serde(default = "default_frequency_step")]
    pub frequency_step: f32,
    /// Upper bound of the frequency term (default: 0.5)
    #[serde(default = "default_frequency_cap")]
    pub frequency_cap: f32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_weight: default_base_weight(),
            recency_weight: default_recency_weight(),
            emotional_weight: default_emotional_weight(),
            frequency_weight: default_frequency_weight(),
            frequency_step: default_frequency_step(),
            frequency_cap: default_frequency_cap(),
        }
    }
}

impl ScoringConfig {
    pub fn weight_sum(&self) -> f32 {
        self.base_weight + self.recency_weight + self.emotional_weight + self.frequency_weight
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("scoring.base_weight", self.base_weight),
            ("scoring.recency_weight", self.recency_weight),
            ("scoring.emotional_weight", self.emotional_weight),
            ("scoring.frequency_weight", self.frequency_weight),
            ("scoring.frequency_step", self.frequency_step),
            ("scoring.frequency_cap", self.frequency_cap),
        ] {
            check_unit(name, value)?;
        }

        let sum = self.weight_sum();
        if (sum - 1.0).abs() > 1e-4 {
            return Err(LetheError::Config(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

fn default_base_weight() -> f32 {
    0.4
}

fn default_recency_weight() -> f32 {
    0.3
}

fn default_emotional_weight() -> f32 {
    0.2
}

fn default_frequency_weight() -> f32 {
    0.1
}

fn default_frequency_step() -> f32 {
    0.1
}

fn default_frequency_cap() -> f32 {
    0.5
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(LetheError::Config(format!(
            "{name} must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from `path`, or from the first default location that
    /// exists, then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_paths().into_iter().find(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    tracing::info!("No config file found, using defaults");
                    Config::default()
                }
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            LetheError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| LetheError::Config(format!("Failed to parse config: {e}")))
    }

    /// Candidate config file locations, in lookup order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::home_dir().map(|h| h.join(".lethe").join("config.toml")),
            dirs::config_dir().map(|c| c.join("lethe").join("config.toml")),
            Some(PathBuf::from("config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Apply `LETHE_*` overrides read through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup(ENV_FORGETTING_THRESHOLD) {
            self.forgetting.forgetting_threshold = parse_override(ENV_FORGETTING_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_HALF_LIFE_DAYS) {
            self.forgetting.half_life_days = parse_override(ENV_HALF_LIFE_DAYS, &value)?;
        }
        if let Some(value) = lookup(ENV_COMPRESSION_READY_RATIO) {
            self.forgetting.compression_ready_ratio =
                parse_override(ENV_COMPRESSION_READY_RATIO, &value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.forgetting.validate()?;
        self.scoring.validate()
    }

    /// Render the configuration as a TOML document
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LetheError::Serialization(e.to_string()))
    }
}

fn parse_override(key: &str, value: &str) -> Result<f32> {
    value
        .trim()
        .parse::<f32>()
        .map_err(|e| LetheError::Config(format!("Invalid value for {key}: {value:?} ({e})")))
}
