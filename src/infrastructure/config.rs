//! Hierarchical configuration loading.
//!
//! Merges programmatic defaults, an optional YAML file and `WEAVER_*`
//! environment variables into a validated [`SearchConfig`].

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{EvaluationMode, SearchConfig};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid weights: sum is {0}, expected 1.0")]
    InvalidWeightSum(f64),

    #[error("Invalid weight {0}: must not be negative")]
    NegativeWeight(f64),

    #[error("Invalid overlap_percentage: {0}. Must be between 0.0 and 1.0")]
    InvalidOverlap(f64),

    #[error("Invalid ideal_longest_path: 0. Must be at least 1")]
    InvalidIdealPath,

    #[error("Invalid ideal_num_atomic: 0. Must be at least 1")]
    InvalidIdealAtomic,
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. weaver.yaml in the working directory
    /// 3. Environment variables (WEAVER_* prefix, highest priority)
    pub fn load() -> Result<SearchConfig> {
        let config: SearchConfig = Figment::new()
            .merge(Serialized::defaults(SearchConfig::default()))
            .merge(Yaml::file("weaver.yaml"))
            .merge(Env::prefixed("WEAVER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<SearchConfig> {
        let config: SearchConfig = Figment::new()
            .merge(Serialized::defaults(SearchConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &SearchConfig) -> Result<(), ConfigError> {
        let weights = &config.weights;
        for weight in [
            weights.availability,
            weights.reliability,
            weights.time,
            weights.cost,
        ] {
            if weight < 0.0 {
                return Err(ConfigError::NegativeWeight(weight));
            }
        }
        if (weights.sum() - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidWeightSum(weights.sum()));
        }

        if !(0.0..=1.0).contains(&config.overlap_percentage) {
            return Err(ConfigError::InvalidOverlap(config.overlap_percentage));
        }

        if config.mode == EvaluationMode::Structural {
            if config.ideal_longest_path == 0 {
                return Err(ConfigError::InvalidIdealPath);
            }
            if config.ideal_num_atomic == 0 {
                return Err(ConfigError::InvalidIdealAtomic);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::FitnessWeights;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        ConfigLoader::validate(&SearchConfig::default()).unwrap();
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(
            file,
            "mode: structural\nideal_longest_path: 4\nideal_num_atomic: 7"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.mode, EvaluationMode::Structural);
        assert_eq!(config.ideal_longest_path, 4);
        assert_eq!(config.ideal_num_atomic, 7);
        // Untouched keys keep their defaults.
        assert_eq!(config.weights, FitnessWeights::default());
    }

    #[test]
    fn test_validate_rejects_bad_weight_sum() {
        let mut config = SearchConfig::default();
        config.weights.time = 0.9;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWeightSum(_))
        ));
    }

    #[test]
    fn test_validate_rejects_negative_weight() {
        let mut config = SearchConfig::default();
        config.weights.time = -0.25;
        config.weights.cost = 0.75;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::NegativeWeight(_))
        ));
    }

    #[test]
    fn test_validate_rejects_out_of_range_overlap() {
        let mut config = SearchConfig::default();
        config.overlap_percentage = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidOverlap(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_structural_targets() {
        let mut config = SearchConfig::default();
        config.mode = EvaluationMode::Structural;
        config.ideal_longest_path = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidIdealPath)
        ));
    }
}
