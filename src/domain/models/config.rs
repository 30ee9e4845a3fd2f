use serde::{Deserialize, Serialize};

/// Tuning knobs of a composition search run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SearchConfig {
    /// Which fitness function scores individuals.
    #[serde(default)]
    pub mode: EvaluationMode,

    /// Objective weights for QoS evaluation.
    #[serde(default)]
    pub weights: FitnessWeights,

    /// Target longest path length for structural ideality.
    #[serde(default = "default_ideal_longest_path")]
    pub ideal_longest_path: usize,

    /// Target atomic service count for structural ideality.
    #[serde(default = "default_ideal_num_atomic")]
    pub ideal_num_atomic: usize,

    /// Fraction of shared structure tolerated between individuals. Carried
    /// for outer-loop population management; the core never reads it.
    #[serde(default)]
    pub overlap_percentage: f64,
}

const fn default_ideal_longest_path() -> usize {
    3
}

const fn default_ideal_num_atomic() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mode: EvaluationMode::default(),
            weights: FitnessWeights::default(),
            ideal_longest_path: default_ideal_longest_path(),
            ideal_num_atomic: default_ideal_num_atomic(),
            overlap_percentage: 0.0,
        }
    }
}

/// Fitness function selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Weighted multi-objective QoS score.
    #[default]
    Qos,
    /// Structure-only score rewarding short paths and few services.
    Structural,
}

/// Weights of the four QoS objectives. Expected to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FitnessWeights {
    pub availability: f64,
    pub reliability: f64,
    pub time: f64,
    pub cost: f64,
}

impl Default for FitnessWeights {
    fn default() -> Self {
        Self {
            availability: 0.25,
            reliability: 0.25,
            time: 0.25,
            cost: 0.25,
        }
    }
}

impl FitnessWeights {
    pub fn sum(&self) -> f64 {
        self.availability + self.reliability + self.time + self.cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = FitnessWeights::default();
        assert!((weights.sum() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_mode_is_qos() {
        let config = SearchConfig::default();
        assert_eq!(config.mode, EvaluationMode::Qos);
    }

    #[test]
    fn test_mode_deserializes_snake_case() {
        let mode: EvaluationMode = serde_json::from_str("\"structural\"").unwrap();
        assert_eq!(mode, EvaluationMode::Structural);
    }
}
