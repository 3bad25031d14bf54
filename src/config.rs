//! Learner configuration.
//!
//! Every field has a default, so a JSON file only needs the fields it
//! overrides. `state_dim` and `action_dim` have no sensible default and must
//! be set before [`LearnerConfig::validate`] passes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TandemError};
use crate::loss::LossKind;
use crate::optimizer::{GradientClipper, OptimizerKind};

/// Settings of one background optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    pub kind: OptimizerKind,
    pub loss: LossKind,
    pub learning_rate: f32,
    pub batch_size: usize,
    pub max_iterations: usize,
    /// Stop after this many passes without a better held-out score. 0 disables early stopping.
    pub patience: usize,
    /// Fraction of the dataset held out to score candidate models.
    pub holdout_fraction: f32,
    /// Continue from the estimator's current parameters instead of a fresh random start.
    pub warm_start: bool,
    pub clipper: GradientClipper,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        OptimizerSettings {
            kind: OptimizerKind::default(),
            loss: LossKind::default(),
            learning_rate: 1e-3,
            batch_size: 64,
            max_iterations: 150,
            patience: 25,
            holdout_fraction: 0.1,
            warm_start: false,
            clipper: GradientClipper::ClipByGlobalNorm { max_norm: 10.0 },
        }
    }
}

impl OptimizerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(TandemError::invalid_parameter("learning_rate", "must be positive"));
        }
        if self.batch_size == 0 {
            return Err(TandemError::invalid_parameter("batch_size", "must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(TandemError::invalid_parameter("max_iterations", "must be at least 1"));
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(TandemError::invalid_parameter("holdout_fraction", "must be in [0, 1)"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub state_dim: usize,
    pub action_dim: usize,
    pub gamma: f32,
    /// Probability of trusting the policy once both estimators have a model.
    pub epsilon: f32,
    pub buffer_capacity: usize,
    /// Transitions required before any training starts.
    pub sample_size: usize,
    /// Rows per dataset build; `None` uses the current buffer size.
    pub dataset_size: Option<usize>,
    pub hidden_width_factor: usize,
    pub candidate_resolution: usize,
    pub max_candidate_actions: usize,
    pub learning_mode: bool,
    pub value_optimizer: OptimizerSettings,
    pub policy_optimizer: OptimizerSettings,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            state_dim: 0,
            action_dim: 0,
            gamma: 0.8,
            epsilon: 0.66,
            buffer_capacity: 100_000,
            sample_size: 500,
            dataset_size: None,
            hidden_width_factor: 20,
            candidate_resolution: 3,
            max_candidate_actions: 64,
            learning_mode: true,
            value_optimizer: OptimizerSettings::default(),
            policy_optimizer: OptimizerSettings::default(),
        }
    }
}

impl LearnerConfig {
    pub fn new(state_dim: usize, action_dim: usize) -> Self {
        LearnerConfig { state_dim, action_dim, ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.state_dim == 0 {
            return Err(TandemError::invalid_parameter("state_dim", "must be at least 1"));
        }
        if self.action_dim == 0 {
            return Err(TandemError::invalid_parameter("action_dim", "must be at least 1"));
        }
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(TandemError::invalid_parameter("gamma", "must be in (0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(TandemError::invalid_parameter("epsilon", "must be in [0, 1]"));
        }
        if self.buffer_capacity == 0 {
            return Err(TandemError::invalid_parameter("buffer_capacity", "must be at least 1"));
        }
        if self.sample_size == 0 || self.sample_size > self.buffer_capacity {
            return Err(TandemError::invalid_parameter(
                "sample_size",
                "must be between 1 and buffer_capacity",
            ));
        }
        if self.dataset_size == Some(0) {
            return Err(TandemError::invalid_parameter("dataset_size", "must be at least 1"));
        }
        if self.hidden_width_factor == 0 {
            return Err(TandemError::invalid_parameter("hidden_width_factor", "must be at least 1"));
        }
        if self.candidate_resolution == 0 || self.max_candidate_actions == 0 {
            return Err(TandemError::invalid_parameter(
                "candidate_resolution",
                "candidate settings must be positive",
            ));
        }
        self.value_optimizer.validate()?;
        self.policy_optimizer.validate()
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: LearnerConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    /// Rows for the next dataset build given the current buffer size.
    pub fn dataset_rows(&self, buffer_len: usize) -> usize {
        self.dataset_size.unwrap_or(buffer_len).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LearnerConfig::default();
        assert_eq!(config.gamma, 0.8);
        assert_eq!(config.epsilon, 0.66);
        assert_eq!(config.buffer_capacity, 100_000);
        assert_eq!(config.sample_size, 500);
        assert_eq!(config.value_optimizer.max_iterations, 150);
        assert!(!config.value_optimizer.warm_start);
    }

    #[test]
    fn test_dimensions_required() {
        assert!(LearnerConfig::default().validate().is_err());
        assert!(LearnerConfig::new(4, 1).validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = LearnerConfig::new(4, 1);
        config.epsilon = 1.5;
        assert!(config.validate().is_err());

        let mut config = LearnerConfig::new(4, 1);
        config.gamma = 1.0;
        assert!(config.validate().is_err());

        let mut config = LearnerConfig::new(4, 1);
        config.policy_optimizer.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LearnerConfig = serde_json::from_str(r#"{"state_dim": 3, "action_dim": 2, "gamma": 0.9}"#).unwrap();
        assert_eq!(config.state_dim, 3);
        assert_eq!(config.gamma, 0.9);
        assert_eq!(config.sample_size, 500);
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learner.json");
        let mut config = LearnerConfig::new(2, 1);
        config.dataset_size = Some(250);
        config.to_json_file(&path).unwrap();
        assert_eq!(LearnerConfig::from_json_file(&path).unwrap(), config);
    }
}
