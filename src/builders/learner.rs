use crate::config::{LearnerConfig, OptimizerSettings};
use crate::dataset::Dataset;
use crate::environment::Environment;
use crate::error::{Result, TandemError};
use crate::learner::ActorLearner;
use crate::network::NeuralNetwork;
use crate::training::{AsyncOptimizer, PolicyProblem};

/// Builder for an [`ActorLearner`] with a fluent API.
///
/// Dimensions left at zero are taken from the environment.
pub struct LearnerBuilder<E: Environment> {
    config: LearnerConfig,
    environment: Option<E>,
}

impl<E: Environment> LearnerBuilder<E> {
    pub fn new() -> Self {
        LearnerBuilder { config: LearnerConfig::default(), environment: None }
    }

    /// Start from an existing configuration
    pub fn with_config(mut self, config: LearnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn environment(mut self, environment: E) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.config.gamma = gamma;
        self
    }

    pub fn epsilon(mut self, epsilon: f32) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Transitions required before training starts
    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.config.sample_size = sample_size;
        self
    }

    pub fn dataset_size(mut self, rows: usize) -> Self {
        self.config.dataset_size = Some(rows);
        self
    }

    pub fn hidden_width_factor(mut self, factor: usize) -> Self {
        self.config.hidden_width_factor = factor;
        self
    }

    /// Lattice resolution and cap of the actions maximized over for targets
    pub fn candidate_actions(mut self, resolution: usize, max_candidates: usize) -> Self {
        self.config.candidate_resolution = resolution;
        self.config.max_candidate_actions = max_candidates;
        self
    }

    pub fn learning_mode(mut self, learning: bool) -> Self {
        self.config.learning_mode = learning;
        self
    }

    pub fn value_optimizer(mut self, settings: OptimizerSettings) -> Self {
        self.config.value_optimizer = settings;
        self
    }

    pub fn policy_optimizer(mut self, settings: OptimizerSettings) -> Self {
        self.config.policy_optimizer = settings;
        self
    }

    /// Build with the built-in optimizers
    pub fn build(self) -> Result<ActorLearner<E>> {
        let (config, environment) = self.finish()?;
        ActorLearner::new(config, environment)
    }

    /// Build with caller-supplied optimizers
    pub fn build_with_optimizers<VO, PO>(self, value_optimizer: VO, policy_optimizer: PO) -> Result<ActorLearner<E, VO, PO>>
    where
        VO: AsyncOptimizer<Model = NeuralNetwork, Problem = Dataset>,
        PO: AsyncOptimizer<Model = NeuralNetwork, Problem = PolicyProblem>,
    {
        let (config, environment) = self.finish()?;
        ActorLearner::with_optimizers(config, environment, value_optimizer, policy_optimizer)
    }

    fn finish(self) -> Result<(LearnerConfig, E)> {
        let environment = self.environment.ok_or_else(|| {
            TandemError::invalid_parameter("environment", "environment not specified")
        })?;
        let mut config = self.config;
        if config.state_dim == 0 {
            config.state_dim = environment.state_dim();
        }
        if config.action_dim == 0 {
            config.action_dim = environment.action_dim();
        }
        Ok((config, environment))
    }
}

impl<E: Environment> Default for LearnerBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environments::CartPole;

    #[test]
    fn test_dimensions_come_from_environment() {
        let learner = LearnerBuilder::new()
            .environment(CartPole::with_seed(3))
            .buffer_capacity(1000)
            .sample_size(100)
            .hidden_width_factor(2)
            .build()
            .unwrap();
        assert_eq!(learner.config().state_dim, 4);
        assert_eq!(learner.config().action_dim, 1);
        assert_eq!(learner.config().sample_size, 100);
    }

    #[test]
    fn test_missing_environment_is_an_error() {
        assert!(LearnerBuilder::<CartPole>::new().build().is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = LearnerBuilder::new().environment(CartPole::with_seed(3)).gamma(1.5).build();
        assert!(result.is_err());
    }
}
