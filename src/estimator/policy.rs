use std::ops::Deref;

use ndarray::{Array1, ArrayView1};

use crate::actions::clip_action;
use crate::activations::Activation;
use crate::error::{Result, TandemError};
use crate::estimator::{Estimator, TrainableModel};
use crate::network::NeuralNetwork;

/// Deterministic policy mapping a state to an action in `[-1, 1]^D`.
pub struct PolicyEstimator<M: TrainableModel = NeuralNetwork> {
    inner: Estimator<M>,
}

impl PolicyEstimator<NeuralNetwork> {
    /// `[s, max(s,a)*k, max(s,a)*k, a]` with tanh everywhere.
    pub fn with_architecture(state_dim: usize, action_dim: usize, width_factor: usize) -> Result<Self> {
        let hidden = state_dim.max(action_dim) * width_factor.max(1);
        let network = NeuralNetwork::with_output_activation(
            &[state_dim, hidden, hidden, action_dim],
            Activation::Tanh,
            Activation::Tanh,
        )?;
        Ok(Self::new(network))
    }
}

impl<M: TrainableModel> PolicyEstimator<M> {
    pub fn new(model: M) -> Self {
        PolicyEstimator { inner: Estimator::new("policy", model) }
    }

    pub fn state_dim(&self) -> usize {
        self.inner.input_dim()
    }

    pub fn action_dim(&self) -> usize {
        self.inner.output_dim()
    }

    /// Proposed action for `state`, clipped. Evaluation failures yield the
    /// zero action so the caller can still explore.
    pub fn action(&self, state: ArrayView1<f32>) -> Array1<f32> {
        match self.try_action(state) {
            Ok(action) => action,
            Err(e) => {
                log::debug!("policy evaluation failed: {}", e);
                Array1::zeros(self.action_dim())
            }
        }
    }

    pub fn try_action(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        let mut action = self.inner.calculate(state)?;
        if action.iter().any(|v| !v.is_finite()) {
            return Err(TandemError::Numerical("policy produced a non-finite action".to_string()));
        }
        clip_action(&mut action);
        Ok(action)
    }
}

impl<M: TrainableModel> Deref for PolicyEstimator<M> {
    type Target = Estimator<M>;

    fn deref(&self) -> &Estimator<M> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_actions_are_clipped() {
        let mut network = NeuralNetwork::new(&[1, 1], &[Activation::Linear]).unwrap();
        network.import_parameters(&[10.0, 0.0]).unwrap();
        let policy = PolicyEstimator::new(network);
        assert_eq!(policy.action(array![1.0].view()), array![1.0]);
        assert_eq!(policy.action(array![-1.0].view()), array![-1.0]);
    }

    #[test]
    fn test_bad_state_yields_zero_action() {
        let policy = PolicyEstimator::with_architecture(3, 2, 2).unwrap();
        assert_eq!(policy.action(array![1.0].view()), Array1::<f32>::zeros(2));
    }
}
