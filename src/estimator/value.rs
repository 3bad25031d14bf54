use std::ops::Deref;

use ndarray::{concatenate, Array1, ArrayView1, Axis};

use crate::activations::Activation;
use crate::actions::CandidateActions;
use crate::error::{Result, TandemError};
use crate::estimator::{Estimator, TrainableModel};
use crate::network::NeuralNetwork;

/// Approximates `Q(state, action)`. The model input is the state followed by
/// the action.
pub struct ValueEstimator<M: TrainableModel = NeuralNetwork> {
    inner: Estimator<M>,
    state_dim: usize,
    action_dim: usize,
}

impl ValueEstimator<NeuralNetwork> {
    /// `[s+a, (s+a)*k, (s+a)*k, 1]`, leaky ReLU hidden layers and a linear output.
    pub fn with_architecture(state_dim: usize, action_dim: usize, width_factor: usize) -> Result<Self> {
        let input = state_dim + action_dim;
        let hidden = input * width_factor.max(1);
        let network = NeuralNetwork::with_output_activation(
            &[input, hidden, hidden, 1],
            Activation::LeakyRelu { alpha: 0.01 },
            Activation::Linear,
        )?;
        Self::new(network, state_dim, action_dim)
    }
}

impl<M: TrainableModel> ValueEstimator<M> {
    pub fn new(model: M, state_dim: usize, action_dim: usize) -> Result<Self> {
        if model.input_size() != state_dim + action_dim || model.output_size() != 1 {
            return Err(TandemError::dimension_mismatch(
                format!("value model {}->1", state_dim + action_dim),
                format!("{}->{}", model.input_size(), model.output_size()),
            ));
        }
        Ok(ValueEstimator { inner: Estimator::new("value", model), state_dim, action_dim })
    }

    pub fn state_dim(&self) -> usize {
        self.state_dim
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }

    /// Model input for one state/action pair.
    pub fn input(&self, state: ArrayView1<f32>, action: ArrayView1<f32>) -> Result<Array1<f32>> {
        if state.len() != self.state_dim || action.len() != self.action_dim {
            return Err(TandemError::dimension_mismatch(
                format!("state {} / action {}", self.state_dim, self.action_dim),
                format!("state {} / action {}", state.len(), action.len()),
            ));
        }
        Ok(concatenate![Axis(0), state, action])
    }

    pub fn value(&self, state: ArrayView1<f32>, action: ArrayView1<f32>) -> Result<f32> {
        let x = self.input(state, action)?;
        Ok(self.inner.calculate(x.view())?[0])
    }

    /// Largest value over `candidates` in `state`, with the maximizing action.
    /// All candidates are scored by the same parameter set.
    pub fn max_value(&self, state: ArrayView1<f32>, candidates: &CandidateActions) -> Result<(f32, Array1<f32>)> {
        let guard = self.inner.read_state();
        let mut best: Option<(f32, &Array1<f32>)> = None;
        for action in candidates.as_slice() {
            let x = self.input(state, action.view())?;
            let q = self.inner.predict_with(&guard, x.view())?.output[0];
            if best.map_or(true, |(b, _)| q > b) {
                best = Some((q, action));
            }
        }
        best.map(|(q, a)| (q, a.clone()))
            .ok_or_else(|| TandemError::invalid_parameter("candidates", "no candidate actions"))
    }
}

impl<M: TrainableModel> Deref for ValueEstimator<M> {
    type Target = Estimator<M>;

    fn deref(&self) -> &Estimator<M> {
        &self.inner
    }
}
