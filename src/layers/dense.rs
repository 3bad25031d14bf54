use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::initialization::WeightInit;
use crate::activations::Activation;

/// A fully connected layer. Weights are stored `(input, output)` so a batch of
/// row vectors is transformed with a single `inputs.dot(&weights)`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
}

/// Gradients of one layer for a batch, plus the error propagated to its input.
#[derive(Clone, Debug)]
pub struct LayerGradients {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub input_errors: Array2<f32>,
}

impl DenseLayer {
    /// Create a layer initialized with the strategy recommended for `activation`.
    pub fn new(input_size: usize, output_size: usize, activation: Activation) -> Self {
        Self::new_with_init(input_size, output_size, activation, WeightInit::for_activation(activation))
    }

    pub fn new_with_init(input_size: usize, output_size: usize, activation: Activation, init: WeightInit) -> Self {
        DenseLayer {
            weights: init.initialize_weights((input_size, output_size)),
            biases: init.initialize_biases(output_size),
            activation,
        }
    }

    /// Re-draw weights and zero the biases, keeping the shape and activation.
    pub fn randomize(&mut self) {
        let init = WeightInit::for_activation(self.activation);
        self.weights = init.initialize_weights(self.weights.dim());
        self.biases = init.initialize_biases(self.biases.len());
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Affine transform without the activation.
    pub fn pre_activation(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0))
    }

    pub fn forward_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut outputs = self.pre_activation(inputs);
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Backpropagate `output_errors` (dL/d output) given the inputs and
    /// pre-activations recorded during the forward pass.
    pub fn backward_batch(
        &self,
        inputs: ArrayView2<f32>,
        pre_activation: ArrayView2<f32>,
        output_errors: ArrayView2<f32>,
    ) -> LayerGradients {
        let adjusted = &output_errors * &self.activation.derivative_batch(pre_activation);
        LayerGradients {
            weights: inputs.t().dot(&adjusted),
            biases: adjusted.sum_axis(Axis(0)),
            input_errors: adjusted.dot(&self.weights.t()),
        }
    }
}
