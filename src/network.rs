//! Feed-forward network used as the default trainable model of both
//! estimators.
//!
//! Evaluation takes `&self`: the per-layer activations needed for
//! backpropagation are returned in a [`ForwardTrace`] instead of being cached
//! inside the layers, so many threads can evaluate one network behind a read
//! lock.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::activations::Activation;
use crate::error::{Result, TandemError};
use crate::estimator::{Prediction, TrainableModel};
use crate::layers::DenseLayer;
use crate::optimizer::Optimizer;

/// Per-layer inputs and pre-activations recorded by [`NeuralNetwork::forward_trace`].
pub struct ForwardTrace {
    inputs: Vec<Array2<f32>>,
    pre_activations: Vec<Array2<f32>>,
    pub output: Array2<f32>,
}

/// Parameter gradients for every layer plus dL/d input for the batch.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub layers: Vec<(Array2<f32>, Array1<f32>)>,
    pub input_errors: Array2<f32>,
}

impl Gradients {
    pub fn is_finite(&self) -> bool {
        self.layers
            .iter()
            .all(|(w, b)| w.iter().chain(b.iter()).all(|v| v.is_finite()))
    }

    pub fn global_norm(&self) -> f32 {
        self.layers
            .iter()
            .map(|(w, b)| w.iter().chain(b.iter()).map(|v| v * v).sum::<f32>())
            .sum::<f32>()
            .sqrt()
    }

    pub fn scale(&mut self, factor: f32) {
        for (w, b) in &mut self.layers {
            w.mapv_inplace(|v| v * factor);
            b.mapv_inplace(|v| v * factor);
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NeuralNetwork {
    pub layers: Vec<DenseLayer>,
}

impl NeuralNetwork {
    /// Create a network from consecutive layer sizes and one activation per layer.
    pub fn new(layer_sizes: &[usize], activations: &[Activation]) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(TandemError::invalid_parameter(
                "layer_sizes",
                "must have at least 2 layer sizes",
            ));
        }
        if layer_sizes.iter().any(|&size| size == 0) {
            return Err(TandemError::invalid_parameter("layer_sizes", "every layer needs at least one unit"));
        }
        if layer_sizes.len() - 1 != activations.len() {
            return Err(TandemError::dimension_mismatch(
                format!("{} activations", layer_sizes.len() - 1),
                format!("{} activations", activations.len()),
            ));
        }

        let layers = layer_sizes
            .windows(2)
            .zip(activations.iter())
            .map(|(window, &activation)| DenseLayer::new(window[0], window[1], activation))
            .collect();

        Ok(NeuralNetwork { layers })
    }

    /// Hidden layers use `hidden`, the last layer uses `output`.
    pub fn with_output_activation(layer_sizes: &[usize], hidden: Activation, output: Activation) -> Result<Self> {
        let count = layer_sizes.len().saturating_sub(1);
        let mut activations = vec![hidden; count.saturating_sub(1)];
        activations.push(output);
        Self::new(layer_sizes, &activations)
    }

    /// Re-draw every layer's parameters.
    pub fn randomize(&mut self) {
        for layer in &mut self.layers {
            layer.randomize();
        }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.input_size())
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.output_size())
    }

    pub fn architecture(&self) -> Vec<usize> {
        let mut sizes = vec![self.input_size()];
        sizes.extend(self.layers.iter().map(|l| l.output_size()));
        sizes
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }

    pub fn forward(&self, input: ArrayView1<f32>) -> Array1<f32> {
        let output = self.forward_batch(input.insert_axis(Axis(0)));
        output.index_axis_move(Axis(0), 0)
    }

    pub fn forward_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut current = inputs.to_owned();
        for layer in &self.layers {
            current = layer.forward_batch(current.view());
        }
        current
    }

    pub fn forward_trace(&self, inputs: ArrayView2<f32>) -> ForwardTrace {
        let mut trace = ForwardTrace {
            inputs: Vec::with_capacity(self.layers.len()),
            pre_activations: Vec::with_capacity(self.layers.len()),
            output: inputs.to_owned(),
        };
        for layer in &self.layers {
            let pre = layer.pre_activation(trace.output.view());
            let mut out = pre.clone();
            layer.activation.apply_batch(&mut out);
            trace.inputs.push(std::mem::replace(&mut trace.output, out));
            trace.pre_activations.push(pre);
        }
        trace
    }

    /// Backpropagate dL/d output through the layers recorded in `trace`.
    pub fn backward(&self, trace: &ForwardTrace, output_errors: ArrayView2<f32>) -> Gradients {
        let mut layers = Vec::with_capacity(self.layers.len());
        let mut errors = output_errors.to_owned();

        for (i, layer) in self.layers.iter().enumerate().rev() {
            let grads = layer.backward_batch(trace.inputs[i].view(), trace.pre_activations[i].view(), errors.view());
            layers.push((grads.weights, grads.biases));
            errors = grads.input_errors;
        }
        layers.reverse();

        Gradients { layers, input_errors: errors }
    }

    /// Apply one descent step with `optimizer`.
    pub fn apply_gradients<O: Optimizer>(&mut self, gradients: &Gradients, optimizer: &mut O, learning_rate: f32) {
        for (i, (layer, (wg, bg))) in self.layers.iter_mut().zip(gradients.layers.iter()).enumerate() {
            optimizer.update_weights(i, &mut layer.weights, wg, learning_rate);
            optimizer.update_biases(i, &mut layer.biases, bg, learning_rate);
        }
        optimizer.finish_step();
    }

    /// Mean squared error against `targets`, averaged over rows and columns.
    pub fn mean_squared_error(&self, inputs: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        if inputs.nrows() == 0 {
            return 0.0;
        }
        let diff = self.forward_batch(inputs) - targets;
        diff.mapv(|v| v * v).mean().unwrap_or(0.0)
    }

    /// Flatten all weights (row-major) followed by biases, layer by layer.
    pub fn export_parameters(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.parameter_count());
        for layer in &self.layers {
            flat.extend(layer.weights.iter().copied());
            flat.extend(layer.biases.iter().copied());
        }
        flat
    }

    pub fn import_parameters(&mut self, parameters: &[f32]) -> Result<()> {
        if parameters.len() != self.parameter_count() {
            return Err(TandemError::dimension_mismatch(
                format!("{} parameters", self.parameter_count()),
                format!("{} parameters", parameters.len()),
            ));
        }
        if parameters.iter().any(|v| !v.is_finite()) {
            return Err(TandemError::Numerical("non-finite parameter in import".to_string()));
        }

        let mut offset = 0;
        for layer in &mut self.layers {
            for w in layer.weights.iter_mut() {
                *w = parameters[offset];
                offset += 1;
            }
            for b in layer.biases.iter_mut() {
                *b = parameters[offset];
                offset += 1;
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let network: NeuralNetwork = bincode::deserialize(&data)?;
        if network.layers.is_empty() {
            return Err(TandemError::Serialization(format!("{} holds an empty network", path.display())));
        }
        Ok(network)
    }
}

impl TrainableModel for NeuralNetwork {
    fn input_size(&self) -> usize {
        NeuralNetwork::input_size(self)
    }

    fn output_size(&self) -> usize {
        NeuralNetwork::output_size(self)
    }

    fn calculate(&self, input: ArrayView1<f32>) -> Result<Prediction> {
        if input.len() != self.input_size() {
            return Err(TandemError::dimension_mismatch(
                format!("{} inputs", self.input_size()),
                format!("{} inputs", input.len()),
            ));
        }
        Ok(Prediction::exact(self.forward(input)))
    }

    fn import_parameters(&mut self, parameters: &[f32]) -> Result<()> {
        NeuralNetwork::import_parameters(self, parameters)
    }

    fn export_parameters(&self) -> Vec<f32> {
        NeuralNetwork::export_parameters(self)
    }

    fn save(&self, path: &Path) -> Result<()> {
        NeuralNetwork::save(self, path)
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let loaded = NeuralNetwork::load(path)?;
        if loaded.architecture() != self.architecture() {
            return Err(TandemError::dimension_mismatch(
                format!("architecture {:?}", self.architecture()),
                format!("architecture {:?}", loaded.architecture()),
            ));
        }
        *self = loaded;
        Ok(())
    }
}
