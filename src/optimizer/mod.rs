//! Per-layer parameter update rules used by the background optimizers.
//!
//! Optimizer state (Adam moments) lives with the optimizer that owns a training
//! pass, never with the network, so a network can be cloned into an estimator
//! without dragging training state along.

pub mod gradient_clipper;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::layers::DenseLayer;

pub use gradient_clipper::GradientClipper;

pub trait Optimizer {
    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32);
    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32);

    /// Called once after every layer has been updated for one step.
    fn finish_step(&mut self) {}
}

/// Serializable choice of update rule, part of the optimizer settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum OptimizerKind {
    Sgd,
    Adam { beta1: f32, beta2: f32, epsilon: f32 },
}

impl Default for OptimizerKind {
    fn default() -> Self {
        OptimizerKind::Adam { beta1: 0.9, beta2: 0.999, epsilon: 1e-8 }
    }
}

impl OptimizerKind {
    /// Build fresh optimizer state sized for `layers`.
    pub fn build(&self, layers: &[DenseLayer]) -> OptimizerWrapper {
        match *self {
            OptimizerKind::Sgd => OptimizerWrapper::Sgd(Sgd::new()),
            OptimizerKind::Adam { beta1, beta2, epsilon } => {
                OptimizerWrapper::Adam(Adam::new(layers, beta1, beta2, epsilon))
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum OptimizerWrapper {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer for OptimizerWrapper {
    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::Sgd(optimizer) => optimizer.update_weights(layer, weights, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_weights(layer, weights, gradients, learning_rate),
        }
    }

    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        match self {
            OptimizerWrapper::Sgd(optimizer) => optimizer.update_biases(layer, biases, gradients, learning_rate),
            OptimizerWrapper::Adam(optimizer) => optimizer.update_biases(layer, biases, gradients, learning_rate),
        }
    }

    fn finish_step(&mut self) {
        match self {
            OptimizerWrapper::Sgd(optimizer) => optimizer.finish_step(),
            OptimizerWrapper::Adam(optimizer) => optimizer.finish_step(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Sgd;

impl Sgd {
    pub fn new() -> Sgd {
        Sgd
    }
}

impl Optimizer for Sgd {
    fn update_weights(&mut self, _layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        weights.zip_mut_with(gradients, |w, &g| *w -= learning_rate * g);
    }

    fn update_biases(&mut self, _layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        biases.zip_mut_with(gradients, |b, &g| *b -= learning_rate * g);
    }
}

/// Adam with first/second moments kept per layer.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
    m_weights: Vec<Array2<f32>>,
    v_weights: Vec<Array2<f32>>,
    m_biases: Vec<Array1<f32>>,
    v_biases: Vec<Array1<f32>>,
    pub t: i32,
}

impl Adam {
    pub fn new(layers: &[DenseLayer], beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Adam {
            beta1,
            beta2,
            epsilon,
            m_weights: layers.iter().map(|l| Array2::zeros(l.weights.dim())).collect(),
            v_weights: layers.iter().map(|l| Array2::zeros(l.weights.dim())).collect(),
            m_biases: layers.iter().map(|l| Array1::zeros(l.biases.dim())).collect(),
            v_biases: layers.iter().map(|l| Array1::zeros(l.biases.dim())).collect(),
            t: 1,
        }
    }

    fn corrections(&self) -> (f32, f32) {
        (1.0 - self.beta1.powi(self.t), 1.0 - self.beta2.powi(self.t))
    }
}

impl Optimizer for Adam {
    fn update_weights(&mut self, layer: usize, weights: &mut Array2<f32>, gradients: &Array2<f32>, learning_rate: f32) {
        let (c1, c2) = self.corrections();
        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.epsilon);
        let m = &mut self.m_weights[layer];
        let v = &mut self.v_weights[layer];

        m.zip_mut_with(gradients, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        v.zip_mut_with(gradients, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        ndarray::Zip::from(weights)
            .and(&*m)
            .and(&*v)
            .for_each(|w, &m, &v| *w -= learning_rate * (m / c1) / ((v / c2).sqrt() + eps));
    }

    fn update_biases(&mut self, layer: usize, biases: &mut Array1<f32>, gradients: &Array1<f32>, learning_rate: f32) {
        let (c1, c2) = self.corrections();
        let (beta1, beta2, eps) = (self.beta1, self.beta2, self.epsilon);
        let m = &mut self.m_biases[layer];
        let v = &mut self.v_biases[layer];

        m.zip_mut_with(gradients, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
        v.zip_mut_with(gradients, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

        ndarray::Zip::from(biases)
            .and(&*m)
            .and(&*v)
            .for_each(|b, &m, &v| *b -= learning_rate * (m / c1) / ((v / c2).sqrt() + eps));
    }

    fn finish_step(&mut self) {
        self.t = self.t.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::Activation;
    use ndarray::array;

    #[test]
    fn test_sgd_step() {
        let mut weights = array![[1.0, 2.0]];
        let mut sgd = Sgd::new();
        sgd.update_weights(0, &mut weights, &array![[0.5, -1.0]], 0.1);
        assert_eq!(weights, array![[0.95, 2.1]]);
    }

    #[test]
    fn test_adam_tracks_layers_independently() {
        let layers = vec![
            DenseLayer::new(3, 4, Activation::Relu),
            DenseLayer::new(4, 2, Activation::Linear),
        ];
        let mut adam = Adam::new(&layers, 0.9, 0.999, 1e-8);
        let mut w0 = layers[0].weights.clone();
        let mut w1 = layers[1].weights.clone();
        adam.update_weights(0, &mut w0, &Array2::ones((3, 4)), 0.01);
        adam.update_weights(1, &mut w1, &Array2::ones((4, 2)), 0.01);
        adam.finish_step();

        // First Adam step moves every weight by ~learning_rate against the gradient.
        for (new, old) in w1.iter().zip(layers[1].weights.iter()) {
            assert!((old - new - 0.01).abs() < 1e-4);
        }
        assert_eq!(adam.t, 2);
    }

    #[test]
    fn test_kind_builds_matching_state() {
        let layers = vec![DenseLayer::new(2, 2, Activation::Tanh)];
        assert!(matches!(OptimizerKind::Sgd.build(&layers), OptimizerWrapper::Sgd(_)));
        assert!(matches!(OptimizerKind::default().build(&layers), OptimizerWrapper::Adam(_)));
    }
}
