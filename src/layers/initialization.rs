use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;

use crate::activations::Activation;

/// Weight initialization strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightInit {
    /// Xavier/Glorot uniform, suited to tanh and linear layers
    XavierUniform,

    /// He/Kaiming normal, suited to rectifiers
    HeNormal,

    /// Uniform distribution with custom range
    Uniform { min: f32, max: f32 },
}

impl WeightInit {
    /// Initialize a `(fan_in, fan_out)` weight matrix
    pub fn initialize_weights(&self, shape: (usize, usize)) -> Array2<f32> {
        let (fan_in, fan_out) = shape;

        match *self {
            WeightInit::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
                Array2::random(shape, Uniform::new(-limit, limit))
            }
            WeightInit::HeNormal => {
                let std = (2.0 / fan_in.max(1) as f32).sqrt();
                match Normal::new(0.0, std) {
                    Ok(normal) => Array2::random(shape, normal),
                    Err(_) => Array2::zeros(shape),
                }
            }
            WeightInit::Uniform { min, max } => Array2::random(shape, Uniform::new(min, max)),
        }
    }

    /// Biases start at zero for every strategy
    pub fn initialize_biases(&self, size: usize) -> Array1<f32> {
        Array1::zeros(size)
    }

    /// Get the recommended initialization for an activation function
    pub fn for_activation(activation: Activation) -> Self {
        match activation {
            Activation::Relu | Activation::LeakyRelu { .. } => WeightInit::HeNormal,
            Activation::Sigmoid | Activation::Tanh | Activation::Linear => WeightInit::XavierUniform,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xavier_bounds() {
        let weights = WeightInit::XavierUniform.initialize_weights((10, 6));
        let limit = (6.0f32 / 16.0).sqrt();
        assert_eq!(weights.dim(), (10, 6));
        assert!(weights.iter().all(|w| w.abs() <= limit));
    }

    #[test]
    fn test_rectifiers_use_he() {
        assert_eq!(WeightInit::for_activation(Activation::Relu), WeightInit::HeNormal);
        assert_eq!(WeightInit::for_activation(Activation::Tanh), WeightInit::XavierUniform);
    }
}
