//! Activation functions for the dense networks backing the estimators.
//!
//! The value network uses leaky rectifiers in its hidden layers and a linear
//! output; the policy network uses `Tanh` throughout so that its raw output
//! already lies in the `[-1, 1]` action range.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// An element-wise activation applied after a layer's affine transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum Activation {
    #[default]
    Relu,
    LeakyRelu { alpha: f32 },
    Linear,
    Sigmoid,
    Tanh,
}

impl Activation {
    #[inline]
    pub fn value(&self, x: f32) -> f32 {
        match *self {
            Activation::Relu => x.max(0.0),
            Activation::LeakyRelu { alpha } => {
                if x > 0.0 {
                    x
                } else {
                    alpha * x
                }
            }
            Activation::Linear => x,
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
        }
    }

    /// Derivative evaluated at the pre-activation value `x`.
    #[inline]
    pub fn derivative(&self, x: f32) -> f32 {
        match *self {
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu { alpha } => {
                if x > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
            Activation::Linear => 1.0,
            Activation::Sigmoid => {
                let s = 1.0 / (1.0 + (-x).exp());
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
        }
    }

    /// Apply the activation to a batch in-place.
    pub fn apply_batch(&self, inputs: &mut Array2<f32>) {
        if let Activation::Linear = self {
            return;
        }
        let activation = *self;
        inputs.mapv_inplace(|v| activation.value(v));
    }

    /// Derivatives for a batch of pre-activation values.
    pub fn derivative_batch(&self, pre_activation: ArrayView2<f32>) -> Array2<f32> {
        let activation = *self;
        pre_activation.mapv(|v| activation.derivative(v))
    }
}
