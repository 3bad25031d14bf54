//! Regression losses used by the value optimizer.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

pub trait Loss: Send + Sync {
    /// Mean loss over a batch.
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32;

    /// d(mean loss)/d predictions.
    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32>;
}

/// Mean squared error
pub struct MSE;

impl Loss for MSE {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        let diff = &predictions - &targets;
        let count = predictions.len().max(1) as f32;
        (&diff * &diff).sum() / count
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        let count = predictions.len().max(1) as f32;
        (&predictions - &targets) * (2.0 / count)
    }
}

/// Huber loss (smooth L1)
pub struct HuberLoss {
    pub delta: f32,
}

impl HuberLoss {
    pub fn new(delta: f32) -> Self {
        HuberLoss { delta }
    }
}

impl Loss for HuberLoss {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        let diff = &predictions - &targets;
        let count = predictions.len().max(1) as f32;
        diff.mapv(|x| {
            let abs_x = x.abs();
            if abs_x <= self.delta {
                0.5 * x * x
            } else {
                self.delta * abs_x - 0.5 * self.delta * self.delta
            }
        })
        .sum()
            / count
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        let diff = &predictions - &targets;
        let count = predictions.len().max(1) as f32;
        diff.mapv(|x| if x.abs() <= self.delta { x } else { self.delta * x.signum() }) / count
    }
}

/// Serializable loss selection for the optimizer settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum LossKind {
    #[default]
    MeanSquared,
    Huber { delta: f32 },
}

impl LossKind {
    pub fn build(&self) -> Box<dyn Loss> {
        match *self {
            LossKind::MeanSquared => Box::new(MSE),
            LossKind::Huber { delta } => Box::new(HuberLoss::new(delta)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mse_value_and_gradient() {
        let predictions = array![[1.0], [3.0]];
        let targets = array![[0.0], [1.0]];
        assert!((MSE.compute_batch(predictions.view(), targets.view()) - 2.5).abs() < 1e-6);
        assert_eq!(MSE.gradient_batch(predictions.view(), targets.view()), array![[1.0], [2.0]]);
    }

    #[test]
    fn test_huber_is_linear_beyond_delta() {
        let huber = HuberLoss::new(1.0);
        let gradient = huber.gradient_batch(array![[5.0], [0.5]].view(), array![[0.0], [0.0]].view());
        assert_eq!(gradient, array![[0.5], [0.25]]);
    }

    #[test]
    fn test_kind_builds_matching_loss() {
        let loss = LossKind::Huber { delta: 1.0 }.build();
        assert!((loss.compute_batch(array![[3.0]].view(), array![[0.0]].view()) - 2.5).abs() < 1e-6);
    }
}
