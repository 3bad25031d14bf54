use serde::{Deserialize, Serialize};

use crate::network::Gradients;

/// Gradient clipping applied before every update step
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum GradientClipper {
    /// Rescale all gradients together when their global norm exceeds `max_norm`
    ClipByGlobalNorm { max_norm: f32 },

    /// Clip each gradient component into `[min, max]`
    ClipByValue { min: f32, max: f32 },

    #[default]
    None,
}

impl GradientClipper {
    pub fn clip(&self, gradients: &mut Gradients) {
        match *self {
            GradientClipper::ClipByGlobalNorm { max_norm } => {
                let norm = gradients.global_norm();
                if norm > max_norm && norm > 0.0 {
                    gradients.scale(max_norm / norm);
                }
            }
            GradientClipper::ClipByValue { min, max } => {
                for (w, b) in &mut gradients.layers {
                    w.mapv_inplace(|g| g.clamp(min, max));
                    b.mapv_inplace(|g| g.clamp(min, max));
                }
            }
            GradientClipper::None => {}
        }
    }
}
