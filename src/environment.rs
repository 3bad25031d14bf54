//! The environment the learner acts in.
//!
//! Both calls are synchronous and may fail; the control loop treats any
//! failure as transient and retries on the next tick.

use ndarray::{Array1, ArrayView1};

use crate::error::Result;

/// Result of executing one action.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    pub next_state: Array1<f32>,
    pub reward: f32,
}

pub trait Environment: Send + 'static {
    fn state_dim(&self) -> usize;

    fn action_dim(&self) -> usize;

    /// Current observation.
    fn state(&mut self) -> Result<Array1<f32>>;

    /// Execute `action` (components in `[-1, 1]`).
    fn perform_action(&mut self, action: ArrayView1<f32>) -> Result<StepOutcome>;
}
