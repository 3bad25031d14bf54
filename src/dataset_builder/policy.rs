use std::sync::Arc;

use ndarray::Array1;

use crate::dataset::Dataset;
use crate::dataset_builder::SampleSource;
use crate::replay_buffer::{ExperienceBuffer, Transition};

/// Input-only dataset of states drawn from the experience buffer.
#[derive(Clone)]
pub struct PolicyInputs {
    buffer: Arc<ExperienceBuffer>,
    state_dim: usize,
}

impl PolicyInputs {
    pub fn new(buffer: Arc<ExperienceBuffer>, state_dim: usize) -> Self {
        PolicyInputs { buffer, state_dim }
    }
}

impl SampleSource for PolicyInputs {
    fn input_dim(&self) -> usize {
        self.state_dim
    }

    fn target_dim(&self) -> usize {
        0
    }

    fn buffer(&self) -> &ExperienceBuffer {
        &self.buffer
    }

    fn row(&self, transition: &Transition) -> Option<(Array1<f32>, Option<Array1<f32>>)> {
        Some((transition.state.clone(), None))
    }

    fn finished(&self, dataset: &Dataset) {
        log::info!("policy dataset of {} states built", dataset.len());
    }
}
