use std::sync::Arc;

use ndarray::{array, concatenate, Array1, Axis};
use parking_lot::Mutex;

use crate::actions::CandidateActions;
use crate::dataset::Dataset;
use crate::dataset_builder::SampleSource;
use crate::estimator::{TrainableModel, ValueEstimator};
use crate::network::NeuralNetwork;
use crate::replay_buffer::{ExperienceBuffer, Transition};

/// Bootstrapped value targets: input `[state, action]`, target
/// `reward + gamma * max_a' Q(next_state, a')`, or just `reward` in epoch 0.
#[derive(Clone)]
pub struct ValueTargets<M: TrainableModel = NeuralNetwork> {
    buffer: Arc<ExperienceBuffer>,
    value: Arc<ValueEstimator<M>>,
    candidates: Arc<CandidateActions>,
    gamma: f32,
    epoch: u32,
    max_q: Arc<Mutex<(f64, usize)>>,
}

impl<M: TrainableModel> ValueTargets<M> {
    pub fn new(
        buffer: Arc<ExperienceBuffer>,
        value: Arc<ValueEstimator<M>>,
        candidates: Arc<CandidateActions>,
        gamma: f32,
    ) -> Self {
        ValueTargets { buffer, value, candidates, gamma, epoch: 0, max_q: Arc::new(Mutex::new((0.0, 0))) }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Epoch of the value estimator the next run bootstraps from.
    pub fn set_epoch(&mut self, epoch: u32) {
        self.epoch = epoch;
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Target for one transition. A failed evaluation of the next state makes the target 0.
    pub fn target(&self, transition: &Transition) -> f32 {
        if self.epoch == 0 {
            return transition.reward;
        }
        match self.value.max_value(transition.next_state.view(), &self.candidates) {
            Ok((q, _)) => {
                let mut stats = self.max_q.lock();
                stats.0 += f64::from(q.abs());
                stats.1 += 1;
                transition.reward + self.gamma * q
            }
            Err(e) => {
                log::debug!("bootstrap evaluation failed, using target 0: {}", e);
                0.0
            }
        }
    }
}

impl<M: TrainableModel> SampleSource for ValueTargets<M> {
    fn input_dim(&self) -> usize {
        self.value.state_dim() + self.value.action_dim()
    }

    fn target_dim(&self) -> usize {
        1
    }

    fn buffer(&self) -> &ExperienceBuffer {
        &self.buffer
    }

    fn row(&self, transition: &Transition) -> Option<(Array1<f32>, Option<Array1<f32>>)> {
        let target = self.target(transition);
        let input = concatenate![Axis(0), transition.state.view(), transition.action.view()];
        Some((input, Some(array![target])))
    }

    fn finished(&self, dataset: &Dataset) {
        let (sum, count) = std::mem::replace(&mut *self.max_q.lock(), (0.0, 0));
        if count > 0 {
            log::info!(
                "value dataset of {} samples built at epoch {}, average |max Q| {:.4}",
                dataset.len(),
                self.epoch,
                sum / count as f64
            );
        } else {
            log::info!("value dataset of {} samples built at epoch {}", dataset.len(), self.epoch);
        }
    }
}
