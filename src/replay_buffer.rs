//! Bounded experience buffer shared by the control loop and the dataset
//! builders.
//!
//! Once full, an insert overwrites a uniformly random slot instead of the
//! oldest one, so the buffer holds a randomly refreshed window of experience
//! rather than the strict most recent `capacity` transitions.

use ndarray::Array1;
use parking_lot::Mutex;
use rand::Rng;

use crate::error::{Result, TandemError};

/// One observed `(state, action, next_state, reward)` step.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: Array1<f32>,
    pub next_state: Array1<f32>,
    pub reward: f32,
}

impl Transition {
    pub fn new(state: Array1<f32>, action: Array1<f32>, next_state: Array1<f32>, reward: f32) -> Self {
        Transition { state, action, next_state, reward }
    }
}

pub struct ExperienceBuffer {
    capacity: usize,
    transitions: Mutex<Vec<Transition>>,
}

impl ExperienceBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(TandemError::invalid_parameter("capacity", "must be at least 1"));
        }
        Ok(ExperienceBuffer {
            capacity,
            transitions: Mutex::new(Vec::with_capacity(capacity.min(1 << 16))),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.transitions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, transition: Transition) {
        self.insert_with_rng(transition, &mut rand::thread_rng());
    }

    /// Append while below capacity, otherwise overwrite a uniformly random slot.
    pub fn insert_with_rng<R: Rng + ?Sized>(&self, transition: Transition, rng: &mut R) {
        let mut transitions = self.transitions.lock();
        if transitions.len() < self.capacity {
            transitions.push(transition);
        } else {
            let index = rng.gen_range(0..transitions.len());
            transitions[index] = transition;
        }
    }

    /// `n` transitions drawn with replacement. Nothing is removed.
    pub fn snapshot_sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Transition> {
        let transitions = self.transitions.lock();
        if transitions.is_empty() {
            return Vec::new();
        }
        (0..n)
            .map(|_| transitions[rng.gen_range(0..transitions.len())].clone())
            .collect()
    }

    pub fn get(&self, index: usize) -> Option<Transition> {
        self.transitions.lock().get(index).cloned()
    }

    pub fn clear(&self) {
        self.transitions.lock().clear();
    }
}
