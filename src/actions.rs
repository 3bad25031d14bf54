//! Continuous action helpers: clipping, uniform exploration, the
//! exploration/exploitation rule and the candidate set used for the
//! bootstrapped max over actions.

use ndarray::Array1;
use rand::Rng;

/// Lower and upper bound of every action component.
pub const ACTION_LOW: f32 = -1.0;
pub const ACTION_HIGH: f32 = 1.0;

/// Clamp every component into `[-1, 1]`. NaN components become 0.
pub fn clip_action(action: &mut Array1<f32>) {
    action.mapv_inplace(|a| if a.is_nan() { 0.0 } else { a.clamp(ACTION_LOW, ACTION_HIGH) });
}

/// Uniform random action in `[-1, 1]^dim`.
pub fn random_action<R: Rng + ?Sized>(dim: usize, rng: &mut R) -> Array1<f32> {
    Array1::from_shape_fn(dim, |_| 2.0 * rng.gen::<f32>() - 1.0)
}

/// Which branch of action selection produced an action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionSource {
    Policy,
    Exploration,
}

/// Choose between the policy's proposal and a random action.
///
/// With probability `1 - epsilon` the proposal is replaced by a uniform random
/// action. When `trusted` is false (either estimator has never been trained)
/// the action is always random.
pub fn select_action<R: Rng + ?Sized>(
    proposal: Array1<f32>,
    epsilon: f32,
    trusted: bool,
    rng: &mut R,
) -> (Array1<f32>, ActionSource) {
    let dim = proposal.len();
    let (mut action, source) = if !trusted || rng.gen::<f32>() > epsilon {
        (random_action(dim, rng), ActionSource::Exploration)
    } else {
        (proposal, ActionSource::Policy)
    };
    clip_action(&mut action);
    (action, source)
}

/// Fixed set of actions the value model is maximized over.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateActions {
    actions: Vec<Array1<f32>>,
}

impl CandidateActions {
    /// Regular lattice with `resolution` points per dimension over `[-1, 1]^dim`.
    /// If the lattice would exceed `max_candidates`, a uniform random set of that
    /// size plus the zero action is used instead.
    pub fn new<R: Rng + ?Sized>(dim: usize, resolution: usize, max_candidates: usize, rng: &mut R) -> Self {
        let resolution = resolution.max(1);
        let lattice_size = u32::try_from(dim)
            .ok()
            .and_then(|d| resolution.checked_pow(d));

        match lattice_size {
            Some(size) if size <= max_candidates.max(1) => CandidateActions { actions: lattice(dim, resolution) },
            _ => {
                let mut actions = vec![Array1::zeros(dim)];
                actions.extend((1..max_candidates.max(1)).map(|_| random_action(dim, rng)));
                CandidateActions { actions }
            }
        }
    }

    pub fn from_actions(actions: Vec<Array1<f32>>) -> Self {
        CandidateActions { actions }
    }

    pub fn as_slice(&self) -> &[Array1<f32>] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn lattice(dim: usize, resolution: usize) -> Vec<Array1<f32>> {
    let coordinate = |k: usize| {
        if resolution == 1 {
            0.0
        } else {
            ACTION_LOW + (ACTION_HIGH - ACTION_LOW) * k as f32 / (resolution - 1) as f32
        }
    };

    let mut points = vec![Array1::<f32>::zeros(dim)];
    for d in 0..dim {
        points = points
            .into_iter()
            .flat_map(|point| {
                (0..resolution).map(move |k| {
                    let mut next = point.clone();
                    next[d] = coordinate(k);
                    next
                })
            })
            .collect();
    }
    points
}
