//! # Background optimizers
//!
//! The control loop drives training through the [`AsyncOptimizer`] capability:
//! start a pass, poll it once per tick, take the best model when the pass is
//! over, or stop it early. Each implementation runs its pass on its own thread
//! via [`OptimizerWorker`] and publishes progress only after a full update
//! step, so a poll never observes a torn result.
//!
//! - [`ValueGradDescent`]: regression of the value network on bootstrapped targets.
//! - [`PolicyGradAscent`]: deterministic policy gradient through a frozen critic.

mod policy_ascent;
mod value_descent;
mod worker;

pub use policy_ascent::{PolicyGradAscent, PolicyProblem};
pub use value_descent::ValueGradDescent;
pub use worker::{OptimizerWorker, WorkerContext};

use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Result;
use crate::estimator::TrainableModel;
use crate::normalization::Preprocess;

/// Progress of a pass: the score of the best model so far and the number of
/// completed iterations. A fault means the pass ended on corrupted numbers.
#[derive(Clone, Debug, PartialEq)]
pub struct SolutionStatistics {
    pub score: f32,
    pub iterations: usize,
    pub fault: Option<String>,
}

/// Best model of a finished pass, with the normalization it was trained under.
#[derive(Clone, Debug)]
pub struct Solution<M> {
    pub model: M,
    pub preprocess: Preprocess,
    pub statistics: SolutionStatistics,
}

pub trait AsyncOptimizer: Send + 'static {
    type Model: TrainableModel;
    type Problem: Send + 'static;

    /// Begin a pass from `initial`. Fails if a pass is already running.
    fn start_optimize(&mut self, problem: Self::Problem, initial: Self::Model) -> Result<()>;

    fn is_running(&self) -> bool;

    fn solution_statistics(&self) -> Option<SolutionStatistics>;

    /// True once a pass has ended and its result has not been taken.
    fn has_solution(&self) -> bool;

    /// The finished pass's best model, `Ok(None)` while running or when
    /// nothing is pending, `Err` if the pass faulted.
    fn take_solution(&mut self) -> Result<Option<Solution<Self::Model>>>;

    /// End the running pass and wait for its thread. The interrupted pass
    /// leaves no solution behind.
    fn stop_computation(&mut self);
}

/// Shuffled split of `0..rows` into training and held-out indices. The
/// held-out part is empty when it would leave no training rows; scoring then
/// falls back to the training rows.
pub(crate) fn holdout_split<R: Rng + ?Sized>(rows: usize, fraction: f32, rng: &mut R) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..rows).collect();
    indices.shuffle(rng);
    let held = ((rows as f32) * fraction).floor() as usize;
    if held == 0 || held >= rows {
        return (indices.clone(), indices);
    }
    let training = indices.split_off(held);
    (training, indices)
}

pub(crate) fn select_rows(matrix: &Array2<f32>, rows: &[usize]) -> Array2<f32> {
    matrix.select(Axis(0), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_holdout_split_partitions_rows() {
        let mut rng = StdRng::seed_from_u64(7);
        let (training, held) = holdout_split(100, 0.2, &mut rng);
        assert_eq!(training.len(), 80);
        assert_eq!(held.len(), 20);

        let mut all: Vec<usize> = training.iter().chain(held.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_tiny_dataset_scores_on_training_rows() {
        let mut rng = StdRng::seed_from_u64(7);
        let (training, held) = holdout_split(3, 0.1, &mut rng);
        assert_eq!(training.len(), 3);
        assert_eq!(held.len(), 3);
    }
}
