use ndarray::Array2;
use rand::seq::SliceRandom;

use crate::config::OptimizerSettings;
use crate::dataset::Dataset;
use crate::error::{Result, TandemError};
use crate::network::NeuralNetwork;
use crate::training::{holdout_split, select_rows, AsyncOptimizer, OptimizerWorker, Solution, SolutionStatistics, WorkerContext};

/// Minibatch gradient descent of the value network on a target dataset.
///
/// Works on the dataset's normalized columns. The model with the lowest
/// held-out loss is the solution; a pass ends after `max_iterations` epochs
/// over the training rows, after `patience` epochs without improvement, or on
/// a stop request.
pub struct ValueGradDescent {
    settings: OptimizerSettings,
    worker: OptimizerWorker<NeuralNetwork>,
}

impl ValueGradDescent {
    pub fn new(settings: OptimizerSettings) -> Self {
        ValueGradDescent { settings, worker: OptimizerWorker::new("value") }
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }
}

impl AsyncOptimizer for ValueGradDescent {
    type Model = NeuralNetwork;
    type Problem = Dataset;

    fn start_optimize(&mut self, dataset: Dataset, initial: NeuralNetwork) -> Result<()> {
        if dataset.is_empty() {
            return Err(TandemError::EmptyBuffer("value dataset has no rows".to_string()));
        }
        if !dataset.has_targets() || dataset.target_dim() != initial.output_size() {
            return Err(TandemError::dimension_mismatch(
                format!("{} targets", initial.output_size()),
                format!("{} targets", dataset.target_dim()),
            ));
        }
        if dataset.input_dim() != initial.input_size() {
            return Err(TandemError::dimension_mismatch(
                format!("{} inputs", initial.input_size()),
                format!("{} inputs", dataset.input_dim()),
            ));
        }

        let settings = self.settings.clone();
        let preprocess = dataset.preprocess().clone();
        self.worker.spawn(preprocess, move |ctx| {
            regress(&settings, &dataset, initial, ctx);
        })
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    fn solution_statistics(&self) -> Option<SolutionStatistics> {
        self.worker.statistics()
    }

    fn has_solution(&self) -> bool {
        self.worker.has_solution()
    }

    fn take_solution(&mut self) -> Result<Option<Solution<NeuralNetwork>>> {
        self.worker.take_solution()
    }

    fn stop_computation(&mut self) {
        self.worker.stop();
    }
}

fn regress(settings: &OptimizerSettings, dataset: &Dataset, mut model: NeuralNetwork, ctx: &WorkerContext<NeuralNetwork>) {
    let mut rng = rand::thread_rng();
    let inputs = dataset.normalized_inputs();
    let targets = dataset.normalized_targets();
    let (mut training, held) = holdout_split(dataset.len(), settings.holdout_fraction, &mut rng);
    let held_inputs = select_rows(&inputs, &held);
    let held_targets = select_rows(&targets, &held);

    if !settings.warm_start {
        model.randomize();
    }
    let loss = settings.loss.build();
    let mut optimizer = settings.kind.build(&model.layers);

    let score = |model: &NeuralNetwork| loss.compute_batch(model.forward_batch(held_inputs.view()).view(), held_targets.view());
    let mut best = score(&model);
    if !best.is_finite() {
        best = f32::INFINITY;
    }
    ctx.offer(&model, best, 0);

    let mut stale = 0;
    for iteration in 1..=settings.max_iterations {
        if !ctx.should_continue() {
            break;
        }

        training.shuffle(&mut rng);
        for batch in training.chunks(settings.batch_size) {
            let batch_inputs: Array2<f32> = select_rows(&inputs, batch);
            let batch_targets = select_rows(&targets, batch);

            let trace = model.forward_trace(batch_inputs.view());
            let errors = loss.gradient_batch(trace.output.view(), batch_targets.view());
            let mut gradients = model.backward(&trace, errors.view());
            if !gradients.is_finite() {
                ctx.fail(iteration, format!("non-finite value gradient at iteration {}", iteration));
                return;
            }
            settings.clipper.clip(&mut gradients);
            model.apply_gradients(&gradients, &mut optimizer, settings.learning_rate);
        }

        let current = score(&model);
        if !current.is_finite() {
            ctx.fail(iteration, format!("non-finite value loss at iteration {}", iteration));
            return;
        }
        if current < best {
            best = current;
            stale = 0;
            ctx.offer(&model, best, iteration);
        } else {
            stale += 1;
            ctx.report(iteration, best);
            if settings.patience > 0 && stale >= settings.patience {
                log::debug!("value optimizer stopped early after {} iterations", iteration);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activations::Activation;
    use ndarray::array;
    use std::thread;

    fn linear_dataset() -> Dataset {
        let mut dataset = Dataset::new(1, 1);
        for i in 0..64 {
            let x = i as f32 / 16.0 - 2.0;
            dataset.push(array![x], Some(array![3.0 * x + 1.0])).unwrap();
        }
        dataset.fit_normalization().unwrap();
        dataset
    }

    fn wait(optimizer: &ValueGradDescent) {
        while optimizer.is_running() {
            thread::yield_now();
        }
    }

    #[test]
    fn test_fits_linear_targets() {
        let settings = OptimizerSettings { learning_rate: 0.05, batch_size: 16, holdout_fraction: 0.0, ..Default::default() };
        let mut optimizer = ValueGradDescent::new(settings);
        let network = NeuralNetwork::new(&[1, 1], &[Activation::Linear]).unwrap();
        optimizer.start_optimize(linear_dataset(), network).unwrap();
        wait(&optimizer);

        let solution = optimizer.take_solution().unwrap().unwrap();
        assert!(solution.statistics.score < 0.01, "score {}", solution.statistics.score);
        assert!(solution.preprocess.output.is_some());
    }

    #[test]
    fn test_rejects_mismatched_dataset() {
        let mut optimizer = ValueGradDescent::new(OptimizerSettings::default());
        let network = NeuralNetwork::new(&[2, 1], &[Activation::Linear]).unwrap();
        assert!(optimizer.start_optimize(linear_dataset(), network).is_err());

        let network = NeuralNetwork::new(&[1, 1], &[Activation::Linear]).unwrap();
        assert!(optimizer.start_optimize(Dataset::new(1, 1), network).is_err());
    }

    #[test]
    fn test_stopped_pass_has_no_solution() {
        let settings = OptimizerSettings { max_iterations: 100_000, patience: 0, ..Default::default() };
        let mut optimizer = ValueGradDescent::new(settings);
        let network = NeuralNetwork::new(&[1, 8, 1], &[Activation::Tanh, Activation::Linear]).unwrap();
        optimizer.start_optimize(linear_dataset(), network).unwrap();
        optimizer.stop_computation();

        assert!(!optimizer.is_running());
        assert!(!optimizer.has_solution());
        assert!(optimizer.take_solution().unwrap().is_none());
    }
}
