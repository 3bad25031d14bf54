use ndarray::{concatenate, s, Array1, Array2, Axis};
use rand::seq::SliceRandom;

use crate::config::OptimizerSettings;
use crate::dataset::Dataset;
use crate::error::{Result, TandemError};
use crate::estimator::EstimatorSnapshot;
use crate::network::NeuralNetwork;
use crate::training::{holdout_split, select_rows, AsyncOptimizer, OptimizerWorker, Solution, SolutionStatistics, WorkerContext};

/// States to improve the policy on, and the frozen critic that scores them.
#[derive(Clone, Debug)]
pub struct PolicyProblem {
    pub states: Dataset,
    pub critic: EstimatorSnapshot<NeuralNetwork>,
}

/// Gradient ascent of `mean Q(s, policy(s))` over the policy parameters.
///
/// The critic sees raw states and actions through its own normalization, so
/// dQ/da is rescaled from the critic's normalized units before it is
/// backpropagated through the policy. The solution is the policy with the
/// highest mean Q on the held-out states.
pub struct PolicyGradAscent {
    settings: OptimizerSettings,
    worker: OptimizerWorker<NeuralNetwork>,
}

impl PolicyGradAscent {
    pub fn new(settings: OptimizerSettings) -> Self {
        PolicyGradAscent { settings, worker: OptimizerWorker::new("policy") }
    }

    pub fn settings(&self) -> &OptimizerSettings {
        &self.settings
    }
}

impl AsyncOptimizer for PolicyGradAscent {
    type Model = NeuralNetwork;
    type Problem = PolicyProblem;

    fn start_optimize(&mut self, problem: PolicyProblem, initial: NeuralNetwork) -> Result<()> {
        if problem.states.is_empty() {
            return Err(TandemError::EmptyBuffer("policy dataset has no states".to_string()));
        }
        let state_dim = initial.input_size();
        let action_dim = initial.output_size();
        if problem.states.input_dim() != state_dim {
            return Err(TandemError::dimension_mismatch(
                format!("{} state inputs", state_dim),
                format!("{} state inputs", problem.states.input_dim()),
            ));
        }
        let critic = &problem.critic.model;
        if critic.input_size() != state_dim + action_dim || critic.output_size() != 1 {
            return Err(TandemError::dimension_mismatch(
                format!("critic {}->1", state_dim + action_dim),
                format!("critic {}->{}", critic.input_size(), critic.output_size()),
            ));
        }

        let settings = self.settings.clone();
        let preprocess = problem.states.preprocess().clone();
        self.worker.spawn(preprocess, move |ctx| {
            ascend(&settings, &problem, initial, ctx);
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

struct Critic<'a> {
    snapshot: &'a EstimatorSnapshot<NeuralNetwork>,
    state_dim: usize,
    action_scale: Array1<f32>,
    output_scale: f32,
    output_mean: f32,
}

impl<'a> Critic<'a> {
    fn new(snapshot: &'a EstimatorSnapshot<NeuralNetwork>, state_dim: usize) -> Self {
        let input_dim = snapshot.model.input_size();
        let input_scale = snapshot.preprocess.input_scale(input_dim);
        Critic {
            snapshot,
            state_dim,
            action_scale: input_scale.slice(s![state_dim..]).to_owned(),
            output_scale: snapshot.preprocess.output_scale(1)[0],
            output_mean: snapshot.preprocess.output.as_ref().map_or(0.0, |mv| mv.mean[0]),
        }
    }

    fn inputs(&self, raw_states: &Array2<f32>, actions: &Array2<f32>) -> Array2<f32> {
        let joined = concatenate![Axis(1), raw_states.view(), actions.view()];
        self.snapshot.preprocess.normalize_inputs(joined.view())
    }

    /// Mean raw Q over the rows.
    fn mean_q(&self, raw_states: &Array2<f32>, actions: &Array2<f32>) -> f32 {
        let q = self.snapshot.model.forward_batch(self.inputs(raw_states, actions).view());
        q.mean().unwrap_or(0.0) * self.output_scale + self.output_mean
    }

    /// dQ/da in raw units, one row per state.
    fn action_gradient(&self, raw_states: &Array2<f32>, actions: &Array2<f32>) -> Array2<f32> {
        let trace = self.snapshot.model.forward_trace(self.inputs(raw_states, actions).view());
        let ones = Array2::ones((actions.nrows(), 1));
        let gradients = self.snapshot.model.backward(&trace, ones.view());
        let dq = gradients.input_errors.slice(s![.., self.state_dim..]).to_owned();
        dq / &self.action_scale.view().insert_axis(Axis(0)) * self.output_scale
    }
}

fn ascend(settings: &OptimizerSettings, problem: &PolicyProblem, mut model: NeuralNetwork, ctx: &WorkerContext<NeuralNetwork>) {
    let mut rng = rand::thread_rng();
    let raw_states = problem.states.raw_inputs();
    let states = problem.states.normalized_inputs();
    let critic = Critic::new(&problem.critic, problem.states.input_dim());

    let (mut training, held) = holdout_split(problem.states.len(), settings.holdout_fraction, &mut rng);
    let held_raw = select_rows(&raw_states, &held);
    let held_states = select_rows(&states, &held);

    if !settings.warm_start {
        model.randomize();
    }
    let mut optimizer = settings.kind.build(&model.layers);

    let score = |model: &NeuralNetwork| critic.mean_q(&held_raw, &model.forward_batch(held_states.view()));
    let mut best = score(&model);
    if !best.is_finite() {
        best = f32::NEG_INFINITY;
    }
    ctx.offer(&model, best, 0);

    let mut stale = 0;
    for iteration in 1..=settings.max_iterations {
        if !ctx.should_continue() {
            break;
        }

        training.shuffle(&mut rng);
        for batch in training.chunks(settings.batch_size) {
            let batch_raw = select_rows(&raw_states, batch);
            let batch_states = select_rows(&states, batch);

            let trace = model.forward_trace(batch_states.view());
            let dq_da = critic.action_gradient(&batch_raw, &trace.output);
            let errors = dq_da * (-1.0 / batch.len() as f32);
            let mut gradients = model.backward(&trace, errors.view());
            if !gradients.is_finite() {
                ctx.fail(iteration, format!("non-finite policy gradient at iteration {}", iteration));
                return;
            }
            settings.clipper.clip(&mut gradients);
            model.apply_gradients(&gradients, &mut optimizer, settings.learning_rate);
        }

        let current = score(&model);
        if !current.is_finite() {
            ctx.fail(iteration, format!("non-finite critic value at iteration {}", iteration));
            return;
        }
        if current > best {
            best = current;
            stale = 0;
            ctx.offer(&model, best, iteration);
        } else {
            stale += 1;
            ctx.report(iteration, best);
            if settings.patience > 0 && stale >= settings.patience {
                log::debug!("policy optimizer stopped early after {} iterations", iteration);
                break;
            }
        }
    }
}
