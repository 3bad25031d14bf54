use std::sync::atomic::Ordering;
use std::sync::Arc;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::actions::{select_action, CandidateActions};
use crate::dataset::Dataset;
use crate::dataset_builder::{DatasetBuilder, PolicyInputs, ValueTargets};
use crate::environment::Environment;
use crate::error::TandemError;
use crate::estimator::EstimatorSnapshot;
use crate::learner::epochs::EpochCounters;
use crate::learner::{fatal, LearnerShared, POLICY, VALUE};
use crate::network::NeuralNetwork;
use crate::replay_buffer::Transition;
use crate::training::{AsyncOptimizer, PolicyProblem, Solution};

/// What the rest of the tick does after the value step.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Proceed,
    Restart,
}

/// State owned by the loop thread. Handed back to the learner on stop so a
/// later start resumes with the same epochs, optimizers and environment.
pub(crate) struct ControlLoop<E, VO, PO> {
    shared: Arc<LearnerShared>,
    environment: E,
    value_optimizer: VO,
    policy_optimizer: PO,
    value_builder: DatasetBuilder<ValueTargets>,
    policy_builder: DatasetBuilder<PolicyInputs>,
    critic: Option<EstimatorSnapshot<NeuralNetwork>>,
    epochs: EpochCounters,
    state: Option<Array1<f32>>,
    reported_iterations: [usize; 2],
    rng: StdRng,
}

impl<E, VO, PO> ControlLoop<E, VO, PO>
where
    E: Environment,
    VO: AsyncOptimizer<Model = NeuralNetwork, Problem = Dataset>,
    PO: AsyncOptimizer<Model = NeuralNetwork, Problem = PolicyProblem>,
{
    pub(crate) fn new(shared: Arc<LearnerShared>, environment: E, value_optimizer: VO, policy_optimizer: PO) -> Self {
        let mut rng = StdRng::from_entropy();
        let value_targets = value_targets(&shared, 0, &mut rng);
        let policy_inputs = PolicyInputs::new(Arc::clone(&shared.buffer), shared.config.state_dim);
        ControlLoop {
            value_builder: DatasetBuilder::new(value_targets),
            policy_builder: DatasetBuilder::new(policy_inputs),
            shared,
            environment,
            value_optimizer,
            policy_optimizer,
            critic: None,
            epochs: EpochCounters::new(),
            state: None,
            reported_iterations: [0; 2],
            rng,
        }
    }

    pub(crate) fn environment_mut(&mut self) -> &mut E {
        &mut self.environment
    }

    /// Tick until the running flag is cleared, then stop all background work.
    pub(crate) fn run(mut self) -> Self {
        log::info!("control loop started at epochs q={} policy={}", self.epochs.q_epoch, self.epochs.policy_epoch);
        while self.shared.running.load(Ordering::SeqCst) {
            self.tick();
        }

        self.value_builder.stop();
        self.policy_builder.stop();
        self.value_optimizer.stop_computation();
        self.policy_optimizer.stop_computation();
        log::info!("control loop stopped at epochs q={} policy={}", self.epochs.q_epoch, self.epochs.policy_epoch);
        self
    }

    pub(crate) fn tick(&mut self) {
        debug_assert!(self.epochs.invariant_holds(), "epoch gating violated: {:?}", self.epochs);
        self.shared.stats.ticks.fetch_add(1, Ordering::Relaxed);

        match self.environment.state() {
            Ok(state) => self.state = Some(state),
            Err(e) => self.environment_failed("reading the state", &e),
        }
        let state = match &self.state {
            Some(state) => state.clone(),
            None => return,
        };

        let proposal = self.shared.policy.action(state.view());
        let trusted = self.shared.has_model() > 0;
        let (action, _) = select_action(proposal, self.shared.epsilon(), trusted, &mut self.rng);

        let outcome = match self.environment.perform_action(action.view()) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.environment_failed("performing the action", &e);
                return;
            }
        };
        self.state = Some(outcome.next_state.clone());

        if !self.shared.learning_mode.load(Ordering::SeqCst) {
            return;
        }

        self.shared
            .buffer
            .insert_with_rng(Transition::new(state, action, outcome.next_state, outcome.reward), &mut self.rng);
        self.shared.stats.transitions_recorded.fetch_add(1, Ordering::Relaxed);

        if self.shared.buffer.len() < self.shared.config.sample_size {
            return;
        }
        if self.maybe_train_value() == Flow::Restart {
            return;
        }
        self.maybe_train_policy();
    }

    /// Every environment failure only costs the tick. Unexpected kinds are louder.
    fn environment_failed(&self, stage: &str, error: &TandemError) {
        self.shared.stats.environment_failures.fetch_add(1, Ordering::Relaxed);
        if error.is_transient() {
            log::debug!("{} failed: {}", stage, error);
        } else {
            log::warn!("{} failed: {}", stage, error);
        }
    }

    fn maybe_train_value(&mut self) -> Flow {
        if self.value_optimizer.is_running() {
            self.report_progress(VALUE);
            return Flow::Proceed;
        }

        if self.value_optimizer.has_solution() && self.epochs.value_import_allowed() {
            match self.value_optimizer.take_solution() {
                Ok(Some(solution)) => self.import_value(solution),
                Ok(None) => {}
                Err(e) => fatal(format!("value optimizer failed: {}", e)),
            }
        }

        // A result waiting for the policy side blocks the next pass.
        if self.value_optimizer.has_solution() || !self.epochs.value_training_allowed() {
            return Flow::Proceed;
        }

        if self.value_builder.is_running() {
            return Flow::Restart;
        }
        if let Some(dataset) = self.value_builder.take_dataset() {
            let rows = dataset.len();
            let initial = self.shared.value.snapshot().model;
            if let Err(e) = self.value_optimizer.start_optimize(dataset, initial) {
                fatal(format!("cannot start value optimizer: {}", e));
            }
            self.reported_iterations[VALUE] = 0;
            log::info!("value optimizer started on {} samples (epoch {})", rows, self.epochs.q_epoch);
            return Flow::Proceed;
        }

        let targets = value_targets(&self.shared, self.epochs.q_epoch, &mut self.rng);
        let rows = self.shared.config.dataset_rows(self.shared.buffer.len());
        let started = match self.value_builder.source_mut() {
            Ok(source) => {
                *source = targets;
                self.value_builder.start(rows)
            }
            Err(e) => Err(e),
        };
        match started {
            Ok(()) => log::info!("building value dataset of {} samples (epoch {})", rows, self.epochs.q_epoch),
            Err(e) => log::warn!("value dataset builder did not start: {}", e),
        }
        Flow::Restart
    }

    fn maybe_train_policy(&mut self) {
        if self.policy_optimizer.is_running() {
            self.report_progress(POLICY);
            return;
        }

        if self.policy_optimizer.has_solution() && self.epochs.policy_import_allowed() {
            match self.policy_optimizer.take_solution() {
                Ok(Some(solution)) => self.import_policy(solution),
                Ok(None) => {}
                Err(e) => fatal(format!("policy optimizer failed: {}", e)),
            }
        }

        if self.policy_optimizer.has_solution() || !self.epochs.policy_training_allowed() {
            return;
        }

        if self.policy_builder.is_running() {
            return;
        }
        if let Some(states) = self.policy_builder.take_dataset() {
            let rows = states.len();
            let critic = match self.critic.take() {
                Some(critic) => critic,
                None => self.shared.value.snapshot(),
            };
            let initial = self.shared.policy.snapshot().model;
            if let Err(e) = self.policy_optimizer.start_optimize(PolicyProblem { states, critic }, initial) {
                fatal(format!("cannot start policy optimizer: {}", e));
            }
            self.reported_iterations[POLICY] = 0;
            log::info!("policy optimizer started on {} states (epoch {})", rows, self.epochs.policy_epoch);
            return;
        }

        let rows = self.shared.config.dataset_rows(self.shared.buffer.len());
        self.critic = Some(self.shared.value.snapshot());
        match self.policy_builder.start(rows) {
            Ok(()) => log::info!("building policy dataset of {} states (epoch {})", rows, self.epochs.policy_epoch),
            Err(e) => log::warn!("policy dataset builder did not start: {}", e),
        }
    }

    fn import_value(&mut self, solution: Solution<NeuralNetwork>) {
        let statistics = solution.statistics.clone();
        if let Err(e) = self.shared.value.import(solution.model, solution.preprocess) {
            fatal(format!("value optimizer produced an unusable model: {}", e));
        }
        self.epochs.advance_value();
        self.shared.has_model[VALUE].fetch_add(1, Ordering::SeqCst);
        self.shared.stats.value_imports.fetch_add(1, Ordering::Relaxed);
        self.shared.publish_epochs(self.epochs);
        log::info!(
            "new value model: error {:.6} after {} iterations, epoch {}",
            statistics.score,
            statistics.iterations,
            self.epochs.q_epoch
        );
    }

    fn import_policy(&mut self, solution: Solution<NeuralNetwork>) {
        let statistics = solution.statistics.clone();
        if let Err(e) = self.shared.policy.import(solution.model, solution.preprocess) {
            fatal(format!("policy optimizer produced an unusable model: {}", e));
        }
        self.epochs.advance_policy();
        self.shared.has_model[POLICY].fetch_add(1, Ordering::SeqCst);
        self.shared.stats.policy_imports.fetch_add(1, Ordering::Relaxed);
        self.shared.publish_epochs(self.epochs);
        log::info!(
            "new policy model: mean Q {:.6} after {} iterations, epoch {}",
            statistics.score,
            statistics.iterations,
            self.epochs.policy_epoch
        );
    }

    fn report_progress(&mut self, which: usize) {
        let statistics = match which {
            VALUE => self.value_optimizer.solution_statistics(),
            _ => self.policy_optimizer.solution_statistics(),
        };
        if let Some(statistics) = statistics {
            if statistics.iterations > self.reported_iterations[which] {
                self.reported_iterations[which] = statistics.iterations;
                let name = if which == VALUE { "value" } else { "policy" };
                log::info!(
                    "{} optimizer: score {:.6} after {} iterations",
                    name,
                    statistics.score,
                    statistics.iterations
                );
            }
        }
    }
}

fn value_targets(shared: &LearnerShared, epoch: u32, rng: &mut StdRng) -> ValueTargets {
    let config = &shared.config;
    let candidates = CandidateActions::new(
        config.action_dim,
        config.candidate_resolution,
        config.max_candidate_actions,
        rng,
    );
    let mut targets = ValueTargets::new(
        Arc::clone(&shared.buffer),
        Arc::clone(&shared.value),
        Arc::new(candidates),
        config.gamma,
    );
    targets.set_epoch(epoch);
    targets
}
