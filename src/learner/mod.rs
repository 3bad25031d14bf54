//! # Actor/learner coordinator
//!
//! [`ActorLearner`] owns the experience buffer, the two estimators and a
//! single control-loop thread. Each tick the loop observes the environment,
//! picks an action (policy or exploration), executes it, records the
//! transition and, once enough experience exists, advances the background
//! value and policy training under the epoch gating of [`EpochCounters`].
//!
//! The loop never waits for training: dataset builders and optimizers run on
//! their own threads and are polled once per tick.
//!
//! ```rust,no_run
//! use tandem::config::LearnerConfig;
//! use tandem::environments::CartPole;
//! use tandem::learner::ActorLearner;
//!
//! let mut learner = ActorLearner::new(LearnerConfig::new(4, 1), CartPole::new())?;
//! learner.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(60));
//! learner.stop()?;
//! learner.save("cartpole")?;
//! # Ok::<(), tandem::error::TandemError>(())
//! ```

mod control_loop;
mod epochs;
mod persistence;

pub use epochs::EpochCounters;
pub use persistence::ArtifactPaths;

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};

use crate::config::LearnerConfig;
use crate::dataset::Dataset;
use crate::environment::Environment;
use crate::error::{Result, TandemError};
use crate::estimator::{PolicyEstimator, ValueEstimator};
use crate::network::NeuralNetwork;
use crate::replay_buffer::ExperienceBuffer;
use crate::training::{AsyncOptimizer, PolicyGradAscent, PolicyProblem, ValueGradDescent};

use control_loop::ControlLoop;

pub(crate) const VALUE: usize = 0;
pub(crate) const POLICY: usize = 1;

/// Log and abort. Used when an optimizer hands back corrupted numbers.
pub(crate) fn fatal(message: String) -> ! {
    log::error!("{}", message);
    std::process::abort()
}

#[derive(Default)]
pub(crate) struct StatisticsCounters {
    pub(crate) ticks: AtomicU64,
    pub(crate) environment_failures: AtomicU64,
    pub(crate) transitions_recorded: AtomicU64,
    pub(crate) value_imports: AtomicU64,
    pub(crate) policy_imports: AtomicU64,
}

/// Snapshot of the learner's counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerStatistics {
    pub ticks: u64,
    pub environment_failures: u64,
    pub transitions_recorded: u64,
    pub value_imports: u64,
    pub policy_imports: u64,
    pub q_epoch: u32,
    pub policy_epoch: u32,
    pub has_model: u32,
    pub buffer_len: usize,
}

/// State shared between the caller and the loop thread.
pub(crate) struct LearnerShared {
    pub(crate) config: LearnerConfig,
    pub(crate) value: Arc<ValueEstimator>,
    pub(crate) policy: Arc<PolicyEstimator>,
    pub(crate) buffer: Arc<ExperienceBuffer>,
    pub(crate) running: AtomicBool,
    pub(crate) learning_mode: AtomicBool,
    pub(crate) has_model: [AtomicU32; 2],
    pub(crate) stats: StatisticsCounters,
    epsilon: AtomicU32,
    epochs: [AtomicU32; 2],
}

impl LearnerShared {
    pub(crate) fn epsilon(&self) -> f32 {
        f32::from_bits(self.epsilon.load(Ordering::SeqCst))
    }

    /// The smaller of the two per-estimator model counters.
    pub(crate) fn has_model(&self) -> u32 {
        self.has_model[VALUE]
            .load(Ordering::SeqCst)
            .min(self.has_model[POLICY].load(Ordering::SeqCst))
    }

    pub(crate) fn publish_epochs(&self, epochs: EpochCounters) {
        self.epochs[VALUE].store(epochs.q_epoch, Ordering::SeqCst);
        self.epochs[POLICY].store(epochs.policy_epoch, Ordering::SeqCst);
    }

    fn epochs(&self) -> EpochCounters {
        EpochCounters {
            q_epoch: self.epochs[VALUE].load(Ordering::SeqCst),
            policy_epoch: self.epochs[POLICY].load(Ordering::SeqCst),
        }
    }
}

pub struct ActorLearner<E, VO = ValueGradDescent, PO = PolicyGradAscent>
where
    E: Environment,
    VO: AsyncOptimizer<Model = NeuralNetwork, Problem = Dataset>,
    PO: AsyncOptimizer<Model = NeuralNetwork, Problem = PolicyProblem>,
{
    shared: Arc<LearnerShared>,
    idle: Option<ControlLoop<E, VO, PO>>,
    handle: Option<JoinHandle<ControlLoop<E, VO, PO>>>,
}

impl<E: Environment> ActorLearner<E> {
    /// Learner with the built-in optimizers configured from `config`.
    pub fn new(config: LearnerConfig, environment: E) -> Result<Self> {
        let value_optimizer = ValueGradDescent::new(config.value_optimizer.clone());
        let policy_optimizer = PolicyGradAscent::new(config.policy_optimizer.clone());
        Self::with_optimizers(config, environment, value_optimizer, policy_optimizer)
    }
}

impl<E, VO, PO> ActorLearner<E, VO, PO>
where
    E: Environment,
    VO: AsyncOptimizer<Model = NeuralNetwork, Problem = Dataset>,
    PO: AsyncOptimizer<Model = NeuralNetwork, Problem = PolicyProblem>,
{
    pub fn with_optimizers(config: LearnerConfig, environment: E, value_optimizer: VO, policy_optimizer: PO) -> Result<Self> {
        config.validate()?;
        if environment.state_dim() != config.state_dim || environment.action_dim() != config.action_dim {
            return Err(TandemError::dimension_mismatch(
                format!("environment with state {} / action {}", config.state_dim, config.action_dim),
                format!("state {} / action {}", environment.state_dim(), environment.action_dim()),
            ));
        }

        let value = ValueEstimator::with_architecture(config.state_dim, config.action_dim, config.hidden_width_factor)?;
        let policy = PolicyEstimator::with_architecture(config.state_dim, config.action_dim, config.hidden_width_factor)?;
        let buffer = ExperienceBuffer::new(config.buffer_capacity)?;

        let shared = Arc::new(LearnerShared {
            value: Arc::new(value),
            policy: Arc::new(policy),
            buffer: Arc::new(buffer),
            running: AtomicBool::new(false),
            learning_mode: AtomicBool::new(config.learning_mode),
            has_model: [AtomicU32::new(0), AtomicU32::new(0)],
            stats: StatisticsCounters::default(),
            epsilon: AtomicU32::new(config.epsilon.to_bits()),
            epochs: [AtomicU32::new(0), AtomicU32::new(0)],
            config,
        });
        let control = ControlLoop::new(Arc::clone(&shared), environment, value_optimizer, policy_optimizer);

        Ok(ActorLearner { shared, idle: Some(control), handle: None })
    }

    /// Spawn the control loop thread.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(TandemError::AlreadyRunning("actor/learner loop".to_string()));
        }
        let control = self.take_idle()?;

        self.shared.running.store(true, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name("actor-learner".to_string())
            .spawn(move || control.run());
        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(TandemError::Io(format!("cannot spawn control loop: {}", e)))
            }
        }
    }

    /// Stop the loop and all background training, waiting for them to exit.
    /// Stopping an idle learner is a no-op.
    pub fn stop(&mut self) -> Result<()> {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(control) => self.idle = Some(control),
                Err(_) => {
                    log::error!("control loop thread panicked");
                    return Err(TandemError::ThreadPanicked("actor/learner loop".to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some() && self.shared.running.load(Ordering::SeqCst)
    }

    /// Run one tick on the calling thread. Only allowed while stopped.
    pub fn tick(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(TandemError::AlreadyRunning("actor/learner loop".to_string()));
        }
        let control = self.idle.as_mut().ok_or_else(lost_loop)?;
        control.tick();
        Ok(())
    }

    /// Probability of using the policy action once both estimators have a model.
    pub fn set_epsilon(&self, epsilon: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&epsilon) {
            log::warn!("rejected epsilon {} outside [0, 1]", epsilon);
            return Err(TandemError::invalid_parameter("epsilon".to_string(), format!("{} is outside [0, 1]", epsilon)));
        }
        self.shared.epsilon.store(epsilon.to_bits(), Ordering::SeqCst);
        Ok(())
    }

    pub fn epsilon(&self) -> f32 {
        self.shared.epsilon()
    }

    /// In inference-only mode transitions are not recorded and nothing trains.
    pub fn set_learning_mode(&self, learning: bool) {
        self.shared.learning_mode.store(learning, Ordering::SeqCst);
    }

    pub fn learning_mode(&self) -> bool {
        self.shared.learning_mode.load(Ordering::SeqCst)
    }

    /// Number of models imported, the smaller of the two estimators' counts.
    pub fn has_model(&self) -> u32 {
        self.shared.has_model()
    }

    /// Override both model counters, e.g. after loading trained estimators.
    pub fn set_has_model(&self, count: u32) {
        for counter in &self.shared.has_model {
            counter.store(count, Ordering::SeqCst);
        }
    }

    pub fn epochs(&self) -> EpochCounters {
        self.shared.epochs()
    }

    pub fn statistics(&self) -> LearnerStatistics {
        let stats = &self.shared.stats;
        let epochs = self.shared.epochs();
        LearnerStatistics {
            ticks: stats.ticks.load(Ordering::Relaxed),
            environment_failures: stats.environment_failures.load(Ordering::Relaxed),
            transitions_recorded: stats.transitions_recorded.load(Ordering::Relaxed),
            value_imports: stats.value_imports.load(Ordering::Relaxed),
            policy_imports: stats.policy_imports.load(Ordering::Relaxed),
            q_epoch: epochs.q_epoch,
            policy_epoch: epochs.policy_epoch,
            has_model: self.shared.has_model(),
            buffer_len: self.shared.buffer.len(),
        }
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.shared.config
    }

    pub fn value_estimator(&self) -> &Arc<ValueEstimator> {
        &self.shared.value
    }

    pub fn policy_estimator(&self) -> &Arc<PolicyEstimator> {
        &self.shared.policy
    }

    pub fn buffer(&self) -> &Arc<ExperienceBuffer> {
        &self.shared.buffer
    }

    /// Access the environment while the loop is stopped.
    pub fn with_environment<R, F: FnOnce(&mut E) -> R>(&mut self, f: F) -> Result<R> {
        if self.handle.is_some() {
            return Err(TandemError::AlreadyRunning("actor/learner loop".to_string()));
        }
        let control = self.idle.as_mut().ok_or_else(lost_loop)?;
        Ok(f(control.environment_mut()))
    }

    /// Write the four artifacts `<prefix>-q`, `<prefix>-policy`,
    /// `<prefix>-q-preprocess` and `<prefix>-policy-preprocess`.
    pub fn save<P: AsRef<Path>>(&self, prefix: P) -> Result<()> {
        persistence::save_all(&self.shared.value, &self.shared.policy, prefix.as_ref()).map_err(|e| {
            log::warn!("saving {} failed: {}", prefix.as_ref().display(), e);
            e
        })
    }

    /// Replace both estimators from the four artifacts. Nothing changes unless all four load.
    pub fn load<P: AsRef<Path>>(&self, prefix: P) -> Result<()> {
        persistence::load_all(&self.shared.value, &self.shared.policy, prefix.as_ref()).map_err(|e| {
            log::warn!("loading {} failed: {}", prefix.as_ref().display(), e);
            e
        })
    }

    fn take_idle(&mut self) -> Result<ControlLoop<E, VO, PO>> {
        self.idle.take().ok_or_else(lost_loop)
    }
}

fn lost_loop() -> TandemError {
    TandemError::ThreadPanicked("actor/learner loop".to_string())
}

impl<E, VO, PO> Drop for ActorLearner<E, VO, PO>
where
    E: Environment,
    VO: AsyncOptimizer<Model = NeuralNetwork, Problem = Dataset>,
    PO: AsyncOptimizer<Model = NeuralNetwork, Problem = PolicyProblem>,
{
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("stopping on drop failed: {}", e);
        }
    }
}
