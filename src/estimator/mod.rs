//! # Estimators
//!
//! An estimator is a trainable model plus the normalization of its inputs and
//! outputs, guarded by one lock. Readers (`calculate`) and writers
//! (`import`, `load`) take the same `RwLock`, so a concurrent evaluation sees
//! either the old or the new parameter set in full, never a mix.
//!
//! The model itself is anything implementing [`TrainableModel`]; the
//! [`NeuralNetwork`](crate::network::NeuralNetwork) is the default.
//!
//! - [`ValueEstimator`]: `Q(state, action)`, maximized over candidate actions
//!   for bootstrapped targets.
//! - [`PolicyEstimator`]: `state -> action`, clipped to `[-1, 1]`.

mod policy;
mod value;

pub use policy::PolicyEstimator;
pub use value::ValueEstimator;

use std::path::Path;

use ndarray::{Array1, ArrayView1};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, TandemError};
use crate::normalization::Preprocess;

/// Output of one model evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub output: Array1<f32>,
    /// Per-output uncertainty when the model family provides one.
    pub uncertainty: Option<Array1<f32>>,
}

impl Prediction {
    pub fn exact(output: Array1<f32>) -> Self {
        Prediction { output, uncertainty: None }
    }
}

/// Capability every estimator model provides.
pub trait TrainableModel: Clone + Send + Sync + 'static {
    fn input_size(&self) -> usize;
    fn output_size(&self) -> usize;
    fn calculate(&self, input: ArrayView1<f32>) -> Result<Prediction>;
    fn import_parameters(&mut self, parameters: &[f32]) -> Result<()>;
    fn export_parameters(&self) -> Vec<f32>;
    fn save(&self, path: &Path) -> Result<()>;
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// A consistent copy of an estimator's model and normalization.
#[derive(Clone, Debug)]
pub struct EstimatorSnapshot<M> {
    pub model: M,
    pub preprocess: Preprocess,
}

pub(crate) struct EstimatorState<M> {
    pub(crate) model: M,
    pub(crate) preprocess: Preprocess,
}

pub struct Estimator<M: TrainableModel> {
    name: &'static str,
    input_dim: usize,
    output_dim: usize,
    state: RwLock<EstimatorState<M>>,
}

impl<M: TrainableModel> Estimator<M> {
    pub fn new(name: &'static str, model: M) -> Self {
        Estimator {
            name,
            input_dim: model.input_size(),
            output_dim: model.output_size(),
            state: RwLock::new(EstimatorState { model, preprocess: Preprocess::identity() }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Normalize `input`, evaluate, and map the output back to raw units.
    ///
    /// A model output of the wrong size is replaced by zeros of the expected size.
    pub fn predict(&self, input: ArrayView1<f32>) -> Result<Prediction> {
        let state = self.state.read();
        self.predict_with(&state, input)
    }

    /// `predict` against state the caller already holds a guard on.
    pub(crate) fn predict_with(&self, state: &EstimatorState<M>, input: ArrayView1<f32>) -> Result<Prediction> {
        if input.len() != self.input_dim {
            return Err(TandemError::dimension_mismatch(
                format!("{} inputs to {}", self.input_dim, self.name),
                format!("{} inputs", input.len()),
            ));
        }

        let mut x = input.to_owned();
        state.preprocess.preprocess_input(&mut x)?;
        let mut prediction = state.model.calculate(x.view())?;

        if prediction.output.len() != self.output_dim {
            log::debug!(
                "{}: model produced {} outputs, expected {}; using zeros",
                self.name,
                prediction.output.len(),
                self.output_dim
            );
            return Ok(Prediction::exact(Array1::zeros(self.output_dim)));
        }
        state.preprocess.invpreprocess_output(&mut prediction.output)?;
        if let (Some(uncertainty), Some(mv)) = (prediction.uncertainty.as_mut(), state.preprocess.output.as_ref()) {
            if uncertainty.len() == mv.std.len() {
                *uncertainty *= &mv.std;
            }
        }
        Ok(prediction)
    }

    pub fn calculate(&self, input: ArrayView1<f32>) -> Result<Array1<f32>> {
        self.predict(input).map(|p| p.output)
    }

    /// Replace model and normalization together.
    pub fn import(&self, model: M, preprocess: Preprocess) -> Result<()> {
        self.check_model(&model)?;
        check_preprocess(&preprocess, self.input_dim, self.output_dim)?;
        let mut state = self.state.write();
        state.model = model;
        state.preprocess = preprocess;
        Ok(())
    }

    pub fn import_parameters(&self, parameters: &[f32]) -> Result<()> {
        self.state.write().model.import_parameters(parameters)
    }

    pub fn export_parameters(&self) -> Vec<f32> {
        self.state.read().model.export_parameters()
    }

    pub fn snapshot(&self) -> EstimatorSnapshot<M> {
        let state = self.state.read();
        EstimatorSnapshot { model: state.model.clone(), preprocess: state.preprocess.clone() }
    }

    pub fn preprocess(&self) -> Preprocess {
        self.state.read().preprocess.clone()
    }

    /// Write the model to `model_path` and the normalization to `preprocess_path`.
    pub fn save(&self, model_path: &Path, preprocess_path: &Path) -> Result<()> {
        let state = self.state.read();
        save_state(&state, model_path, preprocess_path)
    }

    /// Load both artifacts; the estimator is only modified if both succeed.
    pub fn load(&self, model_path: &Path, preprocess_path: &Path) -> Result<()> {
        let mut state = self.state.write();
        let loaded = self.read_artifacts(&state, model_path, preprocess_path)?;
        *state = loaded;
        Ok(())
    }

    pub(crate) fn read_state(&self) -> RwLockReadGuard<'_, EstimatorState<M>> {
        self.state.read()
    }

    pub(crate) fn write_state(&self) -> RwLockWriteGuard<'_, EstimatorState<M>> {
        self.state.write()
    }

    pub(crate) fn read_artifacts(
        &self,
        current: &EstimatorState<M>,
        model_path: &Path,
        preprocess_path: &Path,
    ) -> Result<EstimatorState<M>> {
        let mut model = current.model.clone();
        model
            .load(model_path)
            .map_err(|e| TandemError::persistence(model_path.display().to_string(), e.to_string()))?;
        self.check_model(&model)
            .map_err(|e| TandemError::persistence(model_path.display().to_string(), e.to_string()))?;

        let preprocess = Preprocess::load(preprocess_path)
            .and_then(|p| check_preprocess(&p, self.input_dim, self.output_dim).map(|_| p))
            .map_err(|e| TandemError::persistence(preprocess_path.display().to_string(), e.to_string()))?;

        Ok(EstimatorState { model, preprocess })
    }

    fn check_model(&self, model: &M) -> Result<()> {
        if model.input_size() != self.input_dim || model.output_size() != self.output_dim {
            return Err(TandemError::dimension_mismatch(
                format!("{} model {}->{}", self.name, self.input_dim, self.output_dim),
                format!("{}->{}", model.input_size(), model.output_size()),
            ));
        }
        Ok(())
    }
}

pub(crate) fn save_state<M: TrainableModel>(
    state: &EstimatorState<M>,
    model_path: &Path,
    preprocess_path: &Path,
) -> Result<()> {
    state
        .model
        .save(model_path)
        .map_err(|e| TandemError::persistence(model_path.display().to_string(), e.to_string()))?;
    state
        .preprocess
        .save(preprocess_path)
        .map_err(|e| TandemError::persistence(preprocess_path.display().to_string(), e.to_string()))
}

fn check_preprocess(preprocess: &Preprocess, input_dim: usize, output_dim: usize) -> Result<()> {
    if let Some(mv) = &preprocess.input {
        if mv.dim() != input_dim {
            return Err(TandemError::dimension_mismatch(
                format!("{} normalized inputs", input_dim),
                format!("{}", mv.dim()),
            ));
        }
    }
    if let Some(mv) = &preprocess.output {
        if mv.dim() != output_dim {
            return Err(TandemError::dimension_mismatch(
                format!("{} normalized outputs", output_dim),
                format!("{}", mv.dim()),
            ));
        }
    }
    Ok(())
}
