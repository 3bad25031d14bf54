//! Mean/variance normalization of estimator inputs and outputs.
//!
//! Every estimator carries a [`Preprocess`]: inputs are standardized before
//! they reach the model and model outputs are mapped back to raw units. A
//! missing column transform means identity, which is what a freshly
//! constructed estimator uses.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TandemError};

/// Standard deviations below this are treated as 1 so constant columns pass through centered.
pub const MIN_STD: f32 = 1e-6;

/// Per-dimension mean and standard deviation of one dataset column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeanVariance {
    pub mean: Array1<f32>,
    pub std: Array1<f32>,
}

impl MeanVariance {
    /// Fit to the rows of `samples`.
    pub fn fit(samples: ArrayView2<f32>) -> Result<Self> {
        if samples.nrows() == 0 {
            return Err(TandemError::EmptyBuffer("cannot fit normalization to zero samples".to_string()));
        }
        let mean = samples
            .mean_axis(Axis(0))
            .ok_or_else(|| TandemError::EmptyBuffer("cannot fit normalization to zero samples".to_string()))?;
        let std = samples
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > MIN_STD { s } else { 1.0 });
        Ok(MeanVariance { mean, std })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn apply(&self, mut x: ArrayViewMut1<f32>) {
        ndarray::Zip::from(&mut x)
            .and(&self.mean)
            .and(&self.std)
            .for_each(|v, &m, &s| *v = (*v - m) / s);
    }

    pub fn invert(&self, mut x: ArrayViewMut1<f32>) {
        ndarray::Zip::from(&mut x)
            .and(&self.mean)
            .and(&self.std)
            .for_each(|v, &m, &s| *v = *v * s + m);
    }

    pub fn apply_rows(&self, samples: ArrayView2<f32>) -> Array2<f32> {
        (&samples - &self.mean.view().insert_axis(Axis(0))) / &self.std.view().insert_axis(Axis(0))
    }
}

/// Input and output normalization of one estimator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Preprocess {
    pub input: Option<MeanVariance>,
    pub output: Option<MeanVariance>,
}

impl Preprocess {
    pub fn identity() -> Self {
        Preprocess::default()
    }

    pub fn preprocess_input(&self, x: &mut Array1<f32>) -> Result<()> {
        if let Some(mv) = &self.input {
            check_dim("input normalization", mv.dim(), x.len())?;
            mv.apply(x.view_mut());
        }
        Ok(())
    }

    pub fn preprocess_output(&self, y: &mut Array1<f32>) -> Result<()> {
        if let Some(mv) = &self.output {
            check_dim("output normalization", mv.dim(), y.len())?;
            mv.apply(y.view_mut());
        }
        Ok(())
    }

    pub fn invpreprocess_output(&self, y: &mut Array1<f32>) -> Result<()> {
        if let Some(mv) = &self.output {
            check_dim("output normalization", mv.dim(), y.len())?;
            mv.invert(y.view_mut());
        }
        Ok(())
    }

    /// Multiplier d(raw input)/d(normalized input) per input dimension.
    pub fn input_scale(&self, dim: usize) -> Array1<f32> {
        match &self.input {
            Some(mv) => mv.std.clone(),
            None => Array1::ones(dim),
        }
    }

    /// Multiplier d(raw output)/d(model output) per output dimension.
    pub fn output_scale(&self, dim: usize) -> Array1<f32> {
        match &self.output {
            Some(mv) => mv.std.clone(),
            None => Array1::ones(dim),
        }
    }

    pub fn normalize_inputs(&self, samples: ArrayView2<f32>) -> Array2<f32> {
        match &self.input {
            Some(mv) => mv.apply_rows(samples),
            None => samples.to_owned(),
        }
    }

    pub fn normalize_outputs(&self, samples: ArrayView2<f32>) -> Array2<f32> {
        match &self.output {
            Some(mv) => mv.apply_rows(samples),
            None => samples.to_owned(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, bincode::serialize(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(bincode::deserialize(&data)?)
    }
}

fn check_dim(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(TandemError::dimension_mismatch(
            format!("{} of {} values", what, expected),
            format!("{} values", actual),
        ));
    }
    Ok(())
}
