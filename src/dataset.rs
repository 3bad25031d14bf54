//! Two-column training set produced by the dataset builders.
//!
//! Samples are stored raw. [`Dataset::fit_normalization`] records the
//! mean/variance parameters of both columns; optimizers read the normalized
//! matrices and hand the same [`Preprocess`] to the estimator on import.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TandemError};
use crate::normalization::{MeanVariance, Preprocess};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    input_dim: usize,
    target_dim: usize,
    inputs: Vec<Array1<f32>>,
    targets: Vec<Array1<f32>>,
    preprocess: Preprocess,
}

impl Dataset {
    /// `target_dim == 0` makes an input-only dataset.
    pub fn new(input_dim: usize, target_dim: usize) -> Self {
        Dataset {
            input_dim,
            target_dim,
            inputs: Vec::new(),
            targets: Vec::new(),
            preprocess: Preprocess::identity(),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    pub fn has_targets(&self) -> bool {
        self.target_dim > 0
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Add one row. Input-only datasets take `None`; the two columns stay aligned.
    pub fn push(&mut self, input: Array1<f32>, target: Option<Array1<f32>>) -> Result<()> {
        if input.len() != self.input_dim {
            return Err(TandemError::dimension_mismatch(
                format!("{} inputs", self.input_dim),
                format!("{} inputs", input.len()),
            ));
        }
        match (self.has_targets(), target) {
            (true, Some(target)) if target.len() == self.target_dim => {
                self.inputs.push(input);
                self.targets.push(target);
                Ok(())
            }
            (true, Some(target)) => Err(TandemError::dimension_mismatch(
                format!("{} targets", self.target_dim),
                format!("{} targets", target.len()),
            )),
            (true, None) => Err(TandemError::invalid_parameter("target", "dataset requires a target column")),
            (false, Some(_)) => Err(TandemError::invalid_parameter("target", "dataset has no target column")),
            (false, None) => {
                self.inputs.push(input);
                Ok(())
            }
        }
    }

    pub fn input(&self, index: usize) -> Option<ArrayView1<f32>> {
        self.inputs.get(index).map(|x| x.view())
    }

    pub fn target(&self, index: usize) -> Option<ArrayView1<f32>> {
        self.targets.get(index).map(|y| y.view())
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
        self.targets.clear();
        self.preprocess = Preprocess::identity();
    }

    pub fn preprocess(&self) -> &Preprocess {
        &self.preprocess
    }

    /// Fit mean/variance normalization to both columns.
    pub fn fit_normalization(&mut self) -> Result<()> {
        let input = MeanVariance::fit(self.raw_inputs().view())?;
        let output = if self.has_targets() {
            Some(MeanVariance::fit(self.raw_targets().view())?)
        } else {
            None
        };
        self.preprocess = Preprocess { input: Some(input), output };
        Ok(())
    }

    pub fn raw_inputs(&self) -> Array2<f32> {
        stack_rows(&self.inputs, self.input_dim)
    }

    pub fn raw_targets(&self) -> Array2<f32> {
        stack_rows(&self.targets, self.target_dim)
    }

    pub fn normalized_inputs(&self) -> Array2<f32> {
        self.preprocess.normalize_inputs(self.raw_inputs().view())
    }

    pub fn normalized_targets(&self) -> Array2<f32> {
        self.preprocess.normalize_outputs(self.raw_targets().view())
    }
}

fn stack_rows(rows: &[Array1<f32>], dim: usize) -> Array2<f32> {
    let mut matrix = Array2::zeros((rows.len(), dim));
    for (mut row, source) in matrix.rows_mut().into_iter().zip(rows) {
        row.assign(source);
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_columns_stay_aligned() {
        let mut data = Dataset::new(2, 1);
        data.push(array![1.0, 2.0], Some(array![3.0])).unwrap();
        assert!(data.push(array![1.0, 2.0], None).is_err());
        assert!(data.push(array![1.0], Some(array![3.0])).is_err());
        assert_eq!(data.len(), 1);
        assert_eq!(data.raw_targets(), array![[3.0]]);
    }

    #[test]
    fn test_input_only_dataset() {
        let mut data = Dataset::new(1, 0);
        data.push(array![1.0], None).unwrap();
        data.push(array![3.0], None).unwrap();
        data.fit_normalization().unwrap();
        assert!(data.preprocess().output.is_none());
        assert_eq!(data.normalized_inputs(), array![[-1.0], [1.0]]);
    }

    #[test]
    fn test_normalization_keeps_raw_values() {
        let mut data = Dataset::new(1, 1);
        for i in 0..4 {
            data.push(array![i as f32], Some(array![10.0 * i as f32])).unwrap();
        }
        data.fit_normalization().unwrap();
        assert_eq!(data.target(3).unwrap()[0], 30.0);
        assert!(data.normalized_targets().column(0).mean().unwrap().abs() < 1e-6);
    }
}
