//! Per-feature standardization
//!
//! Zero-mean/unit-variance scaling fitted over a training matrix and applied
//! to every vector the anomaly model sees. The fitted parameters are part of
//! the persisted model state.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Columns with (near-)zero spread are passed through unscaled
const MIN_STD: f64 = 1e-10;

/// Fitted zero-mean/unit-variance feature scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    std_devs: Vec<f64>,
}

impl StandardScaler {
    /// Fit a scaler over the rows of `matrix`.
    ///
    /// Every row must carry the same number of columns; the population
    /// standard deviation is used.
    pub fn fit(matrix: &[Vec<f64>]) -> Result<Self, ModelError> {
        let n_rows = matrix.len();
        if n_rows == 0 {
            return Err(ModelError::Training {
                reason: "cannot fit scaler on an empty matrix".to_string(),
            });
        }

        let n_cols = matrix[0].len();
        if matrix.iter().any(|row| row.len() != n_cols) {
            return Err(ModelError::Training {
                reason: "ragged feature matrix".to_string(),
            });
        }

        let mut means = vec![0.0; n_cols];
        for row in matrix {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= n_rows as f64;
        }

        let mut std_devs = vec![0.0; n_cols];
        for row in matrix {
            for ((variance, value), mean) in std_devs.iter_mut().zip(row).zip(&means) {
                let delta = value - mean;
                *variance += delta * delta;
            }
        }
        for variance in &mut std_devs {
            *variance = (*variance / n_rows as f64).sqrt();
        }

        Ok(Self { means, std_devs })
    }

    /// Number of feature columns the scaler was fitted over
    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    /// Mean of each feature column
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    /// Standard deviation of each feature column
    pub fn std_devs(&self) -> &[f64] {
        &self.std_devs
    }

    /// Standardize one feature vector
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.means)
            .zip(&self.std_devs)
            .map(|((value, mean), std_dev)| {
                if *std_dev > MIN_STD {
                    (value - mean) / std_dev
                } else {
                    value - mean
                }
            })
            .collect()
    }

    /// Standardize a whole matrix
    pub fn transform(&self, matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
        matrix.iter().map(|row| self.transform_row(row)).collect()
    }
}
