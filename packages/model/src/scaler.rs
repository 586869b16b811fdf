//! Per-feature standardization fitted on the training matrix.

use serde::{Deserialize, Serialize};

/// Fitted per-feature mean/standard-deviation transform.
///
/// Fit once on the training matrix and frozen into the bundle; inference
/// applies the identical transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fits means and standard deviations column-wise. Constant columns get
    /// a standard deviation of 1.0 so they pass through unscaled.
    #[must_use]
    pub fn fit(matrix: &[Vec<f64>]) -> Self {
        let rows = matrix.len();
        let cols = matrix.first().map_or(0, Vec::len);
        let n = rows.max(1) as f64;

        let mut means = vec![0.0_f64; cols];
        for row in matrix {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut stds = vec![0.0_f64; cols];
        for row in matrix {
            for ((std, value), mean) in stds.iter_mut().zip(row).zip(&means) {
                let d = value - mean;
                *std += d * d;
            }
        }
        for std in &mut stds {
            *std = (*std / n).sqrt();
            if *std == 0.0 {
                *std = 1.0;
            }
        }

        Self { means, stds }
    }

    /// Standardizes one feature vector.
    #[must_use]
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.means)
            .zip(&self.stds)
            .map(|((value, mean), std)| (value - mean) / std)
            .collect()
    }

    /// Number of features the scaler was fitted on.
    #[must_use]
    pub fn len(&self) -> usize {
        self.means.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardizes_to_zero_mean_unit_variance() {
        let matrix = vec![vec![1.0, 10.0], vec![3.0, 10.0], vec![5.0, 10.0]];
        let scaler = StandardScaler::fit(&matrix);

        let transformed: Vec<Vec<f64>> = matrix.iter().map(|r| scaler.transform(r)).collect();
        let mean_0: f64 = transformed.iter().map(|r| r[0]).sum::<f64>() / 3.0;
        assert!(mean_0.abs() < 1e-12);
        // Constant column passes through centered but unscaled.
        assert_eq!(transformed[0][1], 0.0);
    }

    #[test]
    fn transform_is_deterministic() {
        let scaler = StandardScaler::fit(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(scaler.transform(&[2.0, 3.0]), scaler.transform(&[2.0, 3.0]));
    }
}
