//! Z-score scaling used inside the kernel and network models.
//!
//! ```text
//! z = (x - u) / s
//! ```
//! Columns with zero variance keep `s = 1` so they map to zero instead of NaN.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

const MIN_SCALE: f64 = 1e-12;

fn safe_scale(s: f64) -> f64 {
    if s.is_finite() && s > MIN_SCALE {
        s
    } else {
        1.0
    }
}

/// Per-column mean and population standard deviation of a feature matrix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    pub fn fit(x: &Array2<f64>) -> Self {
        let cols = x.ncols();
        if x.nrows() == 0 {
            return Self {
                mean: Array1::zeros(cols),
                scale: Array1::ones(cols),
            };
        }
        let mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(cols));
        let scale = x.std_axis(Axis(0), 0.0).mapv(safe_scale);
        Self { mean, scale }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }

    pub fn transform_row(&self, x: ArrayView1<'_, f64>) -> Array1<f64> {
        (&x - &self.mean) / &self.scale
    }
}

/// Mean and standard deviation of the target column.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetScaler {
    mean: f64,
    scale: f64,
}

impl TargetScaler {
    pub fn fit(y: &Array1<f64>) -> Self {
        let mean = y.mean().unwrap_or(0.0);
        let scale = if y.is_empty() { 1.0 } else { y.std(0.0) };
        Self {
            mean,
            scale: safe_scale(scale),
        }
    }

    pub fn transform(&self, y: &Array1<f64>) -> Array1<f64> {
        y.mapv(|v| (v - self.mean) / self.scale)
    }

    pub fn inverse(&self, z: f64) -> f64 {
        z * self.scale + self.mean
    }
}
