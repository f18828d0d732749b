//! Epsilon-insensitive support-vector regression.
//!
//! The dual problem is solved by cyclic coordinate descent with the bias
//! folded into the kernel (`k'(a, b) = k(a, b) + 1`):
//!
//! ```text
//! min_b  ½ bᵀK'b − yᵀb + ε Σ|b_i|     s.t.  −C <= b_i <= C
//! f(x) = Σ b_i k'(x_i, x)
//! ```
//!
//! Features and target are standardized before solving, so `C` and `ε` are
//! expressed in units of the target's standard deviation.

use super::scaling::{Standardizer, TargetScaler};
use super::state::{Fitted, Unfitted};
use super::{check_training_data, InferenceModel, Kernel};
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

/// Coefficients below this magnitude are not kept as support vectors.
const SUPPORT_EPS: f64 = 1e-12;

/// Hyperparameters of an [`SvrRegressor`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SvrConfig {
    pub kernel: Kernel,
    /// Box constraint on the dual coefficients.
    pub c: f64,
    /// Half-width of the zero-loss tube.
    pub epsilon: f64,
    /// Upper bound on full passes over the coefficients.
    pub max_iter: usize,
    /// Stop once no coefficient moves more than this in a pass.
    pub tol: f64,
}

impl Default for SvrConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::Rbf,
            c: 1.0,
            epsilon: 0.1,
            max_iter: 1000,
            tol: 1e-4,
        }
    }
}

impl SvrConfig {
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
enum KernelFn {
    Linear,
    Rbf { gamma: f64 },
}

impl KernelFn {
    fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        let k = match self {
            KernelFn::Linear => a.dot(&b),
            KernelFn::Rbf { gamma } => {
                let sq: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum();
                (-gamma * sq).exp()
            }
        };
        k + 1.0
    }
}

/// Support-vector regressor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SvrRegressor<S = Unfitted> {
    config: SvrConfig,
    kernel: Option<KernelFn>,
    support_vectors: Array2<f64>,
    coefficients: Array1<f64>,
    x_scaler: Option<Standardizer>,
    y_scaler: Option<TargetScaler>,
    n_features: usize,
    _state: PhantomData<S>,
}

impl Default for SvrRegressor<Unfitted> {
    fn default() -> Self {
        Self::new(SvrConfig::default())
    }
}

impl SvrRegressor<Unfitted> {
    pub fn new(config: SvrConfig) -> Self {
        Self {
            config,
            kernel: None,
            support_vectors: Array2::zeros((0, 0)),
            coefficients: Array1::zeros(0),
            x_scaler: None,
            y_scaler: None,
            n_features: 0,
            _state: PhantomData,
        }
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SvrRegressor<Fitted>> {
        check_training_data("SvrRegressor", x, y)?;

        let x_scaler = Standardizer::fit(x);
        let y_scaler = TargetScaler::fit(y);
        let xs = x_scaler.transform(x);
        let ys = y_scaler.transform(y);

        let kernel = match self.config.kernel {
            Kernel::Linear => KernelFn::Linear,
            Kernel::Rbf => KernelFn::Rbf {
                gamma: scale_gamma(&xs),
            },
        };

        let beta = solve_dual(&kernel, &xs, &ys, &self.config);
        let support: Vec<usize> = beta
            .iter()
            .enumerate()
            .filter(|(_, b)| b.abs() > SUPPORT_EPS)
            .map(|(i, _)| i)
            .collect();
        debug!(
            "SVR kernel={} C={} fitted with {}/{} support vectors",
            self.config.kernel,
            self.config.c,
            support.len(),
            x.nrows()
        );

        Ok(SvrRegressor {
            config: self.config,
            kernel: Some(kernel),
            support_vectors: xs.select(Axis(0), &support),
            coefficients: beta.select(Axis(0), &support),
            x_scaler: Some(x_scaler),
            y_scaler: Some(y_scaler),
            n_features: x.ncols(),
            _state: PhantomData,
        })
    }
}

impl<S> SvrRegressor<S> {
    pub fn config(&self) -> &SvrConfig {
        &self.config
    }
}

impl SvrRegressor<Fitted> {
    pub fn n_support(&self) -> usize {
        self.coefficients.len()
    }
}

impl InferenceModel for SvrRegressor<Fitted> {
    fn predict(&self, x: ArrayView1<'_, f64>) -> f64 {
        let (Some(kernel), Some(x_scaler), Some(y_scaler)) =
            (&self.kernel, &self.x_scaler, &self.y_scaler)
        else {
            return f64::NAN;
        };
        let z = x_scaler.transform_row(x);
        let f: f64 = self
            .support_vectors
            .rows()
            .into_iter()
            .zip(self.coefficients.iter())
            .map(|(sv, b)| b * kernel.eval(sv, z.view()))
            .sum();
        y_scaler.inverse(f)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

/// `1 / (n_features * Var(X))` over all entries of the scaled matrix.
fn scale_gamma(xs: &Array2<f64>) -> f64 {
    let var = if xs.is_empty() { 0.0 } else { xs.var(0.0) };
    let denom = xs.ncols() as f64 * var;
    if denom > 0.0 && denom.is_finite() {
        1.0 / denom
    } else {
        1.0
    }
}

fn solve_dual(kernel: &KernelFn, xs: &Array2<f64>, ys: &Array1<f64>, config: &SvrConfig) -> Array1<f64> {
    let n = xs.nrows();
    let mut gram = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in i..n {
            let k = kernel.eval(xs.row(i), xs.row(j));
            gram[[i, j]] = k;
            gram[[j, i]] = k;
        }
    }

    let mut beta = Array1::<f64>::zeros(n);
    // f = K' beta
    let mut f = Array1::<f64>::zeros(n);
    let mut passes = 0;
    for pass in 0..config.max_iter {
        passes = pass + 1;
        let mut max_step: f64 = 0.0;
        for i in 0..n {
            let q = gram[[i, i]];
            if q <= 0.0 {
                continue;
            }
            let g = f[i] - ys[i];
            let a = q * beta[i] - g;
            let shrunk = a.signum() * (a.abs() - config.epsilon).max(0.0);
            let updated = (shrunk / q).clamp(-config.c, config.c);
            let delta = updated - beta[i];
            if delta != 0.0 {
                beta[i] = updated;
                f.scaled_add(delta, &gram.column(i));
                max_step = max_step.max(delta.abs());
            }
        }
        if max_step < config.tol {
            break;
        }
    }
    debug!("SVR dual solver finished after {} passes", passes);
    beta
}
