//! Single-hidden-layer perceptron regressor.
//!
//! Architecture: `Input → Linear(hidden) → ReLU → Linear(1)`.
//! Trained with Adam on mini-batches of the squared error plus an L2 penalty
//! on the weights. Features and target are standardized internally.

use super::scaling::{Standardizer, TargetScaler};
use super::state::{Fitted, Unfitted};
use super::{check_training_data, InferenceModel};
use crate::error::{PipelineError, Result};
use ndarray::{Array, Array1, Array2, ArrayView1, Axis, Dimension, Zip};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Hyperparameters of an [`MlpRegressor`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    pub hidden: usize,
    pub learning_rate: f64,
    /// L2 penalty on the weights.
    pub alpha: f64,
    /// Upper bound on mini-batch size; the batch is `min(batch_size, n)`.
    pub batch_size: usize,
    /// Maximum number of epochs.
    pub max_iter: usize,
    /// Minimum training-loss improvement that resets the patience counter.
    pub tol: f64,
    /// Epochs without improvement before stopping.
    pub n_iter_no_change: usize,
    pub seed: u64,
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden: 100,
            learning_rate: 1e-3,
            alpha: 1e-4,
            batch_size: 200,
            max_iter: 1000,
            tol: 1e-4,
            n_iter_no_change: 10,
            seed: 42,
        }
    }
}

impl MlpConfig {
    pub fn with_hidden(mut self, hidden: usize) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Weights {
    /// [input x hidden]
    w1: Array2<f64>,
    b1: Array1<f64>,
    /// [hidden]
    w2: Array1<f64>,
    b2: f64,
}

impl Weights {
    /// Glorot-uniform initialization.
    fn init(inputs: usize, hidden: usize, rng: &mut ChaCha8Rng) -> Self {
        let limit1 = (6.0 / (inputs + hidden) as f64).sqrt();
        let limit2 = (6.0 / (hidden + 1) as f64).sqrt();
        let w1 = Array2::from_shape_simple_fn((inputs, hidden), || rng.random_range(-limit1..limit1));
        let b1 = Array1::from_shape_simple_fn(hidden, || rng.random_range(-limit1..limit1));
        let w2 = Array1::from_shape_simple_fn(hidden, || rng.random_range(-limit2..limit2));
        let b2 = rng.random_range(-limit2..limit2);
        Self { w1, b1, w2, b2 }
    }

    /// Returns (pre-activation, hidden activation, output).
    fn forward(&self, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>, Array1<f64>) {
        let pre = x.dot(&self.w1) + &self.b1;
        let hidden = pre.mapv(|v| v.max(0.0));
        let out = hidden.dot(&self.w2) + self.b2;
        (pre, hidden, out)
    }

    fn forward_row(&self, x: ArrayView1<'_, f64>) -> f64 {
        let hidden = (x.dot(&self.w1) + &self.b1).mapv(|v| v.max(0.0));
        hidden.dot(&self.w2) + self.b2
    }

    fn penalty(&self) -> f64 {
        self.w1.iter().map(|w| w * w).sum::<f64>() + self.w2.dot(&self.w2)
    }
}

struct Gradients {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array1<f64>,
    b2: f64,
}

/// First and second moment estimates for one parameter tensor.
struct Moments<D: Dimension> {
    m: Array<f64, D>,
    v: Array<f64, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f64, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }

    fn step(&mut self, param: &mut Array<f64, D>, grad: &Array<f64, D>, lr_t: f64) {
        Zip::from(&mut self.m)
            .and(&mut self.v)
            .and(grad)
            .for_each(|m, v, &g| {
                *m = BETA1 * *m + (1.0 - BETA1) * g;
                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            });
        Zip::from(param)
            .and(&self.m)
            .and(&self.v)
            .for_each(|p, &m, &v| *p -= lr_t * m / (v.sqrt() + ADAM_EPS));
    }
}

struct Adam {
    lr: f64,
    t: i32,
    w1: Moments<ndarray::Ix2>,
    b1: Moments<ndarray::Ix1>,
    w2: Moments<ndarray::Ix1>,
    b2: (f64, f64),
}

impl Adam {
    fn new(lr: f64, weights: &Weights) -> Self {
        Self {
            lr,
            t: 0,
            w1: Moments::zeros_like(&weights.w1),
            b1: Moments::zeros_like(&weights.b1),
            w2: Moments::zeros_like(&weights.w2),
            b2: (0.0, 0.0),
        }
    }

    fn step(&mut self, weights: &mut Weights, grads: &Gradients) {
        self.t = self.t.saturating_add(1);
        // Bias correction folded into the step size
        let lr_t = self.lr * (1.0 - BETA2.powi(self.t)).sqrt() / (1.0 - BETA1.powi(self.t));

        self.w1.step(&mut weights.w1, &grads.w1, lr_t);
        self.b1.step(&mut weights.b1, &grads.b1, lr_t);
        self.w2.step(&mut weights.w2, &grads.w2, lr_t);

        let (m, v) = &mut self.b2;
        *m = BETA1 * *m + (1.0 - BETA1) * grads.b2;
        *v = BETA2 * *v + (1.0 - BETA2) * grads.b2 * grads.b2;
        weights.b2 -= lr_t * *m / (v.sqrt() + ADAM_EPS);
    }
}

/// Multi-layer perceptron regressor with one hidden layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MlpRegressor<S = Unfitted> {
    config: MlpConfig,
    weights: Option<Weights>,
    x_scaler: Option<Standardizer>,
    y_scaler: Option<TargetScaler>,
    n_features: usize,
    /// Epochs actually run.
    n_iter: usize,
    /// Training loss of the final epoch, in standardized units.
    final_loss: f64,
    _state: PhantomData<S>,
}

impl Default for MlpRegressor<Unfitted> {
    fn default() -> Self {
        Self::new(MlpConfig::default())
    }
}

impl MlpRegressor<Unfitted> {
    pub fn new(config: MlpConfig) -> Self {
        Self {
            config,
            weights: None,
            x_scaler: None,
            y_scaler: None,
            n_features: 0,
            n_iter: 0,
            final_loss: f64::NAN,
            _state: PhantomData,
        }
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<MlpRegressor<Fitted>> {
        check_training_data("MlpRegressor", x, y)?;
        if self.config.hidden == 0 {
            return Err(PipelineError::training(
                x.nrows(),
                "MlpRegressor needs at least one hidden unit",
            ));
        }

        let x_scaler = Standardizer::fit(x);
        let y_scaler = TargetScaler::fit(y);
        let xs = x_scaler.transform(x);
        let ys = y_scaler.transform(y);

        let n = xs.nrows();
        let batch = self.config.batch_size.clamp(1, n);
        let alpha = self.config.alpha;

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut weights = Weights::init(xs.ncols(), self.config.hidden, &mut rng);
        let mut adam = Adam::new(self.config.learning_rate, &weights);
        let mut order: Vec<usize> = (0..n).collect();

        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut epoch_loss = f64::NAN;
        let mut n_iter = 0;

        for epoch in 0..self.config.max_iter {
            n_iter = epoch + 1;
            order.shuffle(&mut rng);

            let mut total = 0.0;
            for chunk in order.chunks(batch) {
                let xb = xs.select(Axis(0), chunk);
                let yb = ys.select(Axis(0), chunk);
                let (loss, grads) = batch_gradients(&weights, &xb, &yb, alpha);
                total += loss * chunk.len() as f64;
                adam.step(&mut weights, &grads);
            }
            epoch_loss = total / n as f64;

            if !epoch_loss.is_finite() {
                return Err(PipelineError::training(
                    n,
                    format!("MlpRegressor loss diverged at epoch {}", n_iter),
                ));
            }
            if epoch_loss > best_loss - self.config.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(epoch_loss);
            if no_improvement > self.config.n_iter_no_change {
                break;
            }
        }
        debug!(
            "MLP hidden={} stopped after {} epochs, loss={:.6}",
            self.config.hidden, n_iter, epoch_loss
        );

        Ok(MlpRegressor {
            config: self.config,
            weights: Some(weights),
            x_scaler: Some(x_scaler),
            y_scaler: Some(y_scaler),
            n_features: x.ncols(),
            n_iter,
            final_loss: epoch_loss,
            _state: PhantomData,
        })
    }
}

impl<S> MlpRegressor<S> {
    pub fn config(&self) -> &MlpConfig {
        &self.config
    }
}

impl MlpRegressor<Fitted> {
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn final_loss(&self) -> f64 {
        self.final_loss
    }
}

impl InferenceModel for MlpRegressor<Fitted> {
    fn predict(&self, x: ArrayView1<'_, f64>) -> f64 {
        let (Some(weights), Some(x_scaler), Some(y_scaler)) =
            (&self.weights, &self.x_scaler, &self.y_scaler)
        else {
            return f64::NAN;
        };
        let z = x_scaler.transform_row(x);
        y_scaler.inverse(weights.forward_row(z.view()))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Loss `½·mean(err²) + alpha/(2m)·|W|²` and its gradients on one batch.
fn batch_gradients(weights: &Weights, x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> (f64, Gradients) {
    let m = x.nrows() as f64;
    let (pre, hidden, out) = weights.forward(x);

    let err = &out - y;
    let loss = 0.5 * err.dot(&err) / m + 0.5 * alpha * weights.penalty() / m;

    let d_out = err / m;
    let w2 = hidden.t().dot(&d_out) + &(&weights.w2 * (alpha / m));
    let b2 = d_out.sum();

    // dL/d(pre) = d_out ⊗ w2, masked by ReLU'
    let mut d_hidden = d_out
        .view()
        .insert_axis(Axis(1))
        .dot(&weights.w2.view().insert_axis(Axis(0)));
    Zip::from(&mut d_hidden)
        .and(&pre)
        .for_each(|d, &p| {
            if p <= 0.0 {
                *d = 0.0;
            }
        });

    let w1 = x.t().dot(&d_hidden) + &(&weights.w1 * (alpha / m));
    let b1 = d_hidden.sum_axis(Axis(0));

    (loss, Gradients { w1, b1, w2, b2 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use ndarray::array;

    fn quadratic_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((80, 2), |(i, j)| ((i * (j + 3)) % 17) as f64);
        let y = x.map_axis(Axis(1), |r| r[0] * r[0] + 4.0 * r[1] + 1000.0);
        (x, y)
    }

    #[test]
    fn test_learns_nonlinear_target() {
        let (x, y) = quadratic_data();
        let model = MlpRegressor::new(MlpConfig::default().with_hidden(40).with_learning_rate(1e-2))
            .fit(&x, &y)
            .unwrap();
        let preds = model.predict_batch(&x);
        let r2 = Metrics::r_squared(y.view(), preds.view());
        assert!(r2 > 0.8, "r2 = {}", r2);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = quadratic_data();
        let config = MlpConfig::default().with_hidden(8).with_max_iter(50).with_seed(3);
        let a = MlpRegressor::new(config).fit(&x, &y).unwrap();
        let b = MlpRegressor::new(config).fit(&x, &y).unwrap();
        assert_eq!(a.predict_batch(&x), b.predict_batch(&x));
        assert_eq!(a.n_iter(), b.n_iter());
    }

    #[test]
    fn test_respects_iteration_cap() {
        let (x, y) = quadratic_data();
        let model = MlpRegressor::new(MlpConfig::default().with_hidden(4).with_max_iter(5))
            .fit(&x, &y)
            .unwrap();
        assert!(model.n_iter() <= 5);
        assert!(model.final_loss().is_finite());
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let weights = Weights::init(2, 3, &mut rng);
        let x = array![[0.5, -1.0], [1.5, 0.25], [-0.3, 0.8]];
        let y = array![1.0, -0.5, 0.2];
        let alpha = 1e-2;
        let (_, grads) = batch_gradients(&weights, &x, &y, alpha);

        let h = 1e-6;
        let mut bumped = weights.clone();
        bumped.w1[[1, 2]] += h;
        let (up, _) = batch_gradients(&bumped, &x, &y, alpha);
        bumped.w1[[1, 2]] -= 2.0 * h;
        let (down, _) = batch_gradients(&bumped, &x, &y, alpha);
        let numeric = (up - down) / (2.0 * h);
        assert!((numeric - grads.w1[[1, 2]]).abs() < 1e-6);

        let mut bumped = weights.clone();
        bumped.b2 += h;
        let (up, _) = batch_gradients(&bumped, &x, &y, alpha);
        bumped.b2 -= 2.0 * h;
        let (down, _) = batch_gradients(&bumped, &x, &y, alpha);
        assert!(((up - down) / (2.0 * h) - grads.b2).abs() < 1e-6);
    }

    #[test]
    fn test_zero_hidden_units_rejected() {
        let (x, y) = quadratic_data();
        let result = MlpRegressor::new(MlpConfig::default().with_hidden(0)).fit(&x, &y);
        assert!(matches!(result, Err(PipelineError::Training { .. })));
    }
}
