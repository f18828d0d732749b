//! CART regression tree on squared error.

use super::state::{Fitted, Unfitted};
use super::{check_training_data, InferenceModel};
use crate::error::Result;
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

/// Hyperparameters of a [`DecisionTreeRegressor`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Nodes with fewer rows become leaves.
    pub min_samples_split: usize,
    /// Seeds the order in which candidate features are visited.
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Regression tree; rows with `x[feature] <= threshold` go left.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionTreeRegressor<S = Unfitted> {
    config: TreeConfig,
    nodes: Vec<Node>,
    n_features: usize,
    _state: PhantomData<S>,
}

impl Default for DecisionTreeRegressor<Unfitted> {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTreeRegressor<Unfitted> {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            n_features: 0,
            _state: PhantomData,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = Some(depth);
        self
    }

    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<DecisionTreeRegressor<Fitted>> {
        check_training_data("DecisionTreeRegressor", x, y)?;

        let mut builder = TreeBuilder {
            x,
            y,
            config: &self.config,
            rng: ChaCha8Rng::seed_from_u64(self.config.seed),
            nodes: Vec::new(),
        };
        builder.grow((0..x.nrows()).collect(), 0);
        let nodes = builder.nodes;
        debug!("Decision tree grown with {} nodes", nodes.len());

        Ok(DecisionTreeRegressor {
            config: self.config.clone(),
            nodes,
            n_features: x.ncols(),
            _state: PhantomData,
        })
    }
}

impl DecisionTreeRegressor<Fitted> {
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }
}

impl InferenceModel for DecisionTreeRegressor<Fitted> {
    fn predict(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return f64::NAN,
            }
        }
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    config: &'a TreeConfig,
    rng: ChaCha8Rng,
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl TreeBuilder<'_> {
    /// Grow the subtree over `rows` and return its node index.
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let id = self.nodes.len();
        let mean = rows.iter().map(|&r| self.y[r]).sum::<f64>() / rows.len() as f64;
        self.nodes.push(Node::Leaf { value: mean });

        let first = self.y[rows[0]];
        let pure = rows.iter().all(|&r| self.y[r] == first);
        let too_deep = self.config.max_depth.is_some_and(|d| depth >= d);
        if pure || too_deep || rows.len() < self.config.min_samples_split.max(2) {
            return id;
        }

        let Some(split) = self.best_split(&rows) else {
            return id;
        };
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.x[[r, split.feature]] <= split.threshold);

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    fn best_split(&mut self, rows: &[usize]) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.x.ncols()).collect();
        features.shuffle(&mut self.rng);

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = rows.to_vec();
        for feature in features {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
            if let Some(candidate) = self.best_threshold(&sorted, feature) {
                if best.as_ref().map_or(true, |b| candidate.sse < b.sse) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Lowest-SSE threshold for one feature; `sorted` is ordered by that feature.
    fn best_threshold(&self, sorted: &[usize], feature: usize) -> Option<SplitCandidate> {
        let n = sorted.len();
        let total_sum: f64 = sorted.iter().map(|&r| self.y[r]).sum();
        let total_sq: f64 = sorted.iter().map(|&r| self.y[r] * self.y[r]).sum();

        let mut best: Option<SplitCandidate> = None;
        let (mut left_sum, mut left_sq) = (0.0, 0.0);
        for i in 1..n {
            let prev = sorted[i - 1];
            left_sum += self.y[prev];
            left_sq += self.y[prev] * self.y[prev];

            let lo = self.x[[prev, feature]];
            let hi = self.x[[sorted[i], feature]];
            if lo >= hi {
                continue;
            }

            let (nl, nr) = (i as f64, (n - i) as f64);
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / nl) + (right_sq - right_sum * right_sum / nr);
            if best.as_ref().map_or(true, |b| sse < b.sse) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    sse,
                });
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fits_step_function_exactly() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![5.0, 5.0, 5.0, 20.0, 20.0, 20.0];
        let tree = DecisionTreeRegressor::new().fit(&x, &y).unwrap();

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.predict(array![2.5].view()), 5.0);
        assert_eq!(tree.predict(array![11.5].view()), 20.0);
        // midpoint between 3 and 10
        assert_eq!(tree.predict(array![6.5].view()), 5.0);
        assert_eq!(tree.predict(array![6.6].view()), 20.0);
    }

    #[test]
    fn test_memorizes_training_rows() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0], [2.0, 1.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let tree = DecisionTreeRegressor::new().fit(&x, &y).unwrap();
        let preds = tree.predict_batch(&x);
        assert_eq!(preds, y);
    }

    #[test]
    fn test_duplicate_rows_average() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 3.0];
        let tree = DecisionTreeRegressor::new().fit(&x, &y).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(array![1.0].view()), 2.0);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let stump = DecisionTreeRegressor::new().with_max_depth(1).fit(&x, &y).unwrap();
        assert_eq!(stump.n_leaves(), 2);
        assert_eq!(stump.predict(array![1.0].view()), 1.5);
    }

    #[test]
    fn test_same_seed_same_tree() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![1.0, 1.0, 9.0, 9.0];
        let a = DecisionTreeRegressor::new().with_seed(7).fit(&x, &y).unwrap();
        let b = DecisionTreeRegressor::new().with_seed(7).fit(&x, &y).unwrap();
        assert_eq!(a.nodes, b.nodes);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let x = Array2::<f64>::zeros((0, 2));
        let y = Array1::<f64>::zeros(0);
        assert!(DecisionTreeRegressor::new().fit(&x, &y).is_err());
    }
}
