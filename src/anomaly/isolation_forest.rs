//! Isolation Forest anomaly detection
//!
//! Implements the Isolation Forest algorithm for unsupervised anomaly detection.
//! Key insight: Anomalies are easier to isolate and require fewer splits.

use super::{AnomalyResult, MultivariateDetector};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;

/// Euler-Mascheroni constant, used by the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// A node in an isolation tree
#[derive(Debug, Clone)]
enum IsolationNode {
    /// Internal node with split information
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf node with size (number of samples)
    Leaf { size: usize },
}

/// Single isolation tree
#[derive(Debug, Clone)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    /// Build an isolation tree from data
    fn build(data: &Array2<f64>, max_depth: usize, rng: &mut impl Rng) -> Self {
        let root = Self::build_node(data, 0, max_depth, rng);
        Self { root }
    }

    /// Recursively build tree nodes
    fn build_node(
        data: &Array2<f64>,
        depth: usize,
        max_depth: usize,
        rng: &mut impl Rng,
    ) -> IsolationNode {
        let n_samples = data.nrows();
        let n_features = data.ncols();

        // Stop conditions: max depth reached or only one sample
        if depth >= max_depth || n_samples <= 1 {
            return IsolationNode::Leaf { size: n_samples };
        }

        let feature = rng.gen_range(0..n_features);

        let col = data.column(feature);
        let min_val = col.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_val = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        // All values identical: nothing left to isolate
        if !(max_val - min_val > 1e-10) {
            return IsolationNode::Leaf { size: n_samples };
        }

        // Interpolate rather than sample `min..max`, whose span can overflow
        let u: f64 = rng.gen();
        let threshold = min_val * (1.0 - u) + max_val * u;

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            (0..n_samples).partition(|&i| data[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationNode::Leaf { size: n_samples };
        }

        let left_data = select_rows(data, &left_indices);
        let right_data = select_rows(data, &right_indices);

        let left = Self::build_node(&left_data, depth + 1, max_depth, rng);
        let right = Self::build_node(&right_data, depth + 1, max_depth, rng);

        IsolationNode::Internal {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Compute path length for a single sample
    fn path_length(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;

        loop {
            match node {
                IsolationNode::Leaf { size } => return depth as f64 + Self::c(*size),
                IsolationNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] < *threshold { &**left } else { &**right };
                    depth += 1;
                }
            }
        }
    }

    /// Average path length in unsuccessful BST search
    fn c(n: usize) -> f64 {
        if n <= 1 {
            0.0
        } else if n == 2 {
            1.0
        } else {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn select_rows(data: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), data.ncols()), |(i, j)| data[[rows[i], j]])
}

/// Isolation Forest for anomaly detection
#[derive(Clone, Debug)]
pub struct IsolationForest {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Maximum number of samples per tree
    pub max_samples: usize,
    /// Contamination rate (expected proportion of anomalies)
    pub contamination: f64,
    /// Random seed
    pub seed: u64,
    /// Trained trees
    trees: Vec<IsolationTree>,
    /// Subsample size actually used during the last fit
    sample_size: usize,
    /// Score above which a sample is an anomaly
    threshold: Option<f64>,
}

impl IsolationForest {
    /// Create a new Isolation Forest
    ///
    /// # Arguments
    /// * `n_estimators` - Number of trees (default: 100)
    /// * `contamination` - Expected anomaly rate (default: 0.01)
    pub fn new(n_estimators: usize, contamination: f64) -> Self {
        Self {
            n_estimators,
            max_samples: 256,
            contamination,
            seed: 42,
            trees: Vec::new(),
            sample_size: 0,
            threshold: None,
        }
    }

    /// Create with default parameters
    pub fn default_params() -> Self {
        Self::new(100, 0.01)
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set max samples per tree
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Whether `fit` has produced a model
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty() && self.threshold.is_some()
    }

    /// Score threshold learned from the contamination rate
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Fit on a one-dimensional series, one sample per value
    pub fn fit_values(&mut self, values: &[f64]) {
        self.fit(&column(values));
    }

    /// Anomaly flag for a single scalar value. Always false before fitting.
    pub fn predict_value(&self, value: f64) -> bool {
        self.detect(&column(&[value]))
            .is_anomaly
            .first()
            .copied()
            .unwrap_or(false)
    }

    /// Compute anomaly scores for samples, in (0, 1]; higher = more anomalous
    pub fn score_samples(&self, data: &Array2<f64>) -> Array1<f64> {
        let n_samples = data.nrows();
        let mut scores = Array1::zeros(n_samples);
        if self.trees.is_empty() {
            return scores;
        }

        let c = IsolationTree::c(self.sample_size);
        for i in 0..n_samples {
            let sample = data.row(i);
            let avg_path_length: f64 = self
                .trees
                .iter()
                .map(|tree| tree.path_length(sample))
                .sum::<f64>()
                / self.trees.len() as f64;

            // Anomaly score: 2^(-E[h(x)] / c(n))
            scores[i] = if c > 0.0 {
                2.0_f64.powf(-avg_path_length / c)
            } else {
                0.5
            };
        }

        scores
    }

    /// Compute decision function (negative = anomaly, positive = normal)
    pub fn decision_function(&self, data: &Array2<f64>) -> Array1<f64> {
        let threshold = self.threshold.unwrap_or(0.5);
        self.score_samples(data).mapv(|s| threshold - s)
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::default_params()
    }
}

impl MultivariateDetector for IsolationForest {
    fn fit(&mut self, data: &Array2<f64>) {
        let n_samples = data.nrows();
        if n_samples == 0 || self.n_estimators == 0 {
            self.trees.clear();
            self.threshold = None;
            return;
        }

        let actual_samples = self.max_samples.clamp(1, n_samples);
        let max_depth = (actual_samples as f64).log2().ceil() as usize;

        let mut rng = StdRng::seed_from_u64(self.seed);

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let indices: Vec<usize> = (0..n_samples).choose_multiple(&mut rng, actual_samples);
                IsolationTree::build(&select_rows(data, &indices), max_depth, &mut rng)
            })
            .collect();
        self.sample_size = actual_samples;

        // The score of the ceil(n * contamination)-th most anomalous training
        // sample becomes the cut-off; only scores strictly above it are flagged.
        let scores = self.score_samples(data);
        let mut sorted_scores: Vec<f64> = scores.to_vec();
        sorted_scores.sort_by(|a, b| b.total_cmp(a));

        let threshold_idx = (n_samples as f64 * self.contamination).ceil() as usize;
        self.threshold = Some(sorted_scores[threshold_idx.min(n_samples - 1)]);
    }

    fn detect(&self, data: &Array2<f64>) -> AnomalyResult {
        if !self.is_fitted() {
            return AnomalyResult::new(vec![], vec![]);
        }

        let scores = self.score_samples(data);
        let threshold = self.threshold.unwrap_or(0.5);

        let is_anomaly: Vec<bool> = scores.iter().map(|&s| s > threshold).collect();

        AnomalyResult::new(is_anomaly, scores.to_vec())
    }
}

/// Shape a series as an (n, 1) feature matrix
fn column(values: &[f64]) -> Array2<f64> {
    Array2::from_shape_fn((values.len(), 1), |(i, _)| values[i])
}
