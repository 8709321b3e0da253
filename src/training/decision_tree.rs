//! Multi-output regression tree
//!
//! Splits minimise the summed squared error across every output column, so a
//! single tree predicts the whole solution vector at once. The same tree
//! backs both forests: `SplitStrategy::Best` scans every threshold of each
//! candidate feature, `SplitStrategy::Random` draws one threshold per feature
//! uniformly between its min and max (extremely randomized trees).

use crate::error::{GalaxyError, Result};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: Vec<f64>,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// How split thresholds are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitStrategy {
    Best,
    Random,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().ceil() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).ceil() as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        }
        .clamp(1, n_features.max(1))
    }
}

/// Regression tree over a multi-column target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: Option<TreeNode>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split (None = all)
    pub max_features: Option<usize>,
    pub strategy: SplitStrategy,
    pub random_state: u64,
    n_features: usize,
    n_outputs: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for RegressionTree {
    fn default() -> Self {
        Self::new(SplitStrategy::Best)
    }
}

/// Per-output running sums used to score a node without revisiting rows
#[derive(Clone)]
struct Moments {
    count: usize,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl Moments {
    fn zeros(n_outputs: usize) -> Self {
        Self {
            count: 0,
            sum: vec![0.0; n_outputs],
            sq_sum: vec![0.0; n_outputs],
        }
    }

    fn of(y: &Array2<f64>, indices: &[usize]) -> Self {
        let mut m = Self::zeros(y.ncols());
        for &i in indices {
            m.add(y, i);
        }
        m
    }

    fn add(&mut self, y: &Array2<f64>, row: usize) {
        self.count += 1;
        for (j, &v) in y.row(row).iter().enumerate() {
            self.sum[j] += v;
            self.sq_sum[j] += v * v;
        }
    }

    /// Summed squared deviation from the mean, over all outputs
    fn sse(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = self.count as f64;
        self.sum
            .iter()
            .zip(&self.sq_sum)
            .map(|(s, sq)| (sq - s * s / n).max(0.0))
            .sum()
    }

    /// SSE of the complement `total - self`
    fn complement_sse(&self, total: &Moments) -> f64 {
        let count = total.count - self.count;
        if count == 0 {
            return 0.0;
        }
        let n = count as f64;
        (0..self.sum.len())
            .map(|j| {
                let s = total.sum[j] - self.sum[j];
                let sq = total.sq_sum[j] - self.sq_sum[j];
                (sq - s * s / n).max(0.0)
            })
            .sum()
    }

    fn mean(&self) -> Vec<f64> {
        let n = self.count.max(1) as f64;
        self.sum.iter().map(|s| s / n).collect()
    }
}

struct Candidate {
    feature_idx: usize,
    threshold: f64,
    child_sse: f64,
}

impl RegressionTree {
    pub fn new(strategy: SplitStrategy) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            strategy,
            random_state: 42,
            n_features: 0,
            n_outputs: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the tree to a feature matrix and a matching target matrix
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() != y.nrows() {
            return Err(GalaxyError::shape(
                format!("{} target rows", x.nrows()),
                format!("{} target rows", y.nrows()),
            ));
        }
        if x.nrows() == 0 {
            return Err(GalaxyError::insufficient("training rows", 1, 0));
        }

        self.n_features = x.ncols();
        self.n_outputs = y.ncols();

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut importances = vec![0.0; self.n_features];
        let indices: Vec<usize> = (0..x.nrows()).collect();
        self.root = Some(self.build(x, y, &indices, 0, &mut rng, &mut importances));

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(self)
    }

    fn build(
        &self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode {
        let moments = Moments::of(y, indices);
        let n_samples = indices.len();
        let parent_sse = moments.sse();

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || parent_sse <= MIN_GAIN;

        if should_stop {
            return TreeNode::Leaf { value: moments.mean(), n_samples };
        }

        let features = self.candidate_features(rng);
        let best = match self.strategy {
            SplitStrategy::Best => self.best_split(x, y, indices, &features, &moments),
            SplitStrategy::Random => self.random_split(x, y, indices, &features, &moments, rng),
        };

        match best {
            Some(split) if parent_sse - split.child_sse > MIN_GAIN => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

                importances[split.feature_idx] += parent_sse - split.child_sse;

                let left = self.build(x, y, &left_idx, depth + 1, rng, importances);
                let right = self.build(x, y, &right_idx, depth + 1, rng, importances);
                TreeNode::Split {
                    feature_idx: split.feature_idx,
                    threshold: split.threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                    n_samples,
                }
            }
            _ => TreeNode::Leaf { value: moments.mean(), n_samples },
        }
    }

    /// Random subset of feature indices (partial Fisher-Yates)
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        let n = self.n_features;
        let k = self.max_features.unwrap_or(n).clamp(1, n.max(1));
        let mut features: Vec<usize> = (0..n).collect();
        if k < n {
            for i in 0..k {
                let j = rng.gen_range(i..n);
                features.swap(i, j);
            }
            features.truncate(k);
        }
        features
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        indices: &[usize],
        features: &[usize],
        total: &Moments,
    ) -> Option<Candidate> {
        features
            .par_iter()
            .filter_map(|&f| self.best_threshold(x, y, indices, f, total))
            .min_by(|a, b| a.child_sse.total_cmp(&b.child_sse))
    }

    /// Sweep sorted values of one feature, scoring every midpoint
    fn best_threshold(
        &self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        indices: &[usize],
        feature: usize,
        total: &Moments,
    ) -> Option<Candidate> {
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let n = order.len();
        let mut left = Moments::zeros(y.ncols());
        let mut best: Option<Candidate> = None;

        for pos in 0..n - 1 {
            left.add(y, order[pos]);
            let n_left = pos + 1;
            if n_left < self.min_samples_leaf || n - n_left < self.min_samples_leaf {
                continue;
            }
            let here = x[[order[pos], feature]];
            let next = x[[order[pos + 1], feature]];
            if next <= here {
                continue;
            }
            let child_sse = left.sse() + left.complement_sse(total);
            if best.as_ref().map_or(true, |b| child_sse < b.child_sse) {
                best = Some(Candidate {
                    feature_idx: feature,
                    threshold: midpoint(here, next),
                    child_sse,
                });
            }
        }
        best
    }

    fn random_split(
        &self,
        x: &Array2<f64>,
        y: &Array2<f64>,
        indices: &[usize],
        features: &[usize],
        total: &Moments,
        rng: &mut ChaCha8Rng,
    ) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;

        for &f in features {
            let (lo, hi) = indices.iter().fold((f64::MAX, f64::MIN), |(lo, hi), &i| {
                let v = x[[i, f]];
                (lo.min(v), hi.max(v))
            });
            if hi - lo <= f64::EPSILON {
                continue;
            }
            let threshold = rng.gen_range(lo..hi);

            let mut left = Moments::zeros(y.ncols());
            for &i in indices {
                if x[[i, f]] <= threshold {
                    left.add(y, i);
                }
            }
            let n_right = total.count - left.count;
            if left.count < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let child_sse = left.sse() + left.complement_sse(total);
            if best.as_ref().map_or(true, |b| child_sse < b.child_sse) {
                best = Some(Candidate { feature_idx: f, threshold, child_sse });
            }
        }
        best
    }

    /// Predict one row per sample, one column per output
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let root = self.root.as_ref().ok_or(GalaxyError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(GalaxyError::shape(
                format!("{} features", self.n_features),
                format!("{} features", x.ncols()),
            ));
        }

        let mut out = Array2::zeros((x.nrows(), self.n_outputs));
        for (i, row) in x.rows().into_iter().enumerate() {
            let mut node = root;
            let leaf = loop {
                match node {
                    TreeNode::Leaf { value, .. } => break value,
                    TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                        node = if row[*feature_idx] <= *threshold { left } else { right };
                    }
                }
            };
            out.row_mut(i).iter_mut().zip(leaf).for_each(|(o, v)| *o = *v);
        }
        Ok(out)
    }

    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

/// Threshold between two sorted distinct values that keeps `next` on the right
fn midpoint(here: f64, next: f64) -> f64 {
    let mid = here + (next - here) / 2.0;
    if mid >= next {
        here
    } else {
        mid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array2<f64>) {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0], [5.0, 0.0], [6.0, 0.0]];
        let y = array![
            [1.0, 0.0],
            [1.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [0.0, 1.0],
            [0.0, 1.0],
        ];
        (x, y)
    }

    #[test]
    fn test_best_split_fits_step() {
        let (x, y) = step_data();
        let mut tree = RegressionTree::new(SplitStrategy::Best);
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&x).unwrap();
        assert_eq!(pred.dim(), (6, 2));
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-12);
        }
        assert_eq!(tree.depth(), 2);

        let importances = tree.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_random_split_reduces_error() {
        let (x, y) = step_data();
        let mut tree = RegressionTree::new(SplitStrategy::Random).with_random_state(7);
        tree.fit(&x, &y).unwrap();

        let pred = tree.predict(&x).unwrap();
        let mse: f64 = pred.iter().zip(y.iter()).map(|(p, t)| (p - t).powi(2)).sum::<f64>() / 12.0;
        assert!(mse < 0.05, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth_limits_tree() {
        let (x, y) = step_data();
        let mut tree = RegressionTree::new(SplitStrategy::Best).with_max_depth(Some(0));
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.depth(), 1);

        let pred = tree.predict(&x).unwrap();
        assert!((pred[[0, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_split_between_adjacent_floats() {
        let here = f64::from_bits(1.0f64.to_bits() + 1);
        let next = f64::from_bits(here.to_bits() + 1);
        let threshold = midpoint(here, next);
        assert!(here <= threshold && threshold < next);
        assert_eq!(midpoint(1.0, 3.0), 2.0);

        let x = array![[here], [here], [next], [next]];
        let y = array![[0.0], [0.0], [1.0], [1.0]];
        let mut tree = RegressionTree::new(SplitStrategy::Best);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = RegressionTree::default();
        let err = tree.predict(&Array2::zeros((1, 2))).unwrap_err();
        assert!(matches!(err, GalaxyError::ModelNotFitted));
    }

    #[test]
    fn test_row_mismatch() {
        let mut tree = RegressionTree::default();
        let err = tree.fit(&Array2::zeros((3, 2)), &Array2::zeros((2, 1))).unwrap_err();
        assert!(matches!(err, GalaxyError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::Sqrt.resolve(100), 10);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(9), 5);
        assert_eq!(MaxFeatures::Fixed(50).resolve(10), 10);
        assert_eq!(MaxFeatures::All.resolve(7), 7);
    }
}
