//! Decision tree implementation
//!
//! CART trees grown with weighted impurity. Classification trees store the
//! weighted class distribution in each leaf; regression trees store the
//! weighted mean, which gradient boosting later overwrites with its own
//! leaf estimates.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node pointing into the tree's leaf value table
    Leaf { leaf_id: usize, n_samples: usize },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    MSE,
}

/// Training targets for one fit
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Classes { y: &'a [usize], n_classes: usize },
    Values(&'a [f64]),
}

impl Target<'_> {
    fn n_stats(&self) -> usize {
        match self {
            Target::Classes { n_classes, .. } => *n_classes,
            Target::Values(_) => 2,
        }
    }

    /// Add row `i` with weight `w` into the running statistics
    #[inline]
    fn accumulate(&self, stats: &mut [f64], i: usize, w: f64) {
        match self {
            Target::Classes { y, .. } => stats[y[i]] += w,
            Target::Values(v) => {
                stats[0] += w * v[i];
                stats[1] += w * v[i] * v[i];
            }
        }
    }

    /// Score to maximise: sum of child scores beats the parent score by the
    /// weighted impurity decrease.
    #[inline]
    fn score(&self, stats: &[f64], weight: f64) -> f64 {
        if weight <= 0.0 {
            return 0.0;
        }
        match self {
            Target::Classes { .. } => stats.iter().map(|s| s * s).sum::<f64>() / weight,
            Target::Values(_) => stats[0] * stats[0] / weight,
        }
    }

    /// Node impurity from its statistics
    fn impurity(&self, stats: &[f64], weight: f64) -> f64 {
        if weight <= 0.0 {
            return 0.0;
        }
        match self {
            Target::Classes { .. } => {
                1.0 - stats.iter().map(|s| (s / weight).powi(2)).sum::<f64>()
            }
            Target::Values(_) => {
                let mean = stats[0] / weight;
                (stats[1] / weight - mean * mean).max(0.0)
            }
        }
    }
}

struct FitContext<'a> {
    x: &'a Array2<f64>,
    target: Target<'a>,
    weights: &'a [f64],
    max_features: usize,
}

/// Best split found for a node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    score: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Leaf values: class distribution or a single regression value
    leaf_values: Vec<Vec<f64>>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split, all when `None`
    pub max_features: Option<usize>,
    /// Impurity criterion
    pub criterion: Criterion,
    /// Number of features
    n_features: usize,
    /// Feature importances (normalized impurity decrease)
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    fn with_criterion_base(criterion: Criterion) -> Self {
        Self {
            root: None,
            leaf_values: Vec::new(),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            n_features: 0,
            feature_importances: None,
        }
    }

    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self::with_criterion_base(Criterion::Gini)
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self::with_criterion_base(Criterion::MSE)
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Set the number of features drawn at each split
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fit a classification tree on the rows listed in `indices`.
    ///
    /// `weights` is indexed by row of `x`; rows may appear with weight
    /// greater than one to represent bootstrap duplicates.
    pub fn fit_classifier(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        weights: &[f64],
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Result<&mut Self> {
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(PipelineError::TrainingError(format!(
                "class index {} out of range for {} classes",
                bad, n_classes
            )));
        }
        self.criterion = Criterion::Gini;
        self.fit_inner(x, Target::Classes { y, n_classes }, weights, indices, rng)
    }

    /// Fit a regression tree on the rows listed in `indices`
    pub fn fit_regressor(
        &mut self,
        x: &Array2<f64>,
        y: &[f64],
        weights: &[f64],
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Result<&mut Self> {
        self.criterion = Criterion::MSE;
        self.fit_inner(x, Target::Values(y), weights, indices, rng)
    }

    fn fit_inner(
        &mut self,
        x: &Array2<f64>,
        target: Target<'_>,
        weights: &[f64],
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_targets = match target {
            Target::Classes { y, .. } => y.len(),
            Target::Values(v) => v.len(),
        };

        if n_samples != n_targets || n_samples != weights.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} targets and weights", n_samples),
                actual: format!("{} targets, {} weights", n_targets, weights.len()),
            });
        }
        if indices.is_empty() {
            return Err(PipelineError::TrainingError(
                "cannot grow a tree on zero rows".to_string(),
            ));
        }

        self.n_features = x.ncols();
        self.leaf_values.clear();

        let ctx = FitContext {
            x,
            target,
            weights,
            max_features: self
                .max_features
                .unwrap_or(self.n_features)
                .clamp(1, self.n_features.max(1)),
        };

        let mut importances = vec![0.0; self.n_features];
        let root = self.build_node(&ctx, indices.to_vec(), 0, rng, &mut importances);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(Array1::from_vec(importances));

        Ok(self)
    }

    fn node_stats(&self, ctx: &FitContext<'_>, indices: &[usize]) -> (Vec<f64>, f64) {
        let mut stats = vec![0.0; ctx.target.n_stats()];
        let mut weight = 0.0;
        for &i in indices {
            ctx.target.accumulate(&mut stats, i, ctx.weights[i]);
            weight += ctx.weights[i];
        }
        (stats, weight)
    }

    fn make_leaf(&mut self, ctx: &FitContext<'_>, stats: &[f64], weight: f64, n_samples: usize) -> TreeNode {
        let value = match ctx.target {
            Target::Classes { n_classes, .. } => {
                if weight > 0.0 {
                    stats.iter().map(|s| s / weight).collect()
                } else {
                    vec![1.0 / n_classes as f64; n_classes]
                }
            }
            Target::Values(_) => vec![if weight > 0.0 { stats[0] / weight } else { 0.0 }],
        };
        let leaf_id = self.leaf_values.len();
        self.leaf_values.push(value);
        TreeNode::Leaf { leaf_id, n_samples }
    }

    fn build_node(
        &mut self,
        ctx: &FitContext<'_>,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let (stats, weight) = self.node_stats(ctx, &indices);
        let impurity = ctx.target.impurity(&stats, weight);

        // Check stopping conditions
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 1e-12;

        if should_stop {
            return self.make_leaf(ctx, &stats, weight, n_samples);
        }

        let features = self.draw_features(ctx, rng);
        let parent_score = ctx.target.score(&stats, weight);

        let best = match self.find_best_split(ctx, &indices, &features, &stats, weight) {
            Some(best) if best.score - parent_score > 1e-12 => best,
            _ => return self.make_leaf(ctx, &stats, weight, n_samples),
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| ctx.x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += best.score - parent_score;

        let left = Box::new(self.build_node(ctx, left_indices, depth + 1, rng, importances));
        let right = Box::new(self.build_node(ctx, right_indices, depth + 1, rng, importances));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Feature subset considered at one split, sorted ascending
    fn draw_features(&self, ctx: &FitContext<'_>, rng: &mut ChaCha8Rng) -> Vec<usize> {
        if ctx.max_features >= self.n_features {
            return (0..self.n_features).collect();
        }
        let mut features = sample(rng, self.n_features, ctx.max_features).into_vec();
        features.sort_unstable();
        features
    }

    fn find_best_split(
        &self,
        ctx: &FitContext<'_>,
        indices: &[usize],
        features: &[usize],
        total_stats: &[f64],
        total_weight: f64,
    ) -> Option<SplitCandidate> {
        // Scan features in parallel; results come back in feature order
        let feature_results: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                self.best_split_for_feature(ctx, indices, feature_idx, total_stats, total_weight)
            })
            .collect();

        // Highest score wins, lower feature index on ties
        feature_results
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, cand| match best {
                Some(b) if b.score >= cand.score => Some(b),
                _ => Some(cand),
            })
    }

    /// Sorted sweep over one feature
    fn best_split_for_feature(
        &self,
        ctx: &FitContext<'_>,
        indices: &[usize],
        feature_idx: usize,
        total_stats: &[f64],
        total_weight: f64,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (ctx.x[[i, feature_idx]], i))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let n = order.len();
        let mut left_stats = vec![0.0; total_stats.len()];
        let mut right_stats = vec![0.0; total_stats.len()];
        let mut left_weight = 0.0;
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n - 1 {
            let (value, row) = order[pos];
            let w = ctx.weights[row];
            ctx.target.accumulate(&mut left_stats, row, w);
            left_weight += w;

            let next_value = order[pos + 1].0;
            if next_value <= value {
                continue;
            }

            let n_left = pos + 1;
            if n_left < self.min_samples_leaf || n - n_left < self.min_samples_leaf {
                continue;
            }

            let right_weight = total_weight - left_weight;
            if left_weight <= 0.0 || right_weight <= 0.0 {
                continue;
            }
            for (r, (t, l)) in right_stats.iter_mut().zip(total_stats.iter().zip(&left_stats)) {
                *r = t - l;
            }

            let score = ctx.target.score(&left_stats, left_weight)
                + ctx.target.score(&right_stats, right_weight);

            if best.map_or(true, |b| score > b.score) {
                let mut threshold = (value + next_value) / 2.0;
                if threshold >= next_value {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold,
                    score,
                });
            }
        }

        best
    }

    fn leaf_for(&self, mut node: &TreeNode, sample: ArrayView1<f64>) -> usize {
        loop {
            match node {
                TreeNode::Leaf { leaf_id, .. } => return *leaf_id,
                TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                    node = if sample[*feature_idx] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    /// Leaf index reached by each row
    pub fn apply(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.check_input(x)?;
        Ok(x.rows().into_iter().map(|row| self.leaf_for(root, row)).collect())
    }

    /// Class distribution per row (classification trees)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.criterion != Criterion::Gini {
            return Err(PipelineError::TrainingError(
                "predict_proba needs a classification tree".to_string(),
            ));
        }
        let leaves = self.apply(x)?;
        let n_classes = self.leaf_values.first().map_or(0, Vec::len);
        let mut proba = Array2::zeros((x.nrows(), n_classes));
        for (i, leaf) in leaves.into_iter().enumerate() {
            for (j, &p) in self.leaf_values[leaf].iter().enumerate() {
                proba[[i, j]] = p;
            }
        }
        Ok(proba)
    }

    /// Leaf value per row (regression trees)
    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let leaves = self.apply(x)?;
        Ok(leaves.into_iter().map(|leaf| self.leaf_values[leaf][0]).collect())
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.leaf_values.len()
    }

    /// Replace the value stored in a regression leaf
    pub fn set_leaf_value(&mut self, leaf_id: usize, value: f64) {
        if let Some(v) = self.leaf_values.get_mut(leaf_id) {
            *v = vec![value];
        }
    }

    /// Get feature importances
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get tree depth (a single leaf has depth 0)
    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn test_classifier_separable() {
        let x = array![[0.0, 5.0], [1.0, 3.0], [2.0, 4.0], [3.0, 1.0], [4.0, 2.0], [5.0, 0.0]];
        let y = [0, 0, 0, 1, 1, 2];
        let w = [1.0; 6];
        let idx: Vec<usize> = (0..6).collect();

        let mut tree = DecisionTree::new_classifier();
        tree.fit_classifier(&x, &y, 3, &w, &idx, &mut rng()).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 3));
        for (i, &c) in y.iter().enumerate() {
            assert_eq!(proba[[i, c]], 1.0);
        }
    }

    #[test]
    fn test_threshold_between_values() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = [0, 0, 1, 1];
        let idx: Vec<usize> = (0..4).collect();

        let mut tree = DecisionTree::new_classifier();
        tree.fit_classifier(&x, &y, 2, &[1.0; 4], &idx, &mut rng()).unwrap();

        match tree.root.as_ref().unwrap() {
            TreeNode::Split { threshold, .. } => assert_eq!(*threshold, 2.5),
            TreeNode::Leaf { .. } => panic!("expected a split"),
        }
        assert_eq!(tree.get_depth(), 1);
    }

    #[test]
    fn test_weights_shift_leaf_distribution() {
        let x = array![[0.0], [0.0], [0.0]];
        let y = [0, 1, 1];
        let idx: Vec<usize> = (0..3).collect();

        let mut tree = DecisionTree::new_classifier();
        tree.fit_classifier(&x, &y, 2, &[2.0, 1.0, 1.0], &idx, &mut rng()).unwrap();

        let proba = tree.predict_proba(&array![[0.0]]).unwrap();
        assert!((proba[[0, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_regressor_simple() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let idx: Vec<usize> = (0..5).collect();

        let mut tree = DecisionTree::new_regressor();
        tree.fit_regressor(&x, &y, &[1.0; 5], &idx, &mut rng()).unwrap();

        let predictions = tree.predict_values(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;
        assert!(mse < 1e-12, "MSE too high: {}", mse);
    }

    #[test]
    fn test_max_depth_and_min_leaf() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = [0, 1, 0, 1, 0, 1];
        let idx: Vec<usize> = (0..6).collect();

        let mut tree = DecisionTree::new_classifier().with_max_depth(Some(2));
        tree.fit_classifier(&x, &y, 2, &[1.0; 6], &idx, &mut rng()).unwrap();
        assert!(tree.get_depth() <= 2);

        let mut tree = DecisionTree::new_classifier().with_min_samples_leaf(3);
        tree.fit_classifier(&x, &y, 2, &[1.0; 6], &idx, &mut rng()).unwrap();
        assert!(tree.n_leaves() <= 2);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = [0, 0, 1, 1];
        let idx: Vec<usize> = (0..4).collect();

        let mut tree = DecisionTree::new_classifier();
        tree.fit_classifier(&x, &y, 2, &[1.0; 4], &idx, &mut rng()).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_set_leaf_value() {
        let x = array![[1.0], [2.0]];
        let idx = [0, 1];
        let mut tree = DecisionTree::new_regressor();
        tree.fit_regressor(&x, &[0.0, 1.0], &[1.0, 1.0], &idx, &mut rng()).unwrap();

        let leaves = tree.apply(&x).unwrap();
        tree.set_leaf_value(leaves[1], 7.5);
        assert_eq!(tree.predict_values(&x).unwrap()[1], 7.5);
    }

    #[test]
    fn test_not_fitted() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.apply(&array![[1.0]]), Err(PipelineError::ModelNotFitted)));
    }
}
