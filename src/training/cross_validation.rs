//! Stratified splitting: train/test holdout and k-fold cross-validation

use crate::error::{PipelineError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Disjoint train/test row indices, both sorted ascending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// A single cross-validation fold
#[derive(Debug, Clone)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Row indices grouped by class, each group in ascending row order
fn group_by_class(labels: &[usize]) -> Vec<Vec<usize>> {
    let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);
    let mut groups = vec![Vec::new(); n_classes];
    for (idx, &class) in labels.iter().enumerate() {
        groups[class].push(idx);
    }
    groups
}

/// Split `n_total` over classes proportionally to `counts` by largest remainder.
///
/// Leftover units go to the largest remainders, lower class index first on ties.
pub fn allocate_quotas(counts: &[usize], n_total: usize) -> Vec<usize> {
    let n: usize = counts.iter().sum();
    if n == 0 {
        return vec![0; counts.len()];
    }

    let mut quotas: Vec<usize> = counts.iter().map(|&c| n_total * c / n).collect();
    let remainders: Vec<usize> = counts.iter().map(|&c| n_total * c % n).collect();

    let assigned: usize = quotas.iter().sum();
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| remainders[b].cmp(&remainders[a]).then(a.cmp(&b)));

    for &class in order.iter().take(n_total.saturating_sub(assigned)) {
        quotas[class] += 1;
    }
    quotas
}

/// Stratified, seeded train/test split over class indices.
///
/// `n_test = ceil(test_fraction * n)`, allocated over classes by largest
/// remainder. Rows within a class are shuffled with a `ChaCha8Rng` seeded from
/// `seed` and the first quota rows go to test.
pub fn train_test_split(labels: &[usize], test_fraction: f64, seed: u64) -> Result<Split> {
    let n = labels.len();
    if n == 0 {
        return Err(PipelineError::ValidationError(
            "cannot split an empty label set".to_string(),
        ));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::InvalidParameter {
            name: "test_fraction".to_string(),
            value: test_fraction.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }

    let n_test = (test_fraction * n as f64 - 1e-9).ceil().max(0.0) as usize;
    if n_test == 0 || n_test >= n {
        return Err(PipelineError::ValidationError(format!(
            "split of {} rows at fraction {} leaves an empty side",
            n, test_fraction
        )));
    }

    let mut groups = group_by_class(labels);
    let counts: Vec<usize> = groups.iter().map(Vec::len).collect();
    let quotas = allocate_quotas(&counts, n_test);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);

    for (class, (group, &quota)) in groups.iter_mut().zip(&quotas).enumerate() {
        group.shuffle(&mut rng);
        test.extend_from_slice(&group[..quota]);
        train.extend_from_slice(&group[quota..]);
        if quota == 0 && !group.is_empty() {
            warn!(class, "class has no rows in the test split");
        }
    }

    train.sort_unstable();
    test.sort_unstable();

    debug!(train = train.len(), test = test.len(), ?quotas, "stratified split");
    Ok(Split { train, test })
}

/// Stratified k-fold splitter with seeded shuffling
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    random_state: u64,
}

impl StratifiedKFold {
    /// Create a new splitter
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            random_state: 42,
        }
    }

    /// Set random state for fold assignment
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate folds over `labels`.
    ///
    /// Classes are shuffled then dealt round-robin across folds, continuing the
    /// deal from one class to the next so fold sizes differ by at most one.
    pub fn split(&self, labels: &[usize]) -> Result<Vec<CVSplit>> {
        if self.n_splits < 2 {
            return Err(PipelineError::InvalidParameter {
                name: "cv_folds".to_string(),
                value: self.n_splits.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if labels.len() < self.n_splits {
            return Err(PipelineError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                labels.len(),
                self.n_splits
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        let mut next = 0usize;

        for (class, mut group) in group_by_class(labels).into_iter().enumerate() {
            if !group.is_empty() && group.len() < self.n_splits {
                warn!(class, members = group.len(), folds = self.n_splits, "class smaller than fold count");
            }
            group.shuffle(&mut rng);
            for idx in group {
                folds[next % self.n_splits].push(idx);
                next += 1;
            }
        }

        let splits = (0..self.n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}
