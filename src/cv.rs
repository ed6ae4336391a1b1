//! Stratified k-fold cross-validation.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use crate::dataset::Dataset;
use crate::error::ThicketError;
use crate::metrics::{accuracy, roc_auc, Metric};
use crate::model::ModelConfig;

/// Stratified fold splitter.
///
/// Construct via [`StratifiedKFold::new`], then chain `with_seed` if
/// desired.
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_folds: usize,
    seed: u64,
}

impl StratifiedKFold {
    /// Create a new splitter with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, ThicketError> {
        if n_folds < 2 {
            return Err(ThicketError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Assign each row to a fold, stratified by class.
    ///
    /// Rows are grouped by label, shuffled within each group, then dealt
    /// round-robin across folds so every fold carries near-equal class
    /// proportions. Fold sizes differ by at most one per class.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::InvalidLabel`] when a label is neither 0
    /// nor 1, and [`ThicketError::TooFewSamplesForFolds`] when a present
    /// class has fewer rows than folds.
    pub fn assign(&self, labels: &[usize]) -> Result<FoldAssignment, ThicketError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut class_indices: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for (i, &label) in labels.iter().enumerate() {
            if label > 1 {
                return Err(ThicketError::InvalidLabel {
                    row_index: i,
                    label,
                });
            }
            class_indices[label].push(i);
        }

        for (class, indices) in class_indices.iter().enumerate() {
            if !indices.is_empty() && indices.len() < self.n_folds {
                return Err(ThicketError::TooFewSamplesForFolds {
                    class,
                    count: indices.len(),
                    n_folds: self.n_folds,
                });
            }
        }

        let mut assignments = vec![0usize; labels.len()];
        for indices in &mut class_indices {
            indices.shuffle(&mut rng);
            for (j, &idx) in indices.iter().enumerate() {
                assignments[idx] = j % self.n_folds;
            }
        }

        Ok(FoldAssignment {
            assignments,
            n_folds: self.n_folds,
        })
    }
}

/// A completed fold assignment: every row belongs to exactly one fold.
#[derive(Debug, Clone)]
pub struct FoldAssignment {
    assignments: Vec<usize>,
    n_folds: usize,
}

impl FoldAssignment {
    /// Return the fold of one row.
    #[must_use]
    pub fn fold_of(&self, row_index: usize) -> usize {
        self.assignments[row_index]
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Return the row indices held out by `fold`, ascending.
    #[must_use]
    pub fn test_indices(&self, fold: usize) -> Vec<usize> {
        (0..self.assignments.len())
            .filter(|&i| self.assignments[i] == fold)
            .collect()
    }

    /// Return the row indices trained on by `fold`, ascending.
    #[must_use]
    pub fn train_indices(&self, fold: usize) -> Vec<usize> {
        (0..self.assignments.len())
            .filter(|&i| self.assignments[i] != fold)
            .collect()
    }
}

/// Per-fold scores of one cross-validated configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FoldScores {
    /// One score per fold, in fold order.
    pub scores: Vec<f64>,
}

impl FoldScores {
    /// Mean score across folds.
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.scores.iter().sum::<f64>() / self.scores.len() as f64
    }

    /// Population standard deviation of the fold scores.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        let mean = self.mean();
        let variance = self
            .scores
            .iter()
            .map(|&s| (s - mean).powi(2))
            .sum::<f64>()
            / self.scores.len() as f64;
        variance.sqrt()
    }
}

/// Cross-validate one model configuration.
///
/// For each fold, the config is re-seeded with the fold number as an
/// offset, trained on the other folds' rows through
/// [`ModelConfig::fit_subset`], and scored on the held-out rows.
/// [`Metric::Accuracy`] scores hard predictions; [`Metric::RocAuc`] scores
/// class-1 probabilities.
///
/// # Errors
///
/// Propagates fold-assignment, training, and metric errors.
#[instrument(skip(data, config), fields(n_folds = folds.n_folds(), n_samples = data.n_samples()))]
pub fn cross_validate(
    data: &Dataset,
    folds: &StratifiedKFold,
    config: &ModelConfig,
    metric: Metric,
) -> Result<FoldScores, ThicketError> {
    let assignment = folds.assign(data.labels())?;

    let mut scores = Vec::with_capacity(folds.n_folds());
    for fold in 0..folds.n_folds() {
        let train = assignment.train_indices(fold);
        let test = assignment.test_indices(fold);

        let model = config.with_seed_offset(fold as u64).fit_subset(data, &train)?;

        let labels: Vec<usize> = test.iter().map(|&i| data.label(i)).collect();
        let score = match metric {
            Metric::Accuracy => {
                let predictions = test
                    .iter()
                    .map(|&i| model.predict(data.row(i)))
                    .collect::<Result<Vec<_>, _>>()?;
                accuracy(&labels, &predictions)?
            }
            Metric::RocAuc => {
                let probabilities = test
                    .iter()
                    .map(|&i| model.predict_proba(data.row(i)))
                    .collect::<Result<Vec<_>, _>>()?;
                roc_auc(&labels, &probabilities)?
            }
        };

        info!(fold, %metric, score, "fold completed");
        scores.push(score);
    }

    Ok(FoldScores { scores })
}
