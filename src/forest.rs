//! Random forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::dataset::Dataset;
use crate::error::ThicketError;
use crate::metrics::BinaryConfusion;
use crate::sampling::bootstrap_sample_with;
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// Number of features offered at each split of each tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mtry {
    /// `ceil(sqrt(n_features))`, the usual classification default.
    Sqrt,
    /// A fixed candidate count.
    Fixed(usize),
    /// Every feature at every split (bagged trees, no feature randomness).
    All,
}

/// Whether to score the forest on out-of-bag rows after training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OobMode {
    /// Skip OOB evaluation.
    Disabled,
    /// Evaluate each training row with the trees that never saw it.
    Enabled,
}

/// Configuration for a random forest ensemble.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter               | Default              |
/// |-------------------------|----------------------|
/// | `mtry`                  | [`Mtry::Sqrt`]       |
/// | `max_depth`             | `None` (unlimited)   |
/// | `min_node_size`         | 1                    |
/// | `cost_complexity_alpha` | 0.0 (no pruning)     |
/// | `oob_mode`              | [`OobMode::Disabled`]|
/// | `seed`                  | 42                   |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) mtry: Mtry,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_node_size: usize,
    pub(crate) cost_complexity_alpha: f64,
    pub(crate) oob_mode: OobMode,
    pub(crate) seed: u64,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::InvalidTreeCount`] if `n_trees` is 0.
    pub fn new(n_trees: usize) -> Result<Self, ThicketError> {
        if n_trees == 0 {
            return Err(ThicketError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            mtry: Mtry::Sqrt,
            max_depth: None,
            min_node_size: 1,
            cost_complexity_alpha: 0.0,
            oob_mode: OobMode::Disabled,
            seed: 42,
        })
    }

    /// Set the per-split feature candidate policy.
    #[must_use]
    pub fn with_mtry(mut self, mtry: Mtry) -> Self {
        self.mtry = mtry;
        self
    }

    /// Set the maximum depth of each tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum node size of each tree.
    #[must_use]
    pub fn with_min_node_size(mut self, min_node_size: usize) -> Self {
        self.min_node_size = min_node_size;
        self
    }

    /// Set the per-tree cost-complexity pruning strength.
    #[must_use]
    pub fn with_cost_complexity_alpha(mut self, alpha: f64) -> Self {
        self.cost_complexity_alpha = alpha;
        self
    }

    /// Enable or disable out-of-bag scoring.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Set the master random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the feature candidate policy.
    #[must_use]
    pub fn mtry(&self) -> Mtry {
        self.mtry
    }

    /// Return the per-tree depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum node size.
    #[must_use]
    pub fn min_node_size(&self) -> usize {
        self.min_node_size
    }

    /// Return the per-tree pruning strength.
    #[must_use]
    pub fn cost_complexity_alpha(&self) -> f64 {
        self.cost_complexity_alpha
    }

    /// Return the OOB scoring mode.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Return the master seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a forest on every row of the dataset.
    ///
    /// # Errors
    ///
    /// Returns hyperparameter errors from [`Mtry`] resolution or the
    /// underlying tree configuration, and
    /// [`ThicketError::OobEvaluationFailed`] when OOB scoring is enabled
    /// but no row was left out by any tree.
    #[instrument(skip(self, data), fields(n_trees = self.n_trees, n_samples = data.n_samples()))]
    pub fn fit(&self, data: &Dataset) -> Result<RandomForestFit, ThicketError> {
        self.fit_subset(data, &data.all_indices())
    }

    /// Train a forest on a row index subset (fold training uses this).
    ///
    /// Bootstrap draws are taken over positions in `sample_indices`, so the
    /// subset behaves exactly like a standalone dataset of those rows.
    ///
    /// # Errors
    ///
    /// As [`RandomForestConfig::fit`], plus [`ThicketError::EmptyDataset`]
    /// when `sample_indices` is empty.
    pub fn fit_subset(
        &self,
        data: &Dataset,
        sample_indices: &[usize],
    ) -> Result<RandomForestFit, ThicketError> {
        if sample_indices.is_empty() {
            return Err(ThicketError::EmptyDataset);
        }
        let n_samples = sample_indices.len();
        let n_features = data.n_features();
        let mtry_resolved = resolve_mtry(self.mtry, n_features)?;

        info!(
            n_trees = self.n_trees,
            n_samples,
            n_features,
            mtry = mtry_resolved,
            "training random forest"
        );

        // Two seeds per tree from the master stream: one for the bootstrap
        // draw, one for the tree's feature subsets. A single tree trained
        // externally with the same pair reproduces the ensemble member.
        let mut master_rng = ChaCha8Rng::seed_from_u64(self.seed);
        let seed_pairs: Vec<(u64, u64)> = (0..self.n_trees)
            .map(|_| (master_rng.gen(), master_rng.gen()))
            .collect();

        let tree_config = DecisionTreeConfig::new()
            .with_max_depth(self.max_depth)
            .with_min_node_size(self.min_node_size)
            .with_cost_complexity_alpha(self.cost_complexity_alpha)
            .with_mtry(Some(mtry_resolved));

        let tree_results: Result<Vec<(DecisionTree, Vec<usize>)>, ThicketError> = seed_pairs
            .into_par_iter()
            .map(|(boot_seed, tree_seed)| {
                let mut boot_rng = ChaCha8Rng::seed_from_u64(boot_seed);
                let draw = bootstrap_sample_with(n_samples, &mut boot_rng);

                // Positions into sample_indices become dataset row indices.
                let boot_rows: Vec<usize> =
                    draw.in_bag.iter().map(|&p| sample_indices[p]).collect();
                let oob_rows: Vec<usize> =
                    draw.out_of_bag.iter().map(|&p| sample_indices[p]).collect();

                let tree = tree_config
                    .clone()
                    .with_seed(tree_seed)
                    .fit_subset(data, &boot_rows)?;
                Ok((tree, oob_rows))
            })
            .collect();

        let mut trees = Vec::with_capacity(self.n_trees);
        let mut oob_rows_per_tree = Vec::with_capacity(self.n_trees);
        for (tree, oob) in tree_results? {
            trees.push(tree);
            oob_rows_per_tree.push(oob);
        }

        debug!(n_trees_trained = trees.len(), "tree training complete");

        let forest = RandomForest { trees, n_features };

        let oob_score = match self.oob_mode {
            OobMode::Enabled => Some(compute_oob(&forest, data, &oob_rows_per_tree)?),
            OobMode::Disabled => None,
        };

        let metadata = TrainingMetadata {
            n_trees: self.n_trees,
            n_features,
            n_samples,
            mtry_resolved,
        };

        info!(
            oob_accuracy = oob_score.as_ref().map(|s| s.confusion.accuracy()),
            "random forest training complete"
        );

        Ok(RandomForestFit {
            forest,
            oob_score,
            metadata,
        })
    }
}

/// Resolve an [`Mtry`] policy to a concrete candidate count.
pub(crate) fn resolve_mtry(mtry: Mtry, n_features: usize) -> Result<usize, ThicketError> {
    let resolved = match mtry {
        Mtry::Sqrt => (n_features as f64).sqrt().ceil() as usize,
        Mtry::Fixed(m) => m,
        Mtry::All => n_features,
    };
    if resolved == 0 || resolved > n_features {
        return Err(ThicketError::InvalidMtry {
            mtry: resolved,
            n_features,
        });
    }
    Ok(resolved)
}

/// A fitted random forest ensemble.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
}

impl RandomForest {
    /// Predict the class of one row by majority vote; an exact tie between
    /// the two classes resolves to class 1.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::PredictionFeatureMismatch`] when
    /// `row.len() != n_features`.
    pub fn predict(&self, row: &[f64]) -> Result<usize, ThicketError> {
        let mut votes_positive = 0usize;
        for tree in &self.trees {
            votes_positive += tree.predict(row)?;
        }
        Ok(usize::from(2 * votes_positive >= self.trees.len()))
    }

    /// Return the class-1 probability of one row: the unweighted mean of
    /// the trees' leaf proportions.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::PredictionFeatureMismatch`] when
    /// `row.len() != n_features`.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, ThicketError> {
        let mut sum = 0.0f64;
        for tree in &self.trees {
            sum += tree.predict_proba(row)?;
        }
        Ok(sum / self.trees.len() as f64)
    }

    /// Predict classes for many rows in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::PredictionFeatureMismatch`] on the first
    /// ill-shaped row.
    pub fn predict_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<usize>, ThicketError> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    /// Compute class-1 probabilities for many rows in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::PredictionFeatureMismatch`] on the first
    /// ill-shaped row.
    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ThicketError> {
        rows.par_iter().map(|row| self.predict_proba(row)).collect()
    }

    /// Mean of the per-tree normalized importances, so every tree carries
    /// equal weight regardless of its size. Sums to 1.0 when any tree
    /// split; all zeros when every tree is a single leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        let mut contributing = 0usize;
        for tree in &self.trees {
            let imp = tree.feature_importances();
            if imp.iter().sum::<f64>() > 0.0 {
                contributing += 1;
                for (t, v) in totals.iter_mut().zip(&imp) {
                    *t += v;
                }
            }
        }
        if contributing > 0 {
            totals.iter_mut().for_each(|v| *v /= contributing as f64);
        }
        totals
    }

    /// Return the fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Return the number of features the forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Out-of-bag score of a fitted forest.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct OobScore {
    /// Confusion matrix over the rows that received at least one OOB vote.
    pub confusion: BinaryConfusion,
    /// Number of rows that received at least one OOB vote.
    pub n_oob_samples: usize,
}

/// Shape information recorded at training time.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub n_trees: usize,
    /// Number of feature columns.
    pub n_features: usize,
    /// Number of training rows (subset size, not the full table).
    pub n_samples: usize,
    /// Concrete per-split candidate count after resolving [`Mtry`].
    pub mtry_resolved: usize,
}

/// A fitted forest together with its training byproducts.
#[derive(Debug, Clone)]
pub struct RandomForestFit {
    forest: RandomForest,
    oob_score: Option<OobScore>,
    metadata: TrainingMetadata,
}

impl RandomForestFit {
    /// Return the fitted ensemble.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Consume the fit and return the ensemble.
    #[must_use]
    pub fn into_forest(self) -> RandomForest {
        self.forest
    }

    /// Return the OOB score, when OOB scoring was enabled.
    #[must_use]
    pub fn oob_score(&self) -> Option<&OobScore> {
        self.oob_score.as_ref()
    }

    /// Return the training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}

/// Score each training row using only the trees that never drew it.
///
/// Rows drawn by every tree receive no vote and are skipped. An exact vote
/// tie resolves to class 1, matching [`RandomForest::predict`].
fn compute_oob(
    forest: &RandomForest,
    data: &Dataset,
    oob_rows_per_tree: &[Vec<usize>],
) -> Result<OobScore, ThicketError> {
    let mut votes_positive = vec![0usize; data.n_samples()];
    let mut votes_total = vec![0usize; data.n_samples()];

    for (tree, oob_rows) in forest.trees.iter().zip(oob_rows_per_tree) {
        for &row_idx in oob_rows {
            votes_positive[row_idx] += tree.predict(data.row(row_idx))?;
            votes_total[row_idx] += 1;
        }
    }

    let mut labels = Vec::new();
    let mut predictions = Vec::new();
    for row_idx in 0..data.n_samples() {
        if votes_total[row_idx] == 0 {
            continue;
        }
        labels.push(data.label(row_idx));
        predictions.push(usize::from(
            2 * votes_positive[row_idx] >= votes_total[row_idx],
        ));
    }

    if labels.is_empty() {
        return Err(ThicketError::OobEvaluationFailed {
            reason: "every row was in-bag for every tree".to_string(),
        });
    }

    let confusion = BinaryConfusion::from_labels(&labels, &predictions)?;
    Ok(OobScore {
        confusion,
        n_oob_samples: labels.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well-separated clusters, 30 rows per class.
    fn make_separable_data() -> Dataset {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            rows.push(vec![i as f64 * 0.1, 0.5]);
            labels.push(0);
        }
        for i in 0..30 {
            rows.push(vec![10.0 + i as f64 * 0.1, 0.5]);
            labels.push(1);
        }
        Dataset::new(rows, labels).unwrap()
    }

    #[test]
    fn separable_training_accuracy() {
        let data = make_separable_data();
        let fit = RandomForestConfig::new(30)
            .unwrap()
            .with_mtry(Mtry::All)
            .with_seed(42)
            .fit(&data)
            .unwrap();
        let mut correct = 0;
        for i in 0..data.n_samples() {
            if fit.forest().predict(data.row(i)).unwrap() == data.label(i) {
                correct += 1;
            }
        }
        let acc = correct as f64 / data.n_samples() as f64;
        assert!(acc > 0.95, "accuracy = {acc}");
    }

    #[test]
    fn invalid_tree_count_error() {
        assert!(matches!(
            RandomForestConfig::new(0).unwrap_err(),
            ThicketError::InvalidTreeCount { n_trees: 0 }
        ));
    }

    #[test]
    fn resolve_mtry_policies() {
        assert_eq!(resolve_mtry(Mtry::Sqrt, 10).unwrap(), 4);
        assert_eq!(resolve_mtry(Mtry::Sqrt, 1).unwrap(), 1);
        assert_eq!(resolve_mtry(Mtry::All, 7).unwrap(), 7);
        assert_eq!(resolve_mtry(Mtry::Fixed(3), 7).unwrap(), 3);
        assert!(resolve_mtry(Mtry::Fixed(0), 7).is_err());
        assert!(resolve_mtry(Mtry::Fixed(8), 7).is_err());
    }

    #[test]
    fn deterministic_with_same_seed() {
        let data = make_separable_data();
        let a = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(99)
            .fit(&data)
            .unwrap();
        let b = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(99)
            .fit(&data)
            .unwrap();
        for i in 0..data.n_samples() {
            assert_eq!(
                a.forest().predict(data.row(i)).unwrap(),
                b.forest().predict(data.row(i)).unwrap()
            );
            assert!(
                (a.forest().predict_proba(data.row(i)).unwrap()
                    - b.forest().predict_proba(data.row(i)).unwrap())
                .abs()
                    < f64::EPSILON
            );
        }
    }

    #[test]
    fn different_seeds_differ() {
        let data = make_separable_data();
        let a = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(1)
            .fit(&data)
            .unwrap();
        let b = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(2)
            .fit(&data)
            .unwrap();
        // Probabilities should differ somewhere on the separable band.
        let differs = (0..data.n_samples()).any(|i| {
            (a.forest().predict_proba(data.row(i)).unwrap()
                - b.forest().predict_proba(data.row(i)).unwrap())
            .abs()
                > 1e-12
        });
        assert!(differs);
    }

    #[test]
    fn oob_score_computed() {
        let data = make_separable_data();
        let fit = RandomForestConfig::new(30)
            .unwrap()
            .with_oob_mode(OobMode::Enabled)
            .with_seed(42)
            .fit(&data)
            .unwrap();
        let oob = fit.oob_score().expect("OOB should be computed");
        assert!(oob.n_oob_samples > 0);
        assert!(
            oob.confusion.accuracy() > 0.8,
            "oob accuracy = {}",
            oob.confusion.accuracy()
        );
    }

    #[test]
    fn oob_disabled_by_default() {
        let data = make_separable_data();
        let fit = RandomForestConfig::new(5).unwrap().fit(&data).unwrap();
        assert!(fit.oob_score().is_none());
    }

    #[test]
    fn importances_sum_to_one() {
        let data = make_separable_data();
        let fit = RandomForestConfig::new(20)
            .unwrap()
            .with_seed(42)
            .fit(&data)
            .unwrap();
        let total: f64 = fit.forest().feature_importances().iter().sum();
        assert!((total - 1.0).abs() < 1e-10, "total = {total}");
    }

    #[test]
    fn batch_matches_individual() {
        let data = make_separable_data();
        let fit = RandomForestConfig::new(10)
            .unwrap()
            .with_seed(42)
            .fit(&data)
            .unwrap();
        let rows: Vec<Vec<f64>> = (0..data.n_samples()).map(|i| data.row(i).to_vec()).collect();
        let batch = fit.forest().predict_batch(&rows).unwrap();
        let proba_batch = fit.forest().predict_proba_batch(&rows).unwrap();
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(batch[i], fit.forest().predict(row).unwrap());
            assert!(
                (proba_batch[i] - fit.forest().predict_proba(row).unwrap()).abs() < f64::EPSILON
            );
        }
    }

    #[test]
    fn metadata_records_shapes() {
        let data = make_separable_data();
        let fit = RandomForestConfig::new(7)
            .unwrap()
            .with_mtry(Mtry::Fixed(1))
            .fit(&data)
            .unwrap();
        let meta = fit.metadata();
        assert_eq!(meta.n_trees, 7);
        assert_eq!(meta.n_features, 2);
        assert_eq!(meta.n_samples, 60);
        assert_eq!(meta.mtry_resolved, 1);
        assert_eq!(fit.forest().trees().len(), 7);
    }

    #[test]
    fn fit_subset_trains_on_those_rows_only() {
        let data = make_separable_data();
        // Train on the first 20 of each class.
        let subset: Vec<usize> = (0..20).chain(30..50).collect();
        let fit = RandomForestConfig::new(15)
            .unwrap()
            .with_mtry(Mtry::All)
            .with_seed(42)
            .fit_subset(&data, &subset)
            .unwrap();
        assert_eq!(fit.metadata().n_samples, 40);
        // Held-out rows are from the same clusters and should classify well.
        let mut correct = 0;
        for i in (20..30).chain(50..60) {
            if fit.forest().predict(data.row(i)).unwrap() == data.label(i) {
                correct += 1;
            }
        }
        assert!(correct >= 18, "held-out correct = {correct}/20");
    }

    #[test]
    fn empty_subset_error() {
        let data = make_separable_data();
        let err = RandomForestConfig::new(5)
            .unwrap()
            .fit_subset(&data, &[])
            .unwrap_err();
        assert!(matches!(err, ThicketError::EmptyDataset));
    }
}
