//! A closed family over the two model kinds.
//!
//! Cross-validation and hyperparameter search work against [`ModelConfig`]
//! and [`Model`] so one evaluation loop serves both single trees and
//! forests, with exhaustive matches instead of dynamic dispatch.

use crate::dataset::Dataset;
use crate::error::ThicketError;
use crate::forest::{RandomForest, RandomForestConfig};
use crate::tree::{DecisionTree, DecisionTreeConfig};

/// Configuration for either model kind.
#[derive(Debug, Clone)]
pub enum ModelConfig {
    /// A single decision tree.
    Tree(DecisionTreeConfig),
    /// A random forest ensemble.
    Forest(RandomForestConfig),
}

impl ModelConfig {
    /// Train on every row of the dataset.
    ///
    /// # Errors
    ///
    /// Propagates the underlying model's validation and training errors.
    pub fn fit(&self, data: &Dataset) -> Result<Model, ThicketError> {
        self.fit_subset(data, &data.all_indices())
    }

    /// Train on a row index subset.
    ///
    /// # Errors
    ///
    /// Propagates the underlying model's validation and training errors.
    pub fn fit_subset(&self, data: &Dataset, sample_indices: &[usize]) -> Result<Model, ThicketError> {
        match self {
            ModelConfig::Tree(config) => {
                Ok(Model::Tree(config.fit_subset(data, sample_indices)?))
            }
            ModelConfig::Forest(config) => Ok(Model::Forest(
                config.fit_subset(data, sample_indices)?.into_forest(),
            )),
        }
    }

    /// Return a copy with the seed shifted by `offset` (wrapping).
    ///
    /// Fold evaluation uses this so each fold trains with distinct but
    /// reproducible randomness.
    #[must_use]
    pub fn with_seed_offset(&self, offset: u64) -> Self {
        match self {
            ModelConfig::Tree(config) => {
                let seed = config.seed().wrapping_add(offset);
                ModelConfig::Tree(config.clone().with_seed(seed))
            }
            ModelConfig::Forest(config) => {
                let seed = config.seed().wrapping_add(offset);
                ModelConfig::Forest(config.clone().with_seed(seed))
            }
        }
    }
}

/// A fitted model of either kind.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Model {
    /// A fitted decision tree.
    Tree(DecisionTree),
    /// A fitted random forest.
    Forest(RandomForest),
}

impl Model {
    /// Predict the class label (0 or 1) of one row.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::PredictionFeatureMismatch`] when
    /// `row.len()` differs from the training feature count.
    pub fn predict(&self, row: &[f64]) -> Result<usize, ThicketError> {
        match self {
            Model::Tree(tree) => tree.predict(row),
            Model::Forest(forest) => forest.predict(row),
        }
    }

    /// Return the class-1 probability of one row.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::PredictionFeatureMismatch`] when
    /// `row.len()` differs from the training feature count.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, ThicketError> {
        match self {
            Model::Tree(tree) => tree.predict_proba(row),
            Model::Forest(forest) => forest.predict_proba(row),
        }
    }

    /// Normalized mean-decrease-in-impurity feature importances.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        match self {
            Model::Tree(tree) => tree.feature_importances(),
            Model::Forest(forest) => forest.feature_importances(),
        }
    }

    /// Return the number of features the model was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        match self {
            Model::Tree(tree) => tree.n_features(),
            Model::Forest(forest) => forest.n_features(),
        }
    }
}
