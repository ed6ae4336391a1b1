//! Binary classification with decision trees and random forests: train,
//! prune, evaluate, tune.
//!
//! Provides hand-rolled CART decision trees with Gini splits and minimal
//! cost-complexity pruning, bagged forests with parallel training via
//! rayon and out-of-bag evaluation, stratified k-fold cross-validation
//! scored by accuracy or ROC-AUC, and grid/random hyperparameter search.
//! All randomness flows from caller-supplied seeds, so every result is
//! reproducible.

mod cv;
mod dataset;
mod error;
mod forest;
mod metrics;
mod model;
mod node;
mod prune;
mod sampling;
mod search;
mod split;
mod tree;

pub use cv::{cross_validate, FoldAssignment, FoldScores, StratifiedKFold};
pub use dataset::Dataset;
pub use error::ThicketError;
pub use forest::{
    Mtry, OobMode, OobScore, RandomForest, RandomForestConfig, RandomForestFit, TrainingMetadata,
};
pub use metrics::{accuracy, roc_auc, BinaryConfusion, Metric};
pub use model::{Model, ModelConfig};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use sampling::{bootstrap_sample, BootstrapSample};
pub use search::{
    Candidate, GridSearch, ParamDomain, ParamGrid, ParamValue, RandomSearch, RandomSpace,
    SearchResult, Trial,
};
pub use split::gini;
pub use tree::{DecisionTree, DecisionTreeConfig, GrowthSummary};
