/// Errors from tree induction, ensemble training, and model selection.
#[derive(Debug, thiserror::Error)]
pub enum ThicketError {
    /// Returned when the training dataset has zero rows.
    #[error("training dataset has zero rows")]
    EmptyDataset,

    /// Returned when rows have zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a row has a different number of features than expected.
    #[error("row {row_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the row.
        got: usize,
        /// The zero-based index of the offending row.
        row_index: usize,
    },

    /// Returned when the label count differs from the row count.
    #[error("got {got} labels for {expected} rows")]
    LabelCountMismatch {
        /// The number of rows in the dataset.
        expected: usize,
        /// The number of labels provided.
        got: usize,
    },

    /// Returned when a label is neither 0 nor 1.
    #[error("label at row {row_index} is {label}, expected 0 or 1")]
    InvalidLabel {
        /// The zero-based index of the offending row.
        row_index: usize,
        /// The offending label value.
        label: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at row {row_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending row.
        row_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when a prediction input has the wrong feature count.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when min_node_size is zero.
    #[error("min_node_size must be at least 1, got {min_node_size}")]
    InvalidMinNodeSize {
        /// The invalid min_node_size value provided.
        min_node_size: usize,
    },

    /// Returned when mtry resolves to 0 or exceeds the feature count.
    #[error("mtry resolved to {mtry}, but must be in [1, {n_features}]")]
    InvalidMtry {
        /// The resolved mtry value.
        mtry: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when cost_complexity_alpha is negative or not finite.
    #[error("cost_complexity_alpha must be finite and >= 0, got {alpha}")]
    InvalidAlpha {
        /// The invalid alpha value provided.
        alpha: f64,
    },

    /// Returned when n_folds is less than 2.
    #[error("n_folds must be at least 2, got {n_folds}")]
    InvalidFoldCount {
        /// The invalid n_folds value provided.
        n_folds: usize,
    },

    /// Returned when a class has fewer rows than the number of folds.
    #[error("class {class} has only {count} rows, need at least {n_folds} for stratified folds")]
    TooFewSamplesForFolds {
        /// The class label with insufficient rows.
        class: usize,
        /// The number of rows belonging to that class.
        count: usize,
        /// The requested number of folds.
        n_folds: usize,
    },

    /// Returned when a search is run over a space with no parameters.
    #[error("search space declares no hyperparameters")]
    EmptySearchSpace,

    /// Returned when a declared hyperparameter admits no values.
    #[error("hyperparameter {name} admits no values")]
    EmptyDomain {
        /// The name of the offending hyperparameter.
        name: String,
    },

    /// Returned when a metric cannot be computed on the given labels.
    #[error("metric undefined: {reason}")]
    MetricUndefined {
        /// Human-readable description of why the metric is undefined.
        reason: String,
    },

    /// Returned when OOB evaluation fails (no row has any OOB tree).
    #[error("OOB evaluation failed: {reason}")]
    OobEvaluationFailed {
        /// Human-readable description of why OOB evaluation failed.
        reason: String,
    },
}

impl ThicketError {
    /// Return `true` for hyperparameter-validation errors.
    ///
    /// A search skips configurations that fail with one of these variants
    /// and records them as missing; every other error aborts the search.
    #[must_use]
    pub fn is_hyperparameter(&self) -> bool {
        matches!(
            self,
            ThicketError::InvalidTreeCount { .. }
                | ThicketError::InvalidMinNodeSize { .. }
                | ThicketError::InvalidMtry { .. }
                | ThicketError::InvalidAlpha { .. }
                | ThicketError::InvalidFoldCount { .. }
        )
    }
}
