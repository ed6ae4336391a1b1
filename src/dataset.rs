//! Validated, immutable training table for binary classification.

use crate::error::ThicketError;

/// An immutable table of numeric feature rows with binary labels.
///
/// Validation happens once at construction; every downstream component
/// (tree builders, ensembles, fold evaluation) trusts the invariants and
/// works on row *index sets* into the shared table, never on copied rows.
///
/// A column-major copy of the features is built alongside the row-major
/// data so split scans can walk one feature contiguously.
#[derive(Debug, Clone)]
pub struct Dataset {
    rows: Vec<Vec<f64>>,
    columns: Vec<Vec<f64>>,
    labels: Vec<usize>,
    n_positive: usize,
}

impl Dataset {
    /// Build a dataset from row-major features and binary labels.
    ///
    /// `rows[row_idx][feature_idx]`, `labels[row_idx]` in {0, 1}.
    ///
    /// # Errors
    ///
    /// | Variant                                | When                               |
    /// |----------------------------------------|------------------------------------|
    /// | [`ThicketError::EmptyDataset`]         | `rows` is empty                    |
    /// | [`ThicketError::ZeroFeatures`]         | rows have zero feature columns     |
    /// | [`ThicketError::LabelCountMismatch`]   | `labels.len() != rows.len()`       |
    /// | [`ThicketError::FeatureCountMismatch`] | rows have inconsistent lengths     |
    /// | [`ThicketError::NonFiniteValue`]       | any value is NaN or infinite       |
    /// | [`ThicketError::InvalidLabel`]         | a label is neither 0 nor 1         |
    pub fn new(rows: Vec<Vec<f64>>, labels: Vec<usize>) -> Result<Self, ThicketError> {
        if rows.is_empty() {
            return Err(ThicketError::EmptyDataset);
        }
        let n_samples = rows.len();
        let n_features = rows[0].len();
        if n_features == 0 {
            return Err(ThicketError::ZeroFeatures);
        }
        if labels.len() != n_samples {
            return Err(ThicketError::LabelCountMismatch {
                expected: n_samples,
                got: labels.len(),
            });
        }

        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(ThicketError::FeatureCountMismatch {
                    expected: n_features,
                    got: row.len(),
                    row_index,
                });
            }
            for (feature_index, &val) in row.iter().enumerate() {
                if !val.is_finite() {
                    return Err(ThicketError::NonFiniteValue {
                        row_index,
                        feature_index,
                    });
                }
            }
        }

        let mut n_positive = 0usize;
        for (row_index, &label) in labels.iter().enumerate() {
            if label > 1 {
                return Err(ThicketError::InvalidLabel { row_index, label });
            }
            n_positive += label;
        }

        let columns: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| rows.iter().map(|row| row[feat_idx]).collect())
            .collect();

        Ok(Self {
            rows,
            columns,
            labels,
            n_positive,
        })
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Return the number of class-1 rows.
    #[must_use]
    pub fn n_positive(&self) -> usize {
        self.n_positive
    }

    /// Return the feature vector of one row.
    #[must_use]
    pub fn row(&self, row_index: usize) -> &[f64] {
        &self.rows[row_index]
    }

    /// Return one feature column across all rows.
    #[must_use]
    pub fn column(&self, feature_index: usize) -> &[f64] {
        &self.columns[feature_index]
    }

    /// Return all labels.
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Return the label of one row.
    #[must_use]
    pub fn label(&self, row_index: usize) -> usize {
        self.labels[row_index]
    }

    /// Return the full row index set `[0, n_samples)`.
    #[must_use]
    pub fn all_indices(&self) -> Vec<usize> {
        (0..self.n_samples()).collect()
    }

    /// Count class-1 rows among an index subset.
    pub(crate) fn count_positive(&self, indices: &[usize]) -> usize {
        indices.iter().map(|&i| self.labels[i]).sum()
    }
}
