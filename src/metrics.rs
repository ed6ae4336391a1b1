//! Evaluation metrics for binary classifiers.

use std::fmt;

use crate::error::ThicketError;

/// Which score cross-validation and search optimize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Metric {
    /// Fraction of correct hard predictions.
    Accuracy,
    /// Area under the ROC curve, computed from class-1 probabilities.
    RocAuc,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Accuracy => write!(f, "accuracy"),
            Metric::RocAuc => write!(f, "roc_auc"),
        }
    }
}

/// Fraction of predictions equal to the true label.
///
/// # Errors
///
/// Returns [`ThicketError::LabelCountMismatch`] when the slices differ in
/// length, and [`ThicketError::MetricUndefined`] when both are empty.
pub fn accuracy(labels: &[usize], predictions: &[usize]) -> Result<f64, ThicketError> {
    if labels.len() != predictions.len() {
        return Err(ThicketError::LabelCountMismatch {
            expected: labels.len(),
            got: predictions.len(),
        });
    }
    if labels.is_empty() {
        return Err(ThicketError::MetricUndefined {
            reason: "accuracy of an empty label set".to_string(),
        });
    }
    let correct = labels
        .iter()
        .zip(predictions)
        .filter(|&(&l, &p)| l == p)
        .count();
    Ok(correct as f64 / labels.len() as f64)
}

/// ROC-AUC via the rank-sum (Mann-Whitney U) identity, with midranks for
/// tied scores. O(n log n); equivalent to trapezoidal integration of the
/// ROC curve.
///
/// # Errors
///
/// Returns [`ThicketError::LabelCountMismatch`] when the slices differ in
/// length, and [`ThicketError::MetricUndefined`] when either class is
/// absent (the curve is degenerate).
pub fn roc_auc(labels: &[usize], scores: &[f64]) -> Result<f64, ThicketError> {
    if labels.len() != scores.len() {
        return Err(ThicketError::LabelCountMismatch {
            expected: labels.len(),
            got: scores.len(),
        });
    }

    let n = labels.len();
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(ThicketError::MetricUndefined {
            reason: "ROC-AUC needs both classes present".to_string(),
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_unstable_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Sum of positive-class ranks, assigning tied scores their midrank.
    let mut rank_sum_pos = 0.0f64;
    let mut i = 0usize;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; the tie group [i, j] shares the mean rank.
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum_pos += midrank;
            }
        }
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    let u = rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Ok(u / (n_pos_f * n_neg as f64))
}

/// A 2x2 confusion matrix with class 1 as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BinaryConfusion {
    /// Label 1 predicted as 1.
    pub tp: usize,
    /// Label 0 predicted as 1.
    pub fp: usize,
    /// Label 1 predicted as 0.
    pub fn_: usize,
    /// Label 0 predicted as 0.
    pub tn: usize,
}

impl BinaryConfusion {
    /// Build a confusion matrix from paired label/prediction slices.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::LabelCountMismatch`] when the slices differ
    /// in length.
    pub fn from_labels(labels: &[usize], predictions: &[usize]) -> Result<Self, ThicketError> {
        if labels.len() != predictions.len() {
            return Err(ThicketError::LabelCountMismatch {
                expected: labels.len(),
                got: predictions.len(),
            });
        }
        let mut m = Self::default();
        for (&l, &p) in labels.iter().zip(predictions) {
            match (l, p) {
                (1, 1) => m.tp += 1,
                (0, 1) => m.fp += 1,
                (1, 0) => m.fn_ += 1,
                _ => m.tn += 1,
            }
        }
        Ok(m)
    }

    /// Total number of counted pairs.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.fn_ + self.tn
    }

    /// Overall accuracy; 0.0 when the matrix is empty.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.tp + self.tn) as f64 / total as f64
    }

    /// Precision of class 1; 0.0 when nothing was predicted positive.
    #[must_use]
    pub fn precision(&self) -> f64 {
        let denom = self.tp + self.fp;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    /// Recall of class 1; 0.0 when no positives exist.
    #[must_use]
    pub fn recall(&self) -> f64 {
        let denom = self.tp + self.fn_;
        if denom == 0 {
            return 0.0;
        }
        self.tp as f64 / denom as f64
    }

    /// F1 score of class 1; 0.0 when precision and recall are both 0.
    #[must_use]
    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            return 0.0;
        }
        2.0 * p * r / (p + r)
    }
}

impl fmt::Display for BinaryConfusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "            pred 0   pred 1")?;
        writeln!(f, "true 0  {:>8} {:>8}", self.tn, self.fp)?;
        write!(f, "true 1  {:>8} {:>8}", self.fn_, self.tp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_basic() {
        let acc = accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]).unwrap();
        assert!((acc - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn accuracy_length_mismatch() {
        assert!(matches!(
            accuracy(&[0, 1], &[0]).unwrap_err(),
            ThicketError::LabelCountMismatch { .. }
        ));
    }

    #[test]
    fn accuracy_empty_undefined() {
        assert!(matches!(
            accuracy(&[], &[]).unwrap_err(),
            ThicketError::MetricUndefined { .. }
        ));
    }

    #[test]
    fn auc_perfect_when_scores_match_labels() {
        let labels = [0, 0, 1, 1];
        let scores = [0.0, 0.0, 1.0, 1.0];
        let auc = roc_auc(&labels, &scores).unwrap();
        assert!((auc - 1.0).abs() < 1e-12, "auc = {auc}");
    }

    #[test]
    fn auc_perfectly_wrong_is_zero() {
        let labels = [1, 1, 0, 0];
        let scores = [0.1, 0.2, 0.8, 0.9];
        let auc = roc_auc(&labels, &scores).unwrap();
        assert!((auc - 0.0).abs() < 1e-12, "auc = {auc}");
    }

    #[test]
    fn auc_constant_scores_is_half() {
        // All ties: the classifier is uninformative, AUC = 0.5 exactly.
        let labels = [0, 1, 0, 1, 1];
        let scores = [0.5, 0.5, 0.5, 0.5, 0.5];
        let auc = roc_auc(&labels, &scores).unwrap();
        assert!((auc - 0.5).abs() < 1e-12, "auc = {auc}");
    }

    #[test]
    fn auc_handles_partial_ties() {
        // One positive and one negative tied at 0.5: that pair contributes
        // 0.5 of a concordance. Pairs: (0.2,0.8)=1, (0.2,0.5)=1,
        // (0.5,0.8)=1, (0.5,0.5)=0.5 -> 3.5/4.
        let labels = [0, 0, 1, 1];
        let scores = [0.2, 0.5, 0.5, 0.8];
        let auc = roc_auc(&labels, &scores).unwrap();
        assert!((auc - 0.875).abs() < 1e-12, "auc = {auc}");
    }

    #[test]
    fn auc_single_class_undefined() {
        assert!(matches!(
            roc_auc(&[1, 1, 1], &[0.1, 0.2, 0.3]).unwrap_err(),
            ThicketError::MetricUndefined { .. }
        ));
        assert!(matches!(
            roc_auc(&[0, 0], &[0.1, 0.2]).unwrap_err(),
            ThicketError::MetricUndefined { .. }
        ));
    }

    #[test]
    fn confusion_counts_and_scores() {
        let labels = [1, 1, 1, 0, 0, 0, 1, 0];
        let preds = [1, 1, 0, 0, 0, 1, 1, 0];
        let m = BinaryConfusion::from_labels(&labels, &preds).unwrap();
        assert_eq!(m.tp, 3);
        assert_eq!(m.fn_, 1);
        assert_eq!(m.fp, 1);
        assert_eq!(m.tn, 3);
        assert!((m.accuracy() - 0.75).abs() < f64::EPSILON);
        assert!((m.precision() - 0.75).abs() < f64::EPSILON);
        assert!((m.recall() - 0.75).abs() < f64::EPSILON);
        assert!((m.f1() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn confusion_empty_scores_are_zero() {
        let m = BinaryConfusion::default();
        assert_eq!(m.accuracy(), 0.0);
        assert_eq!(m.precision(), 0.0);
        assert_eq!(m.recall(), 0.0);
        assert_eq!(m.f1(), 0.0);
    }

    #[test]
    fn metric_display() {
        assert_eq!(format!("{}", Metric::Accuracy), "accuracy");
        assert_eq!(format!("{}", Metric::RocAuc), "roc_auc");
    }
}
