//! Gini impurity and best-split search over a row subset.

use crate::dataset::Dataset;
use crate::node::{FeatureIndex, Impurity};

/// Gini impurity of a binary label set: `1 - p0^2 - p1^2`.
///
/// Returns 0.0 for an empty set.
#[must_use]
pub fn gini(n_positive: usize, n_samples: usize) -> Impurity {
    if n_samples == 0 {
        return Impurity::new(0.0);
    }
    let p1 = n_positive as f64 / n_samples as f64;
    let p0 = 1.0 - p1;
    Impurity::new(1.0 - p0 * p0 - p1 * p1)
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value: rows with feature <= threshold go left.
    pub(crate) threshold: f64,
    /// Impurity gain: parent impurity minus the size-weighted child average.
    pub(crate) gain: f64,
    /// `gain * n_samples`, accumulated for feature importance.
    pub(crate) weighted_gain: f64,
    /// Row indices going to the left child.
    pub(crate) left_indices: Vec<usize>,
    /// Row indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Split threshold between two consecutive distinct sorted values.
///
/// The naive `(lo + hi) / 2.0` overflows to infinity near `f64::MAX`, and
/// for adjacent representable values the midpoint can round up to `hi`
/// itself; either way rows with value `hi` would land in the left child
/// and the partition degenerates. Computed via the half-difference and
/// clamped back to `lo` (a raw sorted value is a valid threshold) so the
/// result always satisfies `lo <= threshold < hi`.
fn midpoint(lo: f64, hi: f64) -> f64 {
    let mid = lo + (hi - lo) / 2.0;
    if mid < hi {
        mid
    } else {
        lo
    }
}

/// Find the best split of `sample_indices` among `candidate_features`.
///
/// For each candidate feature, `(value, row)` pairs are sorted and scanned
/// left-to-right with incremental class counts; candidate thresholds are
/// midpoints between consecutive distinct sorted values.
///
/// Determinism: candidates must be in ascending feature order and the
/// running best only improves on strict `>`, so an equal-gain tie resolves
/// to the lowest feature index, then the lowest threshold.
///
/// Returns `None` when the subset is pure or no split has strictly positive
/// gain with both children holding at least `min_node_size` rows.
pub(crate) fn find_best_split(
    data: &Dataset,
    sample_indices: &[usize],
    candidate_features: &[usize],
    min_node_size: usize,
) -> Option<SplitResult> {
    let n_samples = sample_indices.len();
    if n_samples < 2 {
        return None;
    }

    let parent_positive = data.count_positive(sample_indices);
    // Pure subsets cannot gain from any split.
    if parent_positive == 0 || parent_positive == n_samples {
        return None;
    }
    let parent_impurity = gini(parent_positive, n_samples).value();

    let mut best_gain = 0.0f64;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for &feat_idx in candidate_features {
        let col = data.column(feat_idx);

        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (col[si], data.label(si)))
            .collect();
        sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        // Incremental scan: left grows from empty, right shrinks from full.
        let mut left_positive = 0usize;

        for i in 0..(n_samples - 1) {
            let (val_i, label_i) = sorted[i];
            left_positive += label_i;

            // No valid boundary between identical values.
            let val_next = sorted[i + 1].0;
            if val_i == val_next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n_samples - n_left;
            if n_left < min_node_size || n_right < min_node_size {
                continue;
            }

            let left_impurity = gini(left_positive, n_left).value();
            let right_impurity = gini(parent_positive - left_positive, n_right).value();

            let gain = parent_impurity
                - (n_left as f64 / n_samples as f64) * left_impurity
                - (n_right as f64 / n_samples as f64) * right_impurity;

            if gain > best_gain {
                best_gain = gain;
                best = Some((FeatureIndex::new(feat_idx), midpoint(val_i, val_next)));
            }
        }
    }

    let (feature, threshold) = best?;

    // Partition the subset on the winning split.
    let col = data.column(feature.index());
    let mut left_indices = Vec::with_capacity(n_samples / 2);
    let mut right_indices = Vec::with_capacity(n_samples / 2);
    for &si in sample_indices {
        if col[si] <= threshold {
            left_indices.push(si);
        } else {
            right_indices.push(si);
        }
    }

    Some(SplitResult {
        feature,
        threshold,
        gain: best_gain,
        weighted_gain: best_gain * n_samples as f64,
        left_indices,
        right_indices,
    })
}
