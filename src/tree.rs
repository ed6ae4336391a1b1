use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::dataset::Dataset;
use crate::error::ThicketError;
use crate::node::{Node, NodeIndex};
use crate::prune::prune_cost_complexity;
use crate::split::{find_best_split, gini};

/// Configuration for a single CART-style decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter               | Default            |
/// |-------------------------|--------------------|
/// | `max_depth`             | `None` (unlimited) |
/// | `min_node_size`         | 1                  |
/// | `cost_complexity_alpha` | 0.0 (no pruning)   |
/// | `mtry`                  | `None` (all features) |
/// | `seed`                  | 42                 |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_node_size: usize,
    pub(crate) cost_complexity_alpha: f64,
    pub(crate) mtry: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_node_size: 1,
            cost_complexity_alpha: 0.0,
            mtry: None,
            seed: 42,
        }
    }

    /// Set the maximum tree depth.
    ///
    /// `None` grows until leaves are pure or stopping conditions are met.
    /// `Some(0)` is legal and yields a single-leaf tree (the root is depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of rows a node needs to be split, and that
    /// each child must retain after a split.
    #[must_use]
    pub fn with_min_node_size(mut self, min_node_size: usize) -> Self {
        self.min_node_size = min_node_size;
        self
    }

    /// Set the cost-complexity pruning strength. 0.0 disables pruning.
    #[must_use]
    pub fn with_cost_complexity_alpha(mut self, alpha: f64) -> Self {
        self.cost_complexity_alpha = alpha;
        self
    }

    /// Set the number of features randomly offered at each split.
    ///
    /// `None` offers all features at every node.
    #[must_use]
    pub fn with_mtry(mut self, mtry: Option<usize>) -> Self {
        self.mtry = mtry;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum node size.
    #[must_use]
    pub fn min_node_size(&self) -> usize {
        self.min_node_size
    }

    /// Return the cost-complexity pruning strength.
    #[must_use]
    pub fn cost_complexity_alpha(&self) -> f64 {
        self.cost_complexity_alpha
    }

    /// Return the per-split feature candidate count, if restricted.
    #[must_use]
    pub fn mtry(&self) -> Option<usize> {
        self.mtry
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a decision tree on every row of the dataset.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                  |
    /// |---------------------------------------|---------------------------------------|
    /// | [`ThicketError::InvalidMinNodeSize`]  | `min_node_size` < 1                   |
    /// | [`ThicketError::InvalidAlpha`]        | alpha is negative or not finite       |
    /// | [`ThicketError::InvalidMtry`]         | `mtry` outside `[1, n_features]`      |
    #[instrument(skip(self, data), fields(n_samples = data.n_samples()))]
    pub fn fit(&self, data: &Dataset) -> Result<DecisionTree, ThicketError> {
        self.fit_subset(data, &data.all_indices())
    }

    /// Train a decision tree on a row index subset.
    ///
    /// Indices may repeat (bootstrap draws); each occurrence counts once.
    /// Ensembles and fold evaluation use this to share one dataset without
    /// copying rows.
    ///
    /// # Errors
    ///
    /// As [`DecisionTreeConfig::fit`], plus [`ThicketError::EmptyDataset`]
    /// when `sample_indices` is empty.
    pub fn fit_subset(
        &self,
        data: &Dataset,
        sample_indices: &[usize],
    ) -> Result<DecisionTree, ThicketError> {
        if sample_indices.is_empty() {
            return Err(ThicketError::EmptyDataset);
        }
        if self.min_node_size < 1 {
            return Err(ThicketError::InvalidMinNodeSize {
                min_node_size: self.min_node_size,
            });
        }
        if !self.cost_complexity_alpha.is_finite() || self.cost_complexity_alpha < 0.0 {
            return Err(ThicketError::InvalidAlpha {
                alpha: self.cost_complexity_alpha,
            });
        }
        let n_features = data.n_features();
        if let Some(m) = self.mtry {
            if m == 0 || m > n_features {
                return Err(ThicketError::InvalidMtry {
                    mtry: m,
                    n_features,
                });
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();
        let mut growth = GrowthSummary::default();

        build_tree(
            data,
            sample_indices,
            self,
            0,
            &mut rng,
            &mut arena,
            &mut growth,
        );

        if self.cost_complexity_alpha > 0.0 {
            let before = arena.len();
            arena = prune_cost_complexity(arena, self.cost_complexity_alpha);
            debug!(
                nodes_before = before,
                nodes_after = arena.len(),
                alpha = self.cost_complexity_alpha,
                "cost-complexity pruning applied"
            );
        }

        debug!(
            n_nodes = arena.len(),
            early_pure_leaves = growth.early_pure_leaves,
            "decision tree built"
        );

        Ok(DecisionTree {
            nodes: arena,
            n_features,
            growth,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively build the arena-based decision tree.
///
/// Returns the [`NodeIndex`] of the node just created in `arena`.
fn build_tree(
    data: &Dataset,
    sample_indices: &[usize],
    config: &DecisionTreeConfig,
    depth: usize,
    rng: &mut ChaCha8Rng,
    arena: &mut Vec<Node>,
    growth: &mut GrowthSummary,
) -> NodeIndex {
    let n_samples = sample_indices.len();
    let n_positive = data.count_positive(sample_indices);
    let impurity = gini(n_positive, n_samples);

    let depth_reached = config.max_depth.map_or(false, |max_d| depth >= max_d);
    let too_few = n_samples < config.min_node_size;
    let pure = n_positive == 0 || n_positive == n_samples;

    if pure || too_few || depth_reached {
        // A pure leaf before the depth limit is a convergence signal,
        // not a failure.
        if pure && !depth_reached {
            growth.early_pure_leaves += 1;
        }
        let idx = arena.len();
        arena.push(Node::leaf(n_samples, n_positive, impurity));
        return NodeIndex::new(idx);
    }

    let candidates = draw_candidates(data.n_features(), config.mtry, rng);
    let split = match find_best_split(data, sample_indices, &candidates, config.min_node_size) {
        Some(s) => s,
        None => {
            let idx = arena.len();
            arena.push(Node::leaf(n_samples, n_positive, impurity));
            return NodeIndex::new(idx);
        }
    };

    // Arena pattern: reserve the parent's index, recurse, then overwrite.
    let node_idx = arena.len();
    arena.push(Node::leaf(n_samples, n_positive, impurity));

    let left_idx = build_tree(
        data,
        &split.left_indices,
        config,
        depth + 1,
        rng,
        arena,
        growth,
    );
    let right_idx = build_tree(
        data,
        &split.right_indices,
        config,
        depth + 1,
        rng,
        arena,
        growth,
    );

    arena[node_idx] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: left_idx,
        right: right_idx,
        impurity,
        n_samples,
        n_positive,
        weighted_gain: split.weighted_gain,
    };

    NodeIndex::new(node_idx)
}

/// Draw the candidate feature set for one node.
///
/// With `mtry` unset (or equal to the feature count) every feature is a
/// candidate and the RNG is left untouched. Otherwise a fresh partial
/// Fisher-Yates draw of `mtry` features is taken from the builder's stream
/// and sorted ascending so the split tie-break order is preserved.
fn draw_candidates(n_features: usize, mtry: Option<usize>, rng: &mut ChaCha8Rng) -> Vec<usize> {
    match mtry {
        Some(m) if m < n_features => {
            let mut order: Vec<usize> = (0..n_features).collect();
            for i in 0..m {
                let j = rng.gen_range(i..n_features);
                order.swap(i, j);
            }
            order.truncate(m);
            order.sort_unstable();
            order
        }
        _ => (0..n_features).collect(),
    }
}

/// Signals gathered while growing a tree.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct GrowthSummary {
    /// Number of leaves that became pure before any depth limit applied.
    pub early_pure_leaves: usize,
}

/// A fitted binary-classification decision tree.
///
/// Stored as a pre-order `Vec<Node>` arena with index references for
/// cache-friendly traversal and trivial serialization.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) growth: GrowthSummary,
}

impl DecisionTree {
    /// Predict the class label (0 or 1) for a single row.
    ///
    /// Traverses from the root: at each split, goes left when
    /// `row[feature] <= threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::PredictionFeatureMismatch`] when
    /// `row.len() != n_features`.
    pub fn predict(&self, row: &[f64]) -> Result<usize, ThicketError> {
        let leaf = self.traverse(row)?;
        match &self.nodes[leaf] {
            Node::Leaf { prediction, .. } => Ok(*prediction),
            Node::Split { .. } => unreachable!("traverse always ends at a leaf"),
        }
    }

    /// Return the class-1 probability for a single row.
    ///
    /// # Errors
    ///
    /// Returns [`ThicketError::PredictionFeatureMismatch`] when
    /// `row.len() != n_features`.
    pub fn predict_proba(&self, row: &[f64]) -> Result<f64, ThicketError> {
        let leaf = self.traverse(row)?;
        match &self.nodes[leaf] {
            Node::Leaf { p_positive, .. } => Ok(*p_positive),
            Node::Split { .. } => unreachable!("traverse always ends at a leaf"),
        }
    }

    /// Compute mean-decrease-in-impurity feature importances.
    ///
    /// For each split node, the sample-weighted impurity gain is accumulated
    /// by feature, then the totals are normalized to sum to 1.0. Returns a
    /// `Vec` of length `n_features`; all zeros when the tree is one leaf.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for node in &self.nodes {
            if let Node::Split {
                feature,
                weighted_gain,
                ..
            } = node
            {
                totals[feature.index()] += weighted_gain;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the read-only node arena, for reporting and visualization.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Return growth signals recorded while fitting.
    #[must_use]
    pub fn growth(&self) -> &GrowthSummary {
        &self.growth
    }

    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the total number of nodes (splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree (a single-leaf tree has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => {
                    if d > max_depth {
                        max_depth = d;
                    }
                }
                Node::Split { left, right, .. } => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }

    /// Traverse the tree from the root and return the arena index of the leaf.
    fn traverse(&self, row: &[f64]) -> Result<usize, ThicketError> {
        if row.len() != self.n_features {
            return Err(ThicketError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return Ok(idx),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if row[feature.index()] <= *threshold {
                        idx = left.index();
                    } else {
                        idx = right.index();
                    }
                }
            }
        }
    }
}
