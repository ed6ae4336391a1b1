use std::fmt;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based column position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a specific node in a decision tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Gini impurity value of a binary label set.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    /// Create a new impurity value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A node in a decision tree arena.
///
/// Trees are stored as `Vec<Node>` in pre-order, with children referenced by
/// [`NodeIndex`] rather than pointers — cache-friendly, trivially
/// serializable, and every child index is greater than its parent's.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Threshold value: rows with feature <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Gini impurity at this node before splitting.
        impurity: Impurity,
        /// Number of training rows that reached this node.
        n_samples: usize,
        /// Number of class-1 training rows that reached this node.
        n_positive: usize,
        /// Impurity gain of this split, weighted by `n_samples`.
        weighted_gain: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Predicted class (0 or 1); leaf-level ties resolve to class 1.
        prediction: usize,
        /// Proportion of class-1 training rows in this leaf.
        p_positive: f64,
        /// Gini impurity at this leaf.
        impurity: Impurity,
        /// Number of training rows in this leaf.
        n_samples: usize,
        /// Number of class-1 training rows in this leaf.
        n_positive: usize,
    },
}

impl Node {
    /// Build a leaf from binary class counts.
    ///
    /// An exact 50/50 tie predicts class 1, the positive class. This is a
    /// documented policy, matching the ensemble-level vote tie-break.
    pub(crate) fn leaf(n_samples: usize, n_positive: usize, impurity: Impurity) -> Self {
        let p_positive = n_positive as f64 / n_samples as f64;
        let prediction = usize::from(2 * n_positive >= n_samples);
        Node::Leaf {
            prediction,
            p_positive,
            impurity,
            n_samples,
            n_positive,
        }
    }

    /// Return the impurity at this node (before splitting for interior nodes).
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training rows that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return the number of class-1 training rows that reached this node.
    #[must_use]
    pub fn n_positive(&self) -> usize {
        match self {
            Node::Split { n_positive, .. } | Node::Leaf { n_positive, .. } => *n_positive,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}
