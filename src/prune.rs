//! Minimal cost-complexity (weakest-link) pruning.
//!
//! Repeatedly collapses the internal node whose removal costs the least
//! training impurity per leaf removed, until no collapse stays within the
//! caller's `alpha` budget. This walks the classic minimal cost-complexity
//! pruning path and stops at the smallest tree whose normalized impurity
//! increase does not exceed `alpha`.

use crate::node::Node;

/// Per-node subtree statistics used to rank collapse candidates.
#[derive(Debug, Clone, Copy)]
struct SubtreeStats {
    /// Number of leaves under (and including) this node.
    leaf_count: usize,
    /// Sample-weighted training impurity of the subtree's leaves,
    /// normalized by the root sample count.
    risk: f64,
}

/// Prune an arena-based tree in place and return the compacted arena.
///
/// The arena must be in pre-order (children at higher indices than their
/// parent), which is how the builder emits it. Deterministic: an exact tie
/// in the weakest-link score collapses the lowest node index.
pub(crate) fn prune_cost_complexity(mut nodes: Vec<Node>, alpha: f64) -> Vec<Node> {
    let n_root = nodes[0].n_samples() as f64;

    loop {
        if nodes[0].is_leaf() {
            return nodes;
        }

        // Bottom-up pass: pre-order guarantees children come after parents,
        // so a reverse index scan visits children first.
        let mut stats: Vec<SubtreeStats> = vec![
            SubtreeStats {
                leaf_count: 0,
                risk: 0.0,
            };
            nodes.len()
        ];
        for idx in (0..nodes.len()).rev() {
            stats[idx] = match &nodes[idx] {
                Node::Leaf {
                    impurity,
                    n_samples,
                    ..
                } => SubtreeStats {
                    leaf_count: 1,
                    risk: impurity.value() * (*n_samples as f64) / n_root,
                },
                Node::Split { left, right, .. } => {
                    let l = stats[left.index()];
                    let r = stats[right.index()];
                    SubtreeStats {
                        leaf_count: l.leaf_count + r.leaf_count,
                        risk: l.risk + r.risk,
                    }
                }
            };
        }

        // Weakest link: the internal node with the smallest impurity
        // increase per leaf removed. The arena is compacted after every
        // collapse, so every node here is reachable.
        let mut weakest: Option<(usize, f64)> = None;
        for (idx, node) in nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            let node_risk =
                node.impurity().value() * (node.n_samples() as f64) / n_root;
            let g = (node_risk - stats[idx].risk) / (stats[idx].leaf_count - 1) as f64;
            let better = match weakest {
                None => true,
                Some((_, best_g)) => g < best_g,
            };
            if better {
                weakest = Some((idx, g));
            }
        }

        match weakest {
            Some((idx, g)) if g <= alpha => {
                nodes[idx] = Node::leaf(
                    nodes[idx].n_samples(),
                    nodes[idx].n_positive(),
                    nodes[idx].impurity(),
                );
                nodes = compact(nodes);
            }
            _ => return nodes,
        }
    }
}

/// Rebuild the arena in pre-order, dropping unreachable nodes and
/// remapping child indices.
fn compact(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    copy_subtree(&nodes, 0, &mut out);
    out
}

fn copy_subtree(nodes: &[Node], idx: usize, out: &mut Vec<Node>) -> usize {
    let new_idx = out.len();
    out.push(nodes[idx].clone());
    if let Node::Split { left, right, .. } = nodes[idx] {
        let new_left = copy_subtree(nodes, left.index(), out);
        let new_right = copy_subtree(nodes, right.index(), out);
        if let Node::Split {
            left: l, right: r, ..
        } = &mut out[new_idx]
        {
            *l = crate::node::NodeIndex::new(new_left);
            *r = crate::node::NodeIndex::new(new_right);
        }
    }
    new_idx
}
