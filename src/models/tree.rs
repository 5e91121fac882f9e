//! CART regression tree with squared-error splits.
//!
//! Shared by the bagged and boosted ensembles. A split is kept only when
//! it reduces the squared-error loss `1/2 * sum(r^2)` by more than
//! `min_loss_reduction` and leaves at least `min_leaf` rows on each side.

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index::sample;

use super::traits::Regressor;

/// Structural limits for one tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    /// Maximum depth; `None` grows until other limits stop it.
    pub max_depth: Option<usize>,
    /// Minimum rows in each leaf.
    pub min_leaf: usize,
    /// Features sampled per split; `None` considers all.
    pub max_features: Option<usize>,
    /// Minimum loss reduction required to split.
    pub min_loss_reduction: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_leaf: 1,
            max_features: None,
            min_loss_reduction: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Fitted regression tree stored as a node arena; node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on the given row indices (repeats allowed).
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        rows: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut indices = rows.to_vec();
        if indices.is_empty() {
            tree.nodes.push(Node::Leaf(0.0));
            return tree;
        }
        tree.grow(&x, &y, &mut indices, 0, params, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &ArrayView2<'_, f64>,
        y: &ArrayView1<'_, f64>,
        indices: &mut [usize],
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let node_id = self.nodes.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
        self.nodes.push(Node::Leaf(mean));

        let min_leaf = params.min_leaf.max(1);
        if indices.len() < 2 * min_leaf || params.max_depth.is_some_and(|d| depth >= d) {
            return node_id;
        }

        let Some(best) = best_split(x, y, indices, min_leaf, params.max_features, rng) else {
            return node_id;
        };
        if 0.5 * best.gain <= params.min_loss_reduction || best.gain <= 1e-12 {
            return node_id;
        }

        let mid = partition(indices, |i| x[[i, best.feature]] <= best.threshold);
        let (left_rows, right_rows) = indices.split_at_mut(mid);
        let left = self.grow(x, y, left_rows, depth + 1, params, rng);
        let right = self.grow(x, y, right_rows, depth + 1, params, rng);

        self.nodes[node_id] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        node_id
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes[id] {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

impl Regressor for RegressionTree {
    fn predict_row(&self, x: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => id = if x[feature] <= threshold { left } else { right },
            }
        }
    }
}

/// Best squared-error split over a (possibly sampled) feature subset.
fn best_split(
    x: &ArrayView2<'_, f64>,
    y: &ArrayView1<'_, f64>,
    indices: &[usize],
    min_leaf: usize,
    max_features: Option<usize>,
    rng: &mut StdRng,
) -> Option<BestSplit> {
    let n_features = x.ncols();
    let features: Vec<usize> = match max_features {
        Some(m) if m < n_features => sample(rng, n_features, m.max(1)).into_vec(),
        _ => (0..n_features).collect(),
    };

    let n = indices.len();
    let total: f64 = indices.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;

    let mut order = indices.to_vec();
    let mut best: Option<BestSplit> = None;

    for feature in features {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += y[order[k - 1]];
            if k < min_leaf || n - k < min_leaf {
                continue;
            }
            let (lo, hi) = (x[[order[k - 1], feature]], x[[order[k], feature]]);
            if lo == hi {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64
                - parent_score;

            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: lo + (hi - lo) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}

/// Stable in-place partition; returns the number of rows satisfying `pred`.
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let (left, right): (Vec<usize>, Vec<usize>) = indices.iter().copied().partition(|&i| pred(i));
    let mid = left.len();
    for (slot, value) in indices.iter_mut().zip(left.into_iter().chain(right)) {
        *slot = value;
    }
    mid
}
