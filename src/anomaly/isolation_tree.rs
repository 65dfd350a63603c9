use ndarray::{Array2, ArrayView1};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::{float, FType};

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Average path length of an unsuccessful search in a binary search tree of `n` nodes.
///
/// This is the `c(n)` normalisation term of the isolation forest: it stands in for the
/// depth a leaf holding `n` samples would have grown to without the height limit.
pub fn average_path_length<F: FType>(n: usize) -> F {
    match n {
        0 | 1 => F::zero(),
        2 => F::one(),
        _ => {
            let n = n as f64;
            float(2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n)
        }
    }
}

/// Node struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node<F> {
    pub feature: usize, // Feature the node splits on
    pub threshold: F,   // Values <= threshold go left
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub n_samples: usize, // Training samples that reached the node
}

impl<F: FType> Node<F> {
    fn leaf(n_samples: usize) -> Self {
        Node {
            feature: 0,
            threshold: F::zero(),
            left: None,
            right: None,
            n_samples,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() || self.right.is_none()
    }
}

/// A single isolation tree.
///
/// Nodes are stored in a flat arena and refer to their children by index; the root is
/// always at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree<F> {
    nodes: Vec<Node<F>>,
    max_depth: usize,
}

impl<F: FType> IsolationTree<F> {
    /// Grow a tree over the given rows of `data` until every leaf holds a single sample,
    /// has only constant features left, or sits at `max_depth`.
    pub fn fit<R: Rng>(
        data: &Array2<F>,
        rows: Vec<usize>,
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        let mut tree = IsolationTree {
            nodes: Vec::with_capacity(2 * rows.len()),
            max_depth,
        };
        tree.grow(data, rows, 0, rng);
        tree
    }

    fn grow<R: Rng>(
        &mut self,
        data: &Array2<F>,
        rows: Vec<usize>,
        depth: usize,
        rng: &mut R,
    ) -> usize {
        let node_idx = self.nodes.len();
        self.nodes.push(Node::leaf(rows.len()));

        if rows.len() <= 1 || depth >= self.max_depth {
            return node_idx;
        }

        // Only features that still vary inside the node can separate its samples
        let candidates: Vec<(usize, F, F)> = (0..data.ncols())
            .filter_map(|feature| {
                let column = data.column(feature);
                let (min, max) = rows.iter().fold(
                    (F::infinity(), F::neg_infinity()),
                    |(min, max), &row| (min.min(column[row]), max.max(column[row])),
                );
                if min < max {
                    Some((feature, min, max))
                } else {
                    None
                }
            })
            .collect();

        let Some(&(feature, min, max)) = candidates.choose(rng) else {
            return node_idx;
        };
        let threshold = rng.gen_range(min..max);

        // threshold is in [min, max), so both sides end up non-empty
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&row| data[[row, feature]] <= threshold);

        let left = self.grow(data, left_rows, depth + 1, rng);
        let right = self.grow(data, right_rows, depth + 1, rng);

        let node = &mut self.nodes[node_idx];
        node.feature = feature;
        node.threshold = threshold;
        node.left = Some(left);
        node.right = Some(right);
        node_idx
    }

    /// Depth at which `x` gets isolated, corrected by `c(n)` for the samples left in its leaf.
    pub fn path_length(&self, x: &ArrayView1<F>) -> F {
        let mut node_idx = 0;
        let mut depth = F::zero();
        loop {
            let node = &self.nodes[node_idx];
            match (node.left, node.right) {
                (Some(left), Some(right)) => {
                    node_idx = if x[node.feature] <= node.threshold {
                        left
                    } else {
                        right
                    };
                    depth += F::one();
                }
                _ => return depth + average_path_length::<F>(node.n_samples),
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Depth of the deepest leaf.
    pub fn depth(&self) -> usize {
        fn walk<F>(nodes: &[Node<F>], idx: usize) -> usize {
            match (nodes[idx].left, nodes[idx].right) {
                (Some(l), Some(r)) => 1 + walk(nodes, l).max(walk(nodes, r)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    pub fn nodes(&self) -> &[Node<F>] {
        &self.nodes
    }

    #[cfg(test)]
    pub(crate) fn nodes_mut(&mut self) -> &mut [Node<F>] {
        &mut self.nodes
    }

    /// Check that the arena can be walked from the root for `n_features` inputs.
    ///
    /// Children always sit after their parent, so a valid tree is acyclic.
    pub fn check_structure(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match (node.left, node.right) {
                (None, None) => {}
                (Some(left), Some(right)) => {
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                    }
                    if node.feature >= n_features {
                        return Err(format!(
                            "node {idx} splits on feature {}, only {n_features} exist",
                            node.feature
                        ));
                    }
                    if !node.threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                }
                _ => return Err(format!("node {idx} has a single child")),
            }
        }
        Ok(())
    }
}
