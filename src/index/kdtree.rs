//! Exact k-d tree over dense feature vectors (Euclidean metric)

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct KdNode {
    /// Position of the point in `points`
    point: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// k-d tree stored as a flat node arena.
///
/// Points keep their insertion position, which is also the tie-break for
/// equal distances: the lower position wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KdTree {
    dimension: usize,
    points: Vec<Vec<f64>>,
    nodes: Vec<KdNode>,
    root: Option<usize>,
}

/// Search candidate ordered by (squared distance, position)
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist_sq: f64,
    position: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.position.cmp(&other.position))
    }
}

impl KdTree {
    /// Build a balanced tree by recursive median split.
    pub fn build(points: Vec<Vec<f64>>) -> Result<Self> {
        let dimension = points.first().map(|p| p.len()).unwrap_or(0);
        if points.iter().any(|p| p.len() != dimension) {
            return Err(Error::internal("k-d tree points have mixed dimensions"));
        }
        if points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::internal("k-d tree points must be finite"));
        }

        let mut tree = Self {
            dimension,
            points,
            nodes: Vec::new(),
            root: None,
        };
        if tree.dimension > 0 {
            let mut order: Vec<usize> = (0..tree.points.len()).collect();
            tree.nodes.reserve(order.len());
            tree.root = tree.build_node(&mut order, 0);
        }
        Ok(tree)
    }

    fn build_node(&mut self, order: &mut [usize], depth: usize) -> Option<usize> {
        if order.is_empty() {
            return None;
        }

        let axis = depth % self.dimension;
        let points = &self.points;
        order.sort_by(|&a, &b| {
            points[a][axis]
                .total_cmp(&points[b][axis])
                .then(a.cmp(&b))
        });

        let median = order.len() / 2;
        let point = order[median];
        let (left, rest) = order.split_at_mut(median);
        let right = &mut rest[1..];

        let left = self.build_node(left, depth + 1);
        let right = self.build_node(right, depth + 1);

        self.nodes.push(KdNode {
            point,
            axis,
            left,
            right,
        });
        Some(self.nodes.len() - 1)
    }

    /// Check the invariants of a tree that did not come from [`KdTree::build`].
    ///
    /// Node children precede their parent, the root is the last node, every
    /// point is referenced by exactly one node, and depth stays within what a
    /// median split produces. Violations are [`Error::CorruptBundle`].
    pub fn validate(&self) -> Result<()> {
        fn corrupt(msg: String) -> Result<()> {
            Err(Error::CorruptBundle(format!("k-d tree: {}", msg)))
        }

        if let Some(position) = self.points.iter().position(|p| p.len() != self.dimension) {
            return corrupt(format!(
                "point {} has dimension {}, expected {}",
                position,
                self.points[position].len(),
                self.dimension
            ));
        }
        if self.points.iter().flatten().any(|v| !v.is_finite()) {
            return corrupt("non-finite point value".to_string());
        }

        let n = self.nodes.len();
        let expected = if self.dimension == 0 { 0 } else { self.points.len() };
        if n != expected {
            return corrupt(format!("{} nodes for {} points", n, expected));
        }
        if self.root != n.checked_sub(1) {
            return corrupt("root is not the last node".to_string());
        }

        let mut referenced = vec![false; self.points.len()];
        let mut has_parent = vec![false; n];
        for (index, node) in self.nodes.iter().enumerate() {
            if node.axis >= self.dimension {
                return corrupt(format!("node {} splits on axis {}", index, node.axis));
            }
            match referenced.get_mut(node.point) {
                Some(seen) if !*seen => *seen = true,
                _ => {
                    return corrupt(format!(
                        "node {} references point {} out of range or twice",
                        index, node.point
                    ))
                }
            }
            for child in [node.left, node.right].into_iter().flatten() {
                if child >= index || has_parent[child] {
                    return corrupt(format!("node {} has invalid child {}", index, child));
                }
                has_parent[child] = true;
            }
        }
        if let Some(orphan) = (0..n.saturating_sub(1)).find(|&i| !has_parent[i]) {
            return corrupt(format!("node {} is unreachable", orphan));
        }

        let mut depth = vec![0usize; n];
        if let Some(root) = self.root {
            depth[root] = 1;
        }
        for index in (0..n).rev() {
            let node = &self.nodes[index];
            for child in [node.left, node.right].into_iter().flatten() {
                depth[child] = depth[index] + 1;
            }
        }
        let max_depth = depth.iter().copied().max().unwrap_or(0);
        let limit = (usize::BITS - n.leading_zeros()) as usize;
        if max_depth > limit {
            return corrupt(format!("depth {} exceeds {} for {} nodes", max_depth, limit, n));
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Stored point at an insertion position.
    pub fn point(&self, position: usize) -> Option<&[f64]> {
        self.points.get(position).map(|p| p.as_slice())
    }

    /// The `k` nearest points to `query` as `(position, distance)`, nearest
    /// first.
    pub fn nearest(&self, query: &[f64], k: usize) -> Result<Vec<(usize, f64)>> {
        if query.len() != self.dimension {
            return Err(Error::InvalidQuery(format!(
                "Query vector dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        let mut heap = BinaryHeap::with_capacity(k + 1);
        if k > 0 {
            if let Some(root) = self.root {
                self.search(root, query, k, &mut heap);
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| (c.position, c.dist_sq.sqrt()))
            .collect())
    }

    fn search(&self, node: usize, query: &[f64], k: usize, heap: &mut BinaryHeap<Candidate>) {
        let KdNode {
            point,
            axis,
            left,
            right,
        } = self.nodes[node];

        let candidate = Candidate {
            dist_sq: squared_distance(&self.points[point], query),
            position: point,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }

        let diff = query[axis] - self.points[point][axis];
        let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };

        if let Some(near) = near {
            self.search(near, query, k, heap);
        }
        if let Some(far) = far {
            // Equal distances must still be visited for the position tie-break.
            let bound = heap.peek().map(|worst| worst.dist_sq).unwrap_or(f64::INFINITY);
            if heap.len() < k || diff * diff <= bound {
                self.search(far, query, k, heap);
            }
        }
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
