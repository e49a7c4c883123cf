//! 厳密なユークリッド距離 k 近傍のためのkd木

use std::cmp::Ordering;

use crate::neighbours::{by_distance, squared_euclidean};

const LEAF_SIZE: usize = 8;

enum Node {
    Leaf {
        start: usize,
        end: usize,
    },
    Split {
        dim: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

/// 点の位置を並べ替えて保持するkd木
///
/// 点の座標自体は保持せず、探索時に行優先の座標配列を受け取ります。
pub(crate) struct KdTree {
    dims: usize,
    order: Vec<usize>,
    nodes: Vec<Node>,
}

impl KdTree {
    /// 行優先の座標配列から木を構築します。
    pub(crate) fn build(points: &[f64], dims: usize) -> Self {
        let n_points = if dims == 0 { 0 } else { points.len() / dims };
        let mut tree = Self {
            dims,
            order: (0..n_points).collect(),
            nodes: vec![],
        };
        if n_points > 0 {
            tree.build_node(points, 0, n_points);
        }
        tree
    }

    fn coord(points: &[f64], dims: usize, pos: usize, dim: usize) -> f64 {
        points[pos * dims + dim]
    }

    fn build_node(&mut self, points: &[f64], start: usize, end: usize) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { start, end });
        if end - start <= LEAF_SIZE {
            return id;
        }

        let dims = self.dims;
        let slice = &mut self.order[start..end];
        let (dim, spread) = (0..dims)
            .map(|d| {
                let (lo, hi) = slice.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| {
                    let x = Self::coord(points, dims, p, d);
                    (lo.min(x), hi.max(x))
                });
                (d, hi - lo)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .unwrap_or((0, 0.0));
        if spread <= 0.0 {
            return id;
        }

        let mid = slice.len() / 2;
        slice.select_nth_unstable_by(mid, |&a, &b| {
            Self::coord(points, dims, a, dim).total_cmp(&Self::coord(points, dims, b, dim))
        });
        let value = Self::coord(points, dims, slice[mid], dim);

        let left = self.build_node(points, start, start + mid);
        let right = self.build_node(points, start + mid, end);
        self.nodes[id] = Node::Split {
            dim,
            value,
            left,
            right,
        };
        id
    }

    /// `(位置, 二乗距離)`を近い順に最大`n`個返します。
    pub(crate) fn nearest(&self, points: &[f64], query: &[f64], n: usize) -> Vec<(usize, f64)> {
        let mut best = Vec::with_capacity(n + 1);
        if n > 0 && !self.nodes.is_empty() {
            self.search(0, points, query, n, &mut best);
        }
        best
    }

    fn search(
        &self,
        node: usize,
        points: &[f64],
        query: &[f64],
        n: usize,
        best: &mut Vec<(usize, f64)>,
    ) {
        match self.nodes[node] {
            Node::Leaf { start, end } => {
                for &pos in &self.order[start..end] {
                    let p = &points[pos * self.dims..(pos + 1) * self.dims];
                    let candidate = (pos, squared_euclidean(p, query));
                    if best.len() == n
                        && best
                            .last()
                            .is_some_and(|worst| by_distance(&candidate, worst) != Ordering::Less)
                    {
                        continue;
                    }
                    let i = best
                        .binary_search_by(|b| by_distance(b, &candidate))
                        .unwrap_or_else(|i| i);
                    best.insert(i, candidate);
                    best.truncate(n);
                }
            }
            Node::Split {
                dim,
                value,
                left,
                right,
            } => {
                let diff = query[dim] - value;
                let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };
                self.search(near, points, query, n, best);
                // 距離が等しい点は位置の比較が必要なため、境界上も探索する
                if best.len() < n || best.last().is_some_and(|worst| diff * diff <= worst.1) {
                    self.search(far, points, query, n, best);
                }
            }
        }
    }
}
