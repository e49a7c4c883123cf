//! 最近傍探索
//!
//! 行列の行（またはその部分集合）に対する k 近傍探索のインデックスを提供します。
//! 探索アルゴリズムは総当たりとkd木から選択でき、どちらも厳密な結果を返します。
//!
//! 結果は距離の昇順に並び、距離が等しい場合はスコープ内の位置の昇順になります。
mod kdtree;

use std::cmp::Ordering;

use crate::matrix::Matrix;
use crate::neighbours::kdtree::KdTree;

/// 距離関数
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Metric {
    /// ユークリッド距離
    #[default]
    Euclidean,
    /// コサイン距離（`1 - コサイン類似度`）
    Cosine,
}

/// 探索アルゴリズム
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// 総当たり
    #[default]
    Brute,
    /// kd木。ユークリッド距離でのみ使用されます。
    KdTree,
}

/// 近傍インデックスの設定
///
/// ```
/// # use thesaurus_rkyv::neighbours::{Algorithm, Metric, SimsConfig};
/// let config = SimsConfig::default()
///     .n_neighbours(3)
///     .algorithm(Algorithm::KdTree);
/// assert_eq!(config.metric, Metric::Euclidean);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimsConfig {
    /// 返す近傍の数
    pub n_neighbours: usize,

    /// 距離関数
    pub metric: Metric,

    /// 探索アルゴリズム
    pub algorithm: Algorithm,
}

impl Default for SimsConfig {
    fn default() -> Self {
        Self {
            n_neighbours: 10,
            metric: Metric::Euclidean,
            algorithm: Algorithm::Brute,
        }
    }
}

impl SimsConfig {
    /// 近傍数を設定します。
    pub fn n_neighbours(mut self, n: usize) -> Self {
        self.n_neighbours = n;
        self
    }

    /// 距離関数を設定します。
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// 探索アルゴリズムを設定します。
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }
}

/// インデックスの同一性を表すキー
///
/// 同じキーで再構築が要求された場合、既存のインデックスが再利用されます。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexKey {
    scope: Vec<usize>,
    metric: Metric,
    algorithm: Algorithm,
    n_neighbours: usize,
}

impl IndexKey {
    pub(crate) fn new(scope: Vec<usize>, config: &SimsConfig) -> Self {
        Self {
            scope,
            metric: config.metric,
            algorithm: config.algorithm,
            n_neighbours: config.n_neighbours,
        }
    }

    pub(crate) fn into_scope(self) -> Vec<usize> {
        self.scope
    }
}

/// ユークリッド距離
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

#[inline]
pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// コサイン類似度。どちらかがゼロベクトルの場合は0を返します。
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// 距離と位置の組を比較します。距離が等しい場合は位置の小さい方が先です。
#[inline]
pub(crate) fn by_distance(a: &(usize, f64), b: &(usize, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}

enum Backend {
    Brute,
    KdTree(KdTree),
}

/// 行の部分集合に対する近傍インデックス
pub struct NeighbourIndex {
    key: IndexKey,
    config: SimsConfig,
    n_cols: usize,
    points: Vec<f64>,
    backend: Backend,
}

impl NeighbourIndex {
    /// 行列の指定した行に対してインデックスを構築します。
    ///
    /// # 引数
    ///
    /// * `matrix` - 特徴行列
    /// * `scope` - インデックスに含める行番号。範囲外の行は無視されます。
    /// * `config` - 設定
    pub fn build(matrix: &Matrix, scope: Vec<usize>, config: SimsConfig) -> Self {
        let (n_rows, n_cols) = matrix.shape();
        let scope: Vec<usize> = scope.into_iter().filter(|&r| r < n_rows).collect();
        let mut points = Vec::with_capacity(scope.len() * n_cols);
        for &r in &scope {
            points.extend(matrix.dense_row(r).unwrap_or_else(|| vec![0.0; n_cols]));
        }

        let backend = match (config.algorithm, config.metric) {
            (Algorithm::KdTree, Metric::Euclidean) if n_cols > 0 => {
                Backend::KdTree(KdTree::build(&points, n_cols))
            }
            (Algorithm::KdTree, Metric::Euclidean) => {
                log::debug!("kd-tree needs at least one column, using brute force");
                Backend::Brute
            }
            (Algorithm::KdTree, Metric::Cosine) => {
                log::debug!("kd-tree does not support cosine distance, using brute force");
                Backend::Brute
            }
            (Algorithm::Brute, _) => Backend::Brute,
        };
        log::debug!(
            "built {:?} neighbour index over {} rows x {} columns",
            config.algorithm,
            scope.len(),
            n_cols
        );

        Self {
            key: IndexKey::new(scope, &config),
            config,
            n_cols,
            points,
            backend,
        }
    }

    /// `(スコープの行数, 列数)`
    pub fn fit_shape(&self) -> (usize, usize) {
        (self.key.scope.len(), self.n_cols)
    }

    /// インデックス対象の行番号
    pub fn scope(&self) -> &[usize] {
        &self.key.scope
    }

    /// 設定
    pub fn config(&self) -> &SimsConfig {
        &self.config
    }

    /// キャッシュキー
    pub fn key(&self) -> &IndexKey {
        &self.key
    }

    /// スコープ内の位置にある点
    pub(crate) fn point(&self, pos: usize) -> &[f64] {
        &self.points[pos * self.n_cols..(pos + 1) * self.n_cols]
    }

    /// 設定された距離関数で2点間の距離を計算します。
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self.config.metric {
            Metric::Euclidean => euclidean(a, b),
            Metric::Cosine => 1.0 - cosine_similarity(a, b),
        }
    }

    /// クエリに近い順に最大`n`個の`(スコープ内の位置, 距離)`を返します。
    pub fn kneighbors(&self, query: &[f64], n: usize) -> Vec<(usize, f64)> {
        let n = n.min(self.key.scope.len());
        if n == 0 || query.len() != self.n_cols {
            return vec![];
        }
        match &self.backend {
            Backend::KdTree(tree) => tree
                .nearest(&self.points, query, n)
                .into_iter()
                .map(|(pos, d2)| (pos, d2.sqrt()))
                .collect(),
            Backend::Brute => self.brute(query, n),
        }
    }

    fn brute(&self, query: &[f64], n: usize) -> Vec<(usize, f64)> {
        let mut results: Vec<(usize, f64)> = (0..self.key.scope.len())
            .map(|pos| {
                let p = self.point(pos);
                let d = match self.config.metric {
                    Metric::Euclidean => squared_euclidean(p, query),
                    Metric::Cosine => 1.0 - cosine_similarity(p, query),
                };
                (pos, d)
            })
            .collect();
        if n < results.len() {
            results.select_nth_unstable_by(n - 1, by_distance);
            results.truncate(n);
        }
        results.sort_by(by_distance);
        if self.config.metric == Metric::Euclidean {
            for r in &mut results {
                r.1 = r.1.sqrt();
            }
        }
        results
    }
}
