//! ラベル付き疎行列のビルダー
//!
//! `行ラベル -> [(列ラベル, 重み)]`の対応から[`LabeledMatrix`]を構築します。

use hashbrown::HashMap;

use crate::matrix::{LabeledMatrix, Matrix, SparseMatrix};
use crate::options::Predicate;

/// 比較用にラベルを正規化します。
fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

/// [`LabeledMatrix`]を構築するビルダー
///
/// 行・列ラベルは前後の空白を除いて小文字化した形で比較されます。
/// ラベルとしては最初に現れた表記が使われます。
///
/// # 例
///
/// ```
/// # use thesaurus_rkyv::matrix::MatrixBuilder;
/// # use thesaurus_rkyv::options::Predicate;
/// let rows = vec![
///     ("b/N", vec![("y/V", 1.0), ("x/N", 2.0)]),
///     ("a/N", vec![("x/N", 0.5)]),
/// ];
/// let m = MatrixBuilder::new()
///     .column_filter(Predicate::from_set(["x/N"]))
///     .build(rows);
/// assert_eq!(m.columns(), &["x/N"]);
/// assert_eq!(m.rows(), &["b/N", "a/N"]);
/// assert_eq!(m.matrix().get(1, 0), Some(0.5));
/// ```
#[derive(Clone, Debug, Default)]
pub struct MatrixBuilder {
    row_filter: Predicate,
    column_filter: Predicate,
}

impl MatrixBuilder {
    /// すべての行・列を受理するビルダーを作成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// 行フィルタを設定します。
    pub fn row_filter(mut self, predicate: Predicate) -> Self {
        self.row_filter = predicate;
        self
    }

    /// 列フィルタを設定します。
    pub fn column_filter(mut self, predicate: Predicate) -> Self {
        self.column_filter = predicate;
        self
    }

    /// 行列を構築します。
    ///
    /// 正規化後に同じになる行は1行にまとめられ、後から現れた行の特徴量で
    /// 置き換えられます。行内で同じ列が重複した場合は最初の重みが使われます。
    /// 列フィルタの結果すべてゼロになった行も保持されます。
    pub fn build<I, R, C, K>(&self, rows: I) -> LabeledMatrix
    where
        I: IntoIterator<Item = (R, C)>,
        R: AsRef<str>,
        C: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut row_labels: Vec<String> = vec![];
        let mut row_ids: HashMap<String, usize> = HashMap::new();
        let mut row_features: Vec<Vec<(usize, f64)>> = vec![];

        // 出現順の仮の列ID
        let mut col_labels: Vec<String> = vec![];
        let mut col_ids: HashMap<String, usize> = HashMap::new();

        for (row, features) in rows {
            let label = row.as_ref().trim();
            let mut feats: Vec<(usize, f64)> = vec![];
            for (col, weight) in features {
                let col = col.as_ref().trim();
                let next = col_labels.len();
                let id = *col_ids.entry(normalize(col)).or_insert_with(|| {
                    col_labels.push(col.to_string());
                    next
                });
                if feats.iter().all(|&(c, _)| c != id) {
                    feats.push((id, weight));
                }
            }
            match row_ids.get(&normalize(label)) {
                Some(&i) => row_features[i] = feats,
                None => {
                    row_ids.insert(normalize(label), row_labels.len());
                    row_labels.push(label.to_string());
                    row_features.push(feats);
                }
            }
        }

        let kept_rows: Vec<usize> = (0..row_labels.len())
            .filter(|&i| self.row_filter.test(&row_labels[i]))
            .collect();

        let mut used = vec![false; col_labels.len()];
        for &i in &kept_rows {
            for &(c, _) in &row_features[i] {
                used[c] = true;
            }
        }
        let mut columns: Vec<usize> = (0..col_labels.len())
            .filter(|&c| used[c] && self.column_filter.test(&col_labels[c]))
            .collect();
        columns.sort_by(|&a, &b| col_labels[a].cmp(&col_labels[b]));

        let mut remap = vec![None; col_labels.len()];
        for (new_id, &old_id) in columns.iter().enumerate() {
            remap[old_id] = Some(new_id);
        }

        let remap = &remap;
        let triplets = kept_rows.iter().enumerate().flat_map(|(r, &i)| {
            row_features[i]
                .iter()
                .filter_map(move |&(c, w)| remap[c].map(|c| (r, c, w)))
        });
        let matrix = SparseMatrix::from_triplets(kept_rows.len(), columns.len(), triplets);
        let columns = columns.into_iter().map(|c| col_labels[c].clone()).collect();
        let rows = kept_rows.into_iter().map(|i| row_labels[i].clone()).collect();
        LabeledMatrix {
            matrix: Matrix::Sparse(matrix),
            columns,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_labels() {
        let m = MatrixBuilder::new().build(vec![
            (" Cat/N ", vec![("Big/J", 1.0), ("big/J", 5.0), ("b/N", 2.0)]),
            ("dog/N", vec![("B/N", 3.0)]),
            ("cat/N", vec![("big/J", 4.0)]),
        ]);
        assert_eq!(m.rows(), &["Cat/N", "dog/N"]);
        assert_eq!(m.columns(), &["Big/J", "b/N"]);
        assert_eq!(m.matrix().dense_row(0), Some(vec![4.0, 0.0]));
        assert_eq!(m.matrix().dense_row(1), Some(vec![0.0, 3.0]));
    }

    #[test]
    fn test_first_weight_wins_within_row() {
        let m = MatrixBuilder::new().build(vec![("a/N", vec![("x/N", 1.0), ("x/N", 2.0)])]);
        assert_eq!(m.matrix().get(0, 0), Some(1.0));
        assert_eq!(m.matrix().nnz(), 1);
    }

    #[test]
    fn test_zero_weights_not_stored() {
        let m = MatrixBuilder::new().build(vec![("a/N", vec![("x/N", 0.0), ("y/N", 1.0)])]);
        assert_eq!(m.columns(), &["x/N", "y/N"]);
        assert_eq!(m.matrix().nnz(), 1);
    }

    #[test]
    fn test_empty_input() {
        let rows: Vec<(&str, Vec<(&str, f64)>)> = vec![];
        let m = MatrixBuilder::new().build(rows);
        assert_eq!(m.matrix().shape(), (0, 0));
    }
}
