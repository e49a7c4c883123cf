//! 疎行列・密行列
//!
//! エントリテーブルを特徴行列として扱うための行列型を提供します。
//!
//! - [`SparseMatrix`]: [`sprs::CsMat`]によるCSR形式の疎行列
//! - [`DenseMatrix`]: [`ndarray::Array2`]による密行列
//! - [`Matrix`]: 上記のどちらかを保持し、統一的な行アクセスを提供する列挙型
//! - [`LabeledMatrix`]: 行列と行・列ラベルの組
mod builder;

use ndarray::{Array2, ArrayView1};
use sprs::{CsMat, TriMat};

use crate::entries::Neighbour;
use crate::errors::{Result, ThesaurusError};

pub use crate::matrix::builder::MatrixBuilder;

/// CSR形式の疎行列
///
/// 各行の列インデックスは昇順に並び、明示的なゼロは保持しません。
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    inner: CsMat<f64>,
}

impl SparseMatrix {
    /// CSR配列から疎行列を作成します。
    ///
    /// # エラー
    ///
    /// 配列の長さが不整合な場合、列インデックスが範囲外または行内で
    /// 昇順でない場合に[`ThesaurusError::InvalidArgument`]を返します。
    pub fn new(
        n_rows: usize,
        n_cols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> Result<Self> {
        let inner = CsMat::try_new((n_rows, n_cols), indptr, indices, data)
            .map_err(|(_, _, _, e)| ThesaurusError::invalid_argument("indptr", e.to_string()))?;
        Ok(Self { inner })
    }

    /// `(行, 列, 値)`の組から作成します。
    ///
    /// 値がゼロの組は保持されません。同じ位置の組は呼び出し側で除いておく必要があります。
    pub(crate) fn from_triplets<I>(n_rows: usize, n_cols: usize, triplets: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut tri = TriMat::new((n_rows, n_cols));
        for (r, c, v) in triplets {
            if v != 0.0 {
                tri.add_triplet(r, c, v);
            }
        }
        let inner: CsMat<f64> = tri.to_csr();
        Self { inner }
    }

    /// 内部のCSR行列
    #[inline(always)]
    pub fn as_csr(&self) -> &CsMat<f64> {
        &self.inner
    }

    /// `(行数, 列数)`
    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    /// 非ゼロ要素の数
    #[inline(always)]
    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    /// 要素の値を返します。範囲外の場合は`None`です。
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        let (n_rows, n_cols) = self.shape();
        if row >= n_rows || col >= n_cols {
            return None;
        }
        Some(self.inner.get(row, col).copied().unwrap_or(0.0))
    }

    /// 行の非ゼロ要素を`(列インデックス, 値)`の組で列順に返します。
    pub fn row_entries(&self, row: usize) -> Option<Vec<(usize, f64)>> {
        let view = self.inner.outer_view(row)?;
        Some(view.iter().map(|(c, &v)| (c, v)).collect())
    }

    /// 密行列に変換します。
    pub fn to_dense(&self) -> DenseMatrix {
        let mut inner = Array2::zeros(self.shape());
        for (r, row) in self.inner.outer_iterator().enumerate() {
            for (c, &v) in row.iter() {
                inner[[r, c]] = v;
            }
        }
        DenseMatrix { inner }
    }

    /// 列ごとの和
    pub fn column_sums(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.shape().1];
        for row in self.inner.outer_iterator() {
            for (c, &v) in row.iter() {
                sums[c] += v;
            }
        }
        sums
    }

    /// 行ごとの和
    pub fn row_sums(&self) -> Vec<f64> {
        self.inner
            .outer_iterator()
            .map(|row| row.data().iter().sum())
            .collect()
    }
}

/// 行優先の密行列
#[derive(Clone, Debug, PartialEq)]
pub struct DenseMatrix {
    inner: Array2<f64>,
}

impl DenseMatrix {
    /// 行優先のデータから密行列を作成します。
    ///
    /// # エラー
    ///
    /// `data`の長さが`n_rows * n_cols`と一致しない場合にエラーを返します。
    pub fn new(n_rows: usize, n_cols: usize, data: Vec<f64>) -> Result<Self> {
        let len = data.len();
        let inner = Array2::from_shape_vec((n_rows, n_cols), data).map_err(|e| {
            ThesaurusError::invalid_argument(
                "data",
                format!("expected {n_rows} x {n_cols} values, got {len}: {e}"),
            )
        })?;
        Ok(Self { inner })
    }

    /// 内部の配列
    #[inline(always)]
    pub fn as_array(&self) -> &Array2<f64> {
        &self.inner
    }

    /// `(行数, 列数)`
    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        self.inner.dim()
    }

    /// 要素の値を返します。範囲外の場合は`None`です。
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.inner.get((row, col)).copied()
    }

    /// 行への参照を返します。
    pub fn row(&self, row: usize) -> Option<ArrayView1<'_, f64>> {
        (row < self.inner.nrows()).then(|| self.inner.row(row))
    }

    /// 行優先の全データ
    pub(crate) fn into_data(self) -> Vec<f64> {
        self.inner.iter().copied().collect()
    }

    /// 疎行列に変換します。ゼロの要素は保持されません。
    pub fn to_sparse(&self) -> SparseMatrix {
        let (n_rows, n_cols) = self.shape();
        SparseMatrix::from_triplets(
            n_rows,
            n_cols,
            self.inner.indexed_iter().map(|((r, c), &v)| (r, c, v)),
        )
    }
}

/// 疎または密の行列
#[derive(Clone, Debug, PartialEq)]
pub enum Matrix {
    Sparse(SparseMatrix),
    Dense(DenseMatrix),
}

impl Matrix {
    /// `(行数, 列数)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Sparse(m) => m.shape(),
            Self::Dense(m) => m.shape(),
        }
    }

    /// 要素の値を返します。
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        match self {
            Self::Sparse(m) => m.get(row, col),
            Self::Dense(m) => m.get(row, col),
        }
    }

    /// 非ゼロ要素の数
    pub fn nnz(&self) -> usize {
        match self {
            Self::Sparse(m) => m.nnz(),
            Self::Dense(m) => m.inner.iter().filter(|&&v| v != 0.0).count(),
        }
    }

    /// 行を密なベクトルとして返します。
    pub fn dense_row(&self, row: usize) -> Option<Vec<f64>> {
        match self {
            Self::Sparse(m) => {
                let entries = m.row_entries(row)?;
                let mut v = vec![0.0; m.shape().1];
                for (c, x) in entries {
                    v[c] = x;
                }
                Some(v)
            }
            Self::Dense(m) => m.row(row).map(|r| r.to_vec()),
        }
    }

    /// 行の非ゼロ要素を`(列インデックス, 値)`の組で返します。
    pub fn row_entries(&self, row: usize) -> Option<Vec<(usize, f64)>> {
        match self {
            Self::Sparse(m) => m.row_entries(row),
            Self::Dense(m) => m.row(row).map(|r| {
                r.iter()
                    .copied()
                    .enumerate()
                    .filter(|&(_, v)| v != 0.0)
                    .collect()
            }),
        }
    }

    /// 疎行列であれば参照を返します。
    pub fn as_sparse(&self) -> Option<&SparseMatrix> {
        match self {
            Self::Sparse(m) => Some(m),
            Self::Dense(_) => None,
        }
    }

    /// 疎行列に変換します。
    pub fn to_sparse(&self) -> SparseMatrix {
        match self {
            Self::Sparse(m) => m.clone(),
            Self::Dense(m) => m.to_sparse(),
        }
    }

    /// 密行列に変換します。
    pub fn to_dense(&self) -> DenseMatrix {
        match self {
            Self::Sparse(m) => m.to_dense(),
            Self::Dense(m) => m.clone(),
        }
    }
}

/// 行・列ラベル付きの行列
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledMatrix {
    pub(crate) matrix: Matrix,
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<String>,
}

impl LabeledMatrix {
    /// 行列とラベルから作成します。
    ///
    /// # エラー
    ///
    /// ラベルの数が行列の形と一致しない場合にエラーを返します。
    pub fn new(matrix: Matrix, columns: Vec<String>, rows: Vec<String>) -> Result<Self> {
        if matrix.shape() != (rows.len(), columns.len()) {
            return Err(ThesaurusError::invalid_argument(
                "matrix",
                format!(
                    "shape {:?} does not match {} rows and {} columns",
                    matrix.shape(),
                    rows.len(),
                    columns.len()
                ),
            ));
        }
        Ok(Self {
            matrix,
            columns,
            rows,
        })
    }

    /// 行列
    #[inline(always)]
    pub fn matrix(&self) -> &Matrix {
        &self.matrix
    }

    /// 列ラベル
    #[inline(always)]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 行ラベル
    #[inline(always)]
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// 各行の非ゼロ要素を近傍リストとして返します。
    ///
    /// すべてゼロの行は空のリストになります。
    pub fn to_entries(&self) -> Vec<(String, Vec<Neighbour>)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(r, row)| {
                let neighbours = self
                    .matrix
                    .row_entries(r)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(c, v)| Neighbour::new(self.columns[c].as_str(), v))
                    .collect();
                (row.clone(), neighbours)
            })
            .collect()
    }

    /// `(行列, 列ラベル, 行ラベル)`に分解します。
    pub fn into_parts(self) -> (Matrix, Vec<String>, Vec<String>) {
        (self.matrix, self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SparseMatrix {
        // [[1, 0, 2],
        //  [0, 0, 0],
        //  [0, 3, 0]]
        SparseMatrix::new(3, 3, vec![0, 2, 2, 3], vec![0, 2, 1], vec![1., 2., 3.]).unwrap()
    }

    #[test]
    fn test_sparse_access() {
        let m = sample();
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.get(0, 2), Some(2.));
        assert_eq!(m.get(1, 1), Some(0.));
        assert_eq!(m.get(3, 0), None);
        assert_eq!(m.row_entries(1), Some(vec![]));
        assert_eq!(m.row_entries(3), None);
        assert_eq!(m.column_sums(), vec![1., 3., 2.]);
        assert_eq!(m.row_sums(), vec![3., 0., 3.]);
        assert_eq!(m.as_csr().indices(), &[0, 2, 1]);
    }

    #[test]
    fn test_invalid_csr() {
        assert!(SparseMatrix::new(1, 2, vec![0, 2], vec![1, 0], vec![1., 1.]).is_err());
        assert!(SparseMatrix::new(1, 2, vec![0, 1], vec![2], vec![1.]).is_err());
        assert!(SparseMatrix::new(2, 2, vec![0, 1], vec![0], vec![1.]).is_err());
        assert!(SparseMatrix::new(2, 2, vec![0, 1, 0], vec![0], vec![1.]).is_err());
    }

    #[test]
    fn test_from_triplets() {
        let m = SparseMatrix::from_triplets(3, 3, [(2, 1, 3.), (0, 2, 2.), (1, 0, 0.), (0, 0, 1.)]);
        assert_eq!(m, sample());
    }

    #[test]
    fn test_dense_conversion() {
        let m = sample();
        let d = m.to_dense();
        assert_eq!(d.row(0).unwrap().to_vec(), vec![1., 0., 2.]);
        assert_eq!(d.get(2, 1), Some(3.));
        assert_eq!(d.as_array()[[0, 2]], 2.);
        assert_eq!(d.to_sparse(), m);

        let matrix = Matrix::Dense(d);
        assert_eq!(matrix.nnz(), 3);
        assert_eq!(matrix.row_entries(2), Some(vec![(1, 3.)]));
        assert_eq!(Matrix::Sparse(m).dense_row(0), Some(vec![1., 0., 2.]));
    }

    #[test]
    fn test_dense_shape_mismatch() {
        assert!(DenseMatrix::new(2, 2, vec![0.; 3]).is_err());
        let empty = DenseMatrix::new(2, 0, vec![]).unwrap();
        assert_eq!(empty.to_sparse().shape(), (2, 0));
        assert!(empty.row(1).unwrap().is_empty());
        assert!(empty.row(2).is_none());
    }

    #[test]
    fn test_to_entries_keeps_zero_rows() {
        let labeled = LabeledMatrix::new(
            Matrix::Sparse(sample()),
            vec!["x".into(), "y".into(), "z".into()],
            vec!["a/N".into(), "b/N".into(), "c/N".into()],
        )
        .unwrap();
        let entries = labeled.to_entries();
        assert_eq!(entries[1], ("b/N".to_string(), vec![]));
        assert_eq!(
            entries[0].1,
            vec![Neighbour::new("x", 1.), Neighbour::new("z", 2.)]
        );
    }
}
