//! 行・列ラベル付きの密な表

use crate::errors::{Result, ThesaurusError};
use crate::matrix::{DenseMatrix, LabeledMatrix, Matrix};
use crate::utils::overlapping_pairs;

/// 行ラベル、列ラベル、行優先の値からなる密な表
#[derive(Clone, Debug, PartialEq)]
pub struct DenseFrame {
    index: Vec<String>,
    columns: Vec<String>,
    data: Vec<f64>,
}

impl DenseFrame {
    /// 新しい表を作成します。
    ///
    /// # エラー
    ///
    /// `data`の長さが`index.len() * columns.len()`と一致しない場合、または
    /// ラベルが重複している場合にエラーを返します。
    pub fn new(index: Vec<String>, columns: Vec<String>, data: Vec<f64>) -> Result<Self> {
        if data.len() != index.len() * columns.len() {
            return Err(ThesaurusError::invalid_argument(
                "data",
                format!(
                    "expected {} x {} values, got {}",
                    index.len(),
                    columns.len(),
                    data.len()
                ),
            ));
        }
        for (name, labels) in [("index", &index), ("columns", &columns)] {
            let mut sorted: Vec<&String> = labels.iter().collect();
            sorted.sort();
            if overlapping_pairs(&sorted).any(|(a, b)| a == b) {
                return Err(ThesaurusError::invalid_argument(
                    name,
                    "labels must be unique",
                ));
            }
        }
        Ok(Self {
            index,
            columns,
            data,
        })
    }

    /// 行ラベル
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// 列ラベル
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// 行優先の値
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// 列をラベル順に並べ替えた密行列に変換します。
    pub fn into_labeled(self) -> Result<LabeledMatrix> {
        let n_rows = self.index.len();
        let n_cols = self.columns.len();
        let mut order: Vec<usize> = (0..n_cols).collect();
        order.sort_by(|&a, &b| self.columns[a].cmp(&self.columns[b]));

        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(n_cols.max(1)).take(n_rows) {
            data.extend(order.iter().map(|&c| row[c]));
        }
        let columns = order.iter().map(|&c| self.columns[c].clone()).collect();
        let matrix = DenseMatrix::new(n_rows, n_cols, data)?;
        LabeledMatrix::new(Matrix::Dense(matrix), columns, self.index)
    }
}
