//! ベクトル空間の入出力
//!
//! # 形式
//!
//! | 形式 | 内容 |
//! |------|------|
//! | プレーン | `entry<TAB>feature<TAB>weight...`。非ゼロ要素のみを出力 |
//! | gzip | プレーンと同じテキストをgzip圧縮 |
//! | 密ベクトル | マジックバイト、パディング、[`DenseVectors`]のrkyvアーカイブ |
//! | 密ベクトル(zstd) | 密ベクトルをzstd圧縮 |
//! | 疎トリプル | `<prefix>.sm`、`<prefix>.rows`、`<prefix>.cols`の3ファイル |

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use rkyv::rancor::Error;
use rkyv::util::AlignedVec;
use rkyv::{
    Archive, Deserialize, Serialize, access, api::serialize_using, ser::Serializer,
    ser::allocator::Arena, ser::sharing::Share, ser::writer::IoWriter, util::with_arena,
};

use crate::entries::Neighbour;
use crate::errors::{Result, ThesaurusError};
use crate::matrix::{DenseMatrix, LabeledMatrix, Matrix, SparseMatrix};
use crate::utils::{parse_tsv_row, write_atomic};

/// 密ベクトルファイルを識別するマジックバイト
pub const DENSE_MAGIC: &[u8] = b"ThesaurusDenseVectors 0.1\n";

const DENSE_MAGIC_LEN: usize = DENSE_MAGIC.len();
const RKYV_ALIGNMENT: usize = 16;
const PADDING_LEN: usize = (RKYV_ALIGNMENT - (DENSE_MAGIC_LEN % RKYV_ALIGNMENT)) % RKYV_ALIGNMENT;

const ZSTD_LEVEL: i32 = 19;

/// ベクトルの出力形式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VectorsFormat {
    /// タブ区切りテキスト
    #[default]
    Plain,
    /// gzip圧縮したタブ区切りテキスト
    Gzip,
    /// 密ベクトルバイナリ
    Dense,
    /// zstd圧縮した密ベクトルバイナリ
    DenseZstd,
}

impl std::str::FromStr for VectorsFormat {
    type Err = ThesaurusError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" | "tsv" => Ok(Self::Plain),
            "gzip" | "gz" => Ok(Self::Gzip),
            "dense" => Ok(Self::Dense),
            "dense-zstd" => Ok(Self::DenseZstd),
            _ => Err(ThesaurusError::invalid_argument(
                "format",
                format!("unknown vectors format {s:?}"),
            )),
        }
    }
}

/// 密ベクトルファイルの内容
#[derive(Clone, Debug, PartialEq, Archive, Serialize, Deserialize)]
pub struct DenseVectors {
    /// 行ラベル
    pub rows: Vec<String>,
    /// 列ラベル
    pub columns: Vec<String>,
    /// 行数
    pub n_rows: u64,
    /// 列数
    pub n_cols: u64,
    /// 行優先の値
    pub data: Vec<f64>,
}

impl DenseVectors {
    /// ラベル付き行列から作成します。
    pub fn from_labeled(matrix: &LabeledMatrix) -> Self {
        let (n_rows, n_cols) = matrix.matrix().shape();
        Self {
            rows: matrix.rows().to_vec(),
            columns: matrix.columns().to_vec(),
            n_rows: n_rows as u64,
            n_cols: n_cols as u64,
            data: matrix.matrix().to_dense().into_data(),
        }
    }

    /// 密行列のラベル付き行列に変換します。
    ///
    /// # エラー
    ///
    /// 行数・列数とラベルやデータの長さが一致しない場合にエラーを返します。
    pub fn into_labeled(self) -> Result<LabeledMatrix> {
        let n_rows = usize::try_from(self.n_rows)
            .map_err(|_| ThesaurusError::invalid_format("dense", "too many rows"))?;
        let n_cols = usize::try_from(self.n_cols)
            .map_err(|_| ThesaurusError::invalid_format("dense", "too many columns"))?;
        let matrix = DenseMatrix::new(n_rows, n_cols, self.data)?;
        LabeledMatrix::new(Matrix::Dense(matrix), self.columns, self.rows)
    }

    /// 各行の非ゼロ要素を近傍リストとして返します。
    ///
    /// すべてゼロの行は空のリストになります。
    ///
    /// # エラー
    ///
    /// [`Self::into_labeled`]と同じく、形とデータが一致しない場合にエラーを返します。
    pub fn into_entries(self) -> Result<Vec<(String, Vec<Neighbour>)>> {
        Ok(self.into_labeled()?.to_entries())
    }

    /// マジックバイトに続けてアーカイブを書き出します。
    pub fn write<W: Write>(&self, mut wtr: W) -> Result<()> {
        wtr.write_all(DENSE_MAGIC)?;
        wtr.write_all(&[0xFF; PADDING_LEN])?;
        with_arena(|arena: &mut Arena| {
            let writer = IoWriter::new(&mut wtr);
            let mut serializer = Serializer::new(writer, arena.acquire(), Share::new());
            serialize_using::<_, Error>(self, &mut serializer)
        })
        .map_err(|e| ThesaurusError::invalid_state("rkyv serialization failed", e.to_string()))?;
        Ok(())
    }

    /// マジックバイトから始まるストリームを読み込みます。
    ///
    /// # エラー
    ///
    /// マジックバイトが一致しない場合、またはアーカイブの検証に失敗した場合に
    /// エラーを返します。
    pub fn read<R: Read>(mut rdr: R) -> Result<Self> {
        let mut magic = [0; DENSE_MAGIC_LEN];
        rdr.read_exact(&mut magic)?;
        if magic != DENSE_MAGIC {
            return Err(ThesaurusError::invalid_format(
                "dense",
                "The magic number of the dense vectors file mismatches.",
            ));
        }
        let mut padding_buf = [0; PADDING_LEN];
        rdr.read_exact(&mut padding_buf)?;

        let mut buffer = Vec::new();
        rdr.read_to_end(&mut buffer)?;
        let mut aligned_bytes = AlignedVec::<16>::with_capacity(buffer.len());
        aligned_bytes.extend_from_slice(&buffer);

        let archived = access::<ArchivedDenseVectors, Error>(&aligned_bytes).map_err(|e| {
            ThesaurusError::invalid_state(
                "rkyv validation failed. The vectors file may be corrupted or incompatible.",
                e.to_string(),
            )
        })?;
        Ok(rkyv::deserialize::<Self, Error>(archived)?)
    }
}

/// 行列の非ゼロ要素をタブ区切りテキストとして書き出します。
pub fn write_tsv<W: Write>(mut wtr: W, matrix: &LabeledMatrix) -> Result<()> {
    let columns = matrix.columns();
    for (r, row) in matrix.rows().iter().enumerate() {
        wtr.write_all(row.as_bytes())?;
        for (c, v) in matrix.matrix().row_entries(r).unwrap_or_default() {
            write!(wtr, "\t{}\t{}", columns[c], v)?;
        }
        wtr.write_all(b"\n")?;
    }
    Ok(())
}

/// 指定した形式でファイルに書き出します。
pub fn write_path<P: AsRef<Path>>(
    path: P,
    matrix: &LabeledMatrix,
    format: VectorsFormat,
) -> Result<()> {
    write_atomic(path, |wtr| match format {
        VectorsFormat::Plain => write_tsv(wtr, matrix),
        VectorsFormat::Gzip => {
            let mut encoder = GzEncoder::new(wtr, Compression::default());
            write_tsv(&mut encoder, matrix)?;
            encoder.finish()?;
            Ok(())
        }
        VectorsFormat::Dense => DenseVectors::from_labeled(matrix).write(wtr),
        VectorsFormat::DenseZstd => {
            let mut encoder = zstd::Encoder::new(wtr, ZSTD_LEVEL)?;
            DenseVectors::from_labeled(matrix).write(&mut encoder)?;
            encoder.finish()?;
            Ok(())
        }
    })
}

fn with_extension(prefix: &Path, ext: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// 疎トリプル形式の3ファイルのパス`(.sm, .rows, .cols)`を返します。
pub fn sparse_file_paths<P: AsRef<Path>>(prefix: P) -> (PathBuf, PathBuf, PathBuf) {
    let prefix = prefix.as_ref();
    (
        with_extension(prefix, "sm"),
        with_extension(prefix, "rows"),
        with_extension(prefix, "cols"),
    )
}

/// 行列を疎トリプル形式で書き出します。
pub fn write_sparse_files<P: AsRef<Path>>(prefix: P, matrix: &LabeledMatrix) -> Result<()> {
    let (sm_path, rows_path, cols_path) = sparse_file_paths(prefix);
    let columns = matrix.columns();
    write_atomic(&sm_path, |wtr| {
        for (r, row) in matrix.rows().iter().enumerate() {
            for (c, v) in matrix.matrix().row_entries(r).unwrap_or_default() {
                writeln!(wtr, "{}\t{}\t{}", row, columns[c], v)?;
            }
        }
        Ok(())
    })?;
    write_atomic(&rows_path, |wtr| {
        for row in matrix.rows() {
            writeln!(wtr, "{row}")?;
        }
        Ok(())
    })?;
    write_atomic(&cols_path, |wtr| {
        for col in columns {
            writeln!(wtr, "{col}")?;
        }
        Ok(())
    })
}

fn read_labels(path: &Path) -> Result<Vec<String>> {
    let rdr = BufReader::new(File::open(path)?);
    let mut labels = vec![];
    for line in rdr.lines() {
        let line = line?;
        let label = line.trim_end_matches('\r');
        if !label.is_empty() {
            labels.push(label.to_string());
        }
    }
    Ok(labels)
}

fn read_cells(sm_path: &Path, rows: &[String], columns: &[String]) -> Result<Vec<Vec<(usize, f64)>>> {
    let row_ids: hashbrown::HashMap<&str, usize> =
        rows.iter().enumerate().map(|(i, r)| (r.as_str(), i)).collect();
    let col_ids: hashbrown::HashMap<&str, usize> =
        columns.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();

    let source_name = sm_path.display().to_string();
    let mut cells: Vec<Vec<(usize, f64)>> = vec![vec![]; rows.len()];
    let rdr = BufReader::new(File::open(sm_path)?);
    for (i, line) in rdr.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = parse_tsv_row(line.trim_end_matches('\r'));
        let [row, col, value] = fields.as_slice() else {
            return Err(ThesaurusError::corrupt_data(
                &source_name,
                line_no,
                format!("expected 3 fields, got {}", fields.len()),
            ));
        };
        let (Some(&r), Some(&c)) = (row_ids.get(row.as_str()), col_ids.get(col.as_str())) else {
            return Err(ThesaurusError::corrupt_data(
                &source_name,
                line_no,
                format!("unknown row {row:?} or column {col:?}"),
            ));
        };
        let value: f64 = value.trim().parse().map_err(|_| {
            ThesaurusError::corrupt_data(&source_name, line_no, format!("{value:?} is not a number"))
        })?;
        if value != 0.0 {
            cells[r].push((c, value));
        }
    }
    Ok(cells)
}

/// 疎トリプル形式の3ファイルを読み込みます。
///
/// 列は並べ替えられ、行は`.rows`ファイルの順序に従います。
///
/// # エラー
///
/// `.sm`ファイルの行が3列でない場合、値が数値でない場合、またはラベルが
/// `.rows`/`.cols`に存在しない場合に[`ThesaurusError::CorruptData`]を返します。
pub fn read_sparse_files<P: AsRef<Path>>(prefix: P) -> Result<LabeledMatrix> {
    let (sm_path, rows_path, cols_path) = sparse_file_paths(prefix);
    let rows = read_labels(&rows_path)?;
    let mut columns = read_labels(&cols_path)?;
    columns.sort();
    columns.dedup();

    let cells = read_cells(&sm_path, &rows, &columns)?;

    let triplets = cells.into_iter().enumerate().flat_map(|(r, mut row)| {
        row.sort_by_key(|&(c, _)| c);
        row.dedup_by_key(|&mut (c, _)| c);
        row.into_iter().map(move |(c, v)| (r, c, v))
    });
    let matrix = SparseMatrix::from_triplets(rows.len(), columns.len(), triplets);
    LabeledMatrix::new(Matrix::Sparse(matrix), columns, rows)
}
