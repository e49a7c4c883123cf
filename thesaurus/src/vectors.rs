//! ベクトル空間
//!
//! [`Vectors`]はエントリテーブルを特徴行列として解釈し、行列の構築・直列化・
//! 最近傍検索を提供します。
//!
//! # 例
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use thesaurus_rkyv::{SimsConfig, Vectors};
//!
//! let text = "cat/N\tfur/N\t1.0\tpet/N\t0.8\n\
//!             dog/N\tfur/N\t0.9\tpet/N\t0.9\n\
//!             car/N\twheel/N\t1.0\n";
//! let mut vectors = Vectors::from_reader(text.as_bytes(), Default::default())?;
//! assert_eq!(vectors.columns(), &["fur/N", "pet/N", "wheel/N"]);
//!
//! vectors.init_sims(None, SimsConfig::default().n_neighbours(1));
//! let neighbours = vectors.get_nearest_neighbours("cat/N");
//! assert_eq!(neighbours[0].0, "dog/N");
//! # Ok(())
//! # }
//! ```
pub mod frame;
pub mod io;

use std::borrow::Cow;
use std::io::BufRead;
use std::path::Path;
use std::sync::OnceLock;

use hashbrown::{HashMap, HashSet};

use crate::entries::{EntryLookup, EntryTable, Neighbour};
use crate::errors::Result;
use crate::loader::{self, Payload};
use crate::matrix::{LabeledMatrix, MatrixBuilder, SparseMatrix};
use crate::neighbours::{self, IndexKey, NeighbourIndex, SimsConfig, by_distance};
use crate::options::LoadOptions;
use crate::tokens::DocumentFeature;

pub use crate::vectors::frame::DenseFrame;
pub use crate::vectors::io::{DenseVectors, VectorsFormat};

/// 特徴ベクトルの集合
pub struct Vectors {
    table: EntryTable,
    options: LoadOptions,
    matrix: OnceLock<LabeledMatrix>,
    row_index: OnceLock<HashMap<String, usize>>,
    allow_lexical_overlap: bool,
    index: Option<NeighbourIndex>,
    default_index: OnceLock<NeighbourIndex>,
}

impl Vectors {
    fn new(table: EntryTable, options: LoadOptions, matrix: Option<LabeledMatrix>) -> Self {
        let matrix = match matrix {
            Some(m) => OnceLock::from(m),
            None => OnceLock::new(),
        };
        Self {
            table,
            allow_lexical_overlap: options.allow_lexical_overlap,
            options,
            matrix,
            row_index: OnceLock::new(),
            index: None,
            default_index: OnceLock::new(),
        }
    }

    fn from_labeled(labeled: LabeledMatrix, options: LoadOptions) -> Self {
        let table = labeled.to_entries().into_iter().collect();
        Self::new(table, options, Some(labeled))
    }

    /// テーブルから作成します。フィルタは適用されません。
    pub fn from_table(table: EntryTable) -> Self {
        Self::new(table, LoadOptions::vectors(), None)
    }

    /// ファイルから読み込みます。形式は先頭のバイト列から判定されます。
    ///
    /// # 引数
    ///
    /// * `path` - プレーンテキスト、gzip、zstd、または密ベクトルバイナリのファイル
    /// * `options` - 読み込みオプション。通常は[`LoadOptions::vectors`]
    ///
    /// # エラー
    ///
    /// ファイルが読めない場合、または内容が壊れている場合にエラーを返します。
    pub fn from_path<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        match loader::open_path(path)? {
            Payload::Text(rdr) => Self::from_reader_named(rdr, &path.display().to_string(), options),
            Payload::Dense(dense) => {
                let labeled = dense.into_labeled()?;
                let nnz = labeled.matrix().nnz();
                let n_rows = labeled.rows().len();
                let table = loader::load_iter(labeled.to_entries(), &Self::load_time(&options))?;
                // フィルタで何も変わらなければ密行列をそのまま使う
                let unchanged = table.len() == n_rows
                    && table.num_pairs() == nnz
                    && options.row_filter.is_accept_all()
                    && options.column_filter.is_accept_all();
                let matrix = unchanged.then_some(labeled);
                Ok(Self::new(table, options, matrix))
            }
        }
    }

    /// リーダーからタブ区切りテキストを読み込みます。
    pub fn from_reader<R: BufRead>(rdr: R, options: LoadOptions) -> Result<Self> {
        Self::from_reader_named(rdr, "<reader>", options)
    }

    fn from_reader_named<R: BufRead>(
        rdr: R,
        source_name: &str,
        options: LoadOptions,
    ) -> Result<Self> {
        let table = loader::load_reader(rdr, source_name, &Self::load_time(&options))?;
        Ok(Self::new(table, options, None))
    }

    /// 語彙的重複は検索時に判定するため、読み込み時には除外しない
    fn load_time(options: &LoadOptions) -> LoadOptions {
        options.clone().allow_lexical_overlap(true)
    }

    /// `(行, [(列, 重み)])`の列から作成します。
    pub fn from_dict_of_dicts<I, R, C, K>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (R, C)>,
        R: Into<String>,
        C: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let options = LoadOptions::vectors();
        let table = loader::load_iter(
            rows.into_iter().map(|(r, cols)| {
                (
                    r,
                    cols.into_iter()
                        .map(|(c, w)| Neighbour::new(c, w))
                        .collect::<Vec<_>>(),
                )
            }),
            &options,
        )?;
        Ok(Self::new(table, options, None))
    }

    /// 密な表から作成します。列はラベル順に並べ替えられます。
    pub fn from_frame(frame: DenseFrame) -> Result<Self> {
        Ok(Self::from_labeled(frame.into_labeled()?, LoadOptions::vectors()))
    }

    /// 疎トリプル形式の3ファイルから読み込みます。
    pub fn from_sparse_files<P: AsRef<Path>>(prefix: P) -> Result<Self> {
        Ok(Self::from_labeled(
            io::read_sparse_files(prefix)?,
            LoadOptions::vectors(),
        ))
    }

    /// 読み込みオプション
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// エントリテーブル
    pub fn table(&self) -> &EntryTable {
        &self.table
    }

    /// ラベル付き行列。初回の呼び出し時に構築されます。
    pub fn matrix(&self) -> &LabeledMatrix {
        self.matrix.get_or_init(|| {
            MatrixBuilder::new()
                .row_filter(self.options.row_filter.clone())
                .column_filter(self.options.column_filter.clone())
                .build(
                    self.table
                        .iter()
                        .map(|(k, v)| (k, v.iter().map(|n| (n.name.as_str(), n.weight)))),
                )
        })
    }

    /// 列ラベル
    pub fn columns(&self) -> &[String] {
        self.matrix().columns()
    }

    /// 行ラベル
    pub fn row_names(&self) -> &[String] {
        self.matrix().rows()
    }

    /// 行列の形
    pub fn shape(&self) -> (usize, usize) {
        self.matrix().matrix().shape()
    }

    /// `(疎行列, 列ラベル, 行ラベル)`を返します。
    pub fn to_sparse_matrix(&self) -> (SparseMatrix, Vec<String>, Vec<String>) {
        let m = self.matrix();
        (m.matrix().to_sparse(), m.columns().to_vec(), m.rows().to_vec())
    }

    fn query_row(&self, entry: &str) -> Option<usize> {
        let row = self.row_of(entry);
        if row.is_none() {
            log::debug!("{entry:?} is not in the vector space");
        }
        row
    }

    fn row_of(&self, entry: &str) -> Option<usize> {
        self.row_index
            .get_or_init(|| {
                self.row_names()
                    .iter()
                    .enumerate()
                    .map(|(i, r)| (r.clone(), i))
                    .collect()
            })
            .get(entry)
            .copied()
    }

    /// エントリの特徴ベクトルを列順の密なベクトルで返します。
    pub fn get_vector(&self, entry: &str) -> Option<Vec<f64>> {
        self.matrix().matrix().dense_row(self.row_of(entry)?)
    }

    /// 2つのエントリ間のユークリッド距離。どちらかが存在しない場合は`None`です。
    pub fn euclidean_distance(&self, a: &str, b: &str) -> Option<f64> {
        Some(neighbours::euclidean(&self.get_vector(a)?, &self.get_vector(b)?))
    }

    /// 2つのエントリ間のコサイン類似度。どちらかが存在しない場合は`None`です。
    pub fn cosine_similarity(&self, a: &str, b: &str) -> Option<f64> {
        Some(neighbours::cosine_similarity(
            &self.get_vector(a)?,
            &self.get_vector(b)?,
        ))
    }

    /// 指定した形式でファイルに書き出します。
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P, format: VectorsFormat) -> Result<()> {
        io::write_path(path, self.matrix(), format)
    }

    /// 疎トリプル形式で書き出します。
    pub fn to_sparse_files<P: AsRef<Path>>(&self, prefix: P) -> Result<()> {
        io::write_sparse_files(prefix, self.matrix())
    }

    /// 語彙的に重複する近傍を検索結果に含めるかどうか
    pub fn allow_lexical_overlap(&self) -> bool {
        self.allow_lexical_overlap
    }

    /// 語彙的重複の扱いを変更します。次の検索から反映されます。
    pub fn set_allow_lexical_overlap(&mut self, yes: bool) {
        self.allow_lexical_overlap = yes;
    }

    /// 近傍インデックスを構築します。
    ///
    /// # 引数
    ///
    /// * `restrict_to` - インデックスに含めるエントリ。`None`の場合はすべての行
    /// * `config` - 設定
    ///
    /// 範囲と設定が現在のインデックスと同じ場合は再構築しません。
    pub fn init_sims(&mut self, restrict_to: Option<&[&str]>, config: SimsConfig) {
        let scope: Vec<usize> = match restrict_to {
            Some(names) => {
                let mut seen = HashSet::new();
                names
                    .iter()
                    .filter_map(|name| {
                        let row = self.row_of(name);
                        if row.is_none() {
                            log::debug!("{name:?} is not in the vector space and is skipped");
                        }
                        row
                    })
                    .filter(|&r| seen.insert(r))
                    .collect()
            }
            None => (0..self.shape().0).collect(),
        };

        let key = IndexKey::new(scope, &config);
        if self.index.as_ref().is_some_and(|index| *index.key() == key) {
            log::debug!("neighbour index is up to date");
            return;
        }
        let index = NeighbourIndex::build(self.matrix().matrix(), key.into_scope(), config);
        self.index = Some(index);
    }

    /// 現在の近傍インデックス。まだ構築されていない場合は`None`です。
    pub fn neighbour_index(&self) -> Option<&NeighbourIndex> {
        self.index.as_ref().or_else(|| self.default_index.get())
    }

    fn active_index(&self) -> &NeighbourIndex {
        match &self.index {
            Some(index) => index,
            None => self.default_index.get_or_init(|| {
                NeighbourIndex::build(
                    self.matrix().matrix(),
                    (0..self.shape().0).collect(),
                    SimsConfig::default(),
                )
            }),
        }
    }

    /// 候補を除外すべきかを判定する述語を作成します。
    fn exclusion(&self, entry: &str, query_row: usize) -> impl Fn(usize) -> bool {
        let sep = self.options.ngram_separator.as_str();
        let feature = if self.allow_lexical_overlap {
            None
        } else {
            match DocumentFeature::parse(entry, sep) {
                Ok(f) => Some(f),
                Err(e) => {
                    log::debug!("overlap test skipped for the query: {e}");
                    None
                }
            }
        };
        let rows = self.row_names();
        move |row: usize| {
            if row == query_row {
                return true;
            }
            let Some(feature) = &feature else {
                return false;
            };
            match DocumentFeature::parse(&rows[row], sep) {
                Ok(candidate) => candidate.overlaps(feature),
                Err(e) => {
                    log::debug!("overlap test skipped for a candidate: {e}");
                    false
                }
            }
        }
    }

    fn collect_results<I>(
        &self,
        index: &NeighbourIndex,
        candidates: I,
        excluded: &dyn Fn(usize) -> bool,
    ) -> Vec<(String, f64)>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let rows = self.row_names();
        candidates
            .into_iter()
            .map(|(pos, d)| (index.scope()[pos], d))
            .filter(|&(row, _)| !excluded(row))
            .take(index.config().n_neighbours)
            .map(|(row, d)| (rows[row].clone(), d))
            .collect()
    }

    /// エントリの最近傍を距離の昇順で返します。
    ///
    /// エントリ自身と、語彙的重複が許可されていない場合は重複する候補が除外されます。
    /// 除外によって件数が不足した場合は全候補を走査します。
    /// 未知のエントリに対しては空のベクトルを返します。
    pub fn get_nearest_neighbours(&self, entry: &str) -> Vec<(String, f64)> {
        let Some(row) = self.query_row(entry) else {
            return vec![];
        };
        let index = self.active_index();
        let Some(query) = self.matrix().matrix().dense_row(row) else {
            return vec![];
        };
        let k = index.config().n_neighbours;
        let excluded = self.exclusion(entry, row);

        let fetched = index.kneighbors(&query, k.saturating_add(1));
        let n_fetched = fetched.len();
        let results = self.collect_results(index, fetched, &excluded);
        if results.len() < k && n_fetched < index.scope().len() {
            return self.linear_scan(index, &query, &excluded);
        }
        results
    }

    /// 総当たりでエントリの最近傍を返します。
    pub fn get_nearest_neighbours_linear(&self, entry: &str) -> Vec<(String, f64)> {
        let Some(row) = self.query_row(entry) else {
            return vec![];
        };
        let index = self.active_index();
        let Some(query) = self.matrix().matrix().dense_row(row) else {
            return vec![];
        };
        let excluded = self.exclusion(entry, row);
        self.linear_scan(index, &query, &excluded)
    }

    fn linear_scan(
        &self,
        index: &NeighbourIndex,
        query: &[f64],
        excluded: &dyn Fn(usize) -> bool,
    ) -> Vec<(String, f64)> {
        let mut all: Vec<(usize, f64)> = (0..index.scope().len())
            .map(|pos| (pos, index.distance(index.point(pos), query)))
            .collect();
        all.sort_by(by_distance);
        self.collect_results(index, all, excluded)
    }

    /// 取得件数を倍にしながらインデックスを繰り返し検索し、エントリの最近傍を返します。
    pub fn get_nearest_neighbours_skipping(&self, entry: &str) -> Vec<(String, f64)> {
        let Some(row) = self.query_row(entry) else {
            return vec![];
        };
        let index = self.active_index();
        let Some(query) = self.matrix().matrix().dense_row(row) else {
            return vec![];
        };
        let k = index.config().n_neighbours;
        let pool = index.scope().len();
        let excluded = self.exclusion(entry, row);

        let mut fetch = k.saturating_add(1);
        loop {
            let fetched = index.kneighbors(&query, fetch);
            let n_fetched = fetched.len();
            let results = self.collect_results(index, fetched, &excluded);
            if results.len() >= k || n_fetched >= pool {
                return results;
            }
            fetch = fetch.saturating_mul(2);
        }
    }
}

impl EntryLookup for Vectors {
    fn get(&self, key: &str) -> Option<Cow<'_, [Neighbour]>> {
        self.table.get(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.table.contains(key)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        self.table.keys()
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}

impl From<EntryTable> for Vectors {
    fn from(table: EntryTable) -> Self {
        Self::from_table(table)
    }
}
