//! シソーラス
//!
//! エントリから重み付き近傍リストへの対応を保持する読み取り専用のコンテナです。
//! メモリ上のテーブル、または読み取り専用で開いたシェルフを背後に持ちます。

use std::borrow::Cow;
use std::io::{BufRead, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

use crate::entries::{EntryLookup, EntryTable, Neighbour};
use crate::errors::Result;
use crate::loader;
use crate::matrix::{Matrix, MatrixBuilder};
use crate::options::LoadOptions;
use crate::shelf::Shelf;
use crate::utils::write_atomic;

enum Backing {
    Memory(EntryTable),
    Shelf(Shelf),
}

/// エントリと近傍リストの対応
///
/// # 例
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use thesaurus_rkyv::{EntryLookup, LoadOptions, Thesaurus};
///
/// let text = "big/J\tlarge/J\t0.9\thuge/J\t0.7\tbig/J_dog/N\t0.1\n";
/// let options = LoadOptions::default().sim_threshold(0.5);
/// let thesaurus = Thesaurus::from_reader(text.as_bytes(), options)?;
///
/// let neighbours = thesaurus.lookup("big/J")?;
/// assert_eq!(neighbours.len(), 2);
/// assert_eq!(neighbours[0].name, "large/J");
/// # Ok(())
/// # }
/// ```
pub struct Thesaurus {
    backing: Backing,
    options: LoadOptions,
}

impl Thesaurus {
    /// ファイルから読み込みます。
    ///
    /// プレーンテキスト、gzip、zstd、密ベクトルバイナリを先頭のバイト列から判定します。
    ///
    /// # エラー
    ///
    /// ファイルが読めない場合、行が壊れている場合、または語彙的重複の判定で
    /// 素性を解析できない場合にエラーを返します。
    pub fn from_path<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self> {
        let table = loader::load_path(path, &options)?;
        Ok(Self::from_table(table, options))
    }

    /// タブ区切りテキストのリーダーから読み込みます。
    pub fn from_reader<R: BufRead>(rdr: R, options: LoadOptions) -> Result<Self> {
        let table = loader::load_reader(rdr, "<reader>", &options)?;
        Ok(Self::from_table(table, options))
    }

    /// `(エントリ, 近傍リスト)`の列から作成します。読み込みオプションが適用されます。
    pub fn from_entries<I, K, N>(entries: I, options: LoadOptions) -> Result<Self>
    where
        I: IntoIterator<Item = (K, N)>,
        K: Into<String>,
        N: IntoIterator<Item = Neighbour>,
    {
        let table = loader::load_iter(entries, &options)?;
        Ok(Self::from_table(table, options))
    }

    fn from_table(table: EntryTable, options: LoadOptions) -> Self {
        Self {
            backing: Backing::Memory(table),
            options,
        }
    }

    /// シェルフを読み取り専用で開きます。
    ///
    /// エントリはキー順に並びます。
    pub fn from_shelf_readonly<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            backing: Backing::Shelf(Shelf::open_readonly(path)?),
            options: LoadOptions::default(),
        })
    }

    /// 読み込みオプション
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// シェルフを背後に持つ場合に`true`を返します。
    pub fn is_shelved(&self) -> bool {
        matches!(self.backing, Backing::Shelf(_))
    }

    fn lookup_backend(&self) -> &dyn EntryLookup {
        match &self.backing {
            Backing::Memory(table) => table,
            Backing::Shelf(shelf) => shelf,
        }
    }

    /// タブ区切りテキストとして書き出します。
    ///
    /// # 引数
    ///
    /// * `path` - 出力先
    /// * `gzipped` - `true`の場合はgzipで圧縮します。
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P, gzipped: bool) -> Result<()> {
        write_atomic(path, |wtr| {
            if gzipped {
                let mut enc = GzEncoder::new(wtr, Compression::default());
                self.write_tsv(&mut enc)?;
                enc.finish()?;
                Ok(())
            } else {
                self.write_tsv(wtr)
            }
        })
    }

    /// エントリごとに`entry<TAB>name<TAB>weight...`の1行を書き出します。
    pub fn write_tsv<W: Write + ?Sized>(&self, wtr: &mut W) -> Result<()> {
        for (key, neighbours) in self.items() {
            wtr.write_all(key.as_bytes())?;
            for n in neighbours.iter() {
                write!(wtr, "\t{}\t{}", n.name, n.weight)?;
            }
            wtr.write_all(b"\n")?;
        }
        Ok(())
    }

    /// 書き込みモードのシェルフに保存します。既存の内容は置き換えられます。
    pub fn to_shelf<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut shelf = Shelf::open_write(path)?;
        shelf.clear()?;
        for (key, neighbours) in self.items() {
            shelf.insert(key, neighbours.into_owned())?;
        }
        shelf.close()
    }

    /// `(行列, 列ラベル, 行ラベル)`を返します。
    ///
    /// 行・列フィルタは読み込みオプションのものが使われます。
    pub fn to_sparse_matrix(&self) -> (Matrix, Vec<String>, Vec<String>) {
        MatrixBuilder::new()
            .row_filter(self.options.row_filter.clone())
            .column_filter(self.options.column_filter.clone())
            .build(self.items().map(|(key, neighbours)| {
                let features: Vec<(String, f64)> = neighbours
                    .iter()
                    .map(|n| (n.name.clone(), n.weight))
                    .collect();
                (key, features)
            }))
            .into_parts()
    }

    /// 複数のエントリの近傍リストを返します。存在しないエントリは読み飛ばされます。
    pub fn neighbours_of<'a, I>(&'a self, keys: I) -> Vec<(&'a str, Cow<'a, [Neighbour]>)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter()
            .filter_map(|key| {
                let neighbours = self.get(key);
                if neighbours.is_none() {
                    log::debug!("{key:?} is not in the thesaurus");
                }
                Some((key, neighbours?))
            })
            .collect()
    }
}

impl EntryLookup for Thesaurus {
    fn get(&self, key: &str) -> Option<Cow<'_, [Neighbour]>> {
        self.lookup_backend().get(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.lookup_backend().contains(key)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        self.lookup_backend().keys()
    }

    fn len(&self) -> usize {
        self.lookup_backend().len()
    }
}
