//! 読み込みオプション
//!
//! [`LoadOptions`]はシソーラスおよびベクトル空間の読み込み時に適用される
//! フィルタ処理を制御します。フィルタは常に次の順序で適用されます。
//!
//! 1. しきい値と自己ペアの除去
//! 2. 重みの降順への安定ソートと重複除去（最初の出現を優先）
//! 3. 語彙的重複の除外
//! 4. 近傍が空になったエントリの除去
//!
//! 自己ペアと空エントリの除去はシソーラス向けの処理で、[`LoadOptions::vectors`]では
//! 行われません。
//! 5. 自己エントリの挿入
//! 6. 近傍数の上限による切り詰め

use std::fmt;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::tokens::DEFAULT_NGRAM_SEPARATOR;

/// 行・列ラベルに対する述語
///
/// デフォルト値はすべてのラベルを受理します。
#[derive(Clone)]
pub struct Predicate {
    func: Option<Arc<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl Predicate {
    /// クロージャから述語を作成します。
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            func: Some(Arc::new(func)),
        }
    }

    /// すべてのラベルを受理する述語
    pub const fn accept_all() -> Self {
        Self { func: None }
    }

    /// 集合に含まれるラベルのみを受理する述語
    pub fn from_set<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: HashSet<String> = labels.into_iter().map(Into::into).collect();
        Self::new(move |label| set.contains(label))
    }

    /// ラベルが受理される場合に`true`を返します。
    #[inline]
    pub fn test(&self, label: &str) -> bool {
        self.func.as_ref().is_none_or(|f| f(label))
    }

    /// すべてのラベルを受理する述語である場合に`true`を返します。
    #[inline]
    pub fn is_accept_all(&self) -> bool {
        self.func.is_none()
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self::accept_all()
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_accept_all() {
            f.write_str("Predicate(accept_all)")
        } else {
            f.write_str("Predicate(<fn>)")
        }
    }
}

/// 読み込み時のフィルタ設定
///
/// # 例
///
/// ```
/// # use thesaurus_rkyv::options::LoadOptions;
/// let options = LoadOptions::default()
///     .sim_threshold(0.2)
///     .allow_lexical_overlap(false)
///     .max_neighbours(Some(5));
/// assert_eq!(options.max_neighbours, Some(5));
/// assert!(options.sort_neighbours);
/// ```
#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// この値より大きい重みのペアのみを残す
    pub sim_threshold: f64,

    /// 各エントリの先頭に重み1.0の自己エントリを挿入する
    pub include_self: bool,

    /// `false`の場合、エントリと語彙的に重複する近傍を除去する
    pub allow_lexical_overlap: bool,

    /// エントリあたりの近傍数の上限
    pub max_neighbours: Option<usize>,

    /// 複合語の区切り文字
    pub ngram_separator: String,

    /// 近傍を重みの降順に並べる
    pub sort_neighbours: bool,

    /// エントリ自身を指すペアを除去する
    pub drop_self_pairs: bool,

    /// 近傍が残らなかったエントリを除去する
    pub drop_empty_entries: bool,

    /// 行列構築時の行フィルタ
    pub row_filter: Predicate,

    /// 行列構築時の列フィルタ
    pub column_filter: Predicate,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sim_threshold: 0.0,
            include_self: false,
            allow_lexical_overlap: true,
            max_neighbours: None,
            ngram_separator: DEFAULT_NGRAM_SEPARATOR.to_string(),
            sort_neighbours: true,
            drop_self_pairs: true,
            drop_empty_entries: true,
            row_filter: Predicate::accept_all(),
            column_filter: Predicate::accept_all(),
        }
    }
}

impl LoadOptions {
    /// 特徴ベクトル向けのオプション
    ///
    /// 重みのしきい値を設けず、特徴量の並びをファイルの順序のまま保持します。
    /// 行名と同じ名前の列とすべてゼロの行も残します。
    /// 語彙的重複の設定は読み込み時には適用されず、近傍検索時に参照されます。
    pub fn vectors() -> Self {
        Self {
            sim_threshold: f64::NEG_INFINITY,
            sort_neighbours: false,
            drop_self_pairs: false,
            drop_empty_entries: false,
            ..Self::default()
        }
    }

    /// しきい値を設定します。
    pub fn sim_threshold(mut self, threshold: f64) -> Self {
        self.sim_threshold = threshold;
        self
    }

    /// 自己エントリの挿入を設定します。
    pub fn include_self(mut self, yes: bool) -> Self {
        self.include_self = yes;
        self
    }

    /// 語彙的重複の許可を設定します。
    pub fn allow_lexical_overlap(mut self, yes: bool) -> Self {
        self.allow_lexical_overlap = yes;
        self
    }

    /// 近傍数の上限を設定します。
    pub fn max_neighbours(mut self, n: Option<usize>) -> Self {
        self.max_neighbours = n;
        self
    }

    /// 複合語の区切り文字を設定します。
    pub fn ngram_separator<S: Into<String>>(mut self, separator: S) -> Self {
        self.ngram_separator = separator.into();
        self
    }

    /// 近傍のソートを設定します。
    pub fn sort_neighbours(mut self, yes: bool) -> Self {
        self.sort_neighbours = yes;
        self
    }

    /// 自己ペアの除去を設定します。
    pub fn drop_self_pairs(mut self, yes: bool) -> Self {
        self.drop_self_pairs = yes;
        self
    }

    /// 空エントリの除去を設定します。
    pub fn drop_empty_entries(mut self, yes: bool) -> Self {
        self.drop_empty_entries = yes;
        self
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
}
