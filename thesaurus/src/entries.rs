//! エントリと近傍リストの表現
//!
//! [`EntryTable`]はエントリから重み付き近傍リストへの順序付きマップです。
//! メモリ上のテーブルとディスク上のシェルフは、どちらも[`EntryLookup`]トレイトを
//! 通して同じ方法で参照できます。

use std::borrow::Cow;

use hashbrown::HashMap;
use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::{Result, ThesaurusError};

/// 重み付きの近傍
#[derive(Clone, Debug, PartialEq, Archive, Serialize, Deserialize)]
#[rkyv(derive(Debug))]
pub struct Neighbour {
    /// 近傍のエントリ名
    pub name: String,

    /// 類似度、特徴量の重み、または距離
    pub weight: f64,
}

impl Neighbour {
    /// 新しい近傍を作成します。
    #[inline]
    pub fn new<S: Into<String>>(name: S, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
        }
    }
}

impl<S: Into<String>> From<(S, f64)> for Neighbour {
    fn from((name, weight): (S, f64)) -> Self {
        Self::new(name, weight)
    }
}

impl ArchivedNeighbour {
    /// アーカイブされた近傍をネイティブの[`Neighbour`]に変換します。
    pub fn to_native(&self) -> Neighbour {
        Neighbour {
            name: self.name.as_str().to_string(),
            weight: self.weight.to_native(),
        }
    }
}

/// エントリから近傍リストを引くためのインターフェース
///
/// 存在しないキーに対して[`EntryLookup::get`]は`None`を返し、
/// [`EntryLookup::lookup`]は[`ThesaurusError::MissingKey`]を返します。
pub trait EntryLookup {
    /// エントリの近傍リストを返します。
    fn get(&self, key: &str) -> Option<Cow<'_, [Neighbour]>>;

    /// エントリが存在する場合に`true`を返します。
    fn contains(&self, key: &str) -> bool;

    /// すべてのエントリ名を返します。
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    /// エントリ数
    fn len(&self) -> usize;

    /// エントリが1つもない場合に`true`を返します。
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// すべての近傍リストを[`EntryLookup::keys`]と同じ順序で返します。
    fn values(&self) -> Box<dyn Iterator<Item = Cow<'_, [Neighbour]>> + '_> {
        Box::new(self.keys().filter_map(move |k| self.get(k)))
    }

    /// エントリ名と近傍リストの組を返します。
    fn items(&self) -> Box<dyn Iterator<Item = (&str, Cow<'_, [Neighbour]>)> + '_> {
        Box::new(self.keys().filter_map(move |k| self.get(k).map(|v| (k, v))))
    }

    /// エントリの近傍リストを返します。
    ///
    /// # エラー
    ///
    /// エントリが存在しない場合、[`ThesaurusError::MissingKey`]が返されます。
    fn lookup(&self, key: &str) -> Result<Cow<'_, [Neighbour]>> {
        self.get(key)
            .ok_or_else(|| ThesaurusError::missing_key(key))
    }
}

/// エントリの挿入順を保持する近傍リストのテーブル
#[derive(Clone, Debug, Default)]
pub struct EntryTable {
    keys: Vec<String>,
    values: Vec<Vec<Neighbour>>,
    index: HashMap<String, usize>,
}

impl EntryTable {
    /// 空のテーブルを作成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定した容量で空のテーブルを作成します。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// エントリを挿入します。
    ///
    /// 既存のエントリは近傍リストのみが置き換えられ、位置は変わりません。
    ///
    /// # 戻り値
    ///
    /// 置き換えられた近傍リスト。新規のエントリの場合は`None`。
    pub fn insert<K>(&mut self, key: K, neighbours: Vec<Neighbour>) -> Option<Vec<Neighbour>>
    where
        K: Into<String>,
    {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.values[i], neighbours));
        }
        self.index.insert(key.clone(), self.keys.len());
        self.keys.push(key);
        self.values.push(neighbours);
        None
    }

    /// エントリの近傍リストをスライスとして返します。
    #[inline]
    pub fn neighbours(&self, key: &str) -> Option<&[Neighbour]> {
        self.index.get(key).map(|&i| self.values[i].as_slice())
    }

    /// エントリの位置を返します。
    #[inline]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// 挿入順のエントリ名
    #[inline]
    pub fn key_slice(&self) -> &[String] {
        &self.keys
    }

    /// 挿入順にエントリと近傍リストを走査します。
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Neighbour])> {
        self.keys
            .iter()
            .zip(&self.values)
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// すべてのエントリの近傍の総数
    pub fn num_pairs(&self) -> usize {
        self.values.iter().map(Vec::len).sum()
    }
}

impl PartialEq for EntryTable {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys && self.values == other.values
    }
}

impl<K> FromIterator<(K, Vec<Neighbour>)> for EntryTable
where
    K: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, Vec<Neighbour>)>>(iter: T) -> Self {
        let mut table = Self::new();
        for (k, v) in iter {
            table.insert(k, v);
        }
        table
    }
}

impl IntoIterator for EntryTable {
    type Item = (String, Vec<Neighbour>);
    type IntoIter = std::iter::Zip<std::vec::IntoIter<String>, std::vec::IntoIter<Vec<Neighbour>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.keys.into_iter().zip(self.values)
    }
}

impl EntryLookup for EntryTable {
    fn get(&self, key: &str) -> Option<Cow<'_, [Neighbour]>> {
        self.neighbours(key).map(Cow::Borrowed)
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.keys.iter().map(String::as_str))
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}
