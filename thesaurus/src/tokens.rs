//! 品詞付き素性の表現
//!
//! このモジュールは、`単語/品詞` および `修飾語_主辞/品詞1_品詞2` 形式の文字列を
//! 正規化された識別子 [`DocumentFeature`] として扱うための型を提供します。
//!
//! # 受理される形式
//!
//! - `word/POS`: 単一トークン
//! - `w1/P1_w2/P2`: 各構成要素がそれぞれ品詞を持つ複合語
//! - `w1_w2/P1_P2`: 単語列と品詞列をまとめて書いた複合語
//!
//! 区切り文字（上記の `_`）は設定可能です。

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::errors::{Result, ThesaurusError};

/// 複合語の構成要素を結合するデフォルトの区切り文字
pub const DEFAULT_NGRAM_SEPARATOR: &str = "_";

/// 単語と品詞タグを分ける区切り文字
pub const POS_DELIMITER: char = '/';

/// 品詞付きの単一トークン
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token {
    text: String,
    pos: String,
}

impl Token {
    /// 新しいトークンを作成します。テキストは小文字化されます。
    pub fn new<T, P>(text: T, pos: P) -> Self
    where
        T: AsRef<str>,
        P: AsRef<str>,
    {
        Self {
            text: text.as_ref().trim().to_lowercase(),
            pos: pos.as_ref().trim().to_string(),
        }
    }

    /// 正規化済みのテキスト
    #[inline(always)]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// 品詞タグ
    #[inline(always)]
    pub fn pos(&self) -> &str {
        &self.pos
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.text, POS_DELIMITER, self.pos)
    }
}

/// 品詞列から推定される素性の種類
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// 単一トークン
    Unigram,
    /// 形容詞＋名詞
    AdjectiveNoun,
    /// 名詞＋名詞
    NounNoun,
    /// 動詞＋目的語
    VerbObject,
    /// 主語＋動詞＋目的語
    SubjectVerbObject,
    /// 上記以外のn-gram
    NGram(usize),
}

impl FeatureKind {
    fn infer(tokens: &[Token]) -> Self {
        let tag = |i: usize| tokens[i].pos.chars().next().unwrap_or_default();
        match tokens.len() {
            1 => Self::Unigram,
            2 => match (tag(0), tag(1)) {
                ('J', 'N') => Self::AdjectiveNoun,
                ('N', 'N') => Self::NounNoun,
                ('V', 'N') => Self::VerbObject,
                _ => Self::NGram(2),
            },
            3 if (tag(0), tag(1), tag(2)) == ('N', 'V', 'N') => Self::SubjectVerbObject,
            n => Self::NGram(n),
        }
    }
}

/// 正規化された品詞付き素性
///
/// 等価性とハッシュは正規形の文字列（[`DocumentFeature::as_str`]）に基づきます。
#[derive(Clone, Debug)]
pub struct DocumentFeature {
    tokens: Vec<Token>,
    kind: FeatureKind,
    canonical: String,
}

impl DocumentFeature {
    /// 文字列を解析して新しいインスタンスを作成します。
    ///
    /// # 引数
    ///
    /// * `text` - `word/POS` または複合語形式の文字列
    /// * `separator` - 複合語の構成要素を区切る文字列
    ///
    /// # エラー
    ///
    /// 品詞区切りが存在しない、単語や品詞が空である、または単語数と品詞数が
    /// 一致しない場合に [`ThesaurusError::MalformedFeature`] を返します。
    ///
    /// # 例
    ///
    /// ```
    /// # use thesaurus_rkyv::tokens::{DocumentFeature, FeatureKind};
    /// let f = DocumentFeature::parse("Big/J_cat/N", "_")?;
    /// assert_eq!(f.as_str(), "big/J_cat/N");
    /// assert_eq!(f.kind(), FeatureKind::AdjectiveNoun);
    ///
    /// let g = DocumentFeature::parse("big_cat/J_N", "_")?;
    /// assert_eq!(f, g);
    ///
    /// assert!(DocumentFeature::parse("messed_up", "_").is_err());
    /// # Ok::<(), thesaurus_rkyv::errors::ThesaurusError>(())
    /// ```
    pub fn parse(text: &str, separator: &str) -> Result<Self> {
        if separator.is_empty() {
            return Err(ThesaurusError::invalid_argument(
                "separator",
                "must not be empty",
            ));
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ThesaurusError::malformed_feature(text, "empty feature"));
        }

        let parts: Vec<&str> = trimmed.split(separator).collect();
        let tokens = if parts.iter().all(|p| p.contains(POS_DELIMITER)) {
            parts
                .iter()
                .map(|part| Self::parse_token(text, part))
                .collect::<Result<Vec<_>>>()?
        } else {
            let Some((words, tags)) = trimmed.rsplit_once(POS_DELIMITER) else {
                return Err(ThesaurusError::malformed_feature(
                    text,
                    "no part-of-speech delimiter",
                ));
            };
            let words: Vec<&str> = words.split(separator).collect();
            let tags: Vec<&str> = tags.split(separator).collect();
            if words.len() != tags.len() {
                return Err(ThesaurusError::malformed_feature(
                    text,
                    format!("{} words but {} tags", words.len(), tags.len()),
                ));
            }
            words
                .iter()
                .zip(&tags)
                .map(|(w, t)| Self::checked_token(text, w, t))
                .collect::<Result<Vec<_>>>()?
        };

        Ok(Self::from_tokens_with_separator(tokens, separator))
    }

    fn parse_token(input: &str, part: &str) -> Result<Token> {
        match part.rsplit_once(POS_DELIMITER) {
            Some((word, pos)) => Self::checked_token(input, word, pos),
            None => Err(ThesaurusError::malformed_feature(
                input,
                "no part-of-speech delimiter",
            )),
        }
    }

    fn checked_token(input: &str, word: &str, pos: &str) -> Result<Token> {
        if word.trim().is_empty() || pos.trim().is_empty() {
            return Err(ThesaurusError::malformed_feature(
                input,
                "empty word or part-of-speech tag",
            ));
        }
        Ok(Token::new(word, pos))
    }

    /// トークン列から作成します。区切り文字はデフォルトのものが使われます。
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self::from_tokens_with_separator(tokens, DEFAULT_NGRAM_SEPARATOR)
    }

    fn from_tokens_with_separator(tokens: Vec<Token>, separator: &str) -> Self {
        let canonical = tokens
            .iter()
            .map(Token::to_string)
            .collect::<Vec<_>>()
            .join(separator);
        let kind = FeatureKind::infer(&tokens);
        Self {
            tokens,
            kind,
            canonical,
        }
    }

    /// 構成トークン
    #[inline(always)]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// 素性の種類
    #[inline(always)]
    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    /// トークン数
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// 常に`false`。空の素性は構築できません。
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// 正規形の文字列
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// 少なくとも1つのトークンのテキストを共有している場合に`true`を返します。
    /// 品詞は比較しません。
    pub fn overlaps(&self, other: &DocumentFeature) -> bool {
        self.tokens
            .iter()
            .any(|a| other.tokens.iter().any(|b| a.text == b.text))
    }
}

impl PartialEq for DocumentFeature {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for DocumentFeature {}

impl Hash for DocumentFeature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for DocumentFeature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for DocumentFeature {
    type Err = ThesaurusError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s, DEFAULT_NGRAM_SEPARATOR)
    }
}

impl AsRef<str> for DocumentFeature {
    fn as_ref(&self) -> &str {
        &self.canonical
    }
}

/// 2つの素性文字列が語彙的に重複しているかを判定します。
///
/// # エラー
///
/// どちらかの文字列が素性として解析できない場合にエラーを返します。
pub fn lexical_overlap(a: &str, b: &str, separator: &str) -> Result<bool> {
    let a = DocumentFeature::parse(a, separator)?;
    let b = DocumentFeature::parse(b, separator)?;
    Ok(a.overlaps(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unigram() {
        let f: DocumentFeature = "Cat/N".parse().unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f.tokens()[0].text(), "cat");
        assert_eq!(f.tokens()[0].pos(), "N");
        assert_eq!(f.kind(), FeatureKind::Unigram);
        assert_eq!(f.to_string(), "cat/N");
    }

    #[test]
    fn test_parse_compound_forms_are_equal() {
        let a = DocumentFeature::parse("council/N_session/N", "_").unwrap();
        let b = DocumentFeature::parse("council_session/N_N", "_").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.kind(), FeatureKind::NounNoun);
    }

    #[test]
    fn test_parse_custom_separator() {
        let f = DocumentFeature::parse("large/J cat/N", " ").unwrap();
        assert_eq!(f.as_str(), "large/J cat/N");
        assert_eq!(f.kind(), FeatureKind::AdjectiveNoun);
    }

    #[test]
    fn test_parse_svo() {
        let f = DocumentFeature::parse("man/N_bite/V_dog/N", "_").unwrap();
        assert_eq!(f.kind(), FeatureKind::SubjectVerbObject);
        let f = DocumentFeature::parse("bite/V_dog/N", "_").unwrap();
        assert_eq!(f.kind(), FeatureKind::VerbObject);
    }

    #[test]
    fn test_word_containing_delimiter() {
        let f = DocumentFeature::parse("1/2/CD", "_").unwrap();
        assert_eq!(f.tokens()[0].text(), "1/2");
        assert_eq!(f.tokens()[0].pos(), "CD");
    }

    #[test]
    fn test_malformed() {
        for bad in ["messed_up", "", "  ", "cat/", "/N", "big_cat/J", "a/J_/N"] {
            let err = DocumentFeature::parse(bad, "_").unwrap_err();
            assert!(
                matches!(err, ThesaurusError::MalformedFeature(_)),
                "{bad:?} gave {err}"
            );
        }
    }

    #[test]
    fn test_overlap_ignores_pos() {
        let a = DocumentFeature::parse("daily/J_pais/N", "_").unwrap();
        let b = DocumentFeature::parse("daily/N", "_").unwrap();
        let c = DocumentFeature::parse("spanish/J", "_").unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(lexical_overlap("japanese/J_yen/N", "bundesbank/N_yen/N", "_").unwrap());
        assert!(!lexical_overlap("japanese/J_yen/N", "daily/J_mark/N", "_").unwrap());
    }

    #[test]
    fn test_hash_by_canonical_form() {
        let mut set = hashbrown::HashSet::new();
        set.insert(DocumentFeature::parse("Big/J_Cat/N", "_").unwrap());
        assert!(set.contains(&DocumentFeature::parse("big_cat/J_N", "_").unwrap()));
    }
}
