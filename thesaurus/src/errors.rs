//! エラー型の定義
//!
//! このモジュールは、シソーラスおよびベクトル空間の読み込み・永続化・検索で
//! 使用されるすべてのエラー型を定義します。
//!
//! 読み込み時の構造的なエラー（[`MalformedFeatureError`]、[`CorruptDataError`]）は
//! ファイル単位で即座に失敗させます。一方、近傍検索などのクエリで
//! 「見つからない」ことはエラーではなく、空の結果や`None`として返されます。

use std::error::Error;
use std::fmt::{self, Debug};
use std::path::PathBuf;

/// このクレート専用のResult型
///
/// エラー型としてデフォルトで[`ThesaurusError`]を使用します。
pub type Result<T, E = ThesaurusError> = std::result::Result<T, E>;

/// シソーラスのエラー型
///
/// このライブラリで発生する可能性のあるすべてのエラーを表現します。
#[derive(Debug, thiserror::Error)]
pub enum ThesaurusError {
    /// 素性文字列を単語と品詞に分割できないエラー
    ///
    /// [`MalformedFeatureError`]のエラーバリアント。
    #[error(transparent)]
    MalformedFeature(MalformedFeatureError),

    /// 入力データが壊れているエラー
    ///
    /// [`CorruptDataError`]のエラーバリアント。読み込み全体を中断します。
    #[error(transparent)]
    CorruptData(CorruptDataError),

    /// 直接参照で未知のキーが指定されたエラー
    ///
    /// [`MissingKeyError`]のエラーバリアント。
    #[error(transparent)]
    MissingKey(MissingKeyError),

    /// 読み取り専用ストアへの書き込みエラー
    ///
    /// [`ReadOnlyViolationError`]のエラーバリアント。
    #[error(transparent)]
    ReadOnlyViolation(ReadOnlyViolationError),

    /// 無効な引数エラー
    ///
    /// [`InvalidArgumentError`]のエラーバリアント。
    #[error(transparent)]
    InvalidArgument(InvalidArgumentError),

    /// 無効なフォーマットエラー
    ///
    /// [`InvalidFormatError`]のエラーバリアント。
    #[error(transparent)]
    InvalidFormat(InvalidFormatError),

    /// 無効な状態エラー
    ///
    /// [`InvalidStateError`]のエラーバリアント。
    #[error(transparent)]
    InvalidState(InvalidStateError),

    /// ディレクトリが指定されたエラー
    ///
    /// ファイルが期待される場所にディレクトリが指定された場合に発生します。
    #[error("The path '{0}' is a directory, but a file was expected.")]
    PathIsDirectory(PathBuf),

    /// I/Oエラー
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// rkyvシリアライゼーションエラー
    #[error(transparent)]
    Rkyv(#[from] rkyv::rancor::Error),

    /// 一時ファイルの永続化エラー
    #[error(transparent)]
    PathPersist(#[from] tempfile::PersistError),
}

impl ThesaurusError {
    /// 素性文字列のパースエラーを生成します
    ///
    /// # 引数
    ///
    /// * `input` - パースしようとした文字列
    /// * `msg` - エラーメッセージ
    pub(crate) fn malformed_feature<I, S>(input: I, msg: S) -> Self
    where
        I: Into<String>,
        S: Into<String>,
    {
        Self::MalformedFeature(MalformedFeatureError {
            input: input.into(),
            msg: msg.into(),
        })
    }

    /// 破損データエラーを生成します
    ///
    /// # 引数
    ///
    /// * `source_name` - 入力の名前（ファイルパスなど）
    /// * `line` - 問題のある行番号（1始まり）
    /// * `msg` - エラーメッセージ
    pub(crate) fn corrupt_data<N, S>(source_name: N, line: usize, msg: S) -> Self
    where
        N: Into<String>,
        S: Into<String>,
    {
        Self::CorruptData(CorruptDataError {
            source_name: source_name.into(),
            line,
            msg: msg.into(),
        })
    }

    /// 未知キーエラーを生成します
    pub(crate) fn missing_key<K>(key: K) -> Self
    where
        K: Into<String>,
    {
        Self::MissingKey(MissingKeyError { key: key.into() })
    }

    /// 読み取り専用違反エラーを生成します
    ///
    /// # 引数
    ///
    /// * `path` - ストアのパス
    /// * `operation` - 拒否された操作の名前
    pub(crate) fn read_only_violation<P>(path: P, operation: &'static str) -> Self
    where
        P: Into<PathBuf>,
    {
        Self::ReadOnlyViolation(ReadOnlyViolationError {
            path: path.into(),
            operation,
        })
    }

    /// 無効な引数エラーを生成します
    ///
    /// # 引数
    ///
    /// * `arg` - 引数の名前
    /// * `msg` - エラーメッセージ
    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(InvalidArgumentError {
            arg,
            msg: msg.into(),
        })
    }

    /// 無効なフォーマットエラーを生成します
    ///
    /// # 引数
    ///
    /// * `arg` - フォーマット名
    /// * `msg` - エラーメッセージ
    pub(crate) fn invalid_format<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidFormat(InvalidFormatError {
            arg,
            msg: msg.into(),
        })
    }

    /// 無効な状態エラーを生成します
    ///
    /// # 引数
    ///
    /// * `msg` - エラーメッセージ
    /// * `cause` - エラーの原因
    pub(crate) fn invalid_state<S, M>(msg: S, cause: M) -> Self
    where
        S: Into<String>,
        M: Into<String>,
    {
        Self::InvalidState(InvalidStateError {
            msg: msg.into(),
            cause: cause.into(),
        })
    }
}

/// 素性文字列が`単語/品詞`の形式になっていない場合に使用されるエラー
#[derive(Debug)]
pub struct MalformedFeatureError {
    /// パースしようとした文字列
    pub(crate) input: String,

    /// エラーメッセージ
    pub(crate) msg: String,
}

impl MalformedFeatureError {
    /// パースしようとした文字列を返します。
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for MalformedFeatureError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MalformedFeatureError: {:?}: {}", self.input, self.msg)
    }
}

impl Error for MalformedFeatureError {}

/// 重みが数値でない、または列数が不整合な場合に使用されるエラー
#[derive(Debug)]
pub struct CorruptDataError {
    /// 入力の名前
    pub(crate) source_name: String,

    /// 行番号（1始まり）
    pub(crate) line: usize,

    /// エラーメッセージ
    pub(crate) msg: String,
}

impl CorruptDataError {
    /// 問題のあった行番号（1始まり）を返します。
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for CorruptDataError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "CorruptDataError: {}:{}: {}",
            self.source_name, self.line, self.msg
        )
    }
}

impl Error for CorruptDataError {}

/// 存在しないキーを直接参照した場合に使用されるエラー
#[derive(Debug)]
pub struct MissingKeyError {
    /// 参照されたキー
    pub(crate) key: String,
}

impl MissingKeyError {
    /// 参照されたキーを返します。
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for MissingKeyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MissingKeyError: {:?}", self.key)
    }
}

impl Error for MissingKeyError {}

/// 読み取り専用で開かれたストアに書き込もうとした場合に使用されるエラー
#[derive(Debug)]
pub struct ReadOnlyViolationError {
    /// ストアのパス
    pub(crate) path: PathBuf,

    /// 拒否された操作
    pub(crate) operation: &'static str,
}

impl fmt::Display for ReadOnlyViolationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ReadOnlyViolationError: {}: '{}' is not allowed on a read-only handle",
            self.path.display(),
            self.operation
        )
    }
}

impl Error for ReadOnlyViolationError {}

/// 引数が無効な場合に使用されるエラー
#[derive(Debug)]
pub struct InvalidArgumentError {
    /// 引数の名前
    pub(crate) arg: &'static str,

    /// エラーメッセージ
    pub(crate) msg: String,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidArgumentError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidArgumentError {}

/// 入力フォーマットが無効な場合に使用されるエラー
#[derive(Debug)]
pub struct InvalidFormatError {
    /// フォーマットの名前
    pub(crate) arg: &'static str,

    /// エラーメッセージ
    pub(crate) msg: String,
}

impl fmt::Display for InvalidFormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidFormatError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidFormatError {}

/// 状態が無効な場合に使用されるエラー
#[derive(Debug)]
pub struct InvalidStateError {
    /// エラーメッセージ
    pub(crate) msg: String,

    /// エラーの根本原因
    pub(crate) cause: String,
}

impl fmt::Display for InvalidStateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidStateError: {}: {}", self.msg, self.cause)
    }
}

impl Error for InvalidStateError {}
