//! # Thesaurus-rkyv
//!
//! 分布シソーラスと特徴ベクトルを扱うライブラリです。
//!
//! ## 概要
//!
//! `entry<TAB>neighbour<TAB>weight...`形式のファイルを読み込み、エントリごとの
//! 近傍リスト（シソーラス）または特徴ベクトル（ベクトル空間）として提供します。
//! rkyvによる密ベクトルバイナリとシェルフファイルを使用することで、
//! 大きなデータの読み込みを高速化しています。
//!
//! ## 主な機能
//!
//! - **読み込み時のフィルタ**: 閾値、語彙的重複の除外、近傍数の上限など
//! - **疎行列の構築**: ラベルを正規化したCSR行列
//! - **最近傍探索**: 総当たりとkd木による厳密なk近傍探索
//! - **永続化**: プレーンテキスト、gzip、密ベクトルバイナリ、疎トリプル、シェルフ
//!
//! ## 使用例
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use thesaurus_rkyv::{EntryLookup, LoadOptions, SimsConfig, Thesaurus, Vectors};
//!
//! let text = "\
//! new/J_york/N\tnew/J\t0.9\tyork/N\t0.8\tboston/N\t0.7\n\
//! boston/N\tnew/J_york/N\t0.7\tchicago/N\t0.6\n";
//!
//! let options = LoadOptions::default().allow_lexical_overlap(false);
//! let thesaurus = Thesaurus::from_reader(text.as_bytes(), options)?;
//! assert_eq!(thesaurus.lookup("new/J_york/N")?[0].name, "boston/N");
//!
//! let mut vectors = Vectors::from_reader(text.as_bytes(), LoadOptions::vectors())?;
//! vectors.init_sims(None, SimsConfig::default().n_neighbours(1));
//! let neighbours = vectors.get_nearest_neighbours("boston/N");
//! assert_eq!(neighbours[0].0, "new/J_york/N");
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(not(any(target_pointer_width = "32", target_pointer_width = "64")))]
compile_error!("`target_pointer_width` must be 32 or 64");

/// エントリと近傍リスト
pub mod entries;

/// エラー型の定義
pub mod errors;

/// ファイルの読み込みとフィルタ
pub mod loader;

/// 疎・密行列
pub mod matrix;

/// 最近傍探索
pub mod neighbours;

/// 読み込みオプション
pub mod options;

/// ディスク上のキー・値ストア
pub mod shelf;

/// シソーラス
pub mod thesaurus;

/// 素性の解析
pub mod tokens;

/// 内部ユーティリティ関数
pub mod utils;

/// ベクトル空間
pub mod vectors;

#[cfg(test)]
mod test_utils;

// Re-exports
pub use entries::{EntryLookup, EntryTable, Neighbour};
pub use neighbours::{Algorithm, Metric, SimsConfig};
pub use options::{LoadOptions, Predicate};
pub use thesaurus::Thesaurus;
pub use tokens::DocumentFeature;
pub use vectors::{Vectors, VectorsFormat};

/// このライブラリのバージョン番号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
