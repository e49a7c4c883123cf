//! シソーラス変換ツールのメインエントリーポイント
//!
//! ベクトルファイルの形式変換、シソーラスのシェルフ化、ベクトルからの
//! 近傍シソーラスの生成を行うサブコマンドを提供します。

mod convert;
mod neighbours;
mod shelve;

use clap::Parser;
use thiserror::Error;

use crate::{convert::ConvertError, neighbours::NeighboursError, shelve::ShelveError};

/// コマンドライン引数の構造体
#[derive(Parser, Debug)]
#[clap(name = "compile", version)]
struct Cli {
    /// 実行するサブコマンド
    #[clap(subcommand)]
    command: Command,
}

/// 利用可能なサブコマンド
#[derive(Parser, Debug)]
enum Command {
    /// ベクトルファイルを別の形式に変換します
    ///
    /// 入力の形式は先頭のバイト列から自動的に判定されます。
    Convert(convert::Args),

    /// シソーラスのテキストファイルをシェルフに変換します
    Shelve(shelve::Args),

    /// ベクトルから各エントリのk近傍を求め、シソーラスとして出力します
    Neighbours(neighbours::Args),
}

/// コンパイラの実行中に発生する可能性のあるエラー
#[derive(Debug, Error)]
pub enum CompileError {
    /// 形式変換中のエラー
    #[error(transparent)]
    Convert(#[from] ConvertError),
    /// シェルフ作成中のエラー
    #[error(transparent)]
    Shelve(#[from] ShelveError),
    /// 近傍計算中のエラー
    #[error(transparent)]
    Neighbours(#[from] NeighboursError),
}

fn main() -> Result<(), CompileError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Convert(args) => Ok(convert::run(args)?),
        Command::Shelve(args) => Ok(shelve::run(args)?),
        Command::Neighbours(args) => Ok(neighbours::run(args)?),
    }
}
