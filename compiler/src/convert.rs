//! ベクトルファイルの形式変換

use std::path::PathBuf;

use clap::Parser;
use thesaurus_rkyv::errors::ThesaurusError;
use thesaurus_rkyv::{LoadOptions, Vectors, VectorsFormat};

/// 変換コマンドの引数
#[derive(Parser, Debug)]
#[clap(
    name = "convert",
    about = "A program to convert feature vectors between file formats."
)]
pub struct Args {
    /// Input vectors (plain, gzip, zstd or dense binary).
    ///
    /// With `--sparse-in`, this is the prefix of the `.sm`, `.rows` and `.cols` files.
    #[clap(short = 'i', long)]
    vectors_in: PathBuf,

    /// Reads sparse triple files instead of a single file.
    #[clap(long)]
    sparse_in: bool,

    /// File to which the vectors are output.
    ///
    /// With `--sparse-out`, this is the prefix of the output files.
    #[clap(short = 'o', long)]
    vectors_out: PathBuf,

    /// Output format: plain, gzip, dense or dense-zstd.
    #[clap(short = 'f', long, default_value = "plain")]
    format: VectorsFormat,

    /// Writes sparse triple files instead of a single file.
    #[clap(long, conflicts_with = "format")]
    sparse_out: bool,
}

/// 変換中に発生する可能性のあるエラー
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// 読み込みまたは書き出しのエラー
    #[error("Conversion failed: {0}")]
    Thesaurus(#[from] ThesaurusError),
}

/// 変換コマンドを実行する
pub fn run(args: Args) -> Result<(), ConvertError> {
    println!("Loading the vectors...");
    let vectors = if args.sparse_in {
        Vectors::from_sparse_files(&args.vectors_in)?
    } else {
        Vectors::from_path(&args.vectors_in, LoadOptions::vectors())?
    };
    let (n_rows, n_cols) = vectors.shape();
    eprintln!("{n_rows} rows x {n_cols} columns");

    println!("Writing the vectors...");
    if args.sparse_out {
        vectors.to_sparse_files(&args.vectors_out)?;
    } else {
        vectors.to_tsv(&args.vectors_out, args.format)?;
    }

    println!(
        "Successfully converted the vectors to {}",
        args.vectors_out.display()
    );
    Ok(())
}
