//! ベクトルからの近傍シソーラスの生成

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use thesaurus_rkyv::errors::ThesaurusError;
use thesaurus_rkyv::{Algorithm, LoadOptions, Neighbour, SimsConfig, Thesaurus, Vectors};

/// 距離関数
#[derive(Clone, Copy, Debug, ValueEnum)]
enum MetricArg {
    Euclidean,
    Cosine,
}

/// 探索アルゴリズム
#[derive(Clone, Copy, Debug, ValueEnum)]
enum AlgorithmArg {
    Brute,
    KdTree,
}

/// 近傍コマンドの引数
#[derive(Parser, Debug)]
#[clap(
    name = "neighbours",
    about = "A program to compute the nearest neighbours of every entry in a vector space."
)]
pub struct Args {
    /// Input vectors (plain, gzip, zstd or dense binary).
    #[clap(short = 'i', long)]
    vectors_in: PathBuf,

    /// Thesaurus file to be written. Weights are distances.
    #[clap(short = 'o', long)]
    thesaurus_out: PathBuf,

    /// Number of neighbours per entry.
    #[clap(short = 'k', default_value_t = 10)]
    k: usize,

    /// Distance function.
    #[clap(long, value_enum, default_value = "euclidean")]
    metric: MetricArg,

    /// Search algorithm. The kd-tree supports only the euclidean distance.
    #[clap(long, value_enum, default_value = "brute")]
    algorithm: AlgorithmArg,

    /// Excludes neighbours sharing a word with their entry.
    #[clap(long)]
    no_overlap: bool,

    /// Compresses the output with gzip.
    #[clap(long)]
    gzip: bool,
}

/// 近傍計算中に発生する可能性のあるエラー
#[derive(Debug, thiserror::Error)]
pub enum NeighboursError {
    /// 読み込みまたは書き出しのエラー
    #[error("Neighbour search failed: {0}")]
    Thesaurus(#[from] ThesaurusError),
}

/// 近傍コマンドを実行する
pub fn run(args: Args) -> Result<(), NeighboursError> {
    println!("Loading the vectors...");
    let mut vectors = Vectors::from_path(&args.vectors_in, LoadOptions::vectors())?;
    vectors.set_allow_lexical_overlap(!args.no_overlap);

    let metric = match args.metric {
        MetricArg::Euclidean => thesaurus_rkyv::Metric::Euclidean,
        MetricArg::Cosine => thesaurus_rkyv::Metric::Cosine,
    };
    let algorithm = match args.algorithm {
        AlgorithmArg::Brute => Algorithm::Brute,
        AlgorithmArg::KdTree => Algorithm::KdTree,
    };
    let config = SimsConfig::default()
        .n_neighbours(args.k)
        .metric(metric)
        .algorithm(algorithm);

    println!("Building the neighbour index...");
    vectors.init_sims(None, config);

    println!("Searching the neighbours...");
    let entries: Vec<(String, Vec<Neighbour>)> = vectors
        .row_names()
        .iter()
        .map(|row| {
            let neighbours = vectors
                .get_nearest_neighbours(row)
                .into_iter()
                .map(Neighbour::from)
                .collect();
            (row.clone(), neighbours)
        })
        .collect();
    eprintln!("{} entries", entries.len());

    // 距離の昇順を保ち、近傍のないエントリは出力しない
    let options = LoadOptions::vectors().drop_empty_entries(true);
    let thesaurus = Thesaurus::from_entries(entries, options)?;
    thesaurus.to_tsv(&args.thesaurus_out, args.gzip)?;

    println!(
        "Successfully wrote the neighbours to {}",
        args.thesaurus_out.display()
    );
    Ok(())
}
