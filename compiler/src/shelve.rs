//! シソーラスのシェルフ化

use std::path::PathBuf;

use clap::Parser;
use thesaurus_rkyv::errors::ThesaurusError;
use thesaurus_rkyv::{EntryLookup, LoadOptions, Thesaurus};

/// シェルフ化コマンドの引数
#[derive(Parser, Debug)]
#[clap(
    name = "shelve",
    about = "A program to store a thesaurus in a shelf file."
)]
pub struct Args {
    /// Thesaurus file (entry, neighbour and weight separated by tabs).
    #[clap(short = 'i', long)]
    thesaurus_in: PathBuf,

    /// Shelf file to be written. Existing contents are replaced.
    #[clap(short = 'o', long)]
    shelf_out: PathBuf,

    /// Keeps only neighbours whose weight is greater than this value.
    #[clap(long, default_value_t = 0.0)]
    sim_threshold: f64,

    /// Inserts each entry at the head of its own neighbour list.
    #[clap(long)]
    include_self: bool,

    /// Removes neighbours sharing a word with their entry.
    #[clap(long)]
    no_overlap: bool,

    /// Maximum number of neighbours per entry.
    #[clap(long)]
    max_neighbours: Option<usize>,

    /// Separator between the words of a compound entry.
    #[clap(long, default_value = "_")]
    ngram_separator: String,
}

/// シェルフ化中に発生する可能性のあるエラー
#[derive(Debug, thiserror::Error)]
pub enum ShelveError {
    /// 読み込みまたは書き出しのエラー
    #[error("Shelving failed: {0}")]
    Thesaurus(#[from] ThesaurusError),
}

/// シェルフ化コマンドを実行する
pub fn run(args: Args) -> Result<(), ShelveError> {
    let options = LoadOptions::default()
        .sim_threshold(args.sim_threshold)
        .include_self(args.include_self)
        .allow_lexical_overlap(!args.no_overlap)
        .max_neighbours(args.max_neighbours)
        .ngram_separator(args.ngram_separator);

    println!("Loading the thesaurus...");
    let thesaurus = Thesaurus::from_path(&args.thesaurus_in, options)?;
    eprintln!("{} entries", thesaurus.len());

    println!("Writing the shelf...");
    thesaurus.to_shelf(&args.shelf_out)?;

    println!(
        "Successfully stored the thesaurus to {}",
        args.shelf_out.display()
    );
    Ok(())
}
