use std::fs::File;
use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::tempdir;

use crate::entries::{EntryLookup, Neighbour};
use crate::errors::ThesaurusError;
use crate::matrix::Matrix;
use crate::options::{LoadOptions, Predicate};
use crate::thesaurus::Thesaurus;

const EXP0_0A: &str = include_str!("./resources/exp0-0a.strings");
const EXP0_0C: &str = include_str!("./resources/exp0-0c.strings");
const EXP0_0D: &str = include_str!("./resources/exp0-0d.strings");
const LEXICAL_OVERLAP: &str = include_str!("./resources/lexical-overlap.txt");
const DIAGONAL_VECTORS: &str = include_str!("./resources/diagonal-vectors.txt");

fn load(text: &str, options: LoadOptions) -> Thesaurus {
    Thesaurus::from_reader(text.as_bytes(), options).unwrap()
}

fn num_pairs(thesaurus: &Thesaurus) -> usize {
    thesaurus.values().map(|v| v.len()).sum()
}

fn names(neighbours: &[Neighbour]) -> Vec<&str> {
    neighbours.iter().map(|n| n.name.as_str()).collect()
}

/// 閾値によるエントリ数と近傍の組の数の変化
#[test]
fn test_sim_threshold() {
    let mut entries = vec![];
    let mut pairs = vec![];
    for threshold in [0.0, 0.39, 0.5, 1.0] {
        let thesaurus = load(EXP0_0A, LoadOptions::default().sim_threshold(threshold));
        entries.push(thesaurus.len());
        pairs.push(num_pairs(&thesaurus));
    }
    assert_eq!(entries, vec![7, 3, 3, 0]);
    assert_eq!(pairs, vec![14, 4, 3, 0]);
}

#[test]
fn test_include_self() {
    let thesaurus = load(EXP0_0A, LoadOptions::default().include_self(true));
    assert_eq!(thesaurus.len(), 7);
    assert_eq!(num_pairs(&thesaurus), 21);
    for (key, neighbours) in thesaurus.items() {
        assert_eq!(neighbours[0], Neighbour::new(key, 1.0));
    }
}

#[test]
fn test_neighbours_are_sorted() {
    let thesaurus = load(EXP0_0C, LoadOptions::default());
    for neighbours in thesaurus.values() {
        assert!(neighbours.windows(2).all(|w| w[0].weight >= w[1].weight));
    }
    assert_eq!(
        thesaurus.keys().collect::<Vec<_>>(),
        vec!["a/J_b/N", "a/N", "b/V", "d/J", "g/N"]
    );
}

/// 語彙的に重複する近傍の除外と、空になったエントリの削除
#[test]
fn test_lexical_overlap_exclusion() {
    let thesaurus = load(EXP0_0D, LoadOptions::default().allow_lexical_overlap(false));
    assert_eq!(thesaurus.len(), 4);
    assert!(!thesaurus.contains("oil/N_price/N"));
    let counts: Vec<usize> = thesaurus.values().map(|v| v.len()).collect();
    assert_eq!(counts, vec![1, 3, 5, 3]);
    assert_eq!(
        names(&thesaurus.lookup("prince/N_aziz/N").unwrap()),
        vec!["king/N_fahd/N", "saudi/J_king/N", "sultan/N"]
    );
}

#[test]
fn test_lexical_overlap_allowed() {
    let thesaurus = load(EXP0_0D, LoadOptions::default());
    assert_eq!(thesaurus.len(), 5);
    let trade = thesaurus.lookup("trade/N_law/N").unwrap();
    assert_eq!(trade[0].name, "law/N");
    assert_eq!(trade[4].name, "product/N_line/N");
}

/// 重複の除外は近傍数の切り詰めより先に行われる
#[test]
fn test_lexical_overlap_before_max_neighbours() {
    let thesaurus = load(
        EXP0_0D,
        LoadOptions::default()
            .allow_lexical_overlap(false)
            .max_neighbours(Some(1)),
    );
    assert_eq!(thesaurus.len(), 4);
    assert_eq!(
        names(&thesaurus.lookup("trade/N_law/N").unwrap()),
        vec!["product/N_line/N"]
    );
    assert_eq!(
        names(&thesaurus.lookup("prince/N_aziz/N").unwrap()),
        vec!["king/N_fahd/N"]
    );
    assert!(thesaurus.values().all(|v| v.len() == 1));
}

#[test]
fn test_max_neighbours_length() {
    for max in [0, 1, 2, 3, 10] {
        let thesaurus = load(EXP0_0D, LoadOptions::default().max_neighbours(Some(max)));
        assert_eq!(thesaurus.len(), 5);
        for (key, neighbours) in thesaurus.items() {
            let original = load(EXP0_0D, LoadOptions::default()).lookup(key).unwrap().len();
            assert_eq!(neighbours.len(), max.min(original));
        }
    }
}

#[test]
fn test_lexical_overlap_compounds() {
    let without = load(LEXICAL_OVERLAP, LoadOptions::default().allow_lexical_overlap(false));
    assert_eq!(without.len(), 3);
    assert_eq!(without.lookup("monetary/J_screw/N").unwrap().len(), 1);
    assert_eq!(without.lookup("daily/J_pais/N").unwrap().len(), 2);
    assert_eq!(
        without.lookup("japanese/J_yen/N").unwrap()[0],
        Neighbour::new("daily/J_mark/N", 0.981391)
    );
    assert!(!without.contains("yen/N"));
    assert!(!without.contains("screw/N"));

    let with = load(LEXICAL_OVERLAP, LoadOptions::default());
    assert_eq!(with.len(), 5);
    assert_eq!(with.lookup("monetary/J_screw/N").unwrap().len(), 5);
    assert_eq!(with.lookup("daily/J_pais/N").unwrap().len(), 5);
    assert_eq!(
        with.lookup("japanese/J_yen/N").unwrap()[0],
        Neighbour::new("bundesbank/N_yen/N", 1.0)
    );
}

/// シソーラスとして読み込むと自己ペアと空のエントリは除去される
#[test]
fn test_self_pairs_and_empty_entries() {
    let thesaurus = load(DIAGONAL_VECTORS, LoadOptions::default());
    assert_eq!(thesaurus.keys().collect::<Vec<_>>(), vec!["a/N", "b/N"]);
    assert_eq!(names(&thesaurus.lookup("a/N").unwrap()), vec!["b/N"]);
    assert_eq!(names(&thesaurus.lookup("b/N").unwrap()), vec!["a/N"]);

    let kept = load(
        DIAGONAL_VECTORS,
        LoadOptions::default()
            .drop_self_pairs(false)
            .drop_empty_entries(false),
    );
    assert_eq!(kept.len(), 4);
    assert_eq!(names(&kept.lookup("b/N").unwrap()), vec!["b/N", "a/N"]);
    assert!(kept.lookup("z/N").unwrap().is_empty());
}

#[test]
fn test_missing_key() {
    let thesaurus = load(EXP0_0A, LoadOptions::default());
    assert!(thesaurus.get("z/N").is_none());
    match thesaurus.lookup("z/N") {
        Err(ThesaurusError::MissingKey(e)) => assert_eq!(e.key(), "z/N"),
        r => panic!("unexpected result: {r:?}"),
    }
}

#[test]
fn test_gzip_input() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exp0-0a.strings.gz");
    let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    enc.write_all(EXP0_0A.as_bytes()).unwrap();
    enc.finish().unwrap();

    let thesaurus =
        Thesaurus::from_path(&path, LoadOptions::default().sim_threshold(0.39)).unwrap();
    assert_eq!(thesaurus.len(), 3);
    assert_eq!(num_pairs(&thesaurus), 4);
}

#[test]
fn test_tsv_round_trip() {
    let dir = tempdir().unwrap();
    let original = load(EXP0_0D, LoadOptions::default());
    for gzipped in [false, true] {
        let path = dir.path().join(format!("out-{gzipped}.tsv"));
        original.to_tsv(&path, gzipped).unwrap();
        let reloaded = Thesaurus::from_path(&path, LoadOptions::default()).unwrap();
        assert_eq!(reloaded.keys().collect::<Vec<_>>(), original.keys().collect::<Vec<_>>());
        for (key, neighbours) in original.items() {
            assert_eq!(reloaded.lookup(key).unwrap(), neighbours);
        }
    }
}

#[test]
fn test_shelf_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("exp0-0d.shelf");
    let original = load(EXP0_0D, LoadOptions::default().allow_lexical_overlap(false));
    original.to_shelf(&path).unwrap();

    let shelved = Thesaurus::from_shelf_readonly(&path).unwrap();
    assert!(shelved.is_shelved());
    assert_eq!(shelved.len(), 4);
    for (key, neighbours) in original.items() {
        assert_eq!(shelved.lookup(key).unwrap(), neighbours);
    }
    assert!(!shelved.contains("oil/N_price/N"));
}

/// シソーラスから作成した疎行列
#[test]
fn test_to_sparse_matrix() {
    let thesaurus = load(EXP0_0C, LoadOptions::default());
    let (matrix, columns, rows) = thesaurus.to_sparse_matrix();
    assert!(matches!(matrix, Matrix::Sparse(_)));
    assert_eq!(columns, vec!["a/N", "b/V", "d/J", "g/N", "x/X"]);
    assert_eq!(rows, vec!["a/J_b/N", "a/N", "b/V", "d/J", "g/N"]);
    assert_eq!(matrix.dense_row(4), Some(vec![0.3, 0.6, 0.7, 0.0, 0.9]));
    assert_eq!(matrix.nnz(), 16);

    let filtered = load(
        EXP0_0C,
        LoadOptions::default().column_filter(Predicate::from_set(["x/X"])),
    );
    let (matrix, columns, rows) = filtered.to_sparse_matrix();
    assert_eq!(matrix.shape(), (5, 1));
    assert_eq!(columns, vec!["x/X"]);
    assert_eq!(rows.len(), 5);
    assert_eq!(matrix.nnz(), 1);
}

#[test]
fn test_from_entries() {
    let thesaurus = Thesaurus::from_entries(
        [
            ("a/N", vec![Neighbour::new("b/N", 0.1), Neighbour::new("c/N", 0.9)]),
            ("b/N", vec![Neighbour::new("b/N", 0.5)]),
        ],
        LoadOptions::default(),
    )
    .unwrap();
    assert_eq!(thesaurus.len(), 1);
    assert_eq!(names(&thesaurus.lookup("a/N").unwrap()), vec!["c/N", "b/N"]);
}
