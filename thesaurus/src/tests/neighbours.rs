use crate::neighbours::{Algorithm, Metric, SimsConfig};
use crate::options::LoadOptions;
use crate::vectors::Vectors;

const EXP0_0C: &str = include_str!("./resources/exp0-0c.strings");
const EXP0_0D: &str = include_str!("./resources/exp0-0d.strings");
const DIAGONAL_VECTORS: &str = include_str!("./resources/diagonal-vectors.txt");
const LEXICAL_OVERLAP_VECTORS: &str = include_str!("./resources/lexical-overlap-vectors.txt");

fn load(text: &str) -> Vectors {
    Vectors::from_reader(text.as_bytes(), LoadOptions::vectors()).unwrap()
}

fn assert_neighbours(actual: &[(String, f64)], expected: &[(&str, f64)]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?}");
    for ((name, dist), (exp_name, exp_dist)) in actual.iter().zip(expected) {
        assert_eq!(name, exp_name);
        assert!((dist - exp_dist).abs() < 1e-6, "{name}: {dist} != {exp_dist}");
    }
}

/// 5エントリのシナリオ
#[test]
fn test_nearest_neighbour() {
    let mut v = load(EXP0_0C);
    v.init_sims(None, SimsConfig::default().n_neighbours(1));
    assert_neighbours(&v.get_nearest_neighbours("b/V"), &[("a/J_b/N", 0.223607)]);
    assert_eq!(v.neighbour_index().unwrap().fit_shape(), (5, 5));
}

#[test]
fn test_restricted_scope() {
    let mut v = load(EXP0_0C);
    v.init_sims(
        Some(&["b/V", "g/N", "a/N"]),
        SimsConfig::default().n_neighbours(1),
    );
    assert_eq!(v.neighbour_index().unwrap().fit_shape(), (3, 5));
    assert_neighbours(&v.get_nearest_neighbours("b/V"), &[("a/N", 0.387298)]);
    // スコープ外のエントリも検索できる
    assert_eq!(v.get_nearest_neighbours("a/J_b/N")[0].0, "b/V");

    v.init_sims(
        Some(&["b/V", "g/N", "a/N"]),
        SimsConfig::default().n_neighbours(2),
    );
    assert_neighbours(
        &v.get_nearest_neighbours("b/V"),
        &[("a/N", 0.387298), ("g/N", 1.315295)],
    );
}

/// 近傍数がスコープより大きい場合はスコープの大きさから自身を除いた数だけ返る
#[test]
fn test_oversized_k() {
    let mut v = load(EXP0_0C);
    v.init_sims(
        Some(&["b/V", "g/N", "a/N"]),
        SimsConfig::default().n_neighbours(10),
    );
    assert_eq!(v.get_nearest_neighbours("b/V").len(), 2);
    assert_eq!(v.get_nearest_neighbours("a/J_b/N").len(), 3);

    v.init_sims(None, SimsConfig::default().n_neighbours(100));
    for row in v.row_names().to_vec() {
        assert_eq!(v.get_nearest_neighbours(&row).len(), 4);
    }
}

#[test]
fn test_distances_are_non_decreasing() {
    let v = load(EXP0_0D);
    for row in v.row_names() {
        let result = v.get_nearest_neighbours(row);
        assert!(result.windows(2).all(|w| w[0].1 <= w[1].1), "{result:?}");
        assert!(result.iter().all(|(name, _)| name != row));
    }
}

/// 3つの検索方法は同じ距離を返す
#[test]
fn test_search_methods_agree() {
    for text in [EXP0_0C, EXP0_0D] {
        let mut v = load(text);
        for allow in [true, false] {
            for algorithm in [Algorithm::Brute, Algorithm::KdTree] {
                for k in [1, 2, 3, 10] {
                    v.set_allow_lexical_overlap(allow);
                    v.init_sims(None, SimsConfig::default().n_neighbours(k).algorithm(algorithm));
                    for row in v.row_names().to_vec() {
                        let fast = v.get_nearest_neighbours(&row);
                        let linear = v.get_nearest_neighbours_linear(&row);
                        let skipping = v.get_nearest_neighbours_skipping(&row);
                        assert_eq!(fast.len(), linear.len());
                        assert_eq!(fast.len(), skipping.len());
                        for ((a, b), c) in fast.iter().zip(&linear).zip(&skipping) {
                            assert!((a.1 - b.1).abs() < 1e-9);
                            assert!((a.1 - c.1).abs() < 1e-9);
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_kdtree_matches_brute() {
    let mut v = load(EXP0_0C);
    v.init_sims(None, SimsConfig::default().n_neighbours(3));
    let brute: Vec<_> = v
        .row_names()
        .to_vec()
        .iter()
        .map(|row| v.get_nearest_neighbours(row))
        .collect();
    v.init_sims(
        None,
        SimsConfig::default()
            .n_neighbours(3)
            .algorithm(Algorithm::KdTree),
    );
    let tree: Vec<_> = v
        .row_names()
        .to_vec()
        .iter()
        .map(|row| v.get_nearest_neighbours(row))
        .collect();
    assert_eq!(brute, tree);
}

#[test]
fn test_cosine_metric() {
    let mut v = load(EXP0_0C);
    v.init_sims(
        None,
        SimsConfig::default()
            .n_neighbours(1)
            .metric(Metric::Cosine)
            .algorithm(Algorithm::KdTree),
    );
    let result = v.get_nearest_neighbours("b/V");
    assert_eq!(result[0].0, "a/J_b/N");
    let expected = 1.0 - v.cosine_similarity("b/V", "a/J_b/N").unwrap();
    assert!((result[0].1 - expected).abs() < 1e-12);
}

fn names(result: Vec<(String, f64)>) -> Vec<String> {
    result.into_iter().map(|(name, _)| name).collect()
}

/// 語彙的に重複する近傍は許可した場合にのみ返る
#[test]
fn test_lexical_overlap_in_queries() {
    let mut v = load(LEXICAL_OVERLAP_VECTORS);
    v.init_sims(None, SimsConfig::default().n_neighbours(10));
    assert_eq!(
        names(v.get_nearest_neighbours("daily/J_pais/N")),
        vec!["spanish/J", "pais/N", "daily/J"]
    );
    assert!(names(v.get_nearest_neighbours("pais/N")).contains(&"daily/J_pais/N".to_string()));

    v.set_allow_lexical_overlap(false);
    assert_eq!(
        names(v.get_nearest_neighbours("daily/J_pais/N")),
        vec!["spanish/J"]
    );
    let pais = names(v.get_nearest_neighbours("pais/N"));
    assert_eq!(pais.len(), 2);
    assert!(!pais.contains(&"daily/J_pais/N".to_string()));
    assert!(v.get_nearest_neighbours("unknown/N").is_empty());
}

/// 除外で件数が不足すると全候補を走査する
#[test]
fn test_overlap_exclusion_falls_back_to_scan() {
    let mut v = load(LEXICAL_OVERLAP_VECTORS);
    v.set_allow_lexical_overlap(false);
    v.init_sims(None, SimsConfig::default().n_neighbours(2));
    assert_neighbours(&v.get_nearest_neighbours("daily/J_pais/N"), &[("spanish/J", 0.0)]);
    assert_neighbours(
        &v.get_nearest_neighbours("pais/N"),
        &[("daily/J", 0.547723), ("spanish/J", 0.574456)],
    );
}

/// すべてゼロの行も検索対象になる
#[test]
fn test_zero_row_is_searchable() {
    let mut v = load(DIAGONAL_VECTORS);
    v.init_sims(None, SimsConfig::default().n_neighbours(1));
    assert_neighbours(&v.get_nearest_neighbours("z/N"), &[("c/N", 0.5)]);
    assert_neighbours(&v.get_nearest_neighbours("c/N"), &[("z/N", 0.5)]);
}
