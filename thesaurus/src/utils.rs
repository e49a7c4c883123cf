//! ユーティリティ関数を提供するモジュール
//!
//! このモジュールには、TSV処理やペア列挙のヘルパー関数が含まれています。
//! 主に以下の機能を提供します：
//!
//! - TSV行のフィールド分割
//! - スライスを重複なし／重複ありのペアとして列挙するイテレータ
//! - 一時ファイルを経由したアトミックな書き込み

use std::io::{BufWriter, Write};
use std::path::Path;

use csv_core::ReadFieldResult;

use crate::errors::{Result, ThesaurusError};

/// TSV形式の行を解析してフィールドのベクターに分割する
///
/// 引用符は特別扱いしません。行末の空フィールド（末尾のタブ）は取り除かれます。
///
/// # 引数
///
/// * `row` - 解析するTSV形式の文字列（改行を含まない）
///
/// # 戻り値
///
/// 解析されたフィールドを格納する文字列のベクター
///
/// # 例
///
/// ```
/// # use thesaurus_rkyv::utils::parse_tsv_row;
/// let fields = parse_tsv_row("a/J_b/N\tg/N\t0.8");
/// assert_eq!(fields, vec!["a/J_b/N", "g/N", "0.8"]);
///
/// let fields_with_quote = parse_tsv_row("\"big\"/J\tx/N\t0.1\t");
/// assert_eq!(fields_with_quote, vec!["\"big\"/J", "x/N", "0.1"]);
/// ```
pub fn parse_tsv_row(row: &str) -> Vec<String> {
    let mut fields = vec![];
    let mut rdr = csv_core::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .build();
    let mut bytes = row.as_bytes();
    let mut output = [0; 4096];
    let mut field = vec![];
    loop {
        let (result, nin, nout) = rdr.read_field(bytes, &mut output);
        field.extend_from_slice(&output[..nout]);
        bytes = &bytes[nin..];
        match result {
            // 入力が尽きた後は空スライスを渡してEOFを通知する
            ReadFieldResult::InputEmpty | ReadFieldResult::OutputFull => {}
            ReadFieldResult::Field { record_end } => {
                fields.push(String::from_utf8_lossy(&field).into_owned());
                field.clear();
                if record_end {
                    break;
                }
            }
            ReadFieldResult::End => break,
        }
    }
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

/// スライスの`start`番目以降を重複しない2要素のペアとして列挙する
///
/// 要素数が奇数の場合、最後の要素は無視されます。
///
/// # 引数
///
/// * `items` - 対象のスライス
/// * `start` - 列挙を開始する位置
/// * `max_pairs` - 列挙するペアの最大数。`None`の場合は無制限
///
/// # 例
///
/// ```
/// # use thesaurus_rkyv::utils::nonoverlapping_pairs;
/// let v = [0, 1, 2, 3, 4];
/// let pairs: Vec<_> = nonoverlapping_pairs(&v, 1, None).collect();
/// assert_eq!(pairs, vec![(&1, &2), (&3, &4)]);
/// ```
pub fn nonoverlapping_pairs<T>(
    items: &[T],
    start: usize,
    max_pairs: Option<usize>,
) -> impl Iterator<Item = (&T, &T)> {
    items
        .get(start..)
        .unwrap_or_default()
        .chunks_exact(2)
        .map(|c| (&c[0], &c[1]))
        .take(max_pairs.unwrap_or(usize::MAX))
}

/// 隣接する要素のペアを列挙する
///
/// ```
/// # use thesaurus_rkyv::utils::overlapping_pairs;
/// let pairs: Vec<_> = overlapping_pairs(&[1, 2, 3]).collect();
/// assert_eq!(pairs, vec![(&1, &2), (&2, &3)]);
/// ```
pub fn overlapping_pairs<T>(items: &[T]) -> impl Iterator<Item = (&T, &T)> {
    items.windows(2).map(|w| (&w[0], &w[1]))
}

/// 同じディレクトリの一時ファイルに書き込み、完了後に`path`へ置き換えます。
///
/// 書き込みが失敗した場合、`path`は変更されません。
pub(crate) fn write_atomic<P, F>(path: P, write: F) -> Result<()>
where
    P: AsRef<Path>,
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let path = path.as_ref();
    if path.is_dir() {
        return Err(ThesaurusError::PathIsDirectory(path.to_path_buf()));
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut wtr = BufWriter::new(temp_file.as_file_mut());
        write(&mut wtr)?;
        wtr.flush()?;
    }
    temp_file.as_file().sync_all()?;
    temp_file.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tsv_row() {
        assert_eq!(
            &["daily/J_pais/N", "spanish/J", "0.5"],
            parse_tsv_row("daily/J_pais/N\tspanish/J\t0.5").as_slice()
        );
    }

    #[test]
    fn test_parse_tsv_row_keeps_inner_empty_fields() {
        assert_eq!(&["a/N", "", "0.5"], parse_tsv_row("a/N\t\t0.5").as_slice());
    }

    #[test]
    fn test_parse_tsv_row_long_field() {
        let long = "x".repeat(10_000);
        let row = format!("{long}/N\tb/N\t1");
        let fields = parse_tsv_row(&row);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].len(), 10_002);
    }

    #[test]
    fn test_parse_tsv_row_empty() {
        assert!(parse_tsv_row("").is_empty());
    }

    #[test]
    fn test_nonoverlapping_pairs() {
        let inp = [0, 1, 2, 3, 4, 5, 6, 7, 8];
        let output: Vec<_> = nonoverlapping_pairs(&inp, 1, None)
            .map(|(a, b)| (*a, *b))
            .collect();
        assert_eq!(vec![(1, 2), (3, 4), (5, 6), (7, 8)], output);

        let output: Vec<_> = nonoverlapping_pairs(&inp, 1, Some(2))
            .map(|(a, b)| (*a, *b))
            .collect();
        assert_eq!(vec![(1, 2), (3, 4)], output);

        assert_eq!(nonoverlapping_pairs(&inp, 1, Some(0)).count(), 0);
        assert_eq!(nonoverlapping_pairs(&inp, 20, None).count(), 0);
    }

    #[test]
    fn test_write_atomic_keeps_target_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.tsv");
        write_atomic(&path, |w| Ok(w.write_all(b"first")?)).unwrap();
        let result = write_atomic(&path, |w| {
            w.write_all(b"second")?;
            Err(ThesaurusError::invalid_state("write", "interrupted"))
        });
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_overlapping_pairs() {
        let inp = [0.1, 0.2, 0.5];
        assert!(overlapping_pairs(&inp).all(|(a, b)| a <= b));
        assert_eq!(overlapping_pairs(&inp[..1]).count(), 0);
    }
}
