//! エントリテーブルの読み込み
//!
//! このモジュールは、以下の入力からエントリテーブルを構築します。
//!
//! - ファイルパス（プレーンテキスト、gzip、zstd、密ベクトルバイナリ）
//! - 任意の[`BufRead`]
//! - メモリ上の`(エントリ, 近傍リスト)`のイテレータ
//!
//! 入力形式は先頭のマジックバイトから判定されます。
//! 読み込みは2段階で行われます。まず行を解析して生のテーブルを作り、
//! 次に[`LoadOptions`]に従ってフィルタを適用します。

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use hashbrown::HashSet;

use crate::entries::{EntryLookup, EntryTable, Neighbour};
use crate::errors::{Result, ThesaurusError};
use crate::options::LoadOptions;
use crate::shelf::SHELF_MAGIC;
use crate::tokens::DocumentFeature;
use crate::utils::{nonoverlapping_pairs, parse_tsv_row};
use crate::vectors::io::{DENSE_MAGIC, DenseVectors};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// 先頭バイトから判定される入力形式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// タブ区切りテキスト
    Plain,
    /// gzip圧縮
    Gzip,
    /// Zstandard圧縮
    Zstd,
    /// 密ベクトルバイナリ
    Dense,
    /// シェルフ
    Shelf,
}

/// 先頭バイト列から入力形式を判定します。
///
/// ```
/// # use thesaurus_rkyv::loader::{detect_format, InputFormat};
/// assert_eq!(detect_format(&[0x1f, 0x8b, 0x08]), InputFormat::Gzip);
/// assert_eq!(detect_format(b"a/N\tb/N\t0.5\n"), InputFormat::Plain);
/// ```
pub fn detect_format(head: &[u8]) -> InputFormat {
    if head.starts_with(GZIP_MAGIC) {
        InputFormat::Gzip
    } else if head.starts_with(ZSTD_MAGIC) {
        InputFormat::Zstd
    } else if head.starts_with(DENSE_MAGIC) {
        InputFormat::Dense
    } else if head.starts_with(SHELF_MAGIC) {
        InputFormat::Shelf
    } else {
        InputFormat::Plain
    }
}

/// 展開済みの入力
pub(crate) enum Payload {
    Text(Box<dyn BufRead>),
    Dense(DenseVectors),
}

/// ファイルを開き、圧縮を展開して中身の形式を判定します。
pub(crate) fn open_path(path: &Path) -> Result<Payload> {
    if path.is_dir() {
        return Err(ThesaurusError::PathIsDirectory(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let mut rdr: Box<dyn BufRead> = Box::new(BufReader::new(file));

    rdr = match detect_format(rdr.fill_buf()?) {
        InputFormat::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(rdr))),
        InputFormat::Zstd => Box::new(BufReader::new(zstd::Decoder::with_buffer(rdr)?)),
        _ => rdr,
    };

    // 展開後のストリームは短い読み込みを返しうるため、先頭を確実に読み切る
    let head_len = DENSE_MAGIC.len().max(SHELF_MAGIC.len()) as u64;
    let mut head = Vec::with_capacity(head_len as usize);
    (&mut rdr).take(head_len).read_to_end(&mut head)?;

    let head = Cursor::new(head);
    match detect_format(head.get_ref()) {
        InputFormat::Dense => Ok(Payload::Dense(DenseVectors::read(head.chain(rdr))?)),
        InputFormat::Shelf => Err(ThesaurusError::invalid_format(
            "path",
            "this is a shelf file; open it with Thesaurus::from_shelf_readonly",
        )),
        InputFormat::Gzip | InputFormat::Zstd => Err(ThesaurusError::invalid_format(
            "path",
            "nested compression is not supported",
        )),
        InputFormat::Plain => Ok(Payload::Text(Box::new(head.chain(rdr)))),
    }
}

/// テキストを解析して、フィルタ適用前のテーブルを作成します。
///
/// 同じエントリが複数行に現れた場合は後の行が優先され、警告が記録されます。
///
/// # 引数
///
/// * `rdr` - タブ区切りテキストのリーダー
/// * `source_name` - エラーメッセージに使用する入力の名前
///
/// # エラー
///
/// 近傍と重みの列数が揃っていない場合、重みが数値でない場合、または
/// UTF-8として不正な行がある場合に[`ThesaurusError::CorruptData`]を返します。
pub fn parse_entries<R: BufRead>(mut rdr: R, source_name: &str) -> Result<EntryTable> {
    let mut table = EntryTable::new();
    let mut buf = vec![];
    let mut line_no = 0;
    loop {
        buf.clear();
        if rdr.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = std::str::from_utf8(&buf).map_err(|e| {
            ThesaurusError::corrupt_data(source_name, line_no, format!("invalid UTF-8: {e}"))
        })?;
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }

        let fields = parse_tsv_row(line);
        let entry = fields[0].trim();
        if entry.is_empty() {
            return Err(ThesaurusError::corrupt_data(
                source_name,
                line_no,
                "empty entry field",
            ));
        }
        if fields.len() % 2 == 0 {
            return Err(ThesaurusError::corrupt_data(
                source_name,
                line_no,
                format!("{} neighbour/weight fields is odd", fields.len() - 1),
            ));
        }

        let mut neighbours = Vec::with_capacity(fields.len() / 2);
        for (name, weight) in nonoverlapping_pairs(&fields, 1, None) {
            let weight = parse_weight(weight).ok_or_else(|| {
                ThesaurusError::corrupt_data(
                    source_name,
                    line_no,
                    format!("weight {weight:?} of {name:?} is not a number"),
                )
            })?;
            neighbours.push(Neighbour::new(name.trim(), weight));
        }

        if table.insert(entry, neighbours).is_some() {
            log::warn!("{source_name}:{line_no}: duplicate entry {entry:?} replaces the earlier line");
        }
    }
    Ok(table)
}

fn parse_weight(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|w| !w.is_nan())
}

/// 生のテーブルに読み込みオプションのフィルタを適用します。
///
/// # エラー
///
/// 語彙的重複を除外する設定で、素性として解析できないエントリ名があった場合に
/// [`ThesaurusError::MalformedFeature`]を返します。
pub fn apply_options(raw: EntryTable, options: &LoadOptions) -> Result<EntryTable> {
    let mut table = EntryTable::with_capacity(raw.len());
    for (entry, neighbours) in raw {
        match filter_neighbours(&entry, neighbours, options)? {
            Some(neighbours) => {
                table.insert(entry, neighbours);
            }
            None => log::debug!("entry {entry:?} has no neighbours left and is skipped"),
        }
    }
    Ok(table)
}

/// 1つのエントリの近傍リストにフィルタを適用します。
///
/// 近傍が残らず、空のエントリを除去する設定の場合は`None`を返します。
pub(crate) fn filter_neighbours(
    entry: &str,
    neighbours: Vec<Neighbour>,
    options: &LoadOptions,
) -> Result<Option<Vec<Neighbour>>> {
    let mut neighbours: Vec<Neighbour> = neighbours
        .into_iter()
        .filter(|n| n.weight > options.sim_threshold)
        .filter(|n| !(options.drop_self_pairs && n.name == entry))
        .collect();

    if options.sort_neighbours {
        neighbours.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    }
    let mut seen = HashSet::with_capacity(neighbours.len());
    neighbours.retain(|n| seen.insert(n.name.clone()));

    if !options.allow_lexical_overlap {
        let sep = options.ngram_separator.as_str();
        let feature = DocumentFeature::parse(entry, sep)?;
        let mut kept = Vec::with_capacity(neighbours.len());
        for n in neighbours {
            if !DocumentFeature::parse(&n.name, sep)?.overlaps(&feature) {
                kept.push(n);
            }
        }
        neighbours = kept;
    }

    if neighbours.is_empty() && options.drop_empty_entries {
        return Ok(None);
    }

    if options.include_self {
        neighbours.insert(0, Neighbour::new(entry, 1.0));
    }
    if let Some(max) = options.max_neighbours {
        neighbours.truncate(max);
    }
    Ok(Some(neighbours))
}

/// リーダーから読み込み、フィルタを適用したテーブルを返します。
pub fn load_reader<R: BufRead>(
    rdr: R,
    source_name: &str,
    options: &LoadOptions,
) -> Result<EntryTable> {
    let raw = parse_entries(rdr, source_name)?;
    let table = apply_options(raw, options)?;
    log::debug!(
        "loaded {} entries ({} pairs) from {source_name}",
        table.len(),
        table.num_pairs()
    );
    Ok(table)
}

/// メモリ上のエントリ列にフィルタを適用したテーブルを返します。
pub fn load_iter<I, K, N>(entries: I, options: &LoadOptions) -> Result<EntryTable>
where
    I: IntoIterator<Item = (K, N)>,
    K: Into<String>,
    N: IntoIterator<Item = Neighbour>,
{
    let mut raw = EntryTable::new();
    for (entry, neighbours) in entries {
        let entry = entry.into();
        if raw.insert(entry.as_str(), neighbours.into_iter().collect()).is_some() {
            log::warn!("duplicate entry {entry:?} replaces the earlier one");
        }
    }
    apply_options(raw, options)
}

/// ファイルからテーブルを読み込みます。
///
/// 密ベクトルバイナリは、各行の非ゼロ要素を近傍リストとして読み込みます。
pub fn load_path<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<EntryTable> {
    let path = path.as_ref();
    match open_path(path)? {
        Payload::Text(rdr) => load_reader(rdr, &path.display().to_string(), options),
        Payload::Dense(dense) => load_iter(dense.into_entries()?, options),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str, options: &LoadOptions) -> Result<EntryTable> {
        load_reader(text.as_bytes(), "test", options)
    }

    #[test]
    fn test_odd_fields() {
        let err = load("a/N\tb/N\t0.5\n\nc/N\td/N\n", &LoadOptions::default()).unwrap_err();
        match err {
            ThesaurusError::CorruptData(e) => assert_eq!(e.line(), 3),
            e => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_bad_weight() {
        for bad in ["x", "NaN", ""] {
            let text = format!("a/N\tb/N\t{bad}\n");
            assert!(matches!(
                load(&text, &LoadOptions::default()),
                Err(ThesaurusError::CorruptData(_))
            ));
        }
    }

    #[test]
    fn test_invalid_utf8() {
        let bytes: &[u8] = b"a/N\tb/N\t0.5\n\xff/N\tb/N\t0.5\n";
        let err = load_reader(bytes, "test", &LoadOptions::default()).unwrap_err();
        match err {
            ThesaurusError::CorruptData(e) => assert_eq!(e.line(), 2),
            e => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_crlf_and_trailing_tab() {
        let t = load("a/N\tb/N\t0.5\t\r\nb/N\ta/N\t0.4\r\n", &LoadOptions::default()).unwrap();
        assert_eq!(t.neighbours("a/N"), Some(&[Neighbour::new("b/N", 0.5)][..]));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_entry_only_line_is_dropped() {
        let t = load("a/N\nb/N\ta/N\t0.4\n", &LoadOptions::default()).unwrap();
        assert_eq!(t.key_slice(), &["b/N"]);
    }

    #[test]
    fn test_duplicate_line_last_wins() {
        let t = load(
            "a/N\tb/N\t0.5\nb/N\ta/N\t0.4\na/N\tc/N\t0.3\n",
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(t.key_slice(), &["a/N", "b/N"]);
        assert_eq!(t.neighbours("a/N"), Some(&[Neighbour::new("c/N", 0.3)][..]));
    }

    #[test]
    fn test_sort_dedup_and_self_pairs() {
        let t = load(
            "a/N\tb/N\t0.1\ta/N\t0.9\tc/N\t0.5\tb/N\t0.7\n",
            &LoadOptions::default(),
        )
        .unwrap();
        let weights: Vec<_> = t.neighbours("a/N").unwrap().iter().map(|n| n.weight).collect();
        assert_eq!(weights, vec![0.7, 0.5]);
    }

    #[test]
    fn test_unsorted_keeps_file_order() {
        let t = load("a/N\tb/N\t0.1\tc/N\t0.5\n", &LoadOptions::vectors()).unwrap();
        let names: Vec<_> = t
            .neighbours("a/N")
            .unwrap()
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(names, vec!["b/N", "c/N"]);
    }

    /// ベクトルとして読み込む場合、行名と同じ列や空の行も残る
    #[test]
    fn test_vectors_keep_diagonal_and_empty_rows() {
        let t = load("a/N\ta/N\t1.0\tb/N\t2.0\nz/N\n", &LoadOptions::vectors()).unwrap();
        assert_eq!(t.key_slice(), &["a/N", "z/N"]);
        assert_eq!(
            t.neighbours("a/N").unwrap(),
            &[Neighbour::new("a/N", 1.0), Neighbour::new("b/N", 2.0)]
        );
        assert_eq!(t.neighbours("z/N"), Some(&[][..]));
    }

    #[test]
    fn test_include_self_does_not_resurrect() {
        let options = LoadOptions::default().include_self(true).sim_threshold(0.5);
        let t = load("a/N\tb/N\t0.1\nb/N\ta/N\t0.7\n", &options).unwrap();
        assert_eq!(t.key_slice(), &["b/N"]);
        assert_eq!(
            t.neighbours("b/N").unwrap(),
            &[Neighbour::new("b/N", 1.0), Neighbour::new("a/N", 0.7)]
        );
    }

    #[test]
    fn test_malformed_feature_with_overlap_filter() {
        let options = LoadOptions::default().allow_lexical_overlap(false);
        assert!(matches!(
            load("messed_up\tb/N\t0.1\n", &options),
            Err(ThesaurusError::MalformedFeature(_))
        ));
        // 重複を許可する場合は素性を解析しない
        assert!(load("messed_up\tb/N\t0.1\n", &LoadOptions::default()).is_ok());
    }

    #[test]
    fn test_load_iter() {
        let t = load_iter(
            [
                ("a/N", vec![Neighbour::new("b/N", 0.2), Neighbour::new("c/N", 0.8)]),
                ("c/N", vec![]),
            ],
            &LoadOptions::default(),
        )
        .unwrap();
        assert_eq!(t.key_slice(), &["a/N"]);
        assert_eq!(t.neighbours("a/N").unwrap()[0].name, "c/N");
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(&[0x28, 0xb5, 0x2f, 0xfd, 0]), InputFormat::Zstd);
        assert_eq!(detect_format(DENSE_MAGIC), InputFormat::Dense);
        assert_eq!(detect_format(SHELF_MAGIC), InputFormat::Shelf);
        assert_eq!(detect_format(b""), InputFormat::Plain);
    }
}
