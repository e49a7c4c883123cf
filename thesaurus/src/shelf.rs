//! ディスク上のキー・値ストア（シェルフ）
//!
//! シェルフは、エントリから近傍リストへの対応をrkyvアーカイブとして保存するファイルです。
//! ファイルはマジックバイト、16バイト境界までのパディング、キー順に並んだ
//! [`ShelfRecord`]の配列から構成されます。
//!
//! - 読み取り専用モードではファイルをメモリマップし、検証済みのアーカイブに対して
//!   二分探索で参照します。
//! - 書き込みモードではレコードをメモリ上に蓄積し、[`Shelf::flush`]、[`Shelf::close`]、
//!   またはドロップ時に一時ファイル経由でアトミックに書き出します。
//!
//! 同時アクセスは`<path>.lock`ファイルのロックで制御されます。書き込みは排他ロック、
//! 読み取りは共有ロックを取得し、競合した場合は待たずに失敗します。

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use rkyv::rancor::Error;
use rkyv::util::AlignedVec;
use rkyv::{
    Archive, Archived, Deserialize, Serialize, access, access_unchecked, api::serialize_using,
    ser::Serializer, ser::allocator::Arena, ser::sharing::Share, ser::writer::IoWriter,
    util::with_arena,
};

use crate::entries::{EntryLookup, Neighbour};
use crate::errors::{Result, ThesaurusError};
use crate::utils::write_atomic;

/// シェルフファイルを識別するマジックバイト
pub const SHELF_MAGIC: &[u8] = b"ThesaurusShelf 0.1\n";

const SHELF_MAGIC_LEN: usize = SHELF_MAGIC.len();
const RKYV_ALIGNMENT: usize = 16;
const PADDING_LEN: usize =
    (RKYV_ALIGNMENT - (SHELF_MAGIC_LEN % RKYV_ALIGNMENT)) % RKYV_ALIGNMENT;
const DATA_START: usize = SHELF_MAGIC_LEN + PADDING_LEN;

/// シェルフに保存される1エントリ
#[derive(Clone, Debug, PartialEq, Archive, Serialize, Deserialize)]
pub struct ShelfRecord {
    /// エントリ名
    pub key: String,

    /// 近傍リスト
    pub neighbours: Vec<Neighbour>,
}

type ArchivedRecords = Archived<Vec<ShelfRecord>>;

/// シェルフを開くモード
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShelfMode {
    /// 読み取り専用（共有ロック）
    ReadOnly,
    /// 書き込み（排他ロック）
    Write,
}

enum ShelfBuffer {
    Mmap(Mmap),
    Aligned(AlignedVec<16>),
}

impl ShelfBuffer {
    fn data(&self) -> &[u8] {
        match self {
            Self::Mmap(mmap) => mmap.get(DATA_START..).unwrap_or_default(),
            Self::Aligned(bytes) => bytes.as_slice(),
        }
    }

    fn records(&self) -> &ArchivedRecords {
        // SAFETY: バッファは開く際に`access`で検証済みで、以後変更されない
        unsafe { access_unchecked::<ArchivedRecords>(self.data()) }
    }
}

enum ShelfState {
    Read(ShelfBuffer),
    Write {
        records: BTreeMap<String, Vec<Neighbour>>,
        dirty: bool,
    },
    Closed,
}

/// ディスク上のエントリストア
///
/// # 例
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use thesaurus_rkyv::entries::{EntryLookup, Neighbour};
/// use thesaurus_rkyv::shelf::Shelf;
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("thesaurus.shelf");
///
/// let mut shelf = Shelf::open_write(&path)?;
/// shelf.insert("a/N", vec![Neighbour::new("b/N", 0.5)])?;
/// shelf.close()?;
///
/// let shelf = Shelf::open_readonly(&path)?;
/// assert_eq!(shelf.lookup("a/N")?[0].name, "b/N");
/// assert!(shelf.get("z/N").is_none());
/// # Ok(())
/// # }
/// ```
pub struct Shelf {
    path: PathBuf,
    mode: ShelfMode,
    _lock: Option<File>,
    state: ShelfState,
}

impl Shelf {
    /// 指定したモードでシェルフを開きます。
    pub fn open<P: AsRef<Path>>(path: P, mode: ShelfMode) -> Result<Self> {
        match mode {
            ShelfMode::ReadOnly => Self::open_readonly(path),
            ShelfMode::Write => Self::open_write(path),
        }
    }

    /// 読み取り専用でシェルフを開きます。
    ///
    /// # エラー
    ///
    /// 以下の場合にエラーを返します。
    /// - ファイルが存在しない、またはシェルフではない場合
    /// - アーカイブの検証に失敗した場合
    /// - 他のハンドルが書き込みモードで開いている場合（[`ThesaurusError::InvalidState`]）
    pub fn open_readonly<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(ThesaurusError::PathIsDirectory(path.to_path_buf()));
        }
        let lock = acquire_lock(path, ShelfMode::ReadOnly)?;
        let buffer = read_buffer(path)?;
        log::debug!(
            "opened shelf {} read-only ({} records)",
            path.display(),
            buffer.records().len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            mode: ShelfMode::ReadOnly,
            _lock: Some(lock),
            state: ShelfState::Read(buffer),
        })
    }

    /// 書き込みモードでシェルフを開きます。
    ///
    /// ファイルが既に存在する場合、そのレコードを読み込んでから開きます。
    ///
    /// # エラー
    ///
    /// 他のハンドルがこのシェルフを開いている場合、[`ThesaurusError::InvalidState`]を返します。
    pub fn open_write<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(ThesaurusError::PathIsDirectory(path.to_path_buf()));
        }
        let lock = acquire_lock(path, ShelfMode::Write)?;
        let mut records = BTreeMap::new();
        if path.exists() {
            let buffer = read_buffer(path)?;
            let existing = rkyv::deserialize::<Vec<ShelfRecord>, Error>(buffer.records())?;
            records.extend(existing.into_iter().map(|r| (r.key, r.neighbours)));
        }
        Ok(Self {
            path: path.to_path_buf(),
            mode: ShelfMode::Write,
            _lock: Some(lock),
            state: ShelfState::Write {
                records,
                dirty: false,
            },
        })
    }

    /// シェルフのパス
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 開いたモード
    pub fn mode(&self) -> ShelfMode {
        self.mode
    }

    /// エントリを挿入します。既存のエントリは置き換えられます。
    ///
    /// # エラー
    ///
    /// 読み取り専用の場合は[`ThesaurusError::ReadOnlyViolation`]を返します。
    pub fn insert<K>(&mut self, key: K, neighbours: Vec<Neighbour>) -> Result<()>
    where
        K: Into<String>,
    {
        let (records, dirty) = self.writable("insert")?;
        records.insert(key.into(), neighbours);
        *dirty = true;
        Ok(())
    }

    /// エントリを削除し、その近傍リストを返します。
    ///
    /// # エラー
    ///
    /// 読み取り専用の場合は[`ThesaurusError::ReadOnlyViolation`]を返します。
    pub fn remove(&mut self, key: &str) -> Result<Option<Vec<Neighbour>>> {
        let (records, dirty) = self.writable("remove")?;
        let removed = records.remove(key);
        *dirty |= removed.is_some();
        Ok(removed)
    }

    /// すべてのエントリを削除します。
    pub fn clear(&mut self) -> Result<()> {
        let (records, dirty) = self.writable("clear")?;
        *dirty |= !records.is_empty();
        records.clear();
        Ok(())
    }

    fn writable(
        &mut self,
        operation: &'static str,
    ) -> Result<(&mut BTreeMap<String, Vec<Neighbour>>, &mut bool)> {
        match &mut self.state {
            ShelfState::Write { records, dirty } => Ok((records, dirty)),
            ShelfState::Read(_) => Err(ThesaurusError::read_only_violation(
                self.path.clone(),
                operation,
            )),
            ShelfState::Closed => Err(ThesaurusError::invalid_state(
                format!("cannot {operation}"),
                "the shelf is closed",
            )),
        }
    }

    /// 変更をファイルに書き出します。読み取り専用の場合は何もしません。
    pub fn flush(&mut self) -> Result<()> {
        let ShelfState::Write { records, dirty } = &mut self.state else {
            return Ok(());
        };
        if !*dirty && self.path.exists() {
            return Ok(());
        }
        write_records(&self.path, records)?;
        *dirty = false;
        log::debug!(
            "flushed {} records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    /// 変更を書き出し、ロックを解放して閉じます。
    pub fn close(mut self) -> Result<()> {
        self.close_inner()
    }

    fn close_inner(&mut self) -> Result<()> {
        let result = self.flush();
        self.state = ShelfState::Closed;
        self._lock = None;
        result
    }
}

impl Drop for Shelf {
    fn drop(&mut self) {
        if let ShelfState::Write { dirty: true, .. } = self.state
            && let Err(e) = self.close_inner()
        {
            log::error!("failed to flush shelf {}: {}", self.path.display(), e);
        }
    }
}

impl EntryLookup for Shelf {
    fn get(&self, key: &str) -> Option<Cow<'_, [Neighbour]>> {
        match &self.state {
            ShelfState::Read(buffer) => {
                let records = buffer.records();
                let i = records
                    .binary_search_by(|r| r.key.as_str().cmp(key))
                    .ok()?;
                Some(Cow::Owned(
                    records[i]
                        .neighbours
                        .iter()
                        .map(|n| n.to_native())
                        .collect(),
                ))
            }
            ShelfState::Write { records, .. } => {
                records.get(key).map(|v| Cow::Borrowed(v.as_slice()))
            }
            ShelfState::Closed => None,
        }
    }

    fn contains(&self, key: &str) -> bool {
        match &self.state {
            ShelfState::Read(buffer) => buffer
                .records()
                .binary_search_by(|r| r.key.as_str().cmp(key))
                .is_ok(),
            ShelfState::Write { records, .. } => records.contains_key(key),
            ShelfState::Closed => false,
        }
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match &self.state {
            ShelfState::Read(buffer) => Box::new(buffer.records().iter().map(|r| r.key.as_str())),
            ShelfState::Write { records, .. } => Box::new(records.keys().map(String::as_str)),
            ShelfState::Closed => Box::new(std::iter::empty()),
        }
    }

    fn len(&self) -> usize {
        match &self.state {
            ShelfState::Read(buffer) => buffer.records().len(),
            ShelfState::Write { records, .. } => records.len(),
            ShelfState::Closed => 0,
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn acquire_lock(path: &Path, mode: ShelfMode) -> Result<File> {
    let lock_path = lock_path(path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    let result = match mode {
        ShelfMode::ReadOnly => file.try_lock_shared(),
        ShelfMode::Write => file.try_lock(),
    };
    match result {
        Ok(()) => Ok(file),
        Err(TryLockError::WouldBlock) => Err(ThesaurusError::invalid_state(
            format!("cannot open {} as {:?}", path.display(), mode),
            "the shelf is locked by another handle",
        )),
        Err(TryLockError::Error(e)) => Err(e.into()),
    }
}

fn read_buffer(path: &Path) -> Result<ShelfBuffer> {
    let file = File::open(path)?;
    // SAFETY: ファイルはロックで保護され、書き込みは別ファイルへのpersistで行われる
    let mmap = unsafe { Mmap::map(&file)? };

    if !mmap.starts_with(SHELF_MAGIC) {
        return Err(ThesaurusError::invalid_format(
            "path",
            "The magic number of the shelf file mismatches.",
        ));
    }
    let Some(data_bytes) = mmap.get(DATA_START..) else {
        return Err(ThesaurusError::invalid_format(
            "path",
            "Shelf file too small or corrupted.",
        ));
    };

    if access::<ArchivedRecords, Error>(data_bytes).is_ok() {
        return Ok(ShelfBuffer::Mmap(mmap));
    }

    let mut aligned_bytes = AlignedVec::<16>::with_capacity(data_bytes.len());
    aligned_bytes.extend_from_slice(data_bytes);
    access::<ArchivedRecords, Error>(&aligned_bytes).map_err(|e| {
        ThesaurusError::invalid_state(
            "rkyv validation failed. The shelf file may be corrupted or incompatible.",
            e.to_string(),
        )
    })?;
    Ok(ShelfBuffer::Aligned(aligned_bytes))
}

fn write_records(path: &Path, records: &BTreeMap<String, Vec<Neighbour>>) -> Result<()> {
    let records: Vec<ShelfRecord> = records
        .iter()
        .map(|(key, neighbours)| ShelfRecord {
            key: key.clone(),
            neighbours: neighbours.clone(),
        })
        .collect();

    write_atomic(path, |mut wtr| {
        wtr.write_all(SHELF_MAGIC)?;
        wtr.write_all(&[0xFF; PADDING_LEN])?;
        with_arena(|arena: &mut Arena| {
            let writer = IoWriter::new(&mut wtr);
            let mut serializer = Serializer::new(writer, arena.acquire(), Share::new());
            serialize_using::<_, Error>(&records, &mut serializer)
        })
        .map_err(|e| ThesaurusError::invalid_state("rkyv serialization failed", e.to_string()))?;
        Ok(())
    })
}
