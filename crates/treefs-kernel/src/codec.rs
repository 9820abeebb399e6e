//! Snapshot codec.
//!
//! A snapshot is the whole tree as fixed-width records in native byte
//! order, with no header, version or checksum:
//!
//! ```text
//! [dir_count: u64][dir_count × DirectoryRecord][file_count: u64][file_count × FileRecord]
//! ```
//!
//! Parent links are not stored. They are re-derived from the paths when a
//! snapshot is decoded.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{TreeError, TreeResult};
use crate::path;
use crate::store::{DirectoryEntry, EntryStore, FileEntry, Limits, Stat};
use crate::tree::FsTree;
use crate::types::{Clock, EntryId, MAX_CONTENT_LEN, MAX_NAME_LEN, Owner, ROOT, Timestamp};

/// Width of the NUL-padded path field.
pub const PATH_FIELD_LEN: usize = 56;

const _: () = assert!(MAX_NAME_LEN < PATH_FIELD_LEN);

const COUNT_LEN: usize = size_of::<u64>();

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct DirectoryRecord {
    pub path: [u8; PATH_FIELD_LEN],
    pub id: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub size: u64,
}

#[derive(IntoBytes, FromBytes, KnownLayout, Immutable, Copy, Clone, Debug)]
#[repr(C, packed)]
pub struct FileRecord {
    pub path: [u8; PATH_FIELD_LEN],
    pub id: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub size: u64,
    pub content: [u8; MAX_CONTENT_LEN],
}

impl DirectoryRecord {
    pub fn from_entry(entry: &DirectoryEntry) -> Self {
        Self {
            path: encode_path(&entry.path),
            id: entry.id.0,
            mode: entry.stat.mode,
            uid: entry.stat.uid,
            gid: entry.stat.gid,
            atime: entry.stat.atime.0,
            mtime: entry.stat.mtime.0,
            ctime: entry.stat.ctime.0,
            size: entry.size,
        }
    }

    fn stat(&self) -> Stat {
        Stat {
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            atime: Timestamp(self.atime),
            mtime: Timestamp(self.mtime),
            ctime: Timestamp(self.ctime),
        }
    }
}

impl FileRecord {
    pub fn from_entry(entry: &FileEntry) -> Self {
        Self {
            path: encode_path(&entry.path),
            id: entry.id.0,
            mode: entry.stat.mode,
            uid: entry.stat.uid,
            gid: entry.stat.gid,
            atime: entry.stat.atime.0,
            mtime: entry.stat.mtime.0,
            ctime: entry.stat.ctime.0,
            size: entry.size as u64,
            content: entry.content,
        }
    }

    fn stat(&self) -> Stat {
        Stat {
            mode: self.mode,
            uid: self.uid,
            gid: self.gid,
            atime: Timestamp(self.atime),
            mtime: Timestamp(self.mtime),
            ctime: Timestamp(self.ctime),
        }
    }
}

fn encode_path(path: &str) -> [u8; PATH_FIELD_LEN] {
    let mut field = [0u8; PATH_FIELD_LEN];
    let bytes = path.as_bytes();
    let len = bytes.len().min(PATH_FIELD_LEN - 1);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

fn decode_path(field: &[u8; PATH_FIELD_LEN]) -> TreeResult<String> {
    let len = field.iter().position(|&b| b == 0).unwrap_or(PATH_FIELD_LEN);
    std::str::from_utf8(&field[..len])
        .map(str::to_owned)
        .map_err(|_| TreeError::corrupt("path is not valid UTF-8"))
}

/// Serialize the whole tree.
pub fn encode(tree: &FsTree) -> Vec<u8> {
    let store = tree.store();
    let mut buf = Vec::with_capacity(
        2 * COUNT_LEN
            + store.directory_count() * size_of::<DirectoryRecord>()
            + store.file_count() * size_of::<FileRecord>(),
    );
    buf.extend_from_slice(&(store.directory_count() as u64).to_ne_bytes());
    for dir in store.directories() {
        buf.extend_from_slice(DirectoryRecord::from_entry(dir).as_bytes());
    }
    buf.extend_from_slice(&(store.file_count() as u64).to_ne_bytes());
    for file in store.files() {
        buf.extend_from_slice(FileRecord::from_entry(file).as_bytes());
    }
    buf
}

/// Cursor over snapshot bytes.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &str) -> TreeResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| TreeError::corrupt(format!("truncated while reading {what}")))?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn count(&mut self, what: &str, max: usize) -> TreeResult<usize> {
        let bytes = self.take(COUNT_LEN, what)?;
        let mut raw = [0u8; COUNT_LEN];
        raw.copy_from_slice(bytes);
        let count = u64::from_ne_bytes(raw);
        if count > max as u64 {
            return Err(TreeError::corrupt(format!(
                "{what} {count} exceeds capacity of {max}"
            )));
        }
        Ok(count as usize)
    }

    fn record<T: FromBytes + KnownLayout + Immutable>(&mut self, what: &str) -> TreeResult<T> {
        let bytes = self.take(size_of::<T>(), what)?;
        T::read_from_bytes(bytes).map_err(|_| TreeError::corrupt(format!("bad {what}")))
    }
}

/// A stored path must be one a live tree could have created.
fn check_path(path: &str) -> TreeResult<()> {
    path::validate(path).map_err(|e| TreeError::corrupt(format!("bad path {path:?}: {e}")))
}

/// Rebuild a tree from snapshot bytes.
///
/// Empty input yields a fresh root-only tree.
pub fn decode(
    bytes: &[u8],
    limits: Limits,
    owner: Owner,
    clock: Arc<dyn Clock>,
) -> TreeResult<FsTree> {
    if bytes.is_empty() {
        return Ok(FsTree::with_clock(limits, owner, clock));
    }

    let mut reader = Reader { buf: bytes, pos: 0 };
    let mut store = EntryStore::empty(limits);

    let dir_count = reader.count("directory count", limits.max_directories)?;
    let mut dirs = Vec::with_capacity(dir_count);
    for _ in 0..dir_count {
        dirs.push(reader.record::<DirectoryRecord>("directory record")?);
    }
    let file_count = reader.count("file count", limits.max_files)?;
    let mut files = Vec::with_capacity(file_count);
    for _ in 0..file_count {
        files.push(reader.record::<FileRecord>("file record")?);
    }
    if reader.pos != bytes.len() {
        return Err(TreeError::corrupt(format!(
            "{} trailing bytes",
            bytes.len() - reader.pos
        )));
    }

    let mut seen_ids = std::collections::HashSet::new();
    let mut check_id = |raw: u64, path: &str| -> TreeResult<EntryId> {
        if raw == 0 || raw == u64::MAX || !seen_ids.insert(raw) {
            return Err(TreeError::corrupt(format!("invalid or duplicate id {raw} at {path}")));
        }
        Ok(EntryId(raw))
    };

    for (idx, rec) in dirs.iter().enumerate() {
        let path = decode_path(&rec.path)?;
        let id = check_id(rec.id, &path)?;
        let parent = if idx == 0 {
            if path != ROOT || id != EntryId::ROOT {
                return Err(TreeError::corrupt("first directory record is not the root"));
            }
            None
        } else {
            check_path(&path)?;
            // Parents precede children in store order, so the lookup only
            // sees directories already restored.
            let parent_path = path::parent_path(&path);
            let parent = store
                .find_directory(parent_path)
                .ok_or_else(|| TreeError::corrupt(format!("orphan directory {path}")))?;
            Some(parent.id)
        };
        let entry = DirectoryEntry {
            id,
            path,
            parent,
            stat: rec.stat(),
            size: rec.size,
        };
        store.insert_directory(entry).map_err(|e| match e {
            TreeError::AlreadyExists(p) => TreeError::corrupt(format!("duplicate directory {p}")),
            other => other,
        })?;
    }
    if store.directory_count() == 0 {
        return Err(TreeError::corrupt("snapshot has no root directory"));
    }

    for rec in &files {
        let path = decode_path(&rec.path)?;
        check_path(&path)?;
        if store.find_directory(&path).is_some() {
            return Err(TreeError::corrupt(format!("file {path} shadows a directory")));
        }
        let id = check_id(rec.id, &path)?;
        let size = rec.size;
        if size > MAX_CONTENT_LEN as u64 {
            return Err(TreeError::corrupt(format!("file {path} has size {size}")));
        }
        let parent = store
            .find_directory(path::parent_path(&path))
            .map(|d| d.id)
            .ok_or_else(|| TreeError::corrupt(format!("orphan file {path}")))?;
        let entry = FileEntry {
            id,
            path,
            parent,
            stat: rec.stat(),
            size: size as usize,
            content: rec.content,
        };
        store.insert_file(entry).map_err(|e| match e {
            TreeError::AlreadyExists(p) => TreeError::corrupt(format!("duplicate file {p}")),
            other => other,
        })?;
    }

    Ok(FsTree::from_store(store, owner, clock))
}

/// Write `payload` beside `target`, then rename it into place so a failed
/// save leaves the previous snapshot intact.
fn write_atomic(target: &Path, payload: &[u8]) -> TreeResult<()> {
    let mut tmp = target.as_os_str().to_owned();
    tmp.push(".partial");
    let tmp = PathBuf::from(tmp);

    let result = fs::write(&tmp, payload).and_then(|()| fs::rename(&tmp, target));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    Ok(result?)
}

/// Write the tree to `target`, replacing any previous snapshot.
pub fn save(target: &Path, tree: &FsTree) -> TreeResult<()> {
    let bytes = encode(tree);
    write_atomic(target, &bytes)?;
    tracing::info!(
        path = %target.display(),
        directories = tree.directory_count(),
        files = tree.file_count(),
        bytes = bytes.len(),
        "saved snapshot"
    );
    Ok(())
}

/// Read a tree from `source`.
///
/// A missing or empty file yields a fresh root-only tree.
pub fn load(
    source: &Path,
    limits: Limits,
    owner: Owner,
    clock: Arc<dyn Clock>,
) -> TreeResult<FsTree> {
    let bytes = match fs::read(source) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %source.display(), "no snapshot, starting empty tree");
            return Ok(FsTree::with_clock(limits, owner, clock));
        }
        Err(e) => return Err(e.into()),
    };
    let tree = decode(&bytes, limits, owner, clock)?;
    tracing::info!(
        path = %source.display(),
        directories = tree.directory_count(),
        files = tree.file_count(),
        "loaded snapshot"
    );
    Ok(tree)
}
