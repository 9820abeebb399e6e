//! Bounded entry store.
//!
//! Directories and files live in two path-keyed [`IndexMap`]s. Insertion
//! order is kept, and removal shifts later entries down, so iteration is
//! deterministic for a given history of operations.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::path;
use crate::types::{
    EntryAttr, EntryId, EntryKind, MAX_CONTENT_LEN, Owner, ROOT, ROOT_MODE, S_IFMT, Timestamp,
};

/// Capacity bounds of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of directories, root included.
    pub max_directories: usize,
    /// Maximum number of files.
    pub max_files: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_directories: 20,
            max_files: 20,
        }
    }
}

/// Metadata shared by directories and files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
}

impl Stat {
    /// Fresh metadata with all three timestamps set to `now`.
    pub fn new(mode: u32, owner: Owner, now: Timestamp) -> Self {
        Self {
            mode,
            uid: owner.uid,
            gid: owner.gid,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }
}

/// A directory. Carries no content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub id: EntryId,
    pub path: String,
    /// `None` only for the root.
    pub parent: Option<EntryId>,
    pub stat: Stat,
    /// Always 0 in practice.
    pub size: u64,
}

impl DirectoryEntry {
    pub fn attr(&self) -> EntryAttr {
        EntryAttr {
            id: self.id,
            kind: EntryKind::Directory,
            mode: (self.stat.mode & !S_IFMT) | EntryKind::Directory.type_bits(),
            nlink: 2,
            uid: self.stat.uid,
            gid: self.stat.gid,
            size: self.size,
            atime: self.stat.atime,
            mtime: self.stat.mtime,
            ctime: self.stat.ctime,
        }
    }
}

/// A regular file with a fixed-capacity content buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub id: EntryId,
    pub path: String,
    /// Containing directory.
    pub parent: EntryId,
    pub stat: Stat,
    /// Logical content length; never above [`MAX_CONTENT_LEN`].
    pub size: usize,
    pub content: [u8; MAX_CONTENT_LEN],
}

impl FileEntry {
    /// Meaningful bytes of the file.
    pub fn data(&self) -> &[u8] {
        &self.content[..self.size]
    }

    pub fn attr(&self) -> EntryAttr {
        EntryAttr {
            id: self.id,
            kind: EntryKind::File,
            mode: (self.stat.mode & !S_IFMT) | EntryKind::File.type_bits(),
            nlink: 1,
            uid: self.stat.uid,
            gid: self.stat.gid,
            size: self.size as u64,
            atime: self.stat.atime,
            mtime: self.stat.mtime,
            ctime: self.stat.ctime,
        }
    }
}

/// Bounded collections of directories and files.
#[derive(Debug, Clone)]
pub struct EntryStore {
    directories: IndexMap<String, DirectoryEntry>,
    files: IndexMap<String, FileEntry>,
    limits: Limits,
    next_id: u64,
}

impl EntryStore {
    /// Store holding only the root directory.
    pub fn with_root(limits: Limits, owner: Owner, now: Timestamp) -> Self {
        let mut store = Self::empty(limits);
        let root = DirectoryEntry {
            id: EntryId::ROOT,
            path: ROOT.to_string(),
            parent: None,
            stat: Stat::new(ROOT_MODE, owner, now),
            size: 0,
        };
        store.directories.insert(root.path.clone(), root);
        store.next_id = EntryId::ROOT.0 + 1;
        store
    }

    /// Store with no entries at all, not even the root.
    pub(crate) fn empty(limits: Limits) -> Self {
        Self {
            directories: IndexMap::new(),
            files: IndexMap::new(),
            limits,
            next_id: EntryId::ROOT.0,
        }
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn directories(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.directories.values()
    }

    pub fn files(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.values()
    }

    /// Reserve the next stable id.
    pub fn allocate_id(&mut self) -> TreeResult<EntryId> {
        let next = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| TreeError::resource_exhausted("entry ids exhausted"))?;
        let id = EntryId(self.next_id);
        self.next_id = next;
        Ok(id)
    }

    /// Ensure future ids are strictly above `id`.
    pub(crate) fn bump_next_id(&mut self, id: EntryId) {
        self.next_id = self.next_id.max(id.0.saturating_add(1));
    }

    /// Look up a directory. `"/"` and `""` both name the root.
    pub fn find_directory(&self, path: &str) -> Option<&DirectoryEntry> {
        let key = if path::is_root(path) { ROOT } else { path };
        self.directories.get(key)
    }

    pub fn find_directory_mut(&mut self, path: &str) -> Option<&mut DirectoryEntry> {
        let key = if path::is_root(path) { ROOT } else { path };
        self.directories.get_mut(key)
    }

    pub fn find_file(&self, path: &str) -> Option<&FileEntry> {
        self.files.get(path)
    }

    pub fn find_file_mut(&mut self, path: &str) -> Option<&mut FileEntry> {
        self.files.get_mut(path)
    }

    /// Position of a directory in store order.
    pub fn directory_index(&self, path: &str) -> Option<usize> {
        let key = if path::is_root(path) { ROOT } else { path };
        self.directories.get_index_of(key)
    }

    pub fn file_index(&self, path: &str) -> Option<usize> {
        self.files.get_index_of(path)
    }

    pub fn insert_directory(&mut self, entry: DirectoryEntry) -> TreeResult<()> {
        if self.directories.len() >= self.limits.max_directories {
            return Err(TreeError::resource_exhausted(format!(
                "directory limit of {} reached",
                self.limits.max_directories
            )));
        }
        if self.directories.contains_key(&entry.path) {
            return Err(TreeError::already_exists(entry.path));
        }
        self.bump_next_id(entry.id);
        self.directories.insert(entry.path.clone(), entry);
        Ok(())
    }

    pub fn insert_file(&mut self, entry: FileEntry) -> TreeResult<()> {
        if self.files.len() >= self.limits.max_files {
            return Err(TreeError::resource_exhausted(format!(
                "file limit of {} reached",
                self.limits.max_files
            )));
        }
        if self.files.contains_key(&entry.path) {
            return Err(TreeError::already_exists(entry.path));
        }
        self.bump_next_id(entry.id);
        self.files.insert(entry.path.clone(), entry);
        Ok(())
    }

    pub fn remove_directory(&mut self, path: &str) -> TreeResult<DirectoryEntry> {
        self.directories
            .shift_remove(path)
            .ok_or_else(|| TreeError::not_found(path))
    }

    pub fn remove_file(&mut self, path: &str) -> TreeResult<FileEntry> {
        self.files
            .shift_remove(path)
            .ok_or_else(|| TreeError::not_found(path))
    }

    /// Number of files and subdirectories whose parent is `id`.
    pub fn child_count(&self, id: EntryId) -> usize {
        let files = self.files.values().filter(|f| f.parent == id).count();
        let dirs = self
            .directories
            .values()
            .filter(|d| d.parent == Some(id))
            .count();
        files + dirs
    }
}
