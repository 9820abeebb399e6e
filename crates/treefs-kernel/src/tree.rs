//! The filesystem tree and its mutation operations.
//!
//! Every operation checks all of its preconditions before touching the
//! store, so a failed call leaves the tree exactly as it was.

use std::fmt;
use std::sync::Arc;

use crate::error::{TreeError, TreeResult};
use crate::path;
use crate::store::{DirectoryEntry, EntryStore, FileEntry, Limits, Stat};
use crate::types::{
    Clock, DEFAULT_FILE_MODE, DirEntry, EntryAttr, EntryId, EntryKind, MAX_CONTENT_LEN, Owner,
    SystemClock, Timestamp,
};

/// All directories and files of one mounted filesystem.
pub struct FsTree {
    store: EntryStore,
    owner: Owner,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for FsTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsTree")
            .field("directories", &self.store.directory_count())
            .field("files", &self.store.file_count())
            .field("owner", &self.owner)
            .finish()
    }
}

impl Default for FsTree {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl FsTree {
    /// Tree holding only the root directory, owned by the current process.
    pub fn new(limits: Limits) -> Self {
        Self::with_clock(limits, Owner::current(), Arc::new(SystemClock))
    }

    pub fn with_clock(limits: Limits, owner: Owner, clock: Arc<dyn Clock>) -> Self {
        let store = EntryStore::with_root(limits, owner, clock.now());
        Self {
            store,
            owner,
            clock,
        }
    }

    /// Wrap an already populated store.
    pub(crate) fn from_store(store: EntryStore, owner: Owner, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            owner,
            clock,
        }
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn limits(&self) -> Limits {
        self.store.limits()
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn directory_count(&self) -> usize {
        self.store.directory_count()
    }

    pub fn file_count(&self) -> usize {
        self.store.file_count()
    }

    pub fn find_directory(&self, path: &str) -> Option<&DirectoryEntry> {
        self.store.find_directory(path)
    }

    pub fn find_file(&self, path: &str) -> Option<&FileEntry> {
        self.store.find_file(path)
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Id of the directory that would contain `path`.
    fn resolve_parent(&self, path: &str) -> TreeResult<EntryId> {
        let parent = path::parent_path(path);
        self.store
            .find_directory(parent)
            .map(|d| d.id)
            .ok_or_else(|| TreeError::not_found(format!("parent directory {parent} of {path}")))
    }

    // ========================================================================
    // Directories
    // ========================================================================

    /// Create a directory under an existing parent.
    pub fn make_directory(&mut self, path: &str, mode: u32) -> TreeResult<EntryAttr> {
        path::validate(path)?;
        if self.store.find_directory(path).is_some() || self.store.find_file(path).is_some() {
            return Err(TreeError::already_exists(path));
        }
        let limits = self.store.limits();
        if self.store.directory_count() >= limits.max_directories {
            return Err(TreeError::resource_exhausted(format!(
                "directory limit of {} reached",
                limits.max_directories
            )));
        }
        let parent = self.resolve_parent(path)?;

        let entry = DirectoryEntry {
            id: self.store.allocate_id()?,
            path: path.to_string(),
            parent: Some(parent),
            stat: Stat::new(mode, self.owner, self.now()),
            size: 0,
        };
        let attr = entry.attr();
        self.store.insert_directory(entry)?;
        Ok(attr)
    }

    /// Remove an empty directory.
    pub fn remove_directory(&mut self, path: &str) -> TreeResult<()> {
        if path::is_root(path) {
            return Err(TreeError::invalid_argument("cannot remove the root directory"));
        }
        let id = self
            .store
            .find_directory(path)
            .map(|d| d.id)
            .ok_or_else(|| TreeError::not_found(path))?;
        if self.store.child_count(id) > 0 {
            return Err(TreeError::directory_not_empty(path));
        }
        self.store.remove_directory(path)?;
        Ok(())
    }

    /// Children of a directory, files first, then subdirectories.
    ///
    /// Refreshes the directory's access time. The returned iterator never
    /// yields `.` or `..`.
    pub fn list_children(&mut self, path: &str) -> TreeResult<Children<'_>> {
        let now = self.now();
        let dir = self
            .store
            .find_directory_mut(path)
            .ok_or_else(|| TreeError::not_found(path))?;
        dir.stat.atime = now;
        let id = dir.id;
        Ok(Children::new(&self.store, id))
    }

    // ========================================================================
    // Files
    // ========================================================================

    /// Create an empty file, or bump the modification time of an existing one.
    pub fn create_or_touch_file(&mut self, path: &str, mode: u32) -> TreeResult<EntryAttr> {
        path::validate(path)?;
        let now = self.now();
        if let Some(file) = self.store.find_file_mut(path) {
            file.stat.mtime = now;
            return Ok(file.attr());
        }
        if self.store.find_directory(path).is_some() {
            return Err(TreeError::already_exists(path));
        }
        let limits = self.store.limits();
        if self.store.file_count() >= limits.max_files {
            return Err(TreeError::resource_exhausted(format!(
                "file limit of {} reached",
                limits.max_files
            )));
        }
        let parent = self.resolve_parent(path)?;

        let entry = FileEntry {
            id: self.store.allocate_id()?,
            path: path.to_string(),
            parent,
            stat: Stat::new(mode, self.owner, now),
            size: 0,
            content: [0; MAX_CONTENT_LEN],
        };
        let attr = entry.attr();
        self.store.insert_file(entry)?;
        Ok(attr)
    }

    /// Read up to `len` bytes starting at `offset`.
    ///
    /// Reading at exactly the end of the file returns no bytes.
    pub fn read_file(&mut self, path: &str, offset: i64, len: usize) -> TreeResult<Vec<u8>> {
        if offset < 0 {
            return Err(TreeError::invalid_argument(format!("negative offset {offset}")));
        }
        let now = self.now();
        let file = self
            .store
            .find_file_mut(path)
            .ok_or_else(|| TreeError::not_found(path))?;
        let offset = offset as u64;
        if offset > file.size as u64 {
            return Err(TreeError::invalid_argument(format!(
                "offset {offset} beyond end of {path} ({} bytes)",
                file.size
            )));
        }
        let start = offset as usize;
        let end = start + len.min(file.size - start);
        let data = file.content[start..end].to_vec();
        file.stat.atime = now;
        Ok(data)
    }

    /// Write `data` at `offset`, creating the file if it does not exist.
    ///
    /// Writes may overwrite or extend content but may not leave a hole:
    /// `offset` must not exceed the current size. Returns the number of
    /// bytes written.
    pub fn write_file(&mut self, path: &str, offset: i64, data: &[u8]) -> TreeResult<usize> {
        if offset < 0 {
            return Err(TreeError::invalid_argument(format!("negative offset {offset}")));
        }
        let start = offset as u64;
        let end = start.saturating_add(data.len() as u64);
        if end > MAX_CONTENT_LEN as u64 {
            return Err(TreeError::invalid_argument(format!(
                "write of {} bytes at {start} exceeds capacity of {MAX_CONTENT_LEN}",
                data.len()
            )));
        }
        let current = self.store.find_file(path).map_or(0, |f| f.size);
        if start > current as u64 {
            return Err(TreeError::invalid_argument(format!(
                "offset {start} beyond end of {path} ({current} bytes)"
            )));
        }

        if self.store.find_file(path).is_none() {
            self.create_or_touch_file(path, DEFAULT_FILE_MODE)?;
        }

        let now = self.now();
        let file = self
            .store
            .find_file_mut(path)
            .ok_or_else(|| TreeError::not_found(path))?;
        let (start, end) = (start as usize, end as usize);
        file.content[start..end].copy_from_slice(data);
        file.size = file.size.max(end);
        file.stat.atime = now;
        file.stat.mtime = now;
        Ok(data.len())
    }

    /// Set the logical size of a file.
    ///
    /// Growing a file exposes zero bytes.
    pub fn truncate_file(&mut self, path: &str, new_size: i64) -> TreeResult<()> {
        if new_size < 0 || new_size > MAX_CONTENT_LEN as i64 {
            return Err(TreeError::invalid_argument(format!(
                "size {new_size} outside 0..={MAX_CONTENT_LEN}"
            )));
        }
        let now = self.now();
        let file = self
            .store
            .find_file_mut(path)
            .ok_or_else(|| TreeError::not_found(path))?;
        let new_size = new_size as usize;
        if new_size > file.size {
            file.content[file.size..new_size].fill(0);
        }
        file.size = new_size;
        file.stat.mtime = now;
        Ok(())
    }

    pub fn remove_file(&mut self, path: &str) -> TreeResult<()> {
        self.store.remove_file(path)?;
        Ok(())
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Overwrite access and modification times of a directory or file.
    pub fn set_times(&mut self, path: &str, atime: Timestamp, mtime: Timestamp) -> TreeResult<()> {
        if let Some(dir) = self.store.find_directory_mut(path) {
            dir.stat.atime = atime;
            dir.stat.mtime = mtime;
            return Ok(());
        }
        let file = self
            .store
            .find_file_mut(path)
            .ok_or_else(|| TreeError::not_found(path))?;
        file.stat.atime = atime;
        file.stat.mtime = mtime;
        Ok(())
    }

    pub fn get_attributes(&self, path: &str) -> TreeResult<EntryAttr> {
        if let Some(dir) = self.store.find_directory(path) {
            return Ok(dir.attr());
        }
        self.store
            .find_file(path)
            .map(FileEntry::attr)
            .ok_or_else(|| TreeError::not_found(path))
    }
}

/// Lazy listing of one directory's children.
///
/// Borrowing the tree keeps the listing consistent; call
/// [`FsTree::list_children`] again to restart it.
pub struct Children<'a> {
    files: Box<dyn Iterator<Item = &'a FileEntry> + 'a>,
    dirs: Box<dyn Iterator<Item = &'a DirectoryEntry> + 'a>,
}

impl<'a> Children<'a> {
    fn new(store: &'a EntryStore, id: EntryId) -> Self {
        Self {
            files: Box::new(store.files().filter(move |f| f.parent == id)),
            dirs: Box::new(store.directories().filter(move |d| d.parent == Some(id))),
        }
    }
}

impl Iterator for Children<'_> {
    type Item = DirEntry;

    fn next(&mut self) -> Option<DirEntry> {
        if let Some(file) = self.files.next() {
            return Some(DirEntry::new(path::file_name(&file.path), EntryKind::File));
        }
        self.dirs
            .next()
            .map(|d| DirEntry::new(path::file_name(&d.path), EntryKind::Directory))
    }
}
