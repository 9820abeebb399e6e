//! Thread-safe tree handle and the operation surface adapters use.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{TreeError, TreeResult};
use crate::tree::FsTree;
use crate::types::{DirEntry, EntryAttr, MAX_CONTENT_LEN, Timestamp};

/// Path-based filesystem operations.
///
/// A kernel bridge maps each callback it receives onto exactly one of
/// these calls and maps the error with [`TreeError::errno`].
///
/// [`TreeError::errno`]: crate::TreeError::errno
pub trait FsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get attributes of a directory or file.
    fn getattr(&self, path: &str) -> TreeResult<EntryAttr>;

    /// Names of a directory's children, without `.` and `..`.
    fn readdir(&self, path: &str) -> TreeResult<Vec<DirEntry>>;

    /// Read up to `len` bytes starting at `offset`.
    fn read(&self, path: &str, offset: i64, len: usize) -> TreeResult<Vec<u8>>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` at `offset`, creating the file if needed.
    fn write(&self, path: &str, offset: i64, data: &[u8]) -> TreeResult<usize>;

    /// Create an empty file or touch an existing one.
    fn create(&self, path: &str, mode: u32) -> TreeResult<EntryAttr>;

    /// Create a directory.
    fn mkdir(&self, path: &str, mode: u32) -> TreeResult<EntryAttr>;

    /// Remove a file.
    fn unlink(&self, path: &str) -> TreeResult<()>;

    /// Remove an empty directory.
    fn rmdir(&self, path: &str) -> TreeResult<()>;

    /// Set the size of a file.
    fn truncate(&self, path: &str, size: i64) -> TreeResult<()>;

    /// Overwrite access and modification times.
    fn utimens(&self, path: &str, atime: Timestamp, mtime: Timestamp) -> TreeResult<()>;

    /// Replace the file contents with `data`, creating the file if needed.
    ///
    /// Either the whole replacement happens or the file is left as it was.
    fn write_all(&self, path: &str, data: &[u8]) -> TreeResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    fn exists(&self, path: &str) -> bool {
        self.getattr(path).is_ok()
    }

    /// Read entire file contents.
    fn read_all(&self, path: &str) -> TreeResult<Vec<u8>> {
        let attr = self.getattr(path)?;
        self.read(path, 0, attr.size as usize)
    }
}

/// Cloneable handle serializing all access to one [`FsTree`].
///
/// Each operation takes the lock once and holds it for the whole call.
#[derive(Debug, Clone)]
pub struct SharedTree {
    inner: Arc<Mutex<FsTree>>,
}

impl SharedTree {
    pub fn new(tree: FsTree) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tree)),
        }
    }

    /// Run `f` with exclusive access to the tree.
    pub fn with<R>(&self, f: impl FnOnce(&mut FsTree) -> R) -> R {
        let mut tree = self.inner.lock();
        f(&mut tree)
    }

    /// Take the tree back out, if this is the last handle.
    pub fn try_into_inner(self) -> Result<FsTree, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }

    fn run<R>(
        &self,
        op: &'static str,
        path: &str,
        f: impl FnOnce(&mut FsTree) -> TreeResult<R>,
    ) -> TreeResult<R> {
        tracing::debug!(op, path, "tree op");
        let result = self.with(f);
        if let Err(e) = &result {
            tracing::debug!(op, path, error = %e, "tree op refused");
        }
        result
    }
}

impl FsOps for SharedTree {
    fn getattr(&self, path: &str) -> TreeResult<EntryAttr> {
        self.run("getattr", path, |t| t.get_attributes(path))
    }

    fn readdir(&self, path: &str) -> TreeResult<Vec<DirEntry>> {
        self.run("readdir", path, |t| Ok(t.list_children(path)?.collect()))
    }

    fn read(&self, path: &str, offset: i64, len: usize) -> TreeResult<Vec<u8>> {
        self.run("read", path, |t| t.read_file(path, offset, len))
    }

    fn write(&self, path: &str, offset: i64, data: &[u8]) -> TreeResult<usize> {
        self.run("write", path, |t| t.write_file(path, offset, data))
    }

    fn create(&self, path: &str, mode: u32) -> TreeResult<EntryAttr> {
        self.run("create", path, |t| t.create_or_touch_file(path, mode))
    }

    fn mkdir(&self, path: &str, mode: u32) -> TreeResult<EntryAttr> {
        self.run("mkdir", path, |t| t.make_directory(path, mode))
    }

    fn unlink(&self, path: &str) -> TreeResult<()> {
        self.run("unlink", path, |t| t.remove_file(path))
    }

    fn rmdir(&self, path: &str) -> TreeResult<()> {
        self.run("rmdir", path, |t| t.remove_directory(path))
    }

    fn truncate(&self, path: &str, size: i64) -> TreeResult<()> {
        self.run("truncate", path, |t| t.truncate_file(path, size))
    }

    fn utimens(&self, path: &str, atime: Timestamp, mtime: Timestamp) -> TreeResult<()> {
        self.run("utimens", path, |t| t.set_times(path, atime, mtime))
    }

    fn write_all(&self, path: &str, data: &[u8]) -> TreeResult<()> {
        self.run("write_all", path, |t| {
            if data.len() > MAX_CONTENT_LEN {
                return Err(TreeError::invalid_argument(format!(
                    "write of {} bytes exceeds capacity of {MAX_CONTENT_LEN}",
                    data.len()
                )));
            }
            // An existing file accepts any write of this length at offset 0.
            if t.find_file(path).is_some() {
                t.truncate_file(path, 0)?;
            }
            t.write_file(path, 0, data)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Limits;

    fn shared() -> SharedTree {
        SharedTree::new(FsTree::new(Limits::default()))
    }

    #[test]
    fn test_ops_roundtrip() {
        let fs = shared();
        fs.mkdir("/dir", 0o755).unwrap();
        fs.create("/dir/a.txt", 0o644).unwrap();
        fs.write("/dir/a.txt", 0, b"hello").unwrap();

        assert_eq!(fs.read_all("/dir/a.txt").unwrap(), b"hello");
        assert_eq!(fs.readdir("/dir").unwrap(), vec![DirEntry::file("a.txt")]);
        assert!(fs.exists("/dir"));
        assert!(!fs.exists("/nope"));
    }

    #[test]
    fn test_write_all_replaces() {
        let fs = shared();
        fs.write_all("/f", b"long content").unwrap();
        fs.write_all("/f", b"short").unwrap();
        assert_eq!(fs.read_all("/f").unwrap(), b"short");
    }

    #[test]
    fn test_refused_write_all_keeps_content() {
        let fs = shared();
        fs.write("/f", 0, b"keep me").unwrap();

        let err = fs.write_all("/f", &[b'z'; MAX_CONTENT_LEN + 1]).unwrap_err();
        assert!(matches!(err, TreeError::InvalidArgument(_)));
        assert_eq!(fs.read_all("/f").unwrap(), b"keep me");

        assert!(matches!(fs.write_all("/none/f", b"x"), Err(TreeError::NotFound(_))));
        assert!(!fs.exists("/none/f"));
    }

    #[test]
    fn test_errors_pass_through() {
        let fs = shared();
        assert!(matches!(fs.rmdir("/x"), Err(TreeError::NotFound(_))));
        assert!(matches!(fs.getattr("/x"), Err(TreeError::NotFound(_))));
    }

    #[test]
    fn test_try_into_inner() {
        let fs = shared();
        let other = fs.clone();
        let fs = fs.try_into_inner().unwrap_err();
        drop(other);
        let tree = fs.try_into_inner().unwrap();
        assert_eq!(tree.directory_count(), 1);
    }
}
