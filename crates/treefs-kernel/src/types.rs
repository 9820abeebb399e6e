//! Core tree types.
//!
//! Entries are addressed by absolute path. The numeric [`EntryId`] is only
//! what the tree reports as an inode number; it is never used for lookup
//! by callers.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Path of the root directory.
pub const ROOT: &str = "/";

/// Maximum length of a path, in bytes.
pub const MAX_NAME_LEN: usize = 50;

/// Maximum length of a file's content, in bytes.
pub const MAX_CONTENT_LEN: usize = 100;

/// File-type bits for a directory.
pub const S_IFDIR: u32 = 0o040000;

/// File-type bits for a regular file.
pub const S_IFREG: u32 = 0o100000;

/// Mask selecting the file-type bits of a mode.
pub const S_IFMT: u32 = 0o170000;

/// Mode of the root directory of a fresh tree.
pub const ROOT_MODE: u32 = S_IFDIR | 0o755;

/// Mode of a file created implicitly by a write.
pub const DEFAULT_FILE_MODE: u32 = S_IFREG | 0o644;

/// Stable numeric handle of an entry.
///
/// Allocated from a counter when the entry is created and never reused,
/// so it survives removals of other entries and snapshot reloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl EntryId {
    /// Handle of the root directory.
    pub const ROOT: EntryId = EntryId(1);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whole seconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn secs(self) -> i64 {
        self.0
    }

    pub fn to_system_time(self) -> SystemTime {
        if self.0 >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.0 as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.0.unsigned_abs())
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Timestamp(d.as_secs() as i64),
            Err(e) => Timestamp(-(e.duration().as_secs() as i64)),
        }
    }
}

/// Source of "now" for entry timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now().into()
    }
}

/// Clock that only moves when told to. Used by tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            secs: AtomicI64::new(start),
        }
    }

    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs.load(Ordering::SeqCst))
    }
}

/// Owner ids stamped on new entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// Real uid/gid of the running process.
    #[cfg(unix)]
    pub fn current() -> Self {
        Self {
            uid: rustix::process::getuid().as_raw(),
            gid: rustix::process::getgid().as_raw(),
        }
    }

    #[cfg(not(unix))]
    pub fn current() -> Self {
        Self { uid: 0, gid: 0 }
    }
}

impl Default for Owner {
    fn default() -> Self {
        Self::current()
    }
}

/// Entry kind.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_file(&self) -> bool {
        matches!(self, EntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, EntryKind::Directory)
    }

    /// File-type bits for this kind.
    pub fn type_bits(&self) -> u32 {
        match self {
            EntryKind::File => S_IFREG,
            EntryKind::Directory => S_IFDIR,
        }
    }
}

/// Attribute snapshot of a single entry, as a kernel bridge reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAttr {
    /// Stable inode-like number.
    pub id: EntryId,
    pub kind: EntryKind,
    /// Permission bits with the file-type bits of `kind` set.
    pub mode: u32,
    /// 2 for directories (`.` and the parent's link), 1 for files.
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    /// Content length in bytes; always 0 for directories.
    pub size: u64,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
}

impl EntryAttr {
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Permission bits without the file-type bits.
    pub fn perm(&self) -> u32 {
        self.mode & !S_IFMT
    }
}

/// One child yielded by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Final path segment, not the full path.
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::File)
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, EntryKind::Directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_entry_kind() {
        assert!(EntryKind::File.is_file());
        assert!(!EntryKind::File.is_dir());
        assert!(EntryKind::Directory.is_dir());
        assert_eq!(EntryKind::Directory.to_string(), "directory");
        assert_eq!(EntryKind::from_str("file").unwrap(), EntryKind::File);
    }

    #[test]
    fn test_timestamp_system_time() {
        let t = Timestamp(1_700_000_000);
        assert_eq!(Timestamp::from(t.to_system_time()), t);

        let before_epoch = Timestamp(-5);
        assert_eq!(Timestamp::from(before_epoch.to_system_time()), before_epoch);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now(), Timestamp(100));
        clock.advance(5);
        assert_eq!(clock.now(), Timestamp(105));
        clock.set(7);
        assert_eq!(clock.now(), Timestamp(7));
    }

    #[test]
    fn test_attr_perm_strips_type_bits() {
        let attr = EntryAttr {
            id: EntryId::ROOT,
            kind: EntryKind::Directory,
            mode: S_IFDIR | 0o755,
            nlink: 2,
            uid: 0,
            gid: 0,
            size: 0,
            atime: Timestamp(0),
            mtime: Timestamp(0),
            ctime: Timestamp(0),
        };
        assert_eq!(attr.perm(), 0o755);
        assert!(attr.is_dir());

        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(json["kind"], "directory");
        assert_eq!(json["id"], 1);
        assert_eq!(json["atime"], 0);
    }

    #[test]
    fn test_dir_entry() {
        let file = DirEntry::file("f.txt");
        assert_eq!(file.name, "f.txt");
        assert!(file.kind.is_file());
        assert!(DirEntry::directory("sub").kind.is_dir());
    }
}
