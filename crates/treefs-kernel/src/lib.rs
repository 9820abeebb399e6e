//! # treefs-kernel
//!
//! In-memory filesystem tree with fixed-size snapshot persistence.
//!
//! The tree is small and bounded: a capped number of directories and
//! files, paths of at most [`MAX_NAME_LEN`] bytes and file contents of at
//! most [`MAX_CONTENT_LEN`] bytes. A kernel bridge drives it through
//! [`FsOps`] on a [`SharedTree`], and a [`MountSession`] loads and saves
//! the snapshot around a mount.

pub mod codec;
pub mod config;
pub mod error;
pub mod path;
pub mod session;
pub mod shared;
pub mod store;
pub mod tree;
pub mod types;

pub use config::TreeConfig;
pub use error::{TreeError, TreeResult};
pub use session::MountSession;
pub use shared::{FsOps, SharedTree};
pub use store::Limits;
pub use tree::{Children, FsTree};
pub use types::{
    Clock, DEFAULT_FILE_MODE, DirEntry, EntryAttr, EntryId, EntryKind, MAX_CONTENT_LEN,
    MAX_NAME_LEN, ManualClock, Owner, ROOT, ROOT_MODE, S_IFDIR, S_IFMT, S_IFREG, SystemClock,
    Timestamp,
};
