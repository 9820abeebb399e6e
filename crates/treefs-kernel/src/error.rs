//! Tree error types.

use std::io;
use thiserror::Error;

/// Error returned by every tree operation.
///
/// Operations validate completely before mutating, so an `Err` always
/// means the tree is unchanged.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Malformed path, or an offset/size/length out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Path longer than the maximum name length.
    #[error("name too long: {0}")]
    NameTooLong(String),

    /// Entry, or the parent directory it needs, does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Directory or file capacity reached.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Directory still has files or subdirectories.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// An entry already exists at this path.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Snapshot bytes could not be turned back into a tree.
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TreeError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a NameTooLong error.
    pub fn name_too_long(path: impl Into<String>) -> Self {
        Self::NameTooLong(path.into())
    }

    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a ResourceExhausted error.
    pub fn resource_exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Create a DirectoryNotEmpty error.
    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a CorruptSnapshot error.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptSnapshot(msg.into())
    }

    /// POSIX error number a kernel bridge should report for this error.
    pub fn errno(&self) -> i32 {
        match self {
            TreeError::InvalidArgument(_) => errno::EINVAL,
            TreeError::NameTooLong(_) => errno::ENAMETOOLONG,
            TreeError::NotFound(_) => errno::ENOENT,
            TreeError::ResourceExhausted(_) => errno::ENOSPC,
            TreeError::DirectoryNotEmpty(_) => errno::ENOTEMPTY,
            TreeError::AlreadyExists(_) => errno::EEXIST,
            TreeError::Io(e) => e.raw_os_error().unwrap_or(errno::EIO),
            TreeError::CorruptSnapshot(_) | TreeError::Config(_) => errno::EIO,
        }
    }
}

/// Linux error numbers used by [`TreeError::errno`].
pub mod errno {
    pub const ENOENT: i32 = 2;
    pub const EIO: i32 = 5;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const ENOSPC: i32 = 28;
    pub const ENAMETOOLONG: i32 = 36;
    pub const ENOTEMPTY: i32 = 39;
}

/// Convert TreeError to std::io::Error for compatibility.
impl From<TreeError> for io::Error {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::InvalidArgument(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            TreeError::NameTooLong(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            TreeError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            TreeError::ResourceExhausted(msg) => io::Error::new(io::ErrorKind::StorageFull, msg),
            TreeError::DirectoryNotEmpty(msg) => {
                io::Error::new(io::ErrorKind::DirectoryNotEmpty, msg)
            }
            TreeError::AlreadyExists(msg) => io::Error::new(io::ErrorKind::AlreadyExists, msg),
            TreeError::CorruptSnapshot(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            TreeError::Config(msg) => io::Error::new(io::ErrorKind::InvalidData, msg),
            TreeError::Io(e) => e,
        }
    }
}

/// Tree result type.
pub type TreeResult<T> = Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(TreeError::invalid_argument("x").errno(), errno::EINVAL);
        assert_eq!(TreeError::name_too_long("/x").errno(), errno::ENAMETOOLONG);
        assert_eq!(TreeError::not_found("/x").errno(), errno::ENOENT);
        assert_eq!(TreeError::resource_exhausted("dirs").errno(), errno::ENOSPC);
        assert_eq!(TreeError::directory_not_empty("/a").errno(), errno::ENOTEMPTY);
        assert_eq!(TreeError::already_exists("/a").errno(), errno::EEXIST);
        assert_eq!(TreeError::corrupt("short").errno(), errno::EIO);
    }

    #[test]
    fn test_io_error_kind() {
        let e: io::Error = TreeError::directory_not_empty("/a").into();
        assert_eq!(e.kind(), io::ErrorKind::DirectoryNotEmpty);

        let e: io::Error = TreeError::not_found("/missing").into();
        assert_eq!(e.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_display_includes_path() {
        let e = TreeError::not_found("/a/f.txt");
        assert_eq!(e.to_string(), "not found: /a/f.txt");
    }
}
