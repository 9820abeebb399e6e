//! Path resolution helpers.
//!
//! Paths are plain strings split on `/`. There is no `.`/`..` handling:
//! the tree only ever sees the absolute paths a kernel bridge hands it.

use crate::error::{TreeError, TreeResult};
use crate::types::{MAX_NAME_LEN, ROOT};

const SEPARATOR: char = '/';

/// Returns true if `path` names the root directory.
pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == ROOT
}

/// Parent path of `path`, `dirname(3)` style.
///
/// `"/a"` → `"/"`, `"/a/b"` → `"/a"`, `"/a/b/"` → `"/a"`. A path with no
/// separator has parent `"."`, which never resolves to a directory.
pub fn parent_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return ROOT;
    }
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => {
            let parent = trimmed[..idx].trim_end_matches(SEPARATOR);
            if parent.is_empty() { ROOT } else { parent }
        }
        None => ".",
    }
}

/// Final segment of `path`, `basename(3)` style.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return ROOT;
    }
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Check that `path` can name a new entry.
///
/// A well-formed path is absolute, has no empty segment and no trailing
/// separator, so each entry has exactly one spelling. Shorter than two
/// bytes is malformed; longer than [`MAX_NAME_LEN`] is too long.
pub fn validate(path: &str) -> TreeResult<()> {
    let malformed = path.len() < 2
        || !path.starts_with(SEPARATOR)
        || path.ends_with(SEPARATOR)
        || path[1..].split(SEPARATOR).any(str::is_empty);
    if malformed {
        return Err(TreeError::invalid_argument(format!(
            "malformed path: {path:?}"
        )));
    }
    if path.len() > MAX_NAME_LEN {
        return Err(TreeError::name_too_long(path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/dir1"), "/");
        assert_eq!(parent_path("/dir1/file.txt"), "/dir1");
        assert_eq!(parent_path("/dir1/dir2/file"), "/dir1/dir2");
        assert_eq!(parent_path("/dir1/dir2/"), "/dir1");
        assert_eq!(parent_path("/"), "/");
        assert_eq!(parent_path("name"), ".");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("/dir1"), "dir1");
        assert_eq!(file_name("/dir1/file.txt"), "file.txt");
        assert_eq!(file_name("/dir1/dir2/"), "dir2");
        assert_eq!(file_name("/"), "/");
    }

    #[test]
    fn test_is_root() {
        assert!(is_root("/"));
        assert!(is_root(""));
        assert!(!is_root("/a"));
    }

    #[test]
    fn test_validate() {
        assert!(validate("/a").is_ok());
        assert!(matches!(validate("/"), Err(TreeError::InvalidArgument(_))));
        assert!(matches!(validate(""), Err(TreeError::InvalidArgument(_))));

        let longest = format!("/{}", "x".repeat(MAX_NAME_LEN - 1));
        assert!(validate(&longest).is_ok());

        let too_long = format!("/{}", "x".repeat(MAX_NAME_LEN));
        assert!(matches!(validate(&too_long), Err(TreeError::NameTooLong(_))));
    }

    #[test]
    fn test_validate_single_spelling() {
        for bad in ["ab", "/a/", "//", "/a//b", "//a", "/a/b/"] {
            assert!(
                matches!(validate(bad), Err(TreeError::InvalidArgument(_))),
                "{bad:?} should be malformed"
            );
        }
        assert!(validate("/a/b").is_ok());
    }
}
