//! Path canonicalisation against a configured root.
//!
//! Every [`crate::FileSystem`] operation takes a relative path and must
//! reject any path that, once `.`/`..` are resolved, would escape the
//! backend's root. This module provides the lexical half of that
//! contract (no symlink following — backends that need symlink-aware
//! resolution layer it on top, the way [`BasicBackend`](crate::backend::basic::BasicBackend)
//! does against the real filesystem).

use std::path::{Component, Path, PathBuf};

use crate::FsError;

/// Lexically normalise `path` and verify it stays within a root rooted at
/// `.` — i.e. it must not contain a leading `..` or enough `..` components
/// to walk past the start.
///
/// Returns the normalised *relative* path (no leading `.`/`/`) on success.
pub fn canonicalize_relative(path: &Path) -> Result<PathBuf, FsError> {
    let mut stack: Vec<std::ffi::OsString> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if stack.pop().is_none() {
                    return Err(FsError::EscapesRoot {
                        path: path.to_path_buf(),
                    });
                }
            }
            Component::Normal(part) => stack.push(part.to_owned()),
            Component::RootDir | Component::Prefix(_) => {
                // Trait paths are always root-relative; an absolute input
                // is treated as rooted at the backend root, not at the
                // real filesystem root.
            }
        }
    }

    Ok(stack.into_iter().collect())
}

/// Join a canonicalised relative path onto an absolute root, and verify the
/// join didn't escape it. `root` must itself already be absolute and
/// normalised (backends do this once at construction).
pub fn join_within_root(root: &Path, relative: &Path) -> Result<PathBuf, FsError> {
    let canonical_relative = canonicalize_relative(relative)?;
    let joined = root.join(&canonical_relative);

    if !joined.starts_with(root) {
        return Err(FsError::EscapesRoot {
            path: relative.to_path_buf(),
        });
    }

    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dot_components() {
        let result = canonicalize_relative(Path::new("./a/./b")).unwrap();
        assert_eq!(result, PathBuf::from("a/b"));
    }

    #[test]
    fn resolves_internal_parent_dir() {
        let result = canonicalize_relative(Path::new("a/b/../c")).unwrap();
        assert_eq!(result, PathBuf::from("a/c"));
    }

    #[test]
    fn rejects_escaping_parent_dir() {
        let result = canonicalize_relative(Path::new("../etc/passwd"));
        assert!(matches!(result, Err(FsError::EscapesRoot { .. })));
    }

    #[test]
    fn rejects_escaping_after_consuming_all_components() {
        let result = canonicalize_relative(Path::new("a/../../b"));
        assert!(matches!(result, Err(FsError::EscapesRoot { .. })));
    }

    #[test]
    fn join_within_root_accepts_nested_path() {
        let root = Path::new("/srv/data");
        let joined = join_within_root(root, Path::new("a/b.txt")).unwrap();
        assert_eq!(joined, PathBuf::from("/srv/data/a/b.txt"));
    }

    #[test]
    fn join_within_root_rejects_traversal() {
        let root = Path::new("/srv/data");
        let result = join_within_root(root, Path::new("../../etc/passwd"));
        assert!(matches!(result, Err(FsError::EscapesRoot { .. })));
    }

    #[test]
    fn empty_path_canonicalizes_to_root() {
        let result = canonicalize_relative(Path::new(".")).unwrap();
        assert_eq!(result, PathBuf::new());
    }
}
