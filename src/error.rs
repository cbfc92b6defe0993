//! Error taxonomy for the virtual filesystem core.
//!
//! [`FsError`] is the single error type returned by every [`crate::FileSystem`]
//! operation and by every layer built on top of it. Variants map to the
//! abstract error kinds of the VFS contract; each variant carries enough
//! context (path, given/real name, handle id, …) to reconstruct the failing
//! operation without a backtrace.

use std::path::PathBuf;

/// Errors produced by [`crate::FileSystem`] operations and the layers built on top of it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FsError {
    /// Path is absent where presence was required.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was expected to exist.
        path: PathBuf,
    },

    /// Path is present where absence was required (mkdir clash, EXCL create, …).
    #[error("path already exists: {path}")]
    AlreadyExists {
        /// The path that unexpectedly exists.
        path: PathBuf,
    },

    /// Path exists but is not a directory.
    #[error("not a directory: {path}")]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// Path exists but is not a regular file.
    #[error("not a file: {path}")]
    NotAFile {
        /// The offending path.
        path: PathBuf,
    },

    /// Path exists but is not a symlink.
    #[error("not a symlink: {path}")]
    NotASymlink {
        /// The offending path.
        path: PathBuf,
    },

    /// Directory is not empty and a non-recursive removal was requested.
    #[error("directory not empty: {path}")]
    NotEmpty {
        /// The non-empty directory.
        path: PathBuf,
    },

    /// The caller lacks permission to perform the operation.
    #[error("permission denied: {path} ({operation})")]
    PermissionDenied {
        /// The path the operation was attempted on.
        path: PathBuf,
        /// A short description of the attempted operation.
        operation: &'static str,
    },

    /// The backend cannot perform this operation at all (e.g. symlinks on a
    /// platform that doesn't support them).
    #[error("unsupported operation: {operation}")]
    Unsupported {
        /// A short description of the unsupported operation.
        operation: &'static str,
    },

    /// A canonicalised path would escape the backend's configured root.
    #[error("path escapes root: {path}")]
    EscapesRoot {
        /// The offending (pre-canonicalisation) path.
        path: PathBuf,
    },

    /// CaseLayer rejected an operation because the given spelling does not
    /// match the on-disk real spelling.
    #[error("case conflict: given {given:?}, real spelling is {real:?}")]
    CaseConflict {
        /// The path as supplied by the caller.
        given: PathBuf,
        /// The real, on-disk spelling.
        real: PathBuf,
    },

    /// WalkLayer detected a revisit of an already-visited directory
    /// (junction/mount-point loop).
    #[error("infinite recursion detected at {path}")]
    InfiniteRecursion {
        /// The directory that was visited twice.
        path: PathBuf,
    },

    /// The watch backend's channel overflowed and events were dropped. This
    /// is always recovered internally (a synthetic rescan event is emitted)
    /// and is not surfaced as a hard error to trait callers; it exists in
    /// the error enum for places that report it through the fatal-error
    /// stream for observability.
    #[error("watch overflowed, {dropped} events may have been lost")]
    Overflow {
        /// Best-effort count of events dropped, if known.
        dropped: u64,
    },

    /// The OS-level watch limit was reached during setup.
    #[error("maximum number of OS watches reached; raise the platform's watch limit")]
    MaxWatchesReached,

    /// A watch was already registered for this path by this service.
    #[error("a watch is already registered for {path}")]
    AlreadyWatching {
        /// The path already being watched.
        path: PathBuf,
    },

    /// The outbound consumer for a watch or walk has gone away.
    #[error("channel closed")]
    ChannelClosed,

    /// Input data (a path, a URI, a stored record) was structurally invalid.
    #[error("invalid data: {context}")]
    InvalidData {
        /// A short description of what was invalid.
        context: String,
    },

    /// A lock or rename conflicted with concurrent state.
    #[error("conflict at {path}")]
    Conflict {
        /// The path in conflict.
        path: PathBuf,
    },

    /// Catch-all wrapper preserving the underlying OS error.
    #[error("I/O error while {context}: {source}")]
    Io {
        /// What the crate was doing when the OS error occurred.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FsError {
    /// Wrap a raw [`std::io::Error`] with a short description of what the
    /// crate was doing, producing a contextualised [`FsError::Io`]. Use this
    /// when no specific path is available to attach to the error; prefer
    /// [`FsError::from_io`] whenever the failing path is known, so the
    /// error can reconstruct it without a backtrace.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        FsError::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify a raw [`std::io::Error`] against `path`, the path the
    /// operation that produced it was attempting to act on. Recognised
    /// [`std::io::ErrorKind`]s map to the matching structured variant
    /// carrying `path`; anything else falls back to a contextualised
    /// [`FsError::Io`].
    pub fn from_io(context: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let path = path.into();
        match source.kind() {
            ErrorKind::NotFound => FsError::NotFound { path },
            ErrorKind::AlreadyExists => FsError::AlreadyExists { path },
            ErrorKind::PermissionDenied => FsError::PermissionDenied {
                path,
                operation: "io",
            },
            _ => FsError::io(context, source),
        }
    }

    /// `true` for [`FsError::NotFound`], used by `remove_all`/`mkdir_all`
    /// idempotence and by CaseLayer's "op creates, no conflict" rule.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::NotFound { .. })
    }

    /// `true` for [`FsError::AlreadyExists`], used by `mkdir_all`'s
    /// "pre-existing directory is fine" rule.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, FsError::AlreadyExists { .. })
    }
}

/// Converts a bare [`std::io::Error`] with no associated path into a
/// generic [`FsError::Io`]. A bare `io::Error` carries no path of its own,
/// so this never fabricates a structured variant's `path` field; callers
/// that know the failing path should use [`FsError::from_io`] instead.
impl From<std::io::Error> for FsError {
    fn from(source: std::io::Error) -> Self {
        FsError::io("unspecified operation", source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_not_found() {
        let err = FsError::NotFound {
            path: PathBuf::from("/a"),
        };
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());
    }

    #[test]
    fn bare_io_error_converts_to_generic_io_variant() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: FsError = io_err.into();
        assert!(matches!(err, FsError::Io { .. }));
    }

    #[test]
    fn from_io_classifies_not_found_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = FsError::from_io("stat", PathBuf::from("/a/missing.txt"), io_err);
        match err {
            FsError::NotFound { path } => assert_eq!(path, PathBuf::from("/a/missing.txt")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn from_io_classifies_already_exists_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AlreadyExists, "dup");
        let err = FsError::from_io("mkdir", PathBuf::from("/a/dup"), io_err);
        match err {
            FsError::AlreadyExists { path } => assert_eq!(path, PathBuf::from("/a/dup")),
            other => panic!("expected AlreadyExists, got {other:?}"),
        }
    }

    #[test]
    fn from_io_classifies_permission_denied_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = FsError::from_io("chmod", PathBuf::from("/a/secret"), io_err);
        match err {
            FsError::PermissionDenied { path, .. } => assert_eq!(path, PathBuf::from("/a/secret")),
            other => panic!("expected PermissionDenied, got {other:?}"),
        }
    }

    #[test]
    fn from_io_falls_back_to_generic_io_for_other_kinds() {
        let io_err = std::io::Error::other("boom");
        let err = FsError::from_io("reading header", PathBuf::from("/a/b"), io_err);
        assert!(matches!(err, FsError::Io { .. }));
    }

    #[test]
    fn case_conflict_carries_both_names() {
        let err = FsError::CaseConflict {
            given: PathBuf::from("foo/bar"),
            real: PathBuf::from("Foo/Bar"),
        };
        match err {
            FsError::CaseConflict { given, real } => {
                assert_eq!(given, PathBuf::from("foo/bar"));
                assert_eq!(real, PathBuf::from("Foo/Bar"));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn io_helper_wraps_context() {
        let source = std::io::Error::other("boom");
        let err = FsError::io("reading header", source);
        assert!(err.to_string().contains("reading header"));
    }

    #[test]
    fn display_messages_are_human_readable() {
        let err = FsError::EscapesRoot {
            path: PathBuf::from("../../etc/passwd"),
        };
        assert!(err.to_string().contains("escapes root"));
    }
}
