//! The [`FileSystem`] trait: the single uniform contract every backend and
//! layer implements (§4.1).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::{Event, FileHandle, FileInfo, FileMode, FsError, IgnoreMatcher, LayerKind, OpenFlags, UsageInfo};
use crate::cancel::CancelToken;

/// What a [`walk`](FileSystem::walk) callback wants to happen next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Keep walking normally.
    Continue,
    /// If the current entry is a directory, do not descend into it. Has no
    /// effect beyond the current callback invocation if the entry is not a
    /// directory.
    SkipDir,
}

/// The result handed to a walk callback for a single entry: either its
/// freshly-`lstat`ed info, or the error that occurred while trying to list
/// or stat it (the walk is not aborted automatically — the callback's
/// return value decides that).
pub type WalkEntryResult<'a> = Result<&'a FileInfo, &'a FsError>;

/// Callback signature for [`FileSystem::walk`].
pub type WalkCallback<'a> = dyn FnMut(&Path, WalkEntryResult<'_>) -> Result<WalkAction, FsError> + 'a;

/// The receiving half of a watch's event stream.
pub type EventStream = crossbeam_channel::Receiver<Event>;
/// The receiving half of a watch's fatal-error stream.
pub type ErrorStream = crossbeam_channel::Receiver<FsError>;

/// The uniform filesystem contract exposed by every backend
/// ([`crate::backend::basic::BasicBackend`], [`crate::backend::fake::FakeBackend`])
/// and every layer ([`crate::walk::WalkLayer`], [`crate::case::CaseLayer`],
/// [`crate::mtime::MtimeLayer`]).
///
/// All paths are relative to the implementor's configured root and must be
/// canonicalised (see [`crate::path`]) before use; a path that escapes the
/// root fails [`FsError::EscapesRoot`].
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`. Methods take `&self`;
/// backends and layers manage their own interior mutability.
///
/// # Object Safety
///
/// This trait is object-safe and is routinely used as `&dyn FileSystem`
/// inside layers that hold their inner filesystem generically.
pub trait FileSystem: Send + Sync {
    /// Change permission bits. Existing path only.
    fn chmod(&self, name: &Path, mode: FileMode) -> Result<(), FsError>;

    /// Change access and modification times. Existing path only.
    fn chtimes(&self, name: &Path, atime: SystemTime, mtime: SystemTime) -> Result<(), FsError>;

    /// Change ownership without following a trailing symlink.
    fn lchown(&self, name: &Path, owner_id: u32, group_id: u32) -> Result<(), FsError>;

    /// Create (or truncate) a file for writing.
    fn create(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError>;

    /// Open an existing file read-only.
    fn open(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError>;

    /// Open a file with explicit flags and, if created, the given mode.
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: FileMode,
    ) -> Result<Box<dyn FileHandle>, FsError>;

    /// Create a single directory. Fails if it already exists.
    fn mkdir(&self, name: &Path, mode: FileMode) -> Result<(), FsError>;

    /// Create a directory and any missing parents. Idempotent when the
    /// target is already a directory.
    fn mkdir_all(&self, name: &Path, mode: FileMode) -> Result<(), FsError>;

    /// Remove a file or an empty directory.
    fn remove(&self, name: &Path) -> Result<(), FsError>;

    /// Remove a path and, if it is a directory, everything under it.
    /// Idempotent: a non-existent path is not an error.
    fn remove_all(&self, name: &Path) -> Result<(), FsError>;

    /// Rename/move within the same filesystem.
    fn rename(&self, old: &Path, new: &Path) -> Result<(), FsError>;

    /// Metadata, following a trailing symlink.
    fn stat(&self, name: &Path) -> Result<FileInfo, FsError>;

    /// Metadata, not following a trailing symlink.
    fn lstat(&self, name: &Path) -> Result<FileInfo, FsError>;

    /// Unordered basenames of a directory's direct children.
    fn dir_names(&self, name: &Path) -> Result<Vec<String>, FsError>;

    /// The raw (uninterpreted) target of a symlink.
    fn read_symlink(&self, name: &Path) -> Result<String, FsError>;

    /// Create a symlink pointing at `target` (not required to exist).
    fn create_symlink(&self, target: &str, name: &Path) -> Result<(), FsError>;

    /// Mark a path hidden, in whatever platform-specific sense applies.
    /// A no-op is an acceptable implementation on platforms without the
    /// concept.
    fn hide(&self, name: &Path) -> Result<(), FsError>;

    /// Reverse of [`hide`](Self::hide).
    fn unhide(&self, name: &Path) -> Result<(), FsError>;

    /// Deterministic, full-path-lexicographic traversal; see
    /// [`crate::walk::WalkLayer`] for the contract in full.
    fn walk(&self, root: &Path, callback: &mut WalkCallback<'_>) -> Result<(), FsError>;

    /// Subscribe to changes under `path`. See [`crate::watch_service`] for
    /// the overflow/cancellation/classification contract.
    fn watch(
        &self,
        path: &Path,
        ignore: Arc<dyn IgnoreMatcher>,
        cancel: CancelToken,
        ignore_perms: bool,
    ) -> Result<(EventStream, ErrorStream), FsError>;

    /// Capacity/free-space for the volume backing `name`.
    fn usage(&self, name: &Path) -> Result<UsageInfo, FsError>;

    /// The absolute mount roots this filesystem exposes.
    fn roots(&self) -> Vec<PathBuf>;

    /// Whether this filesystem supports symlinks at all. When `false`,
    /// [`read_symlink`](Self::read_symlink) and
    /// [`create_symlink`](Self::create_symlink) must return
    /// [`FsError::Unsupported`] rather than silently no-op.
    fn symlinks_supported(&self) -> bool;

    /// Probe a (possibly layered) filesystem for a specific kind without
    /// runtime reflection. Layers that aren't `kind` delegate to their
    /// inner filesystem; backends return `Some(self)` only for their own
    /// kind.
    fn unwrap_of_kind(&self, kind: LayerKind) -> Option<&dyn FileSystem>;

    /// Whether this filesystem may reclassify a junction/mount-point as a
    /// traversable directory rather than reporting it as a symlink. A
    /// backend that never does this cannot produce a cyclic directory
    /// graph, so [`crate::walk::WalkLayer`]'s revisit detection only needs
    /// to run when this returns `true`. Defaults to `false`; a layer
    /// wrapping another filesystem should delegate to its inner
    /// filesystem rather than accept this default.
    fn treats_junctions_as_directories(&self) -> bool {
        false
    }
}
