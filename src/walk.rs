//! Deterministic traversal (§4.4): [`WalkLayer`] wraps any [`FileSystem`]
//! and walks it in full-path lexicographic order, so a caller processing
//! entries in the order they arrive sees parents before children and
//! siblings in sorted order.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::cancel::CancelToken;
use crate::layer::Layer;
use crate::{
    ErrorStream, EventStream, FileHandle, FileInfo, FileMode, FsError, IgnoreMatcher, LayerKind,
    OpenFlags, UsageInfo, WalkAction, WalkCallback,
};

/// Depth past which a directory is assumed to be a re-entrant junction/mount
/// loop rather than a legitimately deep tree. The data model has no
/// cross-platform inode/volume identity to detect true cycles, so this is a
/// bounded-depth heuristic rather than exact cycle detection; see
/// DESIGN.md. Only applied when the wrapped filesystem can actually produce
/// such a loop (see [`crate::FileSystem::treats_junctions_as_directories`]).
const MAX_WALK_DEPTH: usize = 256;

/// A path ordered by its raw encoded bytes rather than [`Path`]'s
/// component-wise [`Ord`], so `.` (0x2E) sorts before `/` (0x2F) and e.g.
/// `a.d/x` precedes `a/x` - the order the on-disk database itself uses.
#[derive(Debug, Clone, Eq)]
struct BytePath(PathBuf);

impl BytePath {
    fn bytes(&self) -> &[u8] {
        self.0.as_os_str().as_encoded_bytes()
    }
}

impl PartialEq for BytePath {
    fn eq(&self, other: &Self) -> bool {
        self.bytes() == other.bytes()
    }
}

impl Ord for BytePath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bytes().cmp(other.bytes())
    }
}

impl PartialOrd for BytePath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Walk `fs` starting at `root` in full-path lexicographic order, entries
/// past `max_depth` path components (if set) failing with
/// [`FsError::InfiniteRecursion`] instead of being expanded.
///
/// Uses a min-heap of pending paths rather than plain recursion: every
/// discovered path (file or directory) is pushed once, and the heap always
/// yields the lexicographically smallest pending path next, which is
/// equivalent to — but not implemented as — a sorted-children depth-first
/// walk.
pub(crate) fn walk_with_limit<B: crate::FileSystem + ?Sized>(
    fs: &B,
    root: &Path,
    max_depth: Option<usize>,
    callback: &mut WalkCallback<'_>,
) -> Result<(), FsError> {
    let mut heap: BinaryHeap<Reverse<BytePath>> = BinaryHeap::new();
    heap.push(Reverse(BytePath(root.to_path_buf())));

    while let Some(Reverse(BytePath(current))) = heap.pop() {
        if let Some(limit) = max_depth {
            if current.components().count() > limit {
                return Err(FsError::InfiniteRecursion { path: current });
            }
        }

        let info = fs.lstat(&current);
        let action = match &info {
            Ok(file_info) => callback(&current, Ok(file_info))?,
            Err(err) => callback(&current, Err(err))?,
        };

        let is_dir = info.as_ref().map(FileInfo::is_dir).unwrap_or(false);
        if is_dir && action != WalkAction::SkipDir {
            match fs.dir_names(&current) {
                Ok(children) => {
                    for child in children {
                        heap.push(Reverse(BytePath(current.join(child))));
                    }
                }
                Err(err) => {
                    callback(&current, Err(&err))?;
                }
            }
        }
    }

    Ok(())
}

/// Plain (unbounded-depth) walk, used by backends that have no junction/loop
/// concept of their own (§4.2, §4.3) and delegate straight to this.
pub(crate) fn walk_uncoordinated<B: crate::FileSystem + ?Sized>(
    fs: &B,
    root: &Path,
    callback: &mut WalkCallback<'_>,
) -> Result<(), FsError> {
    walk_with_limit(fs, root, None, callback)
}

/// Builder that wraps an inner [`FileSystem`] with deterministic,
/// loop-guarded traversal.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkLayerBuilder;

impl<B: crate::FileSystem> Layer<B> for WalkLayerBuilder {
    type Backend = WalkLayer<B>;

    fn layer(self, backend: B) -> WalkLayer<B> {
        WalkLayer { inner: backend }
    }
}

/// A [`FileSystem`] wrapper providing deterministic, loop-guarded `walk`.
/// Every other method passes straight through to the inner filesystem.
#[derive(Debug, Clone)]
pub struct WalkLayer<B> {
    inner: B,
}

impl<B: crate::FileSystem> crate::FileSystem for WalkLayer<B> {
    fn chmod(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.inner.chmod(name, mode)
    }
    fn chtimes(&self, name: &Path, atime: SystemTime, mtime: SystemTime) -> Result<(), FsError> {
        self.inner.chtimes(name, atime, mtime)
    }
    fn lchown(&self, name: &Path, owner_id: u32, group_id: u32) -> Result<(), FsError> {
        self.inner.lchown(name, owner_id, group_id)
    }
    fn create(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        self.inner.create(name)
    }
    fn open(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        self.inner.open(name)
    }
    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: FileMode,
    ) -> Result<Box<dyn FileHandle>, FsError> {
        self.inner.open_file(name, flags, mode)
    }
    fn mkdir(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.inner.mkdir(name, mode)
    }
    fn mkdir_all(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.inner.mkdir_all(name, mode)
    }
    fn remove(&self, name: &Path) -> Result<(), FsError> {
        self.inner.remove(name)
    }
    fn remove_all(&self, name: &Path) -> Result<(), FsError> {
        self.inner.remove_all(name)
    }
    fn rename(&self, old: &Path, new: &Path) -> Result<(), FsError> {
        self.inner.rename(old, new)
    }
    fn stat(&self, name: &Path) -> Result<FileInfo, FsError> {
        self.inner.stat(name)
    }
    fn lstat(&self, name: &Path) -> Result<FileInfo, FsError> {
        self.inner.lstat(name)
    }
    fn dir_names(&self, name: &Path) -> Result<Vec<String>, FsError> {
        self.inner.dir_names(name)
    }
    fn read_symlink(&self, name: &Path) -> Result<String, FsError> {
        self.inner.read_symlink(name)
    }
    fn create_symlink(&self, target: &str, name: &Path) -> Result<(), FsError> {
        self.inner.create_symlink(target, name)
    }
    fn hide(&self, name: &Path) -> Result<(), FsError> {
        self.inner.hide(name)
    }
    fn unhide(&self, name: &Path) -> Result<(), FsError> {
        self.inner.unhide(name)
    }

    fn walk(&self, root: &Path, callback: &mut WalkCallback<'_>) -> Result<(), FsError> {
        let max_depth = self.inner.treats_junctions_as_directories().then_some(MAX_WALK_DEPTH);
        walk_with_limit(&self.inner, root, max_depth, callback)
    }

    fn watch(
        &self,
        path: &Path,
        ignore: Arc<dyn IgnoreMatcher>,
        cancel: CancelToken,
        ignore_perms: bool,
    ) -> Result<(EventStream, ErrorStream), FsError> {
        self.inner.watch(path, ignore, cancel, ignore_perms)
    }
    fn usage(&self, name: &Path) -> Result<UsageInfo, FsError> {
        self.inner.usage(name)
    }
    fn roots(&self) -> Vec<PathBuf> {
        self.inner.roots()
    }
    fn symlinks_supported(&self) -> bool {
        self.inner.symlinks_supported()
    }
    fn unwrap_of_kind(&self, kind: LayerKind) -> Option<&dyn crate::FileSystem> {
        if kind == LayerKind::Walk {
            Some(self as &dyn crate::FileSystem)
        } else {
            self.inner.unwrap_of_kind(kind)
        }
    }
    fn treats_junctions_as_directories(&self) -> bool {
        self.inner.treats_junctions_as_directories()
    }
}
