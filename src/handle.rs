//! The polymorphic file handle returned by `create`/`open`/`open_file`.

use std::io::SeekFrom;
use std::path::Path;

use crate::{FileInfo, FsError};

/// A single open file, polymorphic over the capability set described in
/// the data model: read, read-at-offset, write, write-at-offset, seek,
/// truncate, sync, stat, name, close.
///
/// Offset state belongs to the handle and must survive operations that
/// don't intentionally move it — implementors backed by a real file
/// descriptor get this for free; [`crate::backend::fake::FakeBackend`]'s
/// handle tracks its own cursor explicitly.
///
/// # Object Safety
///
/// This trait is object-safe; every [`crate::FileSystem`] method that opens
/// a file returns `Box<dyn FileHandle>`.
pub trait FileHandle: Send {
    /// Read into `buf` starting at the handle's current offset, advancing
    /// it by the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Read into `buf` starting at `offset`, without touching the handle's
    /// own cursor.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError>;

    /// Write `data` starting at the handle's current offset, advancing it
    /// by the number of bytes written. If the handle was opened with
    /// `append`, the write always lands at the current end of file
    /// regardless of the tracked offset.
    fn write(&mut self, data: &[u8]) -> Result<usize, FsError>;

    /// Write `data` starting at `offset`, without touching the handle's own
    /// cursor.
    fn write_at(&self, data: &[u8], offset: u64) -> Result<usize, FsError>;

    /// Reposition the handle's cursor, returning the new absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError>;

    /// Truncate (or extend with zero bytes) the underlying file to `size`.
    fn truncate(&mut self, size: u64) -> Result<(), FsError>;

    /// Flush any buffered writes to the backend.
    fn sync(&self) -> Result<(), FsError>;

    /// Snapshot the handle's current metadata.
    fn stat(&self) -> Result<FileInfo, FsError>;

    /// The path this handle was opened against.
    fn name(&self) -> &Path;

    /// Release the handle. Implementors that need fallible cleanup (flush
    /// errors) should report them here rather than in `Drop`.
    fn close(self: Box<Self>) -> Result<(), FsError>;
}
