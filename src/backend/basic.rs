//! An OS-backed [`FileSystem`] rooted at a real directory (§4.2).

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::cancel::CancelToken;
use crate::path::join_within_root;
use crate::{
    ErrorStream, EventStream, FileHandle, FileInfo, FileKind, FileMode, FsError,
    IgnoreMatcher, LayerKind, OpenFlags, UsageInfo,
};
use crate::watch_service;

/// Real-filesystem [`FileSystem`] implementation, rooted at a directory
/// fixed at construction time. Every path an operation receives is
/// canonicalised and verified to stay within that root before it ever
/// reaches `std::fs`.
#[derive(Debug, Clone)]
pub struct BasicBackend {
    root: PathBuf,
}

impl BasicBackend {
    /// Open a backend rooted at `root`. The root is canonicalised once here
    /// (resolving symlinks); it must already exist and be a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FsError> {
        let root = fs::canonicalize(root.as_ref())
            .map_err(|err| FsError::io("canonicalising backend root", err))?;
        let metadata = fs::metadata(&root).map_err(|err| FsError::io("stat-ing backend root", err))?;
        if !metadata.is_dir() {
            return Err(FsError::NotADirectory { path: root });
        }
        Ok(BasicBackend { root })
    }

    fn resolve(&self, name: &Path) -> Result<PathBuf, FsError> {
        join_within_root(&self.root, name)
    }
}

/// Classify an I/O failure against the logical path the caller asked this
/// operation to act on (not necessarily the root-joined absolute path), so
/// the resulting [`FsError`] can reconstruct the failing path.
fn io_err(context: &str, path: &Path, source: std::io::Error) -> FsError {
    FsError::from_io(context.to_string(), path.to_path_buf(), source)
}

#[cfg(unix)]
fn metadata_to_file_info(basename: String, metadata: &fs::Metadata) -> FileInfo {
    use std::os::unix::fs::MetadataExt;

    let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let ctime_secs = metadata.ctime().max(0) as u64;
    let ctime_nanos = metadata.ctime_nsec().max(0) as u32;
    let ctime = if ctime_secs == 0 && ctime_nanos == 0 {
        SystemTime::UNIX_EPOCH
    } else {
        SystemTime::UNIX_EPOCH + std::time::Duration::new(ctime_secs, ctime_nanos)
    };
    FileInfo::new(
        basename,
        metadata.len(),
        mtime,
        ctime,
        FileMode::from_bits(metadata.mode()),
        metadata.uid(),
        metadata.gid(),
    )
}

#[cfg(not(unix))]
fn metadata_to_file_info(basename: String, metadata: &fs::Metadata) -> FileInfo {
    let mtime = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let kind = if metadata.is_dir() {
        FileKind::Directory
    } else if metadata.file_type().is_symlink() {
        FileKind::Symlink
    } else if metadata.is_file() {
        FileKind::Regular
    } else {
        FileKind::Other
    };
    let perm = match kind {
        FileKind::Directory => 0o755,
        _ if metadata.permissions().readonly() => 0o555,
        _ => 0o644,
    };
    FileInfo::new(
        basename,
        metadata.len(),
        mtime,
        SystemTime::UNIX_EPOCH,
        FileMode::new(kind, perm),
        0,
        0,
    )
}

fn basename_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A `std::fs::File`-backed [`FileHandle`].
struct BasicFileHandle {
    file: fs::File,
    path: PathBuf,
}

impl FileHandle for BasicFileHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        self.file
            .read(buf)
            .map_err(|err| io_err("reading file", &self.path, err))
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file
                .read_at(buf, offset)
                .map_err(|err| io_err("reading file at offset", &self.path, err))
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            self.file
                .seek_read(buf, offset)
                .map_err(|err| io_err("reading file at offset", &self.path, err))
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, FsError> {
        self.file
            .write(data)
            .map_err(|err| io_err("writing file", &self.path, err))
    }

    fn write_at(&self, data: &[u8], offset: u64) -> Result<usize, FsError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file
                .write_at(data, offset)
                .map_err(|err| io_err("writing file at offset", &self.path, err))
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            self.file
                .seek_write(data, offset)
                .map_err(|err| io_err("writing file at offset", &self.path, err))
        }
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64, FsError> {
        self.file
            .seek(pos)
            .map_err(|err| io_err("seeking file", &self.path, err))
    }

    fn truncate(&mut self, size: u64) -> Result<(), FsError> {
        self.file
            .set_len(size)
            .map_err(|err| io_err("truncating file", &self.path, err))
    }

    fn sync(&self) -> Result<(), FsError> {
        self.file
            .sync_all()
            .map_err(|err| io_err("syncing file", &self.path, err))
    }

    fn stat(&self) -> Result<FileInfo, FsError> {
        let metadata = self
            .file
            .metadata()
            .map_err(|err| io_err("stat-ing file handle", &self.path, err))?;
        Ok(metadata_to_file_info(basename_of(&self.path), &metadata))
    }

    fn name(&self) -> &Path {
        &self.path
    }

    fn close(self: Box<Self>) -> Result<(), FsError> {
        Ok(())
    }
}

impl crate::FileSystem for BasicBackend {
    fn chmod(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        let target = self.resolve(name)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(mode.permissions());
            fs::set_permissions(&target, perms).map_err(|err| io_err("chmod", name, err))
        }
        #[cfg(not(unix))]
        {
            let mut perms = fs::metadata(&target)
                .map_err(|err| io_err("chmod", name, err))?
                .permissions();
            perms.set_readonly(mode.permissions() & 0o200 == 0);
            fs::set_permissions(&target, perms).map_err(|err| io_err("chmod", name, err))
        }
    }

    fn chtimes(&self, name: &Path, atime: SystemTime, mtime: SystemTime) -> Result<(), FsError> {
        let target = self.resolve(name)?;
        let atime = filetime::FileTime::from_system_time(atime);
        let mtime = filetime::FileTime::from_system_time(mtime);
        filetime::set_file_times(&target, atime, mtime).map_err(|err| io_err("chtimes", name, err))
    }

    fn lchown(&self, name: &Path, _owner_id: u32, _group_id: u32) -> Result<(), FsError> {
        let target = self.resolve(name)?;
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            let c_path = std::ffi::CString::new(target.as_os_str().as_bytes())
                .map_err(|_| FsError::InvalidData {
                    context: "path contains a NUL byte".to_string(),
                })?;
            let rc = unsafe { libc::lchown(c_path.as_ptr(), _owner_id, _group_id) };
            if rc != 0 {
                return Err(io_err("lchown", name, std::io::Error::last_os_error()));
            }
            Ok(())
        }
        #[cfg(not(unix))]
        {
            Err(FsError::Unsupported { operation: "lchown" })
        }
    }

    fn create(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        let target = self.resolve(name)?;
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target)
            .map_err(|err| io_err("creating file", name, err))?;
        Ok(Box::new(BasicFileHandle { file, path: target }))
    }

    fn open(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        let target = self.resolve(name)?;
        let file = fs::OpenOptions::new()
            .read(true)
            .open(&target)
            .map_err(|err| io_err("opening file", name, err))?;
        Ok(Box::new(BasicFileHandle { file, path: target }))
    }

    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: FileMode,
    ) -> Result<Box<dyn FileHandle>, FsError> {
        let target = self.resolve(name)?;
        let file = fs::OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .create(flags.create && !flags.excl)
            .create_new(flags.create && flags.excl)
            .truncate(flags.truncate)
            .append(flags.append)
            .open(&target)
            .map_err(|err| io_err("opening file", name, err))?;

        #[cfg(unix)]
        if flags.create {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&target, fs::Permissions::from_mode(mode.permissions()));
        }
        #[cfg(not(unix))]
        let _ = mode;

        Ok(Box::new(BasicFileHandle { file, path: target }))
    }

    fn mkdir(&self, name: &Path, _mode: FileMode) -> Result<(), FsError> {
        let target = self.resolve(name)?;
        fs::create_dir(&target).map_err(|err| io_err("creating directory", name, err))
    }

    fn mkdir_all(&self, name: &Path, _mode: FileMode) -> Result<(), FsError> {
        let target = self.resolve(name)?;
        fs::create_dir_all(&target).map_err(|err| io_err("creating directory tree", name, err))
    }

    fn remove(&self, name: &Path) -> Result<(), FsError> {
        let target = self.resolve(name)?;
        let metadata =
            fs::symlink_metadata(&target).map_err(|err| io_err("removing path", name, err))?;
        if metadata.is_dir() {
            fs::remove_dir(&target).map_err(|err| io_err("removing directory", name, err))
        } else {
            fs::remove_file(&target).map_err(|err| io_err("removing file", name, err))
        }
    }

    fn remove_all(&self, name: &Path) -> Result<(), FsError> {
        let target = self.resolve(name)?;
        match fs::symlink_metadata(&target) {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&target)
                .map_err(|err| io_err("removing directory tree", name, err)),
            Ok(_) => fs::remove_file(&target).map_err(|err| io_err("removing file", name, err)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err("removing path", name, err)),
        }
    }

    fn rename(&self, old: &Path, new: &Path) -> Result<(), FsError> {
        let old_target = self.resolve(old)?;
        let new_target = self.resolve(new)?;
        fs::rename(&old_target, &new_target).map_err(|err| io_err("renaming path", old, err))
    }

    fn stat(&self, name: &Path) -> Result<FileInfo, FsError> {
        let target = self.resolve(name)?;
        let metadata = fs::metadata(&target).map_err(|err| io_err("stat", name, err))?;
        Ok(metadata_to_file_info(basename_of(&target), &metadata))
    }

    fn lstat(&self, name: &Path) -> Result<FileInfo, FsError> {
        let target = self.resolve(name)?;
        let metadata = fs::symlink_metadata(&target).map_err(|err| io_err("lstat", name, err))?;
        Ok(metadata_to_file_info(basename_of(&target), &metadata))
    }

    fn dir_names(&self, name: &Path) -> Result<Vec<String>, FsError> {
        let target = self.resolve(name)?;
        let entries = fs::read_dir(&target).map_err(|err| io_err("reading directory", name, err))?;
        entries
            .map(|entry| {
                entry
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .map_err(|err| io_err("reading directory entry", name, err))
            })
            .collect()
    }

    fn read_symlink(&self, name: &Path) -> Result<String, FsError> {
        let target = self.resolve(name)?;
        let link = fs::read_link(&target).map_err(|err| io_err("reading symlink", name, err))?;
        Ok(link.to_string_lossy().into_owned())
    }

    fn create_symlink(&self, target_value: &str, name: &Path) -> Result<(), FsError> {
        let link_path = self.resolve(name)?;
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target_value, &link_path)
                .map_err(|err| io_err("creating symlink", name, err))
        }
        #[cfg(windows)]
        {
            let is_dir = Path::new(target_value).is_dir();
            let result = if is_dir {
                std::os::windows::fs::symlink_dir(target_value, &link_path)
            } else {
                std::os::windows::fs::symlink_file(target_value, &link_path)
            };
            result.map_err(|err| io_err("creating symlink", name, err))
        }
    }

    fn hide(&self, _name: &Path) -> Result<(), FsError> {
        // No attribute hook wired up; dotfile naming already conveys
        // "hidden" on the platforms this backend targets primarily.
        Ok(())
    }

    fn unhide(&self, _name: &Path) -> Result<(), FsError> {
        Ok(())
    }

    fn walk(&self, root: &Path, callback: &mut crate::WalkCallback<'_>) -> Result<(), FsError> {
        crate::walk::walk_uncoordinated(self, root, callback)
    }

    fn watch(
        &self,
        path: &Path,
        ignore: Arc<dyn IgnoreMatcher>,
        cancel: CancelToken,
        ignore_perms: bool,
    ) -> Result<(EventStream, ErrorStream), FsError> {
        let target = self.resolve(path)?;
        let canonical =
            fs::canonicalize(&target).map_err(|err| io_err("resolving watch root", path, err))?;
        watch_service::spawn_watch(canonical, ignore, cancel, ignore_perms)
    }

    fn usage(&self, name: &Path) -> Result<UsageInfo, FsError> {
        let target = self.resolve(name)?;
        usage_of(&target)
    }

    fn roots(&self) -> Vec<PathBuf> {
        vec![self.root.clone()]
    }

    fn symlinks_supported(&self) -> bool {
        cfg!(unix)
    }

    fn unwrap_of_kind(&self, kind: LayerKind) -> Option<&dyn crate::FileSystem> {
        (kind == LayerKind::Basic).then_some(self as &dyn crate::FileSystem)
    }
}

#[cfg(unix)]
fn usage_of(path: &Path) -> Result<UsageInfo, FsError> {
    use std::os::unix::ffi::OsStrExt;

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| FsError::InvalidData {
        context: "path contains a NUL byte".to_string(),
    })?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(io_err("statvfs", path, std::io::Error::last_os_error()));
    }
    let block_size = stat.f_frsize as u64;
    Ok(UsageInfo {
        total: stat.f_blocks as u64 * block_size,
        free: stat.f_bavail as u64 * block_size,
    })
}

#[cfg(not(unix))]
fn usage_of(_path: &Path) -> Result<UsageInfo, FsError> {
    Err(FsError::Unsupported { operation: "usage" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileSystem;

    #[test]
    fn new_rejects_non_directory_root() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(BasicBackend::new(file.path()).is_err());
    }

    #[test]
    fn mkdir_and_stat_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BasicBackend::new(dir.path()).unwrap();
        backend.mkdir(Path::new("sub"), FileMode::default_dir()).unwrap();
        let info = backend.stat(Path::new("sub")).unwrap();
        assert!(info.is_dir());
    }

    #[test]
    fn create_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BasicBackend::new(dir.path()).unwrap();
        let mut handle = backend.create(Path::new("a.txt")).unwrap();
        handle.write(b"hello").unwrap();
        handle.seek(SeekFrom::Start(0)).unwrap();
        let mut buf = [0u8; 5];
        let read = handle.read(&mut buf).unwrap();
        assert_eq!(read, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn remove_all_is_idempotent_on_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BasicBackend::new(dir.path()).unwrap();
        assert!(backend.remove_all(Path::new("never-existed")).is_ok());
    }

    #[test]
    fn dir_names_lists_children() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BasicBackend::new(dir.path()).unwrap();
        backend.create(Path::new("a")).unwrap();
        backend.create(Path::new("b")).unwrap();
        let mut names = backend.dir_names(Path::new(".")).unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn rejects_paths_that_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BasicBackend::new(dir.path()).unwrap();
        let result = backend.stat(Path::new("../../etc/passwd"));
        assert!(matches!(result, Err(FsError::EscapesRoot { .. })));
    }

    #[test]
    fn unwrap_of_kind_matches_only_basic() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BasicBackend::new(dir.path()).unwrap();
        assert!(backend.unwrap_of_kind(LayerKind::Basic).is_some());
        assert!(backend.unwrap_of_kind(LayerKind::Fake).is_none());
    }

    #[test]
    fn stat_on_missing_path_reports_that_path_in_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BasicBackend::new(dir.path()).unwrap();
        let err = backend.stat(Path::new("missing")).unwrap_err();
        match err {
            FsError::NotFound { path } => assert_eq!(path, Path::new("missing")),
            other => panic!("expected NotFound carrying the failing path, got {other:?}"),
        }
    }

    #[test]
    fn create_on_existing_excl_path_reports_that_path_in_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = BasicBackend::new(dir.path()).unwrap();
        backend.create(Path::new("dup.txt")).unwrap();
        let err = backend
            .open_file(
                Path::new("dup.txt"),
                OpenFlags {
                    create: true,
                    excl: true,
                    ..OpenFlags::READ_WRITE
                },
                FileMode::default_file(),
            )
            .unwrap_err();
        match err {
            FsError::AlreadyExists { path } => assert_eq!(path, Path::new("dup.txt")),
            other => panic!("expected AlreadyExists carrying the failing path, got {other:?}"),
        }
    }
}
