//! `MtimeLayer`: virtualises modification time over a backend that rounds
//! or mangles it (second-resolution filesystems, FAT/DST jumps) (§4.6).
//!
//! Virtual mtimes are persisted in an external [`Database`] keyed by path,
//! as a `(real, virtual)` pair: whenever the backend's observed mtime still
//! matches the `real` half of a stored record, the `virtual` half is
//! substituted into the `FileInfo` a caller sees. An absent record means
//! "virtual equals real".

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::cancel::CancelToken;
use crate::case::fold_case;
use crate::database::Database;
use crate::layer::Layer;
use crate::path::canonicalize_relative;
use crate::{
    ErrorStream, EventStream, FileHandle, FileInfo, FileMode, FileSystem, FsError, IgnoreMatcher,
    LayerKind, OpenFlags, UsageInfo, WalkCallback,
};

/// A `(real, virtual)` instant pair, encoded as two fixed-size 12-byte
/// records (8-byte big-endian seconds, 4-byte big-endian nanoseconds)
/// concatenated.
fn encode_record(real: SystemTime, virtual_time: SystemTime) -> Vec<u8> {
    let mut buf = Vec::with_capacity(24);
    buf.extend_from_slice(&encode_instant(real));
    buf.extend_from_slice(&encode_instant(virtual_time));
    buf
}

fn encode_instant(time: SystemTime) -> [u8; 12] {
    let duration = time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let mut out = [0u8; 12];
    out[0..8].copy_from_slice(&duration.as_secs().to_be_bytes());
    out[8..12].copy_from_slice(&duration.subsec_nanos().to_be_bytes());
    out
}

fn decode_record(bytes: &[u8]) -> Result<(SystemTime, SystemTime), FsError> {
    if bytes.len() != 24 {
        return Err(FsError::InvalidData {
            context: format!("mtime record has unexpected length {}", bytes.len()),
        });
    }
    Ok((decode_instant(&bytes[0..12]), decode_instant(&bytes[12..24])))
}

fn decode_instant(bytes: &[u8]) -> SystemTime {
    let secs = u64::from_be_bytes(bytes[0..8].try_into().expect("12-byte slice"));
    let nanos = u32::from_be_bytes(bytes[8..12].try_into().expect("12-byte slice"));
    UNIX_EPOCH + Duration::new(secs, nanos)
}

/// The 1-hour tolerance FAT-formatted volumes typically jump by around a
/// daylight-saving transition.
const FAT_DST_TOLERANCE: Duration = Duration::from_secs(3600);

/// Builder that wraps an inner [`FileSystem`] with mtime virtualisation
/// backed by a [`Database`].
pub struct MtimeLayerBuilder {
    database: Arc<dyn Database>,
    case_insensitive_keys: bool,
    fat_dst_tolerance: bool,
}

impl MtimeLayerBuilder {
    /// Build against the given key/value store, defaulting to
    /// case-sensitive keys and no FAT/DST tolerance.
    pub fn new(database: Arc<dyn Database>) -> Self {
        MtimeLayerBuilder {
            database,
            case_insensitive_keys: false,
            fat_dst_tolerance: false,
        }
    }

    /// Fold record keys to lowercase, for pairing with a case-insensitive
    /// backend (or a [`crate::case::CaseLayer`] configured the same way).
    pub fn case_insensitive_keys(mut self, value: bool) -> Self {
        self.case_insensitive_keys = value;
        self
    }

    /// Tolerate a 1-hour delta between the stored and observed real mtime,
    /// matching the DST jump typical of FAT-formatted volumes.
    pub fn fat_dst_tolerance(mut self, value: bool) -> Self {
        self.fat_dst_tolerance = value;
        self
    }
}

impl<B: FileSystem> Layer<B> for MtimeLayerBuilder {
    type Backend = MtimeLayer<B>;

    fn layer(self, backend: B) -> MtimeLayer<B> {
        MtimeLayer {
            inner: backend,
            database: self.database,
            case_insensitive_keys: self.case_insensitive_keys,
            fat_dst_tolerance: self.fat_dst_tolerance,
        }
    }
}

/// A [`FileSystem`] wrapper providing nanosecond-precision mtime that
/// survives round-trips through a backend that can't store it natively.
pub struct MtimeLayer<B> {
    inner: B,
    database: Arc<dyn Database>,
    case_insensitive_keys: bool,
    fat_dst_tolerance: bool,
}

impl<B: FileSystem> MtimeLayer<B> {
    fn key(&self, name: &Path) -> Result<String, FsError> {
        let canonical = canonicalize_relative(name)?;
        let raw = canonical.to_string_lossy().into_owned();
        Ok(if self.case_insensitive_keys {
            fold_case(&raw)
        } else {
            raw
        })
    }

    fn real_matches(&self, stored_real: SystemTime, observed: SystemTime) -> bool {
        if stored_real == observed {
            return true;
        }
        if !self.fat_dst_tolerance {
            return false;
        }
        let delta = if stored_real > observed {
            stored_real.duration_since(observed)
        } else {
            observed.duration_since(stored_real)
        };
        delta.map(|delta| delta <= FAT_DST_TOLERANCE).unwrap_or(false)
    }

    fn overlay(&self, name: &Path, info: FileInfo) -> Result<FileInfo, FsError> {
        let key = self.key(name)?;
        match self.database.get(&key)? {
            Some(bytes) => {
                let (real, virtual_time) = decode_record(&bytes)?;
                if self.real_matches(real, info.mtime()) {
                    Ok(info.with_mtime(virtual_time))
                } else {
                    Ok(info)
                }
            }
            None => Ok(info),
        }
    }

    fn forget(&self, name: &Path) {
        if let Ok(key) = self.key(name) {
            let _ = self.database.delete(&key);
        }
    }
}

impl<B: FileSystem> FileSystem for MtimeLayer<B> {
    fn chmod(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.inner.chmod(name, mode)
    }

    fn chtimes(&self, name: &Path, atime: SystemTime, mtime: SystemTime) -> Result<(), FsError> {
        // The backend may silently drop precision; read back what it
        // actually stored rather than trust the call succeeded verbatim.
        let _ = self.inner.chtimes(name, atime, mtime);
        let info = self.inner.lstat(name)?;
        let real = info.mtime();
        let key = self.key(name)?;
        if real == mtime {
            self.database.delete(&key)?;
        } else {
            self.database.put(&key, &encode_record(real, mtime))?;
        }
        Ok(())
    }

    fn lchown(&self, name: &Path, owner_id: u32, group_id: u32) -> Result<(), FsError> {
        self.inner.lchown(name, owner_id, group_id)
    }

    fn create(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        self.forget(name);
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
        if flags.create || flags.write {
            self.forget(name);
        }
        self.inner.open_file(name, flags, mode)
    }

    fn mkdir(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.inner.mkdir(name, mode)
    }

    fn mkdir_all(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.inner.mkdir_all(name, mode)
    }

    fn remove(&self, name: &Path) -> Result<(), FsError> {
        let result = self.inner.remove(name);
        if result.is_ok() {
            self.forget(name);
        }
        result
    }

    fn remove_all(&self, name: &Path) -> Result<(), FsError> {
        let result = self.inner.remove_all(name);
        if result.is_ok() {
            // Only the exact key is cleaned up; stale records for
            // descendants of a removed directory are left to expire
            // naturally (no cascading scan of the database).
            self.forget(name);
        }
        result
    }

    fn rename(&self, old: &Path, new: &Path) -> Result<(), FsError> {
        let old_key = self.key(old)?;
        let stored = self.database.get(&old_key)?;
        let result = self.inner.rename(old, new);
        if result.is_ok() {
            let _ = self.database.delete(&old_key);
            if let Some(bytes) = stored {
                if let Ok(new_key) = self.key(new) {
                    let _ = self.database.put(&new_key, &bytes);
                }
            }
        }
        result
    }

    fn stat(&self, name: &Path) -> Result<FileInfo, FsError> {
        let info = self.inner.stat(name)?;
        self.overlay(name, info)
    }

    fn lstat(&self, name: &Path) -> Result<FileInfo, FsError> {
        let info = self.inner.lstat(name)?;
        self.overlay(name, info)
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
        self.inner.walk(root, &mut |path, result| match result {
            Ok(info) => match self.overlay(path, info.clone()) {
                Ok(overlaid) => callback(path, Ok(&overlaid)),
                Err(err) => callback(path, Err(&err)),
            },
            Err(err) => callback(path, Err(err)),
        })
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

    fn unwrap_of_kind(&self, kind: LayerKind) -> Option<&dyn FileSystem> {
        if kind == LayerKind::Mtime {
            Some(self as &dyn FileSystem)
        } else {
            self.inner.unwrap_of_kind(kind)
        }
    }
    fn treats_junctions_as_directories(&self) -> bool {
        self.inner.treats_junctions_as_directories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::database::MemoryDatabase;
    use crate::layer::LayerExt;

    fn layer(fs: FakeBackend) -> MtimeLayer<FakeBackend> {
        MtimeLayerBuilder::new(Arc::new(MemoryDatabase::new())).layer(fs)
    }

    #[test]
    fn virtual_mtime_round_trips_when_backend_preserves_real() {
        let fs = layer(FakeBackend::new());
        fs.create(Path::new("a.txt")).unwrap();

        let virtual_time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let real = fs.inner.lstat(Path::new("a.txt")).unwrap().mtime();
        fs.chtimes(Path::new("a.txt"), real, virtual_time).unwrap();

        assert_eq!(fs.stat(Path::new("a.txt")).unwrap().mtime(), virtual_time);
    }

    #[test]
    fn record_is_dropped_once_real_equals_virtual() {
        let fs = layer(FakeBackend::new());
        fs.create(Path::new("a.txt")).unwrap();
        let real = fs.inner.lstat(Path::new("a.txt")).unwrap().mtime();

        fs.chtimes(Path::new("a.txt"), real, real).unwrap();
        assert_eq!(
            fs.database.get(&fs.key(Path::new("a.txt")).unwrap()).unwrap(),
            None
        );
    }

    #[test]
    fn record_is_ignored_once_real_mtime_moves_on() {
        let fs = layer(FakeBackend::new());
        fs.create(Path::new("a.txt")).unwrap();
        let real = fs.inner.lstat(Path::new("a.txt")).unwrap().mtime();
        let virtual_time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        fs.chtimes(Path::new("a.txt"), real, virtual_time).unwrap();

        // Backend mtime changes independently (e.g. a write) without going
        // through chtimes; the stale record must stop applying.
        let mut handle = fs.inner.open(Path::new("a.txt")).unwrap();
        handle.write(b"x").unwrap();
        drop(handle);

        let observed = fs.stat(Path::new("a.txt")).unwrap().mtime();
        assert_ne!(observed, virtual_time);
    }

    #[test]
    fn record_survives_rename() {
        let fs = layer(FakeBackend::new());
        fs.create(Path::new("old.txt")).unwrap();
        let real = fs.inner.lstat(Path::new("old.txt")).unwrap().mtime();
        let virtual_time = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        fs.chtimes(Path::new("old.txt"), real, virtual_time).unwrap();

        fs.rename(Path::new("old.txt"), Path::new("new.txt")).unwrap();
        assert_eq!(fs.stat(Path::new("new.txt")).unwrap().mtime(), virtual_time);
    }

    #[test]
    fn fat_dst_tolerance_accepts_one_hour_delta() {
        let fs = MtimeLayerBuilder::new(Arc::new(MemoryDatabase::new()))
            .fat_dst_tolerance(true)
            .layer(FakeBackend::new());
        fs.create(Path::new("a.txt")).unwrap();
        let real = fs.inner.lstat(Path::new("a.txt")).unwrap().mtime();
        let virtual_time = real + Duration::from_secs(10);
        fs.chtimes(Path::new("a.txt"), real, virtual_time).unwrap();

        let shifted_real = real + Duration::from_secs(3600);
        assert!(fs.real_matches(
            decode_record(
                &fs.database.get(&fs.key(Path::new("a.txt")).unwrap()).unwrap().unwrap()
            )
            .unwrap()
            .0,
            shifted_real
        ));
    }
}
