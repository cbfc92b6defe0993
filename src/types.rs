//! Core value types shared by every backend and layer.
//!
//! ## Quick reference
//!
//! | Type | Role |
//! |------|------|
//! | [`FileMode`] | opaque `u32` combining a 9-bit permission field and a type classifier |
//! | [`FileKind`] | the type classifier {regular, directory, symlink, other} |
//! | [`FileInfo`] | immutable metadata snapshot returned by `stat`/`lstat`/`walk` |
//! | [`OpenFlags`] | flags accepted by `open_file` |
//! | [`Event`] / [`EventKind`] | a single watch change notification |
//! | [`UsageInfo`] | `{total, free}` bytes returned by `usage` |

use std::time::SystemTime;

/// Regular file type bits, POSIX `S_IFREG`.
const S_IFREG: u32 = 0o100_000;
/// Directory type bits, POSIX `S_IFDIR`.
const S_IFDIR: u32 = 0o040_000;
/// Symlink type bits, POSIX `S_IFLNK`.
const S_IFLNK: u32 = 0o120_000;
/// Catch-all "other" type bits (sockets, devices, FIFOs, …).
const S_IFOTHER: u32 = 0o170_000;
/// Mask isolating the type classifier nibble from the permission bits.
const TYPE_MASK: u32 = 0o170_000;
/// Mask isolating the 9-bit permission field.
const PERM_MASK: u32 = 0o7_777;

/// The type classifier portion of a [`FileMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FileKind {
    /// A regular file.
    Regular,
    /// A directory.
    Directory,
    /// A symbolic link.
    Symlink,
    /// Anything else the backend can't further classify (devices, sockets, …).
    Other,
}

/// Bit set combining a 9-bit permission field and a type classifier.
///
/// Stored and compared as an opaque `u32`; the type classifier occupies the
/// high bits (POSIX `S_IFMT` convention) and the low 9 bits are the usual
/// `rwxrwxrwx` permission bits. Two `FileMode`s are equal iff their bit
/// patterns are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileMode(u32);

impl FileMode {
    /// Build a mode from a type classifier and a permission field (only the
    /// low 9 bits of `perm` are kept).
    pub fn new(kind: FileKind, perm: u32) -> Self {
        let type_bits = match kind {
            FileKind::Regular => S_IFREG,
            FileKind::Directory => S_IFDIR,
            FileKind::Symlink => S_IFLNK,
            FileKind::Other => S_IFOTHER,
        };
        FileMode(type_bits | (perm & PERM_MASK))
    }

    /// Reconstruct a `FileMode` from its raw opaque bits.
    pub fn from_bits(bits: u32) -> Self {
        FileMode(bits)
    }

    /// The raw opaque bit pattern.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// The type classifier.
    pub fn kind(&self) -> FileKind {
        match self.0 & TYPE_MASK {
            S_IFDIR => FileKind::Directory,
            S_IFLNK => FileKind::Symlink,
            S_IFREG => FileKind::Regular,
            _ => FileKind::Other,
        }
    }

    /// The low 9 permission bits.
    pub fn permissions(&self) -> u32 {
        self.0 & 0o777
    }

    /// `true` if [`kind`](Self::kind) is [`FileKind::Regular`].
    pub fn is_file(&self) -> bool {
        self.kind() == FileKind::Regular
    }

    /// `true` if [`kind`](Self::kind) is [`FileKind::Directory`].
    pub fn is_dir(&self) -> bool {
        self.kind() == FileKind::Directory
    }

    /// `true` if [`kind`](Self::kind) is [`FileKind::Symlink`].
    pub fn is_symlink(&self) -> bool {
        self.kind() == FileKind::Symlink
    }

    /// A regular file, `0644`.
    pub fn default_file() -> Self {
        FileMode::new(FileKind::Regular, 0o644)
    }

    /// A directory, `0755`.
    pub fn default_dir() -> Self {
        FileMode::new(FileKind::Directory, 0o755)
    }
}

impl Default for FileMode {
    fn default() -> Self {
        FileMode::default_file()
    }
}

/// Immutable metadata snapshot for a single path.
///
/// Constructed once by a backend (or a layer overlaying a backend's view)
/// and never mutated afterwards; overlays such as [`crate::mtime::MtimeLayer`]
/// produce a *new* `FileInfo` rather than editing one in place.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileInfo {
    basename: String,
    size: u64,
    #[cfg_attr(feature = "serde", serde(with = "crate::types::system_time_serde"))]
    mtime: SystemTime,
    #[cfg_attr(feature = "serde", serde(with = "crate::types::system_time_serde"))]
    ctime: SystemTime,
    mode: FileMode,
    uid: u32,
    gid: u32,
}

impl FileInfo {
    /// Construct a new, immutable `FileInfo`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        basename: impl Into<String>,
        size: u64,
        mtime: SystemTime,
        ctime: SystemTime,
        mode: FileMode,
        uid: u32,
        gid: u32,
    ) -> Self {
        FileInfo {
            basename: basename.into(),
            size,
            mtime,
            ctime,
            mode,
            uid,
            gid,
        }
    }

    /// Return a copy of this `FileInfo` with `mtime` replaced. Used by
    /// overlay layers (MtimeLayer) to substitute a virtual mtime without
    /// otherwise touching the snapshot.
    pub fn with_mtime(&self, mtime: SystemTime) -> Self {
        FileInfo {
            mtime,
            ..self.clone()
        }
    }

    /// The basename (no path separators).
    pub fn name(&self) -> &str {
        &self.basename
    }

    /// Size in bytes. Meaningless for directories.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Modification time, nanosecond precision.
    pub fn mtime(&self) -> SystemTime {
        self.mtime
    }

    /// Inode-change-time. `SystemTime::UNIX_EPOCH` means "unsupported or
    /// unreliable on this platform" (see DESIGN.md for the platform list).
    pub fn ctime(&self) -> SystemTime {
        self.ctime
    }

    /// `false` when [`ctime`](Self::ctime) is the zero sentinel.
    pub fn has_ctime(&self) -> bool {
        self.ctime != SystemTime::UNIX_EPOCH
    }

    /// The file mode (type + permissions).
    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// Owning user id.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Owning group id.
    pub fn gid(&self) -> u32 {
        self.gid
    }

    /// Convenience: `mode().is_dir()`.
    pub fn is_dir(&self) -> bool {
        self.mode.is_dir()
    }

    /// Convenience: `mode().is_file()`.
    pub fn is_file(&self) -> bool {
        self.mode.is_file()
    }

    /// Convenience: `mode().is_symlink()`.
    pub fn is_symlink(&self) -> bool {
        self.mode.is_symlink()
    }
}

/// Flags accepted by [`crate::FileSystem::open_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpenFlags {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the file if it does not exist.
    pub create: bool,
    /// Fail with [`crate::FsError::AlreadyExists`] if the file exists and
    /// `create` is set (exclusive creation).
    pub excl: bool,
    /// Truncate an existing file to zero length on open.
    pub truncate: bool,
    /// All writes go to the end of the file regardless of the current
    /// offset.
    pub append: bool,
}

impl OpenFlags {
    /// Read-only, the file must already exist.
    pub const READ: Self = OpenFlags {
        read: true,
        write: false,
        create: false,
        excl: false,
        truncate: false,
        append: false,
    };

    /// Write-only, truncating, creating if absent.
    pub const WRITE: Self = OpenFlags {
        read: false,
        write: true,
        create: true,
        excl: false,
        truncate: true,
        append: false,
    };

    /// Read and write, creating if absent, not truncating.
    pub const READ_WRITE: Self = OpenFlags {
        read: true,
        write: true,
        create: true,
        excl: false,
        truncate: false,
        append: false,
    };

    /// Write-only, append-only, creating if absent.
    pub const APPEND: Self = OpenFlags {
        read: false,
        write: true,
        create: true,
        excl: false,
        truncate: false,
        append: true,
    };

    /// Write-only, failing if the file already exists.
    pub const CREATE_EXCL: Self = OpenFlags {
        read: false,
        write: true,
        create: true,
        excl: true,
        truncate: false,
        append: false,
    };
}

/// A single watch change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Path relative to the watch root.
    pub path: std::path::PathBuf,
    /// The classified change kind.
    pub kind: EventKind,
}

/// The classification of a watch [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// Create, modify, or attribute change; also the catch-all on platforms
    /// that can't distinguish removal from other changes.
    NonRemove,
    /// Unlink or rename-away, on platforms that can tell the difference.
    Remove,
}

/// `{total, free}` bytes, as returned by [`crate::FileSystem::usage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsageInfo {
    /// Total capacity in bytes.
    pub total: u64,
    /// Free capacity in bytes.
    pub free: u64,
}

/// A tag identifying the concrete kind of a backend or layer, used by
/// [`crate::FileSystem::unwrap_of_kind`] to probe a composed stack without
/// runtime reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// [`crate::backend::basic::BasicBackend`].
    Basic,
    /// [`crate::backend::fake::FakeBackend`].
    Fake,
    /// [`crate::walk::WalkLayer`].
    Walk,
    /// [`crate::case::CaseLayer`].
    Case,
    /// [`crate::mtime::MtimeLayer`].
    Mtime,
}

/// `(secs, nanos)` serialisation of [`SystemTime`], preserving full
/// nanosecond precision across `serde_json` round-trips (the default
/// timestamp formats most crates use truncate to milliseconds or seconds,
/// which would silently defeat MtimeLayer's whole purpose).
#[cfg(feature = "serde")]
pub(crate) mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let duration = time
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        (duration.as_secs(), duration.subsec_nanos()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SystemTime, D::Error> {
        let (secs, nanos): (u64, u32) = Deserialize::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::new(secs, nanos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_mode_round_trips_kind_and_perm() {
        let mode = FileMode::new(FileKind::Directory, 0o755);
        assert_eq!(mode.kind(), FileKind::Directory);
        assert_eq!(mode.permissions(), 0o755);
        assert!(mode.is_dir());
        assert!(!mode.is_file());
    }

    #[test]
    fn file_mode_from_bits_recovers_kind() {
        let mode = FileMode::new(FileKind::Symlink, 0o777);
        let round_tripped = FileMode::from_bits(mode.bits());
        assert_eq!(round_tripped.kind(), FileKind::Symlink);
        assert_eq!(round_tripped.permissions(), 0o777);
    }

    #[test]
    fn default_file_and_dir_modes() {
        assert!(FileMode::default_file().is_file());
        assert!(FileMode::default_dir().is_dir());
    }

    #[test]
    fn file_info_with_mtime_only_changes_mtime() {
        let info = FileInfo::new(
            "f",
            10,
            SystemTime::UNIX_EPOCH,
            SystemTime::UNIX_EPOCH,
            FileMode::default_file(),
            1,
            1,
        );
        let later = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(5);
        let overlaid = info.with_mtime(later);
        assert_eq!(overlaid.mtime(), later);
        assert_eq!(overlaid.name(), info.name());
        assert_eq!(overlaid.size(), info.size());
    }

    #[test]
    fn file_info_has_ctime_false_for_zero_sentinel() {
        let info = FileInfo::new(
            "f",
            0,
            SystemTime::UNIX_EPOCH,
            SystemTime::UNIX_EPOCH,
            FileMode::default_file(),
            0,
            0,
        );
        assert!(!info.has_ctime());
    }

    #[test]
    fn open_flags_create_excl_fails_on_existing() {
        let flags = OpenFlags::CREATE_EXCL;
        assert!(flags.create);
        assert!(flags.excl);
        assert!(!flags.read);
    }

    #[test]
    fn event_kind_equality() {
        assert_eq!(EventKind::NonRemove, EventKind::NonRemove);
        assert_ne!(EventKind::NonRemove, EventKind::Remove);
    }
}
