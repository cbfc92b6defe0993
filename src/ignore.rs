//! The `ignore.Matcher` external collaborator (§6).
//!
//! [`WatchService`](crate::watch_service) and optionally backends consult an
//! [`IgnoreMatcher`] to drop events/entries for paths the surrounding
//! synchronisation engine doesn't care about. The crate does not own the
//! *policy* (gitignore-style pattern sets are an application concern) but
//! does ship the pass-through default and a minimal glob-set implementation
//! useful for tests and simple deployments.

use std::path::Path;

/// Pure, side-effect-free predicate consulted by [`WatchService`](crate::watch_service)
/// and [`crate::walk::WalkLayer`].
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` — `should_ignore` may be called
/// concurrently from watch threads.
pub trait IgnoreMatcher: Send + Sync {
    /// `true` if `rel_path` (relative to the watch/walk root) should be
    /// skipped entirely.
    fn should_ignore(&self, rel_path: &Path) -> bool;

    /// `true` if an ignored directory's children should also be skipped
    /// (as opposed to only the directory entry itself).
    fn skip_ignored_dirs(&self) -> bool;
}

/// The default matcher: ignores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIgnore;

impl IgnoreMatcher for NoopIgnore {
    fn should_ignore(&self, _rel_path: &Path) -> bool {
        false
    }

    fn skip_ignored_dirs(&self) -> bool {
        false
    }
}

/// A minimal matcher driven by a fixed set of exact relative-path prefixes.
///
/// This is not a gitignore-pattern engine (that belongs to the surrounding
/// synchronisation engine, per §6); it exists so tests and small embedders
/// don't need to write their own [`IgnoreMatcher`] just to exclude a `.git`
/// directory.
#[derive(Debug, Clone, Default)]
pub struct PrefixIgnore {
    prefixes: Vec<std::path::PathBuf>,
    skip_dirs: bool,
}

impl PrefixIgnore {
    /// Build a matcher over the given path prefixes.
    pub fn new(prefixes: impl IntoIterator<Item = std::path::PathBuf>, skip_dirs: bool) -> Self {
        PrefixIgnore {
            prefixes: prefixes.into_iter().collect(),
            skip_dirs,
        }
    }
}

impl IgnoreMatcher for PrefixIgnore {
    fn should_ignore(&self, rel_path: &Path) -> bool {
        self.prefixes.iter().any(|prefix| rel_path.starts_with(prefix))
    }

    fn skip_ignored_dirs(&self) -> bool {
        self.skip_dirs
    }
}
