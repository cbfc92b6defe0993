//! `CaseLayer`: makes any backend behave case-sensitively via a cached
//! inverse-case lookup (§4.5).
//!
//! A backend running on a case-insensitive host (some desktop OSes) would
//! otherwise let "Foo" and "foo" collide. `CaseLayer` rejects any mutating
//! operation, and `stat`/`lstat`, whose given spelling doesn't match the
//! real on-disk spelling, and caches directory listings briefly so repeated
//! lookups down the same path don't re-list every component.

use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::cancel::CancelToken;
use crate::layer::Layer;
use crate::path::canonicalize_relative;
use crate::{
    ErrorStream, EventStream, FileHandle, FileInfo, FileMode, FileSystem, FsError, IgnoreMatcher,
    LayerKind, OpenFlags, UsageInfo, WalkCallback,
};

const CASE_CACHE_TIMEOUT: Duration = Duration::from_secs(1);
const CLEANER_TICK: Duration = Duration::from_secs(60);

/// Fold `s` for case-insensitive comparison: NFC-normalise, then
/// Unicode-aware lowercase. ASCII input short-circuits to a cheap
/// byte-wise lowercase.
pub(crate) fn fold_case(s: &str) -> String {
    if s.is_ascii() {
        return s.to_ascii_lowercase();
    }
    use unicode_normalization::UnicodeNormalization;
    s.nfc().collect::<String>().to_lowercase()
}

/// One node of the case-resolution cache tree, rooted at `"."`. Only
/// caches the single most recently followed child, which is enough to make
/// repeated access down the same deep path cheap without maintaining a
/// full per-directory map.
#[derive(Debug, Default)]
struct CaseNode {
    dir_names: Vec<String>,
    dir_names_lower: Vec<String>,
    expires: Option<Instant>,
    child: Option<(String, Box<CaseNode>)>,
}

impl CaseNode {
    fn empty() -> Self {
        CaseNode::default()
    }
}

fn resolve_one<B: FileSystem + ?Sized>(
    node: &mut CaseNode,
    backend: &B,
    accumulated: &Path,
    component: &str,
) -> Result<String, FsError> {
    let stale = match node.expires {
        Some(expires) => Instant::now() >= expires,
        None => true,
    };
    if stale {
        let names = backend.dir_names(accumulated)?;
        node.dir_names_lower = names.iter().map(|name| fold_case(name)).collect();
        node.dir_names = names;
        node.expires = Some(Instant::now() + CASE_CACHE_TIMEOUT);
        node.child = None;
    }

    if let Some((cached_name, _)) = &node.child {
        if cached_name == component {
            return Ok(cached_name.clone());
        }
    }

    if let Some(real) = node.dir_names.iter().find(|real| real.as_str() == component) {
        return Ok(real.clone());
    }

    let folded = fold_case(component);
    if let Some(idx) = node.dir_names_lower.iter().position(|lower| lower == &folded) {
        return Ok(node.dir_names[idx].clone());
    }

    Err(FsError::NotFound {
        path: accumulated.join(component),
    })
}

fn real_case_recursive<B: FileSystem + ?Sized>(
    node: &mut CaseNode,
    backend: &B,
    accumulated: &mut PathBuf,
    components: &[String],
) -> Result<(), FsError> {
    if components.is_empty() {
        return Ok(());
    }

    let real_name = resolve_one(node, backend, accumulated, &components[0])?;
    accumulated.push(&real_name);

    let reuse = matches!(&node.child, Some((cached, _)) if cached == &real_name);
    if !reuse {
        node.child = Some((real_name, Box::new(CaseNode::empty())));
    }
    let child = match &mut node.child {
        Some((_, child)) => child.as_mut(),
        None => unreachable!("just inserted"),
    };

    real_case_recursive(child, backend, accumulated, &components[1..])
}

fn split_components(path: &Path) -> Result<Vec<String>, FsError> {
    let relative = canonicalize_relative(path)?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect())
}

/// Builder that wraps an inner [`FileSystem`] with case-sensitivity
/// enforcement.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaseLayerBuilder;

impl<B: FileSystem> Layer<B> for CaseLayerBuilder {
    type Backend = CaseLayer<B>;

    fn layer(self, backend: B) -> CaseLayer<B> {
        CaseLayer {
            inner: backend,
            cache: RwLock::new(CaseNode::empty()),
        }
    }
}

/// A [`FileSystem`] wrapper that enforces case-sensitive semantics over a
/// backend that may itself be case-insensitive.
pub struct CaseLayer<B> {
    inner: B,
    cache: RwLock<CaseNode>,
}

impl<B: FileSystem> CaseLayer<B> {
    fn real_case(&self, name: &Path) -> Result<PathBuf, FsError> {
        let components = split_components(name)?;
        let mut accumulated = PathBuf::new();
        let mut root = self.cache.write().unwrap();
        real_case_recursive(&mut root, &self.inner, &mut accumulated, &components)?;
        Ok(accumulated)
    }

    fn drop_cache(&self) {
        *self.cache.write().unwrap() = CaseNode::empty();
    }

    /// Check that `name`'s spelling matches the on-disk real spelling. A
    /// path that doesn't exist yet is never a conflict (the caller is about
    /// to create it). A stale cache reporting `NotFound` right after a
    /// successful `lstat` is retried once after dropping the cache.
    fn check_case(&self, name: &Path) -> Result<(), FsError> {
        match self.inner.lstat(name) {
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
            Ok(_) => match self.real_case(name) {
                Ok(real) => self.compare_case(name, real),
                Err(err) if err.is_not_found() => {
                    self.drop_cache();
                    let real = self.real_case(name)?;
                    self.compare_case(name, real)
                }
                Err(err) => Err(err),
            },
        }
    }

    fn compare_case(&self, given: &Path, real: PathBuf) -> Result<(), FsError> {
        let canonical_given = canonicalize_relative(given)?;
        if real == canonical_given {
            Ok(())
        } else {
            Err(FsError::CaseConflict {
                given: given.to_path_buf(),
                real,
            })
        }
    }
}

impl<B: FileSystem> FileSystem for CaseLayer<B> {
    fn chmod(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.check_case(name)?;
        let result = self.inner.chmod(name, mode);
        self.drop_cache();
        result
    }

    fn chtimes(&self, name: &Path, atime: SystemTime, mtime: SystemTime) -> Result<(), FsError> {
        self.check_case(name)?;
        let result = self.inner.chtimes(name, atime, mtime);
        self.drop_cache();
        result
    }

    fn lchown(&self, name: &Path, owner_id: u32, group_id: u32) -> Result<(), FsError> {
        self.check_case(name)?;
        let result = self.inner.lchown(name, owner_id, group_id);
        self.drop_cache();
        result
    }

    fn create(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        self.check_case(name)?;
        let result = self.inner.create(name);
        self.drop_cache();
        result
    }

    fn open(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        self.check_case(name)?;
        self.inner.open(name)
    }

    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: FileMode,
    ) -> Result<Box<dyn FileHandle>, FsError> {
        self.check_case(name)?;
        let result = self.inner.open_file(name, flags, mode);
        if flags.create || flags.write {
            self.drop_cache();
        }
        result
    }

    fn mkdir(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.check_case(name)?;
        let result = self.inner.mkdir(name, mode);
        self.drop_cache();
        result
    }

    fn mkdir_all(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.check_case(name)?;
        let result = self.inner.mkdir_all(name, mode);
        self.drop_cache();
        result
    }

    fn remove(&self, name: &Path) -> Result<(), FsError> {
        self.check_case(name)?;
        let result = self.inner.remove(name);
        self.drop_cache();
        result
    }

    fn remove_all(&self, name: &Path) -> Result<(), FsError> {
        self.check_case(name)?;
        let result = self.inner.remove_all(name);
        self.drop_cache();
        result
    }

    fn rename(&self, old: &Path, new: &Path) -> Result<(), FsError> {
        self.check_case(old)?;
        self.check_case(new)?;
        let result = self.inner.rename(old, new);
        self.drop_cache();
        result
    }

    fn stat(&self, name: &Path) -> Result<FileInfo, FsError> {
        self.check_case(name)?;
        self.inner.stat(name)
    }

    fn lstat(&self, name: &Path) -> Result<FileInfo, FsError> {
        self.check_case(name)?;
        self.inner.lstat(name)
    }

    fn dir_names(&self, name: &Path) -> Result<Vec<String>, FsError> {
        self.inner.dir_names(name)
    }

    fn read_symlink(&self, name: &Path) -> Result<String, FsError> {
        self.inner.read_symlink(name)
    }

    fn create_symlink(&self, target: &str, name: &Path) -> Result<(), FsError> {
        self.check_case(name)?;
        let result = self.inner.create_symlink(target, name);
        self.drop_cache();
        result
    }

    fn hide(&self, name: &Path) -> Result<(), FsError> {
        self.check_case(name)?;
        self.inner.hide(name)
    }

    fn unhide(&self, name: &Path) -> Result<(), FsError> {
        self.check_case(name)?;
        self.inner.unhide(name)
    }

    fn walk(&self, root: &Path, callback: &mut WalkCallback<'_>) -> Result<(), FsError> {
        self.inner.walk(root, callback)
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
        if kind == LayerKind::Case {
            Some(self as &dyn FileSystem)
        } else {
            self.inner.unwrap_of_kind(kind)
        }
    }
    fn treats_junctions_as_directories(&self) -> bool {
        self.inner.treats_junctions_as_directories()
    }
}

/// Implemented by every `CaseLayer<B>` so the [`CaseRegistry`]'s cleaner
/// thread can invalidate caches without knowing `B`.
trait CacheDroppable: Send + Sync {
    fn drop_cache(&self);
}

impl<B: FileSystem> CacheDroppable for CaseLayer<B> {
    fn drop_cache(&self) {
        CaseLayer::drop_cache(self)
    }
}

struct RegistryEntry {
    any: Weak<dyn Any + Send + Sync>,
    droppable: Weak<dyn CacheDroppable>,
}

/// Memoises one [`CaseLayer`] per `(fs_type, uri)` pair so concurrent
/// callers opening the "same" backend share a cache, and periodically
/// drops every registered layer's cache to bound memory on long-lived
/// processes.
///
/// Explicitly constructed (never a hidden global); its background cleaner
/// thread exits on its own once the registry is dropped.
pub struct CaseRegistry {
    entries: Mutex<HashMap<(&'static str, String), RegistryEntry>>,
}

impl CaseRegistry {
    /// Construct a fresh registry and start its background cleaner.
    pub fn new() -> Arc<Self> {
        let registry = Arc::new(CaseRegistry {
            entries: Mutex::new(HashMap::new()),
        });
        registry.spawn_cleaner();
        registry
    }

    fn spawn_cleaner(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        thread::spawn(move || loop {
            thread::sleep(CLEANER_TICK);
            let Some(registry) = weak.upgrade() else {
                return;
            };
            let mut entries = registry.entries.lock().unwrap();
            entries.retain(|_, entry| match entry.droppable.upgrade() {
                Some(layer) => {
                    layer.drop_cache();
                    true
                }
                None => false,
            });
        });
    }

    /// Return the existing `CaseLayer<B>` registered for `(fs_type, uri)`,
    /// or build and register a new one via `create`.
    pub fn get_or_create<B, F>(self: &Arc<Self>, fs_type: &'static str, uri: &str, create: F) -> Arc<CaseLayer<B>>
    where
        B: FileSystem + 'static,
        F: FnOnce() -> CaseLayer<B>,
    {
        let key = (fs_type, uri.to_owned());
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.get(&key) {
            if let Some(existing) = entry.any.upgrade() {
                if let Ok(layer) = existing.downcast::<CaseLayer<B>>() {
                    return layer;
                }
            }
        }

        let layer = Arc::new(create());
        let any_arc: Arc<dyn Any + Send + Sync> = layer.clone();
        let droppable_arc: Arc<dyn CacheDroppable> = layer.clone();
        entries.insert(
            key,
            RegistryEntry {
                any: Arc::downgrade(&any_arc),
                droppable: Arc::downgrade(&droppable_arc),
            },
        );
        layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{FakeBackend, FakeBackendConfig};
    use crate::layer::LayerExt;

    fn insensitive_backend() -> FakeBackend {
        FakeBackend::with_config(FakeBackendConfig {
            case_insensitive: true,
            ..FakeBackendConfig::default()
        })
    }

    #[test]
    fn stat_with_exact_case_succeeds() {
        let fs = insensitive_backend().layer(CaseLayerBuilder);
        fs.mkdir(Path::new("Docs"), FileMode::default_dir()).unwrap();
        assert!(fs.stat(Path::new("Docs")).unwrap().is_dir());
    }

    #[test]
    fn stat_with_wrong_case_reports_real_spelling() {
        let fs = insensitive_backend().layer(CaseLayerBuilder);
        fs.mkdir(Path::new("Docs"), FileMode::default_dir()).unwrap();

        let err = fs.stat(Path::new("docs")).unwrap_err();
        match err {
            FsError::CaseConflict { given, real } => {
                assert_eq!(given, PathBuf::from("docs"));
                assert_eq!(real, PathBuf::from("Docs"));
            }
            other => panic!("expected CaseConflict, got {other:?}"),
        }
    }

    #[test]
    fn create_on_nonexistent_path_is_never_a_conflict() {
        let fs = insensitive_backend().layer(CaseLayerBuilder);
        fs.create(Path::new("Fresh.txt")).unwrap();
        assert!(fs.stat(Path::new("Fresh.txt")).is_ok());
    }

    #[test]
    fn mutation_invalidates_cache_for_nested_path() {
        let fs = insensitive_backend().layer(CaseLayerBuilder);
        fs.mkdir_all(Path::new("A/B"), FileMode::default_dir()).unwrap();
        fs.stat(Path::new("A/B")).unwrap();
        fs.rename(Path::new("A/B"), Path::new("A/C")).unwrap();
        assert!(fs.stat(Path::new("A/C")).is_ok());
    }

    #[test]
    fn fold_case_handles_kelvin_sign() {
        assert_eq!(fold_case("\u{212A}"), "k");
    }

    #[test]
    fn registry_shares_cache_for_same_key() {
        let registry = CaseRegistry::new();
        let backend = insensitive_backend();
        let layer_a = registry.get_or_create("fake", "fake://shared", || {
            CaseLayerBuilder.layer(backend)
        });
        layer_a.mkdir(Path::new("x"), FileMode::default_dir()).unwrap();

        let layer_b: Arc<CaseLayer<FakeBackend>> = registry.get_or_create("fake", "fake://shared", || {
            unreachable!("first call already registered this key")
        });
        assert!(Arc::ptr_eq(&layer_a, &layer_b));
    }
}
