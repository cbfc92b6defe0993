//! An in-memory [`crate::FileSystem`] backend for tests and embedders that
//! don't want real disk I/O (§4.3).
//!
//! Configurable through a `fake://` URI: `insens=1` makes lookups
//! case-insensitive (first-write spelling wins and is what `dir_names`
//! reports back), `content=1` fills pre-seeded files with deterministic
//! pseudo-random bytes instead of leaving them empty, `files=N` pre-seeds
//! `N` files at the root, `latency=<ms>` sleeps that long before every
//! operation to simulate a slow backend.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::cancel::CancelToken;
use crate::path::canonicalize_relative;
use crate::{
    ErrorStream, EventStream, FileHandle, FileInfo, FileKind, FileMode, FsError, IgnoreMatcher,
    LayerKind, OpenFlags, UsageInfo, WalkAction, WalkCallback,
};

/// Metadata shared between a tree node and any open handle onto it.
#[derive(Clone)]
struct NodeMeta {
    mtime: SystemTime,
    ctime: SystemTime,
    mode: FileMode,
    uid: u32,
    gid: u32,
}

impl NodeMeta {
    fn now(mode: FileMode) -> Self {
        let now = SystemTime::now();
        NodeMeta {
            mtime: now,
            ctime: now,
            mode,
            uid: 0,
            gid: 0,
        }
    }
}

enum NodeKind {
    File(Arc<Mutex<Vec<u8>>>),
    Dir(Vec<(String, Node)>),
    Symlink(String),
}

struct Node {
    meta: Arc<Mutex<NodeMeta>>,
    kind: NodeKind,
}

impl Node {
    fn new_dir() -> Self {
        Node {
            meta: Arc::new(Mutex::new(NodeMeta::now(FileMode::default_dir()))),
            kind: NodeKind::Dir(Vec::new()),
        }
    }

    fn children(&self) -> Option<&[(String, Node)]> {
        match &self.kind {
            NodeKind::Dir(children) => Some(children),
            _ => None,
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<(String, Node)>> {
        match &mut self.kind {
            NodeKind::Dir(children) => Some(children),
            _ => None,
        }
    }

    fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::File(content) => content.lock().unwrap().len() as u64,
            _ => 0,
        }
    }
}

/// Runtime configuration parsed from a `fake://` URI; see the module docs.
#[derive(Debug, Clone)]
pub struct FakeBackendConfig {
    /// Lookups ignore case; the first spelling written for a name is the
    /// one `dir_names` reports back.
    pub case_insensitive: bool,
    /// Pre-seeded files get deterministic pseudo-random content instead of
    /// being left empty.
    pub synthesize_content: bool,
    /// How many files to pre-seed at the root on construction.
    pub preseed_files: usize,
    /// Artificial per-operation delay, for simulating a slow backend.
    pub latency: Duration,
}

impl Default for FakeBackendConfig {
    fn default() -> Self {
        FakeBackendConfig {
            case_insensitive: false,
            synthesize_content: false,
            preseed_files: 0,
            latency: Duration::ZERO,
        }
    }
}

/// An in-memory filesystem. Cheap to construct, entirely process-local.
pub struct FakeBackend {
    config: FakeBackendConfig,
    root: RwLock<Node>,
}

impl FakeBackend {
    /// An empty backend with default configuration (case-sensitive, no
    /// pre-seeded content, no latency).
    pub fn new() -> Self {
        FakeBackend::with_config(FakeBackendConfig::default())
    }

    /// An empty backend with the given configuration, pre-seeding files per
    /// `config.preseed_files`.
    pub fn with_config(config: FakeBackendConfig) -> Self {
        let backend = FakeBackend {
            config,
            root: RwLock::new(Node::new_dir()),
        };
        backend.preseed();
        backend
    }

    /// Parse a `fake://` URI's query parameters into a [`FakeBackendConfig`]
    /// and construct the resulting backend.
    ///
    /// Recognised parameters: `insens`, `content`, `files`, `latency`
    /// (milliseconds). Unknown parameters are ignored.
    pub fn from_uri(uri: &str) -> Result<Self, FsError> {
        let parsed = url::Url::parse(uri).map_err(|err| FsError::InvalidData {
            context: format!("invalid fake backend URI {uri:?}: {err}"),
        })?;

        let mut config = FakeBackendConfig::default();
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "insens" => config.case_insensitive = parse_bool(&value),
                "content" => config.synthesize_content = parse_bool(&value),
                "files" => config.preseed_files = value.parse().unwrap_or(0),
                "latency" => {
                    config.latency = Duration::from_millis(value.parse().unwrap_or(0));
                }
                _ => {}
            }
        }

        Ok(FakeBackend::with_config(config))
    }

    fn preseed(&self) {
        if self.config.preseed_files == 0 {
            return;
        }
        let mut root = self.root.write().unwrap();
        let children = root.children_mut().expect("fresh root is always a dir");
        for index in 0..self.config.preseed_files {
            let name = format!("file{index}");
            let content = if self.config.synthesize_content {
                deterministic_content(index as u64, (index + 1) * 256)
            } else {
                Vec::new()
            };
            children.push((
                name,
                Node {
                    meta: Arc::new(Mutex::new(NodeMeta::now(FileMode::default_file()))),
                    kind: NodeKind::File(Arc::new(Mutex::new(content))),
                },
            ));
        }
    }

    fn delay(&self) {
        if !self.config.latency.is_zero() {
            std::thread::sleep(self.config.latency);
        }
    }

    fn components(&self, name: &Path) -> Result<Vec<String>, FsError> {
        let relative = canonicalize_relative(name)?;
        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect())
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        FakeBackend::new()
    }
}

fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn deterministic_content(seed: u64, size: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buf = vec![0u8; size];
    rng.fill_bytes(&mut buf);
    buf
}

fn find_child(children: &[(String, Node)], name: &str, insens: bool) -> Option<usize> {
    children.iter().position(|(candidate, _)| {
        if insens {
            candidate.eq_ignore_ascii_case(name)
        } else {
            candidate == name
        }
    })
}

fn find<'a>(
    node: &'a Node,
    components: &[String],
    insens: bool,
    full_path: &Path,
) -> Result<&'a Node, FsError> {
    if components.is_empty() {
        return Ok(node);
    }
    let children = node.children().ok_or_else(|| FsError::NotADirectory {
        path: full_path.to_path_buf(),
    })?;
    let idx = find_child(children, &components[0], insens).ok_or_else(|| FsError::NotFound {
        path: full_path.to_path_buf(),
    })?;
    find(&children[idx].1, &components[1..], insens, full_path)
}

fn find_mut<'a>(
    node: &'a mut Node,
    components: &[String],
    insens: bool,
    full_path: &Path,
) -> Result<&'a mut Node, FsError> {
    if components.is_empty() {
        return Ok(node);
    }
    let children = node.children_mut().ok_or_else(|| FsError::NotADirectory {
        path: full_path.to_path_buf(),
    })?;
    let idx = find_child(children, &components[0], insens).ok_or_else(|| FsError::NotFound {
        path: full_path.to_path_buf(),
    })?;
    find_mut(&mut children[idx].1, &components[1..], insens, full_path)
}

fn node_to_file_info(node: &Node, name: &str) -> FileInfo {
    let meta = node.meta.lock().unwrap();
    FileInfo::new(
        name,
        node.size(),
        meta.mtime,
        meta.ctime,
        meta.mode,
        meta.uid,
        meta.gid,
    )
}

fn basename_of(components: &[String]) -> String {
    components.last().cloned().unwrap_or_default()
}

/// An open handle onto a [`FakeBackend`] file. Holds its own cursor and
/// shared references to the node's content/metadata, so the handle stays
/// valid even if the file is later renamed or unlinked out from under it
/// (matching POSIX unlink-while-open semantics).
pub struct FakeFileHandle {
    content: Arc<Mutex<Vec<u8>>>,
    meta: Arc<Mutex<NodeMeta>>,
    path: PathBuf,
    cursor: u64,
    append: bool,
}

impl FileHandle for FakeFileHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        let n = self.read_at(buf, self.cursor)?;
        self.cursor += n as u64;
        Ok(n)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<usize, FsError> {
        let content = self.content.lock().unwrap();
        let offset = offset as usize;
        if offset >= content.len() {
            return Ok(0);
        }
        let available = &content[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, FsError> {
        let offset = if self.append {
            self.content.lock().unwrap().len() as u64
        } else {
            self.cursor
        };
        let n = self.write_at(data, offset)?;
        self.cursor = offset + n as u64;
        Ok(n)
    }

    fn write_at(&self, data: &[u8], offset: u64) -> Result<usize, FsError> {
        let mut content = self.content.lock().unwrap();
        let offset = offset as usize;
        if content.len() < offset + data.len() {
            content.resize(offset + data.len(), 0);
        }
        content[offset..offset + data.len()].copy_from_slice(data);
        drop(content);
        self.meta.lock().unwrap().mtime = SystemTime::now();
        Ok(data.len())
    }

    fn seek(&mut self, pos: std::io::SeekFrom) -> Result<u64, FsError> {
        let len = self.content.lock().unwrap().len() as u64;
        let new_cursor = match pos {
            std::io::SeekFrom::Start(offset) => offset,
            std::io::SeekFrom::End(delta) => (len as i64 + delta).max(0) as u64,
            std::io::SeekFrom::Current(delta) => (self.cursor as i64 + delta).max(0) as u64,
        };
        self.cursor = new_cursor;
        Ok(self.cursor)
    }

    fn truncate(&mut self, size: u64) -> Result<(), FsError> {
        self.content.lock().unwrap().resize(size as usize, 0);
        self.meta.lock().unwrap().mtime = SystemTime::now();
        Ok(())
    }

    fn sync(&self) -> Result<(), FsError> {
        Ok(())
    }

    fn stat(&self) -> Result<FileInfo, FsError> {
        let meta = self.meta.lock().unwrap();
        let size = self.content.lock().unwrap().len() as u64;
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(FileInfo::new(
            name, size, meta.mtime, meta.ctime, meta.mode, meta.uid, meta.gid,
        ))
    }

    fn name(&self) -> &Path {
        &self.path
    }

    fn close(self: Box<Self>) -> Result<(), FsError> {
        Ok(())
    }
}

impl crate::FileSystem for FakeBackend {
    fn chmod(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.delay();
        let components = self.components(name)?;
        let root = self.root.read().unwrap();
        let node = find(&root, &components, self.config.case_insensitive, name)?;
        let old_kind = node.meta.lock().unwrap().mode.kind();
        node.meta.lock().unwrap().mode = FileMode::new(old_kind, mode.permissions());
        Ok(())
    }

    fn chtimes(&self, name: &Path, _atime: SystemTime, mtime: SystemTime) -> Result<(), FsError> {
        self.delay();
        let components = self.components(name)?;
        let root = self.root.read().unwrap();
        let node = find(&root, &components, self.config.case_insensitive, name)?;
        node.meta.lock().unwrap().mtime = mtime;
        Ok(())
    }

    fn lchown(&self, name: &Path, owner_id: u32, group_id: u32) -> Result<(), FsError> {
        self.delay();
        let components = self.components(name)?;
        let root = self.root.read().unwrap();
        let node = find(&root, &components, self.config.case_insensitive, name)?;
        let mut meta = node.meta.lock().unwrap();
        meta.uid = owner_id;
        meta.gid = group_id;
        Ok(())
    }

    fn create(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        self.open_file(
            name,
            OpenFlags {
                read: true,
                write: true,
                create: true,
                excl: false,
                truncate: true,
                append: false,
            },
            FileMode::default_file(),
        )
    }

    fn open(&self, name: &Path) -> Result<Box<dyn FileHandle>, FsError> {
        self.open_file(name, OpenFlags::READ, FileMode::default_file())
    }

    fn open_file(
        &self,
        name: &Path,
        flags: OpenFlags,
        mode: FileMode,
    ) -> Result<Box<dyn FileHandle>, FsError> {
        self.delay();
        let components = self.components(name)?;
        if components.is_empty() {
            return Err(FsError::NotAFile {
                path: name.to_path_buf(),
            });
        }
        let (parent_components, basename_slice) = components.split_at(components.len() - 1);
        let basename = basename_slice[0].clone();

        let mut root = self.root.write().unwrap();
        let parent = find_mut(&mut root, parent_components, self.config.case_insensitive, name)?;
        let children = parent.children_mut().ok_or_else(|| FsError::NotADirectory {
            path: name.to_path_buf(),
        })?;

        let idx = find_child(children, &basename, self.config.case_insensitive);
        let (content, meta) = match idx {
            Some(i) => {
                if flags.create && flags.excl {
                    return Err(FsError::AlreadyExists {
                        path: name.to_path_buf(),
                    });
                }
                match &children[i].1.kind {
                    NodeKind::File(content) => {
                        if flags.truncate {
                            content.lock().unwrap().clear();
                        }
                        (Arc::clone(content), Arc::clone(&children[i].1.meta))
                    }
                    _ => {
                        return Err(FsError::NotAFile {
                            path: name.to_path_buf(),
                        })
                    }
                }
            }
            None => {
                if !flags.create {
                    return Err(FsError::NotFound {
                        path: name.to_path_buf(),
                    });
                }
                let content = Arc::new(Mutex::new(Vec::new()));
                let meta = Arc::new(Mutex::new(NodeMeta::now(mode)));
                children.push((
                    basename,
                    Node {
                        meta: Arc::clone(&meta),
                        kind: NodeKind::File(Arc::clone(&content)),
                    },
                ));
                (content, meta)
            }
        };

        Ok(Box::new(FakeFileHandle {
            content,
            meta,
            path: name.to_path_buf(),
            cursor: 0,
            append: flags.append,
        }))
    }

    fn mkdir(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.delay();
        let components = self.components(name)?;
        if components.is_empty() {
            return Err(FsError::AlreadyExists {
                path: name.to_path_buf(),
            });
        }
        let (parent_components, basename_slice) = components.split_at(components.len() - 1);
        let basename = basename_slice[0].clone();

        let mut root = self.root.write().unwrap();
        let parent = find_mut(&mut root, parent_components, self.config.case_insensitive, name)?;
        let children = parent.children_mut().ok_or_else(|| FsError::NotADirectory {
            path: name.to_path_buf(),
        })?;

        if find_child(children, &basename, self.config.case_insensitive).is_some() {
            return Err(FsError::AlreadyExists {
                path: name.to_path_buf(),
            });
        }

        let mut dir = Node::new_dir();
        dir.meta = Arc::new(Mutex::new(NodeMeta::now(mode)));
        children.push((basename, dir));
        Ok(())
    }

    fn mkdir_all(&self, name: &Path, mode: FileMode) -> Result<(), FsError> {
        self.delay();
        let components = self.components(name)?;
        let mut root = self.root.write().unwrap();
        let mut current = &mut *root;
        for component in &components {
            let children = current.children_mut().ok_or_else(|| FsError::NotADirectory {
                path: name.to_path_buf(),
            })?;
            let idx = match find_child(children, component, self.config.case_insensitive) {
                Some(idx) => idx,
                None => {
                    let mut dir = Node::new_dir();
                    dir.meta = Arc::new(Mutex::new(NodeMeta::now(mode)));
                    children.push((component.clone(), dir));
                    children.len() - 1
                }
            };
            current = &mut children[idx].1;
            if current.children().is_none() {
                return Err(FsError::NotADirectory {
                    path: name.to_path_buf(),
                });
            }
        }
        Ok(())
    }

    fn remove(&self, name: &Path) -> Result<(), FsError> {
        self.delay();
        let components = self.components(name)?;
        if components.is_empty() {
            return Err(FsError::NotFound {
                path: name.to_path_buf(),
            });
        }
        let (parent_components, basename_slice) = components.split_at(components.len() - 1);
        let basename = &basename_slice[0];

        let mut root = self.root.write().unwrap();
        let parent = find_mut(&mut root, parent_components, self.config.case_insensitive, name)?;
        let children = parent.children_mut().ok_or_else(|| FsError::NotADirectory {
            path: name.to_path_buf(),
        })?;
        let idx = find_child(children, basename, self.config.case_insensitive).ok_or_else(|| {
            FsError::NotFound {
                path: name.to_path_buf(),
            }
        })?;

        if let NodeKind::Dir(grandchildren) = &children[idx].1.kind {
            if !grandchildren.is_empty() {
                return Err(FsError::NotEmpty {
                    path: name.to_path_buf(),
                });
            }
        }
        children.remove(idx);
        Ok(())
    }

    fn remove_all(&self, name: &Path) -> Result<(), FsError> {
        self.delay();
        let components = self.components(name)?;
        if components.is_empty() {
            let mut root = self.root.write().unwrap();
            if let Some(children) = root.children_mut() {
                children.clear();
            }
            return Ok(());
        }
        let (parent_components, basename_slice) = components.split_at(components.len() - 1);
        let basename = &basename_slice[0];

        let mut root = self.root.write().unwrap();
        let parent = match find_mut(&mut root, parent_components, self.config.case_insensitive, name) {
            Ok(parent) => parent,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        let children = parent.children_mut().ok_or_else(|| FsError::NotADirectory {
            path: name.to_path_buf(),
        })?;
        if let Some(idx) = find_child(children, basename, self.config.case_insensitive) {
            children.remove(idx);
        }
        Ok(())
    }

    fn rename(&self, old: &Path, new: &Path) -> Result<(), FsError> {
        self.delay();
        let old_components = self.components(old)?;
        let new_components = self.components(new)?;
        if old_components.is_empty() || new_components.is_empty() {
            return Err(FsError::NotFound {
                path: old.to_path_buf(),
            });
        }

        let mut root = self.root.write().unwrap();

        let (old_parent_components, old_basename_slice) =
            old_components.split_at(old_components.len() - 1);
        let old_basename = &old_basename_slice[0];
        let moved = {
            let old_parent =
                find_mut(&mut root, old_parent_components, self.config.case_insensitive, old)?;
            let old_children = old_parent.children_mut().ok_or_else(|| FsError::NotADirectory {
                path: old.to_path_buf(),
            })?;
            let idx = find_child(old_children, old_basename, self.config.case_insensitive)
                .ok_or_else(|| FsError::NotFound {
                    path: old.to_path_buf(),
                })?;
            old_children.remove(idx).1
        };

        let (new_parent_components, new_basename_slice) =
            new_components.split_at(new_components.len() - 1);
        let new_basename = new_basename_slice[0].clone();
        let new_parent =
            find_mut(&mut root, new_parent_components, self.config.case_insensitive, new)?;
        let new_children = new_parent.children_mut().ok_or_else(|| FsError::NotADirectory {
            path: new.to_path_buf(),
        })?;

        if let Some(existing_idx) =
            find_child(new_children, &new_basename, self.config.case_insensitive)
        {
            if let NodeKind::Dir(grandchildren) = &new_children[existing_idx].1.kind {
                if !grandchildren.is_empty() {
                    return Err(FsError::NotEmpty {
                        path: new.to_path_buf(),
                    });
                }
            }
            new_children[existing_idx] = (new_basename, moved);
        } else {
            new_children.push((new_basename, moved));
        }
        Ok(())
    }

    fn stat(&self, name: &Path) -> Result<FileInfo, FsError> {
        self.delay();
        let components = self.components(name)?;
        let root = self.root.read().unwrap();
        let node = find(&root, &components, self.config.case_insensitive, name)?;
        if let NodeKind::Symlink(target) = &node.kind {
            let target_components = self.components(Path::new(target))?;
            let resolved = find(&root, &target_components, self.config.case_insensitive, name)?;
            return Ok(node_to_file_info(resolved, &basename_of(&components)));
        }
        Ok(node_to_file_info(node, &basename_of(&components)))
    }

    fn lstat(&self, name: &Path) -> Result<FileInfo, FsError> {
        self.delay();
        let components = self.components(name)?;
        let root = self.root.read().unwrap();
        let node = find(&root, &components, self.config.case_insensitive, name)?;
        let basename = basename_of(&components);
        match &node.kind {
            NodeKind::Symlink(target) => {
                let meta = node.meta.lock().unwrap();
                Ok(FileInfo::new(
                    basename,
                    target.len() as u64,
                    meta.mtime,
                    meta.ctime,
                    FileMode::new(FileKind::Symlink, meta.mode.permissions()),
                    meta.uid,
                    meta.gid,
                ))
            }
            _ => Ok(node_to_file_info(node, &basename)),
        }
    }

    fn dir_names(&self, name: &Path) -> Result<Vec<String>, FsError> {
        self.delay();
        let components = self.components(name)?;
        let root = self.root.read().unwrap();
        let node = find(&root, &components, self.config.case_insensitive, name)?;
        let children = node.children().ok_or_else(|| FsError::NotADirectory {
            path: name.to_path_buf(),
        })?;
        Ok(children.iter().map(|(child_name, _)| child_name.clone()).collect())
    }

    fn read_symlink(&self, name: &Path) -> Result<String, FsError> {
        self.delay();
        let components = self.components(name)?;
        let root = self.root.read().unwrap();
        let node = find(&root, &components, self.config.case_insensitive, name)?;
        match &node.kind {
            NodeKind::Symlink(target) => Ok(target.clone()),
            _ => Err(FsError::NotASymlink {
                path: name.to_path_buf(),
            }),
        }
    }

    fn create_symlink(&self, target: &str, name: &Path) -> Result<(), FsError> {
        self.delay();
        let components = self.components(name)?;
        if components.is_empty() {
            return Err(FsError::AlreadyExists {
                path: name.to_path_buf(),
            });
        }
        let (parent_components, basename_slice) = components.split_at(components.len() - 1);
        let basename = basename_slice[0].clone();

        let mut root = self.root.write().unwrap();
        let parent = find_mut(&mut root, parent_components, self.config.case_insensitive, name)?;
        let children = parent.children_mut().ok_or_else(|| FsError::NotADirectory {
            path: name.to_path_buf(),
        })?;
        if find_child(children, &basename, self.config.case_insensitive).is_some() {
            return Err(FsError::AlreadyExists {
                path: name.to_path_buf(),
            });
        }
        children.push((
            basename,
            Node {
                meta: Arc::new(Mutex::new(NodeMeta::now(FileMode::new(
                    FileKind::Symlink,
                    0o777,
                )))),
                kind: NodeKind::Symlink(target.to_owned()),
            },
        ));
        Ok(())
    }

    fn hide(&self, _name: &Path) -> Result<(), FsError> {
        Ok(())
    }

    fn unhide(&self, _name: &Path) -> Result<(), FsError> {
        Ok(())
    }

    fn walk(&self, root: &Path, callback: &mut WalkCallback<'_>) -> Result<(), FsError> {
        crate::walk::walk_uncoordinated(self, root, callback)
    }

    fn watch(
        &self,
        _path: &Path,
        _ignore: Arc<dyn IgnoreMatcher>,
        _cancel: CancelToken,
        _ignore_perms: bool,
    ) -> Result<(EventStream, ErrorStream), FsError> {
        Err(FsError::Unsupported { operation: "watch" })
    }

    fn usage(&self, _name: &Path) -> Result<UsageInfo, FsError> {
        fn used_bytes(node: &Node) -> u64 {
            match &node.kind {
                NodeKind::File(content) => content.lock().unwrap().len() as u64,
                NodeKind::Dir(children) => children.iter().map(|(_, child)| used_bytes(child)).sum(),
                NodeKind::Symlink(_) => 0,
            }
        }
        const TOTAL: u64 = 1 << 40;
        let root = self.root.read().unwrap();
        let used = used_bytes(&root);
        Ok(UsageInfo {
            total: TOTAL,
            free: TOTAL.saturating_sub(used),
        })
    }

    fn roots(&self) -> Vec<PathBuf> {
        vec![PathBuf::from("/")]
    }

    fn symlinks_supported(&self) -> bool {
        true
    }

    fn unwrap_of_kind(&self, kind: LayerKind) -> Option<&dyn crate::FileSystem> {
        if kind == LayerKind::Fake {
            Some(self as &dyn crate::FileSystem)
        } else {
            None
        }
    }
}
