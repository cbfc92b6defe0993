//! # syncvfs-core
//!
//! A layered virtual filesystem core for a file-synchronisation engine: one
//! uniform [`FileSystem`] trait, two backends (an OS-backed
//! [`backend::basic::BasicBackend`] and an in-memory
//! [`backend::fake::FakeBackend`] for tests), and three composable wrapper
//! layers ([`walk::WalkLayer`], [`case::CaseLayer`], [`mtime::MtimeLayer`])
//! that a caller stacks with [`LayerExt::layer`].
//!
//! ---
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use syncvfs_core::{FileSystem, LayerExt};
//! use syncvfs_core::backend::basic::BasicBackend;
//! use syncvfs_core::case::CaseLayerBuilder;
//!
//! fn sync_root<B: FileSystem>(fs: &B) -> Result<(), syncvfs_core::FsError> {
//!     fs.mkdir_all(std::path::Path::new("archive/2024"), Default::default())?;
//!     let mut count = 0usize;
//!     fs.walk(std::path::Path::new("."), &mut |_path, _info| {
//!         count += 1;
//!         Ok(syncvfs_core::WalkAction::Continue)
//!     })?;
//!     Ok(())
//! }
//!
//! let backend = BasicBackend::new("/srv/data")?;
//! let fs = backend.layer(CaseLayerBuilder::default());
//! sync_root(&fs)?;
//! # Ok::<(), syncvfs_core::FsError>(())
//! ```
//!
//! ---
//!
//! ## Core Types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`FileSystem`] | the single trait every backend and layer implements |
//! | [`FileHandle`] | an open file: read/write/seek/truncate/stat |
//! | [`FsError`] | error type with path/operation context |
//! | [`FileInfo`] | immutable metadata snapshot |
//! | [`FileMode`] / [`FileKind`] | permission bits + type classifier |
//! | [`Event`] / [`EventKind`] | a single watch change notification |
//!
//! ---
//!
//! ## Layer Stack
//!
//! ```text
//! WalkLayer  (deterministic lexicographic traversal, §4.4)
//!     ↓
//! MtimeLayer (virtual-mtime overlay backed by a Database, §4.6)
//!     ↓
//! CaseLayer  (case-insensitive path resolution cache, §4.5)
//!     ↓
//! BasicBackend / FakeBackend  (§4.2 / §4.3)
//! ```
//!
//! Layers are generic over their inner [`FileSystem`] (no `Arc<dyn _>`
//! indirection) and compose with [`LayerExt::layer`]; see [`layer`] for the
//! composition machinery itself.
//!
//! ---
//!
//! ## Error Handling
//!
//! All operations return `Result<T, FsError>`. Errors carry the path and, for
//! permission failures, the operation that was denied:
//!
//! ```rust
//! use syncvfs_core::FsError;
//! use std::path::PathBuf;
//!
//! let err = FsError::NotFound { path: PathBuf::from("/missing.txt") };
//! assert_eq!(err.to_string(), "path not found: /missing.txt");
//!
//! let err = FsError::PermissionDenied {
//!     path: PathBuf::from("/secret"),
//!     operation: "read",
//! };
//! assert_eq!(err.to_string(), "permission denied: /secret (read)");
//! ```
//!
//! ---
//!
//! ## Thread Safety
//!
//! Every [`FileSystem`], [`Database`] and [`IgnoreMatcher`] implementation is
//! `Send + Sync`. Methods take `&self`; backends and layers manage their own
//! interior mutability, so a stack can be shared across threads behind an
//! `Arc` without an external lock.
//!
//! ---
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | Enable serialization for [`FileInfo`], [`Event`], [`UsageInfo`], etc. |
//!
//! ---
//!
//! ## Crate Organization
//!
//! - [`fs_trait`] — the [`FileSystem`] contract itself.
//! - [`backend`] — concrete backends ([`backend::basic`], [`backend::fake`]).
//! - [`walk`], [`case`], [`mtime`] — the three wrapper layers.
//! - [`watch_service`] — the shared OS-watch multiplexing/overflow machinery
//!   [`backend::basic::BasicBackend::watch`] delegates to.
//! - [`database`], [`ignore`] — pluggable external collaborators (§6).
//! - [`temp_name`] — long-path-safe temp-file naming for staged writes.
//! - [`error`], [`types`], [`path`], [`handle`], [`cancel`] — shared
//!   infrastructure.

// Private modules
mod backend;
mod cancel;
mod case;
mod database;
mod error;
mod fs_trait;
mod handle;
mod ignore;
mod layer;
mod mtime;
mod path;
mod tempname;
mod types;
mod walk;
mod watch_service;

// Public re-exports - error types
pub use error::FsError;

// Public re-exports - core types
pub use types::{Event, EventKind, FileInfo, FileKind, FileMode, LayerKind, OpenFlags, UsageInfo};

// Public re-exports - the filesystem contract
pub use fs_trait::{ErrorStream, EventStream, FileSystem, WalkAction, WalkCallback, WalkEntryResult};

// Public re-exports - file handles
pub use handle::FileHandle;

// Public re-exports - layer composition
pub use layer::{Layer, LayerExt};

// Public re-exports - cancellation
pub use cancel::{CancelHandle, CancelToken};

// Public re-exports - external collaborators
pub use database::{Database, MemoryDatabase};
pub use ignore::{IgnoreMatcher, NoopIgnore, PrefixIgnore};

// Public re-exports - path canonicalisation helpers
pub use path::{canonicalize_relative, join_within_root};

// Public re-exports - backends and layers, as modules (concrete types are
// reached via their module path, e.g. `syncvfs_core::backend::basic::BasicBackend`,
// mirroring how each layer groups its builder with its runtime type).
pub use backend::basic;
pub use backend::fake;
pub use case::{CaseLayer, CaseLayerBuilder, CaseRegistry};
pub use mtime::{MtimeLayer, MtimeLayerBuilder};
pub use walk::{WalkLayer, WalkLayerBuilder};

// Public re-exports - long-path-safe temp-file naming
pub use tempname::{temp_name, MAX_TEMP_NAME_LEN};
