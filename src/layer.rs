//! # Layer Composition
//!
//! Middleware-style composition for [`FileSystem`]: a caller builds a stack
//! `WalkLayer ⟶ MtimeLayer ⟶ CaseLayer ⟶ Backend` by repeatedly calling
//! `.layer(...)`, the same fluent pattern this crate's backend examples use
//! for logging/metrics/read-only wrappers.
//!
//! ```rust,ignore
//! use syncvfs_core::{FileSystem, LayerExt};
//! use syncvfs_core::backend::basic::BasicBackend;
//! use syncvfs_core::case::CaseLayerBuilder;
//! use syncvfs_core::mtime::MtimeLayerBuilder;
//! use syncvfs_core::walk::WalkLayerBuilder;
//!
//! let backend = BasicBackend::new("/srv/data")?;
//! let stack = backend
//!     .layer(CaseLayerBuilder::default())
//!     .layer(MtimeLayerBuilder::new(database))
//!     .layer(WalkLayerBuilder::default());
//! ```

use crate::FileSystem;

/// Turns an inner filesystem `B` into a wrapped filesystem that still
/// implements [`FileSystem`].
///
/// Implemented by each layer's *builder* type (e.g. `CaseLayerBuilder`),
/// not by the layer itself — the builder carries construction-time
/// configuration (cache TTL, database handle, …) and is consumed exactly
/// once per `.layer(...)` call.
pub trait Layer<B> {
    /// The concrete wrapped filesystem type this builder produces.
    type Backend: FileSystem;

    /// Consume the builder and the inner filesystem, producing the wrapped
    /// filesystem.
    fn layer(self, backend: B) -> Self::Backend;
}

/// Fluent `.layer(...)` chaining, blanket-implemented for every
/// [`FileSystem`].
pub trait LayerExt: FileSystem + Sized {
    /// Wrap `self` with `layer`, consuming both.
    fn layer<L: Layer<Self>>(self, layer: L) -> L::Backend {
        layer.layer(self)
    }
}

impl<B: FileSystem> LayerExt for B {}
