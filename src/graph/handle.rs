//! Handles to virtual resources.
//!
//! A handle identifies a resource at a specific write generation. Every time a pass writes to a resource that
//! already has a writer, a new version is created and the old handle becomes stale. Always continue with the
//! handle returned from [`Builder::write`](crate::graph::frame_graph::Builder::write).

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Untyped handle to a virtual resource.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct FrameGraphHandle {
    pub(crate) index: u32,
    pub(crate) version: u32,
}

impl FrameGraphHandle {
    const UNINITIALIZED: u32 = u32::MAX;

    pub(crate) fn new(index: u32) -> Self {
        Self {
            index,
            version: 0,
        }
    }

    /// Returns false for default constructed handles and handles returned from failed operations.
    pub fn is_initialized(&self) -> bool {
        self.index != Self::UNINITIALIZED
    }

    /// Index of the resource slot this handle refers to.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Write generation of the resource this handle refers to.
    pub fn version(&self) -> u32 {
        self.version
    }
}

impl Default for FrameGraphHandle {
    fn default() -> Self {
        Self {
            index: Self::UNINITIALIZED,
            version: 0,
        }
    }
}

impl Debug for FrameGraphHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_initialized() {
            f.write_fmt(format_args!("#{}v{}", self.index, self.version))
        } else {
            f.write_str("#uninitialized")
        }
    }
}

/// Handle to a virtual resource of kind `R`.
pub struct FrameGraphId<R> {
    handle: FrameGraphHandle,
    _marker: PhantomData<fn() -> R>,
}

impl<R> FrameGraphId<R> {
    pub(crate) fn new(handle: FrameGraphHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    /// Get the untyped handle.
    pub fn handle(&self) -> FrameGraphHandle {
        self.handle
    }

    /// See [`FrameGraphHandle::is_initialized`].
    pub fn is_initialized(&self) -> bool {
        self.handle.is_initialized()
    }

    /// See [`FrameGraphHandle::version`].
    pub fn version(&self) -> u32 {
        self.handle.version
    }
}

impl<R> From<FrameGraphId<R>> for FrameGraphHandle {
    fn from(value: FrameGraphId<R>) -> Self {
        value.handle
    }
}

impl<R> Default for FrameGraphId<R> {
    fn default() -> Self {
        Self::new(FrameGraphHandle::default())
    }
}

impl<R> Clone for FrameGraphId<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for FrameGraphId<R> {}

impl<R> PartialEq for FrameGraphId<R> {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl<R> Eq for FrameGraphId<R> {}

impl<R> Hash for FrameGraphId<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.handle.hash(state)
    }
}

impl<R> Debug for FrameGraphId<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.handle, f)
    }
}
