//! Resource kinds that can be scheduled by a frame graph.
//!
//! Every kind of resource the frame graph manages implements [`ResourceKind`]. This is a small capability contract:
//! a descriptor used to create the concrete resource, a descriptor for sub-resources (views) of it, a bitwise
//! combinable usage type, and a way to create and destroy the concrete object through a
//! [`ResourceAllocator`](crate::backend::ResourceAllocator).
//!
//! The crate provides [`Texture`](texture::Texture) and [`Buffer`](buffer::Buffer), but any type satisfying the
//! contract can be used with [`FrameGraph::create`](crate::graph::frame_graph::FrameGraph::create).

use std::fmt::Debug;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use anyhow::Result;

use crate::backend::ResourceAllocator;

pub mod buffer;
pub mod texture;

/// Bitwise combinable usage flags of a resource kind.
pub trait UsageFlags:
    Copy + Default + Debug + PartialEq + BitOr<Output = Self> + BitOrAssign + BitAnd<Output = Self> + 'static
{
    /// Returns true if every bit in `other` is also set in `self`.
    fn includes(self, other: Self) -> bool {
        (self & other) == other
    }
}

/// A kind of concrete GPU resource.
pub trait ResourceKind: Clone + Debug + 'static {
    /// Descriptor used to create the concrete resource.
    type Descriptor: Clone + Debug + 'static;
    /// Describes the part of a parent resource a sub-resource refers to.
    type SubResourceDescriptor: Clone + Debug + Default + 'static;
    /// How the resource is accessed.
    type Usage: UsageFlags;

    /// Create the concrete resource.
    /// # Errors
    /// Fails if the allocator cannot create the resource.
    fn create(allocator: &mut dyn ResourceAllocator, name: &str, descriptor: &Self::Descriptor, usage: Self::Usage) -> Result<Self>;

    /// Destroy the concrete resource.
    fn destroy(self, allocator: &mut dyn ResourceAllocator);
}
