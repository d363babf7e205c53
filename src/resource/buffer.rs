//! Transient GPU buffers, for example for intermediate compute results.

use anyhow::Result;
use bitflags::bitflags;

use crate::backend::{BufferHandle, ResourceAllocator};
use crate::resource::{ResourceKind, UsageFlags};

bitflags! {
    /// How a buffer is accessed by a pass.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const VERTEX = 0x01;
        const INDEX = 0x02;
        const UNIFORM = 0x04;
        const STORAGE = 0x08;
        const TRANSFER_SRC = 0x10;
        const TRANSFER_DST = 0x20;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

impl UsageFlags for BufferUsage {}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BufferDescriptor {
    /// Size in bytes.
    pub size: u64,
}

/// A byte range inside a parent buffer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct BufferSubResourceDescriptor {
    pub offset: u64,
    pub size: u64,
}

/// A concrete buffer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Buffer {
    pub handle: BufferHandle,
}

impl ResourceKind for Buffer {
    type Descriptor = BufferDescriptor;
    type SubResourceDescriptor = BufferSubResourceDescriptor;
    type Usage = BufferUsage;

    fn create(allocator: &mut dyn ResourceAllocator, name: &str, descriptor: &BufferDescriptor, usage: BufferUsage) -> Result<Self> {
        let handle = allocator.create_buffer(name, descriptor, usage)?;
        Ok(Buffer {
            handle,
        })
    }

    fn destroy(self, allocator: &mut dyn ResourceAllocator) {
        if !self.handle.is_null() {
            allocator.destroy_buffer(self.handle);
        }
    }
}
