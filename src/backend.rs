//! Interfaces the frame graph uses to talk to the GPU backend.
//!
//! The frame graph never creates GPU objects itself. It calls into a [`ResourceAllocator`] when a resource
//! must come into existence or can be released, and it uses a [`Driver`] to annotate and flush the command stream.
//! Concrete objects are referred to through opaque, typed [`Handle`]s.

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use anyhow::Result;
use ash::vk;
use bitflags::bitflags;

use crate::resource::buffer::{BufferDescriptor, BufferUsage};
use crate::resource::texture::{TextureDescriptor, TextureUsage};

/// Marker type for texture handles.
#[derive(Debug)]
pub enum HwTexture {}
/// Marker type for buffer handles.
#[derive(Debug)]
pub enum HwBuffer {}
/// Marker type for render target handles.
#[derive(Debug)]
pub enum HwRenderTarget {}

/// Opaque handle to a concrete backend object.
pub struct Handle<T> {
    id: u32,
    _marker: PhantomData<fn() -> T>,
}

/// Handle to a concrete texture.
pub type TextureHandle = Handle<HwTexture>;
/// Handle to a concrete buffer.
pub type BufferHandle = Handle<HwBuffer>;
/// Handle to a concrete render target.
pub type RenderTargetHandle = Handle<HwRenderTarget>;

impl<T> Handle<T> {
    const NULL_ID: u32 = u32::MAX;

    /// Wrap a backend object id.
    pub const fn new(id: u32) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// The null handle, not referring to any object.
    pub const fn null() -> Self {
        Self::new(Self::NULL_ID)
    }

    /// Get the backend id of this handle.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns true if this handle does not refer to any object.
    pub fn is_null(&self) -> bool {
        self.id == Self::NULL_ID
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            f.write_str("Handle(null)")
        } else {
            f.write_fmt(format_args!("Handle({})", self.id))
        }
    }
}

bitflags! {
    /// Identifies the buffers of a render target.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct TargetBufferFlags: u32 {
        const COLOR0 = 0x01;
        const COLOR1 = 0x02;
        const COLOR2 = 0x04;
        const COLOR3 = 0x08;
        const DEPTH = 0x10;
        const STENCIL = 0x20;
        const COLOR_ALL = Self::COLOR0.bits() | Self::COLOR1.bits() | Self::COLOR2.bits() | Self::COLOR3.bits();
        const DEPTH_AND_STENCIL = Self::DEPTH.bits() | Self::STENCIL.bits();
        const ALL = Self::COLOR_ALL.bits() | Self::DEPTH_AND_STENCIL.bits();
    }
}

impl Default for TargetBufferFlags {
    fn default() -> Self {
        Self::empty()
    }
}

impl TargetBufferFlags {
    /// Flag for the attachment slot `index`, in the order color 0-3, depth, stencil.
    pub fn from_attachment_index(index: usize) -> Self {
        Self::from_bits_truncate(1 << index)
    }
}

/// Load/store behaviour of a render pass, per target buffer.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RenderPassFlags {
    /// Buffers cleared at the start of the pass.
    pub clear: TargetBufferFlags,
    /// Buffers whose previous content does not need to be loaded.
    pub discard_start: TargetBufferFlags,
    /// Buffers whose content does not need to be stored at the end of the pass.
    pub discard_end: TargetBufferFlags,
}

/// Parameters for beginning a render pass on a render target.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderPassParams {
    pub viewport: vk::Rect2D,
    pub clear_color: [f32; 4],
    pub clear_depth: f32,
    pub clear_stencil: u32,
    pub flags: RenderPassFlags,
}

impl Default for RenderPassParams {
    fn default() -> Self {
        Self {
            viewport: vk::Rect2D::default(),
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_depth: 1.0,
            clear_stencil: 0,
            flags: RenderPassFlags::default(),
        }
    }
}

/// One texture attached to a render target.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TargetAttachment {
    pub texture: TextureHandle,
    pub level: u8,
    pub layer: u16,
}

/// Everything the backend needs to create a render target.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct RenderTargetInfo {
    pub attachments: TargetBufferFlags,
    pub width: u32,
    pub height: u32,
    pub samples: u8,
    pub color: [TargetAttachment; 4],
    pub depth: TargetAttachment,
    pub stencil: TargetAttachment,
}

/// Creates and destroys concrete resources on behalf of the frame graph. Only called during `execute()`.
pub trait ResourceAllocator {
    /// Create a texture.
    fn create_texture(&mut self, name: &str, descriptor: &TextureDescriptor, usage: TextureUsage) -> Result<TextureHandle>;
    /// Destroy a texture previously created with [`ResourceAllocator::create_texture`].
    fn destroy_texture(&mut self, handle: TextureHandle);
    /// Create a buffer.
    fn create_buffer(&mut self, name: &str, descriptor: &BufferDescriptor, usage: BufferUsage) -> Result<BufferHandle>;
    /// Destroy a buffer previously created with [`ResourceAllocator::create_buffer`].
    fn destroy_buffer(&mut self, handle: BufferHandle);
    /// Create a render target from already existing textures.
    fn create_render_target(&mut self, name: &str, info: &RenderTargetInfo) -> Result<RenderTargetHandle>;
    /// Destroy a render target previously created with [`ResourceAllocator::create_render_target`].
    fn destroy_render_target(&mut self, handle: RenderTargetHandle);
}

/// Command submission interface.
pub trait Driver {
    /// Open a named region in the command stream.
    fn push_group_marker(&mut self, name: &str);
    /// Close the last opened region.
    fn pop_group_marker(&mut self);
    /// Kick the accumulated work to the GPU.
    fn flush(&mut self);
}
