//! Re-exports the most commonly used types of the crate.

pub use ash::vk;

pub use crate::backend::{
    BufferHandle, Driver, Handle, RenderPassFlags, RenderPassParams, RenderTargetHandle, RenderTargetInfo,
    ResourceAllocator, TargetAttachment, TargetBufferFlags, TextureHandle,
};
pub use crate::error::Error;

pub use crate::graph::frame_graph::{Builder, FrameGraph, FrameGraphStats, ResourceInfo};
pub use crate::graph::handle::{FrameGraphHandle, FrameGraphId};
pub use crate::graph::pass::{EmptyPassExecutor, PassExecutor, PassId, PassState};
pub use crate::graph::render_target::{
    Attachments, ImportedRenderTargetDescriptor, RenderPassInfo, RenderTarget, RenderTargetDescriptor,
};
pub use crate::graph::resources::FrameGraphResources;

pub use crate::resource::{ResourceKind, UsageFlags};
pub use crate::resource::buffer::{Buffer, BufferDescriptor, BufferSubResourceDescriptor, BufferUsage};
pub use crate::resource::texture::{Texture, TextureDescriptor, TextureSubResourceDescriptor, TextureUsage};
