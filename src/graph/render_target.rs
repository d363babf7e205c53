//! Render target declarations.
//!
//! A render pass declares which textures it draws into with
//! [`Builder::declare_render_target`](crate::graph::frame_graph::Builder::declare_render_target). The frame graph
//! turns the attachments into writes on the textures, and after compilation derives the concrete render pass
//! parameters (which buffers can be discarded, cleared, and the viewport) from the dependency structure.

use ash::vk;

use crate::backend::{RenderPassParams, RenderTargetHandle, TargetBufferFlags};
use crate::graph::handle::FrameGraphId;
use crate::resource::texture::Texture;

/// Maximum number of color attachments of a render target.
pub const MAX_COLOR_ATTACHMENTS: usize = 4;
/// Total number of attachment slots: the color attachments, depth and stencil.
pub const ATTACHMENT_COUNT: usize = MAX_COLOR_ATTACHMENTS + 2;

pub(crate) const DEPTH_INDEX: usize = MAX_COLOR_ATTACHMENTS;
pub(crate) const STENCIL_INDEX: usize = MAX_COLOR_ATTACHMENTS + 1;

/// Textures attached to a render target. Uninitialized handles mean the slot is unused.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Attachments {
    pub color: [FrameGraphId<Texture>; MAX_COLOR_ATTACHMENTS],
    pub depth: FrameGraphId<Texture>,
    pub stencil: FrameGraphId<Texture>,
}

impl Attachments {
    /// Get the attachment in slot `index`, in the order color 0-3, depth, stencil.
    pub fn get(&self, index: usize) -> FrameGraphId<Texture> {
        match index {
            DEPTH_INDEX => self.depth,
            STENCIL_INDEX => self.stencil,
            index => self.color[index],
        }
    }

    /// Set the attachment in slot `index`, in the order color 0-3, depth, stencil.
    pub fn set(&mut self, index: usize, handle: FrameGraphId<Texture>) {
        match index {
            DEPTH_INDEX => self.depth = handle,
            STENCIL_INDEX => self.stencil = handle,
            index => self.color[index] = handle,
        }
    }
}

/// Describes a render target to declare.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RenderTargetDescriptor {
    pub attachments: Attachments,
    /// Viewport of the render pass. Defaults to the size of the smallest attachment.
    pub viewport: Option<vk::Rect2D>,
    pub clear_color: [f32; 4],
    /// Buffers to clear at the start of the pass.
    pub clear_flags: TargetBufferFlags,
    pub samples: u8,
}

impl Default for RenderTargetDescriptor {
    fn default() -> Self {
        Self {
            attachments: Attachments::default(),
            viewport: None,
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_flags: TargetBufferFlags::empty(),
            samples: 1,
        }
    }
}

/// Describes a render target that exists outside of the frame graph, typically the swapchain.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ImportedRenderTargetDescriptor {
    /// Buffers present in the render target.
    pub attachments: TargetBufferFlags,
    pub viewport: vk::Rect2D,
    pub clear_color: [f32; 4],
    /// Buffers to clear at the start of any pass rendering into this target.
    pub clear_flags: TargetBufferFlags,
    /// Buffers whose previous content does not need to be loaded.
    pub discard_start: TargetBufferFlags,
    pub samples: u8,
}

impl Default for ImportedRenderTargetDescriptor {
    fn default() -> Self {
        Self {
            attachments: TargetBufferFlags::COLOR0,
            viewport: vk::Rect2D::default(),
            clear_color: [0.0, 0.0, 0.0, 0.0],
            clear_flags: TargetBufferFlags::empty(),
            discard_start: TargetBufferFlags::empty(),
            samples: 1,
        }
    }
}

/// Result of declaring a render target: the rewritten attachment handles and the id to look up the render pass
/// info with during execution.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub attachments: Attachments,
    pub id: u32,
}

/// Concrete render target and the parameters to begin a render pass on it.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct RenderPassInfo {
    pub target: RenderTargetHandle,
    pub params: RenderPassParams,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct ImportedRenderTarget {
    pub target: RenderTargetHandle,
    pub descriptor: ImportedRenderTargetDescriptor,
}
