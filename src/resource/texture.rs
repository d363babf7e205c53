//! Textures, the most common resource in a frame graph. Textures are used as render target attachments and
//! sampled in later passes.

use anyhow::Result;
use ash::vk;
use bitflags::bitflags;

use crate::backend::{ResourceAllocator, TextureHandle};
use crate::resource::{ResourceKind, UsageFlags};

bitflags! {
    /// How a texture is accessed by a pass.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COLOR_ATTACHMENT = 0x0001;
        const DEPTH_ATTACHMENT = 0x0002;
        const STENCIL_ATTACHMENT = 0x0004;
        const UPLOADABLE = 0x0008;
        const SAMPLEABLE = 0x0010;
        const SUBPASS_INPUT = 0x0020;
        const BLIT_SRC = 0x0040;
        const BLIT_DST = 0x0080;
        const PRESENT = 0x0100;
        const DEFAULT = Self::UPLOADABLE.bits() | Self::SAMPLEABLE.bits();
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

impl UsageFlags for TextureUsage {}

/// Describes a texture to create.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Number of mip levels.
    pub levels: u8,
    pub samples: u8,
    pub format: vk::Format,
}

impl TextureDescriptor {
    /// A single sampled 2D RGBA8 texture of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Set the texture format.
    pub fn format(mut self, format: vk::Format) -> Self {
        self.format = format;
        self
    }

    /// Set the number of mip levels.
    pub fn levels(mut self, levels: u8) -> Self {
        self.levels = levels;
        self
    }

    /// Set the sample count.
    pub fn samples(mut self, samples: u8) -> Self {
        self.samples = samples;
        self
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
            levels: 1,
            samples: 1,
            format: vk::Format::R8G8B8A8_UNORM,
        }
    }
}

/// Selects a single mip level and layer of a texture.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TextureSubResourceDescriptor {
    pub level: u8,
    pub layer: u16,
}

/// A concrete texture.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Texture {
    pub handle: TextureHandle,
}

impl ResourceKind for Texture {
    type Descriptor = TextureDescriptor;
    type SubResourceDescriptor = TextureSubResourceDescriptor;
    type Usage = TextureUsage;

    fn create(allocator: &mut dyn ResourceAllocator, name: &str, descriptor: &TextureDescriptor, usage: TextureUsage) -> Result<Self> {
        let handle = allocator.create_texture(name, descriptor, usage)?;
        Ok(Texture {
            handle,
        })
    }

    fn destroy(self, allocator: &mut dyn ResourceAllocator) {
        if !self.handle.is_null() {
            allocator.destroy_texture(self.handle);
        }
    }
}
