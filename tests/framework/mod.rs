#![allow(dead_code)]

use anyhow::{bail, Result};

use framegraph::prelude::*;

/// Everything the frame graph asked the backend to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    CreateTexture(String, TextureUsage),
    DestroyTexture(u32),
    CreateBuffer(String, BufferUsage),
    DestroyBuffer(u32),
    CreateRenderTarget(String, TargetBufferFlags),
    DestroyRenderTarget(u32),
    PushMarker(String),
    PopMarker,
    Flush,
}

/// Resource allocator that hands out increasing ids and records every call.
#[derive(Debug, Default)]
pub struct MockAllocator {
    pub events: Vec<Event>,
    pub render_targets: Vec<RenderTargetInfo>,
    next_id: u32,
    /// Creating a resource with this name fails.
    pub fail_on: Option<String>,
}

impl MockAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self, name: &str) -> Result<u32> {
        if self.fail_on.as_deref() == Some(name) {
            bail!("out of memory");
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    pub fn created_textures(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::CreateTexture(name, _) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of concrete resources that were created but not destroyed.
    pub fn live_objects(&self) -> i64 {
        self.events.iter().fold(0, |live, event| match event {
            Event::CreateTexture(..) | Event::CreateBuffer(..) | Event::CreateRenderTarget(..) => live + 1,
            Event::DestroyTexture(_) | Event::DestroyBuffer(_) | Event::DestroyRenderTarget(_) => live - 1,
            _ => live,
        })
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events.iter().position(|e| e == event)
    }
}

impl ResourceAllocator for MockAllocator {
    fn create_texture(&mut self, name: &str, _descriptor: &TextureDescriptor, usage: TextureUsage) -> Result<TextureHandle> {
        let id = self.next(name)?;
        self.events.push(Event::CreateTexture(name.to_owned(), usage));
        Ok(TextureHandle::new(id))
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        self.events.push(Event::DestroyTexture(handle.id()));
    }

    fn create_buffer(&mut self, name: &str, _descriptor: &BufferDescriptor, usage: BufferUsage) -> Result<BufferHandle> {
        let id = self.next(name)?;
        self.events.push(Event::CreateBuffer(name.to_owned(), usage));
        Ok(BufferHandle::new(id))
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        self.events.push(Event::DestroyBuffer(handle.id()));
    }

    fn create_render_target(&mut self, name: &str, info: &RenderTargetInfo) -> Result<RenderTargetHandle> {
        let id = self.next(name)?;
        self.events
            .push(Event::CreateRenderTarget(name.to_owned(), info.attachments));
        self.render_targets.push(*info);
        Ok(RenderTargetHandle::new(id))
    }

    fn destroy_render_target(&mut self, handle: RenderTargetHandle) {
        self.events.push(Event::DestroyRenderTarget(handle.id()));
    }
}

/// Driver that records markers and flushes.
#[derive(Debug, Default)]
pub struct MockDriver {
    pub events: Vec<Event>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flushes(&self) -> usize {
        self.events.iter().filter(|e| **e == Event::Flush).count()
    }

    pub fn markers_balanced(&self) -> bool {
        let mut depth = 0i64;
        for event in &self.events {
            match event {
                Event::PushMarker(_) => depth += 1,
                Event::PopMarker => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return false;
            }
        }
        depth == 0
    }
}

impl Driver for MockDriver {
    fn push_group_marker(&mut self, name: &str) {
        self.events.push(Event::PushMarker(name.to_owned()));
    }

    fn pop_group_marker(&mut self) {
        self.events.push(Event::PopMarker);
    }

    fn flush(&mut self) {
        self.events.push(Event::Flush);
    }
}

/// Initializes logging for tests. Safe to call multiple times.
pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

pub fn texture(size: u32) -> TextureDescriptor {
    TextureDescriptor::new(size, size)
}
