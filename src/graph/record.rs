//! Execution of a compiled frame graph.
//!
//! Surviving passes run in declaration order. Around each pass, concrete resources are created right before the first
//! pass needing them and destroyed right after the last one, so a resource is only ever live for the span of passes
//! using it.

use anyhow::Result;

use crate::backend::{Driver, RenderTargetHandle, RenderTargetInfo, ResourceAllocator, TargetAttachment};
use crate::Error;
use crate::graph::frame_graph::{downcast, FrameGraph};
use crate::graph::pass::{PassId, PassState, RenderTargetData};
use crate::graph::render_target::{ATTACHMENT_COUNT, DEPTH_INDEX, STENCIL_INDEX};
use crate::graph::resources::FrameGraphResources;
use crate::resource::texture::Texture;

impl<'cb> FrameGraph<'cb> {
    /// Execute all passes that survived [`FrameGraph::compile`], then reset the graph.
    ///
    /// The frame is bracketed by a `FrameGraph` group marker, and each pass by a marker with its name when the
    /// `debug-markers` feature is enabled. The driver is flushed after the last pass.
    /// # Errors
    /// * Fails with [`Error::NotCompiled`] if the graph was not compiled. The graph is left untouched.
    /// * Fails if a concrete resource cannot be created, or a pass fails. All concrete resources that are still alive
    ///   are destroyed and the graph is reset before the error is returned.
    pub fn execute(&mut self, allocator: &mut dyn ResourceAllocator, driver: &mut dyn Driver) -> Result<()> {
        if !self.compiled {
            warn!("Frame graph executed without being compiled");
            return Err(Error::NotCompiled.into());
        }

        #[cfg(feature = "debug-markers")]
        driver.push_group_marker("FrameGraph");

        let mut result = Ok(());
        for index in 0..self.pass_nodes.len() {
            let pass = PassId(index);
            if self.pass_node(pass).state() == PassState::Culled {
                continue;
            }
            if let Err(e) = self.execute_pass(pass, allocator, driver) {
                error!("Pass \"{}\" failed: {:?}", self.pass_node(pass).name(), e);
                result = Err(e);
                break;
            }
        }

        if result.is_err() {
            self.destroy_live_resources(allocator);
        }

        driver.flush();
        #[cfg(feature = "debug-markers")]
        driver.pop_group_marker();

        self.reset();
        result
    }

    fn execute_pass(&mut self, pass: PassId, allocator: &mut dyn ResourceAllocator, driver: &mut dyn Driver) -> Result<()> {
        #[cfg(feature = "debug-markers")]
        driver.push_group_marker(self.pass_node(pass).name());

        let result = self.run_pass(pass, allocator, driver);

        #[cfg(feature = "debug-markers")]
        driver.pop_group_marker();
        result
    }

    fn run_pass(&mut self, pass: PassId, allocator: &mut dyn ResourceAllocator, driver: &mut dyn Driver) -> Result<()> {
        self.devirtualize_resources(pass, allocator)?;

        let result = match self.create_render_targets(pass, allocator) {
            Ok(()) => self.invoke_executor(pass, driver),
            Err(e) => Err(e),
        };
        self.destroy_render_targets(pass, allocator);
        result?;

        self.destroy_resources(pass, allocator);
        self.pass_node_mut(pass).set_state(PassState::Executed);
        Ok(())
    }

    fn invoke_executor(&mut self, pass: PassId, driver: &mut dyn Driver) -> Result<()> {
        let Some(mut executor) = self.pass_node_mut(pass).take_executor() else { return Ok(()); };
        let resources = FrameGraphResources::new(self, pass);
        executor.execute(&resources, driver)
    }

    fn devirtualize_resources(&mut self, pass: PassId, allocator: &mut dyn ResourceAllocator) -> Result<()> {
        // Parents come before their sub-resources, so they are always devirtualized first.
        for rid in 0..self.resources.len() {
            if self.resources[rid].state().first != Some(pass) {
                continue;
            }
            match self.resources[rid].state().parent {
                None => self.resources[rid].devirtualize(allocator, None)?,
                Some(parent) => {
                    let (head, tail) = self.resources.split_at_mut(rid);
                    tail[0].devirtualize(allocator, Some(head[parent].as_ref()))?;
                }
            }
        }
        Ok(())
    }

    fn destroy_resources(&mut self, pass: PassId, allocator: &mut dyn ResourceAllocator) {
        for resource in &mut self.resources {
            if resource.state().last == Some(pass) {
                resource.destroy(allocator);
            }
        }
    }

    fn destroy_live_resources(&mut self, allocator: &mut dyn ResourceAllocator) {
        for resource in &mut self.resources {
            if resource.is_devirtualized() && !resource.is_imported() {
                resource.destroy(allocator);
            }
        }
    }

    fn create_render_targets(&mut self, pass: PassId, allocator: &mut dyn ResourceAllocator) -> Result<()> {
        let mut targets = self.pass_node_mut(pass).take_render_targets();
        let result = targets
            .iter_mut()
            .filter(|target| !target.imported)
            .try_for_each(|target| self.create_render_target(target, allocator));
        self.pass_node_mut(pass).restore_render_targets(targets);
        result
    }

    fn create_render_target(&self, data: &mut RenderTargetData, allocator: &mut dyn ResourceAllocator) -> Result<()> {
        let viewport = data.backend.params.viewport;
        let mut info = RenderTargetInfo {
            attachments: data.target_buffer_flags,
            width: (viewport.offset.x.max(0) as u32).saturating_add(viewport.extent.width),
            height: (viewport.offset.y.max(0) as u32).saturating_add(viewport.extent.height),
            samples: data.descriptor.samples,
            ..Default::default()
        };
        for i in 0..ATTACHMENT_COUNT {
            let handle = data.descriptor.attachments.get(i);
            let Some(resource) = self.resource_at(handle.handle()) else { continue; };
            let texture = downcast::<Texture>(resource)?;
            let concrete = texture
                .resource
                .ok_or_else(|| Error::NotDevirtualized(texture.state.name.clone()))?;
            let attachment = TargetAttachment {
                texture: concrete.handle,
                level: texture.sub_resource_descriptor.level,
                layer: texture.sub_resource_descriptor.layer,
            };
            match i {
                DEPTH_INDEX => info.depth = attachment,
                STENCIL_INDEX => info.stencil = attachment,
                i => info.color[i] = attachment,
            }
        }
        let target = allocator
            .create_render_target(&data.name, &info)
            .map_err(|e| e.context(Error::AllocationFailed(data.name.clone())))?;
        #[cfg(feature = "log-objects")]
        trace!("Created render target \"{}\" ({:?})", data.name, target);
        data.backend.target = target;
        Ok(())
    }

    fn destroy_render_targets(&mut self, pass: PassId, allocator: &mut dyn ResourceAllocator) {
        for target in self.pass_node_mut(pass).render_targets_mut() {
            if target.imported || target.backend.target.is_null() {
                continue;
            }
            #[cfg(feature = "log-objects")]
            trace!("Destroying render target \"{}\" ({:?})", target.name, target.backend.target);
            allocator.destroy_render_target(target.backend.target);
            target.backend.target = RenderTargetHandle::null();
        }
    }
}
