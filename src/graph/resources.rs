//! The view on the frame graph that is handed to a pass while it executes.

use anyhow::Result;

use crate::Error;
use crate::graph::frame_graph::{downcast, FrameGraph};
use crate::graph::handle::FrameGraphId;
use crate::graph::pass::PassId;
use crate::graph::render_target::RenderPassInfo;
use crate::graph::virtual_resource::Resource;
use crate::resource::ResourceKind;

/// Gives an executing pass access to the concrete resources it declared during setup.
/// # Example usage
/// ```ignore
/// graph.add_pass::<BlurData, _, _>(
///     "blur",
///     |builder, data| { /* declare data.input and data.output */ },
///     |resources, data, driver| {
///         let input = resources.get(data.input)?;
///         let size = resources.descriptor(data.output)?;
///         Ok(())
///     },
/// );
/// ```
pub struct FrameGraphResources<'a, 'cb> {
    graph: &'a FrameGraph<'cb>,
    pass: PassId,
}

impl<'a, 'cb> FrameGraphResources<'a, 'cb> {
    pub(crate) fn new(graph: &'a FrameGraph<'cb>, pass: PassId) -> Self {
        Self {
            graph,
            pass,
        }
    }

    /// Name of the executing pass.
    pub fn pass_name(&self) -> &str {
        self.graph.pass_node(self.pass).name()
    }

    /// Id of the executing pass.
    pub fn pass_id(&self) -> PassId {
        self.pass
    }

    /// Look up a resource declared by this pass. Any version of the handle is accepted, since later passes may have
    /// written newer versions during setup.
    fn resource<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Result<&'a Resource<R>> {
        let resource = self.graph.resource_at(handle.handle()).ok_or(Error::InvalidHandle {
            index: handle.handle().index(),
            version: handle.version(),
        })?;
        if !self.graph.pass_node(self.pass).has_declared(handle.handle().index()) {
            return Err(Error::UndeclaredResource {
                pass: self.pass_name().to_owned(),
                resource: resource.state().name.clone(),
            }
            .into());
        }
        downcast::<R>(resource)
    }

    /// Get the concrete resource.
    /// # Errors
    /// * Fails if the handle is invalid, or the pass did not declare a read or write on it.
    /// * Fails if the resource has no concrete resource at this point, which indicates a bug in the scheduler.
    pub fn get<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Result<&'a R> {
        let resource = self.resource(handle)?;
        resource
            .resource
            .as_ref()
            .ok_or_else(|| Error::NotDevirtualized(resource.state.name.clone()).into())
    }

    /// Get the descriptor the resource was created with.
    /// # Errors
    /// * Fails if the handle is invalid, or the pass did not declare a read or write on it.
    pub fn descriptor<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Result<&'a R::Descriptor> {
        Ok(&self.resource(handle)?.descriptor)
    }

    /// Get the sub-resource descriptor. Root resources return the default sub-resource descriptor.
    /// # Errors
    /// * Fails if the handle is invalid, or the pass did not declare a read or write on it.
    pub fn sub_resource_descriptor<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Result<&'a R::SubResourceDescriptor> {
        Ok(&self.resource(handle)?.sub_resource_descriptor)
    }

    /// Get the usage the concrete resource was created with.
    /// # Errors
    /// * Fails if the handle is invalid, or the pass did not declare a read or write on it.
    pub fn usage<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Result<R::Usage> {
        Ok(self.resource(handle)?.usage)
    }

    /// Get the concrete render target and render pass parameters of a render target declared by this pass.
    /// # Errors
    /// * Fails if this pass did not declare a render target with this id.
    pub fn render_pass_info(&self, id: u32) -> Result<RenderPassInfo> {
        self.graph
            .pass_node(self.pass)
            .render_targets()
            .get(id as usize)
            .map(|target| target.backend)
            .ok_or_else(|| Error::RenderTargetNotFound(id).into())
    }
}
