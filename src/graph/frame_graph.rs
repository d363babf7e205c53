//! The frame graph module holds the frame graph itself and the [`Builder`] passes declare their resources with.
//!
//! A [`FrameGraph`] lives for exactly one frame. During setup, passes are added with [`FrameGraph::add_pass`], which
//! hands out a [`Builder`] bound to the new pass. Every resource is referred to by a versioned [`FrameGraphId`]:
//! writing to a resource that was already written creates a new version, and only the newest version is valid.
//!
//! After setup, [`FrameGraph::compile`] culls every pass and resource that does not contribute to a pass with side
//! effects, computes the lifetime of each resource, and resolves render target parameters.
//! [`FrameGraph::execute`] then runs the surviving passes and resets the graph.

use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use ash::vk;
use petgraph::graph::NodeIndex;

use crate::backend::{Driver, RenderPassFlags, RenderPassParams, RenderTargetHandle, TargetBufferFlags};
use crate::Error;
use crate::graph::dependency_graph::{DependencyGraph, EdgeKind, GraphNode};
use crate::graph::handle::{FrameGraphHandle, FrameGraphId};
use crate::graph::pass::{
    DataPassExecutor, EmptyPassExecutor, PassExecutor, PassId, PassNode, PassState, RenderTargetData,
};
use crate::graph::render_target::{
    ATTACHMENT_COUNT, DEPTH_INDEX, ImportedRenderTarget, ImportedRenderTargetDescriptor, RenderTarget,
    RenderTargetDescriptor, STENCIL_INDEX,
};
use crate::graph::resource_node::ResourceNode;
use crate::graph::resources::FrameGraphResources;
use crate::graph::virtual_resource::{Resource, VirtualResource};
use crate::resource::ResourceKind;
use crate::resource::texture::{Texture, TextureDescriptor, TextureUsage};

const DEFAULT_RESOURCE_CAPACITY: usize = 256;
const DEFAULT_PASS_CAPACITY: usize = 64;

/// A node in the dependency graph of a frame graph.
#[derive(Debug)]
pub(crate) enum Node<'cb> {
    Pass(PassNode<'cb>),
    Resource(ResourceNode),
}

impl GraphNode for Node<'_> {
    fn name(&self) -> &str {
        match self {
            Node::Pass(pass) => GraphNode::name(pass),
            Node::Resource(resource) => GraphNode::name(resource),
        }
    }

    fn on_culled(&mut self) {
        match self {
            Node::Pass(pass) => pass.on_culled(),
            Node::Resource(resource) => resource.on_culled(),
        }
    }

    fn graphviz_attributes(&self) -> String {
        match self {
            Node::Pass(pass) => pass.graphviz_attributes(),
            Node::Resource(resource) => resource.graphviz_attributes(),
        }
    }
}

/// Maps a handle index to the resource and its current version node.
#[derive(Debug, Copy, Clone)]
struct ResourceSlot {
    rid: usize,
    nid: usize,
}

/// Summary of a compiled frame graph.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FrameGraphStats {
    /// Total amount of declared passes, including the present pass.
    pub passes: usize,
    /// Amount of passes that will not execute.
    pub culled_passes: usize,
    /// Total amount of declared resources, including sub-resources and imported resources.
    pub resources: usize,
    /// Amount of resources needed by at least one surviving pass.
    pub live_resources: usize,
}

/// Compile-time information about a resource, mostly useful for debugging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Name the resource was declared with.
    pub name: String,
    /// Current write generation.
    pub version: u32,
    /// Number of surviving passes needing this resource.
    pub refcount: u32,
    /// The pass that instantiates the resource.
    pub first: Option<PassId>,
    /// The pass after which the resource is destroyed.
    pub last: Option<PassId>,
    /// Whether the resource wraps a concrete resource owned outside of the frame graph.
    pub imported: bool,
    /// Whether the resource is a view of a parent resource.
    pub sub_resource: bool,
}

/// Frame graph for one frame. See the [module level documentation](crate::graph::frame_graph) for an overview.
#[derive(Debug)]
pub struct FrameGraph<'cb> {
    pub(crate) graph: DependencyGraph<Node<'cb>>,
    resource_slots: Vec<ResourceSlot>,
    pub(crate) resources: Vec<Box<dyn VirtualResource>>,
    resource_nodes: Vec<NodeIndex>,
    pub(crate) pass_nodes: Vec<NodeIndex>,
    /// Render targets of imported textures, keyed by resource index.
    imported_targets: HashMap<usize, ImportedRenderTarget>,
    pub(crate) compiled: bool,
}

/// Used to declare the resources of a pass. Obtained through [`FrameGraph::add_pass`].
pub struct Builder<'fg, 'cb> {
    graph: &'fg mut FrameGraph<'cb>,
    pass: PassId,
}

pub(crate) fn downcast<R: ResourceKind>(resource: &dyn VirtualResource) -> Result<&Resource<R>> {
    resource
        .as_any()
        .downcast_ref::<Resource<R>>()
        .ok_or_else(|| Error::ResourceKindMismatch(resource.state().name.clone()).into())
}

fn downcast_mut<R: ResourceKind>(resource: &mut dyn VirtualResource) -> Result<&mut Resource<R>> {
    let name = resource.state().name.clone();
    resource
        .as_any_mut()
        .downcast_mut::<Resource<R>>()
        .ok_or_else(|| Error::ResourceKindMismatch(name).into())
}

impl Default for FrameGraph<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'cb> FrameGraph<'cb> {
    /// Create an empty frame graph.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RESOURCE_CAPACITY, DEFAULT_PASS_CAPACITY)
    }

    /// Create an empty frame graph, reserving room for the given amount of resources and passes.
    pub fn with_capacity(resources: usize, passes: usize) -> Self {
        Self {
            graph: DependencyGraph::with_capacity(resources + passes, resources * 2),
            resource_slots: Vec::with_capacity(resources),
            resources: Vec::with_capacity(resources),
            resource_nodes: Vec::with_capacity(resources),
            pass_nodes: Vec::with_capacity(passes),
            imported_targets: HashMap::new(),
            compiled: false,
        }
    }

    /// Add a pass to the frame graph.
    ///
    /// `setup` is called immediately, it declares the resources of the pass through the [`Builder`] and fills in
    /// `Data`. `execute` is called during [`FrameGraph::execute`] with a copy of that data, unless the pass was culled.
    /// Returns the data filled in by `setup`, so later passes can use its handles.
    pub fn add_pass<Data, S, E>(&mut self, name: impl Into<String>, setup: S, execute: E) -> Data
    where
        Data: Default + Clone + 'cb,
        S: FnOnce(&mut Builder<'_, 'cb>, &mut Data),
        E: FnMut(&FrameGraphResources, &Data, &mut dyn Driver) -> Result<()> + 'cb, {
        let pass = self.add_pass_node(PassNode::render(name.into(), EmptyPassExecutor::new_boxed()));
        let mut data = Data::default();
        let mut builder = Builder {
            graph: self,
            pass,
        };
        setup(&mut builder, &mut data);
        self.pass_node_mut(pass).set_executor(Box::new(DataPassExecutor {
            data: data.clone(),
            execute,
        }));
        data
    }

    /// Add a pass with an arbitrary [`PassExecutor`]. Returns the id of the new pass.
    pub fn add_pass_with_executor<S>(
        &mut self,
        name: impl Into<String>,
        setup: S,
        executor: impl PassExecutor + 'cb,
    ) -> PassId
    where
        S: FnOnce(&mut Builder<'_, 'cb>), {
        let pass = self.add_pass_node(PassNode::render(name.into(), Box::new(executor)));
        let mut builder = Builder {
            graph: self,
            pass,
        };
        setup(&mut builder);
        pass
    }

    /// Add the present pass. It has no executor, and always survives culling together with everything it reads.
    pub fn add_present_pass<S>(&mut self, setup: S)
    where
        S: FnOnce(&mut Builder<'_, 'cb>), {
        let pass = self.add_pass_node(PassNode::present());
        let mut builder = Builder {
            graph: self,
            pass,
        };
        setup(&mut builder);
        builder.side_effect();
    }

    /// Create a new virtual resource. The concrete resource is only created if a surviving pass needs it.
    pub fn create<R: ResourceKind>(&mut self, name: impl Into<String>, descriptor: R::Descriptor) -> FrameGraphId<R> {
        let resource = Resource::<R>::new(name.into(), descriptor);
        FrameGraphId::new(self.add_resource(Box::new(resource)))
    }

    /// Create a sub-resource of `parent`, for example a single mip level of a texture. A sub-resource aliases the
    /// storage of its parent, using it keeps the parent alive.
    /// # Errors
    /// * Fails if `parent` is not a valid handle.
    pub fn create_subresource<R: ResourceKind>(
        &mut self,
        parent: FrameGraphId<R>,
        name: impl Into<String>,
        descriptor: R::SubResourceDescriptor,
    ) -> Result<FrameGraphId<R>> {
        self.check_valid(parent.handle())?;
        let rid = self.resource_slots[parent.handle().index as usize].rid;
        let parent = downcast::<R>(self.resources[rid].as_ref())?;
        let resource = Resource::<R>::new_sub_resource(name.into(), rid, parent, descriptor);
        Ok(FrameGraphId::new(self.add_resource(Box::new(resource))))
    }

    /// Import an existing concrete resource. The frame graph will never create or destroy it, and every read or write
    /// must request a subset of `usage`.
    pub fn import<R: ResourceKind>(
        &mut self,
        name: impl Into<String>,
        descriptor: R::Descriptor,
        usage: R::Usage,
        resource: R,
    ) -> FrameGraphId<R> {
        let resource = Resource::<R>::new_imported(name.into(), descriptor, usage, resource);
        FrameGraphId::new(self.add_resource(Box::new(resource)))
    }

    /// Import an existing render target, typically the swapchain. Passes declaring a render target with this texture
    /// as attachment render directly into `target`.
    pub fn import_render_target(
        &mut self,
        name: impl Into<String>,
        descriptor: ImportedRenderTargetDescriptor,
        usage: TextureUsage,
        target: RenderTargetHandle,
    ) -> FrameGraphId<Texture> {
        let texture = TextureDescriptor {
            width: descriptor.viewport.extent.width,
            height: descriptor.viewport.extent.height,
            samples: descriptor.samples,
            ..Default::default()
        };
        let handle = self.import::<Texture>(name, texture, usage, Texture::default());
        self.imported_targets.insert(
            handle.handle().index as usize,
            ImportedRenderTarget {
                target,
                descriptor,
            },
        );
        handle
    }

    /// Returns true if this handle refers to the current version of a resource in this frame graph.
    pub fn is_valid(&self, handle: impl Into<FrameGraphHandle>) -> bool {
        let handle = handle.into();
        if !handle.is_initialized() {
            return false;
        }
        match self.resource_slots.get(handle.index as usize) {
            Some(slot) => self.resources[slot.rid].state().version == handle.version,
            None => false,
        }
    }

    /// Cull unused passes and resources, compute resource lifetimes and usage, and resolve render targets.
    /// Compiling an already compiled graph does nothing and returns the same statistics.
    pub fn compile(&mut self) -> FrameGraphStats {
        if self.compiled {
            warn!("Frame graph is already compiled");
            return self.stats();
        }
        self.graph.cull();

        for index in 0..self.pass_nodes.len() {
            let pass = PassId(index);
            let node = self.pass_nodes[index];
            if self.graph.is_culled(node) {
                continue;
            }
            // Reads are always valid for a pass that survived. Writes to a culled node still need the resource,
            // the pass writes into it regardless.
            let mut needed = BTreeSet::new();
            for edge in self.graph.incoming_edges(node) {
                let (from, _) = self.graph.edge_endpoints(edge);
                needed.insert(self.resource_node(from).resource_index());
            }
            for edge in self.graph.outgoing_edges(node) {
                let (_, to) = self.graph.edge_endpoints(edge);
                needed.insert(self.resource_node(to).resource_index());
            }
            // A resource needed by a pass keeps its whole parent chain alive.
            let mut chain = BTreeSet::new();
            for index in needed {
                let mut current = Some(self.resource_slots[index].rid);
                while let Some(rid) = current {
                    chain.insert(rid);
                    current = self.resources[rid].state().parent;
                }
            }
            for rid in chain {
                self.resources[rid].state_mut().needed_by_pass(pass);
            }

            self.resolve_render_targets(pass);
            self.pass_node_mut(pass).set_state(PassState::Resolved);
        }

        self.resolve_usage();
        self.compiled = true;

        for resource in self.resources.iter().filter(|resource| resource.state().refcount > 0) {
            let state = resource.state();
            trace!(
                "Resource \"{}\" lives from {:?} to {:?} with usage {}",
                state.name,
                state.first,
                state.last,
                resource.usage_string()
            );
        }

        let stats = self.stats();
        debug!(
            "Compiled frame graph: {} of {} passes culled, {} of {} resources needed",
            stats.culled_passes, stats.passes, stats.live_resources, stats.resources
        );
        debug!("Frame graph:\n{}", self.graphviz());
        stats
    }

    /// Drop all passes and resources. Every handle handed out before is invalid afterwards.
    pub fn reset(&mut self) {
        self.graph.clear();
        self.resource_slots.clear();
        self.resources.clear();
        self.resource_nodes.clear();
        self.pass_nodes.clear();
        self.imported_targets.clear();
        self.compiled = false;
    }

    /// Returns true if [`FrameGraph::compile`] was called since the last reset.
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Total amount of declared passes.
    pub fn pass_count(&self) -> usize {
        self.pass_nodes.len()
    }

    /// Get the lifecycle state of a pass.
    pub fn pass_state(&self, pass: PassId) -> Option<PassState> {
        self.pass_nodes.get(pass.0).map(|_| self.pass_node(pass).state())
    }

    /// Returns true if the pass was culled by [`FrameGraph::compile`].
    pub fn is_culled(&self, pass: PassId) -> bool {
        self.pass_state(pass) == Some(PassState::Culled)
    }

    /// Get compile-time information about the resource this handle refers to. Stale handles are accepted.
    pub fn resource_info<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Option<ResourceInfo> {
        let resource = self.resource_at(handle.handle())?;
        downcast::<R>(resource).ok()?;
        let state = resource.state();
        Some(ResourceInfo {
            name: state.name.clone(),
            version: state.version,
            refcount: state.refcount,
            first: state.first,
            last: state.last,
            imported: resource.is_imported(),
            sub_resource: state.is_sub_resource(),
        })
    }

    /// Get the usage of a resource. After compilation, this is the union of the usage of all surviving edges.
    pub fn usage<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Option<R::Usage> {
        let resource = downcast::<R>(self.resource_at(handle.handle())?).ok()?;
        Some(resource.usage)
    }

    /// Get the string representation of the dependency graph in `dot` format.
    pub fn graphviz(&self) -> String {
        self.graph.dot()
    }

    /// Returns true if the dependency graph has no cycles. Passes always execute in declaration order, this
    /// can be used to verify that order is a valid one.
    pub fn is_acyclic(&self) -> bool {
        self.graph.is_acyclic()
    }

    fn stats(&self) -> FrameGraphStats {
        FrameGraphStats {
            passes: self.pass_nodes.len(),
            culled_passes: self
                .pass_nodes
                .iter()
                .filter(|&&node| self.graph.is_culled(node))
                .count(),
            resources: self.resources.len(),
            live_resources: self
                .resources
                .iter()
                .filter(|resource| resource.state().refcount > 0)
                .count(),
        }
    }

    fn add_pass_node(&mut self, pass: PassNode<'cb>) -> PassId {
        let id = PassId(self.pass_nodes.len());
        let node = self.graph.add_node(Node::Pass(pass));
        self.pass_nodes.push(node);
        id
    }

    fn add_resource(&mut self, resource: Box<dyn VirtualResource>) -> FrameGraphHandle {
        let handle = FrameGraphHandle::new(self.resource_slots.len() as u32);
        self.resource_slots.push(ResourceSlot {
            rid: self.resources.len(),
            nid: self.resource_nodes.len(),
        });
        let node = self
            .graph
            .add_node(Node::Resource(ResourceNode::new(resource.state().name.clone(), handle)));
        self.resources.push(resource);
        self.resource_nodes.push(node);
        handle
    }

    /// Reports invalid handles.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if the handle is uninitialized or stale.
    fn check_valid(&self, handle: FrameGraphHandle) -> Result<()> {
        if self.is_valid(handle) {
            Ok(())
        } else {
            warn!(
                "Resource handle is invalid or uninitialized {{id={}, version={}}}",
                handle.index, handle.version
            );
            Err(Error::InvalidHandle {
                index: handle.index,
                version: handle.version,
            }
            .into())
        }
    }

    /// Look up a resource by the index of a handle, ignoring its version.
    pub(crate) fn resource_at(&self, handle: FrameGraphHandle) -> Option<&dyn VirtualResource> {
        if !handle.is_initialized() {
            return None;
        }
        let slot = self.resource_slots.get(handle.index as usize)?;
        Some(self.resources[slot.rid].as_ref())
    }

    fn current_node(&self, index: usize) -> NodeIndex {
        self.resource_nodes[self.resource_slots[index].nid]
    }

    fn root_index(&self, rid: usize) -> usize {
        let mut rid = rid;
        while let Some(parent) = self.resources[rid].state().parent {
            rid = parent;
        }
        rid
    }

    pub(crate) fn pass_node(&self, pass: PassId) -> &PassNode<'cb> {
        match self.graph.node(self.pass_nodes[pass.0]) {
            Node::Pass(pass) => pass,
            Node::Resource(_) => unreachable!("Pass id refers to a resource node"),
        }
    }

    pub(crate) fn pass_node_mut(&mut self, pass: PassId) -> &mut PassNode<'cb> {
        match self.graph.node_mut(self.pass_nodes[pass.0]) {
            Node::Pass(pass) => pass,
            Node::Resource(_) => unreachable!("Pass id refers to a resource node"),
        }
    }

    fn resource_node(&self, node: NodeIndex) -> &ResourceNode {
        match self.graph.node(node) {
            Node::Resource(resource) => resource,
            Node::Pass(_) => unreachable!("Resource edge endpoint is a pass node"),
        }
    }

    fn resource_node_mut(&mut self, node: NodeIndex) -> &mut ResourceNode {
        match self.graph.node_mut(node) {
            Node::Resource(resource) => resource,
            Node::Pass(_) => unreachable!("Resource edge endpoint is a pass node"),
        }
    }

    fn read<R: ResourceKind>(&mut self, pass: PassId, input: FrameGraphId<R>, usage: R::Usage) -> Result<FrameGraphId<R>> {
        self.check_valid(input.handle())?;
        let index = input.handle().index as usize;
        let rid = self.resource_slots[index].rid;
        let node = self.current_node(index);
        let pass_node = self.pass_nodes[pass.0];
        let edge = downcast_mut::<R>(self.resources[rid].as_mut())?.connect(
            &mut self.graph,
            node,
            pass_node,
            EdgeKind::Read,
            usage,
        )?;
        self.resource_node_mut(node).add_reader(edge);
        // Reading a sub-resource that was never written depends on the current content of its parent.
        if let Some(parent) = self.resources[rid].state().parent {
            let parent_node = self.current_node(parent);
            // The pass may already produce that content itself through another sub-resource.
            if !self.resource_node(node).has_parent_dependency() && !self.graph.has_path(node, parent_node) {
                let edge = self.graph.link(parent_node, node);
                self.resource_node_mut(node).set_parent_read(edge);
            }
        }
        self.pass_node_mut(pass).declare(index as u32);
        Ok(input)
    }

    fn write<R: ResourceKind>(&mut self, pass: PassId, output: FrameGraphId<R>, usage: R::Usage) -> Result<FrameGraphId<R>> {
        self.check_valid(output.handle())?;
        let index = output.handle().index as usize;
        let rid = self.resource_slots[index].rid;
        // Rejected writes must not create a new version.
        downcast::<R>(self.resources[rid].as_ref())?.check_usage(usage)?;

        let mut handle = output.handle();
        let mut node = self.current_node(index);
        if self.resource_node(node).has_writer() {
            handle.version += 1;
            let name = self.resources[rid].state().name.clone();
            node = self.graph.add_node(Node::Resource(ResourceNode::new(name, handle)));
            self.resource_slots[index].nid = self.resource_nodes.len();
            self.resource_nodes.push(node);
            self.resources[rid].state_mut().version = handle.version;
        }

        let pass_node = self.pass_nodes[pass.0];
        let edge = downcast_mut::<R>(self.resources[rid].as_mut())?.connect(
            &mut self.graph,
            pass_node,
            node,
            EdgeKind::Write,
            usage,
        )?;
        self.resource_node_mut(node).set_writer(edge);
        self.link_parent_write(rid, node);
        self.pass_node_mut(pass).declare(index as u32);
        Ok(FrameGraphId::new(handle))
    }

    /// Writing a sub-resource modifies its parent, and through it every ancestor. Each written version is linked to
    /// exactly one parent node.
    fn link_parent_write(&mut self, rid: usize, node: NodeIndex) {
        let mut rid = rid;
        let mut node = node;
        while let Some(parent) = self.resources[rid].state().parent {
            if self.resource_node(node).has_parent_write() {
                break;
            }
            let parent_node = self.writable_parent_node(parent);
            let edge = self.graph.link(node, parent_node);
            self.resource_node_mut(node).set_parent_write(edge);
            rid = parent;
            node = parent_node;
        }
    }

    /// Get a node of `index` that nothing consumes yet, creating one if the current node already has consumers.
    /// The version is kept, so handles to the parent stay valid and refer to the modified content.
    fn writable_parent_node(&mut self, index: usize) -> NodeIndex {
        let current = self.current_node(index);
        if self.graph.outgoing_edges(current).next().is_none() {
            return current;
        }
        let handle = self.resource_node(current).handle();
        let name = self.resources[self.resource_slots[index].rid].state().name.clone();
        let node = self.graph.add_node(Node::Resource(ResourceNode::new(name, handle)));
        self.resource_slots[index].nid = self.resource_nodes.len();
        self.resource_nodes.push(node);
        node
    }

    fn declare_render_target(&mut self, pass: PassId, name: String, descriptor: RenderTargetDescriptor) -> RenderTarget {
        assert!(
            !self.pass_node(pass).is_present(),
            "Cannot declare a render target on the present pass."
        );
        let mut data = RenderTargetData::new(name, descriptor);
        for i in 0..ATTACHMENT_COUNT {
            let attachment = descriptor.attachments.get(i);
            if !attachment.is_initialized() {
                continue;
            }
            let usage = match i {
                DEPTH_INDEX => TextureUsage::DEPTH_ATTACHMENT,
                STENCIL_INDEX => TextureUsage::STENCIL_ATTACHMENT,
                _ => TextureUsage::COLOR_ATTACHMENT,
            };
            match self.write_attachment(pass, attachment, usage, &mut data.incoming[i]) {
                Ok((handle, node)) => {
                    data.descriptor.attachments.set(i, handle);
                    data.outgoing[i] = Some(node);
                }
                Err(_) => {
                    // Already reported, the render target continues without this attachment.
                    data.descriptor.attachments.set(i, FrameGraphId::default());
                }
            }
        }
        let attachments = data.descriptor.attachments;
        let id = self.pass_node_mut(pass).add_render_target(data);
        RenderTarget {
            attachments,
            id,
        }
    }

    /// Attachments are written by the pass. If they already have content, the pass also reads that content so it
    /// can be loaded.
    fn write_attachment(
        &mut self,
        pass: PassId,
        attachment: FrameGraphId<Texture>,
        usage: TextureUsage,
        incoming: &mut Option<NodeIndex>,
    ) -> Result<(FrameGraphId<Texture>, NodeIndex)> {
        self.check_valid(attachment.handle())?;
        let index = attachment.handle().index as usize;
        let node = self.current_node(index);
        if self.resource_node(node).has_writer() {
            self.read(pass, attachment, usage)?;
            *incoming = Some(node);
        }
        let handle = self.write(pass, attachment, usage)?;
        Ok((handle, self.current_node(index)))
    }

    fn resolve_render_targets(&mut self, pass: PassId) {
        let mut targets = self.pass_node_mut(pass).take_render_targets();
        for target in &mut targets {
            self.resolve_render_target(target);
        }
        self.pass_node_mut(pass).restore_render_targets(targets);
    }

    fn has_active_readers(&self, node: NodeIndex) -> bool {
        self.resource_node(node)
            .readers()
            .iter()
            .any(|&edge| self.graph.is_edge_valid(edge))
    }

    fn resolve_render_target(&self, data: &mut RenderTargetData) {
        let mut flags = TargetBufferFlags::empty();
        let mut discard_start = TargetBufferFlags::empty();
        let mut discard_end = TargetBufferFlags::empty();
        let mut extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let mut imported = None;

        for i in 0..ATTACHMENT_COUNT {
            let attachment = data.descriptor.attachments.get(i);
            let Some(resource) = self.resource_at(attachment.handle()) else { continue; };
            let flag = TargetBufferFlags::from_attachment_index(i);
            flags |= flag;
            if data.incoming[i].is_none() {
                discard_start |= flag;
            }
            if let Some(outgoing) = data.outgoing[i] {
                if !self.has_active_readers(outgoing) {
                    discard_end |= flag;
                }
            }
            if let Ok(texture) = downcast::<Texture>(resource) {
                let level = texture.sub_resource_descriptor.level as u32;
                extent.width = extent.width.min((texture.descriptor.width >> level).max(1));
                extent.height = extent.height.min((texture.descriptor.height >> level).max(1));
            }
            let root = self.root_index(self.resource_slots[attachment.handle().index as usize].rid);
            if let Some(target) = self.imported_targets.get(&root) {
                imported = Some(*target);
            }
        }
        if flags.is_empty() {
            extent = vk::Extent2D::default();
        }

        let clear = data.descriptor.clear_flags & flags;
        let mut params = RenderPassParams {
            viewport: data.descriptor.viewport.unwrap_or(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            }),
            clear_color: data.descriptor.clear_color,
            flags: RenderPassFlags {
                clear,
                discard_start: discard_start | clear,
                discard_end,
            },
            ..Default::default()
        };

        data.imported = imported.is_some();
        data.backend.target = RenderTargetHandle::null();
        if let Some(imported) = imported {
            let descriptor = imported.descriptor;
            flags = descriptor.attachments;
            let clear = (data.descriptor.clear_flags | descriptor.clear_flags) & flags;
            if data.descriptor.clear_flags.is_empty() {
                params.clear_color = descriptor.clear_color;
            }
            params.viewport = data.descriptor.viewport.unwrap_or(descriptor.viewport);
            params.flags = RenderPassFlags {
                clear,
                discard_start: descriptor.discard_start | clear,
                // Imported targets are consumed outside of the frame graph.
                discard_end: TargetBufferFlags::empty(),
            };
            data.backend.target = imported.target;
        }

        data.target_buffer_flags = flags;
        data.backend.params = params;
    }

    fn resolve_usage(&mut self) {
        for i in 0..self.resource_nodes.len() {
            let node = self.resource_node(self.resource_nodes[i]);
            let mut edges = node
                .readers()
                .iter()
                .copied()
                .filter(|&edge| self.graph.is_edge_valid(edge))
                .collect::<Vec<_>>();
            if let Some(writer) = node.writer() {
                let (pass, _) = self.graph.edge_endpoints(writer);
                if !self.graph.is_culled(pass) {
                    edges.push(writer);
                }
            }
            let rid = self.resource_slots[node.resource_index()].rid;
            self.resources[rid].resolve_usage(&edges);
        }

        // Parents always have a lower index than their sub-resources, walking backwards propagates usage all the
        // way up to the root.
        for rid in (0..self.resources.len()).rev() {
            let Some(parent) = self.resources[rid].state().parent else { continue; };
            let (head, tail) = self.resources.split_at_mut(rid);
            // The usage of imported resources is fixed.
            if !head[parent].is_imported() {
                tail[0].propagate_usage(head[parent].as_mut());
            }
        }
    }
}

impl<'fg, 'cb> Builder<'fg, 'cb> {
    /// Create a new virtual resource. See [`FrameGraph::create`].
    pub fn create<R: ResourceKind>(&mut self, name: impl Into<String>, descriptor: R::Descriptor) -> FrameGraphId<R> {
        self.graph.create(name, descriptor)
    }

    /// Create a sub-resource of `parent`. See [`FrameGraph::create_subresource`].
    /// # Errors
    /// * Fails if `parent` is not a valid handle.
    pub fn create_subresource<R: ResourceKind>(
        &mut self,
        parent: FrameGraphId<R>,
        name: impl Into<String>,
        descriptor: R::SubResourceDescriptor,
    ) -> Result<FrameGraphId<R>> {
        self.graph.create_subresource(parent, name, descriptor)
    }

    /// Declare that this pass reads `input` with the given usage. The handle is returned unchanged.
    /// # Errors
    /// * Fails if `input` is not a valid handle.
    /// * Fails if `input` is imported and `usage` is not part of its usage mask. No dependency is added in that case.
    pub fn read<R: ResourceKind>(&mut self, input: FrameGraphId<R>, usage: R::Usage) -> Result<FrameGraphId<R>> {
        self.graph.read(self.pass, input, usage)
    }

    /// Declare that this pass writes `output` with the given usage. If the resource already has a writer, a new version
    /// is created and `output` becomes invalid. Always continue with the returned handle.
    /// # Errors
    /// * Fails if `output` is not a valid handle.
    /// * Fails if `output` is imported and `usage` is not part of its usage mask. The version is not changed in
    ///   that case.
    pub fn write<R: ResourceKind>(&mut self, output: FrameGraphId<R>, usage: R::Usage) -> Result<FrameGraphId<R>> {
        self.graph.write(self.pass, output, usage)
    }

    /// Declare a render target. Each attachment is written by this pass, and read first if it already has content.
    /// Attachments that cannot be written are reported and left out.
    /// # Panics
    /// Panics when called on the present pass.
    pub fn declare_render_target(&mut self, name: impl Into<String>, descriptor: RenderTargetDescriptor) -> RenderTarget {
        self.graph.declare_render_target(self.pass, name.into(), descriptor)
    }

    /// Declare a render target with a single color attachment and an optional depth attachment. The given handles are
    /// replaced with the new versions. Returns the id of the render target.
    /// # Panics
    /// Panics when called on the present pass.
    pub fn use_as_render_target(
        &mut self,
        color: Option<&mut FrameGraphId<Texture>>,
        depth: Option<&mut FrameGraphId<Texture>>,
    ) -> u32 {
        let mut descriptor = RenderTargetDescriptor::default();
        if let Some(color) = color.as_deref() {
            descriptor.attachments.color[0] = *color;
        }
        if let Some(depth) = depth.as_deref() {
            descriptor.attachments.depth = *depth;
        }
        let first = color.as_deref().or(depth.as_deref()).copied().unwrap_or_default();
        let name = self.name(first).unwrap_or("RenderTarget").to_owned();
        let target = self.declare_render_target(name, descriptor);
        if let Some(color) = color {
            *color = target.attachments.color[0];
        }
        if let Some(depth) = depth {
            *depth = target.attachments.depth;
        }
        target.id
    }

    /// Mark this pass as having side effects. It survives culling even if nothing reads its output.
    pub fn side_effect(&mut self) {
        let node = self.graph.pass_nodes[self.pass.0];
        self.graph.graph.make_target(node);
    }

    /// Get the name of a resource. Stale handles are accepted.
    pub fn name<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Option<&str> {
        self.graph
            .resource_at(handle.handle())
            .map(|resource| resource.state().name.as_str())
    }

    /// Get the descriptor of a resource.
    /// # Errors
    /// * Fails if `handle` is not a valid handle.
    pub fn descriptor<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> Result<&R::Descriptor> {
        self.graph.check_valid(handle.handle())?;
        let resource = self
            .graph
            .resource_at(handle.handle())
            .ok_or(Error::InvalidHandle {
                index: handle.handle().index(),
                version: handle.version(),
            })?;
        Ok(&downcast::<R>(resource)?.descriptor)
    }

    /// Returns true if this handle refers to the current version of a resource.
    pub fn is_valid<R: ResourceKind>(&self, handle: FrameGraphId<R>) -> bool {
        self.graph.is_valid(handle)
    }

    /// Get the id of the pass being declared.
    pub fn pass_id(&self) -> PassId {
        self.pass
    }
}
