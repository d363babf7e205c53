//! Virtual resources: resources that are declared during setup, but only backed by a concrete GPU object
//! between the first and the last pass that needs them.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;

use anyhow::Result;
use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::backend::ResourceAllocator;
use crate::Error;
use crate::graph::dependency_graph::{DependencyGraph, EdgeKind, GraphNode};
use crate::graph::pass::PassId;
use crate::resource::{ResourceKind, UsageFlags};

/// Bookkeeping shared by every virtual resource, independent of its kind.
#[derive(Debug, Clone)]
pub struct ResourceState {
    pub(crate) name: String,
    /// Index of the parent resource, `None` for root resources.
    pub(crate) parent: Option<usize>,
    pub(crate) version: u32,
    // computed during compile()
    pub(crate) refcount: u32,
    /// Pass that needs to instantiate the resource.
    pub(crate) first: Option<PassId>,
    /// Pass that can destroy the resource.
    pub(crate) last: Option<PassId>,
}

impl ResourceState {
    fn new(name: String, parent: Option<usize>) -> Self {
        Self {
            name,
            parent,
            version: 0,
            refcount: 0,
            first: None,
            last: None,
        }
    }

    /// Record that `pass` needs this resource. Passes are visited in declaration order, so the
    /// first visitor becomes `first` and every visitor becomes `last`.
    pub(crate) fn needed_by_pass(&mut self, pass: PassId) {
        self.refcount += 1;
        self.first.get_or_insert(pass);
        self.last = Some(pass);
    }

    pub(crate) fn is_sub_resource(&self) -> bool {
        self.parent.is_some()
    }
}

/// Kind independent interface to a virtual resource, so resources of every kind can live in one table.
pub(crate) trait VirtualResource: Debug {
    fn state(&self) -> &ResourceState;

    fn state_mut(&mut self) -> &mut ResourceState;

    fn is_imported(&self) -> bool;

    /// Returns true if a concrete resource is currently bound.
    fn is_devirtualized(&self) -> bool;

    /// Accumulate the usage of the given edges. Edges that were not created by this resource are ignored.
    fn resolve_usage(&mut self, edges: &[EdgeIndex]);

    /// Union the resolved usage of this resource into `parent`, which must be of the same kind.
    fn propagate_usage(&self, parent: &mut dyn VirtualResource);

    /// Instantiate the concrete resource. Sub-resources receive the already devirtualized parent.
    fn devirtualize(&mut self, allocator: &mut dyn ResourceAllocator, parent: Option<&dyn VirtualResource>) -> Result<()>;

    /// Destroy the concrete resource.
    fn destroy(&mut self, allocator: &mut dyn ResourceAllocator);

    fn usage_string(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A virtual resource of kind `R`.
#[derive(Debug)]
pub(crate) struct Resource<R: ResourceKind> {
    pub(crate) state: ResourceState,
    pub(crate) descriptor: R::Descriptor,
    pub(crate) sub_resource_descriptor: R::SubResourceDescriptor,
    // valid only after resolve_usage(). For imported resources, this is the fixed usage mask.
    pub(crate) usage: R::Usage,
    // valid only between devirtualize() and destroy()
    pub(crate) resource: Option<R>,
    imported: bool,
    edges: HashMap<EdgeIndex, R::Usage>,
}

impl<R: ResourceKind> Resource<R> {
    pub(crate) fn new(name: String, descriptor: R::Descriptor) -> Self {
        Self {
            state: ResourceState::new(name, None),
            descriptor,
            sub_resource_descriptor: Default::default(),
            usage: Default::default(),
            resource: None,
            imported: false,
            edges: HashMap::new(),
        }
    }

    /// A view of `parent`, it shares the parent's descriptor and never owns concrete storage.
    pub(crate) fn new_sub_resource(
        name: String,
        parent_index: usize,
        parent: &Resource<R>,
        sub_resource_descriptor: R::SubResourceDescriptor,
    ) -> Self {
        Self {
            state: ResourceState::new(name, Some(parent_index)),
            descriptor: parent.descriptor.clone(),
            sub_resource_descriptor,
            usage: Default::default(),
            resource: None,
            imported: false,
            edges: HashMap::new(),
        }
    }

    /// Wrap an existing concrete resource. The frame graph never creates or destroys it, and every
    /// connection must stay within `usage`.
    pub(crate) fn new_imported(name: String, descriptor: R::Descriptor, usage: R::Usage, resource: R) -> Self {
        Self {
            state: ResourceState::new(name, None),
            descriptor,
            sub_resource_descriptor: Default::default(),
            usage,
            resource: Some(resource),
            imported: true,
            edges: HashMap::new(),
        }
    }

    /// Check whether `usage` may be requested on this resource.
    /// # Errors
    /// * Fails with [`Error::UsageViolation`] if this resource is imported and `usage` is not part of its mask.
    pub(crate) fn check_usage(&self, usage: R::Usage) -> Result<()> {
        if self.imported && !self.usage.includes(usage) {
            warn!(
                "Requested usage {:?} not available on imported resource \"{}\" with usage {:?}",
                usage, self.state.name, self.usage
            );
            return Err(Error::UsageViolation {
                name: self.state.name.clone(),
                requested: format!("{usage:?}"),
                available: format!("{:?}", self.usage),
            }
            .into());
        }
        Ok(())
    }

    /// Connect a pass and a resource node with an edge carrying `usage`. Use `from = resource, to = pass` for a
    /// read, and `from = pass, to = resource` for a write.
    /// # Errors
    /// * Fails if [`Resource::check_usage`] fails, in which case no edge is added.
    pub(crate) fn connect<N: GraphNode>(
        &mut self,
        graph: &mut DependencyGraph<N>,
        from: NodeIndex,
        to: NodeIndex,
        kind: EdgeKind,
        usage: R::Usage,
    ) -> Result<EdgeIndex> {
        self.check_usage(usage)?;
        let edge = graph.add_edge(from, to, kind);
        self.edges.insert(edge, usage);
        Ok(edge)
    }
}

impl<R: ResourceKind> VirtualResource for Resource<R> {
    fn state(&self) -> &ResourceState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ResourceState {
        &mut self.state
    }

    fn is_imported(&self) -> bool {
        self.imported
    }

    fn is_devirtualized(&self) -> bool {
        self.resource.is_some()
    }

    fn resolve_usage(&mut self, edges: &[EdgeIndex]) {
        for edge in edges {
            if let Some(usage) = self.edges.get(edge) {
                self.usage |= *usage;
            }
        }
    }

    fn propagate_usage(&self, parent: &mut dyn VirtualResource) {
        let parent = parent
            .as_any_mut()
            .downcast_mut::<Resource<R>>()
            .expect("A sub-resource is always created from a parent of the same kind");
        parent.usage |= self.usage;
    }

    fn devirtualize(&mut self, allocator: &mut dyn ResourceAllocator, parent: Option<&dyn VirtualResource>) -> Result<()> {
        if self.imported {
            return Ok(());
        }
        match parent {
            None => {
                let resource = R::create(allocator, &self.state.name, &self.descriptor, self.usage)
                    .map_err(|e| e.context(Error::AllocationFailed(self.state.name.clone())))?;
                #[cfg(feature = "log-objects")]
                trace!("Created concrete resource \"{}\" ({:?}) with usage {:?}", self.state.name, resource, self.usage);
                self.resource = Some(resource);
            }
            Some(parent) => {
                // The parent is guaranteed to be devirtualized before us by construction.
                let parent = parent.as_any().downcast_ref::<Resource<R>>();
                match parent.and_then(|parent| parent.resource.clone()) {
                    Some(resource) => self.resource = Some(resource),
                    None => return Err(Error::NotDevirtualized(self.state.name.clone()).into()),
                }
            }
        }
        Ok(())
    }

    fn destroy(&mut self, allocator: &mut dyn ResourceAllocator) {
        if self.imported {
            return;
        }
        let resource = self.resource.take();
        // Sub-resources alias the storage of their root, only the root frees it.
        if self.state.is_sub_resource() {
            return;
        }
        if let Some(resource) = resource {
            #[cfg(feature = "log-objects")]
            trace!("Destroying concrete resource \"{}\" ({:?})", self.state.name, resource);
            resource.destroy(allocator);
        }
    }

    fn usage_string(&self) -> String {
        format!("{:?}", self.usage)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
