//! Graph nodes standing for one version of a virtual resource.

use petgraph::graph::EdgeIndex;

use crate::graph::dependency_graph::GraphNode;
use crate::graph::handle::FrameGraphHandle;

/// One version of a virtual resource. Each write to a resource that already has a writer creates a new node.
#[derive(Debug)]
pub(crate) struct ResourceNode {
    name: String,
    handle: FrameGraphHandle,
    /// Edge from the pass producing this version. At most one.
    writer: Option<EdgeIndex>,
    /// Edges to the passes consuming this version.
    readers: Vec<EdgeIndex>,
    /// Dependency on the parent's content, for sub-resources read before they were written.
    parent_read: Option<EdgeIndex>,
    /// Dependency of the parent on this version, for written sub-resources.
    parent_write: Option<EdgeIndex>,
}

impl ResourceNode {
    pub fn new(name: String, handle: FrameGraphHandle) -> Self {
        Self {
            name,
            handle,
            writer: None,
            readers: Vec::new(),
            parent_read: None,
            parent_write: None,
        }
    }

    pub fn handle(&self) -> FrameGraphHandle {
        self.handle
    }

    /// Index of the virtual resource this node is a version of.
    pub fn resource_index(&self) -> usize {
        self.handle.index as usize
    }

    pub fn writer(&self) -> Option<EdgeIndex> {
        self.writer
    }

    pub fn has_writer(&self) -> bool {
        self.writer.is_some()
    }

    pub fn set_writer(&mut self, edge: EdgeIndex) {
        self.writer = Some(edge);
    }

    pub fn readers(&self) -> &[EdgeIndex] {
        &self.readers
    }

    pub fn add_reader(&mut self, edge: EdgeIndex) {
        self.readers.push(edge);
    }

    /// Returns true if this version is already linked to its parent in either direction.
    pub fn has_parent_dependency(&self) -> bool {
        self.parent_read.is_some() || self.parent_write.is_some()
    }

    pub fn has_parent_write(&self) -> bool {
        self.parent_write.is_some()
    }

    pub fn set_parent_read(&mut self, edge: EdgeIndex) {
        self.parent_read = Some(edge);
    }

    pub fn set_parent_write(&mut self, edge: EdgeIndex) {
        self.parent_write = Some(edge);
    }
}

impl GraphNode for ResourceNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn graphviz_attributes(&self) -> String {
        format!("shape = ellipse xlabel = \"{:?}\"", self.handle)
    }
}
