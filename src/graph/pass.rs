//! This module holds the pass nodes of a frame graph and the executors that are invoked when a pass runs.
//!
//! A pass is declared with [`FrameGraph::add_pass`](crate::graph::frame_graph::FrameGraph::add_pass). The setup
//! closure declares resource usage through a [`Builder`](crate::graph::frame_graph::Builder) and fills in a data
//! struct, the execute closure receives that data together with a
//! [`FrameGraphResources`] view to look up concrete resources.
//!
//! # Example
//!
//! ```ignore
//! use framegraph::prelude::*;
//!
//! #[derive(Default, Clone)]
//! struct BlurData {
//!     input: FrameGraphId<Texture>,
//!     output: FrameGraphId<Texture>,
//! }
//!
//! let blur = graph.add_pass::<BlurData, _, _>(
//!     "blur",
//!     |builder, data| {
//!         data.input = builder.read(color, TextureUsage::SAMPLEABLE).unwrap_or_default();
//!         let output = builder.create::<Texture>("blurred", TextureDescriptor::new(640, 360));
//!         data.output = builder.write(output, TextureUsage::COLOR_ATTACHMENT).unwrap_or_default();
//!     },
//!     |resources, data, driver| {
//!         let input = resources.get(data.input)?;
//!         let output = resources.get(data.output)?;
//!         // Record commands sampling `input` and rendering into `output`.
//!         Ok(())
//!     },
//! );
//! ```
//!
//! # Lifecycle
//!
//! Every pass starts out [`PassState::Declared`]. Compiling the graph either culls it, or resolves its render
//! targets. Resolved passes are executed in declaration order.

use std::collections::HashSet;

use anyhow::Result;
use petgraph::graph::NodeIndex;

use crate::backend::{Driver, TargetBufferFlags};
use crate::graph::dependency_graph::GraphNode;
use crate::graph::render_target::{ATTACHMENT_COUNT, RenderPassInfo, RenderTargetDescriptor};
use crate::graph::resources::FrameGraphResources;

/// Identifies a pass by its position in declaration order.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PassId(pub(crate) usize);

impl PassId {
    /// Position of the pass in declaration order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Defines a pass executor that is called when the pass is executed.
pub trait PassExecutor {
    /// Execute this pass. Concrete resources are looked up through `resources`.
    fn execute(&mut self, resources: &FrameGraphResources, driver: &mut dyn Driver) -> Result<()>;
}

impl<F> PassExecutor for F
where
    F: FnMut(&FrameGraphResources, &mut dyn Driver) -> Result<()>,
{
    /// Execute this pass by calling the given function.
    fn execute(&mut self, resources: &FrameGraphResources, driver: &mut dyn Driver) -> Result<()> {
        self(resources, driver)
    }
}

pub(crate) type BoxedPassFn<'cb> = Box<dyn PassExecutor + 'cb>;

/// An empty pass executor that does nothing
pub struct EmptyPassExecutor;

impl EmptyPassExecutor {
    /// Creates an empty pass executor
    pub fn new() -> Self {
        Self {}
    }

    /// Create a new empty pass executor in a [`Box`]
    pub fn new_boxed() -> Box<Self> {
        Box::new(Self::new())
    }
}

impl Default for EmptyPassExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PassExecutor for EmptyPassExecutor {
    fn execute(&mut self, _resources: &FrameGraphResources, _driver: &mut dyn Driver) -> Result<()> {
        Ok(())
    }
}

/// Executor that hands the data filled in during setup to the execute function.
pub(crate) struct DataPassExecutor<Data, E> {
    pub data: Data,
    pub execute: E,
}

impl<Data, E> PassExecutor for DataPassExecutor<Data, E>
where
    E: FnMut(&FrameGraphResources, &Data, &mut dyn Driver) -> Result<()>,
{
    fn execute(&mut self, resources: &FrameGraphResources, driver: &mut dyn Driver) -> Result<()> {
        (self.execute)(resources, &self.data, driver)
    }
}

/// Where a pass is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PassState {
    /// Created by a builder, not compiled yet.
    Declared,
    /// Removed during compilation, it will never execute.
    Culled,
    /// Survived compilation, render target information is final.
    Resolved,
    /// The execute callback was invoked.
    Executed,
}

/// Bookkeeping for one render target declared by a pass.
#[derive(Debug, Clone)]
pub(crate) struct RenderTargetData {
    pub name: String,
    /// Attachments hold the handles after the pass wrote them.
    pub descriptor: RenderTargetDescriptor,
    pub imported: bool,
    pub target_buffer_flags: TargetBufferFlags,
    /// Nodes of the attachments read by this pass, if their content was needed.
    pub incoming: [Option<NodeIndex>; ATTACHMENT_COUNT],
    /// Nodes of the attachments written by this pass.
    pub outgoing: [Option<NodeIndex>; ATTACHMENT_COUNT],
    pub backend: RenderPassInfo,
}

impl RenderTargetData {
    pub fn new(name: String, descriptor: RenderTargetDescriptor) -> Self {
        Self {
            name,
            descriptor,
            imported: false,
            target_buffer_flags: TargetBufferFlags::empty(),
            incoming: [None; ATTACHMENT_COUNT],
            outgoing: [None; ATTACHMENT_COUNT],
            backend: RenderPassInfo::default(),
        }
    }
}

#[derive(Debug)]
pub(crate) enum PassKind {
    /// An ordinary pass, it may declare render targets.
    Render {
        render_targets: Vec<RenderTargetData>,
    },
    /// Terminal pass that exists only to keep its dependencies alive.
    Present,
}

/// A pass in the frame graph.
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct PassNode<'cb> {
    name: String,
    kind: PassKind,
    #[derivative(Debug = "ignore")]
    executor: Option<BoxedPassFn<'cb>>,
    /// Indices of every resource this pass reads or writes.
    declared: HashSet<u32>,
    state: PassState,
}

impl<'cb> PassNode<'cb> {
    pub fn render(name: String, executor: BoxedPassFn<'cb>) -> Self {
        Self {
            name,
            kind: PassKind::Render {
                render_targets: Vec::new(),
            },
            executor: Some(executor),
            declared: HashSet::new(),
            state: PassState::Declared,
        }
    }

    pub fn present() -> Self {
        Self {
            name: String::from("Present"),
            kind: PassKind::Present,
            executor: None,
            declared: HashSet::new(),
            state: PassState::Declared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_present(&self) -> bool {
        matches!(self.kind, PassKind::Present)
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn set_state(&mut self, state: PassState) {
        self.state = state;
    }

    pub fn set_executor(&mut self, executor: BoxedPassFn<'cb>) {
        self.executor = Some(executor);
    }

    /// Take the executor out of the pass, it is only ever invoked once.
    pub fn take_executor(&mut self) -> Option<BoxedPassFn<'cb>> {
        self.executor.take()
    }

    pub fn declare(&mut self, index: u32) {
        self.declared.insert(index);
    }

    pub fn has_declared(&self, index: u32) -> bool {
        self.declared.contains(&index)
    }

    /// Register a render target, returning its id.
    /// # Panics
    /// Present passes cannot have render targets.
    pub fn add_render_target(&mut self, data: RenderTargetData) -> u32 {
        match &mut self.kind {
            PassKind::Render {
                render_targets,
            } => {
                render_targets.push(data);
                (render_targets.len() - 1) as u32
            }
            PassKind::Present => panic!("Cannot declare a render target on the present pass."),
        }
    }

    pub fn render_targets(&self) -> &[RenderTargetData] {
        match &self.kind {
            PassKind::Render {
                render_targets,
            } => render_targets,
            PassKind::Present => &[],
        }
    }

    pub fn render_targets_mut(&mut self) -> &mut [RenderTargetData] {
        match &mut self.kind {
            PassKind::Render {
                render_targets,
            } => render_targets,
            PassKind::Present => &mut [],
        }
    }

    /// Take the render targets out of the pass, so they can be resolved against the rest of the graph.
    pub fn take_render_targets(&mut self) -> Vec<RenderTargetData> {
        match &mut self.kind {
            PassKind::Render {
                render_targets,
            } => std::mem::take(render_targets),
            PassKind::Present => Vec::new(),
        }
    }

    pub fn restore_render_targets(&mut self, targets: Vec<RenderTargetData>) {
        if let PassKind::Render {
            render_targets,
        } = &mut self.kind
        {
            *render_targets = targets;
        }
    }
}

impl GraphNode for PassNode<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_culled(&mut self) {
        self.state = PassState::Culled;
        // A culled pass never runs, release whatever its executor captured right away.
        self.executor = None;
    }

    fn graphviz_attributes(&self) -> String {
        match self.kind {
            PassKind::Render {
                ..
            } => String::from("shape = box"),
            PassKind::Present => String::from("shape = doubleoctagon"),
        }
    }
}
