//! The frame graph schedules the passes of a single frame, and the GPU resources they use.
//!
//! Each pass declares which virtual resources it creates, reads and writes. Resources are referenced through
//! versioned [`FrameGraphId`](handle::FrameGraphId)s. From these declarations the frame graph builds a dependency
//! graph, which is used to
//! - cull passes that do not contribute to a pass with side effects, such as the present pass,
//! - compute the span of passes each resource is needed by,
//! - derive render pass load and store behaviour from the producers and consumers of each attachment.
//!
//! Concrete resources are only created through a [`ResourceAllocator`](crate::backend::ResourceAllocator) during
//! [`FrameGraph::execute`](frame_graph::FrameGraph::execute), right before the first pass needing them, and destroyed
//! right after the last one.
//!
//! # Example
//!
//! ```
//! use framegraph::prelude::*;
//!
//! let mut graph = FrameGraph::new();
//! let swapchain = graph.import_render_target(
//!     "swapchain",
//!     ImportedRenderTargetDescriptor::default(),
//!     TextureUsage::COLOR_ATTACHMENT | TextureUsage::PRESENT,
//!     RenderTargetHandle::new(0),
//! );
//! // Nothing consumes this pass, it will be culled.
//! graph.add_pass::<(), _, _>(
//!     "unused",
//!     |builder, _| {
//!         let scratch = builder.create::<Buffer>("scratch", BufferDescriptor { size: 64 });
//!         builder.write(scratch, BufferUsage::STORAGE).ok();
//!     },
//!     |_, _, _| Ok(()),
//! );
//! let color = graph.add_pass::<FrameGraphId<Texture>, _, _>(
//!     "color",
//!     |builder, color| {
//!         *color = swapchain;
//!         builder.use_as_render_target(Some(color), None);
//!     },
//!     |_, _, _| Ok(()),
//! );
//! graph.add_present_pass(|builder| {
//!     builder.read(color, TextureUsage::PRESENT).ok();
//! });
//! let stats = graph.compile();
//! assert_eq!(stats.culled_passes, 1);
//! ```
//!
//! Through [`FrameGraph::graphviz`](frame_graph::FrameGraph::graphviz) a graphviz-compatible dot string of the
//! compiled graph can be obtained for debugging.

pub mod dependency_graph;
pub mod frame_graph;
pub mod handle;
pub mod pass;
pub mod record;
pub mod render_target;
pub(crate) mod resource_node;
pub mod resources;
pub(crate) mod virtual_resource;
